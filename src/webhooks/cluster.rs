//! Webhooks for AzureCluster, AzureClusterTemplate and AzureClusterIdentity.

use async_trait::async_trait;
use tracing::debug;

use super::policies::cluster::{
    validate_cluster, validate_cluster_immutability, validate_cluster_template,
    validate_cluster_template_immutability,
};
use super::policies::cluster_identity::{validate_cluster_identity, validate_cluster_identity_immutability};
use super::{
    AdmissionContext, AdmissionResult, AdmissionWebhook, Warnings, Webhook, finish, skip_template_immutability,
    update_then_create,
};
use crate::crd::{AzureCluster, AzureClusterIdentity, AzureClusterTemplate};
use crate::defaults::{set_azure_cluster_defaults, set_azure_cluster_template_defaults};
use crate::validation::{AdmissionError, ErrorList};

#[async_trait]
impl Webhook<AzureCluster> for AdmissionWebhook {
    async fn default(&self, _ctx: &AdmissionContext, obj: &mut AzureCluster) -> Result<(), AdmissionError> {
        set_azure_cluster_defaults(obj);
        Ok(())
    }

    async fn validate_create(&self, _ctx: &AdmissionContext, obj: &AzureCluster) -> AdmissionResult {
        let errs = validate_cluster(obj, &self.config().feature_gates);
        finish(obj, errs, Warnings::new())
    }

    async fn validate_update(&self, _ctx: &AdmissionContext, old: &AzureCluster, new: &AzureCluster) -> AdmissionResult {
        let errs = update_then_create(validate_cluster_immutability(old, new), || {
            validate_cluster(new, &self.config().feature_gates)
        });
        finish(new, errs, Warnings::new())
    }
}

#[async_trait]
impl Webhook<AzureClusterTemplate> for AdmissionWebhook {
    async fn default(&self, _ctx: &AdmissionContext, obj: &mut AzureClusterTemplate) -> Result<(), AdmissionError> {
        set_azure_cluster_template_defaults(obj);
        Ok(())
    }

    async fn validate_create(&self, _ctx: &AdmissionContext, obj: &AzureClusterTemplate) -> AdmissionResult {
        let errs = validate_cluster_template(obj, &self.config().feature_gates);
        finish(obj, errs, Warnings::new())
    }

    async fn validate_update(
        &self,
        ctx: &AdmissionContext,
        old: &AzureClusterTemplate,
        new: &AzureClusterTemplate,
    ) -> AdmissionResult {
        let immutability = if skip_template_immutability(ctx, new) {
            debug!("Skipping template immutability for topology dry-run");
            ErrorList::new()
        } else {
            validate_cluster_template_immutability(old, new)
        };
        let errs = update_then_create(immutability, || {
            validate_cluster_template(new, &self.config().feature_gates)
        });
        finish(new, errs, Warnings::new())
    }
}

#[async_trait]
impl Webhook<AzureClusterIdentity> for AdmissionWebhook {
    async fn default(&self, _ctx: &AdmissionContext, _obj: &mut AzureClusterIdentity) -> Result<(), AdmissionError> {
        Ok(())
    }

    async fn validate_create(&self, _ctx: &AdmissionContext, obj: &AzureClusterIdentity) -> AdmissionResult {
        finish(obj, validate_cluster_identity(obj), Warnings::new())
    }

    async fn validate_update(
        &self,
        _ctx: &AdmissionContext,
        old: &AzureClusterIdentity,
        new: &AzureClusterIdentity,
    ) -> AdmissionResult {
        let errs = update_then_create(validate_cluster_identity_immutability(old, new), || {
            validate_cluster_identity(new)
        });
        finish(new, errs, Warnings::new())
    }
}
