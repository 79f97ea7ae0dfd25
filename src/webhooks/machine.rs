//! Webhooks for AzureMachine, AzureMachineTemplate, AzureMachinePool and
//! AzureMachinePoolMachine.
//!
//! Machines with a system-assigned identity are scoped to their cluster's
//! subscription, so defaulting them reads the owning Cluster and its
//! infrastructure object.

use async_trait::async_trait;
use kube::ResourceExt;
use tracing::debug;

use super::policies::machine::{
    machine_template_warnings, machine_warnings, validate_machine, validate_machine_immutability,
    validate_machine_template, validate_machine_template_immutability,
};
use super::policies::machine_pool::{
    machine_pool_warnings, validate_machine_pool, validate_machine_pool_immutability,
    validate_machine_pool_machine_immutability,
};
use super::reader::lookup_subscription_id;
use super::{
    AdmissionContext, AdmissionResult, AdmissionWebhook, Warnings, Webhook, finish, internal_error,
    skip_template_immutability, update_then_create,
};
use crate::crd::{
    AzureMachine, AzureMachinePool, AzureMachinePoolMachine, AzureMachineTemplate, CLUSTER_NAME_LABEL,
    SystemAssignedIdentityRole, VMIdentity,
};
use crate::defaults::{
    needs_subscription_id, set_azure_machine_defaults, set_azure_machine_pool_defaults,
    set_azure_machine_template_defaults,
};
use crate::error::{Error, Result};
use crate::validation::{AdmissionError, ErrorList, FieldPath};

fn role_path() -> FieldPath {
    FieldPath::from_fields(&["spec", "systemAssignedIdentityRole"])
}

impl AdmissionWebhook {
    /// Subscription of the cluster `obj` belongs to, found through its
    /// cluster-name label. Empty when defaulting will not read it.
    async fn subscription_for<K>(
        &self,
        obj: &K,
        identity: VMIdentity,
        role: Option<&SystemAssignedIdentityRole>,
    ) -> Result<String>
    where
        K: ResourceExt + Sync,
    {
        if !needs_subscription_id(identity, role) {
            return Ok(String::new());
        }
        let cluster_name = obj
            .labels()
            .get(CLUSTER_NAME_LABEL)
            .ok_or_else(|| Error::MissingLabel(CLUSTER_NAME_LABEL.to_string()))?;
        let namespace = obj.namespace().unwrap_or_default();
        let subscription_id = lookup_subscription_id(self.reader(), self.config(), &namespace, cluster_name).await?;
        debug!(cluster = %cluster_name, "Resolved subscription for identity role scope");
        Ok(subscription_id)
    }
}

#[async_trait]
impl Webhook<AzureMachine> for AdmissionWebhook {
    async fn default(&self, _ctx: &AdmissionContext, obj: &mut AzureMachine) -> std::result::Result<(), AdmissionError> {
        let subscription_id = self
            .subscription_for(&*obj, obj.spec.identity, obj.spec.system_assigned_identity_role.as_ref())
            .await
            .map_err(|e| internal_error(&*obj, role_path(), &e))?;

        let mut defaulted = obj.clone();
        set_azure_machine_defaults(&mut defaulted, &subscription_id)
            .map_err(|e| internal_error(&*obj, FieldPath::from_fields(&["spec", "sshPublicKey"]), &e))?;
        *obj = defaulted;
        Ok(())
    }

    async fn validate_create(&self, _ctx: &AdmissionContext, obj: &AzureMachine) -> AdmissionResult {
        finish(obj, validate_machine(obj), machine_warnings(&obj.spec))
    }

    async fn validate_update(&self, _ctx: &AdmissionContext, old: &AzureMachine, new: &AzureMachine) -> AdmissionResult {
        let errs = update_then_create(validate_machine_immutability(old, new), || validate_machine(new));
        finish(new, errs, machine_warnings(&new.spec))
    }
}

#[async_trait]
impl Webhook<AzureMachineTemplate> for AdmissionWebhook {
    async fn default(
        &self,
        _ctx: &AdmissionContext,
        obj: &mut AzureMachineTemplate,
    ) -> std::result::Result<(), AdmissionError> {
        set_azure_machine_template_defaults(obj);
        Ok(())
    }

    async fn validate_create(&self, _ctx: &AdmissionContext, obj: &AzureMachineTemplate) -> AdmissionResult {
        finish(obj, validate_machine_template(obj), machine_template_warnings(obj))
    }

    async fn validate_update(
        &self,
        ctx: &AdmissionContext,
        old: &AzureMachineTemplate,
        new: &AzureMachineTemplate,
    ) -> AdmissionResult {
        let immutability = if skip_template_immutability(ctx, new) {
            debug!(name = %new.name_any(), "Skipping template immutability for topology dry-run");
            ErrorList::new()
        } else {
            validate_machine_template_immutability(old, new)
        };
        let errs = update_then_create(immutability, || validate_machine_template(new));
        finish(new, errs, machine_template_warnings(new))
    }
}

#[async_trait]
impl Webhook<AzureMachinePool> for AdmissionWebhook {
    async fn default(
        &self,
        _ctx: &AdmissionContext,
        obj: &mut AzureMachinePool,
    ) -> std::result::Result<(), AdmissionError> {
        let subscription_id = self
            .subscription_for(&*obj, obj.spec.identity, obj.spec.system_assigned_identity_role.as_ref())
            .await
            .map_err(|e| internal_error(&*obj, role_path(), &e))?;

        let mut defaulted = obj.clone();
        set_azure_machine_pool_defaults(&mut defaulted, &subscription_id).map_err(|e| {
            internal_error(&*obj, FieldPath::from_fields(&["spec", "template", "sshPublicKey"]), &e)
        })?;
        *obj = defaulted;
        Ok(())
    }

    async fn validate_create(&self, _ctx: &AdmissionContext, obj: &AzureMachinePool) -> AdmissionResult {
        let errs = validate_machine_pool(obj, &self.config().feature_gates);
        finish(obj, errs, machine_pool_warnings(&obj.spec))
    }

    async fn validate_update(
        &self,
        _ctx: &AdmissionContext,
        old: &AzureMachinePool,
        new: &AzureMachinePool,
    ) -> AdmissionResult {
        let errs = update_then_create(validate_machine_pool_immutability(old, new), || {
            validate_machine_pool(new, &self.config().feature_gates)
        });
        finish(new, errs, machine_pool_warnings(&new.spec))
    }
}

#[async_trait]
impl Webhook<AzureMachinePoolMachine> for AdmissionWebhook {
    async fn default(
        &self,
        _ctx: &AdmissionContext,
        _obj: &mut AzureMachinePoolMachine,
    ) -> std::result::Result<(), AdmissionError> {
        Ok(())
    }

    async fn validate_create(&self, _ctx: &AdmissionContext, obj: &AzureMachinePoolMachine) -> AdmissionResult {
        finish(obj, ErrorList::new(), Warnings::new())
    }

    async fn validate_update(
        &self,
        _ctx: &AdmissionContext,
        old: &AzureMachinePoolMachine,
        new: &AzureMachinePoolMachine,
    ) -> AdmissionResult {
        finish(new, validate_machine_pool_machine_immutability(old, new), Warnings::new())
    }
}
