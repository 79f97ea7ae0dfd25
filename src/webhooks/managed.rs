//! Webhooks for the managed (AKS) kinds.
//!
//! Two rules here depend on the object store: the control plane's DNS
//! service IP is checked against its Cluster's service CIDR, and a System
//! node pool cannot leave the System set while it is the cluster's last.

use async_trait::async_trait;
use kube::ResourceExt;
use tracing::{debug, info};

use super::policies::managed_cluster::{validate_managed_cluster, validate_managed_cluster_immutability};
use super::policies::managed_control_plane::{
    validate_managed_control_plane, validate_managed_control_plane_immutability,
    validate_managed_control_plane_template, validate_managed_control_plane_template_immutability,
};
use super::policies::managed_machine_pool::{
    system_pool_guard_applies, validate_last_system_pool, validate_managed_machine_pool,
    validate_managed_machine_pool_immutability, validate_managed_machine_pool_template,
    validate_managed_machine_pool_template_immutability,
};
use super::reader::with_timeout;
use super::{
    AdmissionContext, AdmissionResult, AdmissionWebhook, Warnings, Webhook, finish, internal_error,
    skip_template_immutability, update_then_create,
};
use crate::crd::{
    AzureManagedCluster, AzureManagedControlPlane, AzureManagedControlPlaneTemplate, AzureManagedMachinePool,
    AzureManagedMachinePoolTemplate, CLUSTER_NAME_LABEL, LABEL_AGENT_POOL_MODE, NodePoolMode,
};
use crate::defaults::{
    set_managed_control_plane_defaults, set_managed_control_plane_template_defaults,
    set_managed_machine_pool_defaults, set_managed_machine_pool_template_defaults,
};
use crate::error::Result;
use crate::validation::{AdmissionError, ErrorList, FieldPath};

impl AdmissionWebhook {
    /// Service CIDRs of the Cluster owning `mcp`, `None` when there is no
    /// DNS service IP to check or no owner to read.
    async fn owner_service_cidrs(&self, mcp: &AzureManagedControlPlane) -> Result<Option<Vec<String>>> {
        if mcp.spec.class.dns_service_ip.is_none() {
            return Ok(None);
        }
        let Some(cluster_name) = mcp.labels().get(CLUSTER_NAME_LABEL) else {
            return Ok(None);
        };
        let namespace = mcp.namespace().unwrap_or_default();
        let cluster = with_timeout(self.config(), self.reader().get_cluster(&namespace, cluster_name)).await?;
        Ok(cluster.map(|c| c.service_cidrs().to_vec()))
    }

    async fn admit_control_plane(&self, mcp: &AzureManagedControlPlane) -> AdmissionResult {
        let cidrs = self
            .owner_service_cidrs(mcp)
            .await
            .map_err(|e| internal_error(mcp, FieldPath::from_fields(&["spec", "dnsServiceIP"]), &e))?;
        finish(mcp, validate_managed_control_plane(mcp, cidrs.as_deref()), Warnings::new())
    }

    /// The last-system-pool rule for `pool` as stored.
    async fn check_last_system_pool(&self, pool: &AzureManagedMachinePool) -> Result<ErrorList> {
        if pool.spec.class.mode != NodePoolMode::System {
            return Ok(ErrorList::new());
        }
        let Some(cluster_name) = pool.labels().get(CLUSTER_NAME_LABEL) else {
            return Ok(ErrorList::new());
        };
        let namespace = pool.namespace().unwrap_or_default();
        let owner = with_timeout(self.config(), self.reader().get_cluster(&namespace, cluster_name)).await?;
        if !system_pool_guard_applies(pool, owner.as_ref()) {
            debug!(pool = %pool.name_any(), "System pool guard does not apply");
            return Ok(ErrorList::new());
        }

        let selector = format!("{CLUSTER_NAME_LABEL}={cluster_name},{LABEL_AGENT_POOL_MODE}={}", NodePoolMode::System);
        let pools = with_timeout(
            self.config(),
            self.reader().list_managed_machine_pools(&namespace, &selector),
        )
        .await?;
        debug!(cluster = %cluster_name, system_pools = pools.len(), "Counted system pools");
        Ok(validate_last_system_pool(pools.len()))
    }

    async fn admit_system_pool_removal(&self, pool: &AzureManagedMachinePool) -> AdmissionResult {
        let errs = self
            .check_last_system_pool(pool)
            .await
            .map_err(|e| internal_error(pool, FieldPath::from_fields(&["spec", "mode"]), &e))?;
        if !errs.is_empty() {
            info!(pool = %pool.name_any(), "Refusing to remove the last system pool");
        }
        finish(pool, errs, Warnings::new())
    }
}

#[async_trait]
impl Webhook<AzureManagedControlPlane> for AdmissionWebhook {
    async fn default(
        &self,
        _ctx: &AdmissionContext,
        obj: &mut AzureManagedControlPlane,
    ) -> std::result::Result<(), AdmissionError> {
        let mut defaulted = obj.clone();
        set_managed_control_plane_defaults(&mut defaulted)
            .map_err(|e| internal_error(&*obj, FieldPath::from_fields(&["spec", "sshPublicKey"]), &e))?;
        *obj = defaulted;
        Ok(())
    }

    async fn validate_create(&self, _ctx: &AdmissionContext, obj: &AzureManagedControlPlane) -> AdmissionResult {
        self.admit_control_plane(obj).await
    }

    async fn validate_update(
        &self,
        _ctx: &AdmissionContext,
        old: &AzureManagedControlPlane,
        new: &AzureManagedControlPlane,
    ) -> AdmissionResult {
        let errs = validate_managed_control_plane_immutability(old, new);
        if !errs.is_empty() {
            return finish(new, errs, Warnings::new());
        }
        self.admit_control_plane(new).await
    }
}

#[async_trait]
impl Webhook<AzureManagedControlPlaneTemplate> for AdmissionWebhook {
    async fn default(
        &self,
        _ctx: &AdmissionContext,
        obj: &mut AzureManagedControlPlaneTemplate,
    ) -> std::result::Result<(), AdmissionError> {
        set_managed_control_plane_template_defaults(obj);
        Ok(())
    }

    async fn validate_create(
        &self,
        _ctx: &AdmissionContext,
        obj: &AzureManagedControlPlaneTemplate,
    ) -> AdmissionResult {
        finish(obj, validate_managed_control_plane_template(obj), Warnings::new())
    }

    async fn validate_update(
        &self,
        ctx: &AdmissionContext,
        old: &AzureManagedControlPlaneTemplate,
        new: &AzureManagedControlPlaneTemplate,
    ) -> AdmissionResult {
        let immutability = if skip_template_immutability(ctx, new) {
            ErrorList::new()
        } else {
            validate_managed_control_plane_template_immutability(old, new)
        };
        let errs = update_then_create(immutability, || validate_managed_control_plane_template(new));
        finish(new, errs, Warnings::new())
    }
}

#[async_trait]
impl Webhook<AzureManagedCluster> for AdmissionWebhook {
    async fn default(
        &self,
        _ctx: &AdmissionContext,
        _obj: &mut AzureManagedCluster,
    ) -> std::result::Result<(), AdmissionError> {
        Ok(())
    }

    async fn validate_create(&self, _ctx: &AdmissionContext, obj: &AzureManagedCluster) -> AdmissionResult {
        finish(obj, validate_managed_cluster(obj, &self.config().feature_gates), Warnings::new())
    }

    async fn validate_update(
        &self,
        _ctx: &AdmissionContext,
        old: &AzureManagedCluster,
        new: &AzureManagedCluster,
    ) -> AdmissionResult {
        let errs = update_then_create(validate_managed_cluster_immutability(old, new), || {
            validate_managed_cluster(new, &self.config().feature_gates)
        });
        finish(new, errs, Warnings::new())
    }
}

#[async_trait]
impl Webhook<AzureManagedMachinePool> for AdmissionWebhook {
    async fn default(
        &self,
        _ctx: &AdmissionContext,
        obj: &mut AzureManagedMachinePool,
    ) -> std::result::Result<(), AdmissionError> {
        set_managed_machine_pool_defaults(obj);
        Ok(())
    }

    async fn validate_create(&self, _ctx: &AdmissionContext, obj: &AzureManagedMachinePool) -> AdmissionResult {
        finish(obj, validate_managed_machine_pool(obj, &self.config().feature_gates), Warnings::new())
    }

    async fn validate_update(
        &self,
        _ctx: &AdmissionContext,
        old: &AzureManagedMachinePool,
        new: &AzureManagedMachinePool,
    ) -> AdmissionResult {
        let errs = validate_managed_machine_pool_immutability(old, new);
        if !errs.is_empty() {
            return finish(new, errs, Warnings::new());
        }
        if old.spec.class.mode == NodePoolMode::System && new.spec.class.mode == NodePoolMode::User {
            self.admit_system_pool_removal(old).await?;
        }
        finish(new, validate_managed_machine_pool(new, &self.config().feature_gates), Warnings::new())
    }

    async fn validate_delete(&self, _ctx: &AdmissionContext, obj: &AzureManagedMachinePool) -> AdmissionResult {
        self.admit_system_pool_removal(obj).await
    }
}

#[async_trait]
impl Webhook<AzureManagedMachinePoolTemplate> for AdmissionWebhook {
    async fn default(
        &self,
        _ctx: &AdmissionContext,
        obj: &mut AzureManagedMachinePoolTemplate,
    ) -> std::result::Result<(), AdmissionError> {
        set_managed_machine_pool_template_defaults(obj);
        Ok(())
    }

    async fn validate_create(
        &self,
        _ctx: &AdmissionContext,
        obj: &AzureManagedMachinePoolTemplate,
    ) -> AdmissionResult {
        let errs = validate_managed_machine_pool_template(obj, &self.config().feature_gates);
        finish(obj, errs, Warnings::new())
    }

    async fn validate_update(
        &self,
        ctx: &AdmissionContext,
        old: &AzureManagedMachinePoolTemplate,
        new: &AzureManagedMachinePoolTemplate,
    ) -> AdmissionResult {
        let immutability = if skip_template_immutability(ctx, new) {
            ErrorList::new()
        } else {
            validate_managed_machine_pool_template_immutability(old, new)
        };
        let errs = update_then_create(immutability, || {
            validate_managed_machine_pool_template(new, &self.config().feature_gates)
        });
        finish(new, errs, Warnings::new())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::WebhookConfig;
    use crate::crd::{
        AzureManagedMachinePoolClassSpec, AzureManagedMachinePoolSpec, Cluster, ClusterNetwork, ClusterSpec,
        MOVE_TO_DELETE_ANNOTATION, NetworkRanges,
    };
    use crate::error::Error;
    use crate::validation::ErrorType;
    use crate::webhooks::reader::MockObjectReader;
    use std::sync::Arc;

    fn system_pool(name: &str) -> AzureManagedMachinePool {
        let mut pool = AzureManagedMachinePool::new(
            name,
            AzureManagedMachinePoolSpec {
                class: AzureManagedMachinePoolClassSpec {
                    mode: NodePoolMode::System,
                    sku: "Standard_D2s_v3".to_string(),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        pool.metadata.namespace = Some("default".to_string());
        pool.labels_mut().insert(CLUSTER_NAME_LABEL.to_string(), "c1".to_string());
        set_managed_machine_pool_defaults(&mut pool);
        pool
    }

    fn reader(owner: Option<Cluster>, system_pools: usize) -> MockObjectReader {
        let mut reader = MockObjectReader::new();
        reader
            .expect_get_cluster()
            .returning(move |_, _| Ok(owner.clone()));
        reader
            .expect_list_managed_machine_pools()
            .withf(|ns, selector| {
                ns == "default"
                    && selector
                        == "cluster.x-k8s.io/cluster-name=c1,azuremanagedmachinepool.infrastructure.cluster.x-k8s.io/agentpoolmode=System"
            })
            .returning(move |_, _| Ok((0..system_pools).map(|i| system_pool(&format!("pool{i}"))).collect()));
        reader
    }

    fn webhook(reader: MockObjectReader) -> AdmissionWebhook {
        AdmissionWebhook::new(WebhookConfig::default(), Arc::new(reader))
    }

    fn owner() -> Cluster {
        Cluster::new("c1", ClusterSpec::default())
    }

    #[tokio::test]
    async fn test_last_system_pool_cannot_be_deleted() {
        let wh = webhook(reader(Some(owner()), 1));
        let err = wh
            .validate_delete(&AdmissionContext::default(), &system_pool("pool0"))
            .await
            .unwrap_err();
        let errs = err.errors.into_vec();
        assert_eq!(errs[0].error_type, ErrorType::Forbidden);
        assert_eq!(errs[0].detail, "AKS Cluster must have at least one system pool");
    }

    #[tokio::test]
    async fn test_other_system_pool_remains() {
        let wh = webhook(reader(Some(owner()), 2));
        assert!(
            wh.validate_delete(&AdmissionContext::default(), &system_pool("pool0"))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_delete_allowed_when_owner_missing_or_moving() {
        let wh = webhook(reader(None, 1));
        assert!(
            wh.validate_delete(&AdmissionContext::default(), &system_pool("pool0"))
                .await
                .is_ok()
        );

        let wh = webhook(reader(Some(owner()), 1));
        let mut moving = system_pool("pool0");
        moving.annotations_mut().insert(MOVE_TO_DELETE_ANNOTATION.to_string(), String::new());
        assert!(wh.validate_delete(&AdmissionContext::default(), &moving).await.is_ok());
    }

    #[tokio::test]
    async fn test_mode_change_applies_guard() {
        let wh = webhook(reader(Some(owner()), 1));
        let old = system_pool("pool0");
        let mut new = old.clone();
        new.spec.class.mode = NodePoolMode::User;
        let err = wh.validate_update(&AdmissionContext::default(), &old, &new).await.unwrap_err();
        assert_eq!(err.errors.iter().next().unwrap().path.to_string(), "spec.mode");
    }

    #[tokio::test]
    async fn test_owner_read_failure_is_internal() {
        let mut failing = MockObjectReader::new();
        failing
            .expect_get_cluster()
            .returning(|_, _| Err(Error::Config("unreachable".to_string())));
        let wh = webhook(failing);
        let err = wh
            .validate_delete(&AdmissionContext::default(), &system_pool("pool0"))
            .await
            .unwrap_err();
        assert_eq!(err.errors.iter().next().unwrap().error_type, ErrorType::Internal);
    }

    #[tokio::test]
    async fn test_dns_service_ip_checked_against_owner() {
        let mut cluster = owner();
        cluster.spec.cluster_network = Some(ClusterNetwork {
            services: Some(NetworkRanges {
                cidr_blocks: vec!["10.0.0.0/16".to_string()],
            }),
            pods: None,
        });
        let mut mock = MockObjectReader::new();
        mock.expect_get_cluster().returning(move |_, _| Ok(Some(cluster.clone())));
        let wh = webhook(mock);

        let mut mcp = AzureManagedControlPlane::new("aks", Default::default());
        mcp.metadata.namespace = Some("default".to_string());
        mcp.labels_mut().insert(CLUSTER_NAME_LABEL.to_string(), "c1".to_string());
        mcp.spec.resource_group_name = "rg".to_string();
        mcp.spec.class.location = "westus2".to_string();
        mcp.spec.class.dns_service_ip = Some("10.1.0.10".to_string());
        let ctx = AdmissionContext::default();
        wh.default(&ctx, &mut mcp).await.unwrap();

        let err = wh.validate_create(&ctx, &mcp).await.unwrap_err();
        assert_eq!(err.errors.iter().next().unwrap().path.to_string(), "spec.dnsServiceIP");

        mcp.spec.class.dns_service_ip = Some("10.0.0.10".to_string());
        assert!(wh.validate_create(&ctx, &mcp).await.is_ok());
    }
}
