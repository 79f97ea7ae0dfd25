//! Object-store reads used during admission.
//!
//! Admission is request-scoped: every read goes straight to the API server
//! with a per-call timeout, and owner lookups retry a fixed number of times
//! without backoff. Nothing is cached between requests.

use std::future::Future;

use async_trait::async_trait;
use kube::api::{Api, ListParams};
use kube::{Client, ResourceExt};
use tracing::{debug, warn};

use crate::config::WebhookConfig;
use crate::crd::{AzureCluster, AzureManagedControlPlane, AzureManagedMachinePool, Cluster};
use crate::error::{Error, Result};

/// Read-only access to the objects admission decisions depend on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectReader: Send + Sync {
    /// The platform `Cluster`, `None` when it does not exist.
    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Option<Cluster>>;

    async fn get_azure_cluster(&self, namespace: &str, name: &str) -> Result<Option<AzureCluster>>;

    async fn get_managed_control_plane(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<AzureManagedControlPlane>>;

    /// Managed machine pools matching a label selector.
    async fn list_managed_machine_pools(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<AzureManagedMachinePool>>;
}

/// [`ObjectReader`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeReader {
    client: Client,
}

impl KubeReader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectReader for KubeReader {
    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Option<Cluster>> {
        let api: Api<Cluster> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_azure_cluster(&self, namespace: &str, name: &str) -> Result<Option<AzureCluster>> {
        let api: Api<AzureCluster> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_managed_control_plane(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<AzureManagedControlPlane>> {
        let api: Api<AzureManagedControlPlane> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn list_managed_machine_pools(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<AzureManagedMachinePool>> {
        let api: Api<AzureManagedMachinePool> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default().labels(label_selector)).await?;
        Ok(list.items)
    }
}

/// Run a single read under the configured timeout.
pub async fn with_timeout<T, Fut>(config: &WebhookConfig, read: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    tokio::time::timeout(config.owner_lookup_timeout, read)
        .await
        .map_err(|_| Error::Timeout(config.owner_lookup_timeout))?
}

/// GET an owner, retrying up to `config.owner_lookup_attempts` times.
///
/// Missing objects, timeouts and retryable API errors consume an attempt;
/// any other error is returned immediately.
pub async fn get_with_retry<T, F, Fut>(
    config: &WebhookConfig,
    kind: &str,
    namespace: &str,
    name: &str,
    mut get: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let attempts = config.owner_lookup_attempts.max(1);
    for attempt in 1..=attempts {
        let err = match with_timeout(config, get()).await {
            Ok(Some(obj)) => return Ok(obj),
            Ok(None) => Error::OwnerNotFound {
                kind: kind.to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            Err(e) => e,
        };
        if !err.is_retryable() {
            return Err(err);
        }
        warn!(
            kind = %kind,
            namespace = %namespace,
            name = %name,
            attempt,
            error = %err,
            "Owner lookup failed"
        );
    }
    Err(Error::LookupExhausted {
        kind: kind.to_string(),
        namespace: namespace.to_string(),
        name: name.to_string(),
        attempts,
    })
}

/// Read the platform `Cluster` named `name`.
pub async fn lookup_cluster(
    reader: &dyn ObjectReader,
    config: &WebhookConfig,
    namespace: &str,
    name: &str,
) -> Result<Cluster> {
    get_with_retry(config, "Cluster", namespace, name, || reader.get_cluster(namespace, name)).await
}

/// Subscription of the infrastructure behind the platform `Cluster` named
/// `cluster_name`: the AzureCluster for self-managed clusters, the managed
/// control plane for AKS.
pub async fn lookup_subscription_id(
    reader: &dyn ObjectReader,
    config: &WebhookConfig,
    namespace: &str,
    cluster_name: &str,
) -> Result<String> {
    let cluster = lookup_cluster(reader, config, namespace, cluster_name).await?;

    if let Some(infra) = cluster
        .spec
        .infrastructure_ref
        .as_ref()
        .filter(|r| r.kind.as_deref() == Some("AzureCluster"))
    {
        let name = infra.name.clone().unwrap_or_default();
        let ns = infra.namespace.clone().unwrap_or_else(|| namespace.to_string());
        let azure_cluster = get_with_retry(config, "AzureCluster", &ns, &name, || {
            reader.get_azure_cluster(&ns, &name)
        })
        .await?;
        debug!(cluster = %azure_cluster.name_any(), "Resolved owner AzureCluster");
        return Ok(azure_cluster.spec.class.subscription_id);
    }

    if let Some(cp) = cluster
        .spec
        .control_plane_ref
        .as_ref()
        .filter(|r| r.kind.as_deref() == Some("AzureManagedControlPlane"))
    {
        let name = cp.name.clone().unwrap_or_default();
        let ns = cp.namespace.clone().unwrap_or_else(|| namespace.to_string());
        let mcp = get_with_retry(config, "AzureManagedControlPlane", &ns, &name, || {
            reader.get_managed_control_plane(&ns, &name)
        })
        .await?;
        debug!(control_plane = %mcp.name_any(), "Resolved owner AzureManagedControlPlane");
        return Ok(mcp.spec.class.subscription_id);
    }

    Err(Error::OwnerNotFound {
        kind: "AzureCluster".to_string(),
        namespace: namespace.to_string(),
        name: cluster_name.to_string(),
    })
}
