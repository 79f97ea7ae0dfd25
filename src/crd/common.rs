//! Types shared by several resource kinds.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// API group of every provider resource.
pub const GROUP: &str = "infrastructure.cluster.x-k8s.io";

/// API version served by this admission core.
pub const VERSION: &str = "v1beta1";

/// Label carrying the owning platform Cluster's name.
pub const CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";

/// Additional tags applied to cloud resources.
pub type Tags = BTreeMap<String, String>;

/// Tag key prefix marking cloud resources created for a cluster.
pub const CLUSTER_TAG_KEY_PREFIX: &str = "sigs.k8s.io_cluster-api-provider-azure_cluster_";

/// Tag value marking a resource as owned by the cluster.
pub const RESOURCE_LIFECYCLE_OWNED: &str = "owned";

/// Whether the tags mark a resource as owned by the named cluster.
pub fn has_owned_tag(tags: &Tags, cluster_name: &str) -> bool {
    tags.get(&format!("{CLUSTER_TAG_KEY_PREFIX}{cluster_name}"))
        .is_some_and(|v| v == RESOURCE_LIFECYCLE_OWNED)
}

/// Endpoint used to reach a control plane.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiEndpoint {
    /// Hostname on which the API server is serving.
    #[serde(default)]
    pub host: String,

    /// Port on which the API server is serving.
    #[serde(default)]
    pub port: i32,
}

impl ApiEndpoint {
    pub fn is_zero(&self) -> bool {
        self.host.is_empty() && self.port == 0
    }
}

/// Extended location (edge zone) of a cluster.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedLocationSpec {
    /// Name of the extended location.
    pub name: String,

    /// Type of the extended location, e.g. `EdgeZone`.
    pub r#type: String,
}
