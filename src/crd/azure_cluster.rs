//! AzureCluster, AzureClusterTemplate and AzureClusterIdentity.

use k8s_openapi::api::core::v1::{ObjectReference, SecretReference};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{ApiEndpoint, ExtendedLocationSpec, Tags};
use super::network::{BastionSpec, BastionTemplateSpec, NetworkSpec, NetworkTemplateSpec};

/// Cloud environments the provider can target.
pub const AZURE_ENVIRONMENTS: &[&str] = &[
    "AzurePublicCloud",
    "AzureGermanCloud",
    "AzureChinaCloud",
    "AzureUSGovernmentCloud",
];

/// Default cloud environment.
pub const DEFAULT_AZURE_ENVIRONMENT: &str = "AzurePublicCloud";

/// Settings shared by AzureCluster and its template.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureClusterClassSpec {
    #[serde(rename = "subscriptionID", default, skip_serializing_if = "String::is_empty")]
    pub subscription_id: String,

    #[serde(default)]
    pub location: String,

    /// Edge zone placement; requires the EdgeZone feature gate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_location: Option<ExtendedLocationSpec>,

    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub additional_tags: Tags,

    /// Reference to an AzureClusterIdentity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_ref: Option<ObjectReference>,

    /// Cloud environment, e.g. `AzurePublicCloud`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub azure_environment: String,
}

// ============================================================================
// AzureCluster
// ============================================================================

/// Cloud footprint of a self-managed cluster's control plane.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureCluster",
    plural = "azureclusters",
    namespaced,
    derive = "PartialEq",
    derive = "Default"
)]
#[serde(rename_all = "camelCase")]
pub struct AzureClusterSpec {
    #[serde(flatten)]
    pub class: AzureClusterClassSpec,

    #[serde(default)]
    pub network_spec: NetworkSpec,

    /// Resource group for the cluster's cloud resources.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_group: String,

    #[serde(default)]
    pub bastion_spec: BastionSpec,

    #[serde(default)]
    pub control_plane_endpoint: ApiEndpoint,
}

// ============================================================================
// AzureClusterTemplate
// ============================================================================

#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureClusterTemplate",
    plural = "azureclustertemplates",
    namespaced,
    derive = "PartialEq",
    derive = "Default"
)]
#[serde(rename_all = "camelCase")]
pub struct AzureClusterTemplateSpec {
    pub template: AzureClusterTemplateResource,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureClusterTemplateResource {
    pub spec: AzureClusterTemplateResourceSpec,
}

/// Cluster settings stamped into every cluster created from the template.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureClusterTemplateResourceSpec {
    #[serde(flatten)]
    pub class: AzureClusterClassSpec,

    #[serde(default)]
    pub network_spec: NetworkTemplateSpec,

    #[serde(default)]
    pub bastion_spec: BastionTemplateSpec,
}

// ============================================================================
// AzureClusterIdentity
// ============================================================================

/// Kind of credential an identity provides.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum IdentityType {
    #[default]
    ServicePrincipal,
    UserAssignedMSI,
    ManualServicePrincipal,
    ServicePrincipalCertificate,
    WorkloadIdentity,
    UserAssignedIdentityCredential,
}

impl IdentityType {
    /// Whether the type authenticates with a secret held in the cluster.
    pub fn needs_client_secret(&self) -> bool {
        matches!(
            self,
            IdentityType::ServicePrincipal
                | IdentityType::ManualServicePrincipal
                | IdentityType::ServicePrincipalCertificate
        )
    }
}

/// Credentials used by clusters to talk to the cloud API.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureClusterIdentity",
    plural = "azureclusteridentities",
    namespaced,
    derive = "PartialEq",
    derive = "Default"
)]
#[serde(rename_all = "camelCase")]
pub struct AzureClusterIdentitySpec {
    pub r#type: IdentityType,

    /// Resource ID of a user-assigned managed identity.
    #[serde(rename = "resourceID", default, skip_serializing_if = "String::is_empty")]
    pub resource_id: String,

    #[serde(rename = "clientID", default)]
    pub client_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<SecretReference>,

    #[serde(rename = "tenantID", default)]
    pub tenant_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_namespaces: Option<AllowedNamespaces>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AllowedNamespaces {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub list: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
}
