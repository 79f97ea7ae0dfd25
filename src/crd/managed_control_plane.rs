//! AzureManagedControlPlane, its template, and AzureManagedCluster.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ObjectReference;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{ApiEndpoint, Tags};
use super::network::LBSku;

/// Annotation prefix for custom headers sent to the managed service.
pub const CUSTOM_HEADER_ANNOTATION_PREFIX: &str = "infrastructure.cluster.x-k8s.io/custom-header-";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum NetworkPluginType {
    Azure,
    Kubenet,
    None,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum NetworkPluginMode {
    Overlay,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum NetworkPolicyType {
    Azure,
    Calico,
    Cilium,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum NetworkDataplaneType {
    Azure,
    Cilium,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ManagedControlPlaneOutboundType {
    LoadBalancer,
    #[serde(rename = "managedNATGateway")]
    ManagedNatGateway,
    #[serde(rename = "userAssignedNATGateway")]
    UserAssignedNatGateway,
    UserDefinedRouting,
}

/// Pricing tier of the managed control plane. `Paid` is a deprecated alias
/// for `Standard`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum AzureManagedControlPlaneSkuTier {
    Free,
    Paid,
    Standard,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AKSSku {
    pub tier: AzureManagedControlPlaneSkuTier,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AADProfile {
    /// Whether AAD integration is managed by the service.
    #[serde(default)]
    pub managed: bool,

    #[serde(rename = "adminGroupObjectIDs", default)]
    pub admin_group_object_ids: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddonProfile {
    pub name: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, String>,

    #[serde(default)]
    pub enabled: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerProfile {
    #[serde(rename = "managedOutboundIPs", default, skip_serializing_if = "Option::is_none")]
    pub managed_outbound_ips: Option<i32>,

    #[serde(rename = "outboundIPPrefixes", default, skip_serializing_if = "Vec::is_empty")]
    pub outbound_ip_prefixes: Vec<String>,

    #[serde(rename = "outboundIPs", default, skip_serializing_if = "Vec::is_empty")]
    pub outbound_ips: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocated_outbound_ports: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_timeout_in_minutes: Option<i32>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct APIServerAccessProfile {
    #[serde(rename = "authorizedIPRanges", default, skip_serializing_if = "Vec::is_empty")]
    pub authorized_ip_ranges: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_private_cluster: Option<bool>,

    #[serde(rename = "privateDNSZone", default, skip_serializing_if = "Option::is_none")]
    pub private_dns_zone: Option<String>,

    #[serde(rename = "enablePrivateClusterPublicFQDN", default, skip_serializing_if = "Option::is_none")]
    pub enable_private_cluster_public_fqdn: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum Expander {
    #[serde(rename = "least-waste")]
    LeastWaste,
    #[serde(rename = "most-pods")]
    MostPods,
    #[serde(rename = "priority")]
    Priority,
    #[serde(rename = "random")]
    Random,
}

/// Cluster autoscaler tuning. Values are strings as the managed service
/// expects them.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutoScalerProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance_similar_node_groups: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expander: Option<Expander>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_empty_bulk_delete: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_graceful_termination_sec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_node_provision_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_total_unready_percentage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_pod_scale_up_delay: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok_total_unready_count: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_down_delay_after_add: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_down_delay_after_delete: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_down_delay_after_failure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_down_unneeded_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_down_unready_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_down_utilization_threshold: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_nodes_with_local_storage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_nodes_with_system_pods: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ManagedControlPlaneIdentityType {
    #[default]
    SystemAssigned,
    UserAssigned,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(default)]
    pub r#type: ManagedControlPlaneIdentityType,

    #[serde(rename = "userAssignedIdentityResourceID", default, skip_serializing_if = "String::is_empty")]
    pub user_assigned_identity_resource_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OIDCIssuerProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ExtensionScopeType {
    Cluster,
    Namespace,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionScope {
    pub scope_type: ExtensionScopeType,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub release_namespace: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target_namespace: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionPlan {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub product: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub promotion_code: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

/// A cluster extension installed through the managed service.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AKSExtension {
    pub name: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config_settings: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_train: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<ExtensionPlan>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_upgrade_minor_version: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ExtensionScope>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedControlPlaneSubnet {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub cidr_block: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedControlPlaneVirtualNetwork {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub cidr_block: String,

    #[serde(default)]
    pub subnet: ManagedControlPlaneSubnet,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_group: String,
}

/// Settings shared by the managed control plane and its template.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureManagedControlPlaneClassSpec {
    /// Kubernetes version, e.g. `v1.29.2`.
    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub virtual_network: ManagedControlPlaneVirtualNetwork,

    #[serde(rename = "subscriptionID", default, skip_serializing_if = "String::is_empty")]
    pub subscription_id: String,

    #[serde(default)]
    pub location: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_ref: Option<ObjectReference>,

    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub additional_tags: Tags,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_plugin: Option<NetworkPluginType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_plugin_mode: Option<NetworkPluginMode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_policy: Option<NetworkPolicyType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_dataplane: Option<NetworkDataplaneType>,

    #[serde(rename = "dnsServiceIP", default, skip_serializing_if = "Option::is_none")]
    pub dns_service_ip: Option<String>,

    #[serde(rename = "loadBalancerSKU", default, skip_serializing_if = "Option::is_none")]
    pub load_balancer_sku: Option<LBSku>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbound_type: Option<ManagedControlPlaneOutboundType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aad_profile: Option<AADProfile>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addon_profiles: Vec<AddonProfile>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<AKSSku>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balancer_profile: Option<LoadBalancerProfile>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_server_access_profile: Option<APIServerAccessProfile>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_scaler_profile: Option<AutoScalerProfile>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub azure_environment: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<AKSExtension>,

    #[serde(rename = "oidcIssuerProfile", default, skip_serializing_if = "Option::is_none")]
    pub oidc_issuer_profile: Option<OIDCIssuerProfile>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_local_accounts: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_preview_features: Option<bool>,
}

// ============================================================================
// AzureManagedControlPlane
// ============================================================================

/// A managed Kubernetes control plane.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureManagedControlPlane",
    plural = "azuremanagedcontrolplanes",
    namespaced,
    derive = "PartialEq",
    derive = "Default"
)]
#[serde(rename_all = "camelCase")]
pub struct AzureManagedControlPlaneSpec {
    #[serde(flatten)]
    pub class: AzureManagedControlPlaneClassSpec,

    #[serde(default)]
    pub resource_group_name: String,

    /// Resource group holding the node resources, `MC_<rg>_<name>_<location>`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub node_resource_group_name: String,

    #[serde(default)]
    pub control_plane_endpoint: ApiEndpoint,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_public_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_prefix: Option<String>,
}

// ============================================================================
// AzureManagedControlPlaneTemplate
// ============================================================================

#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureManagedControlPlaneTemplate",
    plural = "azuremanagedcontrolplanetemplates",
    namespaced,
    derive = "PartialEq",
    derive = "Default"
)]
#[serde(rename_all = "camelCase")]
pub struct AzureManagedControlPlaneTemplateSpec {
    pub template: AzureManagedControlPlaneTemplateResource,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureManagedControlPlaneTemplateResource {
    pub spec: AzureManagedControlPlaneClassSpec,
}

// ============================================================================
// AzureManagedCluster
// ============================================================================

/// Couples a managed control plane to the platform's Cluster.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureManagedCluster",
    plural = "azuremanagedclusters",
    namespaced,
    derive = "PartialEq",
    derive = "Default"
)]
#[serde(rename_all = "camelCase")]
pub struct AzureManagedClusterSpec {
    #[serde(default)]
    pub control_plane_endpoint: ApiEndpoint,
}
