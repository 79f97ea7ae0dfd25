//! AzureMachine, AzureMachineTemplate, AzureMachinePool and
//! AzureMachinePoolMachine.

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::Tags;
use super::vm::{
    DataDisk, Diagnostics, Image, NetworkInterface, OSDisk, SecurityProfile, SpotVMOptions,
    SystemAssignedIdentityRole, UserAssignedIdentity, VMIdentity,
};

// ============================================================================
// AzureMachine
// ============================================================================

/// A single virtual machine.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureMachine",
    plural = "azuremachines",
    namespaced,
    derive = "PartialEq",
    derive = "Default"
)]
#[serde(rename_all = "camelCase")]
pub struct AzureMachineSpec {
    #[serde(rename = "providerID", default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,

    #[serde(default)]
    pub vm_size: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_domain: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Image>,

    #[serde(default)]
    pub identity: VMIdentity,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_assigned_identities: Vec<UserAssignedIdentity>,

    /// Deprecated; use `systemAssignedIdentityRole.name`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role_assignment_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_assigned_identity_role: Option<SystemAssignedIdentityRole>,

    #[serde(default)]
    pub os_disk: OSDisk,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_disks: Vec<DataDisk>,

    /// Base64-encoded OpenSSH public key; generated when empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ssh_public_key: String,

    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub additional_tags: Tags,

    #[serde(rename = "allocatePublicIP", default)]
    pub allocate_public_ip: bool,

    #[serde(rename = "enableIPForwarding", default)]
    pub enable_ip_forwarding: bool,

    /// Deprecated; use `networkInterfaces`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerated_networking: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,

    #[serde(rename = "spotVMOptions", default, skip_serializing_if = "Option::is_none")]
    pub spot_vm_options: Option<SpotVMOptions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_profile: Option<SecurityProfile>,

    /// Deprecated; use `networkInterfaces`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subnet_name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub network_interfaces: Vec<NetworkInterface>,
}

// ============================================================================
// AzureMachineTemplate
// ============================================================================

#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureMachineTemplate",
    plural = "azuremachinetemplates",
    namespaced,
    derive = "PartialEq",
    derive = "Default"
)]
#[serde(rename_all = "camelCase")]
pub struct AzureMachineTemplateSpec {
    pub template: AzureMachineTemplateResource,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureMachineTemplateResource {
    pub spec: AzureMachineSpec,
}

// ============================================================================
// AzureMachinePool
// ============================================================================

/// VM scale set orchestration mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum OrchestrationModeType {
    Flexible,
    #[default]
    Uniform,
}

/// A scalable group of identical VMs.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureMachinePool",
    plural = "azuremachinepools",
    namespaced,
    derive = "PartialEq",
    derive = "Default"
)]
#[serde(rename_all = "camelCase")]
pub struct AzureMachinePoolSpec {
    #[serde(default)]
    pub location: String,

    #[serde(default)]
    pub template: AzureMachinePoolMachineTemplate,

    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub additional_tags: Tags,

    #[serde(rename = "providerIDList", default, skip_serializing_if = "Vec::is_empty")]
    pub provider_id_list: Vec<String>,

    #[serde(default)]
    pub identity: VMIdentity,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_assigned_identities: Vec<UserAssignedIdentity>,

    /// Deprecated; use `systemAssignedIdentityRole.name`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role_assignment_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_assigned_identity_role: Option<SystemAssignedIdentityRole>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<AzureMachinePoolDeploymentStrategy>,

    #[serde(default)]
    pub orchestration_mode: OrchestrationModeType,
}

/// Template of the VMs in a machine pool.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureMachinePoolMachineTemplate {
    #[serde(default)]
    pub vm_size: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Image>,

    #[serde(default)]
    pub os_disk: OSDisk,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_disks: Vec<DataDisk>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ssh_public_key: String,

    /// Deprecated; use `networkInterfaces`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerated_networking: Option<bool>,

    /// Minutes to wait for a terminate notification, in [5, 15].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminate_notification_timeout: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_profile: Option<SecurityProfile>,

    #[serde(rename = "spotVMOptions", default, skip_serializing_if = "Option::is_none")]
    pub spot_vm_options: Option<SpotVMOptions>,

    /// Deprecated; use `networkInterfaces`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subnet_name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub network_interfaces: Vec<NetworkInterface>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum AzureMachinePoolDeploymentStrategyType {
    #[default]
    RollingUpdate,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureMachinePoolDeploymentStrategy {
    #[serde(default)]
    pub r#type: AzureMachinePoolDeploymentStrategyType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolling_update: Option<MachineRollingUpdateDeployment>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MachineRollingUpdateDeployment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_surge: Option<IntOrString>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_unavailable: Option<IntOrString>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_policy: Option<String>,
}

// ============================================================================
// AzureMachinePoolMachine
// ============================================================================

/// A single VM inside a machine pool.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "AzureMachinePoolMachine",
    plural = "azuremachinepoolmachines",
    namespaced,
    derive = "PartialEq",
    derive = "Default"
)]
#[serde(rename_all = "camelCase")]
pub struct AzureMachinePoolMachineSpec {
    #[serde(rename = "providerID", default, skip_serializing_if = "String::is_empty")]
    pub provider_id: String,

    #[serde(rename = "instanceID", default, skip_serializing_if = "String::is_empty")]
    pub instance_id: String,
}
