//! Defaulting for every resource kind.
//!
//! Defaulters fill in derived values and are idempotent: running one twice
//! gives the same object as running it once. Only key and UUID generation
//! can fail; callers default a copy and commit it on success so a failure
//! leaves the request object untouched.

pub mod cluster;
pub mod machine;
pub mod managed;
pub mod ssh;

pub use cluster::{set_azure_cluster_defaults, set_azure_cluster_template_defaults};
pub use machine::{
    needs_subscription_id, set_azure_machine_defaults, set_azure_machine_pool_defaults,
    set_azure_machine_template_defaults, set_data_disk_defaults, set_network_interface_defaults,
};
pub use managed::{
    set_managed_control_plane_defaults, set_managed_control_plane_template_defaults,
    set_managed_machine_pool_defaults, set_managed_machine_pool_template_defaults,
};

// Self-managed cluster networking.
pub const DEFAULT_VNET_CIDR: &str = "10.0.0.0/8";
pub const DEFAULT_CONTROL_PLANE_SUBNET_CIDR: &str = "10.0.0.0/16";
pub const DEFAULT_NODE_SUBNET_CIDR: &str = "10.1.0.0/16";
pub const DEFAULT_CLUSTER_SUBNET_CIDR: &str = "10.0.0.0/16";
pub const DEFAULT_INTERNAL_LB_IP_ADDRESS: &str = "10.0.0.100";
pub const DEFAULT_AZURE_BASTION_SUBNET_CIDR: &str = "10.255.255.224/27";
pub const DEFAULT_OUTBOUND_RULE_IDLE_TIMEOUT_MINUTES: i32 = 4;

// Managed (AKS) networking.
pub const DEFAULT_AKS_VNET_CIDR: &str = "10.224.0.0/12";
pub const DEFAULT_AKS_NODE_SUBNET_CIDR: &str = "10.224.0.0/16";

/// Built-in Contributor role definition.
pub const CONTRIBUTOR_ROLE_ID: &str = "b24988ac-6180-42a0-ab88-20f7382dd24c";

/// Kubernetes version used when a managed control plane omits one.
pub const DEFAULT_MANAGED_KUBERNETES_VERSION: &str = "v1.28.0";

/// CIDR of the n-th (1-based) node subnet.
pub fn node_subnet_cidr(index: usize) -> String {
    format!("10.{index}.0.0/16")
}

/// `name-n`, used for the second and later instances of a derived name.
pub(crate) fn with_index(name: &str, index: usize) -> String {
    if index > 1 {
        format!("{name}-{index}")
    } else {
        name.to_string()
    }
}
