//! Resource types of the Azure infrastructure provider.
//!
//! - `AzureCluster`, `AzureClusterTemplate`, `AzureClusterIdentity`: self-managed clusters
//! - `AzureMachine`, `AzureMachineTemplate`, `AzureMachinePool`, `AzureMachinePoolMachine`: VMs
//! - `AzureManagedControlPlane`, `AzureManagedControlPlaneTemplate`, `AzureManagedCluster`,
//!   `AzureManagedMachinePool`, `AzureManagedMachinePoolTemplate`: managed Kubernetes
//! - `Cluster`: the platform's cluster, read during owner lookups
//!
//! JSON field names and enum spellings match the stored CRDs exactly.

mod azure_cluster;
mod azure_machine;
mod capi;
mod common;
mod managed_control_plane;
mod managed_machine_pool;
mod network;
mod vm;

pub use azure_cluster::*;
pub use azure_machine::*;
pub use capi::*;
pub use common::*;
pub use managed_control_plane::*;
pub use managed_machine_pool::*;
pub use network::*;
pub use vm::*;
