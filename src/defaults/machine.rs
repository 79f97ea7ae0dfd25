//! Defaulting for AzureMachine, AzureMachineTemplate and AzureMachinePool.

use std::collections::BTreeSet;

use super::CONTRIBUTOR_ROLE_ID;
use super::ssh::set_ssh_public_key_default;
use crate::crd::{
    AzureMachine, AzureMachinePool, AzureMachineTemplate, CACHING_NONE, CACHING_READ_WRITE, DataDisk,
    NetworkInterface, OSDisk, SpotEvictionPolicy, SpotVMOptions, SystemAssignedIdentityRole, VMIdentity,
};
use crate::error::Result;

/// Apply every AzureMachine default.
///
/// `subscription_id` is the owning cluster's subscription; it is only read
/// when a system-assigned identity still lacks its role scope.
pub fn set_azure_machine_defaults(machine: &mut AzureMachine, subscription_id: &str) -> Result<()> {
    let spec = &mut machine.spec;
    set_ssh_public_key_default(&mut spec.ssh_public_key)?;
    set_os_disk_caching_default(&mut spec.os_disk);
    set_data_disk_defaults(&mut spec.data_disks);
    set_network_interface_defaults(
        &mut spec.subnet_name,
        &mut spec.accelerated_networking,
        &mut spec.network_interfaces,
    );
    set_spot_eviction_policy_default(spec.spot_vm_options.as_mut(), &spec.os_disk);
    set_identity_role_defaults(
        spec.identity,
        &mut spec.role_assignment_name,
        &mut spec.system_assigned_identity_role,
        subscription_id,
    );
    Ok(())
}

/// Apply the AzureMachineTemplate defaults.
///
/// Templates never get a generated SSH key or role assignment: every machine
/// stamped from the template gets its own.
pub fn set_azure_machine_template_defaults(template: &mut AzureMachineTemplate) {
    let spec = &mut template.spec.template.spec;
    set_os_disk_caching_default(&mut spec.os_disk);
    set_data_disk_defaults(&mut spec.data_disks);
    set_network_interface_defaults(
        &mut spec.subnet_name,
        &mut spec.accelerated_networking,
        &mut spec.network_interfaces,
    );
}

/// Apply every AzureMachinePool default.
pub fn set_azure_machine_pool_defaults(pool: &mut AzureMachinePool, subscription_id: &str) -> Result<()> {
    let spec = &mut pool.spec;
    let template = &mut spec.template;
    set_ssh_public_key_default(&mut template.ssh_public_key)?;
    set_os_disk_caching_default(&mut template.os_disk);
    set_data_disk_defaults(&mut template.data_disks);
    set_network_interface_defaults(
        &mut template.subnet_name,
        &mut template.accelerated_networking,
        &mut template.network_interfaces,
    );
    set_spot_eviction_policy_default(template.spot_vm_options.as_mut(), &template.os_disk);
    set_identity_role_defaults(
        spec.identity,
        &mut spec.role_assignment_name,
        &mut spec.system_assigned_identity_role,
        subscription_id,
    );
    Ok(())
}

/// Whether defaulting would read the subscription ID of the owning cluster.
pub fn needs_subscription_id(identity: VMIdentity, role: Option<&SystemAssignedIdentityRole>) -> bool {
    identity == VMIdentity::SystemAssigned
        && role.is_none_or(|r| r.scope.is_empty() || r.definition_id.is_empty())
}

pub fn set_os_disk_caching_default(os_disk: &mut OSDisk) {
    if os_disk.caching_type.is_empty() {
        os_disk.caching_type = CACHING_NONE.to_string();
    }
}

/// Assign LUNs and caching types to data disks.
///
/// Disks without a LUN get the lowest unused one, in list order.
pub fn set_data_disk_defaults(disks: &mut [DataDisk]) {
    let mut used: BTreeSet<i32> = disks.iter().filter_map(|d| d.lun).collect();
    let mut next = 0;
    for disk in disks.iter_mut() {
        if disk.lun.is_none() {
            while used.contains(&next) {
                next += 1;
            }
            disk.lun = Some(next);
            used.insert(next);
        }
        if disk.caching_type.is_empty() {
            disk.caching_type = if disk.is_ultra_ssd() {
                CACHING_NONE.to_string()
            } else {
                CACHING_READ_WRITE.to_string()
            };
        }
    }
}

/// Move the deprecated single-NIC fields into `networkInterfaces`.
///
/// When both forms are populated nothing moves; validation rejects the
/// combination.
pub fn set_network_interface_defaults(
    subnet_name: &mut String,
    accelerated_networking: &mut Option<bool>,
    interfaces: &mut Vec<NetworkInterface>,
) {
    if interfaces.is_empty() && !subnet_name.is_empty() {
        interfaces.push(NetworkInterface {
            subnet_name: std::mem::take(subnet_name),
            private_ip_configs: 1,
            accelerated_networking: accelerated_networking.take(),
        });
    }
    for nic in interfaces.iter_mut() {
        if nic.private_ip_configs == 0 {
            nic.private_ip_configs = 1;
        }
    }
}

pub fn set_spot_eviction_policy_default(spot: Option<&mut SpotVMOptions>, os_disk: &OSDisk) {
    if let Some(spot) = spot {
        if spot.eviction_policy.is_none() {
            // Ephemeral OS disks cannot be deallocated.
            spot.eviction_policy = Some(if os_disk.is_ephemeral() {
                SpotEvictionPolicy::Delete
            } else {
                SpotEvictionPolicy::Deallocate
            });
        }
    }
}

/// Fill the role assignment of a system-assigned identity.
pub fn set_identity_role_defaults(
    identity: VMIdentity,
    role_assignment_name: &mut String,
    role: &mut Option<SystemAssignedIdentityRole>,
    subscription_id: &str,
) {
    if identity != VMIdentity::SystemAssigned {
        return;
    }
    let role = role.get_or_insert_with(SystemAssignedIdentityRole::default);
    if role.name.is_empty() {
        role.name = if role_assignment_name.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            std::mem::take(role_assignment_name)
        };
    }
    if !subscription_id.is_empty() {
        if role.scope.is_empty() {
            role.scope = format!("/subscriptions/{subscription_id}/");
        }
        if role.definition_id.is_empty() {
            role.definition_id = contributor_role_definition_id(subscription_id);
        }
    }
}

pub fn contributor_role_definition_id(subscription_id: &str) -> String {
    format!("/subscriptions/{subscription_id}/providers/Microsoft.Authorization/roleDefinitions/{CONTRIBUTOR_ROLE_ID}")
}
