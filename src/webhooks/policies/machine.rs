//! AzureMachine and AzureMachineTemplate policies.

use super::{spec_path, template_spec_path};
use crate::crd::{AzureMachine, AzureMachineSpec, AzureMachineTemplate, NetworkInterface};
use crate::defaults::{set_azure_machine_template_defaults, set_network_interface_defaults};
use crate::validation::disks::{validate_data_disks, validate_data_disks_update, validate_os_disk};
use crate::validation::identity::validate_vm_identity;
use crate::validation::image::validate_image;
use crate::validation::primitives::validate_ssh_key;
use crate::validation::security::validate_confidential_compute;
use crate::validation::vm::{deprecated_field_warnings, validate_diagnostics, validate_network_interfaces};
use crate::validation::{ErrorList, FieldError, FieldPath};
use crate::webhooks::immutability::{Rule, check_unchanged, compare, template_immutable_detail};

/// Rules shared by machines and machine templates, rooted at `path`.
///
/// Templates leave the SSH key empty for the machines stamped from them,
/// so only a key that is present is checked there.
pub fn validate_machine_spec(spec: &AzureMachineSpec, path: &FieldPath, require_ssh_key: bool) -> ErrorList {
    let mut errs = validate_image(spec.image.as_ref(), &path.child("image"));
    if require_ssh_key || !spec.ssh_public_key.is_empty() {
        errs.append(validate_ssh_key(&spec.ssh_public_key, &path.child("sshPublicKey")));
    }

    let os_disk_path = path.child("osDisk");
    errs.append(validate_os_disk(&spec.os_disk, &os_disk_path));
    errs.append(validate_data_disks(&spec.data_disks, &path.child("dataDisks")));
    errs.append(validate_vm_identity(
        spec.identity,
        &spec.user_assigned_identities,
        &spec.role_assignment_name,
        spec.system_assigned_identity_role.as_ref(),
        path,
    ));
    errs.append(validate_network_interfaces(
        &spec.network_interfaces,
        &spec.subnet_name,
        spec.accelerated_networking,
        path,
    ));
    errs.append(validate_diagnostics(spec.diagnostics.as_ref(), &path.child("diagnostics")));
    errs.append(validate_confidential_compute(
        spec.os_disk.managed_disk.as_ref(),
        spec.security_profile.as_ref(),
        &path.child("securityProfile"),
        &os_disk_path.child("managedDisk"),
    ));
    errs
}

/// Warnings for deprecated fields still set on a machine spec.
pub fn machine_warnings(spec: &AzureMachineSpec) -> Vec<String> {
    let path = spec_path();
    deprecated_field_warnings(
        &path,
        &spec.subnet_name,
        spec.accelerated_networking,
        &path,
        &spec.role_assignment_name,
    )
}

/// Warnings for deprecated fields on an AzureMachineTemplate.
pub fn machine_template_warnings(template: &AzureMachineTemplate) -> Vec<String> {
    let spec = &template.spec.template.spec;
    let path = template_spec_path();
    deprecated_field_warnings(&path, &spec.subnet_name, spec.accelerated_networking, &path, &spec.role_assignment_name)
}

/// Validate an AzureMachine.
pub fn validate_machine(machine: &AzureMachine) -> ErrorList {
    validate_machine_spec(&machine.spec, &spec_path(), true)
}

/// Validate an AzureMachineTemplate.
pub fn validate_machine_template(template: &AzureMachineTemplate) -> ErrorList {
    let spec = &template.spec.template.spec;
    let path = template_spec_path();
    let mut errs = validate_machine_spec(spec, &path, false);
    if !spec.role_assignment_name.is_empty() {
        errs.push(FieldError::forbidden(
            path.child("roleAssignmentName"),
            "AzureMachineTemplate spec.template.spec.roleAssignmentName field can't be set",
        ));
    }
    errs
}

// ============================================================================
// Update
// ============================================================================

// true -> unset and false -> unset are both migrations to networkInterfaces.
fn accelerated_networking_compared(_old: &serde_json::Value, new: &serde_json::Value) -> bool {
    !new.is_null()
}

fn machine_rules() -> Vec<Rule> {
    vec![
        Rule::equal("spec.image"),
        Rule::equal("spec.identity"),
        Rule::equal("spec.userAssignedIdentities"),
        Rule::equal("spec.roleAssignmentName"),
        Rule::equal("spec.systemAssignedIdentityRole"),
        Rule::equal("spec.osDisk"),
        Rule::equal("spec.sshPublicKey"),
        Rule::equal("spec.allocatePublicIP"),
        Rule::equal("spec.enableIPForwarding"),
        Rule::conditional("spec.acceleratedNetworking", accelerated_networking_compared),
        Rule::equal("spec.spotVMOptions"),
        Rule::equal("spec.securityProfile"),
        // Diagnostics may be added later; once present, even empty, they are fixed.
        Rule::enable_only("spec.diagnostics"),
    ]
}

fn network_interface_rules() -> Vec<Rule> {
    vec![
        Rule::enable_only("subnetName"),
        Rule::equal("privateIPConfigs"),
        Rule::equal("acceleratedNetworking"),
    ]
}

/// Interfaces as defaulting leaves them, deprecated fields migrated.
fn normalized_interfaces(spec: &AzureMachineSpec) -> Vec<NetworkInterface> {
    let mut subnet_name = spec.subnet_name.clone();
    let mut accelerated = spec.accelerated_networking;
    let mut interfaces = spec.network_interfaces.clone();
    set_network_interface_defaults(&mut subnet_name, &mut accelerated, &mut interfaces);
    interfaces
}

fn validate_network_interfaces_update(old: &AzureMachineSpec, new: &AzureMachineSpec) -> ErrorList {
    let path = spec_path().child("networkInterfaces");
    let old_nics = normalized_interfaces(old);
    let new_nics = normalized_interfaces(new);
    if old_nics.len() != new_nics.len() {
        let value = serde_json::to_value(&new.network_interfaces).ok();
        return ErrorList::from(FieldError::immutable_with_detail(
            path,
            value.as_ref(),
            "adding/removing network interfaces after machine creation is not allowed",
        ));
    }
    let rules = network_interface_rules();
    old_nics
        .iter()
        .zip(&new_nics)
        .enumerate()
        .flat_map(|(i, (o, n))| compare(o, n, &path.index(i), &rules))
        .collect()
}

/// Immutability rules of an AzureMachine update.
pub fn validate_machine_immutability(old: &AzureMachine, new: &AzureMachine) -> ErrorList {
    let mut errs = compare(old, new, &FieldPath::default(), &machine_rules());
    errs.append(validate_data_disks_update(
        &old.spec.data_disks,
        &new.spec.data_disks,
        &spec_path().child("dataDisks"),
    ));
    errs.append(validate_network_interfaces_update(&old.spec, &new.spec));
    errs
}

/// Immutability rule of an AzureMachineTemplate update: the template spec
/// is frozen.
pub fn validate_machine_template_immutability(old: &AzureMachineTemplate, new: &AzureMachineTemplate) -> ErrorList {
    if old.spec.template.spec == new.spec.template.spec {
        return ErrorList::new();
    }
    let mut old = old.clone();
    set_azure_machine_template_defaults(&mut old);
    check_unchanged(
        &old.spec.template.spec,
        &new.spec.template.spec,
        template_spec_path(),
        &template_immutable_detail("AzureMachineTemplate"),
    )
}
