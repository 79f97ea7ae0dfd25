//! Boot diagnostics and network interface rules shared by machines and
//! machine pools.

use super::field::{ErrorList, FieldError, FieldPath};
use crate::crd::{BootDiagnosticsStorageAccountType, Diagnostics, NetworkInterface};

/// Validate boot diagnostics.
///
/// User-managed storage requires a storage URI; any other storage type
/// must not carry user-managed settings.
pub fn validate_diagnostics(diagnostics: Option<&Diagnostics>, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    let Some(boot) = diagnostics.and_then(|d| d.boot.as_ref()) else {
        return errs;
    };
    let boot_path = path.child("boot");
    match boot.storage_account_type {
        Some(BootDiagnosticsStorageAccountType::UserManaged) => {
            let uri = boot.user_managed.as_ref().map(|u| u.storage_account_uri.as_str());
            if uri.is_none_or(str::is_empty) {
                errs.push(FieldError::required(
                    boot_path.child("userManaged").child("storageAccountURI"),
                    "StorageAccountURI cannot be empty when storageAccountType is UserManaged",
                ));
            }
        }
        Some(other) => {
            if boot.user_managed.is_some() {
                errs.push(FieldError::forbidden(
                    boot_path.child("userManaged"),
                    format!("userManaged must not be set when storageAccountType is {other:?}"),
                ));
            }
        }
        None => {
            errs.push(FieldError::required(
                boot_path.child("storageAccountType"),
                "storageAccountType is required when boot diagnostics are configured",
            ));
        }
    }
    errs
}

/// Validate network interfaces against the deprecated single-NIC fields.
pub fn validate_network_interfaces(
    interfaces: &[NetworkInterface],
    deprecated_subnet_name: &str,
    deprecated_accelerated_networking: Option<bool>,
    spec_path: &FieldPath,
) -> ErrorList {
    let mut errs = ErrorList::new();
    if !interfaces.is_empty() {
        if !deprecated_subnet_name.is_empty() {
            errs.push(FieldError::invalid(
                spec_path.child("subnetName"),
                deprecated_subnet_name,
                "cannot set both networkInterfaces and machine subnetName",
            ));
        }
        if deprecated_accelerated_networking.is_some() {
            errs.push(FieldError::invalid(
                spec_path.child("acceleratedNetworking"),
                &deprecated_accelerated_networking,
                "cannot set both networkInterfaces and machine acceleratedNetworking",
            ));
        }
    }
    let nics_path = spec_path.child("networkInterfaces");
    for (i, nic) in interfaces.iter().enumerate() {
        if nic.private_ip_configs < 1 {
            errs.push(FieldError::invalid(
                nics_path.index(i).child("privateIPConfigs"),
                &nic.private_ip_configs,
                "number of privateIPConfigs per interface must be at least 1",
            ));
        }
    }
    errs
}

/// Warnings for deprecated VM fields still in use.
///
/// `nic_path` is where `networkInterfaces` lives, `spec_path` holds the
/// identity fields.
pub fn deprecated_field_warnings(
    nic_path: &FieldPath,
    subnet_name: &str,
    accelerated_networking: Option<bool>,
    spec_path: &FieldPath,
    role_assignment_name: &str,
) -> Vec<String> {
    let mut warnings = Vec::new();
    if !subnet_name.is_empty() {
        warnings.push(format!(
            "{nic_path}.subnetName is deprecated, use {nic_path}.networkInterfaces instead"
        ));
    }
    if accelerated_networking.is_some() {
        warnings.push(format!(
            "{nic_path}.acceleratedNetworking is deprecated, use {nic_path}.networkInterfaces[].acceleratedNetworking instead"
        ));
    }
    if !role_assignment_name.is_empty() {
        warnings.push(format!(
            "{spec_path}.roleAssignmentName is deprecated, use {spec_path}.systemAssignedIdentityRole.name instead"
        ));
    }
    warnings
}
