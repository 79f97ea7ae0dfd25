//! Network security rules and the confidential-compute matrix.

use std::collections::HashSet;

use super::field::{ErrorList, FieldError, FieldPath};
use crate::crd::{ManagedDiskParameters, SecurityEncryptionType, SecurityProfile, SecurityRule, SecurityType};

pub const MIN_SECURITY_RULE_PRIORITY: i32 = 100;
pub const MAX_SECURITY_RULE_PRIORITY: i32 = 4096;

/// Validate the rules of a network security group.
pub fn validate_security_rules(rules: &[SecurityRule], path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    let mut names = HashSet::new();
    for (i, rule) in rules.iter().enumerate() {
        let rule_path = path.index(i);
        if rule.name.is_empty() {
            errs.push(FieldError::required(rule_path.child("name"), "security rule name cannot be empty"));
        } else if !names.insert(rule.name.as_str()) {
            errs.push(FieldError::duplicate(rule_path.child("name"), &rule.name));
        }
        errs.append(validate_security_rule(rule, &rule_path));
    }
    errs
}

/// Validate a single security rule.
pub fn validate_security_rule(rule: &SecurityRule, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    if !(MIN_SECURITY_RULE_PRIORITY..=MAX_SECURITY_RULE_PRIORITY).contains(&rule.priority) {
        errs.push(FieldError::invalid(
            path.child("priority"),
            &rule.priority,
            format!(
                "security rule's priority must be between {MIN_SECURITY_RULE_PRIORITY} and {MAX_SECURITY_RULE_PRIORITY}"
            ),
        ));
    }
    let has_source = rule.source.as_deref().is_some_and(|s| !s.is_empty());
    if has_source && !rule.sources.is_empty() {
        errs.push(FieldError::forbidden(
            path.child("sources"),
            "security rule's source and sources are mutually exclusive",
        ));
    }
    errs
}

/// Validate the confidential-compute combination of the OS disk's security
/// profile and the VM's security profile.
///
/// `profile_path` addresses `spec.securityProfile`, `disk_path` addresses
/// `spec.osDisk.managedDisk`.
pub fn validate_confidential_compute(
    managed_disk: Option<&ManagedDiskParameters>,
    profile: Option<&SecurityProfile>,
    profile_path: &FieldPath,
    disk_path: &FieldPath,
) -> ErrorList {
    let mut errs = ErrorList::new();
    let encryption = managed_disk
        .and_then(|m| m.security_profile.as_ref())
        .and_then(|p| p.security_encryption_type);

    let Some(encryption) = encryption else {
        if let Some(profile) = profile {
            if profile.security_type == Some(SecurityType::ConfidentialVM) {
                errs.push(FieldError::required(
                    disk_path.child("securityProfile").child("securityEncryptionType"),
                    "securityEncryptionType should be set when SecurityType is 'ConfidentialVM'",
                ));
            }
        }
        return errs;
    };

    let Some(profile) = profile else {
        errs.push(FieldError::required(
            profile_path.clone(),
            "securityProfile should be set when securityEncryptionType is defined",
        ));
        return errs;
    };

    if profile.security_type != Some(SecurityType::ConfidentialVM) {
        errs.push(FieldError::invalid(
            profile_path.child("securityType"),
            &profile.security_type,
            "SecurityType should be set to 'ConfidentialVM' when securityEncryptionType is defined",
        ));
    }
    if encryption == SecurityEncryptionType::DiskWithVMGuestState && profile.encryption_at_host == Some(true) {
        errs.push(FieldError::invalid(
            profile_path.child("encryptionAtHost"),
            &profile.encryption_at_host,
            "EncryptionAtHost cannot be set to 'true' when securityEncryptionType is set to 'DiskWithVMGuestState'",
        ));
    }

    let Some(uefi) = &profile.uefi_settings else {
        errs.push(FieldError::required(
            profile_path.child("uefiSettings"),
            "UefiSettings should be set when securityEncryptionType is defined",
        ));
        return errs;
    };
    if uefi.v_tpm_enabled != Some(true) {
        errs.push(FieldError::invalid(
            profile_path.child("uefiSettings").child("vTpmEnabled"),
            &uefi.v_tpm_enabled,
            "VTpmEnabled should be set to true when securityEncryptionType is defined",
        ));
    }
    if encryption == SecurityEncryptionType::DiskWithVMGuestState && uefi.secure_boot_enabled != Some(true) {
        errs.push(FieldError::invalid(
            profile_path.child("uefiSettings").child("secureBootEnabled"),
            &uefi.secure_boot_enabled,
            "SecureBootEnabled should be set to true when securityEncryptionType is set to 'DiskWithVMGuestState'",
        ));
    }
    errs
}
