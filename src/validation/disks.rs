//! OS disk and data disk rules.

use std::collections::HashSet;

use serde_json::json;

use super::field::{ErrorList, FieldError, FieldPath};
use crate::crd::{
    CACHING_NONE, CACHING_TYPES, DataDisk, ManagedDiskParameters, OSDisk, STORAGE_ACCOUNT_TYPES,
    STORAGE_ACCOUNT_ULTRA_SSD, SecurityEncryptionType,
};

/// Largest disk size accepted, in GB.
pub const MAX_DISK_SIZE_GB: i32 = 2048;

fn disk_size_error(path: FieldPath, size: i32) -> FieldError {
    FieldError::invalid(
        path,
        &size,
        format!("the Disk size should be a value between 1 and {MAX_DISK_SIZE_GB}"),
    )
}

/// Validate the OS disk.
pub fn validate_os_disk(disk: &OSDisk, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();

    if let Some(size) = disk.disk_size_gb {
        if !(1..=MAX_DISK_SIZE_GB).contains(&size) {
            errs.push(disk_size_error(path.child("diskSizeGB"), size));
        }
    }
    if disk.os_type.is_empty() {
        errs.push(FieldError::required(path.child("osType"), "the OS type cannot be empty"));
    }

    errs.append(validate_caching_type(
        &disk.caching_type,
        disk.managed_disk.as_ref(),
        &path.child("cachingType"),
    ));

    if let Some(managed) = &disk.managed_disk {
        errs.append(validate_managed_disk(managed, &path.child("managedDisk"), true));
        if disk.is_ephemeral() && managed.disk_encryption_set.is_some() {
            errs.push(FieldError::invalid_omit_value(
                path.child("managedDisk").child("diskEncryptionSet"),
                "diskEncryptionSet is not supported when diffDiskSettings.option is 'Local'",
            ));
        }
    }
    errs
}

/// Validate the data disk list on create.
pub fn validate_data_disks(disks: &[DataDisk], path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    let mut names = HashSet::new();
    let mut luns = HashSet::new();

    for (i, disk) in disks.iter().enumerate() {
        let disk_path = path.index(i);

        if disk.name_suffix.is_empty() {
            errs.push(FieldError::required(
                disk_path.child("nameSuffix"),
                "the data disk name suffix cannot be empty",
            ));
        } else if !names.insert(disk.name_suffix.as_str()) {
            errs.push(FieldError::duplicate(disk_path.child("nameSuffix"), &disk.name_suffix));
        }

        if !(1..=MAX_DISK_SIZE_GB).contains(&disk.disk_size_gb) {
            errs.push(disk_size_error(disk_path.child("diskSizeGB"), disk.disk_size_gb));
        }

        if let Some(lun) = disk.lun {
            if !luns.insert(lun) {
                errs.push(FieldError::duplicate(disk_path.child("lun"), &lun));
            }
        }

        errs.append(validate_caching_type(
            &disk.caching_type,
            disk.managed_disk.as_ref(),
            &disk_path.child("cachingType"),
        ));
        if let Some(managed) = &disk.managed_disk {
            errs.append(validate_managed_disk(managed, &disk_path.child("managedDisk"), false));
        }
    }
    errs
}

/// Validate data disk changes across an update.
///
/// Disks are compared by index: the list cannot grow or shrink, the name
/// suffix and size never change, and the LUN and caching type become
/// fixed once they have a value.
pub fn validate_data_disks_update(old: &[DataDisk], new: &[DataDisk], path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    if old.len() != new.len() {
        errs.push(FieldError::immutable_with_detail(
            path.clone(),
            Some(&json!(new.len())),
            "adding/removing data disks after machine creation is not allowed",
        ));
        return errs;
    }

    for (i, (old_disk, new_disk)) in old.iter().zip(new).enumerate() {
        let disk_path = path.index(i);
        if old_disk.name_suffix != new_disk.name_suffix {
            errs.push(FieldError::immutable_with_detail(
                disk_path.child("nameSuffix"),
                Some(&json!(new_disk.name_suffix)),
                "changing the data disk name suffix after machine creation is not allowed",
            ));
        }
        if old_disk.disk_size_gb != new_disk.disk_size_gb {
            errs.push(FieldError::immutable_with_detail(
                disk_path.child("diskSizeGB"),
                Some(&json!(new_disk.disk_size_gb)),
                "changing the data disk size after machine creation is not allowed",
            ));
        }
        if let (Some(old_type), Some(new_type)) =
            (old_disk.storage_account_type(), new_disk.storage_account_type())
        {
            if old_type != new_type {
                errs.push(FieldError::immutable_with_detail(
                    disk_path.child("managedDisk").child("storageAccountType"),
                    Some(&json!(new_type)),
                    "changing the storage account type after machine creation is not allowed",
                ));
            }
        }
        if old_disk.lun.is_some() && old_disk.lun != new_disk.lun {
            errs.push(FieldError::immutable_with_detail(
                disk_path.child("lun"),
                Some(&json!(new_disk.lun)),
                "changing the data disk lun after machine creation is not allowed",
            ));
        }
        if !old_disk.caching_type.is_empty() && old_disk.caching_type != new_disk.caching_type {
            errs.push(FieldError::immutable_with_detail(
                disk_path.child("cachingType"),
                Some(&json!(new_disk.caching_type)),
                "changing the data disk caching type after machine creation is not allowed",
            ));
        }
    }
    errs
}

/// Validate a caching type; UltraSSD disks only support `None`.
///
/// An empty caching type is left for defaulting.
pub fn validate_caching_type(
    caching: &str,
    managed: Option<&ManagedDiskParameters>,
    path: &FieldPath,
) -> ErrorList {
    let mut errs = ErrorList::new();
    if caching.is_empty() {
        return errs;
    }
    let ultra = managed.is_some_and(|m| m.storage_account_type == STORAGE_ACCOUNT_ULTRA_SSD);
    if ultra && caching != CACHING_NONE {
        errs.push(FieldError::invalid(
            path.clone(),
            caching,
            "cachingType 'None' is the only supported caching type for UltraSSD_LRS",
        ));
    }
    if !CACHING_TYPES.contains(&caching) {
        errs.push(FieldError::not_supported(path.clone(), caching, CACHING_TYPES));
    }
    errs
}

/// Validate a storage account type. UltraSSD is only valid for data disks.
pub fn validate_storage_account_type(value: &str, path: &FieldPath, is_os_disk: bool) -> ErrorList {
    let mut errs = ErrorList::new();
    if value.is_empty() {
        errs.push(FieldError::required(
            path.clone(),
            "the Storage Account Type for Managed Disk cannot be empty",
        ));
        return errs;
    }
    if is_os_disk && value == STORAGE_ACCOUNT_ULTRA_SSD {
        errs.push(FieldError::invalid(
            path.clone(),
            value,
            "UltraSSD_LRS can only be used with data disks, it cannot be used with OS Disks",
        ));
    } else if !STORAGE_ACCOUNT_TYPES.contains(&value) {
        errs.push(FieldError::not_supported(path.clone(), value, STORAGE_ACCOUNT_TYPES));
    }
    errs
}

fn validate_managed_disk(managed: &ManagedDiskParameters, path: &FieldPath, is_os_disk: bool) -> ErrorList {
    let mut errs = ErrorList::new();
    // Storage type may be left to the platform default on the OS disk.
    if !managed.storage_account_type.is_empty() || !is_os_disk {
        errs.append(validate_storage_account_type(
            &managed.storage_account_type,
            &path.child("storageAccountType"),
            is_os_disk,
        ));
    }
    if let Some(profile) = &managed.security_profile {
        if profile.disk_encryption_set.is_some()
            && profile.security_encryption_type != Some(SecurityEncryptionType::DiskWithVMGuestState)
        {
            errs.push(FieldError::forbidden(
                path.child("securityProfile").child("diskEncryptionSet"),
                "diskEncryptionSet is only supported when securityEncryptionType is set to DiskWithVMGuestState",
            ));
        }
    }
    errs
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::crd::{DiffDiskOption, DiffDiskSettings, DiskEncryptionSetParameters};
    use crate::validation::field::ErrorType;

    fn disk(suffix: &str, size: i32, lun: Option<i32>) -> DataDisk {
        DataDisk {
            name_suffix: suffix.to_string(),
            disk_size_gb: size,
            lun,
            ..Default::default()
        }
    }

    fn managed(storage: &str) -> Option<ManagedDiskParameters> {
        Some(ManagedDiskParameters {
            storage_account_type: storage.to_string(),
            ..Default::default()
        })
    }

    fn path() -> FieldPath {
        FieldPath::new("spec").child("dataDisks")
    }

    #[test]
    fn test_os_disk_valid() {
        let disk = OSDisk {
            os_type: "Linux".to_string(),
            disk_size_gb: Some(30),
            managed_disk: managed("Premium_LRS"),
            caching_type: "None".to_string(),
            ..Default::default()
        };
        assert!(validate_os_disk(&disk, &FieldPath::new("osDisk")).is_empty());
    }

    #[test]
    fn test_os_disk_size_and_type() {
        let disk = OSDisk {
            disk_size_gb: Some(4096),
            ..Default::default()
        };
        let errs = validate_os_disk(&disk, &FieldPath::new("osDisk")).into_vec();
        assert_eq!(errs.len(), 2);
        assert_eq!(errs[0].path.to_string(), "osDisk.diskSizeGB");
        assert_eq!(errs[1].error_type, ErrorType::Required);
    }

    #[test]
    fn test_os_disk_rejects_ultra_ssd() {
        let disk = OSDisk {
            os_type: "Linux".to_string(),
            managed_disk: managed(STORAGE_ACCOUNT_ULTRA_SSD),
            ..Default::default()
        };
        let errs = validate_os_disk(&disk, &FieldPath::new("osDisk")).into_vec();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].path.to_string(), "osDisk.managedDisk.storageAccountType");
    }

    #[test]
    fn test_ephemeral_with_encryption_set() {
        let disk = OSDisk {
            os_type: "Linux".to_string(),
            managed_disk: Some(ManagedDiskParameters {
                disk_encryption_set: Some(DiskEncryptionSetParameters {
                    id: "des".to_string(),
                }),
                ..Default::default()
            }),
            diff_disk_settings: Some(DiffDiskSettings {
                option: DiffDiskOption::Local,
            }),
            ..Default::default()
        };
        let errs = validate_os_disk(&disk, &FieldPath::new("osDisk")).into_vec();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].path.to_string(), "osDisk.managedDisk.diskEncryptionSet");
    }

    #[test]
    fn test_data_disk_duplicates() {
        let disks = vec![disk("a", 10, Some(0)), disk("a", 10, Some(0))];
        let errs = validate_data_disks(&disks, &path()).into_vec();
        assert_eq!(errs.len(), 2);
        assert!(errs.iter().all(|e| e.error_type == ErrorType::Duplicate));
        assert_eq!(errs[0].path.to_string(), "spec.dataDisks[1].nameSuffix");
        assert_eq!(errs[1].path.to_string(), "spec.dataDisks[1].lun");
    }

    #[test]
    fn test_data_disk_size_bounds() {
        let disks = vec![disk("a", 0, None), disk("b", 2048, None), disk("c", 2049, None)];
        let errs = validate_data_disks(&disks, &path()).into_vec();
        assert_eq!(errs.len(), 2);
        assert_eq!(errs[0].path.to_string(), "spec.dataDisks[0].diskSizeGB");
        assert_eq!(errs[1].path.to_string(), "spec.dataDisks[2].diskSizeGB");
    }

    #[test]
    fn test_ultra_ssd_requires_caching_none() {
        let mut d = disk("a", 10, None);
        d.managed_disk = managed(STORAGE_ACCOUNT_ULTRA_SSD);
        d.caching_type = "ReadWrite".to_string();
        let errs = validate_data_disks(&[d.clone()], &path());
        assert_eq!(errs.len(), 1);

        d.caching_type = "None".to_string();
        assert!(validate_data_disks(&[d], &path()).is_empty());
    }

    #[test]
    fn test_unsupported_caching_and_storage() {
        let mut d = disk("a", 10, None);
        d.managed_disk = managed("Fancy_LRS");
        d.caching_type = "Sometimes".to_string();
        let errs = validate_data_disks(&[d], &path()).into_vec();
        assert_eq!(errs.len(), 2);
        assert!(errs.iter().all(|e| e.error_type == ErrorType::NotSupported));
    }

    #[test]
    fn test_data_disk_update_rules() {
        let old = vec![disk("a", 10, Some(0)), disk("b", 10, None)];

        let mut new = old.clone();
        new[1].lun = Some(1);
        new[1].caching_type = "ReadWrite".to_string();
        assert!(validate_data_disks_update(&old, &new, &path()).is_empty());

        let mut resized = old.clone();
        resized[0].disk_size_gb = 20;
        resized[0].lun = Some(3);
        let errs = validate_data_disks_update(&old, &resized, &path()).into_vec();
        assert_eq!(errs.len(), 2);
        assert_eq!(errs[0].path.to_string(), "spec.dataDisks[0].diskSizeGB");
        assert_eq!(errs[1].path.to_string(), "spec.dataDisks[0].lun");

        let added = vec![disk("a", 10, Some(0))];
        let errs = validate_data_disks_update(&old, &added, &path()).into_vec();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].error_type, ErrorType::Immutable);
    }
}
