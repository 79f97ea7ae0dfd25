//! Virtual machine value objects shared by machines, machine templates and
//! machine pools.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ============================================================================
// Image
// ============================================================================

/// Image a VM boots from.
///
/// On the wire this is a one-of: exactly one of the fields may be set. Use
/// [`Image::source`] to work with the closed variant.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    /// Raw image resource identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Image from a shared image gallery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_gallery: Option<AzureSharedGalleryImage>,

    /// Marketplace image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketplace: Option<AzureMarketplaceImage>,

    /// Image from a compute gallery (shared or community).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_gallery: Option<AzureComputeGalleryImage>,
}

/// Closed view over the image one-of.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ImageSource<'a> {
    Id(&'a str),
    SharedGallery(&'a AzureSharedGalleryImage),
    Marketplace(&'a AzureMarketplaceImage),
    ComputeGallery(&'a AzureComputeGalleryImage),
}

/// Why an [`Image`] does not resolve to a single source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageSourceError {
    /// No variant is set.
    Empty,
    /// More than one variant is set.
    TooManyDetails,
}

impl Image {
    /// Resolve the one-of into its single variant.
    pub fn source(&self) -> Result<ImageSource<'_>, ImageSourceError> {
        let mut found = Vec::with_capacity(1);
        if let Some(id) = &self.id {
            found.push(ImageSource::Id(id));
        }
        if let Some(sig) = &self.shared_gallery {
            found.push(ImageSource::SharedGallery(sig));
        }
        if let Some(mp) = &self.marketplace {
            found.push(ImageSource::Marketplace(mp));
        }
        if let Some(cg) = &self.compute_gallery {
            found.push(ImageSource::ComputeGallery(cg));
        }
        match found.as_slice() {
            [] => Err(ImageSourceError::Empty),
            [only] => Ok(*only),
            _ => Err(ImageSourceError::TooManyDetails),
        }
    }
}

/// Publisher, offer and SKU of a marketplace plan.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImagePlan {
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub offer: String,
    #[serde(default)]
    pub sku: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureMarketplaceImage {
    #[serde(flatten)]
    pub plan: ImagePlan,

    #[serde(default)]
    pub version: String,

    /// Whether the image requires plan information at VM creation.
    #[serde(default)]
    pub third_party_image: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureSharedGalleryImage {
    #[serde(rename = "subscriptionID", default)]
    pub subscription_id: String,
    #[serde(default)]
    pub resource_group: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub gallery: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureComputeGalleryImage {
    #[serde(default)]
    pub gallery: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,

    /// Subscription of a private gallery; set together with `resourceGroup`.
    #[serde(rename = "subscriptionID", default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,

    /// Resource group of a private gallery; set together with `subscriptionID`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<ImagePlan>,
}

// ============================================================================
// Disks
// ============================================================================

/// Storage account types accepted for managed disks.
pub const STORAGE_ACCOUNT_TYPES: &[&str] = &[
    "Standard_LRS",
    "Premium_LRS",
    "StandardSSD_LRS",
    "UltraSSD_LRS",
    "Premium_ZRS",
    "StandardSSD_ZRS",
    "PremiumV2_LRS",
];

pub const STORAGE_ACCOUNT_ULTRA_SSD: &str = "UltraSSD_LRS";

/// Caching types accepted for disks.
pub const CACHING_TYPES: &[&str] = &["None", "ReadOnly", "ReadWrite"];

pub const CACHING_NONE: &str = "None";
pub const CACHING_READ_WRITE: &str = "ReadWrite";

/// Operating system disk of a VM.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OSDisk {
    #[serde(default)]
    pub os_type: String,

    #[serde(rename = "diskSizeGB", default, skip_serializing_if = "Option::is_none")]
    pub disk_size_gb: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_disk: Option<ManagedDiskParameters>,

    /// Ephemeral OS disk settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_disk_settings: Option<DiffDiskSettings>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub caching_type: String,
}

impl OSDisk {
    /// Whether the OS disk is ephemeral (local to the host).
    pub fn is_ephemeral(&self) -> bool {
        self.diff_disk_settings
            .as_ref()
            .is_some_and(|d| d.option == DiffDiskOption::Local)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedDiskParameters {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub storage_account_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_encryption_set: Option<DiskEncryptionSetParameters>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_profile: Option<VMDiskSecurityProfile>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiskEncryptionSetParameters {
    #[serde(default)]
    pub id: String,
}

/// Disk-level security settings for confidential VMs.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VMDiskSecurityProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_encryption_set: Option<DiskEncryptionSetParameters>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_encryption_type: Option<SecurityEncryptionType>,
}

/// Encryption applied to a confidential VM's OS disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum SecurityEncryptionType {
    VMGuestStateOnly,
    DiskWithVMGuestState,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiffDiskSettings {
    pub option: DiffDiskOption,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum DiffDiskOption {
    #[default]
    Local,
}

/// A data disk attached to a VM.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataDisk {
    /// Suffix appended to the machine name to build the disk name.
    pub name_suffix: String,

    #[serde(rename = "diskSizeGB")]
    pub disk_size_gb: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_disk: Option<ManagedDiskParameters>,

    /// Logical unit number; assigned during defaulting when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lun: Option<i32>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub caching_type: String,
}

impl DataDisk {
    pub fn storage_account_type(&self) -> Option<&str> {
        self.managed_disk
            .as_ref()
            .map(|m| m.storage_account_type.as_str())
            .filter(|s| !s.is_empty())
    }

    pub fn is_ultra_ssd(&self) -> bool {
        self.storage_account_type() == Some(STORAGE_ACCOUNT_ULTRA_SSD)
    }
}

// ============================================================================
// Security profile
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum SecurityType {
    TrustedLaunch,
    ConfidentialVM,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecurityProfile {
    /// Host-level encryption of all disks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_at_host: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_type: Option<SecurityType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uefi_settings: Option<UefiSettings>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UefiSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_boot_enabled: Option<bool>,

    #[serde(rename = "vTpmEnabled", default, skip_serializing_if = "Option::is_none")]
    pub v_tpm_enabled: Option<bool>,
}

// ============================================================================
// Spot, identity, diagnostics, networking
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum SpotEvictionPolicy {
    Deallocate,
    Delete,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SpotVMOptions {
    /// Maximum hourly price, as a decimal string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eviction_policy: Option<SpotEvictionPolicy>,
}

/// Managed identity attached to a VM.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum VMIdentity {
    #[default]
    None,
    SystemAssigned,
    UserAssigned,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserAssignedIdentity {
    #[serde(rename = "providerID")]
    pub provider_id: String,
}

/// Role assignment created for a system-assigned identity.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SystemAssignedIdentityRole {
    /// Role assignment name; a UUID.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scope: String,

    #[serde(rename = "definitionID", default, skip_serializing_if = "String::is_empty")]
    pub definition_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot: Option<BootDiagnostics>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum BootDiagnosticsStorageAccountType {
    Managed,
    UserManaged,
    Disabled,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BootDiagnostics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_account_type: Option<BootDiagnosticsStorageAccountType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_managed: Option<UserManagedBootDiagnostics>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserManagedBootDiagnostics {
    #[serde(rename = "storageAccountURI", default)]
    pub storage_account_uri: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subnet_name: String,

    /// Number of private IP configurations; at least one.
    #[serde(rename = "privateIPConfigs", default)]
    pub private_ip_configs: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerated_networking: Option<bool>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_image_source_resolution() {
        let image = Image {
            id: Some("/subscriptions/x/images/y".to_string()),
            ..Default::default()
        };
        assert!(matches!(image.source(), Ok(ImageSource::Id(_))));

        assert_eq!(Image::default().source(), Err(ImageSourceError::Empty));

        let both = Image {
            marketplace: Some(AzureMarketplaceImage::default()),
            shared_gallery: Some(AzureSharedGalleryImage::default()),
            ..Default::default()
        };
        assert_eq!(both.source(), Err(ImageSourceError::TooManyDetails));
    }

    #[test]
    fn test_image_wire_format() {
        let image: Image = serde_json::from_value(serde_json::json!({
            "marketplace": {
                "publisher": "cncf-upstream",
                "offer": "capi",
                "sku": "ubuntu-2204",
                "version": "latest"
            }
        }))
        .unwrap();
        let Ok(ImageSource::Marketplace(mp)) = image.source() else {
            panic!("expected marketplace image");
        };
        assert_eq!(mp.plan.offer, "capi");
        assert!(!mp.third_party_image);
    }

    #[test]
    fn test_ephemeral_os_disk() {
        let disk = OSDisk {
            diff_disk_settings: Some(DiffDiskSettings {
                option: DiffDiskOption::Local,
            }),
            ..Default::default()
        };
        assert!(disk.is_ephemeral());
        assert!(!OSDisk::default().is_ephemeral());
    }
}
