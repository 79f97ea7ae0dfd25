// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Property-based tests for capz-admission.
//!
//! Uses proptest to generate random objects and verify the admission
//! invariants: defaulting is idempotent, defaulted objects validate, the
//! immutability tables only flag real changes, and a failed default leaves
//! its input untouched.

use std::sync::Arc;

use async_trait::async_trait;
use proptest::prelude::*;

use capz_admission::crd::{
    AzureCluster, AzureClusterSpec, AzureMachine, AzureMachineSpec, AzureManagedControlPlane,
    AzureManagedMachinePool, AzureManagedMachinePoolClassSpec, AzureManagedMachinePoolSpec, Cluster, DataDisk, Image,
    NodePoolMode, OSDisk, VMIdentity,
};
use capz_admission::defaults::{set_azure_cluster_defaults, set_data_disk_defaults, set_managed_machine_pool_defaults};
use capz_admission::validation::primitives::validate_version_upgrade;
use capz_admission::webhooks::immutability::{Rule, compare};
use capz_admission::webhooks::policies::cluster::{validate_cluster, validate_cluster_immutability};
use capz_admission::webhooks::policies::managed_machine_pool::validate_managed_machine_pool;
use capz_admission::{AdmissionContext, AdmissionWebhook, FeatureGates, FieldPath, ObjectReader, Result, Webhook, WebhookConfig};

mockall::mock! {
    Reader {}

    #[async_trait]
    impl ObjectReader for Reader {
        async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Option<Cluster>>;
        async fn get_azure_cluster(&self, namespace: &str, name: &str) -> Result<Option<AzureCluster>>;
        async fn get_managed_control_plane(
            &self,
            namespace: &str,
            name: &str,
        ) -> Result<Option<AzureManagedControlPlane>>;
        async fn list_managed_machine_pools(
            &self,
            namespace: &str,
            label_selector: &str,
        ) -> Result<Vec<AzureManagedMachinePool>>;
    }
}

/// Strategy for cluster names that stay valid once suffixed.
fn cluster_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,18}[a-z0-9]"
}

/// Strategy for Linux node pool names.
fn pool_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,11}"
}

fn location() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("westus2".to_string()),
        Just("eastus".to_string()),
        Just("northeurope".to_string()),
    ]
}

/// Strategy for data disks, some with explicit distinct LUNs.
fn data_disks() -> impl Strategy<Value = Vec<DataDisk>> {
    prop::collection::vec(prop::option::of(0..16i32), 0..8).prop_map(|luns| {
        let mut seen = std::collections::BTreeSet::new();
        luns.into_iter()
            .enumerate()
            .map(|(i, lun)| DataDisk {
                name_suffix: format!("disk{i}"),
                disk_size_gb: 64,
                lun: lun.filter(|l| seen.insert(*l)),
                ..Default::default()
            })
            .collect()
    })
}

fn kubernetes_version() -> impl Strategy<Value = String> {
    (1..3u32, 0..40u32, 0..20u32).prop_map(|(major, minor, patch)| format!("v{major}.{minor}.{patch}"))
}

fn azure_cluster(name: &str, location: &str) -> AzureCluster {
    let mut cluster = AzureCluster::new(name, AzureClusterSpec::default());
    cluster.metadata.namespace = Some("default".to_string());
    cluster.spec.class.location = location.to_string();
    cluster.spec.class.subscription_id = "sub".to_string();
    cluster
}

fn managed_pool(name: &str, mode: NodePoolMode) -> AzureManagedMachinePool {
    AzureManagedMachinePool::new(
        name,
        AzureManagedMachinePoolSpec {
            class: AzureManagedMachinePoolClassSpec {
                mode,
                sku: "Standard_D2s_v3".to_string(),
                ..Default::default()
            },
            ..Default::default()
        },
    )
}

fn unlabelled_machine(vm_size: &str, disks: Vec<DataDisk>) -> AzureMachine {
    AzureMachine::new(
        "m1",
        AzureMachineSpec {
            vm_size: vm_size.to_string(),
            identity: VMIdentity::SystemAssigned,
            image: Some(Image {
                id: Some("/subscriptions/sub/images/ubuntu".to_string()),
                ..Default::default()
            }),
            os_disk: OSDisk {
                os_type: "Linux".to_string(),
                disk_size_gb: Some(30),
                ..Default::default()
            },
            data_disks: disks,
            ..Default::default()
        },
    )
}

proptest! {
    /// Applying the cluster defaults twice changes nothing the first pass did not.
    #[test]
    fn cluster_defaulting_is_idempotent(name in cluster_name(), loc in location()) {
        let mut once = azure_cluster(&name, &loc);
        set_azure_cluster_defaults(&mut once);
        let mut twice = once.clone();
        set_azure_cluster_defaults(&mut twice);
        prop_assert_eq!(once, twice);
    }

    /// A defaulted cluster passes create validation.
    #[test]
    fn defaulted_cluster_is_valid(name in cluster_name(), loc in location()) {
        let mut cluster = azure_cluster(&name, &loc);
        set_azure_cluster_defaults(&mut cluster);
        let errs = validate_cluster(&cluster, &FeatureGates::default());
        prop_assert!(errs.is_empty(), "{}", errs);
    }

    /// Validation is deterministic, including error order.
    #[test]
    fn validation_order_is_stable(name in "[-_a-zA-Z0-9!]{0,70}", loc in location()) {
        let mut cluster = azure_cluster("placeholder", &loc);
        set_azure_cluster_defaults(&mut cluster);
        cluster.metadata.name = Some(name);
        let first = validate_cluster(&cluster, &FeatureGates::default());
        let second = validate_cluster(&cluster, &FeatureGates::default());
        prop_assert_eq!(first, second);
    }

    /// Resource group changes are flagged exactly when the value differs, in both directions.
    #[test]
    fn resource_group_immutability_is_symmetric(
        name in cluster_name(),
        old_rg in "[a-z]{1,10}",
        new_rg in "[a-z]{1,10}",
    ) {
        let mut old = azure_cluster(&name, "westus2");
        old.spec.resource_group = old_rg.clone();
        set_azure_cluster_defaults(&mut old);
        let mut new = old.clone();
        new.spec.resource_group = new_rg.clone();

        let forward = validate_cluster_immutability(&old, &new);
        let backward = validate_cluster_immutability(&new, &old);
        prop_assert_eq!(forward.is_empty(), old_rg == new_rg);
        prop_assert_eq!(backward.is_empty(), old_rg == new_rg);
    }

    /// Equal rules report a change at the rule path and nothing for identical values.
    #[test]
    fn equal_rule_tracks_value_changes(a in any::<i64>(), b in any::<i64>()) {
        let rules = [Rule::equal("spec.size")];
        let old = serde_json::json!({"spec": {"size": a}});
        let new = serde_json::json!({"spec": {"size": b}});
        let errs = compare(&old, &new, &FieldPath::default(), &rules);
        prop_assert_eq!(errs.is_empty(), a == b);
        if a != b {
            prop_assert_eq!(errs.iter().next().unwrap().path.to_string(), "spec.size");
        }
        prop_assert!(compare(&old, &old, &FieldPath::default(), &rules).is_empty());
    }

    /// Enable-only fields may go from unset to set but never back.
    #[test]
    fn enable_only_rule_allows_first_set(value in "[a-z]{1,8}") {
        let rules = [Rule::enable_only("spec.name")];
        let unset = serde_json::json!({"spec": {}});
        let set = serde_json::json!({"spec": {"name": value}});
        prop_assert!(compare(&unset, &set, &FieldPath::default(), &rules).is_empty());
        prop_assert_eq!(compare(&set, &unset, &FieldPath::default(), &rules).len(), 1);
    }

    /// Defaulted LUNs are unique and explicit LUNs are kept.
    #[test]
    fn data_disk_luns_are_unique(disks in data_disks()) {
        let explicit: Vec<Option<i32>> = disks.iter().map(|d| d.lun).collect();
        let mut defaulted = disks.clone();
        set_data_disk_defaults(&mut defaulted);

        let luns: Vec<i32> = defaulted.iter().map(|d| d.lun.unwrap()).collect();
        let unique: std::collections::BTreeSet<i32> = luns.iter().copied().collect();
        prop_assert_eq!(unique.len(), luns.len());
        for (before, after) in explicit.iter().zip(&luns) {
            if let Some(lun) = before {
                prop_assert_eq!(lun, after);
            }
        }
    }

    /// Defaulted managed pools are stable and valid.
    #[test]
    fn managed_pool_defaults_compose_with_validation(name in pool_name(), system in any::<bool>()) {
        let mode = if system { NodePoolMode::System } else { NodePoolMode::User };
        let mut pool = managed_pool(&name, mode);
        set_managed_machine_pool_defaults(&mut pool);
        let mut again = pool.clone();
        set_managed_machine_pool_defaults(&mut again);
        prop_assert_eq!(&pool, &again);

        let errs = validate_managed_machine_pool(&pool, &FeatureGates::default());
        prop_assert!(errs.is_empty(), "{}", errs);
    }

    /// Downgrades are rejected and upgrades or no-ops are not.
    #[test]
    fn version_downgrades_are_rejected(old in kubernetes_version(), new in kubernetes_version()) {
        let errs = validate_version_upgrade(&old, &new, &FieldPath::from_fields(&["spec", "version"]));
        let parse = |v: &str| semver::Version::parse(v.trim_start_matches('v')).unwrap();
        prop_assert_eq!(errs.is_empty(), parse(&new) >= parse(&old));
    }

    /// A default that fails leaves the object exactly as it was.
    #[test]
    fn failed_default_does_not_mutate(vm_size in "Standard_[A-Z][0-9]{1,2}s_v[3-5]", disks in data_disks()) {
        let webhook = AdmissionWebhook::new(WebhookConfig::default(), Arc::new(MockReader::new()));
        let mut machine = unlabelled_machine(&vm_size, disks);
        let before = machine.clone();

        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let result = runtime.block_on(webhook.default(&AdmissionContext::default(), &mut machine));
        prop_assert!(result.is_err());
        prop_assert_eq!(machine, before);
    }
}
