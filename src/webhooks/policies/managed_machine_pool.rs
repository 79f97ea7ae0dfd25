//! AzureManagedMachinePool and AzureManagedMachinePoolTemplate policies.
//!
//! Besides the create and update tables, managed node pools carry the
//! last-system-pool guard: a cluster must keep at least one System pool
//! until the cluster itself goes away.

use std::sync::LazyLock;

use kube::ResourceExt;
use regex::Regex;

use super::machine_pool::machine_pool_gate_error;
use super::{spec_path, template_spec_path};
use crate::config::FeatureGates;
use crate::crd::{
    AzureManagedMachinePool, AzureManagedMachinePoolClassSpec, AzureManagedMachinePoolTemplate, Cluster,
    MOVE_TO_DELETE_ANNOTATION, NodePoolMode, OSType, RESERVED_NODE_LABEL_PREFIX, Tags, Taint,
};
use crate::defaults::set_managed_machine_pool_template_defaults;
use crate::validation::kubelet::{validate_kubelet_config, validate_linux_os_config};
use crate::validation::primitives::{validate_range, validate_subnet_name};
use crate::validation::{ErrorList, FieldError, FieldPath};
use crate::webhooks::immutability::{Rule, check_unchanged, compare, template_immutable_detail};

/// Bounds of `maxPods`.
pub const MIN_MAX_PODS: i32 = 10;
pub const MAX_MAX_PODS: i32 = 250;

static LINUX_POOL_NAME_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]{0,11}$").ok());

static WINDOWS_POOL_NAME_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]{0,5}$").ok());

static TAINT_KEY_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"^([a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*/)?[A-Za-z0-9]([-A-Za-z0-9_.]{0,61}[A-Za-z0-9])?$",
    )
    .ok()
});

/// Validate an AzureManagedMachinePool.
pub fn validate_managed_machine_pool(pool: &AzureManagedMachinePool, gates: &FeatureGates) -> ErrorList {
    let path = spec_path();
    if let Some(err) = machine_pool_gate_error(gates, path.clone()) {
        return ErrorList::from(err);
    }
    validate_pool_class(&pool.spec.class, &pool.name_any(), &path)
}

/// Validate an AzureManagedMachinePoolTemplate.
pub fn validate_managed_machine_pool_template(
    template: &AzureManagedMachinePoolTemplate,
    gates: &FeatureGates,
) -> ErrorList {
    if let Some(err) = machine_pool_gate_error(gates, spec_path()) {
        return ErrorList::from(err);
    }
    validate_pool_class(&template.spec.template.spec, &template.name_any(), &template_spec_path())
}

fn validate_pool_class(class: &AzureManagedMachinePoolClassSpec, object_name: &str, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    let os_type = class.os_type.unwrap_or(OSType::Linux);

    let name = class.name.as_deref().filter(|n| !n.is_empty()).unwrap_or(object_name);
    errs.append(validate_pool_name(name, os_type, &path.child("name")));

    if class.mode == NodePoolMode::System && os_type == OSType::Windows {
        errs.push(FieldError::forbidden(
            path.child("osType"),
            "System node pools must have OSType 'Linux'",
        ));
    }
    if let Some(max_pods) = class.max_pods {
        errs.append(validate_range(
            i64::from(max_pods),
            i64::from(MIN_MAX_PODS),
            i64::from(MAX_MAX_PODS),
            &path.child("maxPods"),
            "MaxPods must be between 10 and 250",
        ));
    }
    if let Some(scaling) = &class.scaling
        && let (Some(min), Some(max)) = (scaling.min_size, scaling.max_size)
        && min > max
    {
        errs.push(FieldError::invalid(
            path.child("scaling").child("minSize"),
            &min,
            "MinSize cannot be greater than MaxSize",
        ));
    }
    errs.append(validate_taints(&class.taints, &path.child("taints")));
    errs.append(validate_node_labels(&class.node_labels, &path.child("nodeLabels")));

    if class.node_public_ip_prefix_id.as_deref().is_some_and(|id| !id.is_empty())
        && class.enable_node_public_ip != Some(true)
    {
        errs.push(FieldError::invalid(
            path.child("nodePublicIPPrefixID"),
            &class.node_public_ip_prefix_id,
            "must be nil if EnableNodePublicIP is not set to true",
        ));
    }
    if let Some(subnet) = class.subnet_name.as_deref() {
        errs.append(validate_subnet_name(subnet, &path.child("subnetName")));
    }

    if let Some(kubelet) = &class.kubelet_config {
        errs.append(validate_kubelet_config(kubelet, &path.child("kubeletConfig")));
    }
    if let Some(linux) = &class.linux_os_config {
        let linux_path = path.child("linuxOSConfig");
        if os_type == OSType::Windows {
            errs.push(FieldError::forbidden(
                linux_path.clone(),
                "linuxOSConfig can only be set for the Linux OS type",
            ));
        }
        errs.append(validate_linux_os_config(linux, class.kubelet_config.as_ref(), &linux_path));
    }
    errs
}

fn validate_pool_name(name: &str, os_type: OSType, path: &FieldPath) -> ErrorList {
    let (re, limit) = match os_type {
        OSType::Linux => (&LINUX_POOL_NAME_RE, 12),
        OSType::Windows => (&WINDOWS_POOL_NAME_RE, 6),
    };
    let mut errs = ErrorList::new();
    if !re.as_ref().is_some_and(|re| re.is_match(name)) {
        errs.push(FieldError::invalid(
            path.clone(),
            name,
            format!(
                "name must start with a lowercase letter, contain only lowercase alphanumerics and be at most {limit} characters for {os_type:?} node pools"
            ),
        ));
    }
    errs
}

fn validate_taints(taints: &[Taint], path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    for (i, taint) in taints.iter().enumerate() {
        if !TAINT_KEY_RE.as_ref().is_some_and(|re| re.is_match(&taint.key)) {
            errs.push(FieldError::invalid(
                path.index(i).child("key"),
                &taint.key,
                "taint key must be a qualified name",
            ));
        }
        if taint.value.len() > 63 {
            errs.push(FieldError::invalid(
                path.index(i).child("value"),
                &taint.value,
                "must be no more than 63 characters",
            ));
        }
    }
    errs
}

fn validate_node_labels(labels: &Tags, path: &FieldPath) -> ErrorList {
    labels
        .keys()
        .filter(|k| k.starts_with(RESERVED_NODE_LABEL_PREFIX))
        .map(|k| {
            FieldError::invalid(
                path.key(k),
                k,
                format!("node label key must not start with {RESERVED_NODE_LABEL_PREFIX}"),
            )
        })
        .collect()
}

fn managed_machine_pool_rules() -> Vec<Rule> {
    vec![
        Rule::equal("spec.name"),
        Rule::equal("spec.sku"),
        Rule::equal("spec.osType"),
        Rule::equal("spec.osDiskSizeGB"),
        Rule::equal("spec.maxPods"),
        Rule::equal("spec.osDiskType"),
        Rule::equal("spec.enableUltraSSD"),
        Rule::equal("spec.enableNodePublicIP"),
        Rule::equal("spec.nodePublicIPPrefixID"),
        Rule::equal("spec.scaleSetPriority"),
        Rule::equal("spec.enableFIPS"),
        Rule::equal("spec.enableEncryptionAtHost"),
        Rule::equal("spec.kubeletConfig"),
        Rule::equal("spec.kubeletDiskType"),
        Rule::equal("spec.linuxOSConfig"),
        Rule::enable_only("spec.subnetName"),
    ]
}

/// Immutability rules of an AzureManagedMachinePool update.
///
/// The mode transition is checked separately by the adapter, which has to
/// read the cluster's other pools.
pub fn validate_managed_machine_pool_immutability(
    old: &AzureManagedMachinePool,
    new: &AzureManagedMachinePool,
) -> ErrorList {
    let path = spec_path();
    let mut errs = compare(old, new, &FieldPath::default(), &managed_machine_pool_rules());

    let mut old_zones = old.spec.class.availability_zones.clone();
    let mut new_zones = new.spec.class.availability_zones.clone();
    old_zones.sort();
    new_zones.sort();
    if old_zones != new_zones {
        let value = serde_json::to_value(&new.spec.class.availability_zones).ok();
        errs.push(FieldError::immutable(path.child("availabilityZones"), value.as_ref()));
    }

    let old_labels = &old.spec.class.node_labels;
    for (key, value) in &new.spec.class.node_labels {
        if key.starts_with(RESERVED_NODE_LABEL_PREFIX) && old_labels.get(key) != Some(value) {
            errs.push(FieldError::invalid(
                path.child("nodeLabels").key(key),
                key,
                format!("cannot add or modify node labels with the {RESERVED_NODE_LABEL_PREFIX} prefix"),
            ));
        }
    }
    errs
}

/// Immutability of an AzureManagedMachinePoolTemplate: the whole embedded
/// spec is frozen.
pub fn validate_managed_machine_pool_template_immutability(
    old: &AzureManagedMachinePoolTemplate,
    new: &AzureManagedMachinePoolTemplate,
) -> ErrorList {
    let mut old = old.clone();
    set_managed_machine_pool_template_defaults(&mut old);
    check_unchanged(
        &old.spec.template.spec,
        &new.spec.template.spec,
        template_spec_path(),
        &template_immutable_detail("AzureManagedMachinePoolTemplate"),
    )
}

/// Whether leaving the System set must be checked against the cluster's
/// remaining System pools.
///
/// `pool` is the pool as stored. The guard is off when the owner is gone or
/// being deleted, and for pools being moved to another management cluster.
pub fn system_pool_guard_applies(pool: &AzureManagedMachinePool, owner: Option<&Cluster>) -> bool {
    pool.spec.class.mode == NodePoolMode::System
        && !pool.annotations().contains_key(MOVE_TO_DELETE_ANNOTATION)
        && owner.is_some_and(|cluster| !cluster.is_deleting())
}

/// The last-system-pool rule, given how many System pools the owning
/// cluster has, the pool itself included.
pub fn validate_last_system_pool(system_pools: usize) -> ErrorList {
    let mut errs = ErrorList::new();
    if system_pools <= 1 {
        errs.push(FieldError::forbidden(
            spec_path().child("mode"),
            "AKS Cluster must have at least one system pool",
        ));
    }
    errs
}
