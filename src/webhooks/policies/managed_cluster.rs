//! AzureManagedCluster policy.
//!
//! The managed cluster is a thin wrapper; its only state is the endpoint the
//! control plane reports and the custom headers sent with AKS requests.

use std::collections::BTreeMap;

use kube::ResourceExt;

use super::machine_pool::machine_pool_gate_error;
use super::{metadata_name_path, spec_path};
use crate::config::FeatureGates;
use crate::crd::{AzureManagedCluster, CUSTOM_HEADER_ANNOTATION_PREFIX};
use crate::validation::primitives::validate_cluster_name;
use crate::validation::{ErrorList, FieldPath, FieldError};
use crate::webhooks::immutability::{Rule, compare};

/// Validate an AzureManagedCluster.
pub fn validate_managed_cluster(cluster: &AzureManagedCluster, gates: &FeatureGates) -> ErrorList {
    if let Some(err) = machine_pool_gate_error(gates, spec_path()) {
        return ErrorList::from(err);
    }
    validate_cluster_name(&cluster.name_any(), &metadata_name_path())
}

fn custom_headers(annotations: &BTreeMap<String, String>) -> BTreeMap<&str, &str> {
    annotations
        .iter()
        .filter(|(k, _)| k.starts_with(CUSTOM_HEADER_ANNOTATION_PREFIX))
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect()
}

/// Custom header annotations may not be added, removed or changed.
fn validate_custom_headers_update(
    old: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
    path: &FieldPath,
) -> ErrorList {
    let old = custom_headers(old);
    let new = custom_headers(new);
    let mut keys: Vec<&str> = old.keys().chain(new.keys()).copied().collect();
    keys.sort_unstable();
    keys.dedup();

    let mut errs = ErrorList::new();
    for key in keys {
        if old.get(key) != new.get(key) {
            let value = new.get(key).map(|v| serde_json::Value::from(*v));
            errs.push(FieldError::immutable_with_detail(
                path.key(key),
                value.as_ref(),
                format!("annotations with '{CUSTOM_HEADER_ANNOTATION_PREFIX}' prefix are immutable"),
            ));
        }
    }
    errs
}

/// Immutability rules of an AzureManagedCluster update.
pub fn validate_managed_cluster_immutability(old: &AzureManagedCluster, new: &AzureManagedCluster) -> ErrorList {
    let rules = [
        Rule::enable_only("spec.controlPlaneEndpoint.host"),
        Rule::enable_only("spec.controlPlaneEndpoint.port"),
    ];
    let mut errs = compare(old, new, &FieldPath::default(), &rules);
    errs.append(validate_custom_headers_update(
        old.annotations(),
        new.annotations(),
        &FieldPath::from_fields(&["metadata", "annotations"]),
    ));
    errs
}
