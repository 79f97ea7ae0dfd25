//! Create and update rules per resource kind.
//!
//! Policies are pure: they take the admitted objects plus whatever the rule
//! needs from outside (feature gates, values read from owners) and return
//! every violation found. Each kind has two tiers:
//! - create: structural and cross-field rules, always enforced
//! - update: the kind's immutability table against the stored object

pub mod cluster;
pub mod cluster_identity;
pub mod machine;
pub mod machine_pool;
pub mod managed_cluster;
pub mod managed_control_plane;
pub mod managed_machine_pool;

use crate::validation::FieldPath;

pub(crate) fn metadata_name_path() -> FieldPath {
    FieldPath::from_fields(&["metadata", "name"])
}

/// Root of every spec-relative rule.
pub(crate) fn spec_path() -> FieldPath {
    FieldPath::new("spec")
}

/// Path of a template kind's embedded spec.
pub(crate) fn template_spec_path() -> FieldPath {
    FieldPath::from_fields(&["spec", "template", "spec"])
}
