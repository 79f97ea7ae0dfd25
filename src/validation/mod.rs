//! Field errors and the reusable validation rules built on them.
//!
//! - [`field`]: paths, field errors and the per-object aggregate
//! - [`primitives`]: CIDRs, SSH keys, UUIDs, names, versions and ranges
//! - the remaining modules: rules for leaf value objects shared across kinds

pub mod disks;
pub mod field;
pub mod identity;
pub mod image;
pub mod kubelet;
pub mod network;
pub mod primitives;
pub mod security;
pub mod vm;

pub use field::{AdmissionError, ErrorList, ErrorType, FieldError, FieldPath, GroupKind};
