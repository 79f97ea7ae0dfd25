//! Table-driven immutability checks.
//!
//! A resource's update rules are a list of [`Rule`]s: a path relative to
//! the compared documents and a [`Policy`]. Objects are compared in their
//! serialized JSON form so one driver covers every kind, and a rule's path
//! doubles as the error path.

use serde::Serialize;
use serde_json::Value;

use crate::validation::{ErrorList, FieldError, FieldPath};

/// Documentation for replacing template resources.
pub const TEMPLATE_DOC_URL: &str = "https://cluster-api.sigs.k8s.io/tasks/updating-machine-templates.html";

/// How a field may change across an update.
#[derive(Clone, Copy, Debug)]
pub enum Policy {
    /// Old and new must be deep-equal.
    Equal,
    /// May go from unset to a value, never change afterwards.
    EnableOnly,
    /// A list may gain entries but not lose any.
    AppendOnly,
    /// Deep-equal, but only compared when the predicate holds for
    /// `(old, new)`. Missing values are passed as `null`.
    ConditionalEqual(fn(&Value, &Value) -> bool),
}

/// One entry of an update table.
#[derive(Clone, Debug)]
pub struct Rule {
    pub path: FieldPath,
    pub policy: Policy,
    pub detail: Option<&'static str>,
}

impl Rule {
    pub fn new(path: &str, policy: Policy) -> Self {
        Self {
            path: FieldPath::parse(path),
            policy,
            detail: None,
        }
    }

    pub fn equal(path: &str) -> Self {
        Self::new(path, Policy::Equal)
    }

    pub fn enable_only(path: &str) -> Self {
        Self::new(path, Policy::EnableOnly)
    }

    pub fn append_only(path: &str) -> Self {
        Self::new(path, Policy::AppendOnly)
    }

    pub fn conditional(path: &str, predicate: fn(&Value, &Value) -> bool) -> Self {
        Self::new(path, Policy::ConditionalEqual(predicate))
    }

    /// Replace the default `field is immutable` detail.
    pub fn with_detail(mut self, detail: &'static str) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// Whether a value counts as "not set yet" for [`Policy::EnableOnly`].
///
/// Absent, `null` and zero-valued scalars are unset; empty objects and
/// lists are values.
pub fn is_unset(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::Array(_) | Value::Object(_)) => false,
    }
}

fn same(old: Option<&Value>, new: Option<&Value>) -> bool {
    let null = Value::Null;
    old.unwrap_or(&null) == new.unwrap_or(&null)
}

fn is_superset(old: Option<&Value>, new: Option<&Value>) -> bool {
    let old_items = match old {
        Some(Value::Array(items)) => items.as_slice(),
        None | Some(Value::Null) => return true,
        Some(other) => return same(Some(other), new),
    };
    match new {
        Some(Value::Array(new_items)) => old_items.iter().all(|item| new_items.contains(item)),
        _ => old_items.is_empty(),
    }
}

/// Check `rules` against two documents rooted at `base`.
///
/// Errors are reported at `base` joined with each rule's path, in table
/// order.
pub fn check_rules(old: &Value, new: &Value, base: &FieldPath, rules: &[Rule]) -> ErrorList {
    let mut errs = ErrorList::new();
    for rule in rules {
        let old_value = rule.path.lookup(old);
        let new_value = rule.path.lookup(new);
        let allowed = match rule.policy {
            Policy::Equal => same(old_value, new_value),
            Policy::EnableOnly => is_unset(old_value) || same(old_value, new_value),
            Policy::AppendOnly => is_superset(old_value, new_value),
            Policy::ConditionalEqual(predicate) => {
                let null = Value::Null;
                !predicate(old_value.unwrap_or(&null), new_value.unwrap_or(&null))
                    || same(old_value, new_value)
            }
        };
        if !allowed {
            let path = base.join(&rule.path);
            errs.push(match rule.detail {
                Some(detail) => FieldError::immutable_with_detail(path, new_value, detail),
                None => FieldError::immutable(path, new_value),
            });
        }
    }
    errs
}

/// Serialize both objects and check `rules` against them.
pub fn compare<T: Serialize>(old: &T, new: &T, base: &FieldPath, rules: &[Rule]) -> ErrorList {
    match (serde_json::to_value(old), serde_json::to_value(new)) {
        (Ok(old), Ok(new)) => check_rules(&old, &new, base, rules),
        (Err(e), _) | (_, Err(e)) => ErrorList::from(FieldError::internal(base.clone(), e)),
    }
}

/// Like [`compare`], but a failing table is re-checked once against `old`
/// with the current defaults applied.
///
/// Stored objects admitted before a default existed differ from new
/// requests only in that default; renormalizing hides the difference.
pub fn compare_after_defaulting<T, F>(old: &T, new: &T, base: &FieldPath, rules: &[Rule], defaults: F) -> ErrorList
where
    T: Serialize + Clone,
    F: FnOnce(&mut T),
{
    let errs = compare(old, new, base, rules);
    if errs.is_empty() {
        return errs;
    }
    let mut renormalized = old.clone();
    defaults(&mut renormalized);
    compare(&renormalized, new, base, rules)
}

/// Single-error check that a whole subtree is unchanged.
///
/// `old` must already have the current defaults applied so that values
/// introduced by newer defaulting rules do not count as changes.
pub fn check_unchanged<T: Serialize + PartialEq>(old: &T, new: &T, path: FieldPath, detail: &str) -> ErrorList {
    if old == new {
        return ErrorList::new();
    }
    let value = serde_json::to_value(new).ok();
    ErrorList::from(FieldError::immutable_with_detail(path, value.as_ref(), detail))
}

/// Detail for an edited `spec.template.spec` of a template kind.
pub fn template_immutable_detail(kind: &str) -> String {
    format!(
        "{kind} spec.template.spec field is immutable. Please create a new resource instead. Ref doc: {TEMPLATE_DOC_URL}"
    )
}
