//! Structured field errors.
//!
//! Every rule reports problems as [`FieldError`]s addressed by a [`FieldPath`]
//! such as `spec.networkSpec.subnets[1].cidrBlocks`. Rules return an
//! [`ErrorList`]; the admission entry points collapse the list into a single
//! [`AdmissionError`] keyed by the resource's group/kind and name.

use std::fmt;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Status, StatusCause, StatusDetails};
use serde::Serialize;
use serde_json::Value;

/// Detail used for every immutable-field error.
pub const IMMUTABLE_FIELD_MSG: &str = "field is immutable";

/// One step in a field path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// A struct field, rendered as `.name`.
    Field(String),
    /// A list index, rendered as `[3]`.
    Index(usize),
    /// A map key, rendered as `[key]`.
    Key(String),
}

/// Path of a field inside a resource.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// Path rooted at a single field name.
    pub fn new(root: &str) -> Self {
        Self {
            segments: vec![PathSegment::Field(root.to_string())],
        }
    }

    /// Path built from several field names.
    pub fn from_fields(fields: &[&str]) -> Self {
        Self {
            segments: fields
                .iter()
                .map(|f| PathSegment::Field((*f).to_string()))
                .collect(),
        }
    }

    /// Parse a dotted/indexed path such as `spec.subnets[0].name`.
    ///
    /// Bracketed segments that are numbers become indices, anything else a
    /// map key.
    pub fn parse(path: &str) -> Self {
        let mut segments = Vec::new();
        for part in path.split('.').filter(|p| !p.is_empty()) {
            let (name, rest) = match part.find('[') {
                Some(pos) => part.split_at(pos),
                None => (part, ""),
            };
            if !name.is_empty() {
                segments.push(PathSegment::Field(name.to_string()));
            }
            for bracket in rest.split('[').filter(|b| !b.is_empty()) {
                let inner = bracket.trim_end_matches(']');
                match inner.parse::<usize>() {
                    Ok(i) => segments.push(PathSegment::Index(i)),
                    Err(_) => segments.push(PathSegment::Key(inner.to_string())),
                }
            }
        }
        Self { segments }
    }

    /// Child path for a struct field.
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Field(name.to_string()));
        Self { segments }
    }

    /// Child path for a list element.
    pub fn index(&self, i: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Index(i));
        Self { segments }
    }

    /// Child path for a map entry.
    pub fn key(&self, key: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Key(key.to_string()));
        Self { segments }
    }

    /// This path followed by `rest`.
    pub fn join(&self, rest: &FieldPath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(rest.segments.iter().cloned());
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Resolve this path inside a JSON document.
    ///
    /// Returns `None` when any step is missing.
    pub fn lookup<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut current = root;
        for segment in &self.segments {
            current = match segment {
                PathSegment::Field(name) | PathSegment::Key(name) => current.get(name.as_str())?,
                PathSegment::Index(i) => current.get(*i)?,
            };
        }
        Some(current)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Field(name) => {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{name}")?;
                }
                PathSegment::Index(idx) => write!(f, "[{idx}]")?,
                PathSegment::Key(key) => write!(f, "[{key}]")?,
            }
        }
        Ok(())
    }
}

/// Classification of a field error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// Value violates a rule.
    Invalid,
    /// Mandatory value is missing.
    Required,
    /// Value is present where it is not allowed.
    Forbidden,
    /// Value violates a uniqueness constraint.
    Duplicate,
    /// Value is outside an enumerated set.
    NotSupported,
    /// Value changed across an update.
    Immutable,
    /// Processing failed for reasons unrelated to the value.
    Internal,
}

impl ErrorType {
    /// Human label used when rendering the error.
    ///
    /// Immutable errors render like the API server's invalid-value errors so
    /// messages stay byte-compatible with what clients already parse.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorType::Invalid | ErrorType::Immutable => "Invalid value",
            ErrorType::Required => "Required value",
            ErrorType::Forbidden => "Forbidden",
            ErrorType::Duplicate => "Duplicate value",
            ErrorType::NotSupported => "Unsupported value",
            ErrorType::Internal => "Internal error",
        }
    }

    /// Status cause reason reported to the API server.
    pub fn cause_reason(&self) -> &'static str {
        match self {
            ErrorType::Invalid | ErrorType::Immutable => "FieldValueInvalid",
            ErrorType::Required => "FieldValueRequired",
            ErrorType::Forbidden => "FieldValueForbidden",
            ErrorType::Duplicate => "FieldValueDuplicate",
            ErrorType::NotSupported => "FieldValueNotSupported",
            ErrorType::Internal => "InternalError",
        }
    }
}

/// A single problem found at a field path.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldError {
    pub error_type: ErrorType,
    pub path: FieldPath,
    pub bad_value: Option<Value>,
    pub detail: String,
}

/// Serialize a value for error reporting, falling back to `null`.
fn to_value<T: Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

impl FieldError {
    pub fn invalid<T: Serialize + ?Sized>(path: FieldPath, value: &T, detail: impl Into<String>) -> Self {
        Self {
            error_type: ErrorType::Invalid,
            path,
            bad_value: Some(to_value(value)),
            detail: detail.into(),
        }
    }

    /// Invalid error that does not echo the value (secrets, whole objects).
    pub fn invalid_omit_value(path: FieldPath, detail: impl Into<String>) -> Self {
        Self {
            error_type: ErrorType::Invalid,
            path,
            bad_value: None,
            detail: detail.into(),
        }
    }

    pub fn required(path: FieldPath, detail: impl Into<String>) -> Self {
        Self {
            error_type: ErrorType::Required,
            path,
            bad_value: None,
            detail: detail.into(),
        }
    }

    pub fn forbidden(path: FieldPath, detail: impl Into<String>) -> Self {
        Self {
            error_type: ErrorType::Forbidden,
            path,
            bad_value: None,
            detail: detail.into(),
        }
    }

    pub fn duplicate<T: Serialize + ?Sized>(path: FieldPath, value: &T) -> Self {
        Self {
            error_type: ErrorType::Duplicate,
            path,
            bad_value: Some(to_value(value)),
            detail: String::new(),
        }
    }

    pub fn not_supported<T: Serialize + ?Sized>(path: FieldPath, value: &T, supported: &[&str]) -> Self {
        let detail = if supported.is_empty() {
            String::new()
        } else {
            let quoted: Vec<String> = supported.iter().map(|s| format!("\"{s}\"")).collect();
            format!("supported values: {}", quoted.join(", "))
        };
        Self {
            error_type: ErrorType::NotSupported,
            path,
            bad_value: Some(to_value(value)),
            detail,
        }
    }

    /// `field is immutable` at the given path.
    pub fn immutable(path: FieldPath, new_value: Option<&Value>) -> Self {
        Self::immutable_with_detail(path, new_value, IMMUTABLE_FIELD_MSG)
    }

    pub fn immutable_with_detail(path: FieldPath, new_value: Option<&Value>, detail: impl Into<String>) -> Self {
        Self {
            error_type: ErrorType::Immutable,
            path,
            bad_value: Some(new_value.cloned().unwrap_or(Value::Null)),
            detail: detail.into(),
        }
    }

    pub fn internal(path: FieldPath, err: impl fmt::Display) -> Self {
        Self {
            error_type: ErrorType::Internal,
            path,
            bad_value: None,
            detail: err.to_string(),
        }
    }

    /// Message without the field path prefix.
    pub fn body(&self) -> String {
        let mut out = self.error_type.label().to_string();
        match self.error_type {
            ErrorType::Required | ErrorType::Forbidden | ErrorType::Internal => {}
            _ => {
                if let Some(value) = &self.bad_value {
                    out.push_str(": ");
                    out.push_str(&value.to_string());
                }
            }
        }
        if !self.detail.is_empty() {
            out.push_str(": ");
            out.push_str(&self.detail);
        }
        out
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.body())
    }
}

/// Ordered collection of field errors.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ErrorList(Vec<FieldError>);

impl ErrorList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, err: FieldError) {
        self.0.push(err);
    }

    /// Append every error from a sub-validation.
    pub fn append(&mut self, other: ErrorList) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<FieldError> {
        self.0
    }

    /// Collapse into `Ok(())` or a single aggregate error for the object.
    pub fn into_result(self, group_kind: &GroupKind, name: &str) -> Result<(), AdmissionError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AdmissionError {
                group_kind: group_kind.clone(),
                name: name.to_string(),
                errors: self,
            })
        }
    }
}

impl From<Vec<FieldError>> for ErrorList {
    fn from(errors: Vec<FieldError>) -> Self {
        Self(errors)
    }
}

impl From<FieldError> for ErrorList {
    fn from(err: FieldError) -> Self {
        Self(vec![err])
    }
}

impl IntoIterator for ErrorList {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a FieldError;
    type IntoIter = std::slice::Iter<'a, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Extend<FieldError> for ErrorList {
    fn extend<I: IntoIterator<Item = FieldError>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl FromIterator<FieldError> for ErrorList {
    fn from_iter<I: IntoIterator<Item = FieldError>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => Ok(()),
            [only] => write!(f, "{only}"),
            many => {
                let rendered: Vec<String> = many.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
        }
    }
}

/// API group and kind of a resource.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroupKind {
    pub group: String,
    pub kind: String,
}

impl GroupKind {
    pub fn new(group: &str, kind: &str) -> Self {
        Self {
            group: group.to_string(),
            kind: kind.to_string(),
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}.{}", self.kind, self.group)
        }
    }
}

/// Aggregate admission failure for one object.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{group_kind} \"{name}\" is invalid: {errors}")]
pub struct AdmissionError {
    pub group_kind: GroupKind,
    pub name: String,
    pub errors: ErrorList,
}

impl AdmissionError {
    /// Single-error aggregate.
    pub fn single(group_kind: &GroupKind, name: &str, err: FieldError) -> Self {
        Self {
            group_kind: group_kind.clone(),
            name: name.to_string(),
            errors: ErrorList::from(err),
        }
    }

    /// The `422 Unprocessable Entity` status the API server returns.
    pub fn to_status(&self) -> Status {
        let causes = self
            .errors
            .iter()
            .map(|e| StatusCause {
                field: Some(e.path.to_string()),
                message: Some(e.body()),
                reason: Some(e.error_type.cause_reason().to_string()),
            })
            .collect();
        Status {
            code: Some(422),
            message: Some(self.to_string()),
            reason: Some("Invalid".to_string()),
            status: Some("Failure".to_string()),
            details: Some(StatusDetails {
                causes: Some(causes),
                group: Some(self.group_kind.group.clone()),
                kind: Some(self.group_kind.kind.clone()),
                name: Some(self.name.clone()),
                retry_after_seconds: None,
                uid: None,
            }),
            metadata: Default::default(),
        }
    }
}
