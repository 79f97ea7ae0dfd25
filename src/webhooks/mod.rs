//! Admission webhooks for the provider's resource kinds.
//!
//! Every kind gets one [`Webhook`] implementation on [`AdmissionWebhook`]:
//! - `default`: fill derived fields (mutating admission)
//! - `validate_create` / `validate_update` / `validate_delete`: reject
//!   invalid objects (validating admission)
//!
//! Updates run the kind's immutability table first and the create-time
//! rules only once the table passes. The rules themselves live in
//! [`policies`]; this layer adds defaulting, owner lookups and the
//! conversion to an aggregate [`AdmissionError`].

pub mod immutability;
pub mod policies;
pub mod reader;

mod cluster;
mod machine;
mod managed;

use std::sync::Arc;

use async_trait::async_trait;
use kube::{Client, Resource, ResourceExt};
use tracing::{debug, warn};

use crate::config::WebhookConfig;
use crate::crd::TOPOLOGY_DRY_RUN_ANNOTATION;
use crate::error::{Error, Result};
use crate::validation::{AdmissionError, ErrorList, FieldError, FieldPath, GroupKind};

pub use reader::{KubeReader, ObjectReader};

/// Warnings returned to the client alongside an admitted object.
pub type Warnings = Vec<String>;

/// Outcome of a validating admission call.
pub type AdmissionResult = std::result::Result<Warnings, AdmissionError>;

/// Request-level facts the host runtime passes along with the object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdmissionContext {
    /// The request will not be persisted.
    pub dry_run: bool,
}

impl AdmissionContext {
    pub fn dry_run() -> Self {
        Self { dry_run: true }
    }
}

/// Admission entry points for one resource kind.
#[async_trait]
pub trait Webhook<K>: Send + Sync
where
    K: Send + Sync + 'static,
{
    /// Fill in defaults. On error `obj` is left untouched.
    async fn default(&self, ctx: &AdmissionContext, obj: &mut K) -> std::result::Result<(), AdmissionError>;

    async fn validate_create(&self, ctx: &AdmissionContext, obj: &K) -> AdmissionResult;

    async fn validate_update(&self, ctx: &AdmissionContext, old: &K, new: &K) -> AdmissionResult;

    async fn validate_delete(&self, _ctx: &AdmissionContext, _obj: &K) -> AdmissionResult {
        Ok(Warnings::new())
    }
}

/// The provider's webhooks: shared configuration plus an object reader for
/// the kinds that consult their owners.
#[derive(Clone)]
pub struct AdmissionWebhook {
    config: WebhookConfig,
    reader: Arc<dyn ObjectReader>,
}

impl AdmissionWebhook {
    pub fn new(config: WebhookConfig, reader: Arc<dyn ObjectReader>) -> Self {
        Self { config, reader }
    }

    /// Webhooks reading owners through `client`, configured from the environment.
    pub fn from_client(client: Client) -> Result<Self> {
        Ok(Self::new(WebhookConfig::from_env()?, Arc::new(KubeReader::new(client))))
    }

    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }

    pub(crate) fn reader(&self) -> &dyn ObjectReader {
        self.reader.as_ref()
    }
}

/// Group and kind used to key a kind's aggregate errors.
pub(crate) fn group_kind<K: Resource<DynamicType = ()>>() -> GroupKind {
    GroupKind::new(&K::group(&()), &K::kind(&()))
}

/// Collapse validation errors for `obj` into an admission result.
pub(crate) fn finish<K>(obj: &K, errs: ErrorList, warnings: Warnings) -> AdmissionResult
where
    K: Resource<DynamicType = ()>,
{
    let name = obj.name_any();
    if errs.is_empty() {
        debug!(kind = %K::kind(&()), name = %name, "Admission request allowed");
        return Ok(warnings);
    }
    warn!(
        kind = %K::kind(&()),
        name = %name,
        errors = errs.len(),
        "Admission request denied"
    );
    errs.into_result(&group_kind::<K>(), &name).map(|()| warnings)
}

/// Aggregate for an operational failure while admitting `obj`.
pub(crate) fn internal_error<K>(obj: &K, path: FieldPath, err: &Error) -> AdmissionError
where
    K: Resource<DynamicType = ()>,
{
    warn!(kind = %K::kind(&()), name = %obj.name_any(), error = %err, "Admission request failed");
    AdmissionError::single(&group_kind::<K>(), &obj.name_any(), FieldError::internal(path, err))
}

/// Topology dry-run requests may change template specs.
pub(crate) fn skip_template_immutability<K: ResourceExt>(ctx: &AdmissionContext, obj: &K) -> bool {
    ctx.dry_run && obj.annotations().contains_key(TOPOLOGY_DRY_RUN_ANNOTATION)
}

/// Run an update: the immutability table first, the create-time rules once
/// it passes.
pub(crate) fn update_then_create(immutability: ErrorList, create: impl FnOnce() -> ErrorList) -> ErrorList {
    if immutability.is_empty() {
        create()
    } else {
        immutability
    }
}
