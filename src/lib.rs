//! capz-admission library crate
//!
//! Defaulting and validation for the Azure Cluster API infrastructure
//! provider's resource kinds. The host runtime decodes admission requests
//! and calls the matching [`Webhook`] entry point on [`AdmissionWebhook`]:
//! - [`crd`]: the resource schemas
//! - [`defaults`]: defaulting rules per kind
//! - [`validation`]: field errors and the shared leaf rules
//! - [`webhooks`]: immutability tables, per-kind policies and the adapters

pub mod config;
pub mod crd;
pub mod defaults;
pub mod error;
pub mod validation;
pub mod webhooks;

pub use config::{FeatureGates, WebhookConfig};
pub use error::{Error, Result};
pub use validation::{AdmissionError, ErrorList, ErrorType, FieldError, FieldPath};
pub use webhooks::{AdmissionContext, AdmissionResult, AdmissionWebhook, KubeReader, ObjectReader, Warnings, Webhook};
