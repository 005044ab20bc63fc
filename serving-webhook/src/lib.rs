//! Admission control for `Service` resources
//!
//! A service runs in exactly one of two modes, `runLatest` or `pinned`. This
//! crate validates that shape and computes the JSON patches that fill in
//! omitted defaults, without modifying the admitted object:
//!
//! - [`validation::validate_service`] reports every structural violation as
//!   [`FieldErrors`]
//! - [`defaults::set_service_defaults`] appends RFC 6902 [`PatchOp`]s to a
//!   caller owned accumulator
//! - [`admission::ServiceAdmission`] wires both into kube admission requests,
//!   and [`admission::AdmissionController`] dispatches reviews to handlers

pub mod admission;
pub mod defaults;
mod error;
pub mod field_error;
pub mod patch;
pub mod service;
pub mod validation;

pub use admission::{
    AdmissionController, MutatingAdmissionHandler, ServiceAdmission, ValidatingAdmissionHandler,
};
pub use defaults::{SetDefaults, set_defaults, set_service_defaults};
pub use error::{Error, Result};
pub use field_error::{FieldError, FieldErrors};
pub use patch::{Operation, PatchOp};
pub use service::{
    ConcurrencyModel, ConfigurationSpec, PinnedType, RevisionSpec, RevisionTemplateSpec,
    RunLatestType, Service, ServiceMode, ServiceSpec,
};
pub use validation::{Validate, validate_service};
