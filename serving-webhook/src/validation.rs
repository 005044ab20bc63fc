//! Structural validation of services and the configurations they carry.
//!
//! Each type validates itself with paths relative to its own position and
//! callers nest the result under the field name they hold it by. Failures on
//! independent fields are collected rather than returned on first sight.

use k8s_openapi::api::core::v1::Container;
use kube::ResourceExt;
use tracing::debug;

use crate::field_error::{CURRENT_FIELD, FieldError, FieldErrors};
use crate::service::{
    ConcurrencyModel, ConfigurationSpec, MODE_FIELDS, PinnedType, RevisionSpec,
    RevisionTemplateSpec, RunLatestType, Service, ServiceMode, ServiceSpec,
};

/// Structural checks a value performs on itself
pub trait Validate {
    fn validate(&self) -> Result<(), FieldErrors>;
}

/// A zero value counts as an omitted field
fn is_zero<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// Validates an admitted service
///
/// `old` is the stored object on updates and `None` on creates. `original` is
/// the object as submitted, before any defaults were applied to `new`.
pub fn validate_service(
    old: Option<&Service>,
    new: &Service,
    original: &Service,
) -> Result<(), FieldErrors> {
    let operation = if old.is_some() { "update" } else { "create" };
    let defaulted = new != original;
    debug!(name = %new.name_any(), operation, defaulted, "validating service");

    new.validate()
}

impl Validate for Service {
    fn validate(&self) -> Result<(), FieldErrors> {
        self.spec.validate().map_err(|errors| errors.via_field("spec"))
    }
}

impl Validate for ServiceSpec {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mode = match self.mode() {
            Ok(mode) => mode,
            Err(ambiguity) => {
                let message = format!("Expected exactly one, got {ambiguity}");
                return Err(FieldError::new(message, MODE_FIELDS).into());
            }
        };

        let field = mode.field_name();
        let result = match mode {
            ServiceMode::RunLatest(run_latest) => run_latest.validate(),
            ServiceMode::Pinned(pinned) => pinned.validate(),
        };
        result.map_err(|errors| errors.via_field(field))
    }
}

impl Validate for RunLatestType {
    fn validate(&self) -> Result<(), FieldErrors> {
        if is_zero(&self.configuration) {
            return Err(FieldError::missing_field(["configuration"]).into());
        }

        self.configuration
            .validate()
            .map_err(|errors| errors.via_field("configuration"))
    }
}

impl Validate for PinnedType {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        if self.revision_name.is_empty() {
            errors.push(FieldError::missing_field(["revisionName"]));
        }

        if is_zero(&self.configuration) {
            errors.push(FieldError::missing_field(["configuration"]));
        } else {
            errors.extend_via("configuration", self.configuration.validate());
        }

        errors.into_result()
    }
}

impl Validate for ConfigurationSpec {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        // serving state is owned by the revision lifecycle
        if self.revision_template.spec.serving_state.is_some() {
            errors.push(FieldError::disallowed_fields([
                "revisionTemplate.spec.servingState",
            ]));
        }

        errors.extend_via("revisionTemplate", self.revision_template.validate());
        errors.into_result()
    }
}

impl Validate for RevisionTemplateSpec {
    fn validate(&self) -> Result<(), FieldErrors> {
        self.spec.validate().map_err(|errors| errors.via_field("spec"))
    }
}

impl Validate for RevisionSpec {
    fn validate(&self) -> Result<(), FieldErrors> {
        if is_zero(self) {
            return Err(FieldError::missing_field([CURRENT_FIELD]).into());
        }

        let mut errors = FieldErrors::new();
        if let Some(model @ ConcurrencyModel::Unknown(_)) = &self.concurrency_model {
            let known: Vec<&str> = ConcurrencyModel::KNOWN.iter().map(|m| m.as_str()).collect();
            errors.push(
                FieldError::invalid_value(model, "concurrencyModel")
                    .with_details(format!("expected one of: {}", known.join(", "))),
            );
        }

        errors.extend_via("container", self.container.validate());
        errors.into_result()
    }
}

impl Validate for Container {
    fn validate(&self) -> Result<(), FieldErrors> {
        if is_zero(self) {
            return Err(FieldError::missing_field([CURRENT_FIELD]).into());
        }

        // fields populated by the platform when it builds the pod
        let mut disallowed = Vec::new();
        if !self.name.is_empty() {
            disallowed.push("name");
        }
        if self.resources.as_ref().is_some_and(|r| !is_zero(r)) {
            disallowed.push("resources");
        }
        if self.ports.as_ref().is_some_and(|p| !p.is_empty()) {
            disallowed.push("ports");
        }
        if self.volume_mounts.as_ref().is_some_and(|v| !v.is_empty()) {
            disallowed.push("volumeMounts");
        }
        if self.lifecycle.is_some() {
            disallowed.push("lifecycle");
        }

        if disallowed.is_empty() {
            Ok(())
        } else {
            Err(FieldError::disallowed_fields(disallowed).into())
        }
    }
}
