//! The `Service` custom resource and the configuration types nested in its spec.
//!
//! On the wire a [`ServiceSpec`] is a pair of optional branches so that
//! malformed requests can be decoded and reported. Consumers resolve it to a
//! [`ServiceMode`] and match on that instead of inspecting the options.

use std::fmt;

use k8s_openapi::api::core::v1::Container;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Desired state of a service: exactly one of `runLatest` or `pinned`
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[kube(
    group = "serving.dev",
    version = "v1alpha1",
    kind = "Service",
    namespaced,
    schema = "disabled",
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    /// Always route to the latest ready revision of the configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_latest: Option<RunLatestType>,
    /// Route to a fixed, named revision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<PinnedType>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunLatestType {
    #[serde(default)]
    pub configuration: ConfigurationSpec,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PinnedType {
    #[serde(default)]
    pub revision_name: String,
    #[serde(default)]
    pub configuration: ConfigurationSpec,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationSpec {
    #[serde(default)]
    pub revision_template: RevisionTemplateSpec,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct RevisionTemplateSpec {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: RevisionSpec,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RevisionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serving_state: Option<ServingState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency_model: Option<ConcurrencyModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
    #[serde(default)]
    pub container: Container,
}

/// How many requests a single revision instance may serve at once
///
/// Unrecognized values decode into `Unknown` so validation can report them
/// against their field.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub enum ConcurrencyModel {
    Single,
    #[default]
    Multi,
    #[serde(untagged)]
    Unknown(String),
}

impl ConcurrencyModel {
    /// Every value the platform accepts
    pub const KNOWN: [ConcurrencyModel; 2] = [Self::Single, Self::Multi];

    pub fn as_str(&self) -> &str {
        match self {
            Self::Single => "Single",
            Self::Multi => "Multi",
            Self::Unknown(value) => value,
        }
    }
}

impl fmt::Display for ConcurrencyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a revision, managed by the platform
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServingState {
    Active,
    Reserve,
    Retired,
}

/// The resolved deployment mode of a [`ServiceSpec`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceMode<L, P> {
    RunLatest(L),
    Pinned(P),
}

impl<L, P> ServiceMode<L, P> {
    /// Name of the spec field holding this branch
    pub const fn field_name(&self) -> &'static str {
        match self {
            Self::RunLatest(_) => "runLatest",
            Self::Pinned(_) => "pinned",
        }
    }
}

/// Why a [`ServiceSpec`] does not resolve to a single mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ambiguity {
    Neither,
    Both,
}

impl fmt::Display for Ambiguity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Neither => f.write_str("neither"),
            Self::Both => f.write_str("both"),
        }
    }
}

/// Spec field names of every branch, in declaration order
pub const MODE_FIELDS: [&str; 2] = ["runLatest", "pinned"];

impl ServiceSpec {
    pub fn run_latest(configuration: ConfigurationSpec) -> Self {
        ServiceMode::RunLatest(RunLatestType { configuration }).into()
    }

    pub fn pinned(revision_name: impl Into<String>, configuration: ConfigurationSpec) -> Self {
        ServiceMode::Pinned(PinnedType {
            revision_name: revision_name.into(),
            configuration,
        })
        .into()
    }

    pub fn mode(&self) -> Result<ServiceMode<&RunLatestType, &PinnedType>, Ambiguity> {
        match (&self.run_latest, &self.pinned) {
            (Some(run_latest), None) => Ok(ServiceMode::RunLatest(run_latest)),
            (None, Some(pinned)) => Ok(ServiceMode::Pinned(pinned)),
            (None, None) => Err(Ambiguity::Neither),
            (Some(_), Some(_)) => Err(Ambiguity::Both),
        }
    }

    pub fn mode_mut(
        &mut self,
    ) -> Result<ServiceMode<&mut RunLatestType, &mut PinnedType>, Ambiguity> {
        match (self.run_latest.as_mut(), self.pinned.as_mut()) {
            (Some(run_latest), None) => Ok(ServiceMode::RunLatest(run_latest)),
            (None, Some(pinned)) => Ok(ServiceMode::Pinned(pinned)),
            (None, None) => Err(Ambiguity::Neither),
            (Some(_), Some(_)) => Err(Ambiguity::Both),
        }
    }
}

impl From<ServiceMode<RunLatestType, PinnedType>> for ServiceSpec {
    fn from(mode: ServiceMode<RunLatestType, PinnedType>) -> Self {
        match mode {
            ServiceMode::RunLatest(run_latest) => Self {
                run_latest: Some(run_latest),
                pinned: None,
            },
            ServiceMode::Pinned(pinned) => Self {
                run_latest: None,
                pinned: Some(pinned),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_constructors_resolve_to_their_mode() {
        let spec = ServiceSpec::run_latest(ConfigurationSpec::default());
        assert!(matches!(spec.mode(), Ok(ServiceMode::RunLatest(_))));

        let spec = ServiceSpec::pinned("rev-1", ConfigurationSpec::default());
        match spec.mode() {
            Ok(ServiceMode::Pinned(pinned)) => assert_eq!(pinned.revision_name, "rev-1"),
            other => panic!("expected pinned mode, got {other:?}"),
        }
    }

    #[test]
    fn test_mode_reports_ambiguity() {
        assert_eq!(ServiceSpec::default().mode(), Err(Ambiguity::Neither));

        let spec = ServiceSpec {
            run_latest: Some(RunLatestType::default()),
            pinned: Some(PinnedType::default()),
        };
        assert_eq!(spec.mode(), Err(Ambiguity::Both));
    }

    #[test]
    fn test_mode_mut_edits_active_branch() {
        let mut spec = ServiceSpec::pinned("", ConfigurationSpec::default());
        if let Ok(ServiceMode::Pinned(pinned)) = spec.mode_mut() {
            pinned.revision_name = "rev-2".into();
        }
        assert_eq!(spec.pinned.unwrap().revision_name, "rev-2");
    }

    #[test]
    fn test_decode_camel_case_wire_form() {
        let spec: ServiceSpec = serde_json::from_value(json!({
            "runLatest": {
                "configuration": {
                    "revisionTemplate": {
                        "spec": {
                            "concurrencyModel": "Single",
                            "container": { "image": "busybox" }
                        }
                    }
                }
            }
        }))
        .unwrap();

        let run_latest = spec.run_latest.unwrap();
        let revision = run_latest.configuration.revision_template.spec;
        assert_eq!(revision.concurrency_model, Some(ConcurrencyModel::Single));
        assert_eq!(revision.container.image.as_deref(), Some("busybox"));
        assert!(spec.pinned.is_none());
    }

    #[test]
    fn test_unknown_concurrency_model_is_kept_verbatim() {
        let spec: RevisionSpec = serde_json::from_value(json!({
            "concurrencyModel": "Sometimes"
        }))
        .unwrap();
        assert_eq!(
            spec.concurrency_model,
            Some(ConcurrencyModel::Unknown("Sometimes".into()))
        );

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["concurrencyModel"], "Sometimes");
        assert_eq!(serde_json::to_value(ConcurrencyModel::Single).unwrap(), "Single");
    }

    #[test]
    fn test_omitted_concurrency_model_is_not_serialized() {
        let value = serde_json::to_value(RevisionSpec::default()).unwrap();
        assert!(value.get("concurrencyModel").is_none());
        assert_eq!(ConcurrencyModel::default(), ConcurrencyModel::Multi);
    }
}
