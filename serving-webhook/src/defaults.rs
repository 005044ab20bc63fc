//! Defaulting expressed as JSON patches.
//!
//! Types fill in their omitted fields through [`SetDefaults`]. The patch is the
//! structural diff between an object and a defaulted copy of it, so every rule
//! stays local to the type that owns the field and the caller's object is never
//! touched.

use kube::ResourceExt;
use serde::Serialize;
use tracing::debug;

use crate::Result;
use crate::patch::{self, PatchOp};
use crate::service::{ConfigurationSpec, RevisionSpec, Service, ServiceMode, ServiceSpec};

/// Fills in values the caller omitted
///
/// Implementations must only write fields holding their zero value, so that
/// applying defaults twice is the same as applying them once.
pub trait SetDefaults {
    fn set_defaults(&mut self);
}

impl SetDefaults for Service {
    fn set_defaults(&mut self) {
        self.spec.set_defaults();
    }
}

impl SetDefaults for ServiceSpec {
    fn set_defaults(&mut self) {
        // a missing or doubled mode is reported by validation, not fixed here
        match self.mode_mut() {
            Ok(ServiceMode::RunLatest(run_latest)) => run_latest.configuration.set_defaults(),
            Ok(ServiceMode::Pinned(pinned)) => pinned.configuration.set_defaults(),
            Err(_) => {}
        }
    }
}

impl SetDefaults for ConfigurationSpec {
    fn set_defaults(&mut self) {
        self.revision_template.spec.set_defaults();
    }
}

impl SetDefaults for RevisionSpec {
    fn set_defaults(&mut self) {
        self.concurrency_model.get_or_insert_default();
    }
}

/// Appends the patches that default `obj` to `patches`
///
/// On error nothing is appended.
pub fn set_defaults<T>(patches: &mut Vec<PatchOp>, obj: &T) -> Result<()>
where
    T: SetDefaults + Serialize + Clone,
{
    let before = serde_json::to_value(obj)?;

    let mut defaulted = obj.clone();
    defaulted.set_defaults();
    let after = serde_json::to_value(&defaulted)?;

    patches.extend(patch::diff(&before, &after));
    Ok(())
}

/// Appends the patches that default `service` to `patches`
pub fn set_service_defaults(patches: &mut Vec<PatchOp>, service: &Service) -> Result<()> {
    let start = patches.len();
    set_defaults(patches, service)?;

    debug!(
        name = %service.name_any(),
        patches = patches.len() - start,
        "computed service defaults"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::patch::Operation;
    use crate::service::{ConcurrencyModel, ServiceSpec};
    use crate::test_support::{configuration, init_tracing, service};
    use json_patch::jsonptr::PointerBuf;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn without_concurrency_model(mut spec: ServiceSpec) -> ServiceSpec {
        if let Ok(mode) = spec.mode_mut() {
            let config = match mode {
                ServiceMode::RunLatest(run_latest) => &mut run_latest.configuration,
                ServiceMode::Pinned(pinned) => &mut pinned.configuration,
            };
            config.revision_template.spec.concurrency_model = None;
        }
        spec
    }

    fn defaults_of(s: &Service) -> Vec<PatchOp> {
        let mut patches = Vec::new();
        if let Err(err) = set_service_defaults(&mut patches, s) {
            panic!("expected success, but failed with: {err}");
        }
        patches
    }

    #[test]
    fn test_pinned_sets_defaults() {
        init_tracing();
        let s = service(without_concurrency_model(ServiceSpec::pinned(
            "revision",
            configuration("busybox"),
        )));

        let expected = PatchOp::add(
            PointerBuf::parse("/spec/pinned/configuration/revisionTemplate/spec/concurrencyModel")
                .unwrap(),
            json!("Multi"),
        );
        assert_eq!(defaults_of(&s), vec![expected]);
    }

    #[test]
    fn test_latest_sets_defaults() {
        init_tracing();
        let s = service(without_concurrency_model(ServiceSpec::run_latest(
            configuration("busybox"),
        )));

        let patches = defaults_of(&s);
        assert_eq!(patches.len(), 1, "unexpected patches: {patches:?}");
        assert_eq!(
            serde_json::to_value(&patches[0]).unwrap(),
            json!({
                "op": "add",
                "path": "/spec/runLatest/configuration/revisionTemplate/spec/concurrencyModel",
                "value": "Multi"
            })
        );
    }

    #[test]
    fn test_set_field_is_left_alone() {
        init_tracing();
        let mut config = configuration("busybox");
        config.revision_template.spec.concurrency_model = Some(ConcurrencyModel::Single);

        assert!(defaults_of(&service(ServiceSpec::run_latest(config))).is_empty());
    }

    #[test]
    fn test_no_defaults_without_a_mode() {
        init_tracing();
        assert!(defaults_of(&service(ServiceSpec::default())).is_empty());
    }

    #[test]
    fn test_no_defaults_with_both_modes() {
        init_tracing();
        let spec = ServiceSpec {
            run_latest: ServiceSpec::run_latest(ConfigurationSpec::default()).run_latest,
            pinned: ServiceSpec::pinned("revision", ConfigurationSpec::default()).pinned,
        };
        assert!(defaults_of(&service(spec)).is_empty());
    }

    #[test]
    fn test_defaulting_is_idempotent() {
        init_tracing();
        let s = service(without_concurrency_model(ServiceSpec::pinned(
            "revision",
            configuration("busybox"),
        )));
        let patches = defaults_of(&s);
        assert_eq!(patches.len(), 1);

        let mut doc = serde_json::to_value(&s).unwrap();
        patch::apply(&mut doc, &patches).unwrap();
        let defaulted: Service = serde_json::from_value(doc).unwrap();

        assert!(defaults_of(&defaulted).is_empty());
    }

    #[test]
    fn test_input_object_is_not_mutated() {
        init_tracing();
        let s = service(without_concurrency_model(ServiceSpec::run_latest(
            configuration("busybox"),
        )));
        let before = s.clone();

        defaults_of(&s);
        assert_eq!(s, before);
    }

    #[test]
    fn test_patches_append_to_accumulator() {
        init_tracing();
        let mut patches = vec![PatchOp::remove(PointerBuf::parse("/metadata/labels").unwrap())];
        let s = service(without_concurrency_model(ServiceSpec::run_latest(
            configuration("busybox"),
        )));

        set_service_defaults(&mut patches, &s).unwrap();

        let ops: Vec<Operation> = patches.iter().map(PatchOp::operation).collect();
        assert_eq!(ops, vec![Operation::Remove, Operation::Add]);
    }

    /// Serializes until defaulted: JSON object keys must be strings
    #[derive(Clone, Serialize)]
    struct Unserializable {
        grid: Option<BTreeMap<(u8, u8), u8>>,
    }

    impl SetDefaults for Unserializable {
        fn set_defaults(&mut self) {
            self.grid.get_or_insert_default().insert((0, 0), 1);
        }
    }

    #[test]
    fn test_failed_defaulting_leaves_accumulator_untouched() {
        let mut patches = vec![PatchOp::remove(PointerBuf::parse("/metadata/labels").unwrap())];

        let err = set_defaults(&mut patches, &Unserializable { grid: None }).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].operation(), Operation::Remove);
    }
}
