use std::error::Error as StdError;

use async_trait::async_trait;
use kube::core::DynamicObject;
use kube::core::admission::{
    AdmissionRequest, AdmissionResponse, AdmissionReview, ConvertAdmissionReviewError, Operation,
};
use kube::{Resource, ResourceExt};
use tracing::{debug, error, info, warn};

use crate::defaults::set_service_defaults;
use crate::patch;
use crate::service::Service;
use crate::validation::validate_service;
use crate::{Error, Result};

#[async_trait]
pub trait MutatingAdmissionHandler: Send + Sync {
    /// Error type returned by the handler
    type Err: StdError + Send + Sync + 'static;

    /// Returns the name of this handler for logging purposes
    fn name(&self) -> &'static str;

    /// Mutates the resource in the admission request
    ///
    /// Returns an `AdmissionResponse` that may carry a JSON patch, or a denial.
    async fn mutate(
        &self,
        req: &AdmissionRequest<DynamicObject>,
    ) -> Result<AdmissionResponse, Self::Err>;
}

#[async_trait]
pub trait ValidatingAdmissionHandler: Send + Sync {
    /// Error type returned by the handler
    type Err: StdError + Send + Sync + 'static;

    /// Returns the name of this handler for logging purposes
    fn name(&self) -> &'static str;

    /// Validates the resource in the admission request
    ///
    /// Returns an `AdmissionResponse` that either accepts or denies the request.
    async fn validate(
        &self,
        req: &AdmissionRequest<DynamicObject>,
    ) -> Result<AdmissionResponse, Self::Err>;
}

/// Defaulting and validation for [`Service`] resources
///
/// Requests for other kinds, and operations other than create and update,
/// are allowed unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceAdmission;

impl ServiceAdmission {
    fn handles(req: &AdmissionRequest<DynamicObject>) -> bool {
        matches!(req.operation, Operation::Create | Operation::Update)
            && req.kind.group == Service::group(&())
            && req.kind.kind == Service::kind(&())
    }

    fn decode(obj: Option<&DynamicObject>) -> Result<Option<Service>> {
        Ok(obj.cloned().map(DynamicObject::try_parse::<Service>).transpose()?)
    }
}

#[async_trait]
impl MutatingAdmissionHandler for ServiceAdmission {
    type Err = Error;

    fn name(&self) -> &'static str {
        "ServiceAdmission"
    }

    async fn mutate(&self, req: &AdmissionRequest<DynamicObject>) -> Result<AdmissionResponse> {
        let res = AdmissionResponse::from(req);
        if !Self::handles(req) {
            return Ok(res);
        }
        let Some(original) = Self::decode(req.object.as_ref())? else {
            return Ok(res);
        };
        let old = Self::decode(req.old_object.as_ref())?;

        let mut patches = Vec::new();
        set_service_defaults(&mut patches, &original)?;

        // validate what will be persisted: the submitted object with its defaults
        let mut doc = serde_json::to_value(&original)?;
        patch::apply(&mut doc, &patches)?;
        let defaulted: Service = serde_json::from_value(doc)?;

        if let Err(errors) = validate_service(old.as_ref(), &defaulted, &original) {
            return Ok(res.deny(errors.to_string()));
        }

        if patches.is_empty() {
            return Ok(res);
        }
        Ok(res.with_patch(patch::into_patch(patches))?)
    }
}

#[async_trait]
impl ValidatingAdmissionHandler for ServiceAdmission {
    type Err = Error;

    fn name(&self) -> &'static str {
        "ServiceAdmission"
    }

    async fn validate(&self, req: &AdmissionRequest<DynamicObject>) -> Result<AdmissionResponse> {
        let res = AdmissionResponse::from(req);
        if !Self::handles(req) {
            return Ok(res);
        }
        let Some(new) = Self::decode(req.object.as_ref())? else {
            return Ok(res);
        };
        let old = Self::decode(req.old_object.as_ref())?;

        match validate_service(old.as_ref(), &new, &new) {
            Ok(()) => Ok(res),
            Err(errors) => Ok(res.deny(errors.to_string())),
        }
    }
}

/// Runs registered admission handlers against admission reviews
///
/// Build one with [`AdmissionController::builder`].
pub struct AdmissionController<E> {
    mutators: Vec<Box<dyn MutatingAdmissionHandler<Err = E>>>,
    validators: Vec<Box<dyn ValidatingAdmissionHandler<Err = E>>>,
}

#[doc(hidden)]
pub struct AdmissionControllerBuilder<E> {
    mutators: Vec<Box<dyn MutatingAdmissionHandler<Err = E>>>,
    validators: Vec<Box<dyn ValidatingAdmissionHandler<Err = E>>>,
}

impl<E> AdmissionControllerBuilder<E>
where
    E: StdError + Send + Sync + 'static,
{
    /// Registers a mutating handler
    ///
    /// Handlers run in registration order and their patches are concatenated.
    #[must_use]
    pub fn mutator<H>(mut self, handler: H) -> Self
    where
        H: MutatingAdmissionHandler<Err = E> + 'static,
    {
        self.mutators.push(Box::new(handler));
        self
    }

    /// Registers a validating handler
    ///
    /// Handlers run in registration order; the first denial wins.
    #[must_use]
    pub fn validator<H>(mut self, handler: H) -> Self
    where
        H: ValidatingAdmissionHandler<Err = E> + 'static,
    {
        self.validators.push(Box::new(handler));
        self
    }

    pub fn build(self) -> AdmissionController<E> {
        AdmissionController {
            mutators: self.mutators,
            validators: self.validators,
        }
    }
}

impl<E> AdmissionController<E>
where
    E: StdError + Send + Sync + 'static,
{
    /// Start building an admission controller
    #[must_use]
    pub fn builder() -> AdmissionControllerBuilder<E> {
        AdmissionControllerBuilder {
            mutators: Vec::new(),
            validators: Vec::new(),
        }
    }

    /// Answers a mutating admission review
    pub async fn mutate(
        &self,
        review: AdmissionReview<DynamicObject>,
    ) -> AdmissionReview<DynamicObject> {
        let req = match into_request(review) {
            Ok(req) => req,
            Err(res) => return res.into_review(),
        };

        let mut res = AdmissionResponse::from(&req);

        if let Some(obj) = &req.object {
            let name = obj.name_any();
            let kind = &req.kind.kind;

            for handler in &self.mutators {
                match handler.mutate(&req).await {
                    Ok(handler_res) => {
                        res = merge_responses(res, handler_res);
                        if !res.allowed {
                            warn!(
                                handler = handler.name(),
                                operation = ?req.operation,
                                kind = %kind,
                                name = %name,
                                reason = %res.result.message,
                                "mutation denied"
                            );
                            break;
                        }
                        info!(
                            handler = handler.name(),
                            operation = ?req.operation,
                            kind = %kind,
                            name = %name,
                            "mutated resource"
                        );
                    }
                    Err(err) => {
                        error!(
                            handler = handler.name(),
                            operation = ?req.operation,
                            kind = %kind,
                            name = %name,
                            error = %err,
                            "mutation failed"
                        );
                        // partial patches from earlier handlers are dropped
                        res = AdmissionResponse::from(&req)
                            .deny(format!("{}: {}", handler.name(), err));
                        break;
                    }
                }
            }
        }

        res.into_review()
    }

    /// Answers a validating admission review
    pub async fn validate(
        &self,
        review: AdmissionReview<DynamicObject>,
    ) -> AdmissionReview<DynamicObject> {
        let req = match into_request(review) {
            Ok(req) => req,
            Err(res) => return res.into_review(),
        };

        let mut res = AdmissionResponse::from(&req);

        if let Some(obj) = &req.object {
            let name = obj.name_any();
            let kind = &req.kind.kind;

            for handler in &self.validators {
                match handler.validate(&req).await {
                    Ok(handler_res) => {
                        if !handler_res.allowed {
                            warn!(
                                handler = handler.name(),
                                operation = ?req.operation,
                                kind = %kind,
                                name = %name,
                                reason = %handler_res.result.message,
                                "validation denied"
                            );
                            res = handler_res;
                            break;
                        }
                        info!(
                            handler = handler.name(),
                            operation = ?req.operation,
                            kind = %kind,
                            name = %name,
                            "validation passed"
                        );
                    }
                    Err(err) => {
                        error!(
                            handler = handler.name(),
                            operation = ?req.operation,
                            kind = %kind,
                            name = %name,
                            error = %err,
                            "validation error"
                        );
                        res = res.deny(format!("{}: {}", handler.name(), err));
                        break;
                    }
                }
            }
        }

        res.into_review()
    }
}

fn into_request(
    review: AdmissionReview<DynamicObject>,
) -> Result<AdmissionRequest<DynamicObject>, AdmissionResponse> {
    review.try_into().map_err(|err: ConvertAdmissionReviewError| {
        error!(error = %err, "invalid admission request");
        AdmissionResponse::invalid(err.to_string())
    })
}

/// Combines two handler responses, concatenating their patches
///
/// A denial in `other` replaces `base` entirely.
fn merge_responses(base: AdmissionResponse, other: AdmissionResponse) -> AdmissionResponse {
    use json_patch::Patch;

    if !other.allowed {
        return other;
    }

    let Some(base_patch) = base.patch.as_deref() else {
        return other;
    };
    let Some(other_patch) = other.patch.as_deref() else {
        return base;
    };

    let (Ok(Patch(mut operations)), Ok(Patch(other_operations))) = (
        serde_json::from_slice::<Patch>(base_patch),
        serde_json::from_slice::<Patch>(other_patch),
    ) else {
        debug!("unreadable patch in handler response, keeping the first");
        return base;
    };
    operations.extend(other_operations);

    match other.with_patch(Patch(operations)) {
        Ok(merged) => merged,
        Err(err) => {
            error!(error = %err, "failed to merge admission patches");
            base
        }
    }
}
