use kube::core::admission::SerializePatchError;
use kube::core::dynamic::ParseDynamicObjectError;
use thiserror::Error;

/// Errors that can occur while admitting a resource
#[derive(Error, Debug)]
pub enum Error {
    /// Error during JSON serialization/deserialization of an object
    #[error("SerializationError: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A computed patch does not apply to the object it was computed for
    #[error("PatchError: {0}")]
    Patch(#[from] json_patch::PatchError),

    /// The patch could not be embedded into an admission response
    #[error("SerializePatchError: {0}")]
    SerializePatch(#[from] SerializePatchError),

    /// The admitted object could not be decoded into the expected resource
    #[error("InvalidObject: {0}")]
    InvalidObject(#[from] ParseDynamicObjectError),
}

/// Result type for admission operations
pub type Result<T, E = Error> = std::result::Result<T, E>;
