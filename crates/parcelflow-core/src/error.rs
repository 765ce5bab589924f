//! The error type returned by fallible injection operations.

use crate::{ConfigError, LocateError};

/// Error in constructing or running an injection model.
///
/// Every variant is fatal to the run.
/// Recoverable conditions, like a candidate parcel position outside the mesh,
/// never show up here; they are absorbed where they happen.
#[derive(thiserror::Error, Debug)]
pub enum InjectionError {
    /// The model or one of its strategies was configured incorrectly.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A position required to be inside the mesh wasn't.
    #[error(transparent)]
    Locate(#[from] LocateError),
    /// A strategy produced a parcel the cloud can't accept.
    #[error("Invalid parcel properties: {reason}")]
    InvalidParcel {
        /// What was wrong with the parcel.
        reason: String,
    },
    /// Another partition failed during the same collective call.
    #[error("Injection failed on another partition")]
    RemoteFailure,
}
