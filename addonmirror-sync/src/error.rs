//! Error types for addonmirror-sync.

use thiserror::Error;

use addonmirror_core::{CoreError, ProfileName, StoreError, ValidationError};

/// Failures at the remote addon service boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The addon has no transport URL to fetch from.
    #[error("addon has no transport URL")]
    NoUrl,

    /// The profile has no credential yet; no call was attempted.
    #[error("profile '{0}' is not logged in")]
    NoCredential(ProfileName),

    /// Transport failure, timeout, or HTTP error status.
    #[error("network error: {0}")]
    Network(String),

    /// The remote answered with something that is not the expected document.
    #[error("unexpected response: {0}")]
    BadResponse(String),

    /// The remote refused a collection push.
    #[error("remote rejected the update: {0}")]
    Rejected(String),
}

/// Failures of in-memory collection edits.
#[derive(Debug, Error)]
pub enum EditError {
    #[error("addon '{0}' has no configurable catalogs")]
    NoCatalogs(String),

    #[error("addon '{0}' needs at least two enabled catalogs to reorder")]
    TooFewCatalogs(String),

    #[error("unknown catalog id '{0}'")]
    UnknownCatalog(String),

    #[error("position {position} is out of range (1..={len})")]
    OutOfRange { position: usize, len: usize },

    #[error("no addon matches '{0}'")]
    AddonNotFound(String),

    #[error("addon {0} is already installed")]
    AlreadyInstalled(String),

    /// Fetching a manifest failed during a reset or install.
    #[error("could not fetch manifest: {0}")]
    Manifest(#[source] RemoteError),
}

/// All errors that can arise from sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("profile '{0}' does not mirror another profile")]
    NotAMirror(ProfileName),

    /// A background worker panicked or was cancelled.
    #[error("background worker failed: {0}")]
    Worker(String),
}

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => Self::Validation(e),
            CoreError::Store(e) => Self::Store(e),
        }
    }
}
