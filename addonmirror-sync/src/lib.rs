//! # addonmirror-sync
//!
//! Remote access, mirror reconciliation and collection editing.
//!
//! [`SyncEngine`] composes a [`ProfileStore`](addonmirror_core::ProfileStore)
//! with an [`AddonRemote`]. Use [`SyncEngine::reconcile_all`] to bring every
//! mirror in line with its master, or [`Session`] to run the scan in the
//! background while user actions run on a joined worker.

pub mod canonical;
pub mod drift;
pub mod editor;
pub mod engine;
pub mod error;
pub mod remote;
pub mod session;
pub mod status;

pub use engine::{MirrorOutcome, SyncEngine, SyncReport};
pub use error::{EditError, RemoteError, SyncError};
pub use remote::{AddonRemote, HttpRemote};
pub use session::Session;
pub use status::{StatusBoard, SyncStatus};
