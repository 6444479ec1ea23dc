//! addonmirror core library: profile store, snapshots, configuration.
//!
//! - [`types`]: profile records, manifests, addon collections
//! - [`store`]: the persisted profile store
//! - [`backup`]: point-in-time collection snapshots
//! - [`config`]: user configuration and data root resolution
//! - [`error`]: [`StoreError`], [`ValidationError`], [`CoreError`]

pub mod backup;
pub mod config;
pub mod error;
pub mod paths;
pub mod store;
pub mod types;

pub use backup::{BackupManager, SnapshotInfo};
pub use config::Config;
pub use error::{CoreError, StoreError, ValidationError};
pub use paths::DataLayout;
pub use store::{ProfileStore, Profiles};
pub use types::{
    AddonCollection, AddonEntry, CatalogEntry, Manifest, Profile, ProfileName,
    MASTER_CATALOG_CACHE_KEY,
};
