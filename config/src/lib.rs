//! # mirrorsync configuration
//!
//! The configuration document consumed by the sync engine: an ordered list
//! of [`Mapping`] records, a map of persisted per-project flags, and global
//! [`Settings`]. This crate owns the on-disk JSON representation, its
//! validation and path normalization, and the reload-marker file used for
//! cross-process reload signaling.

pub mod error;
pub mod mapping;
pub mod reload;
pub mod settings;
pub mod store;

pub use error::{ConfigError, Result};
pub use mapping::Mapping;
pub use reload::RELOAD_MARKER;
pub use settings::Settings;
pub use store::{Config, ConfigStore, ProjectFlag, ProjectFlags};
