//! Configuration loading for schema synchronization.
//!
//! Table declarations can live in code (see
//! [`TableBuilder`](tablesync_core::TableBuilder)) or in files. This crate
//! reads the file form:
//!
//! - [`SyncConfig`]: YAML options plus inline or included tables
//! - [`load_tables`] / [`load_dir`]: bare declaration files in JSON or YAML
//!
//! # Quick start
//!
//! ```no_run
//! use tablesync_config::SyncConfig;
//!
//! let config = SyncConfig::load("tablesync.yml").unwrap();
//! let schema = config.schema().unwrap();
//! println!("{} tables declared", schema.len());
//! ```

mod config;
mod error;
mod loader;

pub use config::{CapabilityOverrides, SyncConfig};
pub use error::{ConfigError, Result};
pub use loader::{load_dir, load_path, load_tables};
