//! Configuration schema.
//!
//! Every field has a default, so an empty document is a valid configuration.
//! Unknown keys are rejected rather than ignored: a typo in a deployment file
//! should fail loudly at startup.
//!
//! ```toml
//! schema_version = "1.0.0"
//! run_id_prefix  = "run_"
//!
//! [storage]
//! backend = "filesystem"
//! dir     = "interlock_data"
//!
//! [logging]
//! filter = "info"
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use interlock_contracts::envelope::SCHEMA_VERSION;

/// Where snapshots and event logs are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackend {
    /// Process memory only; lost on exit.
    Memory,
    /// `runs/<run_id>/…` files under `storage.dir`.
    #[default]
    Filesystem,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            dir: PathBuf::from("interlock_data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// An `EnvFilter` directive, used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InterlockConfig {
    /// Envelope version the server issues and accepts.
    pub schema_version: String,

    /// Prefix for generated run ids.
    pub run_id_prefix: String,

    pub storage: StorageConfig,

    pub logging: LoggingConfig,
}

impl Default for InterlockConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            run_id_prefix: "run_".to_string(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
