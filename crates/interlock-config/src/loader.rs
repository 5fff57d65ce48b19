//! Loading and validating `InterlockConfig`.

use std::path::Path;

use tracing::debug;

use interlock_contracts::error::{InterlockError, InterlockResult};

use crate::settings::{InterlockConfig, StorageBackend};

impl InterlockConfig {
    /// Parse `s` as TOML and validate the result.
    ///
    /// Returns `InterlockError::ConfigError` if the TOML is malformed, has
    /// keys the schema does not know, or fails `validate`.
    pub fn from_toml_str(s: &str) -> InterlockResult<Self> {
        let config: InterlockConfig = toml::from_str(s).map_err(|e| InterlockError::ConfigError {
            reason: format!("failed to parse config TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it as TOML configuration.
    pub fn from_file(path: &Path) -> InterlockResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| InterlockError::ConfigError {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        let config = Self::from_toml_str(&contents)?;
        debug!(
            path = %path.display(),
            backend = ?config.storage.backend,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Reject values that would leave the server unable to run.
    pub fn validate(&self) -> InterlockResult<()> {
        if self.schema_version.trim().is_empty() {
            return Err(config_error("schema_version must not be empty"));
        }
        if self.run_id_prefix.trim().is_empty() {
            return Err(config_error("run_id_prefix must not be empty"));
        }
        if self.storage.backend == StorageBackend::Filesystem
            && self.storage.dir.as_os_str().is_empty()
        {
            return Err(config_error("storage.dir must be set for the filesystem backend"));
        }
        Ok(())
    }
}

fn config_error(reason: &str) -> InterlockError {
    InterlockError::ConfigError {
        reason: reason.to_string(),
    }
}
