//! # interlock-config
//!
//! TOML configuration for the Interlock server.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use interlock_config::InterlockConfig;
//!
//! let config = InterlockConfig::from_file(Path::new("interlock.toml"))?;
//! // Pass `config` to `interlock_runtime::build_orchestrator(...)`.
//! ```

pub mod loader;
pub mod settings;

pub use settings::{InterlockConfig, LoggingConfig, StorageBackend, StorageConfig};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::{Path, PathBuf};

    use interlock_contracts::{envelope::SCHEMA_VERSION, error::InterlockError};

    use super::{InterlockConfig, StorageBackend};

    fn expect_config_error(result: Result<InterlockConfig, InterlockError>) -> String {
        match result {
            Err(InterlockError::ConfigError { reason }) => reason,
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = InterlockConfig::from_toml_str("").unwrap();
        assert_eq!(config, InterlockConfig::default());
        assert_eq!(config.schema_version, SCHEMA_VERSION);
        assert_eq!(config.run_id_prefix, "run_");
        assert_eq!(config.storage.backend, StorageBackend::Filesystem);
        assert_eq!(config.storage.dir, PathBuf::from("interlock_data"));
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_full_document() {
        let config = InterlockConfig::from_toml_str(
            r#"
            schema_version = "2.0.0"
            run_id_prefix = "ops_"

            [storage]
            backend = "memory"

            [logging]
            filter = "interlock_core=debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.schema_version, "2.0.0");
        assert_eq!(config.run_id_prefix, "ops_");
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.logging.filter, "interlock_core=debug");
    }

    #[test]
    fn test_unknown_key_rejected() {
        let reason = expect_config_error(InterlockConfig::from_toml_str("schema_versoin = \"1.0.0\""));
        assert!(reason.contains("failed to parse config TOML"));

        expect_config_error(InterlockConfig::from_toml_str("[storage]\npath = \"x\""));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        expect_config_error(InterlockConfig::from_toml_str("[storage]\nbackend = \"s3\""));
    }

    #[test]
    fn test_validate_rejects_blank_values() {
        let reason = expect_config_error(InterlockConfig::from_toml_str("schema_version = \"  \""));
        assert!(reason.contains("schema_version"));

        let reason = expect_config_error(InterlockConfig::from_toml_str("run_id_prefix = \"\""));
        assert!(reason.contains("run_id_prefix"));

        let reason = expect_config_error(InterlockConfig::from_toml_str("[storage]\ndir = \"\""));
        assert!(reason.contains("storage.dir"));

        InterlockConfig::from_toml_str("[storage]\nbackend = \"memory\"\ndir = \"\"").unwrap();
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "run_id_prefix = \"file_\"").unwrap();
        let config = InterlockConfig::from_file(file.path()).unwrap();
        assert_eq!(config.run_id_prefix, "file_");

        let reason = expect_config_error(InterlockConfig::from_file(Path::new(
            "/nonexistent/interlock.toml",
        )));
        assert!(reason.contains("failed to read config file"));
    }
}
