//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse `host:port[:...]` endpoint specs from the command line
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Produce a `HubConfig`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("hub.toml")).unwrap();
//! println!("Listeners: {}", config.listen.len());
//! ```

mod endpoint_spec;
mod parser;
mod validator;

pub use contracts::HubConfig;
pub use endpoint_spec::{parse_listen_spec, parse_port, parse_remote_spec};
pub use parser::ConfigFormat;
pub use validator::validate;

use contracts::HubError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    /// The result is parsed but not validated: command-line endpoints may
    /// still be merged in before [`validate`] runs.
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    pub fn load_from_path(path: &Path) -> Result<HubConfig, HubError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        parser::parse(&content, format)
    }

    /// Load and validate configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<HubConfig, HubError> {
        Self::parse_and_validate(content, format)
    }

    /// Serialize HubConfig to TOML string
    pub fn to_toml(config: &HubConfig) -> Result<String, HubError> {
        toml::to_string_pretty(config)
            .map_err(|e| HubError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize HubConfig to JSON string
    pub fn to_json(config: &HubConfig) -> Result<String, HubError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| HubError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, HubError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            HubError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext)
            .ok_or_else(|| HubError::config_parse(format!("unsupported config format: .{ext}")))
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, HubError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(content: &str, format: ConfigFormat) -> Result<HubConfig, HubError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL_TOML: &str = r#"
[[listen]]
host = "127.0.0.1"
port = 9000
max_connections = 2

[[remote]]
host = "127.0.0.1"
port = 9100
auto_reconnect = false

[logging]
enabled = true
format = "hexdump"
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let cfg = result.unwrap();
        assert_eq!(cfg.listen[0].port, 9000);
        assert!(!cfg.remote[0].auto_reconnect);
    }

    #[test]
    fn test_round_trip_toml() {
        let cfg = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&cfg).unwrap();
        let cfg2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(cfg.listen, cfg2.listen);
        assert_eq!(cfg.remote, cfg2.remote);
        assert_eq!(cfg.logging.format, cfg2.logging.format);
    }

    #[test]
    fn test_round_trip_json() {
        let cfg = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&cfg).unwrap();
        let cfg2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(cfg.listen, cfg2.listen);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = r#"
[[listen]]
host = "127.0.0.1"
port = 9000
max_connections = 0
"#;
        let result = ConfigLoader::load_from_str(content, ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("max_connections"));
    }

    #[test]
    fn test_load_from_path_detects_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hub.toml");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(MINIMAL_TOML.as_bytes())
            .unwrap();

        let cfg = ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(cfg.listen.len(), 1);

        let bad = dir.path().join("hub.yaml");
        std::fs::write(&bad, "listen: []").unwrap();
        let err = ConfigLoader::load_from_path(&bad).unwrap_err().to_string();
        assert!(err.contains("unsupported config format"), "got: {err}");
    }
}
