//! Merge defaults, the optional config file and command-line flags into a `HubConfig`.

use contracts::{HubConfig, LogFormat, StatusFormat};
use tracing::{debug, info};

use crate::cli::{HubArgs, LogFmt, StatusFmt};
use crate::error::{CliError, Result};

/// Build and validate the effective configuration.
///
/// Precedence, lowest first: built-in defaults, `--config` file, flags.
/// Endpoints from flags are appended to those from the file.
pub fn build_config(args: &HubArgs) -> Result<HubConfig> {
    let mut config = match &args.config {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::config_not_found(path.display().to_string()));
            }
            info!(config = %path.display(), "Loading configuration");
            config_loader::ConfigLoader::load_from_path(path)?
        }
        None => HubConfig::default(),
    };

    for value in &args.local {
        let spec = config_loader::parse_listen_spec(value)
            .map_err(|e| CliError::invalid_endpoint("local", value, e))?;
        config.listen.push(spec);
    }
    for value in &args.remote {
        let spec = config_loader::parse_remote_spec(value)
            .map_err(|e| CliError::invalid_endpoint("remote", value, e))?;
        config.remote.push(spec);
    }

    if args.log || args.logfmt.is_some() || args.logplugin.is_some() {
        config.logging.enabled = true;
    }
    if let Some(name) = &args.logplugin {
        config.logging.format = LogFormat::Plugin(name.clone());
    } else if let Some(fmt) = args.logfmt {
        config.logging.format = match fmt {
            LogFmt::Raw => LogFormat::Raw,
            LogFmt::Frames => LogFormat::Framed,
            LogFmt::Hexdump => LogFormat::Hexdump,
        };
    }
    if let Some(path) = &args.logfile {
        config.logging.path = Some(path.clone());
    }

    if args.status {
        config.status.enabled = true;
    }
    if let Some(fmt) = args.statusfmt {
        config.status.format = match fmt {
            StatusFmt::Hexdump => StatusFormat::Hexdump,
            StatusFmt::Table => StatusFormat::Table,
        };
    }

    if let Some(tick_ms) = args.tick_ms {
        config.engine.tick_ms = tick_ms;
    }

    config_loader::validate(&config)?;
    debug!(
        listeners = config.listen.len(),
        remotes = config.remote.len(),
        logging = config.logging.enabled,
        status = config.status.enabled,
        "Configuration resolved"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn args() -> HubArgs {
        HubArgs::default()
    }

    #[test]
    fn test_flags_only() {
        let config = build_config(&HubArgs {
            local: vec!["127.0.0.1:9000:2".into()],
            remote: vec!["127.0.0.1:9100".into()],
            ..args()
        })
        .unwrap();

        assert_eq!(config.listen.len(), 1);
        assert_eq!(config.listen[0].max_connections, 2);
        assert_eq!(config.remote.len(), 1);
        assert!(config.remote[0].auto_reconnect);
        assert!(!config.logging.enabled);
        assert!(!config.status.enabled);
    }

    #[test]
    fn test_listen_and_remote_together_allowed() {
        let config = build_config(&HubArgs {
            local: vec!["0.0.0.0:9000".into()],
            remote: vec!["10.0.0.1:9000:0".into()],
            ..args()
        })
        .unwrap();
        assert_eq!(config.endpoint_count(), 2);
        assert!(!config.remote[0].auto_reconnect);
    }

    #[test]
    fn test_no_endpoints_rejected() {
        let err = build_config(&args()).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_bad_port_rejected() {
        let err = build_config(&HubArgs {
            local: vec!["127.0.0.1:99999".into()],
            ..args()
        })
        .unwrap_err();
        assert!(matches!(err, CliError::InvalidEndpoint { flag: "local", .. }));
    }

    #[test]
    fn test_logfmt_implies_logging() {
        let config = build_config(&HubArgs {
            local: vec!["127.0.0.1:0".into()],
            logfmt: Some(LogFmt::Hexdump),
            ..args()
        })
        .unwrap();
        assert!(config.logging.enabled);
        assert_eq!(config.logging.format, LogFormat::Hexdump);
    }

    #[test]
    fn test_status_flag_does_not_enable_logging() {
        let config = build_config(&HubArgs {
            local: vec!["127.0.0.1:0".into()],
            status: true,
            statusfmt: Some(StatusFmt::Hexdump),
            ..args()
        })
        .unwrap();
        assert!(config.status.enabled);
        assert_eq!(config.status.format, StatusFormat::Hexdump);
        assert!(!config.logging.enabled);
    }

    #[test]
    fn test_plugin_format() {
        let config = build_config(&HubArgs {
            local: vec!["127.0.0.1:0".into()],
            logplugin: Some("count".into()),
            ..args()
        })
        .unwrap();
        assert_eq!(config.logging.format, LogFormat::Plugin("count".into()));
    }

    #[test]
    fn test_file_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hub.toml");
        fs::write(
            &path,
            r#"
[[listen]]
host = "127.0.0.1"
port = 7000

[logging]
enabled = true
format = "raw"

[engine]
tick_ms = 50
"#,
        )
        .unwrap();

        let config = build_config(&HubArgs {
            config: Some(path),
            local: vec!["127.0.0.1:7001".into()],
            logfmt: Some(LogFmt::Frames),
            tick_ms: Some(10),
            ..args()
        })
        .unwrap();

        assert_eq!(config.listen.len(), 2);
        assert_eq!(config.listen[0].port, 7000);
        assert_eq!(config.listen[0].max_connections, 10);
        assert_eq!(config.logging.format, LogFormat::Framed);
        assert_eq!(config.engine.tick_ms, 10);
    }

    #[test]
    fn test_missing_config_file() {
        let err = build_config(&HubArgs {
            config: Some("/nonexistent/hub.toml".into()),
            ..args()
        })
        .unwrap_err();
        assert!(matches!(err, CliError::ConfigNotFound { .. }));
    }
}
