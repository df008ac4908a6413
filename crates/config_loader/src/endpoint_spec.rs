//! Command-line endpoint specs.
//!
//! `host:port[:max_connections]` for listeners and `host:port[:auto_reconnect]`
//! for remotes.

use contracts::{DialSpec, HubError, ListenSpec, DEFAULT_AUTO_RECONNECT, DEFAULT_MAX_CONNECTIONS};

/// Parse a port number
pub fn parse_port(field: &str, raw: &str) -> Result<u16, HubError> {
    raw.parse::<u16>().map_err(|_| {
        HubError::config_validation(field, format!("port must be a number (got {raw:?})"))
    })
}

/// Split `host:rest...` on `:`, keeping a bracketed IPv6 host such as
/// `[::1]` in one piece (returned without the brackets)
fn split_spec(arg: &str) -> Option<Vec<&str>> {
    match arg.strip_prefix('[') {
        Some(bracketed) => {
            let (host, rest) = bracketed.split_once(']')?;
            let rest = rest.strip_prefix(':')?;
            let mut parts = vec![host];
            parts.extend(rest.split(':'));
            Some(parts)
        }
        None => Some(arg.split(':').collect()),
    }
}

/// Parse `host:port[:max_connections]`
pub fn parse_listen_spec(arg: &str) -> Result<ListenSpec, HubError> {
    let parts = match split_spec(arg) {
        Some(parts) if (2..=3).contains(&parts.len()) && !parts[0].is_empty() => parts,
        _ => {
            return Err(HubError::config_validation(
                "listen",
                format!("expected host:port[:max_connections] (got {arg})"),
            ))
        }
    };

    let host = parts[0].to_string();
    let port = parse_port("listen.port", parts[1])?;

    let max_connections = match parts.get(2) {
        Some(raw) => match raw.parse::<usize>() {
            Ok(n) if n >= 1 => n,
            _ => {
                return Err(HubError::config_validation(
                    "listen.max_connections",
                    format!("max_connections must be a positive number (got {raw:?})"),
                ))
            }
        },
        None => DEFAULT_MAX_CONNECTIONS,
    };

    Ok(ListenSpec {
        host,
        port,
        max_connections,
    })
}

/// Parse `host:port[:auto_reconnect]`, where `auto_reconnect` is `0/1` or `true/false`
pub fn parse_remote_spec(arg: &str) -> Result<DialSpec, HubError> {
    let parts = match split_spec(arg) {
        Some(parts) if (2..=3).contains(&parts.len()) && !parts[0].is_empty() => parts,
        _ => {
            return Err(HubError::config_validation(
                "remote",
                format!("expected host:port[:auto_reconnect] (got {arg})"),
            ))
        }
    };

    let host = parts[0].to_string();
    let port = parse_port("remote.port", parts[1])?;

    let auto_reconnect = match parts.get(2) {
        Some(raw) => match raw.to_lowercase().as_str() {
            "true" | "1" => true,
            "false" | "0" => false,
            _ => {
                return Err(HubError::config_validation(
                    "remote.auto_reconnect",
                    format!("auto_reconnect must be 0/1 or true/false (got {raw:?})"),
                ))
            }
        },
        None => DEFAULT_AUTO_RECONNECT,
    };

    Ok(DialSpec {
        host,
        port,
        auto_reconnect,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_spec_default_max() {
        let spec = parse_listen_spec("localhost:1234").unwrap();
        assert_eq!(spec.host, "localhost");
        assert_eq!(spec.port, 1234);
        assert_eq!(spec.max_connections, DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn test_listen_spec_explicit_max() {
        let spec = parse_listen_spec("0.0.0.0:9000:2").unwrap();
        assert_eq!(spec.max_connections, 2);
    }

    #[test]
    fn test_listen_spec_rejects_zero_max() {
        let err = parse_listen_spec("0.0.0.0:9000:0").unwrap_err().to_string();
        assert!(err.contains("positive number"), "got: {err}");
    }

    #[test]
    fn test_listen_spec_rejects_bad_port() {
        let err = parse_listen_spec("host:http").unwrap_err().to_string();
        assert!(err.contains("port must be a number"), "got: {err}");
        assert!(parse_listen_spec("host:70000").is_err());
    }

    #[test]
    fn test_listen_spec_rejects_missing_port() {
        assert!(parse_listen_spec("localhost").is_err());
    }

    #[test]
    fn test_bracketed_ipv6_host() {
        let spec = parse_listen_spec("[::1]:9000:3").unwrap();
        assert_eq!(spec.host, "::1");
        assert_eq!(spec.port, 9000);
        assert_eq!(spec.max_connections, 3);

        let remote = parse_remote_spec("[fe80::1]:7000:false").unwrap();
        assert_eq!(remote.host, "fe80::1");
        assert_eq!(remote.port, 7000);
        assert!(!remote.auto_reconnect);

        assert!(parse_listen_spec("[::1]9000").is_err());
        assert!(parse_listen_spec("[::1:9000").is_err());
        assert!(parse_remote_spec("::1:9000").is_err());
    }

    #[test]
    fn test_remote_spec_variants() {
        assert!(parse_remote_spec("h:1").unwrap().auto_reconnect);
        assert!(parse_remote_spec("h:1:True").unwrap().auto_reconnect);
        assert!(parse_remote_spec("h:1:1").unwrap().auto_reconnect);
        assert!(!parse_remote_spec("h:1:false").unwrap().auto_reconnect);
        assert!(!parse_remote_spec("h:1:0").unwrap().auto_reconnect);
        assert!(parse_remote_spec("h:1:maybe").is_err());
    }
}
