//! HubConfig - Config Loader output
//!
//! 描述完整的 hub 配置：监听端点、外呼端点、流量日志、状态显示、事件循环参数。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::HubError;

/// Default cap on accepted connections per listening endpoint
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;

/// Dialing endpoints reconnect unless told otherwise
pub const DEFAULT_AUTO_RECONNECT: bool = true;

/// Complete hub configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubConfig {
    /// Local ports to accept connections on
    #[serde(default)]
    pub listen: Vec<ListenSpec>,

    /// Remote hosts to dial
    #[serde(default)]
    pub remote: Vec<DialSpec>,

    /// Traffic log settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Live status display settings
    #[serde(default)]
    pub status: StatusConfig,

    /// Event loop tuning
    #[serde(default)]
    pub engine: EngineConfig,

    /// Outbound connect retry policy
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl HubConfig {
    /// Total number of configured endpoints
    pub fn endpoint_count(&self) -> usize {
        self.listen.len() + self.remote.len()
    }
}

/// Listening endpoint: `host:port[:max_connections]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenSpec {
    pub host: String,
    pub port: u16,

    /// Must be >= 1
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl ListenSpec {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }
}

impl fmt::Display for ListenSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_host_port(f, &self.host, self.port)
    }
}

/// Dialing endpoint: `host:port[:auto_reconnect]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialSpec {
    pub host: String,
    pub port: u16,

    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,
}

impl DialSpec {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            auto_reconnect: DEFAULT_AUTO_RECONNECT,
        }
    }

    pub fn with_auto_reconnect(mut self, auto_reconnect: bool) -> Self {
        self.auto_reconnect = auto_reconnect;
        self
    }
}

impl fmt::Display for DialSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_host_port(f, &self.host, self.port)
    }
}

/// IPv6 literals are bracketed so the result parses as a socket address
fn write_host_port(f: &mut fmt::Formatter<'_>, host: &str, port: u16) -> fmt::Result {
    if host.contains(':') {
        write!(f, "[{host}]:{port}")
    } else {
        write!(f, "{host}:{port}")
    }
}

fn default_max_connections() -> usize {
    DEFAULT_MAX_CONNECTIONS
}

fn default_auto_reconnect() -> bool {
    DEFAULT_AUTO_RECONNECT
}

/// On-disk traffic log format
///
/// Text form: `raw`, `framed` (alias `frames`), `hexdump` (alias `hex`), `plugin:<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogFormat {
    /// Payload bytes concatenated verbatim
    #[default]
    Raw,
    /// Fixed binary header per chunk
    Framed,
    /// Timestamp + peer line followed by an indented hexdump
    Hexdump,
    /// Named sink resolved from the plugin registry
    Plugin(String),
}

impl LogFormat {
    /// File extension used when no explicit output path is configured
    pub fn default_extension(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Framed => "frames",
            Self::Hexdump => "hex",
            Self::Plugin(_) => "plugin",
        }
    }
}

impl FromStr for LogFormat {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(name) = s.strip_prefix("plugin:") {
            return Ok(Self::Plugin(name.to_string()));
        }
        match s.to_lowercase().as_str() {
            "raw" => Ok(Self::Raw),
            "framed" | "frames" => Ok(Self::Framed),
            "hexdump" | "hex" => Ok(Self::Hexdump),
            other => Err(HubError::config_parse(format!(
                "unknown log format '{other}' (expected raw, frames, hexdump or plugin:<name>)"
            ))),
        }
    }
}

impl TryFrom<String> for LogFormat {
    type Error = HubError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LogFormat> for String {
    fn from(value: LogFormat) -> Self {
        value.to_string()
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw => f.write_str("raw"),
            Self::Framed => f.write_str("framed"),
            Self::Hexdump => f.write_str("hexdump"),
            Self::Plugin(name) => write!(f, "plugin:{name}"),
        }
    }
}

/// Traffic log configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Persist traffic to disk
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub format: LogFormat,

    /// Output file; defaults to `sockethub.<ext>` in the working directory
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl LoggingConfig {
    /// Resolved output path
    pub fn output_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            PathBuf::from(format!("sockethub.{}", self.format.default_extension()))
        })
    }
}

/// Live status display format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFormat {
    /// Print every relayed chunk as a hexdump block
    Hexdump,
    /// Periodic per-connection stats table
    #[default]
    Table,
}

/// Live status display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub format: StatusFormat,

    /// Minimum time between two table renders
    #[serde(default = "default_status_interval_ms")]
    pub interval_ms: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            format: StatusFormat::default(),
            interval_ms: default_status_interval_ms(),
        }
    }
}

impl StatusConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_status_interval_ms() -> u64 {
    1000
}

/// Event loop tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Sleep at the top of every tick (bounds CPU usage)
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Upper bound on the readiness wait
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Bytes received per readable connection per tick
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Queued outbound bytes after which a connection is dropped as stalled
    #[serde(default = "default_max_pending_bytes")]
    pub max_pending_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            poll_timeout_ms: default_poll_timeout_ms(),
            chunk_size: default_chunk_size(),
            max_pending_bytes: default_max_pending_bytes(),
        }
    }
}

impl EngineConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

fn default_tick_ms() -> u64 {
    100
}

fn default_poll_timeout_ms() -> u64 {
    100
}

fn default_chunk_size() -> usize {
    4096
}

fn default_max_pending_bytes() -> usize {
    4 * 1024 * 1024
}

/// Outbound connect retry policy
///
/// Attempt `n` (1-based) is bounded by `min(initial_timeout * n, max_timeout)`;
/// after an immediate failure the task waits `min(retry_delay * n, max_timeout)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_initial_timeout_ms")]
    pub initial_timeout_ms: u64,

    #[serde(default = "default_max_timeout_ms")]
    pub max_timeout_ms: u64,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_timeout_ms: default_initial_timeout_ms(),
            max_timeout_ms: default_max_timeout_ms(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl ReconnectConfig {
    /// Connect timeout for the given 1-based attempt
    pub fn timeout_for(&self, attempt: u32) -> Duration {
        let ms = self
            .initial_timeout_ms
            .saturating_mul(u64::from(attempt.max(1)))
            .min(self.max_timeout_ms);
        Duration::from_millis(ms)
    }

    /// Pause after an attempt that failed before its timeout
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let ms = self
            .retry_delay_ms
            .saturating_mul(u64::from(attempt.max(1)))
            .min(self.max_timeout_ms);
        Duration::from_millis(ms)
    }
}

fn default_initial_timeout_ms() -> u64 {
    1000
}

fn default_max_timeout_ms() -> u64 {
    10_000
}

fn default_retry_delay_ms() -> u64 {
    250
}
