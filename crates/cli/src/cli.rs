//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// sockethub - TCP relay hub
#[derive(Parser, Debug)]
#[command(
    name = "sockethub",
    author,
    version,
    about = "Any-to-all TCP relay hub",
    long_about = "Listens on and dials TCP endpoints, relaying every chunk received on one \n\
                  connection to every other live connection.\n\n\
                  Traffic can be logged to disk as raw bytes, framed records, a hexdump \n\
                  or through a named plugin."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SOCKETHUB_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "SOCKETHUB_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Colorize terminal output
    #[arg(long, global = true, env = "SOCKETHUB_COLOR")]
    pub color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the relay hub
    Run(HubArgs),

    /// Parse and validate the hub configuration without running
    Validate(ValidateArgs),
}

/// Endpoint, logging and status options shared by `run` and `validate`
#[derive(Args, Debug, Clone, Default)]
pub struct HubArgs {
    /// Listen on host:port[:max_connections] (repeatable)
    #[arg(
        short,
        long = "local",
        value_name = "HOST:PORT[:MAX]",
        env = "SOCKETHUB_LOCAL",
        value_delimiter = ','
    )]
    pub local: Vec<String>,

    /// Dial host:port[:auto_reconnect] (repeatable)
    #[arg(
        short,
        long = "remote",
        value_name = "HOST:PORT[:AUTO]",
        env = "SOCKETHUB_REMOTE",
        value_delimiter = ','
    )]
    pub remote: Vec<String>,

    /// Configuration file (TOML or JSON); flags override its values
    #[arg(short, long, env = "SOCKETHUB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log traffic to disk
    #[arg(long)]
    pub log: bool,

    /// Traffic log format (implies --log)
    #[arg(long, value_enum, conflicts_with = "logplugin")]
    pub logfmt: Option<LogFmt>,

    /// Log traffic through a named plugin (implies --log)
    #[arg(long, value_name = "NAME")]
    pub logplugin: Option<String>,

    /// Traffic log output path
    #[arg(long, value_name = "PATH", env = "SOCKETHUB_LOGFILE")]
    pub logfile: Option<PathBuf>,

    /// Show live status
    #[arg(long)]
    pub status: bool,

    /// Live status format
    #[arg(long, value_enum)]
    pub statusfmt: Option<StatusFmt>,

    /// Event loop tick in milliseconds
    #[arg(long, value_name = "MS", env = "SOCKETHUB_TICK_MS")]
    pub tick_ms: Option<u64>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "SOCKETHUB_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub hub: HubArgs,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Traffic log format
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFmt {
    /// Payload bytes verbatim
    Raw,
    /// Binary records with sync bytes, timestamp and peer
    #[value(alias = "framed")]
    Frames,
    /// Timestamped hexdump blocks
    Hexdump,
}

/// Live status format
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusFmt {
    /// Print every relayed chunk as a hexdump
    Hexdump,
    /// Periodic per-connection traffic table
    Table,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(value: LogFormat) -> Self {
        match value {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "sockethub",
            "run",
            "--local",
            "127.0.0.1:9000:2",
            "--remote",
            "127.0.0.1:9100",
            "--remote",
            "10.0.0.1:22:false",
            "--logfmt",
            "frames",
            "--status",
            "--statusfmt",
            "hexdump",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.local, vec!["127.0.0.1:9000:2"]);
        assert_eq!(args.remote.len(), 2);
        assert_eq!(args.logfmt, Some(LogFmt::Frames));
        assert!(args.status);
        assert_eq!(args.statusfmt, Some(StatusFmt::Hexdump));
    }

    #[test]
    fn test_logfmt_conflicts_with_plugin() {
        let result = Cli::try_parse_from([
            "sockethub",
            "run",
            "--local",
            "0.0.0.0:9000",
            "--logfmt",
            "raw",
            "--logplugin",
            "count",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_framed_alias() {
        let cli =
            Cli::try_parse_from(["sockethub", "validate", "--local", "h:1", "--logfmt", "framed"])
                .unwrap();
        let Commands::Validate(args) = cli.command else {
            panic!("expected validate");
        };
        assert_eq!(args.hub.logfmt, Some(LogFmt::Frames));
    }
}
