//! Sink factory - selects the single active sink from configuration

use tracing::{info, instrument};

use contracts::{HubError, LogFormat, LoggingConfig};

use crate::handle::SinkHandle;
use crate::plugin::PluginRegistry;
use crate::sinks::{FramedSink, HexdumpSink, NullSink, RawSink};

/// Create the SinkHandle for a logging configuration
///
/// Disabled logging yields the no-op sink. Plugin names are resolved here,
/// once, so an unknown plugin fails startup.
#[instrument(
    name = "traffic_log_create_sink",
    skip(config, registry),
    fields(enabled = config.enabled, format = %config.format)
)]
pub fn create_sink(
    config: &LoggingConfig,
    registry: &PluginRegistry,
) -> Result<SinkHandle, HubError> {
    if !config.enabled {
        return Ok(SinkHandle::new(NullSink::new()));
    }

    let path = config.output_path();
    let handle = match &config.format {
        LogFormat::Raw => SinkHandle::new(RawSink::new("raw", &path)),
        LogFormat::Framed => SinkHandle::new(FramedSink::new("framed", &path)),
        LogFormat::Hexdump => SinkHandle::new(HexdumpSink::new("hexdump", &path)),
        LogFormat::Plugin(name) => SinkHandle::from_boxed(registry.resolve(name, path.clone())?),
    };

    info!(sink = %handle.name(), path = %path.display(), "Traffic log configured");
    Ok(handle)
}
