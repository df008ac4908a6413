//! TraceSink - logs chunk summaries via tracing (built-in `trace` plugin)

use contracts::{HubError, PeerAddr, TrafficSink};
use tracing::{info, instrument};

/// Sink that logs chunk summaries for debugging
pub struct TraceSink {
    name: String,
    chunks: u64,
    bytes: u64,
}

impl TraceSink {
    /// Create a new TraceSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chunks: 0,
            bytes: 0,
        }
    }

    fn log_chunk_summary(&self, peer: &PeerAddr, data: &[u8]) {
        let preview: String = data
            .iter()
            .take(16)
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
            .collect();

        info!(
            sink = %self.name,
            peer = %peer,
            bytes = data.len(),
            chunk = self.chunks,
            preview = %preview,
            "Chunk received"
        );
    }
}

impl TrafficSink for TraceSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "trace_sink_log", skip(self, peer, data), fields(sink = %self.name))]
    fn log(&mut self, peer: &PeerAddr, data: &[u8]) -> Result<(), HubError> {
        self.chunks += 1;
        self.bytes += data.len() as u64;
        self.log_chunk_summary(peer, data);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), HubError> {
        // Nothing to flush for trace sink
        Ok(())
    }

    #[instrument(name = "trace_sink_close", skip(self))]
    fn close(&mut self) -> Result<(), HubError> {
        info!(
            sink = %self.name,
            chunks = self.chunks,
            bytes = self.bytes,
            "TraceSink closed"
        );
        Ok(())
    }
}
