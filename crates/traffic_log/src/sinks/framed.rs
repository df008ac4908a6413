//! FramedSink - fixed binary header per chunk

use chrono::Utc;
use contracts::{HubError, PeerAddr, TrafficSink};
use std::path::PathBuf;
use tracing::instrument;

use super::AppendFile;
use crate::frame::encode_frame;

/// Sink that wraps each chunk in a framed record (see [`crate::frame`])
pub struct FramedSink {
    name: String,
    out: AppendFile,
}

impl FramedSink {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let name = name.into();
        Self {
            out: AppendFile::new(&name, path),
            name,
        }
    }

    /// Append one record with an explicit timestamp
    pub fn log_at(&mut self, timestamp: u32, peer: &PeerAddr, data: &[u8]) -> Result<(), HubError> {
        let record = encode_frame(timestamp, peer, data);
        self.out.append(&record)
    }
}

impl TrafficSink for FramedSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "framed_sink_log", skip(self, data), fields(sink = %self.name, bytes = data.len()))]
    fn log(&mut self, peer: &PeerAddr, data: &[u8]) -> Result<(), HubError> {
        // Seconds since the epoch, truncated to the 32-bit field.
        let timestamp = Utc::now().timestamp() as u32;
        self.log_at(timestamp, peer, data)
    }

    fn flush(&mut self) -> Result<(), HubError> {
        self.out.flush()
    }

    fn close(&mut self) -> Result<(), HubError> {
        self.out.close()
    }
}
