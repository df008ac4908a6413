//! RawSink - payload bytes concatenated verbatim

use contracts::{HubError, PeerAddr, TrafficSink};
use std::path::PathBuf;
use tracing::{instrument, trace};

use super::AppendFile;

/// Sink that appends every chunk verbatim, with no framing
pub struct RawSink {
    name: String,
    out: AppendFile,
}

impl RawSink {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let name = name.into();
        Self {
            out: AppendFile::new(&name, path),
            name,
        }
    }
}

impl TrafficSink for RawSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "raw_sink_log", skip(self, data), fields(sink = %self.name, bytes = data.len()))]
    fn log(&mut self, peer: &PeerAddr, data: &[u8]) -> Result<(), HubError> {
        self.out.append(data)?;
        trace!(peer = %peer, "Raw chunk appended");
        Ok(())
    }

    fn flush(&mut self) -> Result<(), HubError> {
        self.out.flush()
    }

    fn close(&mut self) -> Result<(), HubError> {
        self.out.close()
    }
}
