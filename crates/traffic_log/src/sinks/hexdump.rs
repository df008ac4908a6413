//! HexdumpSink - human-readable timestamp + peer header and indented hexdump

use chrono::Local;
use contracts::{HubError, PeerAddr, TrafficSink};
use std::path::PathBuf;
use tracing::instrument;

use super::AppendFile;
use crate::hexdump::format_block;

/// Sink that appends a hexdump block per chunk
pub struct HexdumpSink {
    name: String,
    out: AppendFile,
}

impl HexdumpSink {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let name = name.into();
        Self {
            out: AppendFile::new(&name, path),
            name,
        }
    }
}

impl TrafficSink for HexdumpSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "hexdump_sink_log", skip(self, data), fields(sink = %self.name, bytes = data.len()))]
    fn log(&mut self, peer: &PeerAddr, data: &[u8]) -> Result<(), HubError> {
        let block = format_block(Local::now(), peer, data);
        self.out.append(block.as_bytes())
    }

    fn flush(&mut self) -> Result<(), HubError> {
        self.out.flush()
    }

    fn close(&mut self) -> Result<(), HubError> {
        self.out.close()
    }
}
