//! CountSink - one `timestamp peer bytes` line per chunk (built-in `count` plugin)

use chrono::Utc;
use contracts::{HubError, PeerAddr, TrafficSink};
use std::path::PathBuf;

use super::AppendFile;

pub struct CountSink {
    name: String,
    out: AppendFile,
}

impl CountSink {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let name = name.into();
        Self {
            out: AppendFile::new(&name, path),
            name,
        }
    }
}

impl TrafficSink for CountSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn log(&mut self, peer: &PeerAddr, data: &[u8]) -> Result<(), HubError> {
        let line = format!("{} {} {}\n", Utc::now().timestamp(), peer, data.len());
        self.out.append(line.as_bytes())
    }

    fn flush(&mut self) -> Result<(), HubError> {
        self.out.flush()
    }

    fn close(&mut self) -> Result<(), HubError> {
        self.out.close()
    }
}
