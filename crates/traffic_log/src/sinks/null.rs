//! NullSink - active when disk logging is disabled

use contracts::{HubError, PeerAddr, TrafficSink};

#[derive(Debug, Default)]
pub struct NullSink;

impl NullSink {
    pub fn new() -> Self {
        Self
    }
}

impl TrafficSink for NullSink {
    fn name(&self) -> &str {
        "null"
    }

    fn log(&mut self, _peer: &PeerAddr, _data: &[u8]) -> Result<(), HubError> {
        Ok(())
    }

    fn flush(&mut self) -> Result<(), HubError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), HubError> {
        Ok(())
    }
}
