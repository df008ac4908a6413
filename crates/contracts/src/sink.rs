//! TrafficSink trait - Event Loop output interface
//!
//! Defines the single capability every traffic log variant provides.

use crate::{HubError, PeerAddr};

/// Traffic persistence trait
///
/// Exactly one sink is active per hub. The event loop calls [`TrafficSink::log`]
/// after every successful distribution round, then flushes and closes the sink
/// on shutdown.
pub trait TrafficSink: Send {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Persist one received chunk
    ///
    /// # Errors
    /// Returns write error (should include context)
    fn log(&mut self, peer: &PeerAddr, data: &[u8]) -> Result<(), HubError>;

    /// Flush buffer (if any)
    fn flush(&mut self) -> Result<(), HubError>;

    /// Close sink
    fn close(&mut self) -> Result<(), HubError>;
}

impl<S: TrafficSink + ?Sized> TrafficSink for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn log(&mut self, peer: &PeerAddr, data: &[u8]) -> Result<(), HubError> {
        (**self).log(peer, data)
    }

    fn flush(&mut self) -> Result<(), HubError> {
        (**self).flush()
    }

    fn close(&mut self) -> Result<(), HubError> {
        (**self).close()
    }
}
