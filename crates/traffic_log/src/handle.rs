//! SinkHandle - owns the active sink, isolates its failures and counts its writes

use std::sync::Arc;
use tracing::{debug, error, instrument};

use contracts::{PeerAddr, TrafficSink};

use crate::metrics::SinkMetrics;

/// Handle to the hub's single active sink
pub struct SinkHandle {
    /// Sink name
    name: String,
    sink: Box<dyn TrafficSink>,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
}

impl SinkHandle {
    /// Wrap a sink
    pub fn new<S: TrafficSink + 'static>(sink: S) -> Self {
        Self::from_boxed(Box::new(sink))
    }

    pub fn from_boxed(sink: Box<dyn TrafficSink>) -> Self {
        Self {
            name: sink.name().to_string(),
            sink,
            metrics: Arc::new(SinkMetrics::new()),
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Log one chunk.
    ///
    /// Returns true if written. A failure is logged and counted, never propagated:
    /// a broken traffic log must not stop the relay.
    pub fn write(&mut self, peer: &PeerAddr, data: &[u8]) -> bool {
        match self.sink.log(peer, data) {
            Ok(()) => {
                self.metrics.record_write(data.len());
                true
            }
            Err(e) => {
                self.metrics.inc_failure_count();
                error!(
                    sink = %self.name,
                    peer = %peer,
                    bytes = data.len(),
                    error = %e,
                    "Write failed"
                );
                false
            }
        }
    }

    /// Flush and close the sink
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub fn shutdown(mut self) {
        if let Err(e) = self.sink.flush() {
            error!(sink = %self.name, error = %e, "Flush failed on shutdown");
        }
        if let Err(e) = self.sink.close() {
            error!(sink = %self.name, error = %e, "Close failed on shutdown");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}
