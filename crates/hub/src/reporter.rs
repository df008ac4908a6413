//! StatusReporter - seam between the event loop and a live status display

use crate::endpoint::Chunk;
use crate::stats::StatsRow;

/// Receives relay activity from the event loop.
///
/// Both hooks default to no-ops so an implementation only overrides what it
/// displays.
pub trait StatusReporter: Send {
    /// Called once per relayed chunk, after distribution and logging
    fn on_chunk(&mut self, _chunk: &Chunk) {}

    /// Called with a fresh stats snapshot, at most once per status interval
    fn on_stats(&mut self, _rows: &[StatsRow]) {}
}

impl<R: StatusReporter + ?Sized> StatusReporter for Box<R> {
    fn on_chunk(&mut self, chunk: &Chunk) {
        (**self).on_chunk(chunk)
    }

    fn on_stats(&mut self, rows: &[StatsRow]) {
        (**self).on_stats(rows)
    }
}
