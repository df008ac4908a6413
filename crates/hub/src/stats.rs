//! Per-connection traffic counters and the status render throttle

use contracts::{ConnectionId, ConnectionInfo, PeerAddr};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct ConnectionStats {
    tx_bytes: u64,
    rx_bytes: u64,
    /// Last receive, or first sighting if nothing was received yet
    last_rx: Instant,
}

impl ConnectionStats {
    fn new(now: Instant) -> Self {
        Self {
            tx_bytes: 0,
            rx_bytes: 0,
            last_rx: now,
        }
    }
}

/// One line of the live status table
#[derive(Debug, Clone, PartialEq)]
pub struct StatsRow {
    pub id: ConnectionId,
    pub peer: PeerAddr,
    pub tx_bytes: u64,
    pub rx_bytes: u64,
    pub idle: Duration,
}

impl StatsRow {
    pub fn idle_seconds(&self) -> f64 {
        self.idle.as_secs_f64()
    }
}

impl fmt::Display for StatsRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<24} {:>12} {:>12} {:>9.1}",
            self.peer.to_string(),
            self.tx_bytes,
            self.rx_bytes,
            self.idle_seconds()
        )
    }
}

/// Monotonic tx/rx counters keyed by connection
#[derive(Debug, Default)]
pub struct StatsAggregator {
    entries: BTreeMap<ConnectionId, ConnectionStats>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a connection; idle time counts from now
    pub fn register(&mut self, id: ConnectionId) {
        self.register_at(id, Instant::now());
    }

    pub fn register_at(&mut self, id: ConnectionId, now: Instant) {
        self.entries
            .entry(id)
            .or_insert_with(|| ConnectionStats::new(now));
    }

    pub fn update_tx(&mut self, id: ConnectionId, bytes: usize) {
        let entry = self
            .entries
            .entry(id)
            .or_insert_with(|| ConnectionStats::new(Instant::now()));
        entry.tx_bytes += bytes as u64;
    }

    pub fn update_rx(&mut self, id: ConnectionId, bytes: usize) {
        self.update_rx_at(id, bytes, Instant::now());
    }

    pub fn update_rx_at(&mut self, id: ConnectionId, bytes: usize, now: Instant) {
        let entry = self
            .entries
            .entry(id)
            .or_insert_with(|| ConnectionStats::new(now));
        entry.rx_bytes += bytes as u64;
        entry.last_rx = now;
    }

    /// Counters of one connection as `(tx, rx)`
    pub fn counters(&self, id: ConnectionId) -> Option<(u64, u64)> {
        self.entries.get(&id).map(|s| (s.tx_bytes, s.rx_bytes))
    }

    pub fn snapshot(&self, live: &[ConnectionInfo]) -> Vec<StatsRow> {
        self.snapshot_at(live, Instant::now())
    }

    /// Rows for every tracked connection still present in `live`.
    ///
    /// Connections that already closed cannot be resolved to a peer and are
    /// left out.
    pub fn snapshot_at(&self, live: &[ConnectionInfo], now: Instant) -> Vec<StatsRow> {
        self.entries
            .iter()
            .filter_map(|(id, stats)| {
                let info = live.iter().find(|c| c.id == *id)?;
                Some(StatsRow {
                    id: *id,
                    peer: info.peer.clone(),
                    tx_bytes: stats.tx_bytes,
                    rx_bytes: stats.rx_bytes,
                    idle: now.saturating_duration_since(stats.last_rx),
                })
            })
            .collect()
    }

    /// Drop the counters of a closed connection
    pub fn remove(&mut self, id: ConnectionId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Forget connections that are no longer live
    pub fn prune(&mut self, live: &[ConnectionInfo]) {
        self.entries.retain(|id, _| live.iter().any(|c| c.id == *id));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lets a render through at most once per interval
#[derive(Debug, Clone)]
pub struct RenderThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl RenderThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn ready(&mut self) -> bool {
        self.ready_at(Instant::now())
    }

    pub fn ready_at(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ConnectionKind;

    fn info(id: usize, port: u16) -> ConnectionInfo {
        ConnectionInfo {
            id: ConnectionId(id),
            peer: PeerAddr::new("127.0.0.1", port),
            kind: ConnectionKind::Accepted,
        }
    }

    #[test]
    fn test_counters_accumulate() {
        let mut stats = StatsAggregator::new();
        stats.register(ConnectionId(1));
        stats.update_rx(ConnectionId(1), 5);
        stats.update_rx(ConnectionId(1), 7);
        stats.update_tx(ConnectionId(1), 3);
        stats.update_tx(ConnectionId(2), 5);

        assert_eq!(stats.counters(ConnectionId(1)), Some((3, 12)));
        assert_eq!(stats.counters(ConnectionId(2)), Some((5, 0)));
        assert_eq!(stats.counters(ConnectionId(3)), None);
    }

    #[test]
    fn test_snapshot_omits_closed_connections() {
        let start = Instant::now();
        let mut stats = StatsAggregator::new();
        stats.register_at(ConnectionId(1), start);
        stats.register_at(ConnectionId(2), start);
        stats.update_rx_at(ConnectionId(1), 5, start);

        let later = start + Duration::from_secs(3);
        let rows = stats.snapshot_at(&[info(1, 4000)], later);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].peer.port, 4000);
        assert_eq!(rows[0].rx_bytes, 5);
        assert!((rows[0].idle_seconds() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_receive_resets_idle() {
        let start = Instant::now();
        let mut stats = StatsAggregator::new();
        stats.register_at(ConnectionId(1), start);
        stats.update_rx_at(ConnectionId(1), 1, start + Duration::from_secs(10));

        let rows = stats.snapshot_at(&[info(1, 1)], start + Duration::from_secs(11));
        assert!((rows[0].idle_seconds() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_prune() {
        let mut stats = StatsAggregator::new();
        stats.register(ConnectionId(1));
        stats.register(ConnectionId(2));
        stats.prune(&[info(2, 1)]);
        assert_eq!(stats.len(), 1);
        assert!(stats.counters(ConnectionId(1)).is_none());
    }

    #[test]
    fn test_remove_forgets_connection() {
        let mut stats = StatsAggregator::new();
        stats.register(ConnectionId(1));
        stats.update_rx(ConnectionId(1), 4);

        assert!(stats.remove(ConnectionId(1)));
        assert!(!stats.remove(ConnectionId(1)));
        assert!(stats.is_empty());
    }

    #[test]
    fn test_throttle_limits_rate() {
        let start = Instant::now();
        let mut throttle = RenderThrottle::new(Duration::from_secs(1));

        assert!(throttle.ready_at(start));
        assert!(!throttle.ready_at(start + Duration::from_millis(10)));
        assert!(!throttle.ready_at(start + Duration::from_millis(999)));
        assert!(throttle.ready_at(start + Duration::from_millis(1000)));
    }
}
