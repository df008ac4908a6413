//! Hub - single-threaded, tick-based event loop over every endpoint

use contracts::{
    ConnectionInfo, DialSpec, EngineConfig, HubConfig, HubError, ListenSpec, ReconnectConfig,
};
use mio::{Events, Poll, Token};
use observability::{TrafficMetricsAggregator, TrafficSummary};
use std::collections::BTreeSet;
use std::fmt;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info, instrument};
use traffic_log::{MetricsSnapshot, SinkHandle};

use crate::dialer::DialingEndpoint;
use crate::distribution::{claim_readable, claim_writable, distribute_round};
use crate::endpoint::{Chunk, Endpoint, EndpointStatus, Serviced};
use crate::listener::ListeningEndpoint;
use crate::reporter::StatusReporter;
use crate::stats::{RenderThrottle, StatsAggregator};
use crate::token::TokenSource;

const EVENTS_CAPACITY: usize = 256;

/// Cloneable flag that asks a running hub to stop after the current tick
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Totals reported when the hub stops
#[derive(Debug, Clone)]
pub struct HubReport {
    pub traffic: TrafficSummary,
    pub sink_name: String,
    pub sink: MetricsSnapshot,
}

impl fmt::Display for HubReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.traffic)?;
        writeln!(
            f,
            "Traffic log ({}): {} writes, {} failures, {} bytes",
            self.sink_name, self.sink.write_count, self.sink.failure_count, self.sink.bytes_logged
        )
    }
}

/// The relay hub.
///
/// Owns every endpoint, the active traffic sink and the stats aggregator. A
/// tick adopts finished dials, waits for readiness, then for each ready socket
/// services it once and relays whatever was read: distribution first, then the
/// sink, then the stats.
pub struct Hub {
    poll: Poll,
    events: Events,
    endpoints: Vec<Box<dyn Endpoint>>,
    tokens: TokenSource,
    sink: SinkHandle,
    stats: StatsAggregator,
    traffic: TrafficMetricsAggregator,
    reporter: Option<Box<dyn StatusReporter>>,
    throttle: RenderThrottle,
    engine: EngineConfig,
    reconnect: ReconnectConfig,
    runtime: Handle,
    /// Tokens that produced work last tick and must be serviced again
    carry: BTreeSet<Token>,
    shutdown: ShutdownHandle,
}

impl Hub {
    /// Create a hub with no endpoints.
    ///
    /// `runtime` runs the background connect tasks of dialing endpoints.
    pub fn new(
        engine: EngineConfig,
        reconnect: ReconnectConfig,
        sink: SinkHandle,
        runtime: Handle,
    ) -> Result<Self, HubError> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(EVENTS_CAPACITY),
            endpoints: Vec::new(),
            tokens: TokenSource::new(),
            sink,
            stats: StatsAggregator::new(),
            traffic: TrafficMetricsAggregator::new(),
            reporter: None,
            throttle: RenderThrottle::new(Duration::from_secs(1)),
            engine,
            reconnect,
            runtime,
            carry: BTreeSet::new(),
            shutdown: ShutdownHandle::new(),
        })
    }

    /// Build a hub with every endpoint in `config`.
    ///
    /// Fails on the first listen address that cannot be bound.
    #[instrument(name = "hub_from_config", skip_all)]
    pub fn from_config(
        config: &HubConfig,
        sink: SinkHandle,
        runtime: Handle,
    ) -> Result<Self, HubError> {
        let mut hub = Self::new(
            config.engine.clone(),
            config.reconnect.clone(),
            sink,
            runtime,
        )?;
        hub.throttle = RenderThrottle::new(config.status.interval());

        for spec in &config.listen {
            hub.add_listener(spec.clone())?;
        }
        for spec in &config.remote {
            hub.add_dialer(spec.clone());
        }

        info!(
            listeners = config.listen.len(),
            remotes = config.remote.len(),
            sink = hub.sink.name(),
            "Hub configured"
        );
        Ok(hub)
    }

    /// Bind a listening endpoint; returns the bound address
    pub fn add_listener(&mut self, spec: ListenSpec) -> Result<SocketAddr, HubError> {
        let endpoint =
            ListeningEndpoint::create(spec, &self.engine, self.tokens.clone(), self.poll.registry())?;
        let addr = endpoint.local_addr().ok_or_else(|| HubError::Other("listener has no address".into()))?;
        self.endpoints.push(Box::new(endpoint));
        Ok(addr)
    }

    /// Add a dialing endpoint; it starts connecting immediately
    pub fn add_dialer(&mut self, spec: DialSpec) {
        let endpoint = DialingEndpoint::create(
            spec,
            &self.engine,
            self.reconnect.clone(),
            self.tokens.clone(),
            self.runtime.clone(),
        );
        self.endpoints.push(Box::new(endpoint));
    }

    pub fn set_reporter(&mut self, reporter: Box<dyn StatusReporter>) {
        self.reporter = Some(reporter);
    }

    pub fn set_status_interval(&mut self, interval: Duration) {
        self.throttle = RenderThrottle::new(interval);
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn listener_addrs(&self) -> Vec<SocketAddr> {
        self.endpoints.iter().filter_map(|e| e.local_addr()).collect()
    }

    /// Live connections across all endpoints
    pub fn connections(&self) -> Vec<ConnectionInfo> {
        self.endpoints.iter().flat_map(|e| e.connections()).collect()
    }

    pub fn endpoint_status(&self) -> Vec<EndpointStatus> {
        self.endpoints.iter().map(|e| e.status()).collect()
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    pub fn traffic(&self) -> TrafficSummary {
        self.traffic.summary()
    }

    /// Run one tick without the pacing sleep.
    ///
    /// Returns the number of chunks relayed.
    pub fn tick(&mut self) -> Result<usize, HubError> {
        self.maintain();

        let owned: usize = self.endpoints.iter().map(|e| e.owned_tokens().len()).sum();
        if owned == 0 {
            self.carry.clear();
            self.render();
            return Ok(0);
        }

        let timeout = if self.carry.is_empty() {
            self.engine.poll_timeout()
        } else {
            Duration::ZERO
        };
        match self.poll.poll(&mut self.events, Some(timeout)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(HubError::Io(e)),
        }

        let mut readable: Vec<Token> = std::mem::take(&mut self.carry).into_iter().collect();
        let mut writable = Vec::new();
        for event in self.events.iter() {
            let token = event.token();
            if event.is_writable() {
                writable.push(token);
            }
            if (event.is_readable() || event.is_read_closed() || event.is_error())
                && !readable.contains(&token)
            {
                readable.push(token);
            }
        }

        for token in writable {
            if let Serviced::Disconnected(info) =
                claim_writable(&mut self.endpoints, token, self.poll.registry())
            {
                self.on_closed(&info);
            }
        }

        let mut relayed = 0;
        for token in readable {
            match claim_readable(&mut self.endpoints, token, self.poll.registry()) {
                Serviced::Accepted(info) => {
                    self.on_opened(&info);
                    self.carry.insert(token);
                }
                Serviced::Data(chunk) => {
                    self.carry.insert(token);
                    self.relay(chunk);
                    relayed += 1;
                }
                Serviced::Disconnected(info) => self.on_closed(&info),
                Serviced::Idle | Serviced::NotOwned => {}
            }
        }

        self.render();
        Ok(relayed)
    }

    /// Tick until the shutdown handle fires, then shut everything down
    pub fn run(mut self) -> Result<HubReport, HubError> {
        for endpoint in &self.endpoints {
            debug!(endpoint = endpoint.name(), status = ?endpoint.status(), "Endpoint ready");
        }
        info!(endpoints = self.endpoints.len(), "Hub running");

        let result = loop {
            if self.shutdown.is_triggered() {
                break Ok(());
            }
            std::thread::sleep(self.engine.tick());
            if let Err(e) = self.tick() {
                break Err(e);
            }
        };

        let report = self.shutdown();
        result.map(|()| report)
    }

    /// Shut every endpoint down, then flush and close the sink
    #[instrument(name = "hub_shutdown", skip_all)]
    pub fn shutdown(mut self) -> HubReport {
        for endpoint in self.endpoints.iter_mut() {
            endpoint.shutdown(self.poll.registry());
        }

        let sink_name = self.sink.name().to_string();
        let sink = self.sink.metrics().snapshot();
        self.sink.shutdown();

        let report = HubReport {
            traffic: self.traffic.summary(),
            sink_name,
            sink,
        };
        info!(
            chunks = report.traffic.chunks,
            bytes_received = report.traffic.bytes_received,
            bytes_sent = report.traffic.bytes_sent,
            "Hub stopped"
        );
        report
    }

    fn maintain(&mut self) {
        let mut adopted = Vec::new();
        for endpoint in self.endpoints.iter_mut() {
            adopted.extend(endpoint.maintain(self.poll.registry()));
        }
        for info in &adopted {
            self.on_opened(info);
        }
    }

    fn relay(&mut self, chunk: Chunk) {
        let round = distribute_round(&mut self.endpoints, &chunk.data, self.poll.registry());

        let logged = self.sink.write(&chunk.peer, &chunk.data);
        observability::record_sink_write(self.sink.name(), logged);

        self.stats.update_rx(chunk.origin, chunk.len());
        observability::record_chunk_received(chunk.len());
        for delivery in &round.deliveries {
            self.stats.update_tx(delivery.to, delivery.bytes);
            observability::record_bytes_sent(delivery.bytes);
        }
        self.traffic
            .record_round(chunk.len(), round.deliveries.len(), round.bytes_sent());
        debug!(
            peer = %chunk.peer,
            bytes = chunk.len(),
            recipients = round.deliveries.len(),
            "Relayed"
        );

        for info in &round.dropped {
            self.on_closed(info);
        }

        if let Some(reporter) = self.reporter.as_mut() {
            reporter.on_chunk(&chunk);
        }
    }

    fn on_opened(&mut self, info: &ConnectionInfo) {
        self.stats.register(info.id);
        self.traffic.record_opened(info.kind);
    }

    fn on_closed(&mut self, info: &ConnectionInfo) {
        self.stats.remove(info.id);
        self.traffic.record_closed();
        debug!(conn = %info.id, peer = %info.peer, "Connection gone");
    }

    fn render(&mut self) {
        let Some(reporter) = self.reporter.as_mut() else {
            return;
        };
        if !self.throttle.ready() {
            return;
        }

        let live: Vec<ConnectionInfo> = self.endpoints.iter().flat_map(|e| e.connections()).collect();
        self.stats.prune(&live);
        let rows = self.stats.snapshot(&live);
        reporter.on_stats(&rows);
    }
}
