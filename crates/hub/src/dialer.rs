//! DialingEndpoint - one outbound connection, re-established in the background

use contracts::{
    ConnectionId, ConnectionInfo, ConnectionKind, DialSpec, EngineConfig, PeerAddr,
    ReconnectConfig,
};
use mio::{Registry, Token};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::connection::{CloseReason, Connection, RecvOutcome};
use crate::distribution::{Delivery, Distribution};
use crate::endpoint::{Chunk, Endpoint, EndpointStatus, Serviced};
use crate::token::TokenSource;

/// Dialing endpoint state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialState {
    /// Background task is attempting to connect
    Connecting,
    /// Exactly one live connection
    Connected,
    /// Connection lost, about to decide whether to retry
    Disconnected,
    /// Not connected and never will be again
    Terminal,
}

impl DialState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Terminal => "terminal",
        }
    }
}

/// Dialing endpoint.
///
/// The connect loop runs on the tokio runtime and hands a finished socket to
/// the event loop over a channel; `maintain` adopts it at the top of a tick.
pub struct DialingEndpoint {
    name: String,
    spec: DialSpec,
    reconnect: ReconnectConfig,
    state: DialState,
    connection: Option<Connection>,
    last_readable: Option<ConnectionId>,
    keep_running: Arc<AtomicBool>,
    handoff_tx: UnboundedSender<std::net::TcpStream>,
    handoff_rx: UnboundedReceiver<std::net::TcpStream>,
    task: Option<JoinHandle<()>>,
    runtime: Handle,
    tokens: TokenSource,
    buf: Vec<u8>,
    max_pending: usize,
}

impl DialingEndpoint {
    /// Create the endpoint and start connecting immediately
    pub fn create(
        spec: DialSpec,
        engine: &EngineConfig,
        reconnect: ReconnectConfig,
        tokens: TokenSource,
        runtime: Handle,
    ) -> Self {
        let (handoff_tx, handoff_rx) = mpsc::unbounded_channel();
        let mut endpoint = Self {
            name: format!("remote {}:{}", spec.host, spec.port),
            spec,
            reconnect,
            state: DialState::Connecting,
            connection: None,
            last_readable: None,
            keep_running: Arc::new(AtomicBool::new(true)),
            handoff_tx,
            handoff_rx,
            task: None,
            runtime,
            tokens,
            buf: vec![0u8; engine.chunk_size],
            max_pending: engine.max_pending_bytes,
        };
        endpoint.launch();
        endpoint
    }

    pub fn state(&self) -> DialState {
        self.state
    }

    /// Start a fresh connect task
    fn launch(&mut self) {
        if !self.keep_running.load(Ordering::Acquire) {
            self.state = DialState::Terminal;
            return;
        }

        let target = self.spec.to_string();
        debug!(endpoint = %self.name, "Launching connect task");
        self.state = DialState::Connecting;
        self.task = Some(self.runtime.spawn(connect_task(
            target,
            self.reconnect.clone(),
            Arc::clone(&self.keep_running),
            self.handoff_tx.clone(),
        )));
    }

    fn adopt(&mut self, stream: std::net::TcpStream, registry: &Registry) -> Option<ConnectionInfo> {
        if self.connection.is_some() || self.state != DialState::Connecting {
            debug!(endpoint = %self.name, state = self.state.as_str(), "Discarding late connection");
            return None;
        }

        let peer = match stream.peer_addr() {
            Ok(addr) => PeerAddr::from(addr),
            Err(e) => {
                warn!(endpoint = %self.name, error = %e, "Connected socket lost its peer");
                self.launch();
                return None;
            }
        };

        let mut conn = Connection::new(
            self.tokens.next_id(),
            peer.clone(),
            ConnectionKind::Dialed,
            mio::net::TcpStream::from_std(stream),
            self.max_pending,
        );
        if let Err(e) = conn.register(registry) {
            warn!(endpoint = %self.name, peer = %peer, error = %e, "Failed to register connection");
            conn.close(registry);
            self.launch();
            return None;
        }

        info!(endpoint = %self.name, peer = %peer, conn = %conn.id(), "Connected");
        observability::record_connection_opened(ConnectionKind::Dialed);
        let info = conn.info();
        self.connection = Some(conn);
        self.state = DialState::Connected;
        Some(info)
    }

    /// Drop the live connection and decide what comes next
    fn disconnect(&mut self, reason: &CloseReason, registry: &Registry) -> Option<ConnectionInfo> {
        let mut conn = self.connection.take()?;
        conn.close(registry);
        if self.last_readable == Some(conn.id()) {
            self.last_readable = None;
        }

        info!(
            endpoint = %self.name,
            peer = %conn.peer(),
            conn = %conn.id(),
            reason = %reason,
            "Disconnected"
        );
        observability::record_connection_closed(ConnectionKind::Dialed);
        self.state = DialState::Disconnected;

        if self.spec.auto_reconnect {
            self.launch();
        } else {
            info!(endpoint = %self.name, "Auto-reconnect disabled, staying disconnected");
            self.state = DialState::Terminal;
        }
        Some(conn.info())
    }

    fn owns(&self, token: Token) -> bool {
        self.connection.as_ref().is_some_and(|c| c.token() == token)
    }
}

impl Endpoint for DialingEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn owned_tokens(&self) -> Vec<Token> {
        self.connection.iter().map(Connection::token).collect()
    }

    fn connections(&self) -> Vec<ConnectionInfo> {
        self.connection.iter().map(Connection::info).collect()
    }

    fn status(&self) -> EndpointStatus {
        EndpointStatus::Dialing {
            state: self.state,
            connections: usize::from(self.connection.is_some()),
        }
    }

    fn service_readable(&mut self, token: Token, registry: &Registry) -> Serviced {
        if !self.owns(token) {
            return Serviced::NotOwned;
        }
        let Some(conn) = self.connection.as_mut() else {
            return Serviced::NotOwned;
        };

        match conn.recv(&mut self.buf) {
            RecvOutcome::Data(data) => {
                let chunk = Chunk {
                    origin: conn.id(),
                    peer: conn.peer().clone(),
                    data,
                };
                debug!(endpoint = %self.name, peer = %chunk.peer, bytes = chunk.len(), "Chunk received");
                self.last_readable = Some(chunk.origin);
                Serviced::Data(chunk)
            }
            RecvOutcome::WouldBlock => Serviced::Idle,
            RecvOutcome::Closed(reason) => match self.disconnect(&reason, registry) {
                Some(info) => Serviced::Disconnected(info),
                None => Serviced::Idle,
            },
        }
    }

    fn service_writable(&mut self, token: Token, registry: &Registry) -> Serviced {
        if !self.owns(token) {
            return Serviced::NotOwned;
        }
        let Some(conn) = self.connection.as_mut() else {
            return Serviced::NotOwned;
        };

        match conn.flush_outbox(registry) {
            Ok(()) => Serviced::Idle,
            Err(reason) => match self.disconnect(&reason, registry) {
                Some(info) => Serviced::Disconnected(info),
                None => Serviced::Idle,
            },
        }
    }

    fn distribute(&mut self, data: &[u8], registry: &Registry) -> Distribution {
        let skip = self.last_readable.take();
        let mut round = Distribution::default();

        let Some(conn) = self.connection.as_mut() else {
            return round;
        };
        if Some(conn.id()) == skip {
            return round;
        }

        match conn.send(data, registry) {
            Ok(bytes) => round.deliveries.push(Delivery { to: conn.id(), bytes }),
            Err(reason) => {
                warn!(endpoint = %self.name, peer = %conn.peer(), reason = %reason, "Send failed");
                round.dropped.extend(self.disconnect(&reason, registry));
            }
        }
        round
    }

    fn maintain(&mut self, registry: &Registry) -> Vec<ConnectionInfo> {
        let mut adopted = Vec::new();
        while let Ok(stream) = self.handoff_rx.try_recv() {
            adopted.extend(self.adopt(stream, registry));
        }
        adopted
    }

    #[instrument(name = "dialer_shutdown", skip_all, fields(endpoint = %self.name))]
    fn shutdown(&mut self, registry: &Registry) {
        self.keep_running.store(false, Ordering::Release);
        if let Some(mut conn) = self.connection.take() {
            conn.close(registry);
        }
        // The task notices `keep_running` between attempts; nothing waits for it
        self.task.take();
        self.state = DialState::Terminal;
        info!("Endpoint shut down");
    }
}

/// Connect loop: retries forever with a growing per-attempt timeout until it
/// succeeds or `keep_running` is cleared.
async fn connect_task(
    target: String,
    reconnect: ReconnectConfig,
    keep_running: Arc<AtomicBool>,
    handoff: UnboundedSender<std::net::TcpStream>,
) {
    let mut attempt: u32 = 0;

    while keep_running.load(Ordering::Acquire) {
        attempt = attempt.saturating_add(1);
        let limit = reconnect.timeout_for(attempt);

        match tokio::time::timeout(limit, tokio::net::TcpStream::connect(target.as_str())).await {
            Ok(Ok(stream)) => {
                if !keep_running.load(Ordering::Acquire) {
                    return;
                }
                match stream.into_std() {
                    Ok(stream) => {
                        if handoff.send(stream).is_err() {
                            debug!(target = %target, "Endpoint gone before handoff");
                        }
                        return;
                    }
                    Err(e) => {
                        debug!(target = %target, attempt, error = %e, "Connected socket unusable");
                    }
                }
            }
            Ok(Err(e)) => {
                debug!(target = %target, attempt, error = %e, "Connect failed");
                tokio::time::sleep(reconnect.delay_for(attempt)).await;
            }
            Err(_) => {
                debug!(target = %target, attempt, timeout_ms = limit.as_millis() as u64, "Connect timed out");
            }
        }
    }
}
