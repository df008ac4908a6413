//! ListeningEndpoint - accepts inbound connections under admission control

use contracts::{
    ConnectionId, ConnectionInfo, ConnectionKind, EngineConfig, HubError, ListenSpec, PeerAddr,
};
use mio::net::TcpListener;
use mio::{Interest, Registry, Token};
use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs};
use tracing::{debug, info, instrument, warn};

use crate::connection::{CloseReason, Connection, RecvOutcome};
use crate::distribution::{Delivery, Distribution};
use crate::endpoint::{Chunk, Endpoint, EndpointStatus, Serviced};
use crate::token::TokenSource;

/// Listening endpoint.
///
/// Holds at most `max_connections` accepted connections. When the cap is
/// reached the listen socket is closed, so further clients are refused by the
/// OS instead of being accepted and dropped. Losing a connection re-arms it on
/// the same address.
pub struct ListeningEndpoint {
    name: String,
    spec: ListenSpec,
    /// Actual bound address, reused when re-arming
    bound: SocketAddr,
    listener: Option<TcpListener>,
    listen_token: Token,
    /// Listener retired by the cap and not yet re-armed
    rearm_pending: bool,
    connections: Vec<Connection>,
    last_readable: Option<ConnectionId>,
    tokens: TokenSource,
    buf: Vec<u8>,
    max_pending: usize,
}

impl ListeningEndpoint {
    /// Bind and register the listen socket.
    ///
    /// A bind failure is an operator error and is returned as `HubError::Bind`.
    #[instrument(name = "listener_create", skip_all, fields(addr = %spec))]
    pub fn create(
        spec: ListenSpec,
        engine: &EngineConfig,
        tokens: TokenSource,
        registry: &Registry,
    ) -> Result<Self, HubError> {
        let target = spec.to_string();
        let addr = resolve(&target)?;

        let mut listener = TcpListener::bind(addr).map_err(|e| HubError::bind(&target, e))?;
        let bound = listener.local_addr().map_err(|e| HubError::bind(&target, e))?;
        let listen_token = tokens.next_token();
        registry
            .register(&mut listener, listen_token, Interest::READABLE)
            .map_err(|e| HubError::bind(&target, e))?;

        info!(
            addr = %bound,
            max_connections = spec.max_connections,
            "Listening"
        );

        Ok(Self {
            name: format!("listen {target}"),
            spec,
            bound,
            listener: Some(listener),
            listen_token,
            rearm_pending: false,
            connections: Vec::new(),
            last_readable: None,
            tokens,
            buf: vec![0u8; engine.chunk_size],
            max_pending: engine.max_pending_bytes,
        })
    }

    /// Whether new clients can currently connect
    pub fn is_armed(&self) -> bool {
        self.listener.is_some()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn max_connections(&self) -> usize {
        self.spec.max_connections
    }

    fn accept_one(&mut self, registry: &Registry) -> Serviced {
        let Some(listener) = self.listener.as_mut() else {
            return Serviced::Idle;
        };

        let (stream, addr) = match listener.accept() {
            Ok(pair) => pair,
            Err(e) if e.kind() == ErrorKind::WouldBlock => return Serviced::Idle,
            Err(e) => {
                warn!(endpoint = %self.name, error = %e, "Accept failed");
                return Serviced::Idle;
            }
        };

        let peer = PeerAddr::from(addr);
        let mut conn = Connection::new(
            self.tokens.next_id(),
            peer.clone(),
            ConnectionKind::Accepted,
            stream,
            self.max_pending,
        );
        if let Err(e) = conn.register(registry) {
            warn!(endpoint = %self.name, peer = %peer, error = %e, "Failed to register connection");
            conn.close(registry);
            return Serviced::Idle;
        }

        info!(endpoint = %self.name, peer = %peer, conn = %conn.id(), "Accepted connection");
        observability::record_connection_opened(ConnectionKind::Accepted);
        let info = conn.info();
        self.connections.push(conn);

        if self.connections.len() >= self.spec.max_connections {
            self.retire(registry);
        }
        Serviced::Accepted(info)
    }

    /// Close the listen socket because the cap was reached
    fn retire(&mut self, registry: &Registry) {
        if let Some(mut listener) = self.listener.take() {
            let _ = registry.deregister(&mut listener);
        }
        self.rearm_pending = true;
        info!(
            endpoint = %self.name,
            "Maximum connections ({}) reached on port {}",
            self.spec.max_connections,
            self.bound.port()
        );
        observability::record_admission_closed(self.bound.port());
    }

    /// Re-open admission if it was closed by the cap and there is room again
    fn rearm(&mut self, registry: &Registry) {
        if !self.rearm_pending || self.connections.len() >= self.spec.max_connections {
            return;
        }

        let mut listener = match TcpListener::bind(self.bound) {
            Ok(listener) => listener,
            Err(e) => {
                warn!(endpoint = %self.name, addr = %self.bound, error = %e, "Re-arm failed, will retry");
                return;
            }
        };
        if let Err(e) = registry.register(&mut listener, self.listen_token, Interest::READABLE) {
            warn!(endpoint = %self.name, error = %e, "Re-arm registration failed, will retry");
            return;
        }

        self.listener = Some(listener);
        self.rearm_pending = false;
        info!(endpoint = %self.name, addr = %self.bound, "Accepting connections again");
    }

    fn position(&self, token: Token) -> Option<usize> {
        self.connections.iter().position(|c| c.token() == token)
    }

    fn remove(&mut self, index: usize, reason: &CloseReason, registry: &Registry) -> ConnectionInfo {
        let mut conn = self.connections.remove(index);
        conn.close(registry);
        if self.last_readable == Some(conn.id()) {
            self.last_readable = None;
        }

        info!(
            endpoint = %self.name,
            peer = %conn.peer(),
            conn = %conn.id(),
            reason = %reason,
            "Connection closed"
        );
        observability::record_connection_closed(ConnectionKind::Accepted);

        self.rearm(registry);
        conn.info()
    }
}

impl Endpoint for ListeningEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn owned_tokens(&self) -> Vec<Token> {
        let mut tokens: Vec<Token> = self.connections.iter().map(Connection::token).collect();
        if self.listener.is_some() {
            tokens.push(self.listen_token);
        }
        tokens
    }

    fn connections(&self) -> Vec<ConnectionInfo> {
        self.connections.iter().map(Connection::info).collect()
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        Some(self.bound)
    }

    fn status(&self) -> EndpointStatus {
        EndpointStatus::Listening {
            local_addr: Some(self.bound),
            armed: self.is_armed(),
            connections: self.connections.len(),
            max_connections: self.spec.max_connections,
        }
    }

    fn service_readable(&mut self, token: Token, registry: &Registry) -> Serviced {
        if token == self.listen_token {
            return self.accept_one(registry);
        }

        let Some(index) = self.position(token) else {
            return Serviced::NotOwned;
        };

        let conn = &mut self.connections[index];
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
            RecvOutcome::Closed(reason) => {
                Serviced::Disconnected(self.remove(index, &reason, registry))
            }
        }
    }

    fn service_writable(&mut self, token: Token, registry: &Registry) -> Serviced {
        let Some(index) = self.position(token) else {
            return Serviced::NotOwned;
        };

        match self.connections[index].flush_outbox(registry) {
            Ok(()) => Serviced::Idle,
            Err(reason) => Serviced::Disconnected(self.remove(index, &reason, registry)),
        }
    }

    fn distribute(&mut self, data: &[u8], registry: &Registry) -> Distribution {
        let skip = self.last_readable.take();
        let mut round = Distribution::default();
        let mut failed = Vec::new();

        for conn in self.connections.iter_mut() {
            if Some(conn.id()) == skip {
                continue;
            }
            match conn.send(data, registry) {
                Ok(bytes) => round.deliveries.push(Delivery { to: conn.id(), bytes }),
                Err(reason) => {
                    warn!(endpoint = %self.name, peer = %conn.peer(), reason = %reason, "Send failed");
                    failed.push((conn.id(), reason));
                }
            }
        }

        for (id, reason) in failed {
            if let Some(index) = self.connections.iter().position(|c| c.id() == id) {
                round.dropped.push(self.remove(index, &reason, registry));
            }
        }
        round
    }

    fn maintain(&mut self, registry: &Registry) -> Vec<ConnectionInfo> {
        self.rearm(registry);
        Vec::new()
    }

    fn shutdown(&mut self, registry: &Registry) {
        if let Some(mut listener) = self.listener.take() {
            let _ = registry.deregister(&mut listener);
        }
        self.rearm_pending = false;
        for mut conn in self.connections.drain(..) {
            conn.close(registry);
        }
        info!(endpoint = %self.name, "Endpoint shut down");
    }
}

fn resolve(target: &str) -> Result<SocketAddr, HubError> {
    target
        .to_socket_addrs()
        .map_err(|e| HubError::Resolve {
            addr: target.to_string(),
            message: e.to_string(),
        })?
        .next()
        .ok_or_else(|| HubError::Resolve {
            addr: target.to_string(),
            message: "no addresses".to_string(),
        })
}
