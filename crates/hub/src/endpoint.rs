//! Endpoint - the unit the event loop polls and dispatches to

use bytes::Bytes;
use contracts::{ConnectionId, ConnectionInfo, PeerAddr};
use mio::{Registry, Token};
use std::net::SocketAddr;

use crate::dialer::DialState;
use crate::distribution::Distribution;

/// One received chunk, tagged with the connection it came from
#[derive(Debug, Clone)]
pub struct Chunk {
    pub origin: ConnectionId,
    pub peer: PeerAddr,
    pub data: Bytes,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Outcome of servicing one ready token
#[derive(Debug)]
pub enum Serviced {
    /// Token belongs to another endpoint
    NotOwned,
    /// Owned, but nothing happened (spurious wakeup, `WouldBlock`)
    Idle,
    /// A new inbound connection was admitted
    Accepted(ConnectionInfo),
    /// Data arrived; the endpoint has marked its origin as `last_readable`
    Data(Chunk),
    /// The connection was closed and removed
    Disconnected(ConnectionInfo),
}

/// Point-in-time view of an endpoint, for status output and invariant checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointStatus {
    Listening {
        local_addr: Option<SocketAddr>,
        armed: bool,
        connections: usize,
        max_connections: usize,
    },
    Dialing {
        state: DialState,
        connections: usize,
    },
}

/// A listening or dialing endpoint.
///
/// Socket ownership is exclusive: every token handed out by `owned_tokens`
/// belongs to exactly one endpoint, so at most one endpoint claims a readiness
/// event.
pub trait Endpoint: Send {
    /// Display name, e.g. `listen 127.0.0.1:9000`
    fn name(&self) -> &str;

    /// Listen token (if armed) plus every live connection token
    fn owned_tokens(&self) -> Vec<Token>;

    /// Live connections
    fn connections(&self) -> Vec<ConnectionInfo>;

    /// Bound address of a listening endpoint
    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }

    fn status(&self) -> EndpointStatus;

    /// Accept or receive once for `token`
    fn service_readable(&mut self, token: Token, registry: &Registry) -> Serviced;

    /// Drain queued output for `token`
    fn service_writable(&mut self, token: Token, registry: &Registry) -> Serviced;

    /// Send `data` to every owned connection except `last_readable`, then clear the marker
    fn distribute(&mut self, data: &[u8], registry: &Registry) -> Distribution;

    /// Housekeeping run at the top of every tick.
    ///
    /// Returns connections adopted since the previous call.
    fn maintain(&mut self, registry: &Registry) -> Vec<ConnectionInfo>;

    /// Stop background work and close everything
    fn shutdown(&mut self, registry: &Registry);
}
