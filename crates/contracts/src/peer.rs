//! Connection identity types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// Peer identity of a connection: `(address, port)`.
///
/// The address is kept as text so that it can be written verbatim into
/// framed and hexdump logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerAddr {
    pub host: String,
    pub port: u16,
}

impl PeerAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl From<SocketAddr> for PeerAddr {
    fn from(addr: SocketAddr) -> Self {
        Self {
            host: addr.ip().to_string(),
            port: addr.port(),
        }
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Stable handle of one established socket.
///
/// Unique for the lifetime of the hub; never reused after the connection closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub usize);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a connection came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    /// Born from `accept` on a listening endpoint
    Accepted,
    /// Born from a successful outbound `connect`
    Dialed,
}

impl ConnectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Dialed => "dialed",
        }
    }
}

/// Snapshot of a live connection, as reported by its owning endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub peer: PeerAddr,
    pub kind: ConnectionKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_from_socket_addr() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let peer = PeerAddr::from(addr);
        assert_eq!(peer.host, "127.0.0.1");
        assert_eq!(peer.port, 9000);
        assert_eq!(peer.to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn test_ipv6_peer_keeps_bare_address() {
        let addr: SocketAddr = "[::1]:80".parse().unwrap();
        let peer = PeerAddr::from(addr);
        assert_eq!(peer.host, "::1");
    }
}
