//! Connection - one established socket owned by exactly one endpoint

use bytes::{Buf, Bytes, BytesMut};
use contracts::{ConnectionId, ConnectionInfo, ConnectionKind, PeerAddr};
use mio::net::TcpStream;
use mio::{Interest, Registry, Token};
use std::fmt;
use std::io::{self, ErrorKind, Read, Write};
use std::net::Shutdown;
use tracing::trace;

/// Why a connection left its endpoint
#[derive(Debug)]
pub enum CloseReason {
    /// Zero-length read: the peer half-closed
    PeerClosed,
    /// Receive or send failed
    Io(io::Error),
    /// Outbound queue grew past the configured limit
    Stalled { pending: usize },
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerClosed => f.write_str("closed by peer"),
            Self::Io(e) => write!(f, "{e}"),
            Self::Stalled { pending } => write!(f, "peer not reading, {pending} bytes pending"),
        }
    }
}

/// Result of one fixed-size receive
#[derive(Debug)]
pub enum RecvOutcome {
    Data(Bytes),
    /// Nothing to read right now
    WouldBlock,
    Closed(CloseReason),
}

/// An established, non-blocking, bidirectional byte stream
pub struct Connection {
    id: ConnectionId,
    peer: PeerAddr,
    kind: ConnectionKind,
    stream: TcpStream,
    /// Bytes accepted for sending but not yet written to the socket
    outbox: BytesMut,
    max_pending: usize,
    wants_writable: bool,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        peer: PeerAddr,
        kind: ConnectionKind,
        stream: TcpStream,
        max_pending: usize,
    ) -> Self {
        Self {
            id,
            peer,
            kind,
            stream,
            outbox: BytesMut::new(),
            max_pending,
            wants_writable: false,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn token(&self) -> Token {
        Token(self.id.0)
    }

    pub fn peer(&self) -> &PeerAddr {
        &self.peer
    }

    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }

    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            id: self.id,
            peer: self.peer.clone(),
            kind: self.kind,
        }
    }

    /// Bytes waiting in the outbox
    pub fn pending(&self) -> usize {
        self.outbox.len()
    }

    pub fn register(&mut self, registry: &Registry) -> io::Result<()> {
        let token = self.token();
        registry.register(&mut self.stream, token, Interest::READABLE)
    }

    /// Receive up to `buf.len()` bytes
    pub fn recv(&mut self, buf: &mut [u8]) -> RecvOutcome {
        loop {
            match self.stream.read(buf) {
                Ok(0) => return RecvOutcome::Closed(CloseReason::PeerClosed),
                Ok(n) => {
                    trace!(conn = %self.id, peer = %self.peer, bytes = n, "Received");
                    return RecvOutcome::Data(Bytes::copy_from_slice(&buf[..n]));
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return RecvOutcome::WouldBlock,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return RecvOutcome::Closed(CloseReason::Io(e)),
            }
        }
    }

    /// Send `data` without blocking.
    ///
    /// Whatever the socket does not take immediately is queued and the socket is
    /// re-registered for writability. Returns the number of bytes accepted.
    pub fn send(&mut self, data: &[u8], registry: &Registry) -> Result<usize, CloseReason> {
        if data.is_empty() {
            return Ok(0);
        }

        let written = if self.outbox.is_empty() {
            self.write_some(data)?
        } else {
            0
        };

        if written < data.len() {
            self.outbox.extend_from_slice(&data[written..]);
            if self.outbox.len() > self.max_pending {
                return Err(CloseReason::Stalled {
                    pending: self.outbox.len(),
                });
            }
            self.set_writable_interest(true, registry)
                .map_err(CloseReason::Io)?;
        }

        Ok(data.len())
    }

    /// Drain the outbox after a writable event
    pub fn flush_outbox(&mut self, registry: &Registry) -> Result<(), CloseReason> {
        if !self.outbox.is_empty() {
            let pending = self.outbox.split().freeze();
            let written = self.write_some(&pending)?;
            self.outbox.extend_from_slice(&pending.slice(written..));
        }

        if self.outbox.is_empty() {
            self.set_writable_interest(false, registry)
                .map_err(CloseReason::Io)?;
        }
        Ok(())
    }

    /// Deregister and shut the socket down
    pub fn close(&mut self, registry: &Registry) {
        let _ = registry.deregister(&mut self.stream);
        let _ = self.stream.shutdown(Shutdown::Both);
    }

    fn write_some(&mut self, data: &[u8]) -> Result<usize, CloseReason> {
        let mut remaining = data;
        while remaining.has_remaining() {
            match self.stream.write(remaining) {
                Ok(0) => {
                    return Err(CloseReason::Io(io::Error::from(ErrorKind::WriteZero)));
                }
                Ok(n) => remaining.advance(n),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(CloseReason::Io(e)),
            }
        }
        Ok(data.len() - remaining.len())
    }

    fn set_writable_interest(&mut self, enabled: bool, registry: &Registry) -> io::Result<()> {
        if self.wants_writable == enabled {
            return Ok(());
        }
        let interest = if enabled {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        };
        let token = self.token();
        registry.reregister(&mut self.stream, token, interest)?;
        self.wants_writable = enabled;
        Ok(())
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("kind", &self.kind)
            .field("pending", &self.outbox.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mio::Poll;
    use std::time::Duration;

    fn pair() -> (Connection, std::net::TcpStream) {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let client = std::net::TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, addr) = listener.accept().unwrap();
        server.set_nonblocking(true).unwrap();
        let conn = Connection::new(
            ConnectionId(7),
            PeerAddr::from(addr),
            ConnectionKind::Accepted,
            TcpStream::from_std(server),
            64,
        );
        (conn, client)
    }

    #[test]
    fn test_recv_data_then_would_block() {
        let (mut conn, mut client) = pair();
        client.write_all(b"ping").unwrap();
        std::thread::sleep(Duration::from_millis(50));

        let mut buf = [0u8; 16];
        match conn.recv(&mut buf) {
            RecvOutcome::Data(data) => assert_eq!(&data[..], b"ping"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(conn.recv(&mut buf), RecvOutcome::WouldBlock));
    }

    #[test]
    fn test_recv_respects_chunk_size() {
        let (mut conn, mut client) = pair();
        client.write_all(b"0123456789").unwrap();
        std::thread::sleep(Duration::from_millis(50));

        let mut buf = [0u8; 4];
        match conn.recv(&mut buf) {
            RecvOutcome::Data(data) => assert_eq!(&data[..], b"0123"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_recv_peer_close() {
        let (mut conn, client) = pair();
        drop(client);
        std::thread::sleep(Duration::from_millis(50));

        let mut buf = [0u8; 16];
        assert!(matches!(
            conn.recv(&mut buf),
            RecvOutcome::Closed(CloseReason::PeerClosed)
        ));
    }

    #[test]
    fn test_send_delivers() {
        let poll = Poll::new().unwrap();
        let (mut conn, mut client) = pair();
        conn.register(poll.registry()).unwrap();

        assert_eq!(conn.send(b"hello", poll.registry()).unwrap(), 5);
        assert_eq!(conn.pending(), 0);

        let mut buf = [0u8; 5];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn test_stalled_consumer_detected() {
        let poll = Poll::new().unwrap();
        let (mut conn, _client) = pair();
        conn.register(poll.registry()).unwrap();

        // Client never reads: eventually the kernel buffers fill and the
        // 64-byte outbox limit trips.
        let block = vec![0xAAu8; 64 * 1024];
        let mut stalled = false;
        for _ in 0..1024 {
            match conn.send(&block, poll.registry()) {
                Ok(n) => assert_eq!(n, block.len()),
                Err(CloseReason::Stalled { pending }) => {
                    assert!(pending > 64);
                    stalled = true;
                    break;
                }
                Err(other) => panic!("unexpected: {other}"),
            }
        }
        assert!(stalled);
    }
}
