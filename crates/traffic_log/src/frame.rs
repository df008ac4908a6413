//! Framed binary log codec.
//!
//! One record per received chunk, all integers big-endian:
//!
//! ```text
//! offset  size  field
//! 0       2     sync bytes 0xEB 0x90
//! 2       4     unix timestamp (seconds, truncated)
//! 6       4     peer-address string length = L
//! 10      L     peer-address string (not null-terminated)
//! 10+L    2     peer port
//! 12+L    4     payload length = D
//! 16+L    D     payload bytes
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use contracts::{HubError, PeerAddr};
use std::io::{ErrorKind, Read};

/// Record marker
pub const SYNC_BYTES: [u8; 2] = [0xEB, 0x90];

/// Header bytes excluding the variable-length address
pub const FIXED_HEADER_LEN: usize = 2 + 4 + 4 + 2 + 4;

/// Longest peer-address string the reader accepts
pub const MAX_ADDR_LEN: usize = 255;

/// Payload bytes reserved up front when reading a record
const PAYLOAD_PREALLOC: usize = 64 * 1024;

/// One decoded record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub timestamp: u32,
    pub peer: PeerAddr,
    pub payload: Bytes,
}

/// Encode one record
pub fn encode_frame(timestamp: u32, peer: &PeerAddr, payload: &[u8]) -> Bytes {
    let addr = peer.host.as_bytes();
    let mut buf = BytesMut::with_capacity(FIXED_HEADER_LEN + addr.len() + payload.len());
    buf.put_slice(&SYNC_BYTES);
    buf.put_u32(timestamp);
    buf.put_u32(addr.len() as u32);
    buf.put_slice(addr);
    buf.put_u16(peer.port);
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    buf.freeze()
}

/// Decode one record from the front of `buf`.
///
/// Returns `Ok(None)` when `buf` holds only part of a record, otherwise the
/// record and the number of bytes it occupied.
pub fn decode_frame(buf: &[u8]) -> Result<Option<(Frame, usize)>, HubError> {
    if buf.len() < 10 {
        return Ok(None);
    }
    if buf[..2] != SYNC_BYTES {
        return Err(HubError::frame(0, "missing sync bytes"));
    }

    let mut cursor = &buf[2..];
    let timestamp = cursor.get_u32();
    let addr_len = cursor.get_u32() as usize;
    if addr_len > MAX_ADDR_LEN {
        return Err(HubError::frame(
            6,
            format!("peer address length {addr_len} exceeds {MAX_ADDR_LEN}"),
        ));
    }
    if cursor.remaining() < addr_len + 6 {
        return Ok(None);
    }

    let host = std::str::from_utf8(&cursor[..addr_len])
        .map_err(|_| HubError::frame(10, "peer address is not valid UTF-8"))?
        .to_string();
    cursor.advance(addr_len);
    let port = cursor.get_u16();
    let payload_len = cursor.get_u32() as usize;
    if cursor.remaining() < payload_len {
        return Ok(None);
    }

    let payload = Bytes::copy_from_slice(&cursor[..payload_len]);
    let consumed = FIXED_HEADER_LEN + addr_len + payload_len;

    Ok(Some((
        Frame {
            timestamp,
            peer: PeerAddr { host, port },
            payload,
        },
        consumed,
    )))
}

/// Streaming reader over a framed log.
///
/// Yields records until a clean end of input; a record cut short by EOF or a
/// record without sync bytes yields one error and ends the iteration.
pub struct FrameReader<R> {
    inner: R,
    offset: u64,
    done: bool,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            offset: 0,
            done: false,
        }
    }

    /// Byte offset of the next record
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn read_record(&mut self) -> Result<Option<Frame>, HubError> {
        let start = self.offset;

        let mut sync = [0u8; 2];
        match self.inner.read(&mut sync[..1]) {
            Ok(0) => return Ok(None),
            Ok(_) => {}
            Err(e) => return Err(e.into()),
        }
        self.fill(&mut sync[1..], start)?;
        if sync != SYNC_BYTES {
            return Err(HubError::frame(start, "missing sync bytes"));
        }

        let mut word = [0u8; 4];
        self.fill(&mut word, start)?;
        let timestamp = u32::from_be_bytes(word);

        self.fill(&mut word, start)?;
        let addr_len = u32::from_be_bytes(word) as usize;
        if addr_len > MAX_ADDR_LEN {
            return Err(HubError::frame(
                start,
                format!("peer address length {addr_len} exceeds {MAX_ADDR_LEN}"),
            ));
        }

        let mut addr = vec![0u8; addr_len];
        self.fill(&mut addr, start)?;
        let host = String::from_utf8(addr)
            .map_err(|_| HubError::frame(start, "peer address is not valid UTF-8"))?;

        let mut half = [0u8; 2];
        self.fill(&mut half, start)?;
        let port = u16::from_be_bytes(half);

        self.fill(&mut word, start)?;
        let payload_len = u32::from_be_bytes(word) as usize;
        // The length field is untrusted; grow with the bytes actually present
        let mut payload = Vec::with_capacity(payload_len.min(PAYLOAD_PREALLOC));
        let read = (&mut self.inner)
            .take(payload_len as u64)
            .read_to_end(&mut payload)?;
        if read < payload_len {
            return Err(HubError::frame(start, "truncated record"));
        }

        self.offset = start + (FIXED_HEADER_LEN + addr_len + payload_len) as u64;
        Ok(Some(Frame {
            timestamp,
            peer: PeerAddr { host, port },
            payload: Bytes::from(payload),
        }))
    }

    fn fill(&mut self, buf: &mut [u8], record_start: u64) -> Result<(), HubError> {
        self.inner.read_exact(buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => HubError::frame(record_start, "truncated record"),
            _ => HubError::Io(e),
        })
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = Result<Frame, HubError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
