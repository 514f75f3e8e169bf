//! Image-link framing — chunked, sentinel-terminated payload transfer.
//!
//! One payload is transmitted as an ordered run of datagrams, each at most
//! [`MAX_CHUNK`] bytes, followed by one zero-length datagram: the sentinel.
//! There is no header, no sequence number, no length prefix. Frame loss is
//! undetectable by the receiver — a truncated buffer completes normally when
//! the sentinel arrives. Best-effort by contract.

use bytes::Bytes;

/// Maximum raw payload bytes per chunk frame.
pub const MAX_CHUNK: usize = 1024;

/// Receive buffer size for one datagram read. Larger than any frame the
/// sender produces; a remote that sends more is off-protocol.
pub const MAX_DATAGRAM: usize = 65536;

/// Split a payload into wire-order chunk frames, sentinel excluded.
/// The sender transmits every frame, then one empty datagram.
pub fn chunk_frames(payload: &[u8]) -> impl Iterator<Item = &[u8]> {
    payload.chunks(MAX_CHUNK)
}

/// Accumulates chunk frames into one payload.
///
/// Owned exclusively by the in-flight receive attempt. Dropping a
/// `Reassembler` mid-payload discards the partial buffer — a cancelled
/// receive never leaks bytes into the next one.
#[derive(Debug, Default)]
pub struct Reassembler {
    buf: Vec<u8>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Feed one received datagram.
    ///
    /// A zero-length datagram is the sentinel: the accumulated buffer is
    /// returned as the completed payload and the reassembler resets.
    pub fn push(&mut self, datagram: &[u8]) -> Option<Bytes> {
        if datagram.is_empty() {
            let done = std::mem::take(&mut self.buf);
            return Some(Bytes::from(done));
        }
        self.buf.extend_from_slice(datagram);
        None
    }

    /// Bytes accumulated for the in-flight payload.
    pub fn in_flight(&self) -> usize {
        self.buf.len()
    }

    /// Discard the in-flight buffer.
    pub fn reset(&mut self) {
        self.buf.clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
