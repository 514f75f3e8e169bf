//! Image-link receiving end — accumulates chunk frames into payloads.

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::net::UdpSocket;

use vigil_core::frame::{Reassembler, MAX_DATAGRAM};

/// Receives evidence payloads from the image link.
pub struct EvidenceReceiver {
    socket: UdpSocket,
    buf: Vec<u8>,
}

impl EvidenceReceiver {
    pub fn new(socket: UdpSocket) -> Self {
        Self {
            socket,
            buf: vec![0u8; MAX_DATAGRAM],
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive one complete payload: data frames until the zero-length
    /// sentinel, reassembled in arrival order.
    ///
    /// The reassembly buffer lives inside this call. Dropping the future
    /// (losing the race against a control command) discards any partial
    /// payload; the next attempt starts from an empty buffer.
    pub async fn recv_payload(&mut self) -> std::io::Result<(Bytes, SocketAddr)> {
        let mut assembler = Reassembler::new();
        loop {
            let (len, peer) = self.socket.recv_from(&mut self.buf).await?;
            if let Some(payload) = assembler.push(&self.buf[..len]) {
                return Ok((payload, peer));
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
