//! Rate-gated evidence sender — JPEG encode, chunk, transmit, sentinel.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::UdpSocket;

use vigil_core::frame::chunk_frames;
use vigil_core::gate::{RateGate, SendOutcome};

use crate::capture::{encode_jpeg, Frame};

/// Sends evidence payloads over the image link.
pub struct EvidenceSender {
    socket: UdpSocket,
    dest: SocketAddr,
    gate: RateGate,
}

impl EvidenceSender {
    pub async fn connect(dest: SocketAddr, interval: Duration) -> Result<Self> {
        let bind_addr: SocketAddr = if dest.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .context("failed to bind image link sender")?;
        Ok(Self {
            socket,
            dest,
            gate: RateGate::new(interval),
        })
    }

    /// Send one annotated frame if the rate gate allows it.
    ///
    /// Inside the interval this is a no-op, reported distinctly as
    /// `Throttled`. Otherwise the frame is JPEG-encoded, chunked, sent
    /// with the trailing sentinel, and the gate timestamp advances.
    pub async fn send_if_due(&mut self, frame: &Frame) -> Result<SendOutcome> {
        if !self.gate.due() {
            return Ok(SendOutcome::Throttled);
        }
        let jpeg = encode_jpeg(frame)?;
        self.transmit(&jpeg).await?;
        self.gate.record();
        Ok(SendOutcome::Sent)
    }

    /// Transmit one payload as chunk frames plus the sentinel. The rate
    /// gate does not apply here — this is the bare wire operation.
    pub async fn transmit(&mut self, payload: &[u8]) -> Result<()> {
        for chunk in chunk_frames(payload) {
            self.socket
                .send_to(chunk, self.dest)
                .await
                .context("chunk frame send failed")?;
        }
        self.socket
            .send_to(&[], self.dest)
            .await
            .context("sentinel frame send failed")?;
        tracing::debug!(bytes = payload.len(), dest = %self.dest, "payload transmitted");
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
