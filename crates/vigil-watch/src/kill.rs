//! Kill-link watcher — flips the termination flag, touches nothing else.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use vigil_core::control::{ControlMsg, MAX_TOKEN_LEN};

/// Connect to the relay's kill link and wait for the stop token.
///
/// Fail-safe by design: any connect or read error, or the peer closing
/// the link, sets the stop flag after logging — the watcher prefers
/// stopping over hanging. Never panics, never touches the image link.
pub async fn watch_kill_link(addr: SocketAddr, stop: Arc<AtomicBool>) {
    if let Err(e) = watch(addr, &stop).await {
        tracing::warn!(error = %e, "kill link failed, treating as stop");
    }
    stop.store(true, Ordering::Relaxed);
}

async fn watch(addr: SocketAddr, stop: &AtomicBool) -> Result<()> {
    let mut conn = TcpStream::connect(addr)
        .await
        .context("kill link connect failed")?;
    tracing::debug!(%addr, "kill link connected");

    let mut buf = [0u8; MAX_TOKEN_LEN];
    loop {
        let n = conn.read(&mut buf).await.context("kill link read failed")?;
        if n == 0 {
            bail!("kill link closed by relay");
        }
        match ControlMsg::decode(&buf[..n]) {
            ControlMsg::Stop => {
                tracing::info!("stop token received");
                stop.store(true, Ordering::Relaxed);
                return Ok(());
            }
            other => tracing::debug!(?other, "ignoring non-stop bytes on kill link"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
