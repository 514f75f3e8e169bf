//! vigild — the vigil relay daemon.
//!
//! Owns the one-and-only session: the image-link receiving end, the
//! kill-link listener, the control-link client side, the notifier
//! forwarding path, and the edge watcher child process.

use anyhow::Result;

use vigil_core::config::VigilConfig;

pub mod notify;
pub mod receive;
pub mod session;

use notify::Notifier;
use session::Session;

/// Run the relay until the supervisor tells it to stop.
pub async fn run(config: VigilConfig, mut notifier: Box<dyn Notifier>) -> Result<()> {
    let mut session = Session::connect(config).await?;
    let outcome = session.run(notifier.as_mut()).await;
    session.shutdown().await;
    outcome
}
