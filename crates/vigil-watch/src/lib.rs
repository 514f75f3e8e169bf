//! vigil-watch — the edge watcher.
//!
//! One cooperative loop: capture, detect, rate-gated send on a positive,
//! short yield, repeat — until the kill link fires or the capture source
//! is exhausted. The kill watcher runs as its own task and shares exactly
//! one thing with the loop: the termination flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;

use vigil_core::config::VigilConfig;
use vigil_core::gate::SendOutcome;

pub mod capture;
pub mod kill;
pub mod send;

use capture::{Detector, FrameSource};
use send::EvidenceSender;

/// Run the watch loop until stopped or the source runs dry.
/// Source exhaustion is a clean stop, not an error.
pub async fn run(
    config: &VigilConfig,
    mut source: impl FrameSource,
    mut detector: impl Detector,
) -> Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    let kill_task = tokio::spawn(kill::watch_kill_link(
        config.endpoints.kill_addr,
        stop.clone(),
    ));

    let mut sender = EvidenceSender::connect(
        config.endpoints.image_addr,
        config.watcher.send_interval(),
    )
    .await?;
    let poll = config.watcher.poll_interval();

    tracing::info!(
        image = %config.endpoints.image_addr,
        kill = %config.endpoints.kill_addr,
        "watch loop starting"
    );

    while !stop.load(Ordering::Relaxed) {
        let Some(frame) = source.next_frame() else {
            tracing::info!("capture source exhausted, stopping");
            break;
        };

        let detection = detector.detect(frame);
        if detection.matched {
            match sender.send_if_due(&detection.frame).await {
                Ok(SendOutcome::Sent) => tracing::info!("evidence sent"),
                Ok(SendOutcome::Throttled) => tracing::debug!("evidence send throttled"),
                // iteration-local failure: log and keep watching
                Err(e) => tracing::warn!(error = %e, "evidence send failed"),
            }
        }

        tokio::time::sleep(poll).await;
    }

    kill_task.abort();
    tracing::info!("watch loop stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
