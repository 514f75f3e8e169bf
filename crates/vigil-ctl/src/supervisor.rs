//! Session supervision — control-link server, relay child lifecycle,
//! status tracking.
//!
//! The supervisor owns the control listener and the relay child. Its
//! state is the session lifecycle state machine; every transition is
//! published on a watch channel so the status surface stays faithful and
//! prompt. A start while not `Idle` is rejected as a no-op. A failed
//! start rolls everything back to `Idle` — never a half-initialized
//! session.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use vigil_core::config::VigilConfig;
use vigil_core::control::{ControlMsg, SessionState, MAX_TOKEN_LEN};
use vigil_core::process::ChildSupervisor;

/// How long the spawned relay gets to connect and report readiness.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long to wait for the status reader to wind down during stop.
const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A session already exists; the request was a no-op.
    AlreadyRunning,
}

pub struct Supervisor {
    config: VigilConfig,
    state: Arc<watch::Sender<SessionState>>,
    relay: Option<ChildSupervisor>,
    control: Option<OwnedWriteHalf>,
    reader: Option<JoinHandle<()>>,
}

impl Supervisor {
    pub fn new(config: VigilConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            config,
            state: Arc::new(state),
            relay: None,
            control: None,
            reader: None,
        }
    }

    /// Subscribe to lifecycle transitions.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn current_state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Current status line for the UI surface.
    pub fn status(&self) -> &'static str {
        self.current_state().status_line()
    }

    /// Start a session: bind the control listener, spawn the relay, wait
    /// for its connection and readiness.
    pub async fn start(&mut self) -> Result<StartOutcome> {
        if self.current_state() != SessionState::Idle {
            tracing::info!("start requested while session exists, rejecting");
            return Ok(StartOutcome::AlreadyRunning);
        }

        let listener = TcpListener::bind(self.config.endpoints.control_addr)
            .await
            .with_context(|| {
                format!(
                    "failed to bind control link {}",
                    self.config.endpoints.control_addr
                )
            })?;

        let mut argv = self.config.commands.relay.clone();
        if let Some(path) = &self.config.path {
            argv.push("--config".to_string());
            argv.push(path.display().to_string());
        }
        let mut relay = ChildSupervisor::spawn(
            &argv,
            self.config.supervise.grace(),
            self.config.supervise.poll(),
        )
        .context("failed to spawn relay")?;

        self.state.send_replace(SessionState::Handshaking);

        match handshake(&listener).await {
            Ok((read_half, write_half)) => {
                self.state.send_replace(SessionState::Active);
                self.control = Some(write_half);
                self.relay = Some(relay);
                self.reader = Some(tokio::spawn(read_status(read_half, self.state.clone())));
                tracing::info!("session active");
                Ok(StartOutcome::Started)
            }
            Err(e) => {
                // roll back to Idle: reap the child, drop the listener
                tracing::warn!(error = %e, "handshake failed, rolling back");
                let reaped = relay.stop().await;
                tracing::info!(?reaped, "relay reaped after failed start");
                self.state.send_replace(SessionState::Idle);
                Err(e)
            }
        }
    }

    /// Stop sequence: signal the relay over the control link, drain the
    /// status reader, then reap the relay with bounded escalation.
    /// Idempotent — stopping an idle supervisor is a no-op.
    pub async fn stop(&mut self) -> Result<()> {
        if self.relay.is_none() && self.control.is_none() {
            self.state.send_replace(SessionState::Idle);
            return Ok(());
        }
        self.state.send_replace(SessionState::Ending);

        if let Some(mut control) = self.control.take() {
            if let Err(e) = control.write_all(ControlMsg::Stop.token()).await {
                tracing::warn!(error = %e, "control link write failed, relay may be gone");
            }
            // dropping the write half closes our side once the reader is done
        }

        if let Some(mut reader) = self.reader.take() {
            if tokio::time::timeout(READER_DRAIN_TIMEOUT, &mut reader)
                .await
                .is_err()
            {
                tracing::warn!("status reader did not drain in time, aborting");
                reader.abort();
            }
        }

        if let Some(mut relay) = self.relay.take() {
            let state = relay.stop().await;
            tracing::info!(?state, "relay stopped");
        }

        self.state.send_replace(SessionState::Idle);
        Ok(())
    }
}

/// Accept the relay's connection and wait for its readiness token.
/// Bounded by [`HANDSHAKE_TIMEOUT`] end to end.
async fn handshake(listener: &TcpListener) -> Result<(OwnedReadHalf, OwnedWriteHalf)> {
    tokio::time::timeout(HANDSHAKE_TIMEOUT, async {
        let (stream, peer) = listener
            .accept()
            .await
            .context("control link accept failed")?;
        tracing::debug!(relay = %peer, "relay connected");

        let (mut read_half, write_half) = stream.into_split();
        let mut buf = [0u8; MAX_TOKEN_LEN];
        loop {
            let n = read_half
                .read(&mut buf)
                .await
                .context("control link read failed")?;
            if n == 0 {
                bail!("relay closed the control link before readiness");
            }
            match ControlMsg::decode(&buf[..n]) {
                ControlMsg::Ready => return Ok((read_half, write_half)),
                ControlMsg::Stopping => bail!("relay aborted during handshake"),
                msg => tracing::debug!(?msg, "ignoring pre-readiness control message"),
            }
        }
    })
    .await
    .context("relay never reported readiness")?
}

/// Status reader — the supervisor's one background task. Applies each
/// received message to the state machine; a dead link while the session
/// is live is fail-safe-mapped to `Ending` so teardown follows.
async fn read_status(mut read_half: OwnedReadHalf, state: Arc<watch::Sender<SessionState>>) {
    let mut buf = [0u8; MAX_TOKEN_LEN];
    loop {
        match read_half.read(&mut buf).await {
            Ok(0) => {
                let current = *state.borrow();
                if matches!(current, SessionState::Active | SessionState::Handshaking) {
                    tracing::warn!("control link closed by relay, ending session");
                    state.send_replace(SessionState::Ending);
                }
                return;
            }
            Ok(n) => {
                let msg = ControlMsg::decode(&buf[..n]);
                if let ControlMsg::Unrecognized(raw) = &msg {
                    tracing::debug!(
                        raw = %String::from_utf8_lossy(raw),
                        "ignoring unrecognized control bytes"
                    );
                    continue;
                }
                tracing::info!(?msg, "control message received");
                state.send_if_modified(|current| {
                    let next = current.on_message(&msg);
                    let changed = next != *current;
                    *current = next;
                    changed
                });
            }
            Err(e) => {
                let current = *state.borrow();
                if matches!(current, SessionState::Active | SessionState::Handshaking) {
                    tracing::warn!(error = %e, "control link read failed, ending session");
                    state.send_replace(SessionState::Ending);
                }
                return;
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
