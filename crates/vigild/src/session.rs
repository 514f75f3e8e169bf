//! The one-and-only session owned by the relay.
//!
//! Holds the image-link socket, the kill-link listener, the control-link
//! stream, and the watcher child. Created when the supervisor spawns the
//! relay; destroyed when the stop sequence completes. A begin request
//! while a watch is live is rejected as a no-op — never a second session.

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};

use vigil_core::config::VigilConfig;
use vigil_core::control::{ControlMsg, KILL_TOKEN, MAX_TOKEN_LEN};
use vigil_core::process::ChildSupervisor;

use crate::notify::{Notifier, SessionCommand};
use crate::receive::EvidenceReceiver;

/// How long to wait for the watcher's pending kill-link connection.
const KILL_ACCEPT_TIMEOUT: Duration = Duration::from_secs(2);

pub struct Session {
    config: VigilConfig,
    receiver: EvidenceReceiver,
    kill_listener: TcpListener,
    control: TcpStream,
    watcher: Option<ChildSupervisor>,
}

impl Session {
    /// Bind the data-plane sockets, connect the control link, and report
    /// readiness upstream. A failure at any step leaves nothing running —
    /// sockets bound so far close on drop.
    pub async fn connect(config: VigilConfig) -> Result<Self> {
        let image_socket = UdpSocket::bind(config.endpoints.image_addr)
            .await
            .with_context(|| format!("failed to bind image link {}", config.endpoints.image_addr))?;
        let kill_listener = TcpListener::bind(config.endpoints.kill_addr)
            .await
            .with_context(|| format!("failed to bind kill link {}", config.endpoints.kill_addr))?;
        let mut control = TcpStream::connect(config.endpoints.control_addr)
            .await
            .with_context(|| {
                format!(
                    "failed to connect control link {}",
                    config.endpoints.control_addr
                )
            })?;

        control
            .write_all(ControlMsg::Ready.token())
            .await
            .context("failed to send readiness")?;

        tracing::info!(
            image = %config.endpoints.image_addr,
            kill = %config.endpoints.kill_addr,
            control = %config.endpoints.control_addr,
            "session connected, readiness sent"
        );

        Ok(Self {
            config,
            receiver: EvidenceReceiver::new(image_socket),
            kill_listener,
            control,
            watcher: None,
        })
    }

    /// Relay loop: race the in-flight payload receive against control and
    /// front-end commands. The losing future is dropped each iteration; a
    /// cancelled receive discards its partial buffer by construction.
    pub async fn run(&mut self, notifier: &mut dyn Notifier) -> Result<()> {
        let mut ctl_buf = [0u8; MAX_TOKEN_LEN];
        let mut commands_open = true;

        loop {
            tokio::select! {
                read = self.control.read(&mut ctl_buf) => {
                    match read {
                        Ok(0) => {
                            tracing::warn!("control link closed by supervisor, stopping");
                            return Ok(());
                        }
                        Ok(n) => match ControlMsg::decode(&ctl_buf[..n]) {
                            ControlMsg::Stop => {
                                tracing::info!("stop requested by supervisor");
                                return Ok(());
                            }
                            ControlMsg::Unrecognized(raw) => {
                                tracing::debug!(
                                    raw = %String::from_utf8_lossy(&raw),
                                    "ignoring unrecognized control bytes"
                                );
                            }
                            other => {
                                tracing::debug!(?other, "ignoring out-of-place control message");
                            }
                        },
                        Err(e) => {
                            // fail-safe: a broken control link means stop
                            tracing::warn!(error = %e, "control link read failed, stopping");
                            return Ok(());
                        }
                    }
                }

                cmd = notifier.next_command(), if commands_open => {
                    match cmd {
                        Some(SessionCommand::Begin) => self.begin_watch(notifier).await?,
                        Some(SessionCommand::End) => self.end_watch(notifier).await,
                        None => {
                            tracing::warn!("front-end command stream closed");
                            commands_open = false;
                        }
                    }
                }

                payload = self.receiver.recv_payload(), if self.watcher.is_some() => {
                    match payload {
                        Ok((bytes, from)) => {
                            if bytes.is_empty() {
                                tracing::debug!("sentinel with no data, ignoring");
                            } else {
                                tracing::info!(len = bytes.len(), from = %from, "evidence received");
                                if let Err(e) = notifier.post_evidence(bytes, &from.to_string()).await {
                                    tracing::warn!(error = %e, "evidence forwarding failed");
                                }
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "image link receive failed");
                        }
                    }
                }
            }
        }
    }

    /// Front-end asked to begin. Signals `running` upstream, then spawns
    /// the watcher with the shared config record.
    async fn begin_watch(&mut self, notifier: &dyn Notifier) -> Result<()> {
        if self.watcher.is_some() {
            post(notifier, "Already running.").await;
            return Ok(());
        }

        self.control
            .write_all(ControlMsg::Running.token())
            .await
            .context("control link write failed")?;
        post(notifier, "Starting...").await;

        let mut argv = self.config.commands.watcher.clone();
        if let Some(path) = &self.config.path {
            argv.push("--config".to_string());
            argv.push(path.display().to_string());
        }

        match ChildSupervisor::spawn(
            &argv,
            self.config.supervise.grace(),
            self.config.supervise.poll(),
        ) {
            Ok(child) => {
                tracing::info!(pid = ?child.id(), "watch started");
                self.watcher = Some(child);
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to spawn watcher");
                post(notifier, "Start failed.").await;
                // walk the supervisor back to teardown rather than leaving
                // it convinced a session is live
                if let Err(e) = self.control.write_all(ControlMsg::Stopping.token()).await {
                    tracing::warn!(error = %e, "control link write failed");
                }
            }
        }
        Ok(())
    }

    /// Front-end asked to end. Signals `stopping` upstream, fires the kill
    /// link, then reaps the watcher with bounded escalation.
    async fn end_watch(&mut self, notifier: &dyn Notifier) {
        let Some(mut child) = self.watcher.take() else {
            post(notifier, "Not running.").await;
            return;
        };

        if let Err(e) = self.control.write_all(ControlMsg::Stopping.token()).await {
            tracing::warn!(error = %e, "control link write failed");
        }
        post(notifier, "Stopping...").await;

        self.fire_kill_link().await;
        let state = child.stop().await;
        tracing::info!(?state, "watcher stopped");

        post(notifier, "Stopped.").await;
    }

    /// Accept the watcher's pending kill-link connection and send the stop
    /// token. Bounded; every failure path falls through to process-level
    /// stop, so the watcher never outlives the session.
    async fn fire_kill_link(&self) {
        match tokio::time::timeout(KILL_ACCEPT_TIMEOUT, self.kill_listener.accept()).await {
            Ok(Ok((mut conn, addr))) => match conn.write_all(KILL_TOKEN).await {
                Ok(()) => tracing::info!(watcher = %addr, "kill token sent"),
                Err(e) => tracing::warn!(error = %e, "kill link write failed"),
            },
            Ok(Err(e)) => tracing::warn!(error = %e, "kill link accept failed"),
            Err(_) => tracing::warn!("watcher never connected to kill link"),
        }
    }

    /// Tear down whatever is still live. Safe on every exit path; sockets
    /// close on drop.
    pub async fn shutdown(&mut self) {
        if let Some(mut child) = self.watcher.take() {
            self.fire_kill_link().await;
            let state = child.stop().await;
            tracing::info!(?state, "watcher stopped during shutdown");
        }
        tracing::info!("session closed");
    }
}

async fn post(notifier: &dyn Notifier, text: &str) {
    if let Err(e) = notifier.post_text(text).await {
        tracing::warn!(error = %e, "status post failed");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
