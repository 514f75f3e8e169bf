//! Child-process supervision — graceful stop with bounded escalation.
//!
//! Each owned child is a small state machine: Spawned → Stopping →
//! Exited | Killed. The stop sequence sends SIGTERM, polls liveness at a
//! fixed short cadence up to a bounded grace period, then force-kills.
//! It always returns within grace + one poll tick.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::{Child, Command};

/// Default grace period before escalating to SIGKILL.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// Default liveness poll cadence during the grace period.
pub const DEFAULT_POLL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildState {
    /// Running, not asked to stop.
    Spawned,
    /// SIGTERM sent, waiting out the grace period.
    Stopping,
    /// Exited on its own or on SIGTERM. Code is None when signal-killed.
    Exited(Option<i32>),
    /// Ignored SIGTERM past the grace period and was force-killed.
    Killed,
}

#[derive(Debug, thiserror::Error)]
pub enum SuperviseError {
    #[error("empty child command")]
    EmptyCommand,
    #[error("failed to spawn {0}: {1}")]
    SpawnFailed(String, std::io::Error),
}

/// Supervises one spawned child process.
#[derive(Debug)]
pub struct ChildSupervisor {
    child: Child,
    program: String,
    state: ChildState,
    grace: Duration,
    poll: Duration,
}

impl ChildSupervisor {
    /// Spawn `argv[0]` with the remaining arguments.
    /// `kill_on_drop` backstops every error path: an abandoned supervisor
    /// never leaves an orphan running.
    pub fn spawn(argv: &[String], grace: Duration, poll: Duration) -> Result<Self, SuperviseError> {
        let (program, args) = argv.split_first().ok_or(SuperviseError::EmptyCommand)?;
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SuperviseError::SpawnFailed(program.clone(), e))?;
        tracing::info!(program = %program, pid = ?child.id(), "child spawned");
        Ok(Self {
            child,
            program: program.clone(),
            state: ChildState::Spawned,
            grace,
            poll,
        })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn state(&self) -> ChildState {
        self.state
    }

    /// Stop sequence: SIGTERM, poll up to the grace period, then SIGKILL.
    ///
    /// Idempotent — calling again after the child is gone just reports the
    /// terminal state. Never blocks past grace + one poll tick.
    pub async fn stop(&mut self) -> ChildState {
        match self.state {
            ChildState::Exited(_) | ChildState::Killed => return self.state,
            _ => {}
        }
        self.state = ChildState::Stopping;

        match self.child.id() {
            Some(pid) => {
                // SAFETY: plain syscall on a pid we own; failure is handled
                // by the escalation below.
                let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
                if rc != 0 {
                    tracing::warn!(program = %self.program, pid, "SIGTERM delivery failed");
                }
            }
            None => {
                // Already reaped by the runtime.
                let code = self.child.try_wait().ok().flatten().and_then(|s| s.code());
                self.state = ChildState::Exited(code);
                return self.state;
            }
        }

        let deadline = Instant::now() + self.grace;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    tracing::info!(program = %self.program, code = ?status.code(), "child exited");
                    self.state = ChildState::Exited(status.code());
                    return self.state;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(program = %self.program, error = %e, "liveness poll failed, escalating");
                    break;
                }
            }
            if Instant::now() >= deadline {
                tracing::warn!(
                    program = %self.program,
                    grace_secs = self.grace.as_secs_f64(),
                    "child ignored SIGTERM past grace period, force-killing"
                );
                break;
            }
            tokio::time::sleep(self.poll).await;
        }

        if let Err(e) = self.child.kill().await {
            tracing::warn!(program = %self.program, error = %e, "force-kill failed");
        }
        self.state = ChildState::Killed;
        self.state
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_command_is_rejected() {
        let err = ChildSupervisor::spawn(&[], DEFAULT_GRACE, DEFAULT_POLL).unwrap_err();
        assert!(matches!(err, SuperviseError::EmptyCommand));
    }

    #[tokio::test]
    async fn cooperative_child_exits_on_sigterm() {
        let mut sup = ChildSupervisor::spawn(
            &argv(&["sleep", "30"]),
            Duration::from_secs(3),
            Duration::from_millis(50),
        )
        .unwrap();
        assert_eq!(sup.state(), ChildState::Spawned);
        let state = sup.stop().await;
        assert!(matches!(state, ChildState::Exited(_)), "got {state:?}");
    }

    #[tokio::test]
    async fn already_exited_child_reports_code() {
        let mut sup = ChildSupervisor::spawn(
            &argv(&["true"]),
            Duration::from_secs(1),
            Duration::from_millis(20),
        )
        .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let state = sup.stop().await;
        assert!(matches!(state, ChildState::Exited(Some(0))), "got {state:?}");
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let mut sup = ChildSupervisor::spawn(
            &argv(&["true"]),
            Duration::from_secs(1),
            Duration::from_millis(20),
        )
        .unwrap();
        let first = sup.stop().await;
        let second = sup.stop().await;
        assert_eq!(first, second);
    }
}
