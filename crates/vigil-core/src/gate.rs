//! Outbound rate gate — at most one evidence send per interval.

use std::time::{Duration, Instant};

/// Default minimum spacing between evidence sends.
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_secs(5);

/// Outcome of a send-if-due attempt. The no-op case is reported
/// distinctly so callers and tests can tell the two apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    Throttled,
}

/// Minimum-interval throttle on outbound payloads.
///
/// Holds one timestamp: the time of the last successful send. Written by
/// the send path only; wall-clock spacing, not message count.
#[derive(Debug)]
pub struct RateGate {
    interval: Duration,
    last_sent: Option<Instant>,
}

impl RateGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
        }
    }

    /// True when enough time has passed since the last recorded send.
    /// A gate that has never sent is always due.
    pub fn due(&self) -> bool {
        match self.last_sent {
            None => true,
            Some(at) => at.elapsed() >= self.interval,
        }
    }

    /// Record a successful send at the current time.
    pub fn record(&mut self) {
        self.last_sent = Some(Instant::now());
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
