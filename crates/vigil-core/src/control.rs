//! Control-plane tokens and the session lifecycle state machine.
//!
//! These tokens ARE the protocol. The control link carries short ASCII
//! tokens over TCP, one token per write; the kill link carries exactly one
//! fixed token per session. Unknown input decodes to an explicit
//! `Unrecognized` variant — logged by the consumer, never fatal.

// ── Wire tokens ───────────────────────────────────────────────────────────────

/// The one-shot kill-link token. Exactly 4 bytes, sent once per session.
pub const KILL_TOKEN: &[u8] = b"stop";

/// Read buffer size for control/kill token reads. Tokens are far shorter;
/// anything longer than this in one read is already malformed.
pub const MAX_TOKEN_LEN: usize = 64;

/// A control-link message.
///
/// Tokens are written whole and read whole; the link is quiet between
/// lifecycle events, so coalesced reads do not occur in practice. A read
/// that matches no token becomes `Unrecognized` and is ignored upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMsg {
    /// Relay → supervisor: sockets bound, link established.
    Ready,
    /// Relay → supervisor: front-end began the session, streaming enabled.
    Running,
    /// Relay → supervisor: front-end ended the session, teardown under way.
    Stopping,
    /// Supervisor → relay: terminate the session and exit.
    Stop,
    /// Anything else. Carried verbatim for logging; never sent.
    Unrecognized(Vec<u8>),
}

impl ControlMsg {
    /// Wire form of this message. `Unrecognized` has no wire form and
    /// encodes to the empty token, which every decoder ignores.
    pub fn token(&self) -> &'static [u8] {
        match self {
            ControlMsg::Ready => b"ready",
            ControlMsg::Running => b"running",
            ControlMsg::Stopping => b"stopping",
            ControlMsg::Stop => b"stop",
            ControlMsg::Unrecognized(_) => b"",
        }
    }

    /// Decode one read's worth of bytes into a message.
    ///
    /// `ok` is accepted as a legacy spelling of `ready`. Surrounding ASCII
    /// whitespace is tolerated; anything else is `Unrecognized`.
    pub fn decode(raw: &[u8]) -> ControlMsg {
        match raw.trim_ascii() {
            b"ok" | b"ready" => ControlMsg::Ready,
            b"running" => ControlMsg::Running,
            b"stopping" => ControlMsg::Stopping,
            b"stop" => ControlMsg::Stop,
            _ => ControlMsg::Unrecognized(raw.to_vec()),
        }
    }
}

// ── Session lifecycle ─────────────────────────────────────────────────────────

/// Lifecycle of the one-and-only session, as observed by the supervisor.
///
/// At most one session is ever `Active`. A start request in any state other
/// than `Idle` is rejected as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session.
    Idle,
    /// Relay spawned, waiting for its `ready`.
    Handshaking,
    /// Session live, forwarding enabled.
    Active,
    /// Stop requested, teardown in progress.
    Ending,
}

impl SessionState {
    /// Status line shown by the supervisor. Total and deterministic:
    /// every state maps to exactly one string.
    pub fn status_line(&self) -> &'static str {
        match self {
            SessionState::Idle => "Program not running",
            SessionState::Handshaking => "Relay spawned, waiting for readiness...",
            SessionState::Active => "Session active, forwarding enabled",
            SessionState::Ending => "Stop requested, program stopping...",
        }
    }

    /// Apply a message received from the relay.
    ///
    /// `Running` while `Active` is a confirmation, not a transition.
    /// Out-of-order or unrecognized messages leave the state unchanged.
    /// `Stopping` during the handshake is honored — prefer stopping over
    /// hanging when the relay aborts early.
    pub fn on_message(self, msg: &ControlMsg) -> SessionState {
        match (self, msg) {
            (SessionState::Handshaking, ControlMsg::Ready) => SessionState::Active,
            (SessionState::Active, ControlMsg::Stopping) => SessionState::Ending,
            (SessionState::Handshaking, ControlMsg::Stopping) => SessionState::Ending,
            (state, _) => state,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
