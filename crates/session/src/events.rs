//! Session lifecycle signal
//!
//! Broadcast to any number of observers (the CLI's navigation task, UI
//! layers). Sending never blocks and never fails the session when nobody
//! listens.

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The refresh token was rejected or the refresh call failed
    RefreshFailed,
    /// Explicit logout
    LoggedOut,
}

impl EndReason {
    pub fn label(&self) -> &'static str {
        match self {
            EndReason::RefreshFailed => "refresh_failed",
            EndReason::LoggedOut => "logged_out",
        }
    }
}

/// Events emitted by a `Session`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { username: String },
    Ended { reason: EndReason },
}
