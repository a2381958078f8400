//! Errors surfaced to callers of the session

use lesson_auth::Error as AuthError;

/// Terminal outcomes of a session operation.
///
/// `send` resolves every request to a response or one of these; it never
/// drops a request silently and never retries more than once.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Transport-level failure, not retried by the session
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// 401 on the single retry after a refresh, or rejected login
    #[error("request unauthorized")]
    Unauthorized,

    /// The refresh cycle failed or there is no session; sign in again
    #[error("session ended, sign in again")]
    ReauthRequired,

    /// The request could not be built; nothing was sent
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The API answered with a body the client cannot use
    #[error("unexpected API response: {0}")]
    Protocol(String),
}

impl From<AuthError> for SessionError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Http(msg) => SessionError::NetworkFailure(msg),
            AuthError::InvalidCredentials(_) => SessionError::Unauthorized,
            other => SessionError::Protocol(other.to_string()),
        }
    }
}

impl SessionError {
    /// Label for the `outcome` metric dimension.
    pub fn label(&self) -> &'static str {
        match self {
            SessionError::NetworkFailure(_) => "network_failure",
            SessionError::Unauthorized => "unauthorized",
            SessionError::ReauthRequired => "reauth_required",
            SessionError::InvalidRequest(_) => "invalid_request",
            SessionError::Protocol(_) => "protocol",
        }
    }
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
