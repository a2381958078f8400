//! Authenticated session manager for the lesson platform API
//!
//! Every API call made by feature code goes through `Session::send`, which
//! attaches the current bearer token and handles 401 responses by renewing the
//! credential pair. Concurrent 401s share a single refresh cycle.
//!
//! Request lifecycle:
//! 1. `send` attaches `Authorization: Bearer <access>` (if signed in) and issues the call
//! 2. Any non-401 response is returned as-is
//! 3. A 401 enrolls the request in the refresh cycle (starting one if `Idle`)
//! 4. The cycle exchanges the refresh token once and releases every waiter
//! 5. Each waiter retries once with the new access token; a second 401 is terminal
//! 6. A failed cycle clears the pair and emits `SessionEvent::Ended`

pub mod endpoints;
pub mod error;
pub mod events;
pub mod metrics;
pub mod refresh;
pub mod request;
pub mod session;

#[cfg(test)]
mod mock;

pub use error::{Result, SessionError};
pub use events::{EndReason, SessionEvent};
pub use refresh::RefreshPhase;
pub use request::RequestSpec;
pub use session::{CredentialPair, Session, SessionConfig};
pub use transport::HttpResponse;
