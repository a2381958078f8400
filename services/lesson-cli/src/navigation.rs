//! Redirect to sign-in when the session ends
//!
//! Listens for `SessionEvent`s for the lifetime of the command and tells the
//! user how to get back in after a failed refresh. Explicit logout is the
//! user's own doing and needs no notice.

use std::io::Write;

use session::{EndReason, SessionEvent};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

pub const SIGN_IN_NOTICE: &str =
    "Your session has expired. Run `lesson-client login <email>` to sign in again.";

/// Follow events until the session is dropped; returns how many sign-in
/// notices were written.
pub async fn follow<W: Write>(mut events: broadcast::Receiver<SessionEvent>, mut out: W) -> usize {
    let mut notices = 0;
    loop {
        match events.recv().await {
            Ok(SessionEvent::Ended {
                reason: EndReason::RefreshFailed,
            }) => {
                warn!("session ended after failed token refresh, redirecting to sign-in");
                if let Err(e) = writeln!(out, "{SIGN_IN_NOTICE}") {
                    warn!(error = %e, "failed to write sign-in notice");
                }
                notices += 1;
            }
            Ok(event) => debug!(?event, "session event"),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "missed session events"),
            Err(RecvError::Closed) => return notices,
        }
    }
}
