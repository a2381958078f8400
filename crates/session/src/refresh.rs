//! Single-flight token refresh
//!
//! At most one refresh call is in flight per session. The first request to
//! see a 401 moves the state from `Idle` to `Refreshing` and spawns the cycle;
//! every later 401 parks a oneshot sender in the waiter list. When the call
//! completes the cycle swaps the state back to `Idle` and sends the same
//! outcome to every waiter.
//!
//! The cycle runs on its own task, so a caller that gives up (timeout, drop)
//! cannot leave the state stuck in `Refreshing`.
//!
//! A cycle belongs to the credential generation it started in. After a logout
//! or login, a 401 on the new pair never joins a cycle from the old one: the
//! old waiters are failed and a cycle for the current pair takes its place.

use common::Secret;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};
use crate::events::{EndReason, SessionEvent};
use crate::session::{CredentialPair, Session};
use lesson_auth::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, TokenPair};

/// Result handed to each waiter of a refresh cycle.
#[derive(Debug, Clone)]
pub(crate) enum RefreshOutcome {
    Renewed(Secret<String>),
    Failed,
}

pub(crate) enum RefreshState {
    Idle,
    Refreshing {
        generation: u64,
        waiters: Vec<oneshot::Sender<RefreshOutcome>>,
    },
}

impl RefreshState {
    pub(crate) fn phase(&self) -> RefreshPhase {
        match self {
            RefreshState::Idle => RefreshPhase::Idle,
            RefreshState::Refreshing { waiters, .. } => RefreshPhase::Refreshing {
                waiters: waiters.len(),
            },
        }
    }
}

/// Observable phase of the refresh protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    Idle,
    /// A refresh call is in flight with this many requests parked on it
    Refreshing { waiters: usize },
}

impl RefreshPhase {
    pub fn label(&self) -> &'static str {
        match self {
            RefreshPhase::Idle => "idle",
            RefreshPhase::Refreshing { .. } => "refreshing",
        }
    }
}

impl Session {
    /// Wait for an access token newer than `used`.
    ///
    /// - no session: `ReauthRequired`, no refresh call
    /// - pair rotated since `used` was read: the current access token
    /// - otherwise: joins the cycle for the current generation, or starts one,
    ///   and waits for it
    pub(crate) async fn await_fresh_token(
        &self,
        used: Option<&Secret<String>>,
    ) -> Result<Secret<String>> {
        let receiver = {
            let mut state = self.inner.refresh.lock().await;
            let credentials = self.inner.credentials.read().await;

            let Some(pair) = credentials.pair.as_ref() else {
                debug!("401 without a session, sign in required");
                return Err(SessionError::ReauthRequired);
            };

            let rotated = match used {
                Some(used) => !pair.access.matches(used.expose()),
                None => true,
            };
            if rotated {
                debug!("credentials changed since the request was sent, retrying with them");
                return Ok(pair.access.clone());
            }

            let (tx, rx) = oneshot::channel();
            let generation = credentials.generation;
            match *state {
                RefreshState::Refreshing {
                    generation: cycle,
                    ref mut waiters,
                } if cycle == generation => {
                    waiters.push(tx);
                    debug!(waiters = waiters.len(), "joined in-flight refresh");
                }
                _ => {
                    let previous = std::mem::replace(
                        &mut *state,
                        RefreshState::Refreshing {
                            generation,
                            waiters: vec![tx],
                        },
                    );
                    if let RefreshState::Refreshing {
                        generation: stale,
                        waiters,
                    } = previous
                    {
                        // Their session is gone; the old cycle will find itself replaced
                        debug!(stale, waiters = waiters.len(), "superseding refresh from an ended session");
                        for waiter in waiters {
                            let _ = waiter.send(RefreshOutcome::Failed);
                        }
                    }
                    info!("access token expired, refreshing");
                    tokio::spawn(self.clone().run_refresh_cycle(pair.refresh.clone(), generation));
                }
            }
            rx
        };

        match receiver.await {
            Ok(RefreshOutcome::Renewed(token)) => Ok(token),
            Ok(RefreshOutcome::Failed) | Err(_) => Err(SessionError::ReauthRequired),
        }
    }

    /// Exchange `refresh` for a new pair and release every waiter.
    ///
    /// `generation` is the credential generation the cycle started in; if a
    /// login or logout happened meanwhile the result is discarded.
    async fn run_refresh_cycle(self, refresh: Secret<String>, generation: u64) {
        let result = match self.inner.config.url(&self.inner.config.refresh_path) {
            Ok(url) => {
                lesson_auth::refresh_tokens(self.inner.transport.as_ref(), &url, refresh.expose())
                    .await
                    .map_err(SessionError::from)
            }
            Err(e) => Err(e),
        };

        let mut state = self.inner.refresh.lock().await;
        let current = self.inner.credentials.read().await.generation;

        let outcome = if current != generation {
            debug!(generation, current, "session changed during refresh, discarding result");
            RefreshOutcome::Failed
        } else {
            match result {
                Ok(pair) => self.adopt_refreshed(pair).await,
                Err(e) => self.end_after_failed_refresh(e).await,
            }
        };

        // A newer cycle may own the state by now; leave it alone
        let owned = matches!(*state, RefreshState::Refreshing { generation: g, .. } if g == generation);
        let waiters = if owned {
            match std::mem::replace(&mut *state, RefreshState::Idle) {
                RefreshState::Refreshing { waiters, .. } => waiters,
                RefreshState::Idle => Vec::new(),
            }
        } else {
            Vec::new()
        };
        drop(state);

        debug!(waiters = waiters.len(), "releasing refresh waiters");
        for waiter in waiters {
            // Receiver gone means the caller gave up; nothing to deliver
            let _ = waiter.send(outcome.clone());
        }
    }

    async fn adopt_refreshed(&self, pair: TokenPair) -> RefreshOutcome {
        let pair = CredentialPair::from(pair);
        let changes = vec![
            (ACCESS_TOKEN_KEY.to_string(), Some(pair.access.expose().clone())),
            (REFRESH_TOKEN_KEY.to_string(), Some(pair.refresh.expose().clone())),
        ];
        if let Err(e) = self.inner.store.update(changes).await {
            warn!(error = %e, "failed to persist refreshed credentials");
        }

        let access = pair.access.clone();
        self.inner.credentials.write().await.pair = Some(pair);
        crate::metrics::record_refresh("success");
        info!("access token refreshed");
        RefreshOutcome::Renewed(access)
    }

    async fn end_after_failed_refresh(&self, error: SessionError) -> RefreshOutcome {
        warn!(error = %error, "token refresh failed, ending session");
        self.inner.credentials.write().await.pair = None;
        self.inner.remove_persisted().await;

        crate::metrics::record_refresh("failure");
        crate::metrics::record_session_ended(EndReason::RefreshFailed.label());
        let _ = self.inner.events.send(SessionEvent::Ended {
            reason: EndReason::RefreshFailed,
        });
        RefreshOutcome::Failed
    }
}
