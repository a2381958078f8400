//! Scripted in-process API for session tests
//!
//! Routes:
//! - login: `hunter22` is the only accepted password, issues `A1`/`R1`
//! - refresh: per `RefreshBehavior`, optionally held until released; a
//!   refresh token revoked by logout always gets 401
//! - logout: 200 and revokes the posted refresh token, or 500 after `fail_logout`
//! - me: profile of `ivanov` for the accepted access token
//! - `/public`: always 200
//! - `/always-401`: always 401
//! - `/status/{code}`: always `code`
//! - `/offline`: transport connect error
//! - anything else: 200 echoing the token if it is accepted, 401 otherwise

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use lesson_auth::{LOGIN_PATH, LOGOUT_PATH, ME_PATH, REFRESH_PATH};
use reqwest::header::AUTHORIZATION;
use tokio::sync::watch;
use transport::{HttpCall, HttpResponse, Transport, TransportError};

#[derive(Debug, Clone)]
pub(crate) enum RefreshBehavior {
    /// Issue `A{n+1}`/`R{n+1}` and accept the new access token
    Rotate,
    Reject(u16),
    NetworkError,
    Malformed,
}

struct State {
    accepted_access: Option<String>,
    issued: u32,
    refresh: RefreshBehavior,
    logout_fails: bool,
    calls: Vec<HttpCall>,
    refresh_tokens: Vec<String>,
    revoked_refresh: Vec<String>,
}

pub(crate) struct MockApi {
    state: Mutex<State>,
    gate: watch::Sender<bool>,
}

impl MockApi {
    pub(crate) const BASE_URL: &'static str = "http://api.test";

    pub(crate) fn new() -> Arc<Self> {
        let (gate, _) = watch::channel(true);
        Arc::new(Self {
            state: Mutex::new(State {
                accepted_access: None,
                issued: 1,
                refresh: RefreshBehavior::Rotate,
                logout_fails: false,
                calls: Vec::new(),
                refresh_tokens: Vec::new(),
                revoked_refresh: Vec::new(),
            }),
            gate,
        })
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub(crate) fn accept_access(&self, token: &str) {
        self.state().accepted_access = Some(token.to_string());
    }

    pub(crate) fn revoke_access(&self, token: &str) {
        let mut state = self.state();
        if state.accepted_access.as_deref() == Some(token) {
            state.accepted_access = None;
        }
    }

    pub(crate) fn set_refresh(&self, behavior: RefreshBehavior) {
        self.state().refresh = behavior;
    }

    pub(crate) fn reject_refresh(&self, status: u16) {
        self.set_refresh(RefreshBehavior::Reject(status));
    }

    pub(crate) fn fail_logout(&self) {
        self.state().logout_fails = true;
    }

    /// Park refresh calls until `release_refresh`.
    pub(crate) fn hold_refresh(&self) {
        self.gate.send_replace(false);
    }

    pub(crate) fn release_refresh(&self) {
        self.gate.send_replace(true);
    }

    /// Refresh calls received, including ones still held.
    pub(crate) fn refresh_calls(&self) -> usize {
        let url = format!("{}{REFRESH_PATH}", Self::BASE_URL);
        self.state().calls.iter().filter(|c| c.url == url).count()
    }

    pub(crate) fn refresh_tokens_received(&self) -> Vec<String> {
        self.state().refresh_tokens.clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    pub(crate) fn last_call_to(&self, path: &str) -> Option<HttpCall> {
        let url = format!("{}{path}", Self::BASE_URL);
        self.state().calls.iter().rev().find(|c| c.url == url).cloned()
    }

    fn refresh(&self, call: &HttpCall) -> transport::Result<HttpResponse> {
        let token = posted_refresh_token(call);
        let mut state = self.state();
        state.refresh_tokens.push(token.clone());
        if state.revoked_refresh.contains(&token) {
            return Ok(json(401, serde_json::json!({"detail": "Invalid refresh token"})));
        }

        match state.refresh.clone() {
            RefreshBehavior::Rotate => {
                state.issued += 1;
                let access = format!("A{}", state.issued);
                let refresh = format!("R{}", state.issued);
                state.accepted_access = Some(access.clone());
                Ok(json(
                    200,
                    serde_json::json!({"access_token": access, "refresh_token": refresh, "token_type": "bearer"}),
                ))
            }
            RefreshBehavior::Reject(status) => Ok(json(
                status,
                serde_json::json!({"detail": "Invalid refresh token"}),
            )),
            RefreshBehavior::NetworkError => {
                Err(TransportError::Connect("connection refused".into()))
            }
            RefreshBehavior::Malformed => Ok(HttpResponse::new(200, "<html>gateway</html>")),
        }
    }

    fn login(&self, call: &HttpCall) -> HttpResponse {
        let body: serde_json::Value = call
            .body
            .as_ref()
            .and_then(|b| serde_json::from_slice(b).ok())
            .unwrap_or_default();
        if body["password"] != "hunter22" {
            return json(401, serde_json::json!({"detail": "Incorrect email or password"}));
        }
        self.state().accepted_access = Some("A1".into());
        json(
            200,
            serde_json::json!({"access_token": "A1", "refresh_token": "R1", "token_type": "bearer"}),
        )
    }

    fn route(&self, call: &HttpCall, path: &str, token: Option<String>) -> transport::Result<HttpResponse> {
        let accepted = {
            let state = self.state();
            token.is_some() && state.accepted_access == token
        };

        if path == LOGIN_PATH {
            return Ok(self.login(call));
        }
        if path == LOGOUT_PATH {
            let mut state = self.state();
            if state.logout_fails {
                return Ok(json(500, serde_json::json!({"detail": "scripted"})));
            }
            state.revoked_refresh.push(posted_refresh_token(call));
            return Ok(json(200, serde_json::json!({"message": "Successfully logged out"})));
        }
        if let Some(code) = path.strip_prefix("/status/") {
            let status = code.parse().unwrap_or(500);
            return Ok(json(status, serde_json::json!({"detail": "scripted"})));
        }
        match path {
            "/public" => Ok(json(200, serde_json::json!({"public": true}))),
            "/always-401" => Ok(unauthorized()),
            "/offline" => Err(TransportError::Connect("connection refused".into())),
            _ if !accepted => Ok(unauthorized()),
            p if p == ME_PATH => Ok(json(
                200,
                serde_json::json!({
                    "id": 12,
                    "email": "ivanov.ii@dvfu.ru",
                    "username": "ivanov",
                    "is_active": true,
                    "created_at": "2025-09-01T08:30:00"
                }),
            )),
            p => Ok(json(200, serde_json::json!({"path": p, "token": token}))),
        }
    }
}

fn posted_refresh_token(call: &HttpCall) -> String {
    let body: serde_json::Value = call
        .body
        .as_ref()
        .and_then(|b| serde_json::from_slice(b).ok())
        .unwrap_or_default();
    body["refresh_token"].as_str().unwrap_or_default().to_string()
}

fn json(status: u16, value: serde_json::Value) -> HttpResponse {
    HttpResponse::new(status, value.to_string())
}

fn unauthorized() -> HttpResponse {
    json(401, serde_json::json!({"detail": "Could not validate credentials"}))
}

impl Transport for MockApi {
    fn id(&self) -> &str {
        "mock"
    }

    fn execute(
        &self,
        call: HttpCall,
    ) -> Pin<Box<dyn Future<Output = transport::Result<HttpResponse>> + Send + '_>> {
        self.state().calls.push(call.clone());
        Box::pin(async move {
            let path = call
                .url
                .strip_prefix(Self::BASE_URL)
                .unwrap_or(&call.url)
                .to_string();

            if path == REFRESH_PATH {
                let mut gate = self.gate.subscribe();
                let _ = gate.wait_for(|open| *open).await;
                return self.refresh(&call);
            }

            let token = call
                .headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::to_string);
            self.route(&call, &path, token)
        })
    }
}
