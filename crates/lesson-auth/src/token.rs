//! Login, token refresh and logout calls
//!
//! All three POST JSON to the API. Login and refresh answer with the same
//! `TokenPair` body; logout answers with an acknowledgement the client
//! ignores.
//!
//! These functions talk to the transport directly. They never go through the
//! session's 401 handling, so a rejected refresh token cannot recurse into
//! another refresh.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use transport::{HttpCall, HttpResponse, Transport};

use crate::error::{Error, Result};

/// Token pair returned by the login and refresh endpoints.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Body of the login endpoint.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Body of the refresh and logout endpoints.
#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Exchange email and password for a token pair.
///
/// 401/403 means the API rejected the credentials (wrong password or
/// deactivated account) and is reported as `InvalidCredentials`.
pub async fn login(
    transport: &dyn Transport,
    url: &str,
    email: &str,
    password: &str,
) -> Result<TokenPair> {
    let call = HttpCall::new(Method::POST, url)
        .with_json(&LoginRequest { email, password })
        .map_err(|e| Error::TokenExchange(format!("encoding login request: {e}")))?;

    let response = transport
        .execute(call)
        .await
        .map_err(|e| Error::Http(format!("login request failed: {e}")))?;

    decode_token_pair(response, "login")
}

/// Exchange a refresh token for a new token pair.
///
/// Called by the session's refresh cycle, at most once at a time. 401/403
/// means the refresh token is expired or revoked.
pub async fn refresh_tokens(
    transport: &dyn Transport,
    url: &str,
    refresh: &str,
) -> Result<TokenPair> {
    let call = HttpCall::new(Method::POST, url)
        .with_json(&RefreshRequest {
            refresh_token: refresh,
        })
        .map_err(|e| Error::TokenExchange(format!("encoding refresh request: {e}")))?;

    let response = transport
        .execute(call)
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    decode_token_pair(response, "token refresh")
}

/// Revoke the refresh token server-side.
///
/// The bearer header is attached when an access token is available; the API
/// accepts the call either way.
pub async fn revoke(
    transport: &dyn Transport,
    url: &str,
    access: Option<&str>,
    refresh: &str,
) -> Result<()> {
    let mut call = HttpCall::new(Method::POST, url)
        .with_json(&RefreshRequest {
            refresh_token: refresh,
        })
        .map_err(|e| Error::TokenExchange(format!("encoding logout request: {e}")))?;
    if let Some(access) = access {
        transport::set_bearer(&mut call.headers, access)
            .map_err(|e| Error::InvalidCredentials(format!("access token not a valid header: {e}")))?;
    }

    let response = transport
        .execute(call)
        .await
        .map_err(|e| Error::Http(format!("logout request failed: {e}")))?;

    if !response.is_success() {
        return Err(Error::TokenExchange(format!(
            "logout returned {}: {}",
            response.status,
            response.text()
        )));
    }
    Ok(())
}

/// Classify the response of a login or refresh call.
fn decode_token_pair(response: HttpResponse, operation: &str) -> Result<TokenPair> {
    if !response.is_success() {
        let body = response.text();
        if response.status == 401 || response.status == 403 {
            return Err(Error::InvalidCredentials(format!(
                "{operation} rejected ({}): {body}",
                response.status
            )));
        }
        return Err(Error::TokenExchange(format!(
            "{operation} returned {}: {body}",
            response.status
        )));
    }

    let pair: TokenPair = response
        .json()
        .map_err(|e| Error::TokenExchange(format!("invalid {operation} response: {e}")))?;

    if pair.access_token.is_empty() || pair.refresh_token.is_empty() {
        return Err(Error::TokenExchange(format!(
            "invalid {operation} response: empty token"
        )));
    }
    Ok(pair)
}
