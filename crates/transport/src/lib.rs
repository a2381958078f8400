//! HTTP transport abstraction for the lesson platform API
//!
//! Defines the `Transport` trait that decouples the session manager from the
//! HTTP client. `ReqwestTransport` is the production implementation; tests
//! substitute scripted transports to drive the refresh protocol without a
//! network.
//!
//! A transport reports what happened on the wire and nothing more: any HTTP
//! status (including 401) is a successful `HttpResponse`. Only failures to
//! obtain a status at all (connect refused, timeout, truncated body) are
//! `TransportError`s.

pub mod reqwest_transport;

pub use reqwest_transport::ReqwestTransport;

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, InvalidHeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::pin::Pin;

/// A fully resolved outbound HTTP call.
#[derive(Debug, Clone)]
pub struct HttpCall {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl HttpCall {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Serialize `value` as the JSON body and set `content-type`.
    pub fn with_json<T: Serialize + ?Sized>(mut self, value: &T) -> serde_json::Result<Self> {
        self.body = Some(Bytes::from(serde_json::to_vec(value)?));
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }
}

/// Status, headers and body of a completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True for the status that drives the refresh protocol.
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    /// Body as UTF-8 text (lossy).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

/// Transport-level failures, distinct from any HTTP status code.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("response body unreadable: {0}")]
    Body(String),

    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Short label for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::Timeout(_) => "timeout",
            TransportError::Connect(_) => "connection",
            TransportError::Body(_) => "body",
            TransportError::Other(_) => "other",
        }
    }
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Abstraction over the HTTP client used to reach the API.
///
/// Uses a `Pin<Box<dyn Future>>` return type for dyn-compatibility
/// (`Arc<dyn Transport>`), so the session can be constructed over any
/// implementation at runtime.
pub trait Transport: Send + Sync {
    /// Identifier for logging (e.g. "reqwest")
    fn id(&self) -> &str;

    /// Issue the call and return whatever status the server answered with.
    fn execute(&self, call: HttpCall)
    -> Pin<Box<dyn Future<Output = Result<HttpResponse>> + Send + '_>>;
}

/// Set `Authorization: Bearer <token>`, replacing any existing value.
pub fn set_bearer(
    headers: &mut HeaderMap,
    token: &str,
) -> std::result::Result<(), InvalidHeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
    value.set_sensitive(true);
    headers.insert(AUTHORIZATION, value);
    Ok(())
}
