//! `reqwest`-backed transport used by the command-line client.

use crate::{HttpCall, HttpResponse, Transport, TransportError};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::debug;

/// Transport over a shared `reqwest::Client` with a per-request timeout.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

impl Transport for ReqwestTransport {
    fn id(&self) -> &str {
        "reqwest"
    }

    fn execute(
        &self,
        call: HttpCall,
    ) -> Pin<Box<dyn Future<Output = crate::Result<HttpResponse>> + Send + '_>> {
        Box::pin(async move {
            let mut request = self
                .client
                .request(call.method, &call.url)
                .headers(call.headers)
                .timeout(self.timeout);
            if let Some(body) = call.body {
                request = request.body(body);
            }

            let response = request.send().await.map_err(classify_send_error)?;
            let status = response.status().as_u16();
            let headers = response.headers().clone();
            let body = response
                .bytes()
                .await
                .map_err(|e| TransportError::Body(format!("reading response body: {e}")))?;

            debug!(status, bytes = body.len(), "response received");
            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        })
    }
}

fn classify_send_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}
