//! Prometheus rendering of the session counters
//!
//! With `--metrics` the recorder is installed before the session is built and
//! the text exposition is written to stderr when the command finishes:
//!
//! - `session_requests_total` (counter): label `outcome`
//! - `session_refresh_total` (counter): label `result`
//! - `session_ended_total` (counter): label `reason`

use anyhow::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// Only one global recorder can exist per process; call once from `main`.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")
}
