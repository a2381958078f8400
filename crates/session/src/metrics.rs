//! Session counters
//!
//! - `session_requests_total` (counter): label `outcome`
//! - `session_refresh_total` (counter): label `result`
//! - `session_ended_total` (counter): label `reason`
//!
//! Without an installed recorder these are no-ops.

/// Record the final outcome of one `send`.
pub fn record_request(outcome: &'static str) {
    metrics::counter!("session_requests_total", "outcome" => outcome).increment(1);
}

/// Record a completed refresh call.
pub fn record_refresh(result: &'static str) {
    metrics::counter!("session_refresh_total", "result" => result).increment(1);
}

/// Record the end of a session.
pub fn record_session_ended(reason: &'static str) {
    metrics::counter!("session_ended_total", "reason" => reason).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_request("ok");
        record_refresh("success");
        record_session_ended("logged_out");
    }

    #[test]
    fn counters_render_with_labels() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let _guard = ::metrics::set_default_local_recorder(&recorder);

        record_request("ok");
        record_request("reauth_required");
        record_refresh("failure");
        record_session_ended("refresh_failed");

        let output = handle.render();
        assert!(output.contains("session_requests_total"), "got: {output}");
        assert!(output.contains("outcome=\"reauth_required\""), "got: {output}");
        assert!(output.contains("session_refresh_total{result=\"failure\"} 1"), "got: {output}");
        assert!(output.contains("reason=\"refresh_failed\""), "got: {output}");
    }
}
