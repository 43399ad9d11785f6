// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade. Without an installed recorder every call is
//! a no-op; [`install_prometheus`] installs the Prometheus exporter.

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use skillrun_core::{ResultStatus, SkillrunError};

/// Installs the Prometheus recorder globally and registers descriptions.
///
/// Only one recorder can be installed per process.
pub fn install_prometheus() -> Result<PrometheusHandle, SkillrunError> {
    let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        SkillrunError::Internal(format!("failed to install Prometheus recorder: {e}"))
    })?;
    register_metrics();
    tracing::info!("prometheus metrics recorder installed");
    Ok(handle)
}

pub fn register_metrics() {
    describe_counter!("skillrun_invocations_total", "Invocations by terminal status");
    describe_gauge!("skillrun_active_invocations", "Invocations currently running");
    describe_histogram!(
        "skillrun_invocation_duration_seconds",
        "Wall time from start to terminal status"
    );
    describe_counter!("skillrun_tokens_total", "Tokens reported by runnables");
    describe_counter!("skillrun_timeouts_total", "Results failed by a timeout check");
    describe_counter!("skillrun_jobs_total", "Queue jobs by kind and disposition");
}

pub fn invocation_started() {
    metrics::gauge!("skillrun_active_invocations").increment(1.0);
}

pub fn invocation_finished(status: ResultStatus, aborted: bool, seconds: f64) {
    metrics::gauge!("skillrun_active_invocations").decrement(1.0);
    metrics::counter!(
        "skillrun_invocations_total",
        "status" => status.to_string(),
        "aborted" => aborted.to_string()
    )
    .increment(1);
    metrics::histogram!("skillrun_invocation_duration_seconds").record(seconds);
}

pub fn record_tokens(model: &str, input: u64, output: u64) {
    metrics::counter!("skillrun_tokens_total", "model" => model.to_string(), "type" => "input")
        .increment(input);
    metrics::counter!("skillrun_tokens_total", "model" => model.to_string(), "type" => "output")
        .increment(output);
}

pub fn record_timeout(kind: &str) {
    metrics::counter!("skillrun_timeouts_total", "kind" => kind.to_string()).increment(1);
}

pub fn record_job(kind: &str, disposition: &str) {
    metrics::counter!(
        "skillrun_jobs_total",
        "kind" => kind.to_string(),
        "disposition" => disposition.to_string()
    )
    .increment(1);
}
