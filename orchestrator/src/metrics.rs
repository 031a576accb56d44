use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

pub static PIPELINE_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "pipeline_runs_total",
        "Pipeline runs by outcome",
        &["outcome"]
    )
    .expect("pipeline_runs_total registers once")
});

pub static ACTION_INVOCATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "action_invocations_total",
        "Action invocations by action name and outcome",
        &["action", "outcome"]
    )
    .expect("action_invocations_total registers once")
});

pub static STAGE_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "pipeline_stage_seconds",
        "Wall time spent in each pipeline stage",
        &["stage"]
    )
    .expect("pipeline_stage_seconds registers once")
});

/// Renders the default registry in the Prometheus text format.
pub fn render() -> (Vec<u8>, String) {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    (buffer, encoder.format_type().to_string())
}
