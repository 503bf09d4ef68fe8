use tracing::trace;

// Recorded through the `metrics` facade; `/metrics` renders whatever the
// installed Prometheus recorder has collected.

pub const REQUESTS_TOTAL: &str = "wb_requests_total";
pub const STAGE_ELAPSED_MS: &str = "wb_stage_elapsed_ms";

pub fn inc_requests(route: &'static str) {
    ::metrics::counter!(REQUESTS_TOTAL, "route" => route).increment(1);
    trace!(target = "wb.metrics", route = route, "requests_total_inc");
}

pub fn stage_elapsed(stage: &'static str, elapsed_ms: u128) {
    ::metrics::histogram!(STAGE_ELAPSED_MS, "stage" => stage).record(elapsed_ms as f64);
    trace!(
        target = "wb.metrics",
        stage = stage,
        elapsed_ms = elapsed_ms as u64,
        "stage_elapsed"
    );
}
