//! Metrics collection for `NaviCue`.
//!
//! Prometheus-compatible counters and gauges for the sequencer, with typed
//! recording functions so metric names and labels live in one place.
//! Stage names never become labels; only the bounded transition cause does.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::NaviCueError;
use crate::sequencer::TransitionCause;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without an
/// HTTP endpoint.
///
/// # Errors
///
/// Returns `NaviCueError::Io` if the recorder or HTTP listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), NaviCueError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| NaviCueError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "navicue_stage_transitions_total",
        "Committed stage transitions by cause"
    );
    describe_counter!(
        "navicue_gate_rejections_total",
        "Gate actions rejected because the stage had moved on"
    );
    describe_counter!(
        "navicue_completions_total",
        "Sequences that reached their terminal stage"
    );
    describe_counter!(
        "navicue_timers_cancelled_total",
        "Timed transitions cancelled before firing"
    );
    describe_gauge!(
        "navicue_active_sequencers",
        "Sequencers currently alive"
    );
    describe_histogram!(
        "navicue_cue_duration_ms",
        "Time from cue start to completion in milliseconds"
    );
}

/// Records a committed stage transition.
pub fn record_stage_transition(cause: TransitionCause) {
    counter!("navicue_stage_transitions_total", "cause" => cause.to_string()).increment(1);
}

/// Records a rejected gate action.
pub fn record_gate_rejection() {
    counter!("navicue_gate_rejections_total").increment(1);
}

/// Records a sequence completion.
pub fn record_completion() {
    counter!("navicue_completions_total").increment(1);
}

/// Records cancelled timers; zero is not recorded.
pub fn record_timers_cancelled(count: usize) {
    if count > 0 {
        counter!("navicue_timers_cancelled_total").increment(count as u64);
    }
}

/// Tracks sequencer lifetimes.
pub fn sequencer_created() {
    gauge!("navicue_active_sequencers").increment(1.0);
}

/// Tracks sequencer lifetimes.
pub fn sequencer_dropped() {
    gauge!("navicue_active_sequencers").decrement(1.0);
}

/// Records how long a cue took to complete.
pub fn record_cue_duration(duration: Duration) {
    histogram!("navicue_cue_duration_ms").record(duration.as_secs_f64() * 1000.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        // metrics macros silently no-op when no global recorder is installed
        record_stage_transition(TransitionCause::Timer);
        record_stage_transition(TransitionCause::Gate);
        record_gate_rejection();
        record_completion();
        record_timers_cancelled(0);
        record_timers_cancelled(3);
        sequencer_created();
        sequencer_dropped();
        record_cue_duration(Duration::from_millis(3500));
    }
}
