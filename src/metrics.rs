use std::sync::LazyLock;

use prometheus::*;

static METRIC_SEARCH_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "framesearch_search_count",
        "number of search requests served",
        &["kind"]
    )
    .unwrap()
});

static METRIC_SEARCH_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "framesearch_search_duration",
        "duration of a fused search in seconds",
        &["kind"]
    )
    .unwrap()
});

static METRIC_SEARCH_RESULTS: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "framesearch_search_results",
        "merged result count per search",
        &["kind"],
        vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0]
    )
    .unwrap()
});

/// Records one served search request.
pub fn observe_search(kind: &str, duration_secs: f64, results: usize) {
    METRIC_SEARCH_COUNT.with_label_values(&[kind]).inc();
    METRIC_SEARCH_DURATION.with_label_values(&[kind]).observe(duration_secs);
    METRIC_SEARCH_RESULTS.with_label_values(&[kind]).observe(results as f64);
}
