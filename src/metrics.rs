use std::sync::LazyLock;

use prometheus::*;

use crate::loader::ReloadReport;

static METRIC_SEARCH_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!("ps_search_count", "count of the image searches", &["policy"])
        .expect("metric can be registered")
});

static METRIC_SEARCH_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "ps_search_duration",
        "duration of the per-image search in seconds",
        &["policy"]
    )
    .expect("metric can be registered")
});

static METRIC_SEARCH_MAX_SCORE: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "ps_search_max_score",
        "max score of the per-image search",
        &["policy"],
        (0..=20).map(|x| x as f64 * 0.05).collect()
    )
    .expect("metric can be registered")
});

static METRIC_RELOAD_IMAGES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "ps_reload_images",
        "number of catalog images handled by index reloads",
        &["outcome"]
    )
    .expect("metric can be registered")
});

static METRIC_INDEX_SIZE: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!("ps_index_size", "number of vectors in the loaded index")
        .expect("metric can be registered")
});

/// 记录一次搜索
pub fn observe_search(search_type: &str, duration: f32, max_score: Option<f32>) {
    METRIC_SEARCH_COUNT.with_label_values(&[search_type]).inc();
    METRIC_SEARCH_DURATION.with_label_values(&[search_type]).observe(duration as f64);
    if let Some(score) = max_score {
        METRIC_SEARCH_MAX_SCORE.with_label_values(&[search_type]).observe(score as f64);
    }
}

/// 记录一次重载的结果
pub fn observe_reload(report: &ReloadReport) {
    METRIC_RELOAD_IMAGES.with_label_values(&["cached"]).inc_by(report.cached as u64);
    METRIC_RELOAD_IMAGES.with_label_values(&["extracted"]).inc_by(report.extracted as u64);
    METRIC_RELOAD_IMAGES.with_label_values(&["failed"]).inc_by(report.failed as u64);
    METRIC_INDEX_SIZE.set(report.indexed as i64);
}
