use lazy_static::lazy_static;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ==== Crowd Analytics Metrics ====
    pub static ref CROWD_FRAMES_PROCESSED: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new("crowd_frames_processed_total", "Total number of analysed frames"),
            &["venue"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref CROWD_PEOPLE_COUNT: IntGaugeVec = {
        let metric = IntGaugeVec::new(
            Opts::new("crowd_people_count", "People counted in the latest frame"),
            &["venue"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref CROWD_ALERTS_GENERATED: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "crowd_alerts_generated_total",
                "Total number of predictive alerts raised by the alert engine",
            ),
            &["type", "severity"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref CROWD_ALERTS_SUPPRESSED: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "crowd_alerts_suppressed_total",
                "Alerts dropped because the same type was raised recently",
            ),
            &["type"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref CROWD_ZONES_DETECTED: Histogram = {
        let metric = Histogram::with_opts(
            HistogramOpts::new("crowd_zones_detected", "Zones produced per clustered frame")
                .buckets(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 8.0, 10.0]),
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref CROWD_FRAME_PROCESSING_TIME: HistogramVec = {
        let metric = HistogramVec::new(
            HistogramOpts::new(
                "crowd_frame_processing_seconds",
                "Time spent on heatmap, alert and zone analysis for one frame",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
            &["stage"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };
}

/// Helper function to encode metrics for Prometheus scraping
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| {
        prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e))
    })
}
