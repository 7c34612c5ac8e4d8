use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use risk_scorer::RiskScore;
use std::time::Duration;
use threat_correlation::CorrelationReport;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Correlation metrics
    pub static ref ANOMALIES_CORRELATED: IntCounter = IntCounter::new(
        "correlate_anomalies_total",
        "Total number of anomaly records passed through correlation"
    ).expect("valid metric");

    pub static ref PATTERNS_DETECTED: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "correlate_patterns_total",
            "Total number of correlation patterns detected, by pattern type"
        ),
        &["type"]
    ).expect("valid metric");

    pub static ref MATRIX_PAIRS: IntGauge = IntGauge::new(
        "correlate_matrix_pairs",
        "Number of IP pairs in the most recent correlation matrix"
    ).expect("valid metric");

    pub static ref CORRELATION_TIME: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "correlate_run_seconds",
            "Time to correlate one batch of anomalies"
        )
    ).expect("valid metric");

    // Scoring metrics
    pub static ref RISK_SCORE_DISTRIBUTION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "correlate_risk_score",
            "Distribution of final risk scores"
        )
        .buckets(vec![20.0, 40.0, 65.0, 85.0, 100.0])
    ).expect("valid metric");
}

/// Register every metric with [`REGISTRY`]. Safe to call more than once.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    register(Box::new(ANOMALIES_CORRELATED.clone()))?;
    register(Box::new(PATTERNS_DETECTED.clone()))?;
    register(Box::new(MATRIX_PAIRS.clone()))?;
    register(Box::new(CORRELATION_TIME.clone()))?;
    register(Box::new(RISK_SCORE_DISTRIBUTION.clone()))?;
    Ok(())
}

fn register(collector: Box<dyn prometheus::core::Collector>) -> Result<(), prometheus::Error> {
    match REGISTRY.register(collector) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Prometheus text exposition of everything in [`REGISTRY`].
pub fn export_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Records correlation runs and risk scores, and checks run latency
/// against a budget.
pub struct CorrelationRecorder {
    pub latency_threshold_ms: u64,
}

impl CorrelationRecorder {
    pub fn new() -> Self {
        Self {
            latency_threshold_ms: 100,
        }
    }

    pub fn check_latency(&self, elapsed: Duration) -> bool {
        elapsed.as_millis() < u128::from(self.latency_threshold_ms)
    }

    pub fn record_report(&self, records: usize, report: &CorrelationReport<'_>, elapsed: Duration) {
        ANOMALIES_CORRELATED.inc_by(records as u64);
        for p in &report.patterns {
            PATTERNS_DETECTED
                .with_label_values(&[p.pattern_type.as_str()])
                .inc();
        }
        MATRIX_PAIRS.set(report.matrix.len() as i64);
        CORRELATION_TIME.observe(elapsed.as_secs_f64());

        if !self.check_latency(elapsed) {
            tracing::warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                threshold_ms = self.latency_threshold_ms,
                "correlation run exceeded latency budget"
            );
        }
    }

    pub fn record_score(&self, score: &RiskScore) {
        RISK_SCORE_DISTRIBUTION.observe(score.final_score);
    }
}

impl Default for CorrelationRecorder {
    fn default() -> Self {
        Self::new()
    }
}
