//! Volumetric surge: a run of recent volume anomalies

use anomaly_models::{AnomalyRecord, AnomalyType, Severity};
use chrono::{DateTime, Utc};
use clock::MS_PER_MINUTE;

use crate::config::CorrelationConfig;
use crate::pattern::{mean_confidence, CorrelationPattern, PatternType};

/// At most one pattern is produced. The surge is only considered once the
/// input holds `volumetric_min_total` volume anomalies; its members are the
/// subset detected less than `volumetric_window_minutes` before `now`.
pub fn detect_volumetric_surge<'a>(
    records: &'a [AnomalyRecord],
    now: DateTime<Utc>,
    config: &CorrelationConfig,
) -> Option<CorrelationPattern<'a>> {
    let volume: Vec<&'a AnomalyRecord> = records
        .iter()
        .filter(|a| a.anomaly_type == AnomalyType::Volume)
        .collect();
    if volume.len() < config.volumetric_min_total {
        return None;
    }

    let window_ms = i64::from(config.volumetric_window_minutes) * MS_PER_MINUTE;
    let now_ms = clock::epoch_ms(&now);
    let recent: Vec<&'a AnomalyRecord> = volume
        .into_iter()
        .filter(|a| now_ms - a.detected_at_ms() < window_ms)
        .collect();
    tracing::debug!(recent = recent.len(), "recent volume anomalies");
    if recent.is_empty() || recent.len() < config.volumetric_min_recent {
        return None;
    }

    let size = recent.len();
    let severity = if size > 8 {
        Severity::Critical
    } else {
        Severity::High
    };
    Some(CorrelationPattern {
        id: "volumetric-surge".to_string(),
        name: "Volumetric Surge".to_string(),
        description: format!(
            "{} volume anomalies detected in the last {} minutes",
            size, config.volumetric_window_minutes
        ),
        confidence: mean_confidence(&recent),
        severity,
        pattern_type: PatternType::Volumetric,
        time_window_minutes: Some(config.volumetric_window_minutes),
        time_span_ms: None,
        correlation_score: (0.4 + 0.04 * size as f64).min(0.85),
        anomalies: recent,
    })
}
