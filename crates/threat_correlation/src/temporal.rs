//! Temporal clustering: bursts of anomalies inside one fixed-width window

use anomaly_models::{AnomalyRecord, Severity};
use clock::MS_PER_MINUTE;
use std::collections::BTreeMap;

use crate::config::CorrelationConfig;
use crate::pattern::{mean_confidence, CorrelationPattern, PatternType};

/// Group records into non-overlapping windows keyed by
/// `floor(timestamp / width)` and report every window holding at least
/// `temporal_min_cluster` records.
pub fn detect_temporal_clusters<'a>(
    records: &'a [AnomalyRecord],
    config: &CorrelationConfig,
) -> Vec<CorrelationPattern<'a>> {
    let width_ms = i64::from(config.temporal_bucket_minutes) * MS_PER_MINUTE;
    if width_ms <= 0 {
        return Vec::new();
    }

    let mut buckets: BTreeMap<i64, Vec<&'a AnomalyRecord>> = BTreeMap::new();
    for r in records {
        buckets
            .entry(r.timestamp_ms().div_euclid(width_ms))
            .or_default()
            .push(r);
    }
    tracing::debug!(buckets = buckets.len(), "temporal buckets");

    buckets
        .into_iter()
        .filter(|(_, members)| members.len() >= config.temporal_min_cluster)
        .map(|(bucket, members)| {
            let size = members.len();
            let severity = if members.iter().any(|a| a.severity == Severity::Critical) {
                Severity::Critical
            } else if size > 5 {
                Severity::High
            } else {
                Severity::Medium
            };
            let start = clock::from_epoch_ms(bucket * width_ms);
            CorrelationPattern {
                id: format!("temporal-{bucket}"),
                name: "Temporal Cluster".to_string(),
                description: format!(
                    "{} anomalies within the {}-minute window starting {}",
                    size,
                    config.temporal_bucket_minutes,
                    start.to_rfc3339()
                ),
                confidence: mean_confidence(&members),
                severity,
                pattern_type: PatternType::Temporal,
                time_window_minutes: Some(config.temporal_bucket_minutes),
                time_span_ms: None,
                correlation_score: (0.6 + 0.05 * size as f64).min(0.95),
                anomalies: members,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at_minute, record};

    #[test]
    fn three_in_one_window_form_a_cluster() {
        let records = vec![
            record("a", "1.1.1.1", "9.9.9.9", at_minute(0)),
            record("b", "2.2.2.2", "9.9.9.9", at_minute(4)),
            record("c", "3.3.3.3", "9.9.9.9", at_minute(9)),
        ];
        let patterns = detect_temporal_clusters(&records, &CorrelationConfig::default());
        assert_eq!(patterns.len(), 1);
        let p = &patterns[0];
        assert_eq!(p.pattern_type, PatternType::Temporal);
        assert_eq!(p.anomaly_ids(), vec!["a", "b", "c"]);
        assert_eq!(p.severity, Severity::Medium);
        assert_eq!(p.time_window_minutes, Some(10));
        assert_eq!(p.time_span_ms, None);
        assert!((p.correlation_score - 0.75).abs() < 1e-9);
    }

    #[test]
    fn window_boundary_splits_groups() {
        let records = vec![
            record("a", "1.1.1.1", "9.9.9.9", at_minute(8)),
            record("b", "1.1.1.1", "9.9.9.9", at_minute(9)),
            record("c", "1.1.1.1", "9.9.9.9", at_minute(10)),
            record("d", "1.1.1.1", "9.9.9.9", at_minute(11)),
        ];
        assert!(detect_temporal_clusters(&records, &CorrelationConfig::default()).is_empty());
    }

    #[test]
    fn severity_escalates_with_size_and_critical_members() {
        let mut records: Vec<_> = (0..6)
            .map(|i| record(&format!("r{i}"), "1.1.1.1", "9.9.9.9", at_minute(i)))
            .collect();
        {
            let found = detect_temporal_clusters(&records, &CorrelationConfig::default());
            let p = &found[0];
            assert_eq!(p.severity, Severity::High);
            assert!((p.correlation_score - 0.9).abs() < 1e-9);
        }

        records[5].severity = Severity::Critical;
        records.push(record("r6", "1.1.1.1", "9.9.9.9", at_minute(6)));
        let found = detect_temporal_clusters(&records[3..], &CorrelationConfig::default());
        let p = &found[0];
        assert_eq!(p.anomalies.len(), 4);
        assert_eq!(p.severity, Severity::Critical);
    }

    #[test]
    fn five_members_stay_medium() {
        let records: Vec<_> = (0..5)
            .map(|i| record(&format!("r{i}"), "1.1.1.1", "9.9.9.9", at_minute(i)))
            .collect();
        let found = detect_temporal_clusters(&records, &CorrelationConfig::default());
        assert_eq!(found[0].severity, Severity::Medium);
        assert!((found[0].correlation_score - 0.85).abs() < 1e-9);
    }

    #[test]
    fn score_is_capped() {
        let records: Vec<_> = (0..20)
            .map(|i| record(&format!("r{i}"), "1.1.1.1", "9.9.9.9", at_minute(0)))
            .collect();
        let found = detect_temporal_clusters(&records, &CorrelationConfig::default());
        let p = &found[0];
        assert!((p.correlation_score - 0.95).abs() < 1e-9);
    }

    #[test]
    fn pre_epoch_timestamps_bucket_with_floor() {
        let base = clock::from_epoch_ms(-1);
        let records = vec![
            record("a", "1.1.1.1", "9.9.9.9", base),
            record("b", "1.1.1.1", "9.9.9.9", base),
            record("c", "1.1.1.1", "9.9.9.9", base),
        ];
        let found = detect_temporal_clusters(&records, &CorrelationConfig::default());
        let p = &found[0];
        assert_eq!(p.id, "temporal--1");
    }
}
