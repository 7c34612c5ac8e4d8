//! Spatial clustering of anomaly sources
//!
//! Sources are grouped by a [`GroupingKey`]. The default key is the first two
//! dot-separated segments of the source address, a coarse /16 stand-in for
//! geolocation; a real geo-IP lookup can be plugged in without changing the
//! detector.

use anomaly_models::{AnomalyRecord, Severity};
use std::collections::BTreeMap;

use crate::config::CorrelationConfig;
use crate::pattern::{mean_confidence, span_ms, CorrelationPattern, PatternType};

/// Maps a record to the region it is attributed to.
pub trait GroupingKey {
    fn key(&self, record: &AnomalyRecord) -> String;
}

impl<F> GroupingKey for F
where
    F: Fn(&AnomalyRecord) -> String,
{
    fn key(&self, record: &AnomalyRecord) -> String {
        self(record)
    }
}

/// First two dot-separated segments of `source_ip`. Addresses with fewer
/// than two segments group under the whole string.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubnetGrouping;

impl GroupingKey for SubnetGrouping {
    fn key(&self, record: &AnomalyRecord) -> String {
        subnet_prefix(&record.source_ip)
    }
}

pub fn subnet_prefix(address: &str) -> String {
    let mut parts = address.splitn(3, '.');
    match (parts.next(), parts.next()) {
        (Some(a), Some(b)) => format!("{a}.{b}"),
        _ => address.to_string(),
    }
}

pub fn detect_geographic_clusters<'a>(
    records: &'a [AnomalyRecord],
    grouping: &dyn GroupingKey,
    config: &CorrelationConfig,
) -> Vec<CorrelationPattern<'a>> {
    let mut groups: BTreeMap<String, Vec<&'a AnomalyRecord>> = BTreeMap::new();
    for r in records {
        groups.entry(grouping.key(r)).or_default().push(r);
    }
    tracing::debug!(groups = groups.len(), "geographic groups");

    groups
        .into_iter()
        .filter(|(_, members)| members.len() >= config.geographic_min_cluster)
        .map(|(key, members)| {
            let size = members.len();
            let severity = if size > 10 {
                Severity::High
            } else {
                Severity::Medium
            };
            CorrelationPattern {
                id: format!("geographic-{key}"),
                name: "Geographic Cluster".to_string(),
                description: format!("{size} anomalies originating from {key}"),
                confidence: mean_confidence(&members),
                severity,
                pattern_type: PatternType::Spatial,
                time_window_minutes: None,
                time_span_ms: Some(span_ms(&members)),
                correlation_score: (0.3 + 0.03 * size as f64).min(0.8),
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
    fn subnet_prefix_handles_malformed_addresses() {
        assert_eq!(subnet_prefix("192.168.1.20"), "192.168");
        assert_eq!(subnet_prefix("10.4"), "10.4");
        assert_eq!(subnet_prefix("localhost"), "localhost");
        assert_eq!(subnet_prefix(""), "");
        assert_eq!(subnet_prefix("fe80::1"), "fe80::1");
    }

    #[test]
    fn six_from_one_subnet_is_a_cluster() {
        let records: Vec<_> = (0..6)
            .map(|i| record(&format!("r{i}"), &format!("45.33.{i}.1"), "10.0.0.1", at_minute(i * 2)))
            .collect();
        let patterns = detect_geographic_clusters(&records, &SubnetGrouping, &CorrelationConfig::default());
        assert_eq!(patterns.len(), 1);
        let p = &patterns[0];
        assert_eq!(p.id, "geographic-45.33");
        assert_eq!(p.pattern_type, PatternType::Spatial);
        assert_eq!(p.severity, Severity::Medium);
        assert_eq!(p.time_span_ms, Some(10 * 60_000));
        assert!((p.correlation_score - 0.48).abs() < 1e-9);
    }

    #[test]
    fn large_cluster_is_high_and_capped() {
        let records: Vec<_> = (0..20)
            .map(|i| record(&format!("r{i}"), "45.33.1.1", "10.0.0.1", at_minute(0)))
            .collect();
        let found = detect_geographic_clusters(&records, &SubnetGrouping, &CorrelationConfig::default());
        let p = &found[0];
        assert_eq!(p.severity, Severity::High);
        assert!((p.correlation_score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn closure_key_replaces_subnet_grouping() {
        let records: Vec<_> = (0..6)
            .map(|i| record(&format!("r{i}"), &format!("{i}.{i}.0.1"), "10.0.0.1", at_minute(0)))
            .collect();
        assert!(detect_geographic_clusters(&records, &SubnetGrouping, &CorrelationConfig::default()).is_empty());

        let everywhere = |_: &AnomalyRecord| "earth".to_string();
        let patterns = detect_geographic_clusters(&records, &everywhere, &CorrelationConfig::default());
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].id, "geographic-earth");
    }
}
