//! Multi-target correlation: one source fanning out across many destinations

use anomaly_models::{AnomalyRecord, Severity};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::CorrelationConfig;
use crate::pattern::{mean_confidence, span_ms, CorrelationPattern, PatternType};

pub fn detect_coordinated_attacks<'a>(
    records: &'a [AnomalyRecord],
    config: &CorrelationConfig,
) -> Vec<CorrelationPattern<'a>> {
    let mut by_source: BTreeMap<&'a str, Vec<&'a AnomalyRecord>> = BTreeMap::new();
    for r in records {
        by_source.entry(r.source_ip.as_str()).or_default().push(r);
    }
    tracing::debug!(sources = by_source.len(), "coordinated sources");

    let mut out = Vec::new();
    for (source, members) in by_source {
        if members.len() < config.coordinated_min_records {
            continue;
        }
        let targets: BTreeSet<&str> = members.iter().map(|a| a.destination_ip.as_str()).collect();
        let target_count = targets.len();
        if target_count < config.coordinated_min_targets {
            continue;
        }

        let severity = if target_count > 5 {
            Severity::Critical
        } else {
            Severity::High
        };
        out.push(CorrelationPattern {
            id: format!("coordinated-{source}"),
            name: "Coordinated Attack".to_string(),
            description: format!(
                "{} anomalies from {} against {} distinct targets",
                members.len(),
                source,
                target_count
            ),
            confidence: mean_confidence(&members),
            severity,
            pattern_type: PatternType::Behavioral,
            time_window_minutes: None,
            time_span_ms: Some(span_ms(&members)),
            correlation_score: (0.5 + 0.05 * target_count as f64).min(0.9),
            anomalies: members,
        });
    }
    out
}
