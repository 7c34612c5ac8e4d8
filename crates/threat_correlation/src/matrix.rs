//! IP-pair correlation matrix

use anomaly_models::AnomalyRecord;
use clock::MS_PER_DAY;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::CorrelationConfig;
use crate::pattern::span_ms;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorrelationMatrixEntry {
    pub source_ip: String,
    pub target_ip: String,
    pub shared_anomalies: usize,
    /// 1.0 when every record in the pair shares an instant, falling linearly
    /// to 0.0 at a 24h spread.
    pub time_proximity: f64,
    /// Not clamped; can go negative for very mixed pairs.
    pub pattern_similarity: f64,
    pub correlation_strength: f64, // 0.0 - 1.0
}

/// Rank ordered `(source, destination)` pairs seen in at least
/// `matrix_min_pair` records, strongest first, keeping `matrix_limit`.
pub fn build_matrix(records: &[AnomalyRecord], config: &CorrelationConfig) -> Vec<CorrelationMatrixEntry> {
    let mut pairs: BTreeMap<(&str, &str), Vec<&AnomalyRecord>> = BTreeMap::new();
    for r in records {
        pairs
            .entry((r.source_ip.as_str(), r.destination_ip.as_str()))
            .or_default()
            .push(r);
    }

    let mut entries: Vec<CorrelationMatrixEntry> = pairs
        .into_iter()
        .filter(|(_, members)| members.len() >= config.matrix_min_pair)
        .map(|((source, target), members)| pair_entry(source, target, &members))
        .collect();
    tracing::debug!(pairs = entries.len(), "matrix pairs");

    entries.sort_by(|a, b| b.correlation_strength.total_cmp(&a.correlation_strength));
    entries.truncate(config.matrix_limit);
    entries
}

fn pair_entry(source: &str, target: &str, members: &[&AnomalyRecord]) -> CorrelationMatrixEntry {
    let size = members.len();
    let time_proximity = (1.0 - span_ms(members) as f64 / MS_PER_DAY as f64).max(0.0);

    let types: BTreeSet<_> = members.iter().map(|a| a.anomaly_type).collect();
    let severities: BTreeSet<_> = members.iter().map(|a| a.severity).collect();
    let pattern_similarity = 1.0
        - (types.len() as f64 - 1.0) * 0.2
        - (severities.len() as f64 - 1.0) * 0.1;

    let correlation_strength =
        ((size as f64 / 10.0) * 0.4 + time_proximity * 0.3 + pattern_similarity * 0.3).clamp(0.0, 1.0);

    CorrelationMatrixEntry {
        source_ip: source.to_string(),
        target_ip: target.to_string(),
        shared_anomalies: size,
        time_proximity,
        pattern_similarity,
        correlation_strength,
    }
}
