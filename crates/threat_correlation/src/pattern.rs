//! Correlation patterns: named groups of anomalies sharing a characteristic

use anomaly_models::{AnomalyRecord, AnomalyType, Severity};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    Temporal,
    Spatial,
    Behavioral,
    Volumetric,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temporal => "temporal",
            Self::Spatial => "spatial",
            Self::Behavioral => "behavioral",
            Self::Volumetric => "volumetric",
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A group of anomalies borrowed from the caller's input.
///
/// Exactly one of `time_window_minutes` and `time_span_ms` is set: temporal
/// and volumetric patterns report the configured window in minutes,
/// behavioral and spatial patterns report the observed span of their
/// members in milliseconds.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CorrelationPattern<'a> {
    pub id: String,
    pub name: String,
    pub description: String,
    pub anomalies: Vec<&'a AnomalyRecord>,
    pub confidence: f64,
    pub severity: Severity,
    #[serde(rename = "type")]
    pub pattern_type: PatternType,
    pub time_window_minutes: Option<u32>,
    pub time_span_ms: Option<i64>,
    pub correlation_score: f64,
}

impl<'a> CorrelationPattern<'a> {
    /// Unique source and destination addresses of the members.
    pub fn affected_ips(&self) -> BTreeSet<&'a str> {
        self.anomalies
            .iter()
            .flat_map(|a| [a.source_ip.as_str(), a.destination_ip.as_str()])
            .collect()
    }

    pub fn anomaly_types(&self) -> BTreeSet<AnomalyType> {
        self.anomalies.iter().map(|a| a.anomaly_type).collect()
    }

    pub fn anomaly_ids(&self) -> Vec<&'a str> {
        self.anomalies.iter().map(|a| a.id.as_str()).collect()
    }
}

/// Mean confidence; 0.0 for an empty group.
pub(crate) fn mean_confidence(members: &[&AnomalyRecord]) -> f64 {
    if members.is_empty() {
        return 0.0;
    }
    members.iter().map(|a| a.confidence).sum::<f64>() / members.len() as f64
}

/// Latest minus earliest `timestamp`, in milliseconds.
pub(crate) fn span_ms(members: &[&AnomalyRecord]) -> i64 {
    let mut bounds: Option<(i64, i64)> = None;
    for a in members {
        let t = a.timestamp_ms();
        bounds = Some(match bounds {
            Some((lo, hi)) => (lo.min(t), hi.max(t)),
            None => (t, t),
        });
    }
    bounds.map(|(lo, hi)| hi - lo).unwrap_or(0)
}
