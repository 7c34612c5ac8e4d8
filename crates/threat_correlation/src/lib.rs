//! Anomaly correlation engine
//!
//! Groups anomaly records into named patterns and ranks IP pairs by how
//! closely they co-occur:
//! - temporal clustering (bursts inside a fixed window)
//! - coordinated attacks (one source, many targets)
//! - volumetric surges (recent volume anomalies)
//! - geographic clustering (shared source region)
//! - IP-pair correlation matrix
//!
//! Every detector only reads its input. Grouping goes through ordered maps,
//! so the same records and `now` always produce the same report.

use anomaly_models::AnomalyRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

pub mod config;
pub mod coordinated;
pub mod geographic;
pub mod matrix;
pub mod pattern;
pub mod temporal;
pub mod volume;

pub use config::CorrelationConfig;
pub use coordinated::detect_coordinated_attacks;
pub use geographic::{detect_geographic_clusters, GroupingKey, SubnetGrouping};
pub use matrix::{build_matrix, CorrelationMatrixEntry};
pub use pattern::{CorrelationPattern, PatternType};
pub use temporal::detect_temporal_clusters;
pub use volume::detect_volumetric_surge;

#[derive(Error, Debug)]
pub enum CorrelationError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Output of one correlation run.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CorrelationReport<'a> {
    pub patterns: Vec<CorrelationPattern<'a>>,
    pub matrix: Vec<CorrelationMatrixEntry>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CorrelationSummary {
    pub pattern_count: usize,
    pub temporal: usize,
    pub spatial: usize,
    pub behavioral: usize,
    pub volumetric: usize,
    /// Distinct record ids appearing in at least one pattern.
    pub records_in_patterns: usize,
    pub matrix_pairs: usize,
    pub strongest_pair: Option<(String, String, f64)>,
}

impl CorrelationReport<'_> {
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty() && self.matrix.is_empty()
    }

    pub fn summary(&self) -> CorrelationSummary {
        let mut summary = CorrelationSummary {
            pattern_count: self.patterns.len(),
            matrix_pairs: self.matrix.len(),
            ..Default::default()
        };
        let mut covered: BTreeSet<&str> = BTreeSet::new();
        for p in &self.patterns {
            match p.pattern_type {
                PatternType::Temporal => summary.temporal += 1,
                PatternType::Spatial => summary.spatial += 1,
                PatternType::Behavioral => summary.behavioral += 1,
                PatternType::Volumetric => summary.volumetric += 1,
            }
            covered.extend(p.anomaly_ids());
        }
        summary.records_in_patterns = covered.len();
        // matrix is already ranked
        summary.strongest_pair = self
            .matrix
            .first()
            .map(|e| (e.source_ip.clone(), e.target_ip.clone(), e.correlation_strength));
        summary
    }
}

pub struct CorrelationEngine {
    config: CorrelationConfig,
    grouping: Box<dyn GroupingKey + Send + Sync>,
}

impl fmt::Debug for CorrelationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for CorrelationEngine {
    fn default() -> Self {
        Self {
            config: CorrelationConfig::default(),
            grouping: Box::new(SubnetGrouping),
        }
    }
}

impl CorrelationEngine {
    pub fn new(config: CorrelationConfig) -> Result<Self, CorrelationError> {
        config.validate()?;
        Ok(Self {
            config,
            grouping: Box::new(SubnetGrouping),
        })
    }

    /// Replace the key used by the geographic detector.
    pub fn with_grouping<G>(mut self, grouping: G) -> Self
    where
        G: GroupingKey + Send + Sync + 'static,
    {
        self.grouping = Box::new(grouping);
        self
    }

    pub fn config(&self) -> &CorrelationConfig {
        &self.config
    }

    /// Run the four pattern detectors and rank their output by
    /// `correlation_score`, highest first. Ties keep detector order.
    pub fn detect_patterns<'a>(
        &self,
        records: &'a [AnomalyRecord],
        now: DateTime<Utc>,
    ) -> Vec<CorrelationPattern<'a>> {
        let mut patterns = detect_temporal_clusters(records, &self.config);
        patterns.extend(detect_coordinated_attacks(records, &self.config));
        patterns.extend(detect_volumetric_surge(records, now, &self.config));
        patterns.extend(detect_geographic_clusters(
            records,
            self.grouping.as_ref(),
            &self.config,
        ));
        patterns.sort_by(|a, b| b.correlation_score.total_cmp(&a.correlation_score));
        patterns
    }

    pub fn build_matrix(&self, records: &[AnomalyRecord]) -> Vec<CorrelationMatrixEntry> {
        build_matrix(records, &self.config)
    }

    pub fn correlate<'a>(
        &self,
        records: &'a [AnomalyRecord],
        now: DateTime<Utc>,
    ) -> CorrelationReport<'a> {
        let report = CorrelationReport {
            patterns: self.detect_patterns(records, now),
            matrix: self.build_matrix(records),
        };
        tracing::info!(
            records = records.len(),
            patterns = report.patterns.len(),
            matrix_pairs = report.matrix.len(),
            "correlation complete"
        );
        report
    }
}

/// Correlate with default thresholds and subnet grouping.
pub fn correlate(records: &[AnomalyRecord], now: DateTime<Utc>) -> CorrelationReport<'_> {
    CorrelationEngine::default().correlate(records, now)
}

#[cfg(test)]
pub(crate) mod test_support {
    use anomaly_models::{AnomalyRecord, AnomalyStatus, AnomalyType, Severity};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    /// 2025-12-18T12:00:00Z plus `minutes`; aligned to 10-minute windows.
    pub fn at_minute(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 18, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    pub fn record(id: &str, source: &str, destination: &str, ts: DateTime<Utc>) -> AnomalyRecord {
        AnomalyRecord {
            id: id.to_string(),
            source_ip: source.to_string(),
            destination_ip: destination.to_string(),
            anomaly_type: AnomalyType::Protocol,
            severity: Severity::Medium,
            confidence: 0.8,
            timestamp: ts,
            detected_at: ts,
            status: AnomalyStatus::Active,
            description: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{at_minute, record};
    use super::*;

    #[test]
    fn empty_input_yields_empty_report() {
        let report = correlate(&[], at_minute(0));
        assert!(report.patterns.is_empty());
        assert!(report.matrix.is_empty());
        assert!(report.is_empty());
        assert_eq!(report.summary(), CorrelationSummary::default());
    }

    #[test]
    fn patterns_are_ranked_by_score() {
        // 4 records from one source to 3 targets in one window:
        // temporal 0.8, coordinated 0.65
        let records = vec![
            record("a", "1.2.3.4", "10.0.0.1", at_minute(0)),
            record("b", "1.2.3.4", "10.0.0.2", at_minute(1)),
            record("c", "1.2.3.4", "10.0.0.3", at_minute(2)),
            record("d", "1.2.3.4", "10.0.0.3", at_minute(3)),
        ];
        let report = correlate(&records, at_minute(5));
        let kinds: Vec<_> = report.patterns.iter().map(|p| p.pattern_type).collect();
        assert_eq!(kinds, vec![PatternType::Temporal, PatternType::Behavioral]);
        assert!(report
            .patterns
            .windows(2)
            .all(|w| w[0].correlation_score >= w[1].correlation_score));

        let summary = report.summary();
        assert_eq!(summary.pattern_count, 2);
        assert_eq!(summary.temporal, 1);
        assert_eq!(summary.behavioral, 1);
        assert_eq!(summary.records_in_patterns, 4);
        assert_eq!(summary.matrix_pairs, 1);
        let (src, dst, _) = summary.strongest_pair.expect("pair");
        assert_eq!((src.as_str(), dst.as_str()), ("1.2.3.4", "10.0.0.3"));
    }

    #[test]
    fn engine_rejects_invalid_config() {
        let config = CorrelationConfig {
            matrix_limit: 0,
            ..Default::default()
        };
        assert!(matches!(
            CorrelationEngine::new(config),
            Err(CorrelationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn engine_uses_configured_thresholds() {
        let config = CorrelationConfig {
            temporal_min_cluster: 2,
            matrix_limit: 1,
            ..Default::default()
        };
        let engine = CorrelationEngine::new(config).expect("engine");
        let records = vec![
            record("a", "1.1.1.1", "2.2.2.2", at_minute(0)),
            record("b", "1.1.1.1", "2.2.2.2", at_minute(1)),
            record("c", "3.3.3.3", "4.4.4.4", at_minute(30)),
            record("d", "3.3.3.3", "4.4.4.4", at_minute(31)),
        ];
        let report = engine.correlate(&records, at_minute(40));
        assert_eq!(report.patterns.len(), 2);
        assert_eq!(report.matrix.len(), 1);
        assert_eq!(engine.config().matrix_limit, 1);
    }

    #[test]
    fn engine_refuses_zero_volume_minimums() {
        let config = CorrelationConfig::from_json_str(
            r#"{"volumetric_min_total": 0, "volumetric_min_recent": 0}"#,
        )
        .expect("parse");
        assert!(matches!(
            CorrelationEngine::new(config),
            Err(CorrelationError::InvalidConfig(_))
        ));
        assert!(correlate(&[], at_minute(0)).is_empty());
    }

    #[test]
    fn grouping_can_be_swapped() {
        let records: Vec<_> = (0..6)
            .map(|i| record(&format!("r{i}"), &format!("{i}.9.9.9"), "10.0.0.1", at_minute(i * 15)))
            .collect();
        assert!(correlate(&records, at_minute(100)).patterns.is_empty());

        let engine = CorrelationEngine::default().with_grouping(|_: &AnomalyRecord| "all".to_string());
        let report = engine.correlate(&records, at_minute(100));
        assert_eq!(report.patterns.len(), 1);
        assert_eq!(report.patterns[0].pattern_type, PatternType::Spatial);
    }
}
