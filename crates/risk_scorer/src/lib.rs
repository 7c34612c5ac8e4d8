//! Context-aware risk scoring for individual anomalies
//!
//! A score is built in three layers:
//! - severity sets the base score
//! - confidence scales it into `[0.8, 1.2]`
//! - four contextual factors (volume, recency, source locality, behavior)
//!   multiply on top
//!
//! The result is capped at 100 and bucketed into a risk level. Scoring is a
//! pure function of the record and the caller-supplied `now`.

use anomaly_models::{AnomalyRecord, AnomalyType, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod summary;

pub use summary::RiskSummary;

/// Factors strictly above this value are named in the explanation.
const NOTABLE_FACTOR: f64 = 1.1;
const HIGH_CONFIDENCE: f64 = 0.8;
const STANDARD_EXPLANATION: &str = "Standard risk assessment based on severity and confidence";

/// Decides whether a source address is inside the monitored network.
pub trait AddressLocality {
    fn is_internal(&self, address: &str) -> bool;
}

/// Prefix heuristic: `192.168.` and `10.` are internal, everything else is
/// external. No geolocation is involved.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrivatePrefixLocality;

impl AddressLocality for PrivatePrefixLocality {
    fn is_internal(&self, address: &str) -> bool {
        address.starts_with("192.168.") || address.starts_with("10.")
    }
}

/// The four contextual multipliers applied on top of the confidence-scaled base.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ContextualFactors {
    pub volume_impact: f64,
    pub temporal_urgency: f64,
    pub geographic_risk: f64,
    pub behavioral_deviation: f64,
}

impl ContextualFactors {
    pub fn combined(&self) -> f64 {
        self.volume_impact * self.temporal_urgency * self.geographic_risk * self.behavioral_deviation
    }

    fn notable(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.volume_impact > NOTABLE_FACTOR {
            out.push("high volume impact");
        }
        if self.temporal_urgency > NOTABLE_FACTOR {
            out.push("recent activity");
        }
        if self.geographic_risk > NOTABLE_FACTOR {
            out.push("external source");
        }
        if self.behavioral_deviation > NOTABLE_FACTOR {
            out.push("behavioral deviation");
        }
        out
    }
}

/// Scored view of one anomaly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskScore {
    pub base_score: f64,
    pub confidence_multiplier: f64,
    pub contextual_factors: ContextualFactors,
    pub final_score: f64, // 0.0 - 100.0
    pub risk_level: Severity,
    pub explanation: String,
}

impl RiskScore {
    pub fn combined_multiplier(&self) -> f64 {
        self.contextual_factors.combined()
    }
}

/// Base score for a severity level.
pub fn base_score(severity: Severity) -> f64 {
    match severity {
        Severity::Critical => 90.0,
        Severity::High => 70.0,
        Severity::Medium => 50.0,
        Severity::Low => 30.0,
    }
}

/// Map a final score onto a risk level.
pub fn risk_level(final_score: f64) -> Severity {
    if final_score >= 85.0 {
        Severity::Critical
    } else if final_score >= 65.0 {
        Severity::High
    } else if final_score >= 40.0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Risk scorer with a pluggable locality test.
#[derive(Debug, Clone, Default)]
pub struct RiskScorer<L = PrivatePrefixLocality> {
    locality: L,
}

impl RiskScorer<PrivatePrefixLocality> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<L: AddressLocality> RiskScorer<L> {
    pub fn with_locality(locality: L) -> Self {
        Self { locality }
    }

    pub fn score(&self, record: &AnomalyRecord, now: DateTime<Utc>) -> RiskScore {
        let base = base_score(record.severity);
        // Out-of-range confidence is used as-is.
        let confidence_multiplier = 0.8 + record.confidence * 0.4;
        let factors = self.contextual_factors(record, now);

        let raw = base * confidence_multiplier * factors.combined();
        // f64::max maps NaN to the floor
        let final_score = raw.max(0.0).min(100.0);
        let level = risk_level(final_score);

        let mut reasons = factors.notable();
        if record.confidence > HIGH_CONFIDENCE {
            reasons.push("high confidence");
        }
        let explanation = if reasons.is_empty() {
            STANDARD_EXPLANATION.to_string()
        } else {
            format!("Risk elevated by: {}", reasons.join(", "))
        };

        tracing::trace!(
            anomaly_id = %record.id,
            final_score,
            risk_level = %level,
            "scored anomaly"
        );

        RiskScore {
            base_score: base,
            confidence_multiplier,
            contextual_factors: factors,
            final_score,
            risk_level: level,
            explanation,
        }
    }

    pub fn score_all(&self, records: &[AnomalyRecord], now: DateTime<Utc>) -> Vec<RiskScore> {
        records.iter().map(|r| self.score(r, now)).collect()
    }

    fn contextual_factors(&self, record: &AnomalyRecord, now: DateTime<Utc>) -> ContextualFactors {
        let volume_impact = match record.anomaly_type {
            AnomalyType::Volume => 1.3,
            AnomalyType::Pattern => 1.1,
            _ => 1.0,
        };

        // Floors at 0.8 after ~9.6h; future-dated records push it above 1.2.
        let age_days =
            clock::elapsed_ms(&record.detected_at, &now) as f64 / clock::MS_PER_DAY as f64;
        let temporal_urgency = (1.2 - age_days).max(0.8);

        let geographic_risk = if self.locality.is_internal(&record.source_ip) {
            0.9
        } else {
            1.2
        };

        let behavioral_deviation = match record.anomaly_type {
            AnomalyType::Pattern => 1.2,
            AnomalyType::Geographic => 1.1,
            _ => 1.0,
        };

        ContextualFactors {
            volume_impact,
            temporal_urgency,
            geographic_risk,
            behavioral_deviation,
        }
    }
}

/// Score one anomaly with the default prefix locality.
pub fn score_anomaly(record: &AnomalyRecord, now: DateTime<Utc>) -> RiskScore {
    RiskScorer::new().score(record, now)
}

/// Score every record in input order.
pub fn score_all(records: &[AnomalyRecord], now: DateTime<Utc>) -> Vec<RiskScore> {
    RiskScorer::new().score_all(records, now)
}

#[cfg(test)]
pub(crate) mod test_support {
    use anomaly_models::{AnomalyRecord, AnomalyStatus, AnomalyType, Severity};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 18, 12, 0, 0).unwrap()
    }

    pub fn record(
        severity: Severity,
        confidence: f64,
        anomaly_type: AnomalyType,
        source_ip: &str,
        age: Duration,
    ) -> AnomalyRecord {
        let detected_at = now() - age;
        AnomalyRecord {
            id: "a-1".into(),
            source_ip: source_ip.into(),
            destination_ip: "172.16.0.1".into(),
            anomaly_type,
            severity,
            confidence,
            timestamp: detected_at,
            detected_at,
            status: AnomalyStatus::Active,
            description: String::new(),
        }
    }
}
