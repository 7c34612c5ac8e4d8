//! Aggregate view over a batch of risk scores

use anomaly_models::Severity;
use serde::{Deserialize, Serialize};

use crate::RiskScore;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RiskSummary {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub mean_score: f64,
    pub max_score: f64,
    /// Percentage (0-100) of scores at high or critical level.
    pub elevated_pct: f64,
}

impl RiskSummary {
    pub fn from_scores(scores: &[RiskScore]) -> Self {
        let mut summary = RiskSummary {
            total: scores.len(),
            ..Default::default()
        };
        if scores.is_empty() {
            return summary;
        }

        let mut sum = 0.0;
        for s in scores {
            match s.risk_level {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
            }
            sum += s.final_score;
            summary.max_score = summary.max_score.max(s.final_score);
        }

        let total = scores.len() as f64;
        summary.mean_score = sum / total;
        summary.elevated_pct = (summary.critical + summary.high) as f64 / total * 100.0;
        summary
    }

    pub fn count(&self, level: Severity) -> usize {
        match level {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }
}
