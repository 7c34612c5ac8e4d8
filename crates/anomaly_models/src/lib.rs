//! Anomaly records shared by the scorer, the correlation engine and the feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}

/// Detection family that raised the anomaly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    Volume,
    Pattern,
    Protocol,
    Geographic,
    Temporal,
}

impl AnomalyType {
    pub const ALL: [AnomalyType; 5] = [
        AnomalyType::Volume,
        AnomalyType::Pattern,
        AnomalyType::Protocol,
        AnomalyType::Geographic,
        AnomalyType::Temporal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Volume => "volume",
            Self::Pattern => "pattern",
            Self::Protocol => "protocol",
            Self::Geographic => "geographic",
            Self::Temporal => "temporal",
        }
    }
}

impl fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for AnomalyType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ModelError::UnknownVariant {
                kind: "anomaly type",
                value: s.to_string(),
            })
    }
}

/// Ordinal severity. Variants are declared low to high so `Ord` ranks
/// `Critical` highest.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ModelError::UnknownVariant {
                kind: "severity",
                value: s.to_string(),
            })
    }
}

/// Triage state of an anomaly. Carried through untouched; no computation
/// depends on it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyStatus {
    Active,
    Investigating,
    Resolved,
    FalsePositive,
}

impl AnomalyStatus {
    pub const ALL: [AnomalyStatus; 4] = [
        AnomalyStatus::Active,
        AnomalyStatus::Investigating,
        AnomalyStatus::Resolved,
        AnomalyStatus::FalsePositive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Investigating => "investigating",
            Self::Resolved => "resolved",
            Self::FalsePositive => "false_positive",
        }
    }
}

impl fmt::Display for AnomalyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for AnomalyStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ModelError::UnknownVariant {
                kind: "anomaly status",
                value: s.to_string(),
            })
    }
}

/// One detected deviation from expected network behavior.
///
/// Addresses are plain strings and are only ever used for prefix and
/// segment comparisons. `confidence` is nominally within `[0, 1]` but is
/// accepted as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnomalyRecord {
    pub id: String,
    #[serde(alias = "sourceIp")]
    pub source_ip: String,
    #[serde(alias = "destinationIp")]
    pub destination_ip: String,
    #[serde(rename = "type")]
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(alias = "detectedAt")]
    pub detected_at: DateTime<Utc>,
    pub status: AnomalyStatus,
    #[serde(default)]
    pub description: String,
}

impl AnomalyRecord {
    pub fn confidence_in_range(&self) -> bool {
        (0.0..=1.0).contains(&self.confidence)
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    pub fn detected_at_ms(&self) -> i64 {
        self.detected_at.timestamp_millis()
    }
}
