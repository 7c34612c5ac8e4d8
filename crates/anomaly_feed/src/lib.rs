//! Seeded synthetic anomaly feed
//!
//! Stands in for an upstream detection pipeline in demos and tests. Every
//! generator owns its RNG and its ID sequence, so two generators built from
//! the same seed and driven with the same `now` produce identical records.

use anomaly_models::{AnomalyRecord, AnomalyStatus, AnomalyType, Severity};
use chrono::{DateTime, Duration, DurationRound, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SEVERITY_WEIGHTS: [(Severity, u32); 4] = [
    (Severity::Critical, 10),
    (Severity::High, 25),
    (Severity::Medium, 40),
    (Severity::Low, 25),
];

const STATUS_WEIGHTS: [(AnomalyStatus, u32); 4] = [
    (AnomalyStatus::Active, 50),
    (AnomalyStatus::Investigating, 25),
    (AnomalyStatus::Resolved, 15),
    (AnomalyStatus::FalsePositive, 10),
];

const EXTERNAL_PREFIXES: [&str; 5] = ["203.0.113", "198.51.100", "45.33.32", "185.220.101", "91.121.87"];

pub struct AnomalyGenerator {
    rng: StdRng,
    sequence: u64,
}

impl AnomalyGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            sequence: 0,
        }
    }

    /// Number of records issued so far.
    pub fn issued(&self) -> u64 {
        self.sequence
    }

    fn next_id(&mut self) -> String {
        self.sequence += 1;
        format!("anom-{:06}", self.sequence)
    }

    /// One background anomaly that occurred within the 24 hours before `now`.
    pub fn next_record(&mut self, now: DateTime<Utc>) -> AnomalyRecord {
        let anomaly_type = AnomalyType::ALL[self.rng.gen_range(0..AnomalyType::ALL.len())];
        let timestamp = now - Duration::milliseconds(self.rng.gen_range(0..86_400_000));
        let source_ip = self.source_ip();
        let destination_ip = self.internal_ip();
        self.build(anomaly_type, source_ip, destination_ip, timestamp)
    }

    pub fn generate(&mut self, count: usize, now: DateTime<Utc>) -> Vec<AnomalyRecord> {
        let out: Vec<_> = (0..count).map(|_| self.next_record(now)).collect();
        tracing::debug!(count, issued = self.sequence, "generated background anomalies");
        out
    }

    /// `count` anomalies packed into the 10-minute window containing `at`.
    pub fn burst(&mut self, count: usize, at: DateTime<Utc>) -> Vec<AnomalyRecord> {
        let start = at.duration_trunc(Duration::minutes(10)).unwrap_or(at);
        (0..count)
            .map(|i| {
                let offset = Duration::seconds((i as i64 * 30) % 540);
                let anomaly_type = AnomalyType::ALL[self.rng.gen_range(0..AnomalyType::ALL.len())];
                let source_ip = self.source_ip();
                let destination_ip = self.internal_ip();
                self.build(anomaly_type, source_ip, destination_ip, start + offset)
            })
            .collect()
    }

    /// One source hitting `targets` distinct destinations; at least four
    /// records are produced so the fan-out is visible to correlation.
    pub fn coordinated(&mut self, source: &str, targets: usize, now: DateTime<Utc>) -> Vec<AnomalyRecord> {
        let targets = targets.max(1);
        let destinations: Vec<String> = (0..targets).map(|i| format!("10.20.{}.{}", i / 250, i % 250 + 1)).collect();
        (0..targets.max(4))
            .map(|i| {
                let ts = now - Duration::minutes(i as i64 + 1);
                let dst = destinations[i % destinations.len()].clone();
                self.build(AnomalyType::Pattern, source.to_string(), dst, ts)
            })
            .collect()
    }

    /// `count` volume anomalies detected during the 20 minutes before `now`.
    pub fn volumetric_surge(&mut self, count: usize, now: DateTime<Utc>) -> Vec<AnomalyRecord> {
        (0..count)
            .map(|i| {
                let ts = now - Duration::seconds(60 + (i as i64 * 90) % 1140);
                let source_ip = self.source_ip();
                let destination_ip = self.internal_ip();
                self.build(AnomalyType::Volume, source_ip, destination_ip, ts)
            })
            .collect()
    }

    /// `count` anomalies whose sources share the two-segment `prefix`
    /// (e.g. `"45.33"`), spread over the 6 hours before `now`.
    pub fn subnet_sweep(&mut self, prefix: &str, count: usize, now: DateTime<Utc>) -> Vec<AnomalyRecord> {
        (0..count)
            .map(|_| {
                let source_ip = format!(
                    "{}.{}.{}",
                    prefix,
                    self.rng.gen_range(0..=255),
                    self.rng.gen_range(1..=254)
                );
                let destination_ip = self.internal_ip();
                let ts = now - Duration::minutes(self.rng.gen_range(0..360));
                self.build(AnomalyType::Geographic, source_ip, destination_ip, ts)
            })
            .collect()
    }

    fn build(
        &mut self,
        anomaly_type: AnomalyType,
        source_ip: String,
        destination_ip: String,
        timestamp: DateTime<Utc>,
    ) -> AnomalyRecord {
        let id = self.next_id();
        let severity = self.weighted(&SEVERITY_WEIGHTS);
        let status = self.weighted(&STATUS_WEIGHTS);
        let confidence = (self.rng.gen_range(0.5..0.99_f64) * 100.0).round() / 100.0;
        let detected_at = timestamp + Duration::seconds(self.rng.gen_range(0..60));
        let description = describe(anomaly_type, &source_ip, &destination_ip);
        AnomalyRecord {
            id,
            source_ip,
            destination_ip,
            anomaly_type,
            severity,
            confidence,
            timestamp,
            detected_at,
            status,
            description,
        }
    }

    fn weighted<T: Copy>(&mut self, table: &[(T, u32)]) -> T {
        let total: u32 = table.iter().map(|(_, w)| w).sum();
        let mut pick = self.rng.gen_range(0..total);
        for (value, weight) in table {
            if pick < *weight {
                return *value;
            }
            pick -= weight;
        }
        table[table.len() - 1].0
    }

    fn source_ip(&mut self) -> String {
        if self.rng.gen_bool(0.4) {
            self.internal_ip()
        } else {
            let prefix = EXTERNAL_PREFIXES[self.rng.gen_range(0..EXTERNAL_PREFIXES.len())];
            format!("{}.{}", prefix, self.rng.gen_range(1..=254))
        }
    }

    fn internal_ip(&mut self) -> String {
        if self.rng.gen_bool(0.5) {
            format!("192.168.{}.{}", self.rng.gen_range(0..=10), self.rng.gen_range(1..=254))
        } else {
            format!("10.0.{}.{}", self.rng.gen_range(0..=10), self.rng.gen_range(1..=254))
        }
    }
}

fn describe(anomaly_type: AnomalyType, source: &str, destination: &str) -> String {
    match anomaly_type {
        AnomalyType::Volume => format!("Unusual traffic volume from {source} to {destination}"),
        AnomalyType::Pattern => format!("Irregular connection pattern from {source}"),
        AnomalyType::Protocol => format!("Protocol violation between {source} and {destination}"),
        AnomalyType::Geographic => format!("Connection from unexpected region via {source}"),
        AnomalyType::Temporal => format!("Off-hours activity from {source}"),
    }
}
