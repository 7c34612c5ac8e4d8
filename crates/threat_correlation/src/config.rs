//! Detector thresholds
//!
//! Defaults reproduce the reference detector behaviour. A config can be
//! loaded from JSON (missing keys keep their default) and then overridden
//! from `CORRELATE_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::CorrelationError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Width of the non-overlapping temporal buckets.
    pub temporal_bucket_minutes: u32,
    pub temporal_min_cluster: usize,

    pub coordinated_min_records: usize,
    pub coordinated_min_targets: usize,

    /// Volume-typed records required before the surge check runs at all.
    pub volumetric_min_total: usize,
    pub volumetric_window_minutes: u32,
    pub volumetric_min_recent: usize,

    pub geographic_min_cluster: usize,

    pub matrix_min_pair: usize,
    /// Matrix entries kept after ranking.
    pub matrix_limit: usize,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            temporal_bucket_minutes: 10,
            temporal_min_cluster: 3,
            coordinated_min_records: 4,
            coordinated_min_targets: 3,
            volumetric_min_total: 5,
            volumetric_window_minutes: 30,
            volumetric_min_recent: 3,
            geographic_min_cluster: 6,
            matrix_min_pair: 2,
            matrix_limit: 20,
        }
    }
}

impl CorrelationConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, CorrelationError> {
        serde_json::from_str(raw).map_err(|e| CorrelationError::ParseError(e.to_string()))
    }

    /// Read a JSON config file. The result is not validated here so that
    /// environment overrides can still correct it; `apply_overrides` and
    /// `CorrelationEngine::new` both validate.
    pub fn load(path: &Path) -> Result<Self, CorrelationError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CorrelationError::IoError(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&raw)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, CorrelationError> {
        let mut config = Self::default();
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Override fields from `lookup`, which maps a variable name such as
    /// `CORRELATE_MATRIX_LIMIT` to its value.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), CorrelationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        override_field(&lookup, "CORRELATE_TEMPORAL_BUCKET_MINUTES", &mut self.temporal_bucket_minutes)?;
        override_field(&lookup, "CORRELATE_TEMPORAL_MIN_CLUSTER", &mut self.temporal_min_cluster)?;
        override_field(&lookup, "CORRELATE_COORDINATED_MIN_RECORDS", &mut self.coordinated_min_records)?;
        override_field(&lookup, "CORRELATE_COORDINATED_MIN_TARGETS", &mut self.coordinated_min_targets)?;
        override_field(&lookup, "CORRELATE_VOLUMETRIC_MIN_TOTAL", &mut self.volumetric_min_total)?;
        override_field(&lookup, "CORRELATE_VOLUMETRIC_WINDOW_MINUTES", &mut self.volumetric_window_minutes)?;
        override_field(&lookup, "CORRELATE_VOLUMETRIC_MIN_RECENT", &mut self.volumetric_min_recent)?;
        override_field(&lookup, "CORRELATE_GEOGRAPHIC_MIN_CLUSTER", &mut self.geographic_min_cluster)?;
        override_field(&lookup, "CORRELATE_MATRIX_MIN_PAIR", &mut self.matrix_min_pair)?;
        override_field(&lookup, "CORRELATE_MATRIX_LIMIT", &mut self.matrix_limit)?;
        self.validate()
    }

    pub fn validate(&self) -> Result<(), CorrelationError> {
        if self.temporal_bucket_minutes == 0 {
            return Err(CorrelationError::InvalidConfig(
                "temporal_bucket_minutes must be positive".to_string(),
            ));
        }
        if self.volumetric_window_minutes == 0 {
            return Err(CorrelationError::InvalidConfig(
                "volumetric_window_minutes must be positive".to_string(),
            ));
        }
        if self.matrix_limit == 0 {
            return Err(CorrelationError::InvalidConfig(
                "matrix_limit must be positive".to_string(),
            ));
        }
        let minimums = [
            ("temporal_min_cluster", self.temporal_min_cluster),
            ("coordinated_min_records", self.coordinated_min_records),
            ("coordinated_min_targets", self.coordinated_min_targets),
            ("volumetric_min_total", self.volumetric_min_total),
            ("volumetric_min_recent", self.volumetric_min_recent),
            ("geographic_min_cluster", self.geographic_min_cluster),
            ("matrix_min_pair", self.matrix_min_pair),
        ];
        if let Some((name, _)) = minimums.iter().find(|(_, v)| *v == 0) {
            return Err(CorrelationError::InvalidConfig(format!(
                "{name} must be at least 1"
            )));
        }
        Ok(())
    }
}

fn override_field<T, F>(lookup: &F, name: &str, field: &mut T) -> Result<(), CorrelationError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *field = raw
            .trim()
            .parse()
            .map_err(|_| CorrelationError::InvalidConfig(format!("{name}={raw} is not a valid number")))?;
        tracing::debug!(variable = name, value = %raw, "correlation config override");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let c = CorrelationConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.temporal_bucket_minutes, 10);
        assert_eq!(c.matrix_limit, 20);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let c = CorrelationConfig::from_json_str(r#"{"matrix_limit": 5}"#).expect("parse");
        assert_eq!(c.matrix_limit, 5);
        assert_eq!(c.geographic_min_cluster, 6);
    }

    #[test]
    fn overrides_apply_and_validate() {
        let vars: HashMap<&str, &str> = [
            ("CORRELATE_MATRIX_LIMIT", "7"),
            ("CORRELATE_TEMPORAL_MIN_CLUSTER", " 4 "),
        ]
        .into_iter()
        .collect();
        let mut c = CorrelationConfig::default();
        c.apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .expect("overrides");
        assert_eq!(c.matrix_limit, 7);
        assert_eq!(c.temporal_min_cluster, 4);
        assert_eq!(c.coordinated_min_records, 4);
    }

    #[test]
    fn bad_override_is_rejected() {
        let mut c = CorrelationConfig::default();
        let err = c
            .apply_overrides(|k| (k == "CORRELATE_MATRIX_LIMIT").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, CorrelationError::InvalidConfig(_)));

        let mut c = CorrelationConfig::default();
        let err = c
            .apply_overrides(|k| (k == "CORRELATE_TEMPORAL_BUCKET_MINUTES").then(|| "0".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("temporal_bucket_minutes"));
    }

    #[test]
    fn zero_minimums_are_rejected() {
        for field in [
            "temporal_min_cluster",
            "coordinated_min_records",
            "coordinated_min_targets",
            "volumetric_min_total",
            "volumetric_min_recent",
            "geographic_min_cluster",
            "matrix_min_pair",
        ] {
            let c = CorrelationConfig::from_json_str(&format!(r#"{{"{field}": 0}}"#)).expect("parse");
            let err = c.validate().unwrap_err();
            assert!(matches!(err, CorrelationError::InvalidConfig(_)));
            assert!(err.to_string().contains(field), "{err}");
        }

        let mut c = CorrelationConfig::default();
        let err = c
            .apply_overrides(|k| (k == "CORRELATE_VOLUMETRIC_MIN_RECENT").then(|| "0".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("volumetric_min_recent"));
    }

    #[test]
    fn load_reads_file_and_overrides_can_repair_it() {
        let mut f = tempfile::NamedTempFile::new().expect("tempfile");
        write!(f, r#"{{"geographic_min_cluster": 2}}"#).expect("write");
        let c = CorrelationConfig::load(f.path()).expect("load");
        assert_eq!(c.geographic_min_cluster, 2);

        let mut bad = tempfile::NamedTempFile::new().expect("tempfile");
        write!(bad, r#"{{"matrix_limit": 0}}"#).expect("write");
        let mut c = CorrelationConfig::load(bad.path()).expect("load defers validation");
        assert!(c.validate().is_err());
        c.apply_overrides(|k| (k == "CORRELATE_MATRIX_LIMIT").then(|| "5".to_string()))
            .expect("override repairs limit");
        assert_eq!(c.matrix_limit, 5);

        let mut unrepaired = CorrelationConfig::load(bad.path()).expect("load");
        assert!(unrepaired.apply_overrides(|_| None).is_err());

        let garbled = tempfile::NamedTempFile::new().expect("tempfile");
        std::fs::write(garbled.path(), "{ not json").expect("write");
        assert!(matches!(
            CorrelationConfig::load(garbled.path()),
            Err(CorrelationError::ParseError(_))
        ));

        let missing = CorrelationConfig::load(Path::new("/nonexistent/correlate.json"));
        assert!(matches!(missing, Err(CorrelationError::IoError(_))));
    }
}
