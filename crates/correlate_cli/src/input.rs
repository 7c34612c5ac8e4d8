//! Loading anomaly records and resolving `now` for CLI commands.

use std::io::Read;
use std::path::Path;

use anomaly_models::AnomalyRecord;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clock::{Clock, FixedClock, SystemClock};

/// Read records from `path` (`-` for stdin). Accepts a JSON array or JSON
/// Lines; blank lines are skipped.
pub fn load_records(path: &Path) -> Result<Vec<AnomalyRecord>> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read records from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?
    };
    let records = parse_records(&raw)?;
    tracing::debug!(count = records.len(), path = %path.display(), "loaded anomaly records");
    Ok(records)
}

pub fn parse_records(raw: &str) -> Result<Vec<AnomalyRecord>> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("decode JSON array of anomaly records");
    }

    let mut out = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: AnomalyRecord =
            serde_json::from_str(line).with_context(|| format!("decode record on line {}", idx + 1))?;
        out.push(record);
    }
    Ok(out)
}

/// Explicit RFC 3339 instant, or the system clock when absent.
pub fn resolve_now(now: Option<&str>) -> Result<DateTime<Utc>> {
    match now {
        Some(raw) => {
            let at = DateTime::parse_from_rfc3339(raw)
                .with_context(|| format!("invalid --now value {raw:?}"))?
                .with_timezone(&Utc);
            Ok(FixedClock::new(at).now())
        }
        None => Ok(SystemClock.now()),
    }
}
