use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anomaly_feed::AnomalyGenerator;
use anomaly_models::{AnomalyRecord, Severity};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use observability::CorrelationRecorder;
use risk_scorer::{RiskScore, RiskScorer, RiskSummary};
use threat_correlation::{CorrelationConfig, CorrelationEngine, CorrelationReport};
use tracing_subscriber::EnvFilter;

mod input;

#[derive(Parser)]
#[command(name = "correlate", about = "Anomaly risk scoring and correlation", version)]
struct Cli {
    /// Output JSON instead of human text
    #[arg(long, global = true)]
    json: bool,

    /// Print Prometheus metrics after the command
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every anomaly in a feed.
    Score {
        /// JSON array or JSON Lines file of anomaly records (`-` for stdin).
        #[arg(long)]
        input: PathBuf,
        /// Reference instant (RFC 3339). Defaults to the system clock.
        #[arg(long)]
        now: Option<String>,
    },

    /// Group anomalies into correlation patterns and rank IP pairs.
    Correlate {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        now: Option<String>,
        /// JSON file with detector thresholds. CORRELATE_* variables override it.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Risk distribution plus correlation summary.
    Summary {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        now: Option<String>,
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Emit a synthetic anomaly feed.
    Generate {
        #[arg(long, default_value_t = 1)]
        seed: u64,
        #[arg(long, default_value_t = 50)]
        count: usize,
        #[arg(long)]
        now: Option<String>,
        /// Mix in one burst, one coordinated source, one volume surge and one subnet sweep.
        #[arg(long)]
        scenarios: bool,
        /// Write JSON Lines here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    if cli.metrics {
        if let Err(e) = observability::init_metrics() {
            eprintln!("error: metrics init failed: {}", e);
            return ExitCode::from(1);
        }
    }

    let recorder = CorrelationRecorder::new();
    let result = match cli.command {
        Commands::Score { input, now } => cmd_score(cli.json, &recorder, &input, now.as_deref()),
        Commands::Correlate { input, now, config } => {
            cmd_correlate(cli.json, &recorder, &input, now.as_deref(), config)
        }
        Commands::Summary { input, now, config } => {
            cmd_summary(cli.json, &recorder, &input, now.as_deref(), config)
        }
        Commands::Generate {
            seed,
            count,
            now,
            scenarios,
            out,
        } => cmd_generate(seed, count, now.as_deref(), scenarios, out),
    }
    .and_then(|()| {
        if cli.metrics {
            print!("{}", observability::export_metrics().context("export metrics")?);
        }
        Ok(())
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn engine(config: Option<PathBuf>) -> Result<CorrelationEngine> {
    let mut cfg = match config {
        Some(path) => CorrelationConfig::load(&path)?,
        None => CorrelationConfig::default(),
    };
    cfg.apply_overrides(|name| std::env::var(name).ok())?;
    Ok(CorrelationEngine::new(cfg)?)
}

fn run_correlation<'a>(
    recorder: &CorrelationRecorder,
    engine: &CorrelationEngine,
    records: &'a [AnomalyRecord],
    now: DateTime<Utc>,
) -> CorrelationReport<'a> {
    let started = Instant::now();
    let report = engine.correlate(records, now);
    recorder.record_report(records.len(), &report, started.elapsed());
    report
}

fn cmd_score(
    json: bool,
    recorder: &CorrelationRecorder,
    input: &std::path::Path,
    now: Option<&str>,
) -> Result<()> {
    let records = input::load_records(input)?;
    let now = input::resolve_now(now)?;
    let scorer = RiskScorer::new();
    let scores: Vec<RiskScore> = records.iter().map(|r| scorer.score(r, now)).collect();
    for s in &scores {
        recorder.record_score(s);
    }

    if json {
        let rows: Vec<_> = records
            .iter()
            .zip(&scores)
            .map(|(r, s)| serde_json::json!({ "id": r.id, "score": s }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for (r, s) in records.iter().zip(&scores) {
        println!(
            "{:<14} {:>6.1}  {:<8}  {}",
            r.id, s.final_score, s.risk_level, s.explanation
        );
    }
    Ok(())
}

fn cmd_correlate(
    json: bool,
    recorder: &CorrelationRecorder,
    input: &std::path::Path,
    now: Option<&str>,
    config: Option<PathBuf>,
) -> Result<()> {
    let engine = engine(config)?;
    let records = input::load_records(input)?;
    let now = input::resolve_now(now)?;
    let report = run_correlation(recorder, &engine, &records, now);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.is_empty() {
        println!("No correlations found across {} anomalies", records.len());
        return Ok(());
    }

    println!("Patterns ({}):", report.patterns.len());
    for p in &report.patterns {
        let window = match (p.time_window_minutes, p.time_span_ms) {
            (Some(m), _) => format!("{}m window", m),
            (None, Some(ms)) => format!("{}ms span", ms),
            (None, None) => "-".to_string(),
        };
        println!(
            "  {:<28} {:<10} {:<8} score={:.2} conf={:.2} {} [{} anomalies]",
            p.id,
            p.pattern_type,
            p.severity,
            p.correlation_score,
            p.confidence,
            window,
            p.anomalies.len()
        );
        println!("    {}", p.description);
    }

    println!("Correlation matrix ({}):", report.matrix.len());
    for e in &report.matrix {
        println!(
            "  {} -> {}  shared={} proximity={:.2} similarity={:.2} strength={:.2}",
            e.source_ip,
            e.target_ip,
            e.shared_anomalies,
            e.time_proximity,
            e.pattern_similarity,
            e.correlation_strength
        );
    }
    Ok(())
}

fn cmd_summary(
    json: bool,
    recorder: &CorrelationRecorder,
    input: &std::path::Path,
    now: Option<&str>,
    config: Option<PathBuf>,
) -> Result<()> {
    let engine = engine(config)?;
    let records = input::load_records(input)?;
    let now = input::resolve_now(now)?;

    let scores = risk_scorer::score_all(&records, now);
    for s in &scores {
        recorder.record_score(s);
    }
    let risk = RiskSummary::from_scores(&scores);
    let correlation = run_correlation(recorder, &engine, &records, now).summary();

    if json {
        let out = serde_json::json!({ "risk": risk, "correlation": correlation });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Anomalies: {}", risk.total);
    let levels: Vec<String> = Severity::ALL
        .iter()
        .map(|level| format!("{}={}", level, risk.count(*level)))
        .collect();
    println!("  {}", levels.join(" "));
    println!(
        "  mean score {:.1}, max {:.1}, {:.1}% high or critical",
        risk.mean_score, risk.max_score, risk.elevated_pct
    );
    println!(
        "Patterns: {} (temporal={} behavioral={} volumetric={} spatial={})",
        correlation.pattern_count,
        correlation.temporal,
        correlation.behavioral,
        correlation.volumetric,
        correlation.spatial
    );
    println!("  anomalies in patterns: {}", correlation.records_in_patterns);
    match &correlation.strongest_pair {
        Some((src, dst, strength)) => println!(
            "  strongest pair: {} -> {} ({:.2}) of {}",
            src, dst, strength, correlation.matrix_pairs
        ),
        None => println!("  no correlated IP pairs"),
    }
    Ok(())
}

fn cmd_generate(
    seed: u64,
    count: usize,
    now: Option<&str>,
    scenarios: bool,
    out: Option<PathBuf>,
) -> Result<()> {
    let now = input::resolve_now(now)?;
    let mut generator = AnomalyGenerator::new(seed);
    let mut records = generator.generate(count, now);
    if scenarios {
        records.extend(generator.burst(5, now));
        records.extend(generator.coordinated("198.51.100.23", 6, now));
        records.extend(generator.volumetric_surge(9, now));
        records.extend(generator.subnet_sweep("45.33", 8, now));
    }
    tracing::debug!(seed, issued = generator.issued(), "synthetic feed ready");

    let mut lines = String::new();
    for r in &records {
        lines.push_str(&serde_json::to_string(r)?);
        lines.push('\n');
    }
    match out {
        Some(path) => {
            std::fs::write(&path, lines).with_context(|| format!("write {}", path.display()))?;
            tracing::info!(count = records.len(), path = %path.display(), "wrote synthetic feed");
        }
        None => print!("{}", lines),
    }
    Ok(())
}
