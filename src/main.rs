use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing::info;

use loglens_analyze::{AnalysisSnapshot, AnalyzeConfig, Analyzer};
use loglens_ingest::{IngestConfig, StreamIngestor};
use loglens_types::IngestStats;
use loglens_view::CompiledFilter;

mod source;

use source::BatchStream;

/// Loglens - ingest, buffer, and analyze structured log streams
#[derive(Parser, Debug)]
#[command(name = "loglens")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSONL log source; "-" or omitted reads stdin
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Generate a synthetic stream at RATE entries/s instead of reading input
    #[arg(long, value_name = "RATE")]
    synthetic: Option<u64>,

    /// Seconds of synthetic stream to generate
    #[arg(long, default_value = "5", requires = "synthetic")]
    duration: u64,

    /// Ring buffer capacity in entries
    #[arg(long)]
    buffer_capacity: Option<usize>,

    /// Admission cap per second; 0 disables backpressure entirely
    #[arg(long)]
    max_events_per_second: Option<usize>,

    /// Lines per producer batch when reading JSONL
    #[arg(long, default_value = "256")]
    batch_size: usize,

    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Analyze only entries matching this pattern (regex, falls back to
    /// literal text if the pattern does not parse)
    #[arg(long, value_name = "PATTERN")]
    filter: Option<String>,

    /// Emit the full analysis as JSON on stdout instead of a digest
    #[arg(long)]
    report: bool,
}

/// On-disk configuration; every section and field is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    ingest: IngestConfig,
    analyze: AnalyzeConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing for progress output on stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Run the application
    let result = run_app(args).await;

    // Handle any errors
    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

fn load_config(args: &Args) -> Result<FileConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => FileConfig::default(),
    };

    // CLI flags override the file
    if let Some(capacity) = args.buffer_capacity {
        config.ingest.buffer_capacity = capacity;
    }
    if let Some(cap) = args.max_events_per_second {
        if cap == 0 {
            config.ingest.backpressure = false;
        } else {
            config.ingest.max_events_per_second = cap;
        }
    }

    Ok(config)
}

async fn run_app(args: Args) -> Result<()> {
    let config = load_config(&args)?;

    let ingestor = StreamIngestor::new(config.ingest);
    let analyzer = Analyzer::new(config.analyze);

    let stream: BatchStream = match args.synthetic {
        Some(rate) => source::synthetic_batches(rate, args.duration),
        None => match &args.input {
            Some(path) if path.as_os_str() != "-" => {
                source::file_batches(path, args.batch_size).await?
            }
            _ => source::stdin_batches(args.batch_size),
        },
    };

    // Ctrl-C stops ingestion; whatever is buffered still gets analyzed
    let signal_ingestor = ingestor.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_ingestor.shutdown();
        }
    });

    // Progress line once per second while the stream runs
    let progress_ingestor = ingestor.clone();
    let progress_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let stats = progress_ingestor.stats();
            info!(
                "ingesting: total={} rate={}/s dropped={} buffer={}/{}",
                stats.total_ingested,
                stats.logs_per_second,
                stats.dropped.total(),
                stats.buffer_len,
                stats.buffer_capacity
            );
        }
    });

    let result = ingestor.connect(stream, |_| {}).await;

    progress_task.abort();
    signal_task.abort();
    result?;

    // Snapshot the buffer, then analyze off the live path
    let mut entries = ingestor.buffer().all();
    if let Some(pattern) = &args.filter {
        let filter = CompiledFilter::new(pattern);
        let before = entries.len();
        entries.retain(|entry| filter.matches(entry));
        info!(
            "filter \"{}\" kept {} of {} entries",
            filter.pattern(),
            entries.len(),
            before
        );
    }

    let stats = ingestor.stats();
    let analysis = analyzer.analyze(&entries);

    if args.report {
        let report = serde_json::json!({
            "stats": stats,
            "analysis": analysis,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_digest(&stats, &analysis);
    }

    Ok(())
}

/// Human-readable digest on stdout; the JSON report replaces this when
/// --report is set
fn print_digest(stats: &IngestStats, analysis: &AnalysisSnapshot) {
    println!(
        "Ingested {} entries, {} buffered ({:.0}% of capacity {})",
        stats.total_ingested,
        stats.buffer_len,
        stats.utilization * 100.0,
        stats.buffer_capacity
    );
    println!(
        "Dropped {}: {} rate-limited, {} memory, {} malformed, {} overwritten; {} rotations",
        stats.dropped.total(),
        stats.dropped.rate_limited,
        stats.dropped.memory_pressure,
        stats.dropped.malformed,
        stats.dropped.overwritten,
        stats.rotations
    );

    let statistics = &analysis.statistics;
    println!(
        "Levels: {} error, {} warn, {} info, {} debug ({:.1}% errors)",
        statistics.by_level.errors(),
        statistics.by_level.warn,
        statistics.by_level.info,
        statistics.by_level.trace + statistics.by_level.debug,
        statistics.error_rate * 100.0
    );
    println!(
        "Rate: {:.1}/min average, {} peak in any minute; {} unique messages, {:.0}% pattern coverage",
        statistics.avg_per_minute,
        statistics.peak_per_minute,
        statistics.unique_messages,
        statistics.pattern_coverage * 100.0
    );

    if !analysis.patterns.is_empty() {
        println!("\nTop patterns:");
        for pattern in analysis.patterns.iter().take(10) {
            println!(
                "  {:>6}x [{:?}/{:?}] {}",
                pattern.count, pattern.severity, pattern.category, pattern.template
            );
        }
    }

    if !analysis.error_groups.is_empty() {
        println!("\nError groups:");
        for group in analysis.error_groups.iter().take(10) {
            println!(
                "  {:>6}x {} ({} users, {} endpoints)",
                group.count,
                group.message,
                group.users.len(),
                group.endpoints.len()
            );
        }
    }
}
