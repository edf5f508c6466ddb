use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use signalbook::{
    Analysis, AnalysisError, Analyzer, Config, DateRange, JsonFileSource, ResultStore, StoreError,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "signalbook", version, about = "Daily moving average and RSI signals")]
struct Cli {
    /// SQLite database file (overrides SIGNALBOOK_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze instruments from bar files and store the results
    Analyze {
        /// Instrument ids, one bar file per id
        #[arg(required = true)]
        instruments: Vec<String>,

        /// Directory of <instrument>.json bar files (overrides SIGNALBOOK_BARS_DIR)
        #[arg(long)]
        bars_dir: Option<PathBuf>,

        /// First date to load
        #[arg(long, default_value = "1990-01-01")]
        from: NaiveDate,

        /// Last date to load (defaults to today)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Write the chart window of each analysis to <dir>/<instrument>.chart.json
        #[arg(long)]
        export_chart: Option<PathBuf>,
    },
    /// Print the stored result for an instrument
    Show { instrument: String },
    /// List instruments with stored results
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing (stdout carries the reports)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signalbook=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    let store = Arc::new(
        ResultStore::new(&config.db_path)
            .with_context(|| format!("opening store at {}", config.db_path.display()))?,
    );

    match cli.command {
        Command::Analyze {
            instruments,
            bars_dir,
            from,
            to,
            export_chart,
        } => {
            let bars_dir = bars_dir.unwrap_or_else(|| config.bars_dir.clone());
            let range = DateRange::new(from, to.unwrap_or_else(|| Local::now().date_naive()));
            let analyzer = Arc::new(Analyzer::new(store, config.analysis.clone())?);
            run_analyses(analyzer, bars_dir, range, instruments, export_chart).await
        }
        Command::Show { instrument } => {
            match store.get_result(&instrument)? {
                Some(stored) => {
                    println!("{}", stored.result.summary);
                    println!("\n(last updated {})", stored.last_updated.to_rfc3339());
                }
                None => println!("No stored result for {}", instrument),
            }
            Ok(())
        }
        Command::List => {
            for id in store.list_instruments()? {
                println!("{}", id);
            }
            Ok(())
        }
    }
}

/// Analyze every instrument on the blocking pool and report as each finishes.
async fn run_analyses(
    analyzer: Arc<Analyzer>,
    bars_dir: PathBuf,
    range: DateRange,
    instruments: Vec<String>,
    export_chart: Option<PathBuf>,
) -> anyhow::Result<()> {
    let source = Arc::new(JsonFileSource::new(&bars_dir));
    let total = instruments.len();
    info!(
        "Analyzing {} instrument(s) from {} ({} to {})",
        total,
        bars_dir.display(),
        range.start,
        range.end
    );

    let mut tasks = JoinSet::new();
    for instrument in instruments {
        let analyzer = analyzer.clone();
        let source = source.clone();
        tasks.spawn_blocking(move || {
            let outcome = analyzer.analyze_from(source.as_ref(), &instrument, range);
            (instrument, outcome)
        });
    }

    let mut failures = 0;
    while let Some(joined) = tasks.join_next().await {
        let (instrument, outcome) = joined.context("analysis task panicked")?;

        let analysis = match outcome {
            Ok(analysis) => analysis,
            Err(AnalysisError::StoreWrite {
                source, analysis, ..
            }) => {
                warn!("Store write for {} failed ({}), retrying once", instrument, source);
                let (analysis, retried) = retry_persist(analyzer.clone(), analysis).await?;
                if let Err(e) = retried {
                    error!("Retry for {} failed: {}", instrument, e);
                    failures += 1;
                }
                *analysis
            }
            Err(e) => {
                error!("Analysis of {} failed: {}", instrument, e);
                failures += 1;
                continue;
            }
        };

        report(&analysis, export_chart.as_deref())?;
    }

    if failures > 0 {
        anyhow::bail!("{} of {} analyses failed", failures, total);
    }
    Ok(())
}

/// Write a finished analysis again on the blocking pool.
async fn retry_persist(
    analyzer: Arc<Analyzer>,
    analysis: Box<Analysis>,
) -> anyhow::Result<(Box<Analysis>, Result<(), StoreError>)> {
    tokio::task::spawn_blocking(move || {
        let outcome = analyzer.persist(&analysis);
        (analysis, outcome)
    })
    .await
    .context("store retry task panicked")
}

fn report(analysis: &Analysis, export_chart: Option<&Path>) -> anyhow::Result<()> {
    println!("{}\n", analysis.summary());

    if let Some(dir) = export_chart {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.chart.json", analysis.instrument_id));
        let json = serde_json::to_string_pretty(analysis.chart_rows())?;
        std::fs::write(&path, json)
            .with_context(|| format!("writing chart rows to {}", path.display()))?;
        info!("Wrote chart rows to {}", path.display());
    }

    Ok(())
}
