//! pitlab CLI: run the point-in-time pipeline over delimited input files.
//!
//! Commands:
//! - `run` - read `<source>.csv` files from a directory, update the output table, write the report
//! - `columns` - print the output schema for a config
//! - `synthetic` - write a deterministic synthetic input directory

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pitlab_core::features::FeatureEngine;
use pitlab_core::ingest::SourceKind;
use pitlab_core::report::Severity;
use pitlab_core::schema::OutputSchema;
use pitlab_runner::{
    generate, read_raw_table, run_pipeline, write_raw_table, CsvTableStore, PipelineConfig,
    PipelineReport, SourceBatch, SyntheticSpec, TableStore,
};

#[derive(Parser)]
#[command(
    name = "pitlab",
    about = "pitlab: point-in-time as-of joins and feature tables"
)]
struct Cli {
    /// Log filter, e.g. `info` or `pitlab_runner=debug`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline over a directory of input tables.
    Run {
        /// Directory holding prices.csv, fundamentals.csv, market_cap.csv, splits.csv, sectors.csv.
        /// Any file but prices may be absent.
        #[arg(long)]
        input_dir: PathBuf,

        /// Path to a TOML pipeline config. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output feature table.
        #[arg(long, default_value = "features.csv")]
        output: PathBuf,

        /// Run report (JSON). Defaults to the output path with a .report.json suffix.
        #[arg(long)]
        report: Option<PathBuf>,

        /// Ignore any existing output table instead of updating it.
        #[arg(long, default_value_t = false)]
        fresh: bool,
    },
    /// Print the output columns produced by a config.
    Columns {
        /// Path to a TOML pipeline config.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Write deterministic synthetic input tables.
    Synthetic {
        /// Output directory.
        #[arg(long)]
        output_dir: PathBuf,

        #[arg(long, default_value_t = 5)]
        tickers: usize,

        /// Start date (YYYY-MM-DD).
        #[arg(long, default_value = "2020-01-01")]
        start: String,

        /// End date (YYYY-MM-DD).
        #[arg(long, default_value = "2023-12-31")]
        end: String,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Field delimiter.
        #[arg(long, default_value_t = ';')]
        delimiter: char,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match cli.command {
        Commands::Run {
            input_dir,
            config,
            output,
            report,
            fresh,
        } => run_cmd(&input_dir, config.as_deref(), &output, report, fresh),
        Commands::Columns { config } => columns_cmd(config.as_deref()),
        Commands::Synthetic {
            output_dir,
            tickers,
            start,
            end,
            seed,
            delimiter,
        } => synthetic_cmd(&output_dir, tickers, &start, &end, seed, delimiter),
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("pitlab_core=info,pitlab_runner=info,pitlab=info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn run_cmd(
    input_dir: &Path,
    config_path: Option<&Path>,
    output: &Path,
    report_path: Option<PathBuf>,
    fresh: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let delimiter = config.delimiter_byte();

    let mut batch = SourceBatch::new();
    for kind in SourceKind::ALL {
        let path = input_dir.join(format!("{kind}.csv"));
        if !path.exists() {
            info!(source = %kind, "no input file, skipping");
            continue;
        }
        let table = read_raw_table(&path, kind, delimiter)
            .with_context(|| format!("reading {}", path.display()))?;
        batch.insert(table);
    }
    if batch.get(SourceKind::Prices).is_none() {
        bail!(
            "no prices.csv in {}; prices are the spine of the output table",
            input_dir.display()
        );
    }

    let store = CsvTableStore::new(output, delimiter);
    let schema = std::sync::Arc::new(OutputSchema::for_engine(&FeatureEngine::new(
        config.feature_config(),
    )));
    let previous = if fresh {
        None
    } else {
        store.load_previous(schema).with_context(|| {
            format!(
                "loading previous table {} (pass --fresh to rebuild it)",
                output.display()
            )
        })?
    };

    let result = run_pipeline(&batch, previous, &config)?;
    store
        .save(&result.table)
        .with_context(|| format!("writing {}", output.display()))?;

    let report_path = report_path.unwrap_or_else(|| output.with_extension("report.json"));
    std::fs::write(&report_path, result.report.to_json()?)
        .with_context(|| format!("writing {}", report_path.display()))?;

    print_summary(&result.report);
    println!("Table written to:  {}", output.display());
    println!("Report written to: {}", report_path.display());

    if result.report.has_errors() {
        warn!(
            errors = result.report.count(Severity::Error),
            "run finished with errors"
        );
    }
    Ok(())
}

fn columns_cmd(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let schema = OutputSchema::for_engine(&FeatureEngine::new(config.feature_config()));
    println!("{:<4} {:<32} {:<6}", "#", "Column", "Kind");
    println!("{}", "-".repeat(44));
    for (i, column) in schema.columns().iter().enumerate() {
        println!("{:<4} {:<32} {:<6?}", i, column.name, column.kind);
    }
    println!();
    println!("{} columns", schema.len());
    Ok(())
}

fn synthetic_cmd(
    output_dir: &Path,
    tickers: usize,
    start: &str,
    end: &str,
    seed: u64,
    delimiter: char,
) -> Result<()> {
    let start = NaiveDate::parse_from_str(start, "%Y-%m-%d")
        .with_context(|| format!("invalid --start '{start}'"))?;
    let end = NaiveDate::parse_from_str(end, "%Y-%m-%d")
        .with_context(|| format!("invalid --end '{end}'"))?;
    if start > end {
        bail!("--start {start} is after --end {end}");
    }
    if !delimiter.is_ascii() {
        bail!("delimiter must be a single ASCII character");
    }

    let batch = generate(&SyntheticSpec {
        tickers,
        start,
        end,
        seed,
    });
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;
    for table in batch.tables() {
        let path = output_dir.join(format!("{}.csv", table.kind));
        write_raw_table(&path, table, delimiter as u8)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("{:<14} {:>8} rows  {}", table.kind.name(), table.len(), path.display());
    }
    Ok(())
}

fn print_summary(report: &PipelineReport) {
    println!();
    println!("=== Pipeline Run ===");
    println!("Entities:       {} ({} failed)", report.entities, report.entities_failed);
    println!("Rows computed:  {}", report.rows_computed);
    println!("Rows total:     {}", report.rows_total);
    println!("Table digest:   {}", report.table_digest);
    println!();
    println!("--- Sources ---");
    for (kind, summary) in &report.sources {
        if summary.dropped {
            println!("{:<14} DROPPED ({} rows)", kind.name(), summary.rows_in);
        } else {
            println!(
                "{:<14} {:>8} rows -> {:>8} records ({} skipped)",
                kind.name(),
                summary.rows_in,
                summary.records,
                summary.skipped
            );
        }
    }
    println!();
    println!("--- Issues ---");
    println!(
        "errors: {}  warnings: {}  info: {}",
        report.count(Severity::Error),
        report.count(Severity::Warning),
        report.count(Severity::Info)
    );
    for (kind, count) in report.counts_by_kind() {
        println!("  {kind:<28} {count}");
    }
    println!();
}
