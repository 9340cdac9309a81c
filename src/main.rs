// squeeze - compress images above a size threshold towards a target size

use anyhow::{bail, Context, Result};
use clap::Parser;
use image_squeezer::{
    compress_folder_async, BatchResult, BatchSummary, CompressionConfig, CompressionOutcome,
    Compressor, ConfigFile, FolderOptions, OutputFormat,
};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Shrink images that exceed a size threshold so they land near a target size.
///
/// Quality is lowered by binary search; when even the minimum quality is too
/// large the image is downscaled.
#[derive(Parser, Debug)]
#[command(name = "squeeze", version)]
struct Args {
    /// Image file or folder to compress
    input: PathBuf,

    /// Output file or folder (defaults to overwriting the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Target size in KB
    #[arg(short, long)]
    target_kb: Option<f64>,

    /// Only files larger than this many KB are compressed
    #[arg(long)]
    threshold_kb: Option<f64>,

    /// Lowest quality the search may use (1-100)
    #[arg(long)]
    min_quality: Option<u8>,

    /// Highest quality the search may use (1-100)
    #[arg(long)]
    max_quality: Option<u8>,

    /// Output format: jpeg, png, webp, bmp, tiff (defaults to the source format)
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// Only process the top level of a folder
    #[arg(long)]
    no_recursive: bool,

    /// JSON file with target_size_kb, threshold_kb, quality_min, quality_max
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write a JSON report of every outcome to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Log every probe
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    config: &'a CompressionConfig,
    summary: BatchSummary,
    result: &'a BatchResult,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = resolve_config(&args)?;
    info!(
        target_kb = config.target_size as f64 / 1024.0,
        threshold_kb = config.threshold_size as f64 / 1024.0,
        quality_min = config.quality_min,
        quality_max = config.quality_max,
        "starting"
    );
    let compressor = Arc::new(Compressor::new(config)?);

    let result = if args.input.is_file() {
        let output = args.output.clone().or_else(|| {
            args.format
                .map(|format| args.input.with_extension(format.extension()))
        });
        let outcome = compressor.compress_file(&args.input, output.as_deref(), args.format);
        print_outcome(1, 1, &outcome.file_name(), &outcome);
        BatchResult {
            outcomes: vec![outcome],
            cancelled: false,
        }
    } else if args.input.is_dir() {
        let options = FolderOptions {
            output_dir: args.output.clone(),
            recursive: !args.no_recursive,
            format: args.format,
            ..FolderOptions::default()
        };

        let cancel = options.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, stopping after the current file");
                cancel.cancel();
            }
        });

        compress_folder_async(
            Arc::clone(&compressor),
            args.input.clone(),
            options,
            print_outcome,
        )
        .await?
    } else {
        bail!("input does not exist: {}", args.input.display());
    };

    let summary = result.summary();
    print_summary(&summary, result.cancelled);

    if let Some(path) = &args.report {
        write_report(path, compressor.config(), &result)?;
        info!(path = %path.display(), "report written");
    }

    if summary.failed > 0 {
        bail!("{} file(s) failed", summary.failed);
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Config file values (or defaults) overridden by any flag given on the command line.
fn resolve_config(args: &Args) -> Result<CompressionConfig> {
    let mut file = match &args.config {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::default(),
    };

    if let Some(v) = args.target_kb {
        file.target_size_kb = v;
    }
    if let Some(v) = args.threshold_kb {
        file.threshold_kb = v;
    }
    if let Some(v) = args.min_quality {
        file.quality_min = v;
    }
    if let Some(v) = args.max_quality {
        file.quality_max = v;
    }

    Ok(file.into_config()?)
}

fn print_outcome(index: usize, total: usize, filename: &str, outcome: &CompressionOutcome) {
    let mark = match (outcome.success, outcome.skipped) {
        (false, _) => "x",
        (true, true) => "-",
        (true, false) => "+",
    };
    println!("[{index}/{total}] {mark} {filename}: {}", outcome.message);
}

fn print_summary(summary: &BatchSummary, cancelled: bool) {
    println!();
    if cancelled {
        println!("Cancelled after {} file(s)", summary.processed);
    }
    println!("Compressed: {}", summary.compressed);
    println!("Skipped:    {}", summary.skipped);
    println!("Failed:     {}", summary.failed);
    if summary.compressed > 0 {
        println!("Original:   {:.2} MB", mb(summary.original_bytes as i64));
        println!("Now:        {:.2} MB", mb(summary.compressed_bytes as i64));
        println!("Saved:      {:.2} MB", mb(summary.saved_bytes));
        println!("Avg ratio:  {:.1}%", summary.average_ratio * 100.0);
    }
    if summary.failed > 0 {
        error!(failed = summary.failed, "some files could not be compressed");
    }
}

fn mb(bytes: i64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}

fn write_report(path: &Path, config: &CompressionConfig, result: &BatchResult) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let report = Report {
        config,
        summary: result.summary(),
        result,
    };
    serde_json::to_writer_pretty(BufWriter::new(file), &report)?;
    Ok(())
}
