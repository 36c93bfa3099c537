//! Batch processing command for multiple document files.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use docuval_core::{DocumentDecision, DocumentProcessor, ExtractionContext};

use super::{build_processor, load_config};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Document type for all files; classified per file when omitted
    #[arg(short = 't', long)]
    document_type: Option<String>,

    /// Output directory for per-file results
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Number of parallel workers
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Continue when a file fails
    #[arg(long)]
    continue_on_error: bool,
}

/// Result of processing a single file.
struct BatchResult {
    path: PathBuf,
    decision: Option<DocumentDecision>,
    error: Option<String>,
    processing_time_ms: u64,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;
    let processor = Arc::new(build_processor(&config)?);

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            matches!(ext.to_lowercase().as_str(), "pdf" | "xml" | "png" | "jpg" | "jpeg")
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
            .unwrap()
            .progress_chars("=>-"),
    );

    // Worker pool: processing is CPU-bound, so each file runs on the
    // blocking pool with a semaphore capping concurrency.
    let semaphore = Arc::new(Semaphore::new(args.jobs.max(1)));
    let mut handles = Vec::with_capacity(files.len());

    for path in files {
        let processor = Arc::clone(&processor);
        let semaphore = Arc::clone(&semaphore);
        let document_type = args.document_type.clone();
        let pb = pb.clone();

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
            let result = tokio::task::spawn_blocking(move || {
                let file_start = Instant::now();
                let decision = processor.process_file_with_context(
                    &path,
                    document_type.as_deref(),
                    ExtractionContext::default(),
                );
                let processing_time_ms = file_start.elapsed().as_millis() as u64;
                match decision {
                    Ok(decision) => BatchResult {
                        path,
                        decision: Some(decision),
                        error: None,
                        processing_time_ms,
                    },
                    Err(e) => BatchResult {
                        path,
                        decision: None,
                        error: Some(e.to_string()),
                        processing_time_ms,
                    },
                }
            })
            .await
            .expect("worker panicked");
            pb.inc(1);
            result
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        let result = handle.await?;
        if let Some(error) = &result.error {
            if args.continue_on_error {
                warn!("Failed to process {}: {}", result.path.display(), error);
            } else {
                pb.abandon();
                anyhow::bail!("Processing failed for {}: {}", result.path.display(), error);
            }
        }
        results.push(result);
    }

    pb.finish_with_message("Complete");

    // Per-file outputs
    if let Some(output_dir) = &args.output_dir {
        for result in &results {
            let Some(decision) = &result.decision else {
                continue;
            };
            let name = result
                .path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("document");
            let output_path = output_dir.join(format!("{}.json", name));
            fs::write(&output_path, serde_json::to_string_pretty(decision)?)?;
            debug!("Wrote output to {}", output_path.display());
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));
        write_summary(&summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let accepted = results
        .iter()
        .filter(|r| r.decision.as_ref().is_some_and(|d| d.is_accepted()))
        .count();
    let rejected = results
        .iter()
        .filter(|r| r.decision.as_ref().is_some_and(|d| !d.is_accepted()))
        .count();
    let failed = results.iter().filter(|r| r.error.is_some()).count();

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} accepted, {} rejected, {} failed",
        style(accepted).green(),
        style(rejected).yellow(),
        style(failed).red()
    );

    if failed > 0 {
        println!();
        println!("{}", style("Failed files:").red());
        for result in results.iter().filter(|r| r.error.is_some()) {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

fn write_summary(path: &PathBuf, results: &[BatchResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "document_type",
        "status",
        "field_errors",
        "missing_fields",
        "processing_time_ms",
        "error",
    ])?;

    for result in results {
        let filename = result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("");

        match &result.decision {
            Some(decision) => {
                let status = if decision.is_accepted() {
                    "accepted"
                } else {
                    "rejected"
                };
                wtr.write_record([
                    filename,
                    &decision.document_type,
                    status,
                    &decision.validation.field_errors.len().to_string(),
                    &decision.validation.missing_fields.len().to_string(),
                    &result.processing_time_ms.to_string(),
                    "",
                ])?;
            }
            None => {
                wtr.write_record([
                    filename,
                    "",
                    "error",
                    "",
                    "",
                    &result.processing_time_ms.to_string(),
                    result.error.as_deref().unwrap_or(""),
                ])?;
            }
        }
    }

    wtr.flush()?;
    Ok(())
}
