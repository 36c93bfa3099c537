//! Process command - review a single document file.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::info;

use docuval_core::{DecisionStatus, DocumentDecision, ExtractionContext};

use super::{build_processor, load_config, parse_reference_pairs};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (PDF, XML or image)
    #[arg(required = true)]
    input: PathBuf,

    /// Document type (invoice, contract, service_delivery_record);
    /// classified from the text when omitted
    #[arg(short = 't', long)]
    document_type: Option<String>,

    /// Reference values for matches_input rules, as FIELD=VALUE
    #[arg(short, long = "reference", value_name = "FIELD=VALUE")]
    reference: Vec<String>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Exit with a non-zero status when the document is rejected
    #[arg(long)]
    fail_on_reject: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// Full decision as JSON
    Json,
    /// Plain text summary
    Text,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let config = load_config(config_path)?;
    let processor = build_processor(&config)?;

    let mut ctx = ExtractionContext::default();
    for (field, value) in parse_reference_pairs(&args.reference)? {
        ctx = ctx.with_reference_value(field, value);
    }

    info!("Processing file: {}", args.input.display());
    let decision =
        processor.process_file_with_context(&args.input, args.document_type.as_deref(), ctx)?;

    let output = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&decision)?,
        OutputFormat::Text => format_decision_text(&decision),
    };

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Wrote result to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    let status = match decision.status {
        DecisionStatus::Accepted => style("accepted").green(),
        DecisionStatus::Rejected => style("rejected").red(),
    };
    eprintln!(
        "{} {} ({}) in {:?}",
        style("✓").green(),
        args.input.display(),
        status,
        start.elapsed()
    );

    if args.fail_on_reject && !decision.is_accepted() {
        anyhow::bail!("document rejected: {}", decision.explanation);
    }
    Ok(())
}

/// Plain text rendering of a decision.
pub fn format_decision_text(decision: &DocumentDecision) -> String {
    let mut output = String::new();

    output.push_str(&format!("Document type: {}\n", decision.document_type));
    output.push_str(&format!("Status: {:?}\n", decision.status));
    output.push_str(&format!("Explanation: {}\n", decision.explanation));
    output.push('\n');

    output.push_str("Fields:\n");
    for field in decision.fields.values() {
        match &field.value {
            Some(value) => output.push_str(&format!(
                "  {}: {} ({:.1})\n",
                field.name, value, field.confidence
            )),
            None => output.push_str(&format!("  {}: -\n", field.name)),
        }
    }

    if !decision.table.rows.is_empty() {
        output.push('\n');
        output.push_str(&format!("Table: {} rows\n", decision.table.rows.len()));
    }

    if !decision.signatures.is_empty() {
        output.push('\n');
        output.push_str(&format!("Signatures: {} detected\n", decision.signatures.len()));
    }

    if !decision.validation.field_errors.is_empty() {
        output.push('\n');
        output.push_str("Errors:\n");
        for error in &decision.validation.field_errors {
            output.push_str(&format!("  - {}: {}\n", error.field, error.message));
        }
    }

    output
}
