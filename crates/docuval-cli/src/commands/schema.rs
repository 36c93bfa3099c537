//! Schema command - inspect and check document schemas.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use console::style;

use docuval_core::schema::registry::SchemaRegistry;
use docuval_core::schema::{FieldDescriptor, FieldKind, Rule};

use super::load_config;

/// Arguments for the schema command.
#[derive(Args)]
pub struct SchemaArgs {
    #[command(subcommand)]
    command: SchemaCommand,
}

#[derive(Subcommand)]
enum SchemaCommand {
    /// List known document types
    List,

    /// Show the fields and rules of one document type
    Show {
        /// Document type name
        name: String,
    },

    /// Compile a schema file and report problems
    Check {
        /// Path to a schema JSON file
        file: PathBuf,
    },
}

pub async fn run(args: SchemaArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let registry = match &config.schema_path {
        Some(path) => SchemaRegistry::from_file(path)?,
        None => SchemaRegistry::builtin()?,
    };

    match args.command {
        SchemaCommand::List => list(&registry),
        SchemaCommand::Show { name } => show(&registry, &name),
        SchemaCommand::Check { file } => check(&file),
    }
}

fn list(registry: &SchemaRegistry) -> anyhow::Result<()> {
    for name in registry.document_types() {
        let schema = registry.get(name)?;
        println!(
            "{}  {} ({} fields, {} rules)",
            style(name).bold(),
            schema.label,
            schema.fields.len(),
            schema.rules.len()
        );
    }
    Ok(())
}

fn show(registry: &SchemaRegistry, name: &str) -> anyhow::Result<()> {
    let schema = registry.get(name)?;

    println!("{} ({})", style(&schema.label).bold(), schema.name);
    println!();
    println!("Fields:");
    for field in &schema.fields {
        print_field(field, 1);
    }

    if let Some(table) = &schema.table {
        println!();
        println!("Table columns:");
        for column in &table.columns {
            println!("  {} ({})", column.name, column.label);
        }
    }

    if !schema.rules.is_empty() {
        println!();
        println!("Rules:");
        for rule in &schema.rules {
            println!("  {} on {}", rule_kind(rule), rule.field());
        }
    }

    if !schema.chains.is_empty() {
        println!();
        println!("Chains:");
        for chain in &schema.chains {
            println!("  {} -> {}", chain.anchor, chain.followers.join(" -> "));
        }
    }

    Ok(())
}

fn print_field(field: &FieldDescriptor, indent: usize) {
    let pad = "  ".repeat(indent);
    println!("{}{} [{}]", pad, field.name, kind_name(&field.kind));
    if let FieldKind::Group { fields } = &field.kind {
        for child in fields {
            print_field(child, indent + 1);
        }
    }
}

fn kind_name(kind: &FieldKind) -> &'static str {
    match kind {
        FieldKind::Regex { .. } => "regex",
        FieldKind::Region { .. } => "region",
        FieldKind::Relative { .. } => "relative",
        FieldKind::Xpath { .. } => "xpath",
        FieldKind::Enumeration { .. } => "enumeration",
        FieldKind::Group { .. } => "group",
    }
}

fn rule_kind(rule: &Rule) -> &'static str {
    match rule {
        Rule::Format { .. } => "format",
        Rule::FixedValue { .. } => "fixed_value",
        Rule::DateOrder { .. } => "date_order",
        Rule::RowArithmetic { .. } => "row_arithmetic",
        Rule::Totals { .. } => "totals",
        Rule::MatchesInput { .. } => "matches_input",
        Rule::Required { .. } => "required",
    }
}

fn check(file: &PathBuf) -> anyhow::Result<()> {
    match SchemaRegistry::from_file(file) {
        Ok(registry) => {
            println!(
                "{} {} compiled ({} document types)",
                style("✓").green(),
                file.display(),
                registry.len()
            );
            Ok(())
        }
        Err(e) => {
            anyhow::bail!("{}: {}", file.display(), e);
        }
    }
}
