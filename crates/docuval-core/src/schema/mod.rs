//! Document schemas.
//!
//! A [`DocumentSchema`] describes one document type: which fields to extract
//! and how, the layout of its line-item table, and the business rules the
//! extracted values must satisfy. Schemas are loaded from JSON (see
//! [`spec`]) and compiled once: patterns are pre-compiled, field references
//! are checked, and sequential chains are built and cycle-checked. A schema
//! that passes compilation cannot fail structurally during processing.

pub mod registry;
pub mod spec;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::SchemaError;
use spec::{DocumentSpec, FieldKindSpec, FieldSpec, RuleSpec};

/// Date format used by the bundled schemas and as the `date_order` default.
pub const DEFAULT_DATE_FORMAT: &str = "%d/%m/%Y";

/// A rectangle on a page, in pixels of the rendered page image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Region {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Region {
            left,
            top,
            width,
            height,
        }
    }

    /// Returns this region shifted by an offset.
    pub fn translated(&self, offset: &Offset) -> Region {
        Region {
            left: self.left + offset.x,
            top: self.top + offset.y,
            width: self.width,
            height: self.height,
        }
    }

    /// Clamps the region to an image of the given dimensions and returns
    /// integer crop coordinates `(x, y, width, height)`, or `None` if the
    /// region lies entirely outside the image.
    pub fn to_pixel_rect(&self, image_width: u32, image_height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.left.max(0.0);
        let y0 = self.top.max(0.0);
        let x1 = (self.left + self.width).min(image_width as f32);
        let y1 = (self.top + self.height).min(image_height as f32);

        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        Some((
            x0 as u32,
            y0 as u32,
            (x1 - x0) as u32,
            (y1 - y0) as u32,
        ))
    }
}

/// An (x, y) displacement between two regions, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Offset {
    pub x: f32,
    pub y: f32,
}

/// A compiled schema for one document type.
#[derive(Debug)]
pub struct DocumentSchema {
    /// Document type name (the key in the schema file).
    pub name: String,
    pub label: String,
    /// Fields in declaration order. Chained fields (those with a `follows`
    /// link) are resolved by their chain, not in this order.
    pub fields: Vec<FieldDescriptor>,
    pub table: Option<TableSchema>,
    pub rules: Vec<Rule>,
    /// Sequential chains: each starts at an anchor field and lists its
    /// followers in order.
    pub chains: Vec<Chain>,
}

/// A compiled field descriptor.
#[derive(Debug)]
pub struct FieldDescriptor {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    pub follows: Option<String>,
}

/// How a field's value is located, with patterns pre-compiled.
#[derive(Debug)]
pub enum FieldKind {
    Regex { pattern: Regex },
    Region { region: Region, page: usize },
    Relative { base: String, offset: Offset },
    Xpath { path: String },
    Enumeration { pattern: Regex, values: Vec<String> },
    Group { fields: Vec<FieldDescriptor> },
}

/// A compiled line-item table layout.
#[derive(Debug)]
pub struct TableSchema {
    pub header: Regex,
    pub end: Option<Regex>,
    pub columns: Vec<ColumnDescriptor>,
}

/// A compiled table column.
#[derive(Debug)]
pub struct ColumnDescriptor {
    pub name: String,
    pub label: String,
    pub pattern: Regex,
    pub alternative_labels: Vec<String>,
}

/// A compiled validation rule.
#[derive(Debug)]
pub enum Rule {
    Format {
        field: String,
        pattern: Regex,
    },
    FixedValue {
        field: String,
        expected: String,
    },
    DateOrder {
        earlier: String,
        later: String,
        format: String,
    },
    RowArithmetic {
        quantity: String,
        unit_cost: String,
        cost: String,
    },
    Totals {
        subtotal: String,
        tax: String,
        total: String,
        tax_rate: Decimal,
        cost_column: String,
    },
    MatchesInput {
        field: String,
    },
    Required {
        field: String,
    },
}

impl Rule {
    /// The primary field a failure of this rule is reported against.
    pub fn field(&self) -> &str {
        match self {
            Rule::Format { field, .. }
            | Rule::FixedValue { field, .. }
            | Rule::MatchesInput { field }
            | Rule::Required { field } => field,
            Rule::DateOrder { later, .. } => later,
            Rule::RowArithmetic { cost, .. } => cost,
            Rule::Totals { total, .. } => total,
        }
    }
}

/// A sequential chain of fields: the anchor is searched normally, each
/// follower only in the text after the previous link's match.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub anchor: String,
    pub followers: Vec<String>,
}

impl DocumentSchema {
    /// Compiles a raw spec into a validated schema.
    pub fn compile(name: &str, spec: DocumentSpec) -> Result<Self, SchemaError> {
        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(spec.fields.len());
        for field in &spec.fields {
            fields.push(compile_field(field, None, &mut seen)?);
        }

        let chains = build_chains(&fields, &seen)?;

        let table = match spec.table {
            Some(ref t) => Some(compile_table(t)?),
            None => None,
        };

        let mut rules = Vec::with_capacity(spec.rules.len());
        for rule in &spec.rules {
            rules.push(compile_rule(rule, &seen, table.as_ref())?);
        }

        Ok(DocumentSchema {
            name: name.to_string(),
            label: if spec.label.is_empty() {
                name.to_string()
            } else {
                spec.label
            },
            fields,
            table,
            rules,
            chains,
        })
    }

    /// All field names the schema can produce, group children namespaced as
    /// `"<group>.<child>"`.
    pub fn field_names(&self) -> Vec<&str> {
        fn walk<'a>(fields: &'a [FieldDescriptor], out: &mut Vec<&'a str>) {
            for f in fields {
                out.push(&f.name);
                if let FieldKind::Group { fields } = &f.kind {
                    walk(fields, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.fields, &mut out);
        out
    }
}

fn compile_field(
    spec: &FieldSpec,
    group: Option<&str>,
    seen: &mut HashSet<String>,
) -> Result<FieldDescriptor, SchemaError> {
    let name = match group {
        Some(g) => format!("{}.{}", g, spec.name),
        None => spec.name.clone(),
    };

    // Chains run over top-level fields; group children resolve against
    // signature blocks instead and cannot take part in one.
    if group.is_some() && spec.follows.is_some() {
        return Err(SchemaError::Parse(format!(
            "field {} may not declare `follows` inside a group",
            name
        )));
    }

    let kind = match &spec.kind {
        FieldKindSpec::Regex { pattern } => FieldKind::Regex {
            pattern: compile_pattern(&name, pattern)?,
        },
        FieldKindSpec::Region { region, page } => FieldKind::Region {
            region: *region,
            page: *page,
        },
        FieldKindSpec::Relative { relative_to, offset } => {
            // Relative fields may only reference already-declared fields, so
            // the base region is resolved by the time this field runs.
            if !seen.contains(relative_to) {
                return Err(SchemaError::UnknownBase {
                    field: name,
                    base: relative_to.clone(),
                });
            }
            FieldKind::Relative {
                base: relative_to.clone(),
                offset: *offset,
            }
        }
        FieldKindSpec::Xpath { xpath } => FieldKind::Xpath {
            path: xpath.clone(),
        },
        FieldKindSpec::Enumeration { values } => {
            let alternation = values
                .iter()
                .map(|v| regex::escape(v))
                .collect::<Vec<_>>()
                .join("|");
            FieldKind::Enumeration {
                pattern: compile_pattern(&name, &format!("(?i)\\b(?:{})\\b", alternation))?,
                values: values.clone(),
            }
        }
        FieldKindSpec::Group { fields } => {
            if group.is_some() {
                return Err(SchemaError::Parse(format!(
                    "group {} may not be nested inside another group",
                    name
                )));
            }
            if spec.follows.is_some() {
                return Err(SchemaError::Parse(format!(
                    "group {} declares `follows` but is not a regex field",
                    name
                )));
            }
            seen.insert(name.clone());
            let mut compiled = Vec::with_capacity(fields.len());
            for child in fields {
                compiled.push(compile_field(child, Some(&spec.name), seen)?);
            }
            let kind = FieldKind::Group { fields: compiled };
            return Ok(FieldDescriptor {
                name,
                label: spec.label.clone(),
                kind,
                follows: spec.follows.clone(),
            });
        }
    };

    if spec.follows.is_some() && !matches!(kind, FieldKind::Regex { .. }) {
        return Err(SchemaError::Parse(format!(
            "field {} declares `follows` but is not a regex field",
            name
        )));
    }

    seen.insert(name.clone());
    Ok(FieldDescriptor {
        name,
        label: spec.label.clone(),
        kind,
        follows: spec.follows.clone(),
    })
}

fn compile_pattern(field: &str, pattern: &str) -> Result<Regex, SchemaError> {
    Regex::new(pattern).map_err(|source| SchemaError::InvalidPattern {
        field: field.to_string(),
        source,
    })
}

/// Builds sequential chains from `follows` links and rejects cycles.
fn build_chains(
    fields: &[FieldDescriptor],
    names: &HashSet<String>,
) -> Result<Vec<Chain>, SchemaError> {
    let top_level: HashSet<&str> = fields.iter().map(|f| f.name.as_str()).collect();

    // anchor -> follower; each field may have at most one direct follower.
    let mut follower_of: HashMap<&str, &str> = HashMap::new();
    for field in fields {
        if let Some(anchor) = &field.follows {
            // Only top-level fields can anchor a link; a group child is a
            // known name but never resolved in chain order.
            if !top_level.contains(anchor.as_str()) {
                if names.contains(anchor) {
                    return Err(SchemaError::Parse(format!(
                        "field {} follows {}, which is inside a group",
                        field.name, anchor
                    )));
                }
                return Err(SchemaError::UnknownBase {
                    field: field.name.clone(),
                    base: anchor.clone(),
                });
            }
            if follower_of.insert(anchor.as_str(), field.name.as_str()).is_some() {
                return Err(SchemaError::Parse(format!(
                    "field {} is followed by more than one field",
                    anchor
                )));
            }
        }
    }

    let has_follows: HashSet<&str> = fields
        .iter()
        .filter(|f| f.follows.is_some())
        .map(|f| f.name.as_str())
        .collect();

    let mut chains = Vec::new();
    let mut chained: HashSet<&str> = HashSet::new();
    for field in fields {
        // A chain starts at a field that is followed but does not itself
        // follow anything.
        if !follower_of.contains_key(field.name.as_str()) || has_follows.contains(field.name.as_str())
        {
            continue;
        }
        let mut followers = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(&field.name);
        let mut cursor = field.name.as_str();
        while let Some(&next) = follower_of.get(cursor) {
            if !visited.insert(next) {
                return Err(SchemaError::ChainCycle(field.name.clone()));
            }
            followers.push(next.to_string());
            chained.insert(next);
            cursor = next;
        }
        chains.push(Chain {
            anchor: field.name.clone(),
            followers,
        });
    }

    // A follows link never reached from an anchor means the links loop back
    // on themselves with no entry point.
    for field in fields {
        if field.follows.is_some() && !chained.contains(field.name.as_str()) {
            return Err(SchemaError::ChainCycle(field.name.clone()));
        }
    }

    Ok(chains)
}

fn compile_table(spec: &spec::TableSpec) -> Result<TableSchema, SchemaError> {
    let header = compile_pattern("table.header", &spec.header_pattern)?;
    let end = match &spec.end_pattern {
        Some(p) => Some(compile_pattern("table.end", p)?),
        None => None,
    };
    let mut columns = Vec::with_capacity(spec.columns.len());
    for col in &spec.columns {
        columns.push(ColumnDescriptor {
            name: col.name.clone(),
            label: col.label.clone(),
            pattern: compile_pattern(&col.name, &col.pattern)?,
            alternative_labels: col.alternative_labels.clone(),
        });
    }
    Ok(TableSchema {
        header,
        end,
        columns,
    })
}

fn compile_rule(
    spec: &RuleSpec,
    fields: &HashSet<String>,
    table: Option<&TableSchema>,
) -> Result<Rule, SchemaError> {
    let check_field = |name: &str| -> Result<(), SchemaError> {
        if fields.contains(name) {
            Ok(())
        } else {
            Err(SchemaError::UnknownRuleField(name.to_string()))
        }
    };
    let check_column = |name: &str| -> Result<(), SchemaError> {
        let known = table
            .map(|t| t.columns.iter().any(|c| c.name == name))
            .unwrap_or(false);
        if known {
            Ok(())
        } else {
            Err(SchemaError::UnknownRuleField(name.to_string()))
        }
    };

    Ok(match spec {
        RuleSpec::Format { field, pattern } => {
            check_field(field)?;
            // Anchored: a format rule must match the whole value.
            Rule::Format {
                field: field.clone(),
                pattern: compile_pattern(field, &format!("^(?:{})$", pattern))?,
            }
        }
        RuleSpec::FixedValue { field, expected } => {
            check_field(field)?;
            Rule::FixedValue {
                field: field.clone(),
                expected: expected.clone(),
            }
        }
        RuleSpec::DateOrder {
            earlier,
            later,
            format,
        } => {
            check_field(earlier)?;
            check_field(later)?;
            Rule::DateOrder {
                earlier: earlier.clone(),
                later: later.clone(),
                format: format.clone().unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string()),
            }
        }
        RuleSpec::RowArithmetic {
            quantity,
            unit_cost,
            cost,
        } => {
            check_column(quantity)?;
            check_column(unit_cost)?;
            check_column(cost)?;
            Rule::RowArithmetic {
                quantity: quantity.clone(),
                unit_cost: unit_cost.clone(),
                cost: cost.clone(),
            }
        }
        RuleSpec::Totals {
            subtotal,
            tax,
            total,
            tax_rate,
            cost_column,
        } => {
            check_field(subtotal)?;
            check_field(tax)?;
            check_field(total)?;
            check_column(cost_column)?;
            Rule::Totals {
                subtotal: subtotal.clone(),
                tax: tax.clone(),
                total: total.clone(),
                tax_rate: *tax_rate,
                cost_column: cost_column.clone(),
            }
        }
        RuleSpec::MatchesInput { field } => {
            check_field(field)?;
            Rule::MatchesInput {
                field: field.clone(),
            }
        }
        RuleSpec::Required { field } => {
            check_field(field)?;
            Rule::Required {
                field: field.clone(),
            }
        }
    })
}
