//! On-disk schema format.
//!
//! Schemas are declarative JSON: one entry per document type, each with an
//! ordered field list, an optional table layout, and a list of validation
//! rules. These types are the raw serde representation; they are compiled
//! into [`super::DocumentSchema`] (with validated references and compiled
//! patterns) before any document is processed.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Offset, Region};

/// A whole schema file: document type name -> document spec.
///
/// `BTreeMap` keeps `schema list` output stable.
pub type SchemaFile = BTreeMap<String, DocumentSpec>;

/// Raw specification of one document type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSpec {
    /// Human-readable name of the document type.
    #[serde(default)]
    pub label: String,

    /// Ordered field descriptors. Order matters: `relative` fields may only
    /// reference earlier fields.
    pub fields: Vec<FieldSpec>,

    /// Optional line-item table layout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<TableSpec>,

    /// Declarative validation rules, executed after extraction.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleSpec>,
}

/// Raw specification of a single field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name; becomes the key in the extracted-field map.
    pub name: String,

    /// Display label.
    #[serde(default)]
    pub label: String,

    /// How the field's value is located.
    #[serde(flatten)]
    pub kind: FieldKindSpec,

    /// Name of the field this one follows in a sequential chain. Only valid
    /// for `regex` fields; the chained field is searched in the text after
    /// the previous link's match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follows: Option<String>,
}

/// Extraction strategy, tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKindSpec {
    /// Search a pattern over the document's full text; the value is the
    /// first capture group.
    Regex { pattern: String },

    /// Crop a fixed rectangle from a page image and OCR it.
    Region {
        region: Region,
        /// Zero-based page index (default: first page).
        #[serde(default)]
        page: usize,
    },

    /// Crop a rectangle offset from another field's resolved region.
    Relative { relative_to: String, offset: Offset },

    /// Look up an element in the parsed XML tree (slash-separated path).
    Xpath { xpath: String },

    /// Value must be one of an allowed set of strings.
    Enumeration { values: Vec<String> },

    /// Nested group of sub-fields (e.g. a signature block); results are
    /// stored under `"<group>.<child>"` keys.
    Group { fields: Vec<FieldSpec> },
}

/// Raw table layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSpec {
    /// Pattern identifying the header line.
    pub header_pattern: String,

    /// Pattern identifying the end of the table (summary line etc.).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_pattern: Option<String>,

    /// Ordered column descriptors; a row must have exactly this many cells.
    pub columns: Vec<ColumnSpec>,
}

/// Raw column descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,

    #[serde(default)]
    pub label: String,

    /// Pattern applied to the cell; an unmatched cell yields `null`.
    pub pattern: String,

    /// Alternative header labels for this column.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternative_labels: Vec<String>,
}

/// Declarative validation rule, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleSpec {
    /// The field value must fully match a fixed pattern.
    Format { field: String, pattern: String },

    /// The trimmed field value must equal one exact expected string.
    FixedValue { field: String, expected: String },

    /// Both dates must parse under `format` and `later` must not precede
    /// `earlier`.
    DateOrder {
        earlier: String,
        later: String,
        /// strftime format; defaults to `%d/%m/%Y`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },

    /// Per table row, `quantity * unit_cost` must equal `cost` within the
    /// configured tolerance.
    RowArithmetic {
        quantity: String,
        unit_cost: String,
        cost: String,
    },

    /// The table row sum must equal `subtotal`, `tax` must equal
    /// `subtotal * tax_rate`, and `total` must equal `subtotal + tax`.
    Totals {
        subtotal: String,
        tax: String,
        total: String,
        /// Tax rate in percent (e.g. 15.0).
        tax_rate: Decimal,
        /// Table column summed into the subtotal.
        cost_column: String,
    },

    /// A caller-supplied reference value must equal the extracted value
    /// verbatim.
    MatchesInput { field: String },

    /// The field must have been extracted; a missing required field rejects
    /// the document.
    Required { field: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field_kinds() {
        let json = r#"[
            {"name": "order_number", "kind": "regex", "pattern": "(\\d+)"},
            {"name": "logo", "kind": "region", "region": {"left": 50.0, "top": 50.0, "width": 90.0, "height": 90.0}},
            {"name": "date", "kind": "relative", "relative_to": "order_number", "offset": {"x": 0.0, "y": 22.5}},
            {"name": "country", "kind": "xpath", "xpath": "client/country"},
            {"name": "role", "kind": "enumeration", "values": ["Financial Analyst"]},
            {"name": "signatures", "kind": "group", "fields": [
                {"name": "person_name", "kind": "regex", "pattern": "([A-Z][a-z]+)"}
            ]}
        ]"#;

        let fields: Vec<FieldSpec> = serde_json::from_str(json).unwrap();
        assert_eq!(fields.len(), 6);
        assert!(matches!(fields[0].kind, FieldKindSpec::Regex { .. }));
        assert!(matches!(fields[2].kind, FieldKindSpec::Relative { .. }));
        assert!(matches!(fields[5].kind, FieldKindSpec::Group { .. }));
    }

    #[test]
    fn test_parse_rules() {
        let json = r#"[
            {"type": "format", "field": "order_number", "pattern": "34\\d{5}"},
            {"type": "date_order", "earlier": "receiver_date", "later": "end_date"},
            {"type": "totals", "subtotal": "subtotal", "tax": "tax", "total": "total_due",
             "tax_rate": "15.0", "cost_column": "service_cost"}
        ]"#;

        let rules: Vec<RuleSpec> = serde_json::from_str(json).unwrap();
        assert_eq!(rules.len(), 3);
        match &rules[2] {
            RuleSpec::Totals { tax_rate, .. } => {
                assert_eq!(*tax_rate, Decimal::new(150, 1));
            }
            other => panic!("unexpected rule: {:?}", other),
        }
    }
}
