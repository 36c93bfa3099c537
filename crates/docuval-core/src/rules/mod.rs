//! Business-rule validation.
//!
//! Rules are data: each schema carries a list of [`crate::schema::Rule`]s
//! and the engine executes all of them over the extracted fields and table.
//! Validation never short-circuits; a document with five problems reports
//! five problems. A missing field is only a validation failure when a
//! `required` rule says so; every other rule skips fields that were not
//! extracted.

pub mod arithmetic;
pub mod dates;
pub mod format;

use serde::Serialize;
use std::collections::HashMap;

use crate::extract::{missing_fields, ExtractedTable, FieldMap};
use crate::schema::{DocumentSchema, Rule};

/// One failed check, attributed to a field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        FieldError {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// The outcome of running every rule of a schema.
#[derive(Debug, Default, Serialize)]
pub struct ValidationOutcome {
    /// All failed checks, in rule order.
    pub field_errors: Vec<FieldError>,
    /// Fields that could not be extracted. Informational unless a
    /// `required` rule also fired.
    pub missing_fields: Vec<String>,
}

impl ValidationOutcome {
    /// A document is valid exactly when no check failed.
    pub fn is_valid(&self) -> bool {
        self.field_errors.is_empty()
    }
}

/// Executes a schema's rules.
pub struct RuleEngine<'a> {
    schema: &'a DocumentSchema,
}

impl<'a> RuleEngine<'a> {
    pub fn new(schema: &'a DocumentSchema) -> Self {
        RuleEngine { schema }
    }

    /// Runs every rule. `reference_values` carries caller-supplied values
    /// for `matches_input` rules.
    pub fn validate(
        &self,
        fields: &FieldMap,
        table: &ExtractedTable,
        reference_values: &HashMap<String, String>,
    ) -> ValidationOutcome {
        let mut outcome = ValidationOutcome {
            field_errors: Vec::new(),
            missing_fields: missing_fields(fields),
        };

        // Problems found while reconstructing the table (missing header,
        // dropped rows) are data problems of the document, not of the engine.
        for reason in &table.errors {
            outcome
                .field_errors
                .push(FieldError::new("table", reason.clone()));
        }

        for rule in &self.schema.rules {
            let errors = match rule {
                Rule::Format { field, pattern } => format::check_format(fields, field, pattern),
                Rule::FixedValue { field, expected } => {
                    format::check_fixed_value(fields, field, expected)
                }
                Rule::MatchesInput { field } => {
                    format::check_matches_input(fields, field, reference_values)
                }
                Rule::Required { field } => format::check_required(fields, field),
                Rule::DateOrder {
                    earlier,
                    later,
                    format,
                } => dates::check_date_order(fields, earlier, later, format),
                Rule::RowArithmetic {
                    quantity,
                    unit_cost,
                    cost,
                } => arithmetic::check_row_arithmetic(table, quantity, unit_cost, cost),
                Rule::Totals {
                    subtotal,
                    tax,
                    total,
                    tax_rate,
                    cost_column,
                } => arithmetic::check_totals(fields, table, subtotal, tax, total, *tax_rate, cost_column),
            };
            outcome.field_errors.extend(errors);
        }

        outcome
    }
}

/// Looks up an extracted value by field name.
pub(crate) fn value_of<'a>(fields: &'a FieldMap, name: &str) -> Option<&'a str> {
    fields.get(name).and_then(|f| f.value.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ExtractedField, FieldSource};
    use crate::schema::spec::DocumentSpec;
    use crate::schema::DocumentSchema;
    use pretty_assertions::assert_eq;

    fn schema() -> DocumentSchema {
        let spec: DocumentSpec = serde_json::from_str(
            r#"{
                "fields": [
                    {"name": "order_number", "kind": "regex", "pattern": "order\\s+(\\d+)"},
                    {"name": "company", "kind": "regex", "pattern": "company\\s+([^\\n]+)"},
                    {"name": "hes", "kind": "regex", "pattern": "hes\\s+(\\d+)"}
                ],
                "rules": [
                    {"type": "required", "field": "order_number"},
                    {"type": "format", "field": "order_number", "pattern": "34\\d{5}"},
                    {"type": "fixed_value", "field": "company",
                     "expected": "ENAP SIPETROL S.A. ENAP SIPEC"},
                    {"type": "format", "field": "hes", "pattern": "812\\d{5}"}
                ]
            }"#,
        )
        .unwrap();
        DocumentSchema::compile("test", spec).unwrap()
    }

    fn field(name: &str, value: Option<&str>) -> (String, ExtractedField) {
        (
            name.to_string(),
            ExtractedField {
                name: name.to_string(),
                label: String::new(),
                value: value.map(str::to_string),
                confidence: if value.is_some() { 0.9 } else { 0.0 },
                region: None,
                source: FieldSource::Text,
            },
        )
    }

    #[test]
    fn test_all_rules_run_no_short_circuit() {
        let schema = schema();
        let fields: FieldMap = [
            field("order_number", Some("9999")),
            field("company", Some("OTRA EMPRESA")),
            field("hes", Some("111")),
        ]
        .into();

        let outcome =
            RuleEngine::new(&schema).validate(&fields, &ExtractedTable::default(), &HashMap::new());

        // Three independent failures, all reported.
        assert_eq!(outcome.field_errors.len(), 3);
        assert!(!outcome.is_valid());
    }

    #[test]
    fn test_missing_field_skips_non_required_rules() {
        let schema = schema();
        let fields: FieldMap = [
            field("order_number", Some("3412345")),
            field("company", None),
            field("hes", None),
        ]
        .into();

        let outcome =
            RuleEngine::new(&schema).validate(&fields, &ExtractedTable::default(), &HashMap::new());

        // fixed_value and format skip missing fields; only the missing list
        // records them. order_number is present and valid.
        assert!(outcome.is_valid());
        assert_eq!(outcome.missing_fields, vec!["company", "hes"]);
    }

    #[test]
    fn test_required_field_missing_fails() {
        let schema = schema();
        let fields: FieldMap = [
            field("order_number", None),
            field("company", Some("ENAP SIPETROL S.A. ENAP SIPEC")),
            field("hes", Some("81212345")),
        ]
        .into();

        let outcome =
            RuleEngine::new(&schema).validate(&fields, &ExtractedTable::default(), &HashMap::new());

        assert_eq!(outcome.field_errors.len(), 1);
        assert_eq!(outcome.field_errors[0].field, "order_number");
    }

    #[test]
    fn test_malformed_table_rows_become_field_errors() {
        let schema = schema();
        let fields: FieldMap = [
            field("order_number", Some("3412345")),
            field("company", Some("ENAP SIPETROL S.A. ENAP SIPEC")),
            field("hes", Some("81212345")),
        ]
        .into();
        let table = ExtractedTable {
            rows: Vec::new(),
            errors: vec!["malformed row: 3 cells, expected 5: x".to_string()],
        };

        let outcome = RuleEngine::new(&schema).validate(&fields, &table, &HashMap::new());
        assert!(!outcome.is_valid());
        assert_eq!(outcome.field_errors[0].field, "table");
    }
}
