//! Monetary arithmetic checks.
//!
//! All money math uses [`Decimal`]; comparisons allow a one-cent tolerance
//! because OCR'd documents routinely round line items differently than the
//! summary block.

use rust_decimal::Decimal;
use std::str::FromStr;

use super::{value_of, FieldError};
use crate::extract::{ExtractedTable, FieldMap};

/// Accepted absolute difference for monetary comparisons.
pub fn tolerance() -> Decimal {
    Decimal::new(1, 2)
}

/// Parses a monetary amount, tolerating currency markers and thousands
/// separators ("USD 1,230.00", "$230.00").
pub fn parse_amount(value: &str) -> Option<Decimal> {
    let cleaned: String = value
        .trim()
        .trim_start_matches("USD")
        .trim_start_matches('$')
        .replace(',', "")
        .trim()
        .to_string();
    Decimal::from_str(&cleaned).ok()
}

/// Per row, `quantity * unit_cost` must equal `cost` within the tolerance.
/// A row with an unmatched or unparseable cell is reported and skipped.
pub fn check_row_arithmetic(
    table: &ExtractedTable,
    quantity: &str,
    unit_cost: &str,
    cost: &str,
) -> Vec<FieldError> {
    let mut errors = Vec::new();

    for (i, row) in table.rows.iter().enumerate() {
        let row_number = i + 1;

        let mut cell = |column: &str| -> Option<Decimal> {
            match row.get(column).and_then(|c| c.as_deref()) {
                Some(raw) => match parse_amount(raw) {
                    Some(amount) => Some(amount),
                    None => {
                        errors.push(FieldError::new(
                            column,
                            format!("row {}: '{}' is not a number", row_number, raw),
                        ));
                        None
                    }
                },
                None => {
                    errors.push(FieldError::new(
                        column,
                        format!("row {}: no value", row_number),
                    ));
                    None
                }
            }
        };

        let (qty, unit, total) = (cell(quantity), cell(unit_cost), cell(cost));
        let (Some(qty), Some(unit), Some(total)) = (qty, unit, total) else {
            continue;
        };

        let expected = qty * unit;
        if (expected - total).abs() > tolerance() {
            errors.push(FieldError::new(
                cost,
                format!(
                    "row {}: {} x {} = {}, document says {}",
                    row_number, qty, unit, expected, total
                ),
            ));
        }
    }

    errors
}

/// Checks the summary block: the cost column must sum to the subtotal, the
/// tax must be `subtotal * tax_rate`, and the total must be their sum. Each
/// check runs independently so one wrong figure yields one error.
pub fn check_totals(
    fields: &FieldMap,
    table: &ExtractedTable,
    subtotal: &str,
    tax: &str,
    total: &str,
    tax_rate: Decimal,
    cost_column: &str,
) -> Vec<FieldError> {
    let mut errors = Vec::new();

    let mut amount = |name: &str| -> Option<Decimal> {
        let value = value_of(fields, name)?;
        match parse_amount(value) {
            Some(amount) => Some(amount),
            None => {
                errors.push(FieldError::new(
                    name,
                    format!("'{}' is not a number", value.trim()),
                ));
                None
            }
        }
    };

    let subtotal_value = amount(subtotal);
    let tax_value = amount(tax);
    let total_value = amount(total);

    if let Some(subtotal_value) = subtotal_value {
        // Rows with unparseable cells are reported by the row check; the
        // sum uses what remains.
        if !table.rows.is_empty() {
            let row_sum: Decimal = table
                .column(cost_column)
                .filter_map(parse_amount)
                .sum();
            if (row_sum - subtotal_value).abs() > tolerance() {
                errors.push(FieldError::new(
                    subtotal,
                    format!("line items sum to {}, document says {}", row_sum, subtotal_value),
                ));
            }
        }

        if let Some(tax_value) = tax_value {
            let expected_tax = (subtotal_value * tax_rate / Decimal::new(100, 0)).round_dp(2);
            if (expected_tax - tax_value).abs() > tolerance() {
                errors.push(FieldError::new(
                    tax,
                    format!(
                        "{}% of {} is {}, document says {}",
                        tax_rate, subtotal_value, expected_tax, tax_value
                    ),
                ));
            }

            if let Some(total_value) = total_value {
                let expected_total = subtotal_value + tax_value;
                if (expected_total - total_value).abs() > tolerance() {
                    errors.push(FieldError::new(
                        total,
                        format!(
                            "{} + {} = {}, document says {}",
                            subtotal_value, tax_value, expected_total, total_value
                        ),
                    ));
                }
            }
        }
    }

    errors
}
