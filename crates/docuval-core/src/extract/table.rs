//! Line-item table reconstruction.
//!
//! Service tables arrive as plain text lines: a header, rows on single or
//! consecutive lines, and a summary section ("Subtotal ...") that ends the
//! table. Cells are separated either by pipes or by runs of two and more
//! spaces, and accumulate in a row buffer until the schema's column count
//! is reached; a blank line flushes the buffer early. A buffer flushed with
//! the wrong cell count is dropped and reported; the rest of the table
//! still counts.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::schema::TableSchema;

lazy_static! {
    /// Cell separator: a pipe, or two and more consecutive spaces.
    static ref CELL_SEPARATOR: Regex = Regex::new(r"\s*\|\s*|\s{2,}").unwrap();
}

/// One reconstructed row: column name -> cell value. A cell that failed its
/// column pattern is `None`.
pub type TableRow = BTreeMap<String, Option<String>>;

/// A reconstructed table plus the problems found along the way.
#[derive(Debug, Default, Serialize)]
pub struct ExtractedTable {
    pub rows: Vec<TableRow>,
    /// A missing header and rows that could not be reconstructed. These
    /// feed the document's field errors.
    pub errors: Vec<String>,
}

impl ExtractedTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column across all rows, skipping unmatched cells.
    pub fn column<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> {
        self.rows
            .iter()
            .filter_map(move |row| row.get(name).and_then(|c| c.as_deref()))
    }
}

/// Reconstructs a schema's line-item table from document text.
pub struct TableExtractor<'a> {
    schema: &'a TableSchema,
}

impl<'a> TableExtractor<'a> {
    pub fn new(schema: &'a TableSchema) -> Self {
        TableExtractor { schema }
    }

    /// Scans the text for the table and reconstructs its rows. A text
    /// without the header line yields zero rows and a header-not-found
    /// marker in `errors`.
    pub fn extract(&self, text: &str) -> ExtractedTable {
        let mut table = ExtractedTable::default();
        let mut in_table = false;
        let expected = self.schema.columns.len();

        // Cells of the row currently being assembled; a row may spread over
        // consecutive lines.
        let mut buffer: Vec<String> = Vec::new();

        for line in text.lines() {
            let trimmed = line.trim();

            if !in_table {
                if self.schema.header.is_match(trimmed) {
                    in_table = true;
                }
                continue;
            }

            if trimmed.is_empty() {
                // A blank line ends the current row, not the table.
                self.flush(&mut buffer, &mut table);
                continue;
            }

            if let Some(end) = &self.schema.end {
                if end.is_match(trimmed) {
                    break;
                }
            }
            // A second header line (alternative labels) is not a row.
            if self.is_header_continuation(trimmed) {
                continue;
            }

            let cells: Vec<&str> = CELL_SEPARATOR
                .split(trimmed)
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .collect();

            // A line carrying a complete row stands on its own; whatever was
            // buffered before it can never become one.
            if cells.len() == expected && !buffer.is_empty() {
                self.flush(&mut buffer, &mut table);
            }
            buffer.extend(cells.into_iter().map(str::to_string));
            if buffer.len() >= expected {
                self.flush(&mut buffer, &mut table);
            }
        }
        self.flush(&mut buffer, &mut table);

        if !in_table {
            table.errors.push("table header not found".to_string());
        }

        table
    }

    /// Turns the buffered cells into a row, or reports them when the count
    /// is off.
    fn flush(&self, buffer: &mut Vec<String>, table: &mut ExtractedTable) {
        if buffer.is_empty() {
            return;
        }
        let cells = std::mem::take(buffer);
        let expected = self.schema.columns.len();

        if cells.len() != expected {
            debug!(cells = cells.len(), expected, "dropping malformed table row");
            table.errors.push(format!(
                "malformed row: {} cells, expected {}: {}",
                cells.len(),
                expected,
                cells.join(" | ")
            ));
            return;
        }

        let mut row = TableRow::new();
        for (col, cell) in self.schema.columns.iter().zip(&cells) {
            let value = col
                .pattern
                .find(cell)
                .map(|m| m.as_str().trim().to_string());
            row.insert(col.name.clone(), value);
        }
        table.rows.push(row);
    }

    fn is_header_continuation(&self, line: &str) -> bool {
        // Two and more label hits: a data row may mention one column label,
        // a repeated or translated header mentions most of them.
        let hits = self
            .schema
            .columns
            .iter()
            .filter(|col| {
                !col.label.is_empty() && line.contains(col.label.as_str())
                    || col
                        .alternative_labels
                        .iter()
                        .any(|alt| line.contains(alt.as_str()))
            })
            .count();
        hits >= 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::registry::SchemaRegistry;
    use pretty_assertions::assert_eq;

    fn invoice_table_text() -> &'static str {
        "Factura N°: 1123456\n\
         Código  Descripción del Servicio  Cantidad  Costo Unitario  Costo\n\
         S001    Perforación de pozo       2         100.00          200.00\n\
         S002    Inspección técnica        1         50.00           50.00\n\
         Subtotal: $250.00\n\
         Impuesto: $37.50\n"
    }

    fn extract(text: &str) -> ExtractedTable {
        let registry = SchemaRegistry::builtin().unwrap();
        let schema = registry.get("invoice").unwrap();
        TableExtractor::new(schema.table.as_ref().unwrap()).extract(text)
    }

    #[test]
    fn test_reconstructs_rows() {
        let table = extract(invoice_table_text());
        assert_eq!(table.rows.len(), 2);
        assert!(table.errors.is_empty());

        let first = &table.rows[0];
        assert_eq!(first["service_code"].as_deref(), Some("S001"));
        assert_eq!(first["service_quantity"].as_deref(), Some("2"));
        assert_eq!(first["service_unit_cost"].as_deref(), Some("100.00"));
        assert_eq!(first["service_cost"].as_deref(), Some("200.00"));
    }

    #[test]
    fn test_summary_line_ends_table() {
        let table = extract(invoice_table_text());
        // "Subtotal: $250.00" must not be parsed as a row.
        assert_eq!(table.column("service_code").count(), 2);
    }

    #[test]
    fn test_blank_line_does_not_end_table() {
        // OCR output routinely inserts blank lines between rows.
        let text = "Código  Descripción  Cantidad  Costo Unitario  Costo\n\
                    S001    Perforación de pozo  2  100.00  200.00\n\
                    \n\
                    S002    Inspección técnica  1  50.00  50.00\n\
                    Subtotal: $250.00\n";
        let table = extract(text);
        assert_eq!(table.rows.len(), 2);
        assert!(table.errors.is_empty());
        assert_eq!(table.rows[1]["service_code"].as_deref(), Some("S002"));
    }

    #[test]
    fn test_row_spread_over_consecutive_lines() {
        // Cells accumulate until the column count is reached.
        let text = "Código  Descripción  Cantidad  Costo Unitario  Costo\n\
                    S001    Perforación de pozo\n\
                    2       100.00  200.00\n";
        let table = extract(text);
        assert_eq!(table.rows.len(), 1);
        assert!(table.errors.is_empty());
        let row = &table.rows[0];
        assert_eq!(row["service_description"].as_deref(), Some("Perforación de pozo"));
        assert_eq!(row["service_cost"].as_deref(), Some("200.00"));
    }

    #[test]
    fn test_malformed_row_dropped_and_reported() {
        let text = "Código  Descripción  Cantidad  Costo Unitario  Costo\n\
                    S001    Perforación de pozo  2  100.00  200.00\n\
                    esta línea no es una fila\n\
                    S002    Inspección  1  50.00  50.00\n";
        let table = extract(text);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.errors.len(), 1);
        assert!(table.errors[0].contains("expected 5"));
    }

    #[test]
    fn test_unmatched_cell_is_null() {
        // Quantity cell is not numeric; the cell is null, the row survives.
        let text = "Código  Descripción  Cantidad  Costo Unitario  Costo\n\
                    S001    Perforación  dos  100.00  200.00\n";
        let table = extract(text);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0]["service_quantity"], None);
        assert_eq!(table.rows[0]["service_cost"].as_deref(), Some("200.00"));
    }

    #[test]
    fn test_missing_header_reported() {
        let table = extract("plain text without any table");
        assert!(table.rows.is_empty());
        assert_eq!(table.errors, vec!["table header not found"]);
    }

    #[test]
    fn test_pipe_separated_rows() {
        let text = "Código | Descripción | Cantidad | Costo Unitario | Costo\n\
                    S001 | Perforación de pozo | 2 | 100.00 | 200.00\n";
        let table = extract(text);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0]["service_cost"].as_deref(), Some("200.00"));
    }
}
