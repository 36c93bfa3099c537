//! Field and table extraction.
//!
//! The resolver walks a schema's fields in declaration order and produces an
//! [`ExtractedField`] per field, present or not. Extraction never fails a
//! document on its own: unmatched fields are recorded as missing and the
//! validation stage decides what that means.

pub mod chain;
pub mod resolver;
pub mod table;

pub use resolver::FieldResolver;
pub use table::{ExtractedTable, TableExtractor, TableRow};

use serde::Serialize;
use std::collections::BTreeMap;

use crate::schema::Region;

/// Where a field value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    /// Regex over the document text.
    Text,
    /// OCR of a page region.
    Page,
    /// Element of the XML tree.
    Xml,
}

/// One resolved field, present or missing.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedField {
    pub name: String,
    pub label: String,
    /// `None` when the field could not be located.
    pub value: Option<String>,
    /// Heuristic score in `[0, 1]`; 0 for missing fields.
    pub confidence: f32,
    /// The page region the value was read from, for region-based fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
    pub source: FieldSource,
}

impl ExtractedField {
    pub fn missing(name: &str, label: &str, source: FieldSource) -> Self {
        ExtractedField {
            name: name.to_string(),
            label: label.to_string(),
            value: None,
            confidence: 0.0,
            region: None,
            source,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.value.is_none()
    }
}

/// Resolved fields keyed by name, group children under `"<group>.<child>"`.
pub type FieldMap = BTreeMap<String, ExtractedField>;

/// Names of fields that resolved to nothing, in sorted order.
pub fn missing_fields(fields: &FieldMap) -> Vec<String> {
    fields
        .values()
        .filter(|f| f.is_missing())
        .map(|f| f.name.clone())
        .collect()
}

/// Confidence heuristic for text-matched values: longer captures are much
/// less likely to be accidental.
pub fn text_confidence(value: &str) -> f32 {
    if value.len() > 3 { 0.9 } else { 0.5 }
}

/// Confidence for OCR-sourced values.
pub const OCR_CONFIDENCE: f32 = 0.8;

/// Confidence for values read from the XML tree.
pub const XML_CONFIDENCE: f32 = 1.0;

/// Collapses runs of whitespace (OCR output is full of them) to single
/// spaces and trims the ends.
pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
