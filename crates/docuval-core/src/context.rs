//! Extraction context.
//!
//! Everything the field resolver can draw on for one document: the full
//! plain text, rendered page images for region crops, the parsed XML tree
//! for electronic documents, and caller-supplied reference values used by
//! `matches_input` rules.

use image::DynamicImage;
use std::collections::HashMap;

use crate::error::{DocuvalError, Result};
use crate::xml::XmlDocument;

/// Inputs available while resolving one document.
#[derive(Default)]
pub struct ExtractionContext {
    /// Full plain text of the document (PDF text layer, OCR output, or a
    /// flattened rendering of the XML).
    pub text: String,
    /// Rendered page images, in page order. Empty when the source cannot be
    /// rasterized; region fields then resolve as missing.
    pub pages: Vec<DynamicImage>,
    /// Parsed XML tree for electronic documents.
    pub xml: Option<XmlDocument>,
    /// Reference values supplied by the caller (order number from the
    /// purchasing system etc.), checked by `matches_input` rules.
    pub reference_values: HashMap<String, String>,
}

impl ExtractionContext {
    pub fn from_text(text: impl Into<String>) -> Self {
        ExtractionContext {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_pages(mut self, pages: Vec<DynamicImage>) -> Self {
        self.pages = pages;
        self
    }

    pub fn with_xml(mut self, xml: XmlDocument) -> Self {
        self.xml = Some(xml);
        self
    }

    pub fn with_reference_value(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.reference_values.insert(field.into(), value.into());
        self
    }

    /// Rejects a context with no usable input at all. A document with text
    /// but no pages (or vice versa) is still processable.
    pub fn ensure_usable(&self) -> Result<()> {
        if self.text.trim().is_empty() && self.pages.is_empty() && self.xml.is_none() {
            return Err(DocuvalError::NoInput(
                "document has no text, no pages and no XML".to_string(),
            ));
        }
        Ok(())
    }
}
