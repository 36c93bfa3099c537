//! Schema-driven field resolution.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use super::{
    chain, collapse_whitespace, text_confidence, ExtractedField, FieldMap, FieldSource,
    OCR_CONFIDENCE, XML_CONFIDENCE,
};
use crate::collaborators::Recognizer;
use crate::context::ExtractionContext;
use crate::schema::{DocumentSchema, FieldDescriptor, FieldKind, Region};

/// Resolves every field of a schema against one document.
///
/// Resolution is total: each field yields an [`ExtractedField`], missing or
/// not, and nothing here rejects the document. Fields resolve in declaration
/// order so that `relative` fields can see their base's region and chains
/// can walk the text forward.
pub struct FieldResolver<'a> {
    schema: &'a DocumentSchema,
    ocr: Option<&'a Recognizer>,
}

impl<'a> FieldResolver<'a> {
    pub fn new(schema: &'a DocumentSchema) -> Self {
        FieldResolver { schema, ocr: None }
    }

    pub fn with_ocr(mut self, ocr: &'a Recognizer) -> Self {
        self.ocr = Some(ocr);
        self
    }

    /// Resolves all fields. Group children land under `"<group>.<child>"`
    /// keys; chained fields are handled by their chain.
    pub fn resolve(&self, ctx: &ExtractionContext) -> FieldMap {
        let followers: HashSet<&str> = self
            .schema
            .chains
            .iter()
            .flat_map(|c| c.followers.iter().map(String::as_str))
            .collect();
        let index: HashMap<&str, &FieldDescriptor> = self
            .schema
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f))
            .collect();

        let mut results = FieldMap::new();
        self.resolve_all(&self.schema.fields, ctx, &followers, &index, &mut results);
        results
    }

    fn resolve_all(
        &self,
        fields: &[FieldDescriptor],
        ctx: &ExtractionContext,
        followers: &HashSet<&str>,
        index: &HashMap<&str, &FieldDescriptor>,
        results: &mut FieldMap,
    ) {
        for field in fields {
            if followers.contains(field.name.as_str()) {
                continue;
            }
            if let Some(chain) = self.schema.chains.iter().find(|c| c.anchor == field.name) {
                chain::resolve_chain(&ctx.text, chain, index, results);
                continue;
            }
            if let FieldKind::Group { fields: children } = &field.kind {
                self.resolve_all(children, ctx, followers, index, results);
                continue;
            }
            let extracted = self.resolve_field(field, ctx, results);
            results.insert(field.name.clone(), extracted);
        }
    }

    fn resolve_field(
        &self,
        field: &FieldDescriptor,
        ctx: &ExtractionContext,
        resolved: &FieldMap,
    ) -> ExtractedField {
        match &field.kind {
            FieldKind::Regex { pattern } => self.match_text(field, pattern, &ctx.text),
            FieldKind::Enumeration { pattern, .. } => self.match_text(field, pattern, &ctx.text),
            FieldKind::Region { region, page } => self.read_region(field, ctx, region, *page),
            FieldKind::Relative { base, offset } => {
                // Bases are declared earlier, so their region (if any) is
                // already resolved.
                match resolved.get(base).and_then(|f| f.region) {
                    Some(base_region) => {
                        let region = base_region.translated(offset);
                        self.read_region(field, ctx, &region, 0)
                    }
                    None => {
                        debug!(field = %field.name, base = %base, "base field has no region");
                        ExtractedField::missing(&field.name, &field.label, FieldSource::Page)
                    }
                }
            }
            FieldKind::Xpath { path } => match &ctx.xml {
                Some(xml) => match xml.find(path) {
                    Some(element) if !element.text.trim().is_empty() => ExtractedField {
                        name: field.name.clone(),
                        label: field.label.clone(),
                        value: Some(element.text.trim().to_string()),
                        confidence: XML_CONFIDENCE,
                        region: None,
                        source: FieldSource::Xml,
                    },
                    _ => ExtractedField::missing(&field.name, &field.label, FieldSource::Xml),
                },
                None => ExtractedField::missing(&field.name, &field.label, FieldSource::Xml),
            },
            // Groups are flattened by the caller.
            FieldKind::Group { .. } => {
                ExtractedField::missing(&field.name, &field.label, FieldSource::Text)
            }
        }
    }

    fn match_text(&self, field: &FieldDescriptor, pattern: &Regex, text: &str) -> ExtractedField {
        match pattern.captures(text) {
            Some(captures) => {
                let value = captures
                    .get(1)
                    .or_else(|| captures.get(0))
                    .map(|g| g.as_str().trim().to_string())
                    .unwrap_or_default();
                ExtractedField {
                    name: field.name.clone(),
                    label: field.label.clone(),
                    confidence: text_confidence(&value),
                    value: Some(value),
                    region: None,
                    source: FieldSource::Text,
                }
            }
            None => ExtractedField::missing(&field.name, &field.label, FieldSource::Text),
        }
    }

    fn read_region(
        &self,
        field: &FieldDescriptor,
        ctx: &ExtractionContext,
        region: &Region,
        page: usize,
    ) -> ExtractedField {
        let Some(ocr) = self.ocr else {
            debug!(field = %field.name, "no OCR service, skipping region field");
            return ExtractedField::missing(&field.name, &field.label, FieldSource::Page);
        };
        let Some(image) = ctx.pages.get(page) else {
            debug!(field = %field.name, page, "page not available, skipping region field");
            return ExtractedField::missing(&field.name, &field.label, FieldSource::Page);
        };

        match ocr.recognize_region(image, region) {
            Ok(text) => {
                let value = collapse_whitespace(&text);
                if value.is_empty() {
                    ExtractedField::missing(&field.name, &field.label, FieldSource::Page)
                } else {
                    ExtractedField {
                        name: field.name.clone(),
                        label: field.label.clone(),
                        value: Some(value),
                        confidence: OCR_CONFIDENCE,
                        region: Some(*region),
                        source: FieldSource::Page,
                    }
                }
            }
            Err(e) => {
                warn!(field = %field.name, error = %e, "OCR failed for region");
                ExtractedField::missing(&field.name, &field.label, FieldSource::Page)
            }
        }
    }
}
