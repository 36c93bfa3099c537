//! Document processing pipeline.
//!
//! One [`DocumentProcessor`] ties everything together: it turns an input
//! file into an [`ExtractionContext`], resolves the schema's fields,
//! reconstructs the table, detects signatures, runs the rules and produces
//! a [`DocumentDecision`]. Per-field problems are collected along the way;
//! only unusable input or a broken schema aborts a document.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::collaborators::{
    DocumentClassifier, DocumentRenderer, KeywordClassifier, OcrService, Recognizer,
};
use crate::config::OcrConfig;
use crate::context::ExtractionContext;
use crate::decision::DocumentDecision;
use crate::error::{DocuvalError, Result};
use crate::extract::{text_confidence, ExtractedTable, FieldMap, FieldResolver, TableExtractor};
use crate::pdf::PdfRenderer;
use crate::rules::RuleEngine;
use crate::schema::registry::SchemaRegistry;
use crate::schema::{DocumentSchema, FieldKind};
use crate::signature::{SignatureBlock, SignatureDetector};
use crate::xml::XmlDocument;

/// The engine facade.
pub struct DocumentProcessor {
    registry: SchemaRegistry,
    renderer: Box<dyn DocumentRenderer>,
    classifier: Box<dyn DocumentClassifier>,
    ocr: Option<Recognizer>,
    signature_detector: Option<SignatureDetector>,
}

impl DocumentProcessor {
    /// Creates a processor with the bundled schemas, the PDF renderer and
    /// the keyword classifier. No OCR service is wired by default; region
    /// fields resolve as missing until one is provided.
    pub fn new() -> Result<Self> {
        Ok(Self {
            registry: SchemaRegistry::builtin()?,
            renderer: Box::new(PdfRenderer::new()),
            classifier: Box::new(KeywordClassifier),
            ocr: None,
            signature_detector: Some(SignatureDetector::new()),
        })
    }

    pub fn with_registry(mut self, registry: SchemaRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_renderer(mut self, renderer: Box<dyn DocumentRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_classifier(mut self, classifier: Box<dyn DocumentClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Wires an OCR service, bound to the configured language hints.
    pub fn with_ocr(mut self, ocr: Arc<dyn OcrService>, config: &OcrConfig) -> Self {
        self.ocr = Some(Recognizer::new(ocr, config));
        self
    }

    pub fn with_signature_detector(mut self, detector: Option<SignatureDetector>) -> Self {
        self.signature_detector = detector;
        self
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Processes a document file end to end. `document_type` overrides the
    /// classifier; `None` lets the classifier decide.
    pub fn process_file(
        &self,
        path: &Path,
        document_type: Option<&str>,
    ) -> Result<DocumentDecision> {
        self.process_file_with_context(path, document_type, ExtractionContext::default())
    }

    /// Like [`Self::process_file`] but starting from a caller-prepared
    /// context (reference values for `matches_input` rules etc.). Inputs
    /// read from the file are merged into the given context.
    pub fn process_file_with_context(
        &self,
        path: &Path,
        document_type: Option<&str>,
        mut ctx: ExtractionContext,
    ) -> Result<DocumentDecision> {
        self.read_into_context(path, &mut ctx)?;
        ctx.ensure_usable()?;

        let document_type = match document_type {
            Some(t) => t.to_string(),
            None => {
                let classification = self.classifier.classify(&ctx.text)?;
                debug!(
                    document_type = %classification.document_type,
                    confidence = classification.confidence,
                    "classified document"
                );
                classification.document_type
            }
        };

        let schema = self.registry.get(&document_type)?;
        self.process(&schema, &ctx)
    }

    /// Runs extraction, signature detection and validation for an already
    /// prepared context.
    pub fn process(
        &self,
        schema: &DocumentSchema,
        ctx: &ExtractionContext,
    ) -> Result<DocumentDecision> {
        let mut resolver = FieldResolver::new(schema);
        if let Some(ocr) = &self.ocr {
            resolver = resolver.with_ocr(ocr);
        }
        let mut fields = resolver.resolve(ctx);

        let table = match &schema.table {
            Some(table_schema) => TableExtractor::new(table_schema).extract(&ctx.text),
            None => ExtractedTable::default(),
        };

        let signatures = self.detect_signatures(schema, ctx);
        refine_group_fields(schema, &mut fields, &signatures);

        let validation = RuleEngine::new(schema).validate(&fields, &table, &ctx.reference_values);

        let decision = DocumentDecision::new(
            schema.name.clone(),
            fields,
            table,
            signatures,
            validation,
        );
        info!(
            document_type = %schema.name,
            status = ?decision.status,
            errors = decision.validation.field_errors.len(),
            missing = decision.validation.missing_fields.len(),
            "document processed"
        );
        Ok(decision)
    }

    /// Fills the context from the file, dispatching on the extension.
    fn read_into_context(&self, path: &Path, ctx: &mut ExtractionContext) -> Result<()> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => {
                ctx.text = self.renderer.extract_text(path).unwrap_or_else(|e| {
                    warn!(error = %e, "no text layer, relying on OCR");
                    String::new()
                });
                match self.renderer.render_pages(path) {
                    Ok(pages) => ctx.pages = pages,
                    Err(e) => warn!(error = %e, "could not render pages"),
                }
            }
            "xml" => {
                let content = std::fs::read_to_string(path)?;
                let xml = XmlDocument::parse(&content)?;
                ctx.text = xml.to_text();
                ctx.xml = Some(xml);
            }
            "png" | "jpg" | "jpeg" => {
                let image = image::open(path)?;
                ctx.pages = vec![image];
            }
            other => {
                return Err(DocuvalError::NoInput(format!(
                    "unsupported file format: {:?}",
                    other
                )));
            }
        }

        // OCR fallback: scanned documents have pages but no text layer.
        if ctx.text.trim().is_empty() && !ctx.pages.is_empty() {
            if let Some(ocr) = &self.ocr {
                let mut text = String::new();
                for (i, page) in ctx.pages.iter().enumerate() {
                    match ocr.recognize(page) {
                        Ok(page_text) => {
                            if !text.is_empty() {
                                text.push_str("\n\n");
                            }
                            text.push_str(&page_text);
                        }
                        Err(e) => warn!(page = i, error = %e, "full-page OCR failed"),
                    }
                }
                ctx.text = text;
            }
        }

        Ok(())
    }

    /// Detects signature blocks on the last page, where documents of this
    /// kind are signed. Ink blobs whose OCR text matches none of the
    /// schema's signature patterns (stamps, smudges, logos) are discarded.
    fn detect_signatures(
        &self,
        schema: &DocumentSchema,
        ctx: &ExtractionContext,
    ) -> Vec<SignatureBlock> {
        let Some(detector) = &self.signature_detector else {
            return Vec::new();
        };
        let Some(page) = ctx.pages.last() else {
            return Vec::new();
        };
        let blocks = detector.detect_blocks(page, self.ocr.as_ref());
        filter_signature_blocks(schema, blocks)
    }
}

/// Keeps blocks whose OCR text matches at least one group-child pattern of
/// the schema. Blocks without OCR text cannot be checked and are kept; a
/// schema without signature patterns keeps everything.
fn filter_signature_blocks(
    schema: &DocumentSchema,
    blocks: Vec<SignatureBlock>,
) -> Vec<SignatureBlock> {
    let mut patterns = Vec::new();
    for group in &schema.fields {
        let FieldKind::Group { fields: children } = &group.kind else {
            continue;
        };
        for child in children {
            match &child.kind {
                FieldKind::Regex { pattern } => patterns.push(pattern),
                FieldKind::Enumeration { pattern, .. } => patterns.push(pattern),
                _ => {}
            }
        }
    }
    if patterns.is_empty() {
        return blocks;
    }

    blocks
        .into_iter()
        .filter(|block| match &block.text {
            Some(text) => {
                let keep = patterns.iter().any(|p| p.is_match(text));
                if !keep {
                    debug!(?block.region, text, "discarding unmatched ink block");
                }
                keep
            }
            None => true,
        })
        .collect()
}

/// Re-resolves missing group children against the OCR text of detected
/// signature blocks. Names and roles usually sit next to the signature, not
/// in the document's text layer.
fn refine_group_fields(schema: &DocumentSchema, fields: &mut FieldMap, blocks: &[SignatureBlock]) {
    if blocks.is_empty() {
        return;
    }
    let block_texts: Vec<&str> = blocks.iter().filter_map(|b| b.text.as_deref()).collect();
    if block_texts.is_empty() {
        return;
    }

    for group in &schema.fields {
        let FieldKind::Group { fields: children } = &group.kind else {
            continue;
        };
        for child in children {
            let still_missing = fields
                .get(&child.name)
                .map(|f| f.is_missing())
                .unwrap_or(false);
            if !still_missing {
                continue;
            }
            let pattern = match &child.kind {
                FieldKind::Regex { pattern } => pattern,
                FieldKind::Enumeration { pattern, .. } => pattern,
                _ => continue,
            };
            for text in &block_texts {
                if let Some(captures) = pattern.captures(text) {
                    let value = captures
                        .get(1)
                        .or_else(|| captures.get(0))
                        .map(|g| g.as_str().trim().to_string())
                        .unwrap_or_default();
                    if let Some(field) = fields.get_mut(&child.name) {
                        field.confidence = text_confidence(&value);
                        field.value = Some(value);
                    }
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OcrError;
    use crate::extract::{ExtractedField, FieldSource};
    use crate::schema::spec::DocumentSpec;
    use crate::schema::Region;
    use image::{DynamicImage, RgbImage};
    use pretty_assertions::assert_eq;

    fn schema(json: &str) -> DocumentSchema {
        let spec: DocumentSpec = serde_json::from_str(json).unwrap();
        DocumentSchema::compile("test", spec).unwrap()
    }

    /// A white page with one signature-shaped ink rectangle.
    fn page_with_blob() -> DynamicImage {
        let mut img = RgbImage::from_pixel(800, 600, image::Rgb([255; 3]));
        for py in 400..480 {
            for px in 100..300 {
                img.put_pixel(px, py, image::Rgb([0, 0, 0]));
            }
        }
        DynamicImage::ImageRgb8(img)
    }

    fn blank_page() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(800, 600, image::Rgb([255; 3])))
    }

    /// OCR stub reading the same text in every block.
    struct BlockText(&'static str);

    impl OcrService for BlockText {
        fn recognize(
            &self,
            _image: &DynamicImage,
            _language: &str,
        ) -> std::result::Result<String, OcrError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_process_text_context_end_to_end() {
        let processor = DocumentProcessor::new().unwrap();
        let schema = processor.registry().get("service_delivery_record").unwrap();

        let text = "ACTA DE RECEPCIÓN\n\
                    Fecha: 01/02/2024\n\
                    Empresa: ENAP SIPETROL S.A. ENAP SIPEC\n\
                    Servicios proporcionados por: Oilfield Services SA\n\
                    pedido identificado con el número: 3412345\n\
                    factura número: 1123456\n\
                    HES asociado con el número: 81212345\n\
                    valor total de: USD 230.00\n\
                    finalizó el día: 15/02/2024\n";

        let ctx = ExtractionContext::from_text(text);
        let decision = processor.process(&schema, &ctx).unwrap();

        assert!(decision.is_accepted(), "{}", decision.explanation);
        assert_eq!(
            decision.fields["order_number"].value.as_deref(),
            Some("3412345")
        );
        assert_eq!(decision.explanation, "The document was processed correctly.");
    }

    #[test]
    fn test_process_rejects_on_rule_failure() {
        let processor = DocumentProcessor::new().unwrap();
        let schema = processor.registry().get("service_delivery_record").unwrap();

        // Wrong order number prefix and reversed dates.
        let text = "ACTA DE RECEPCIÓN\n\
                    Fecha: 15/02/2024\n\
                    Empresa: ENAP SIPETROL S.A. ENAP SIPEC\n\
                    pedido identificado con el número: 9912345\n\
                    finalizó el día: 01/02/2024\n";

        let ctx = ExtractionContext::from_text(text);
        let decision = processor.process(&schema, &ctx).unwrap();

        assert!(!decision.is_accepted());
        let failing: Vec<&str> = decision
            .validation
            .field_errors
            .iter()
            .map(|e| e.field.as_str())
            .collect();
        assert!(failing.contains(&"order_number"));
        assert!(failing.contains(&"end_date"));
    }

    #[test]
    fn test_reference_value_mismatch_rejects() {
        let processor = DocumentProcessor::new().unwrap();
        let schema = processor.registry().get("service_delivery_record").unwrap();

        let text = "ACTA DE RECEPCIÓN\n\
                    Fecha: 01/02/2024\n\
                    Empresa: ENAP SIPETROL S.A. ENAP SIPEC\n\
                    pedido identificado con el número: 3412345\n";

        let ctx = ExtractionContext::from_text(text)
            .with_reference_value("order_number", "3499999");
        let decision = processor.process(&schema, &ctx).unwrap();

        assert!(!decision.is_accepted());
        assert!(decision.explanation.contains("3499999"));
    }

    #[test]
    fn test_unknown_document_type_aborts() {
        let processor = DocumentProcessor::new().unwrap();
        assert!(processor.registry().get("purchase_order").is_err());
    }

    #[test]
    fn test_refine_group_fields_from_signature_blocks() {
        let schema = schema(
            r#"{"fields": [
                {"name": "signatures", "kind": "group", "fields": [
                    {"name": "person_name", "kind": "regex",
                     "pattern": "\\b([A-Z][a-z]+\\s[A-Z][a-z]+)\\b"},
                    {"name": "person_role", "kind": "enumeration",
                     "values": ["Financial Analyst"]}
                ]}
            ]}"#,
        );

        let mut fields = FieldMap::new();
        for name in ["signatures.person_name", "signatures.person_role"] {
            fields.insert(
                name.to_string(),
                ExtractedField::missing(name, "", FieldSource::Text),
            );
        }
        let blocks = vec![SignatureBlock {
            region: Region::new(0.0, 0.0, 10.0, 10.0),
            text: Some("Maria Lopez Financial Analyst".to_string()),
        }];

        refine_group_fields(&schema, &mut fields, &blocks);
        assert_eq!(
            fields["signatures.person_name"].value.as_deref(),
            Some("Maria Lopez")
        );
        assert_eq!(
            fields["signatures.person_role"].value.as_deref(),
            Some("Financial Analyst")
        );
    }

    #[test]
    fn test_signatures_come_from_last_page_only() {
        let processor = DocumentProcessor::new().unwrap();
        let schema = processor.registry().get("service_delivery_record").unwrap();

        // Ink on an earlier page is not a signature.
        let ctx = ExtractionContext::from_text("x")
            .with_pages(vec![page_with_blob(), blank_page()]);
        assert!(processor.detect_signatures(&schema, &ctx).is_empty());

        let ctx = ExtractionContext::from_text("x")
            .with_pages(vec![blank_page(), page_with_blob()]);
        assert_eq!(processor.detect_signatures(&schema, &ctx).len(), 1);
    }

    #[test]
    fn test_unreadable_block_kept_without_ocr() {
        // No OCR service: the block cannot be checked against the schema's
        // name and role patterns, so it stays.
        let processor = DocumentProcessor::new().unwrap();
        let schema = processor.registry().get("service_delivery_record").unwrap();

        let ctx = ExtractionContext::from_text("x").with_pages(vec![page_with_blob()]);
        let blocks = processor.detect_signatures(&schema, &ctx);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].text.is_none());
    }

    #[test]
    fn test_ink_block_without_name_or_role_discarded() {
        let processor = DocumentProcessor::new()
            .unwrap()
            .with_ocr(Arc::new(BlockText("manchas de tinta 123")), &OcrConfig::default());
        let schema = processor.registry().get("service_delivery_record").unwrap();

        let ctx = ExtractionContext::from_text("x").with_pages(vec![page_with_blob()]);
        assert!(processor.detect_signatures(&schema, &ctx).is_empty());
    }

    #[test]
    fn test_signature_block_fills_person_fields() {
        let processor = DocumentProcessor::new().unwrap().with_ocr(
            Arc::new(BlockText("Maria Lopez, Analista Financiero")),
            &OcrConfig::default(),
        );
        let schema = processor.registry().get("service_delivery_record").unwrap();

        let text = "ACTA DE RECEPCIÓN\n\
                    Fecha: 01/02/2024\n\
                    pedido identificado con el número: 3412345\n";
        let ctx = ExtractionContext::from_text(text).with_pages(vec![page_with_blob()]);
        let decision = processor.process(&schema, &ctx).unwrap();

        assert_eq!(decision.signatures.len(), 1);
        assert_eq!(
            decision.fields["signatures.person_name"].value.as_deref(),
            Some("Maria Lopez")
        );
        assert_eq!(
            decision.fields["signatures.person_role"].value.as_deref(),
            Some("Analista Financiero")
        );
    }
}
