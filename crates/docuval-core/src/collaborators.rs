//! Pluggable collaborator traits.
//!
//! The engine stays independent of any particular OCR backend, page
//! renderer or classifier implementation; callers wire concrete
//! implementations into the [`crate::pipeline::DocumentProcessor`].

use image::DynamicImage;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

use crate::config::OcrConfig;
use crate::error::{OcrError, PdfError, Result};
use crate::schema::Region;

/// Recognizes text in page images or crops.
pub trait OcrService: Send + Sync {
    /// Recognizes all text in an image. `language` is a hint like "spa"
    /// or "eng"; backends without language models may ignore it.
    fn recognize(&self, image: &DynamicImage, language: &str)
        -> std::result::Result<String, OcrError>;

    /// Recognizes text in a crop of the image. The default implementation
    /// crops and delegates to [`Self::recognize`]; backends with native
    /// region support can override it.
    fn recognize_region(
        &self,
        image: &DynamicImage,
        region: &Region,
        language: &str,
    ) -> std::result::Result<String, OcrError> {
        let (w, h) = (image.width(), image.height());
        let Some((x, y, cw, ch)) = region.to_pixel_rect(w, h) else {
            return Ok(String::new());
        };
        let crop = image.crop_imm(x, y, cw, ch);
        self.recognize(&crop, language)
    }
}

/// An OCR service bound to the configured language hints.
///
/// Recognition runs with the primary hint and is retried once with the
/// fallback hint when the primary fails. Spanish-language documents with
/// English section labels are the usual reason for the retry.
pub struct Recognizer {
    service: Arc<dyn OcrService>,
    primary: String,
    fallback: Option<String>,
}

impl Recognizer {
    pub fn new(service: Arc<dyn OcrService>, config: &OcrConfig) -> Self {
        Recognizer {
            service,
            primary: config.language.clone(),
            fallback: config.fallback_language.clone(),
        }
    }

    pub fn recognize(&self, image: &DynamicImage) -> std::result::Result<String, OcrError> {
        self.with_fallback(|language| self.service.recognize(image, language))
    }

    pub fn recognize_region(
        &self,
        image: &DynamicImage,
        region: &Region,
    ) -> std::result::Result<String, OcrError> {
        self.with_fallback(|language| self.service.recognize_region(image, region, language))
    }

    fn with_fallback<F>(&self, run: F) -> std::result::Result<String, OcrError>
    where
        F: Fn(&str) -> std::result::Result<String, OcrError>,
    {
        match run(&self.primary) {
            Ok(text) => Ok(text),
            Err(primary_error) => match &self.fallback {
                Some(language) => {
                    warn!(
                        language = %self.primary,
                        error = %primary_error,
                        "recognition failed, retrying with fallback language"
                    );
                    run(language)
                }
                None => Err(primary_error),
            },
        }
    }
}

/// Turns a source document into processable inputs: plain text and,
/// when possible, rendered page images.
pub trait DocumentRenderer: Send + Sync {
    /// Extracts the full text of the document.
    fn extract_text(&self, path: &Path) -> std::result::Result<String, PdfError>;

    /// Renders page images for region-based extraction. Renderers without
    /// raster support may return an empty list; region fields then resolve
    /// as missing.
    fn render_pages(&self, path: &Path) -> std::result::Result<Vec<DynamicImage>, PdfError>;
}

/// The document type assigned to an input before schema lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Schema name, e.g. `"invoice"`.
    pub document_type: String,
    /// Classifier confidence in `[0, 1]`.
    pub confidence: f32,
}

/// Assigns a document type to an input document.
pub trait DocumentClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Result<Classification>;
}

/// Keyword-based classifier over the extracted text.
///
/// Looks for the title vocabulary of each bundled document type; the type
/// with the most hits wins. Callers with an ML classifier can replace it.
#[derive(Debug, Default)]
pub struct KeywordClassifier;

impl DocumentClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> Result<Classification> {
        let lower = text.to_lowercase();
        let candidates: [(&str, &[&str]); 3] = [
            ("invoice", &["factura", "invoice no", "invoice"]),
            ("contract", &["contrato", "contract", "payment terms"]),
            (
                "service_delivery_record",
                &["acta de recepción", "delivery receipt"],
            ),
        ];

        let mut best = ("invoice", 0usize);
        for (doc_type, keywords) in candidates {
            let hits = keywords.iter().filter(|k| lower.contains(*k)).count();
            if hits > best.1 {
                best = (doc_type, hits);
            }
        }

        let confidence = if best.1 == 0 { 0.0 } else { 0.6 + 0.1 * best.1.min(3) as f32 };
        Ok(Classification {
            document_type: best.0.to_string(),
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_classifier() {
        let classifier = KeywordClassifier;

        let c = classifier.classify("ACTA DE RECEPCIÓN\nFecha: 01/02/2024").unwrap();
        assert_eq!(c.document_type, "service_delivery_record");

        let c = classifier.classify("Factura N°: 1123456\nInvoice No").unwrap();
        assert_eq!(c.document_type, "invoice");

        let c = classifier.classify("lorem ipsum").unwrap();
        assert_eq!(c.confidence, 0.0);
    }

    /// Backend with only an English model: the primary "spa" hint fails.
    struct EnglishOnly;

    impl OcrService for EnglishOnly {
        fn recognize(
            &self,
            _image: &DynamicImage,
            language: &str,
        ) -> std::result::Result<String, OcrError> {
            match language {
                "eng" => Ok("recognized".to_string()),
                other => Err(OcrError::Recognition(format!("no model for {}", other))),
            }
        }
    }

    #[test]
    fn test_recognizer_retries_with_fallback_language() {
        let recognizer = Recognizer::new(Arc::new(EnglishOnly), &OcrConfig::default());
        let image = DynamicImage::new_luma8(4, 4);
        assert_eq!(recognizer.recognize(&image).unwrap(), "recognized");
    }

    #[test]
    fn test_recognizer_without_fallback_propagates_error() {
        let config = OcrConfig {
            fallback_language: None,
            ..OcrConfig::default()
        };
        let recognizer = Recognizer::new(Arc::new(EnglishOnly), &config);
        assert!(recognizer.recognize(&DynamicImage::new_luma8(4, 4)).is_err());
    }
}
