//! Error types for the docuval-core library.

use thiserror::Error;

/// Main error type for the docuval library.
///
/// Expected per-document conditions (a field that could not be found, a
/// malformed table row, a failed business rule) are *not* errors: they are
/// collected into the extraction result and drive the final decision. This
/// type covers configuration and collaborator failures only.
#[derive(Error, Debug)]
pub enum DocuvalError {
    /// Schema lookup or schema consistency error.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// XML parsing error.
    #[error("XML error: {0}")]
    Xml(#[from] XmlError),

    /// OCR collaborator error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Image processing error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The document provides no usable input at all (no text, no pages, no XML).
    #[error("no usable input: {0}")]
    NoInput(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to schema loading and consistency.
///
/// These are programmer/configuration errors and abort the document; they are
/// never produced by document *content*.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// No schema is registered for the requested document type.
    #[error("no schema for document type: {0}")]
    NotFound(String),

    /// The schema configuration could not be parsed.
    #[error("failed to parse schema: {0}")]
    Parse(String),

    /// A field declares an invalid regular expression.
    #[error("invalid pattern for field {field}: {source}")]
    InvalidPattern {
        field: String,
        #[source]
        source: regex::Error,
    },

    /// A field references another field that does not exist or is declared
    /// after the dependent field.
    #[error("field {field} references undefined or later field {base}")]
    UnknownBase { field: String, base: String },

    /// A sequential chain's follower relations form a cycle.
    #[error("sequential chain starting at {0} contains a cycle")]
    ChainCycle(String),

    /// A validation rule references a field the schema does not declare.
    #[error("rule references unknown field: {0}")]
    UnknownRuleField(String),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,
}

/// Errors related to XML parsing.
#[derive(Error, Debug)]
pub enum XmlError {
    /// The XML document is not well formed.
    #[error("malformed XML: {0}")]
    Malformed(String),

    /// The XML document has no root element.
    #[error("XML document has no root element")]
    NoRoot,
}

/// Errors from the OCR collaborator.
#[derive(Error, Debug)]
pub enum OcrError {
    /// No OCR service is configured.
    #[error("no OCR service configured")]
    Unavailable,

    /// The OCR service failed to recognize text.
    #[error("text recognition failed: {0}")]
    Recognition(String),
}

/// Result type for the docuval library.
pub type Result<T> = std::result::Result<T, DocuvalError>;
