//! Core library for schema-driven document review.
//!
//! This crate provides:
//! - Document schemas (fields, tables, rules) compiled and validated at load
//! - Field resolution over text, page regions, XML trees and sequential chains
//! - Line-item table reconstruction from plain text
//! - Signature block detection on page images
//! - Declarative business-rule validation and accept/reject decisions

pub mod collaborators;
pub mod config;
pub mod context;
pub mod decision;
pub mod error;
pub mod extract;
pub mod pdf;
pub mod pipeline;
pub mod rules;
pub mod schema;
pub mod signature;
pub mod xml;

pub use collaborators::{
    Classification, DocumentClassifier, DocumentRenderer, OcrService, Recognizer,
};
pub use config::EngineConfig;
pub use context::ExtractionContext;
pub use decision::{DecisionStatus, DocumentDecision};
pub use error::{DocuvalError, Result};
pub use extract::{ExtractedField, ExtractedTable, FieldMap, FieldResolver, TableExtractor};
pub use pdf::PdfRenderer;
pub use pipeline::DocumentProcessor;
pub use rules::{FieldError, RuleEngine, ValidationOutcome};
pub use schema::registry::SchemaRegistry;
pub use schema::{DocumentSchema, FieldDescriptor, FieldKind, Offset, Region};
pub use signature::{SignatureBlock, SignatureDetector};
pub use xml::XmlDocument;
