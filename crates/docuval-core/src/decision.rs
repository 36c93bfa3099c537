//! Decision aggregation.
//!
//! Collapses the extraction and validation results for one document into a
//! single accept/reject decision with a human-readable explanation.

use serde::Serialize;

use crate::extract::{ExtractedTable, FieldMap};
use crate::rules::ValidationOutcome;
use crate::signature::SignatureBlock;

/// Final verdict for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Accepted,
    Rejected,
}

/// Everything known about a processed document.
#[derive(Debug, Serialize)]
pub struct DocumentDecision {
    pub document_type: String,
    pub status: DecisionStatus,
    /// One sentence per problem; a fixed sentence when there are none.
    pub explanation: String,
    pub fields: FieldMap,
    #[serde(skip_serializing_if = "ExtractedTable::is_empty")]
    pub table: ExtractedTable,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub signatures: Vec<SignatureBlock>,
    pub validation: ValidationOutcome,
}

impl DocumentDecision {
    /// Builds the verdict. A document is rejected exactly when validation
    /// produced field errors; missing fields alone do not reject (a
    /// `required` rule turns absence into a field error first).
    pub fn new(
        document_type: impl Into<String>,
        fields: FieldMap,
        table: ExtractedTable,
        signatures: Vec<SignatureBlock>,
        validation: ValidationOutcome,
    ) -> Self {
        let status = if validation.is_valid() {
            DecisionStatus::Accepted
        } else {
            DecisionStatus::Rejected
        };
        let explanation = explanation_for(&validation);

        DocumentDecision {
            document_type: document_type.into(),
            status,
            explanation,
            fields,
            table,
            signatures,
            validation,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status == DecisionStatus::Accepted
    }
}

fn explanation_for(validation: &ValidationOutcome) -> String {
    if validation.is_valid() {
        return "The document was processed correctly.".to_string();
    }

    let sentences: Vec<String> = validation
        .field_errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect();
    sentences.join("; ")
}
