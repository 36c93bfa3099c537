//! Sequential chain resolution.
//!
//! Documents like contracts repeat generic labels ("Nombre:", "RUC:") in
//! several sections, so a plain full-text search would always hit the first
//! section. A chain anchors on a section heading and searches each follower
//! only in the text *after* the previous link's match, walking the document
//! top to bottom.

use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

use super::{text_confidence, ExtractedField, FieldMap, FieldSource};
use crate::schema::{Chain, FieldDescriptor, FieldKind};

/// Searches `text` and returns the trimmed value (first capture group, or
/// the whole match) and the byte offset just past the whole match.
fn search(pattern: &Regex, text: &str) -> Option<(String, usize)> {
    let captures = pattern.captures(text)?;
    let whole = captures.get(0)?;
    let value = captures
        .get(1)
        .map(|g| g.as_str())
        .unwrap_or_else(|| whole.as_str());
    Some((value.trim().to_string(), whole.end()))
}

/// Resolves a whole chain: the anchor over the full text, each follower in
/// the remaining text after the previous match. A link that fails to match
/// terminates the chain; it and every later link are recorded as missing.
pub fn resolve_chain(
    text: &str,
    chain: &Chain,
    index: &HashMap<&str, &FieldDescriptor>,
    results: &mut FieldMap,
) {
    let mut names = Vec::with_capacity(1 + chain.followers.len());
    names.push(chain.anchor.as_str());
    names.extend(chain.followers.iter().map(String::as_str));

    let mut cursor = 0usize;
    let mut broken = false;

    for (i, name) in names.iter().enumerate() {
        let Some(field) = index.get(name) else {
            continue;
        };
        let FieldKind::Regex { pattern } = &field.kind else {
            continue;
        };

        if broken {
            results.insert(
                field.name.clone(),
                ExtractedField::missing(&field.name, &field.label, FieldSource::Text),
            );
            continue;
        }

        match search(pattern, &text[cursor..]) {
            Some((value, end)) => {
                cursor += end;
                results.insert(
                    field.name.clone(),
                    ExtractedField {
                        name: field.name.clone(),
                        label: field.label.clone(),
                        confidence: text_confidence(&value),
                        value: Some(value),
                        region: None,
                        source: FieldSource::Text,
                    },
                );
            }
            None => {
                debug!(field = %field.name, link = i, "chain link not found, stopping chain");
                broken = true;
                results.insert(
                    field.name.clone(),
                    ExtractedField::missing(&field.name, &field.label, FieldSource::Text),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::spec::DocumentSpec;
    use crate::schema::DocumentSchema;
    use pretty_assertions::assert_eq;

    fn contract_schema() -> DocumentSchema {
        let spec: DocumentSpec = serde_json::from_str(
            r#"{
                "fields": [
                    {"name": "provider_intro", "kind": "regex",
                     "pattern": "(?i)(company information)"},
                    {"name": "provider_name", "kind": "regex",
                     "pattern": "(?i)\\bname\\s*:\\s*([^\\n]+)", "follows": "provider_intro"},
                    {"name": "client_intro", "kind": "regex",
                     "pattern": "(?i)(client information)", "follows": "provider_name"},
                    {"name": "client_name", "kind": "regex",
                     "pattern": "(?i)\\bname\\s*:\\s*([^\\n]+)", "follows": "client_intro"}
                ]
            }"#,
        )
        .unwrap();
        DocumentSchema::compile("contract", spec).unwrap()
    }

    fn run(schema: &DocumentSchema, text: &str) -> FieldMap {
        let index: HashMap<&str, &FieldDescriptor> =
            schema.fields.iter().map(|f| (f.name.as_str(), f)).collect();
        let mut results = FieldMap::new();
        resolve_chain(text, &schema.chains[0], &index, &mut results);
        results
    }

    #[test]
    fn test_chain_picks_section_local_matches() {
        let schema = contract_schema();
        let text = "COMPANY INFORMATION\nName: Petroecuador Services\nRUC: 1234567890123\n\
                    CLIENT INFORMATION\nName: ENAP SIPETROL S.A.\n";

        let results = run(&schema, text);
        assert_eq!(
            results["provider_name"].value.as_deref(),
            Some("Petroecuador Services")
        );
        assert_eq!(
            results["client_name"].value.as_deref(),
            Some("ENAP SIPETROL S.A.")
        );
    }

    #[test]
    fn test_failed_link_terminates_chain() {
        let schema = contract_schema();
        // No client section: everything after provider_name is missing.
        let text = "COMPANY INFORMATION\nName: Petroecuador Services\n";

        let results = run(&schema, text);
        assert_eq!(
            results["provider_name"].value.as_deref(),
            Some("Petroecuador Services")
        );
        assert!(results["client_intro"].is_missing());
        assert!(results["client_name"].is_missing());
        assert_eq!(results["client_name"].confidence, 0.0);
    }

    #[test]
    fn test_missing_anchor_leaves_all_links_missing() {
        let schema = contract_schema();
        let results = run(&schema, "unrelated text");
        assert!(results.values().all(|f| f.is_missing()));
        assert_eq!(results.len(), 4);
    }
}
