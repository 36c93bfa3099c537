//! Format, fixed-value, reference and required checks.

use regex::Regex;
use std::collections::HashMap;

use super::{value_of, FieldError};
use crate::extract::FieldMap;

/// The value must fully match the rule's pattern. Missing fields are
/// skipped; `required` handles absence.
pub fn check_format(fields: &FieldMap, field: &str, pattern: &Regex) -> Vec<FieldError> {
    let Some(value) = value_of(fields, field) else {
        return Vec::new();
    };
    if pattern.is_match(value.trim()) {
        Vec::new()
    } else {
        vec![FieldError::new(
            field,
            format!("value '{}' does not match the required format", value),
        )]
    }
}

/// The trimmed value must equal the expected string exactly.
pub fn check_fixed_value(fields: &FieldMap, field: &str, expected: &str) -> Vec<FieldError> {
    let Some(value) = value_of(fields, field) else {
        return Vec::new();
    };
    if value.trim() == expected {
        Vec::new()
    } else {
        vec![FieldError::new(
            field,
            format!("expected '{}', found '{}'", expected, value.trim()),
        )]
    }
}

/// The extracted value must equal the caller-supplied reference verbatim.
/// Skipped when either side is absent.
pub fn check_matches_input(
    fields: &FieldMap,
    field: &str,
    reference_values: &HashMap<String, String>,
) -> Vec<FieldError> {
    let (Some(value), Some(reference)) = (value_of(fields, field), reference_values.get(field))
    else {
        return Vec::new();
    };
    if value.trim() == reference.trim() {
        Vec::new()
    } else {
        vec![FieldError::new(
            field,
            format!(
                "extracted value '{}' does not match the provided '{}'",
                value.trim(),
                reference.trim()
            ),
        )]
    }
}

/// The field must have been extracted with a non-empty value.
pub fn check_required(fields: &FieldMap, field: &str) -> Vec<FieldError> {
    match value_of(fields, field) {
        Some(value) if !value.trim().is_empty() => Vec::new(),
        _ => vec![FieldError::new(field, "required field was not found")],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ExtractedField, FieldSource};

    fn one_field(name: &str, value: Option<&str>) -> FieldMap {
        let mut map = FieldMap::new();
        map.insert(
            name.to_string(),
            ExtractedField {
                name: name.to_string(),
                label: String::new(),
                value: value.map(str::to_string),
                confidence: 0.9,
                region: None,
                source: FieldSource::Text,
            },
        );
        map
    }

    #[test]
    fn test_format_anchoring() {
        // Schema compilation anchors format patterns; a partial match must
        // not pass.
        let pattern = Regex::new(r"^(?:34\d{5})$").unwrap();
        let fields = one_field("order_number", Some("3412345"));
        assert!(check_format(&fields, "order_number", &pattern).is_empty());

        let fields = one_field("order_number", Some("x3412345y"));
        assert_eq!(check_format(&fields, "order_number", &pattern).len(), 1);
    }

    #[test]
    fn test_fixed_value_trims() {
        let fields = one_field("company", Some("  ENAP SIPETROL S.A. ENAP SIPEC  "));
        assert!(check_fixed_value(&fields, "company", "ENAP SIPETROL S.A. ENAP SIPEC").is_empty());
    }

    #[test]
    fn test_matches_input_skipped_without_reference() {
        let fields = one_field("order_number", Some("3412345"));
        assert!(check_matches_input(&fields, "order_number", &HashMap::new()).is_empty());

        let mut refs = HashMap::new();
        refs.insert("order_number".to_string(), "3499999".to_string());
        assert_eq!(check_matches_input(&fields, "order_number", &refs).len(), 1);
    }

    #[test]
    fn test_required_rejects_empty_value() {
        let fields = one_field("order_number", Some("   "));
        assert_eq!(check_required(&fields, "order_number").len(), 1);
    }
}
