//! Date parsing and ordering checks.

use chrono::NaiveDate;

use super::{value_of, FieldError};
use crate::extract::FieldMap;

/// Both dates must parse under the rule's format and `later` must not fall
/// before `earlier`. Equal dates are accepted: same-day issue and due dates
/// are common. A date that fails to parse is reported as its own error and
/// the ordering check is skipped.
pub fn check_date_order(
    fields: &FieldMap,
    earlier: &str,
    later: &str,
    format: &str,
) -> Vec<FieldError> {
    let mut errors = Vec::new();

    let parse = |name: &str, errors: &mut Vec<FieldError>| -> Option<NaiveDate> {
        let value = value_of(fields, name)?;
        match NaiveDate::parse_from_str(value.trim(), format) {
            Ok(date) => Some(date),
            Err(_) => {
                errors.push(FieldError::new(
                    name,
                    format!("'{}' is not a valid date ({})", value.trim(), format),
                ));
                None
            }
        }
    };

    let earlier_date = parse(earlier, &mut errors);
    let later_date = parse(later, &mut errors);

    if let (Some(a), Some(b)) = (earlier_date, later_date) {
        if b < a {
            errors.push(FieldError::new(
                later,
                format!("{} ({}) falls before {} ({})", later, b.format(format), earlier, a.format(format)),
            ));
        }
    }

    errors
}
