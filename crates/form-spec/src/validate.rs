use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::spec::field::{FieldSpec, RuleKind, ValidationRule};
use crate::spec::form::FormSchema;
use crate::value::{FieldValue, Values};

/// Field id → message of the first failing rule. Valid fields have no entry.
pub type ErrorMap = BTreeMap<String, String>;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

const PASSWORD_MIN_CHARS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: ErrorMap,
}

impl ValidationResult {
    pub fn from_errors(errors: ErrorMap) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn error_for(&self, id: &str) -> Option<&str> {
        self.errors.get(id).map(String::as_str)
    }
}

/// Validates every field of `schema` against `values`.
///
/// Derived values are read as given; run recomputation first when rules of
/// other fields should see fresh derived values.
pub fn validate(schema: &FormSchema, values: &Values) -> ValidationResult {
    let mut errors = ErrorMap::new();
    for field in &schema.fields {
        if errors.contains_key(&field.id) {
            continue;
        }
        let value = FieldValue::lookup(values, &field.id);
        if let Some(message) = validate_one(field, value, values) {
            errors.insert(field.id.clone(), message.to_string());
        }
    }
    ValidationResult::from_errors(errors)
}

/// Checks a single field value, returning the message of the first failing rule.
/// Derived fields are computed rather than entered and never fail.
///
/// `values` is the whole form for cross-field rules; the current rule kinds
/// only look at `value`.
pub fn validate_one<'a>(
    field: &'a FieldSpec,
    value: &FieldValue,
    _values: &Values,
) -> Option<&'a str> {
    if field.logic().is_some() {
        return None;
    }
    field
        .validation_rules
        .iter()
        .find(|rule| rule_fails(rule, value))
        .map(|rule| rule.message.as_str())
}

fn rule_fails(rule: &ValidationRule, value: &FieldValue) -> bool {
    match rule.kind {
        RuleKind::Required | RuleKind::NotEmpty => value.is_blank(),
        RuleKind::MinLength => {
            if let Some(text) = value.as_str()
                && let Some(min) = rule.threshold()
            {
                (text.chars().count() as f64) < min
            } else {
                false
            }
        }
        RuleKind::MaxLength => {
            if let Some(text) = value.as_str()
                && let Some(max) = rule.threshold()
            {
                (text.chars().count() as f64) > max
            } else {
                false
            }
        }
        RuleKind::Email => match value.as_text() {
            Some(text) if !value.is_empty() => !EMAIL.is_match(&text),
            _ => false,
        },
        RuleKind::Password => match value.as_text() {
            Some(text) if !value.is_empty() => !is_strong_password(&text),
            _ => false,
        },
    }
}

/// At least eight characters on a single line, one of them a digit.
fn is_strong_password(text: &str) -> bool {
    !text.chars().any(is_line_break)
        && text.chars().count() >= PASSWORD_MIN_CHARS
        && text.chars().any(|ch| ch.is_ascii_digit())
}

fn is_line_break(ch: char) -> bool {
    matches!(ch, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}
