use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current value of every field, keyed by field id. Missing keys read as absent.
pub type Values = BTreeMap<String, FieldValue>;

/// Dynamically typed scalar held by a field.
///
/// On the wire a value is a bare JSON scalar. Strings always load as
/// [`FieldValue::Text`]; dates are produced by coercion or by callers and are
/// written back as `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum FieldValue {
    #[default]
    Absent,
    Bool(bool),
    Number(f64),
    Text(String),
    Date(NaiveDate),
}

impl FieldValue {
    /// Reads `id` from a value map, treating missing entries as absent.
    pub fn lookup<'a>(values: &'a Values, id: &str) -> &'a FieldValue {
        const ABSENT: &FieldValue = &FieldValue::Absent;
        values.get(id).unwrap_or(ABSENT)
    }

    pub fn is_absent(&self) -> bool {
        match self {
            FieldValue::Absent => true,
            FieldValue::Number(number) => number.is_nan(),
            _ => false,
        }
    }

    /// Absent, or a string that is empty once whitespace is trimmed.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Text(text) => text.trim().is_empty(),
            other => other.is_absent(),
        }
    }

    /// Absent or the empty string. Format rules skip such values.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(text) => text.is_empty(),
            other => other.is_absent(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Numeric reading shared by every calculation. Anything that is not a finite
    /// number, a numeric string or a boolean counts as zero.
    pub fn as_number(&self) -> f64 {
        let number = match self {
            FieldValue::Number(number) => *number,
            FieldValue::Bool(flag) => f64::from(u8::from(*flag)),
            FieldValue::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(0.0)
                }
            }
            FieldValue::Absent | FieldValue::Date(_) => 0.0,
        };
        if number.is_finite() { number } else { 0.0 }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(date) => Some(*date),
            FieldValue::Text(text) => parse_date(text),
            _ => None,
        }
    }

    /// Textual form used by pattern rules; `None` when absent.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            FieldValue::Text(text) => Some(Cow::Borrowed(text)),
            FieldValue::Number(number) if !number.is_nan() => {
                Some(Cow::Owned(number.to_string()))
            }
            FieldValue::Bool(flag) => Some(Cow::Owned(flag.to_string())),
            FieldValue::Date(date) => Some(Cow::Owned(date.format("%Y-%m-%d").to_string())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        Value::from(self.clone())
    }
}

/// Accepts calendar dates and the ISO date-time shapes browsers produce.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(moment) = DateTime::parse_from_rfc3339(text) {
        return Some(moment.date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|moment| moment.date())
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Bool(flag) => FieldValue::Bool(flag),
            Value::Number(number) => number
                .as_f64()
                .map(FieldValue::Number)
                .unwrap_or(FieldValue::Absent),
            Value::String(text) => FieldValue::Text(text),
            // non-scalars have no field representation
            Value::Null | Value::Array(_) | Value::Object(_) => FieldValue::Absent,
        }
    }
}

impl From<FieldValue> for Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Absent => Value::Null,
            FieldValue::Bool(flag) => Value::Bool(flag),
            FieldValue::Number(number) => {
                if number.fract() == 0.0 && number.abs() < 9.0e15 {
                    Value::from(number as i64)
                } else {
                    Value::from(number)
                }
            }
            FieldValue::Text(text) => Value::String(text),
            FieldValue::Date(date) => Value::String(date.format("%Y-%m-%d").to_string()),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_coercion_defaults_to_zero() {
        assert_eq!(FieldValue::from("12.5").as_number(), 12.5);
        assert_eq!(FieldValue::from(" 7 ").as_number(), 7.0);
        assert_eq!(FieldValue::from("x").as_number(), 0.0);
        assert_eq!(FieldValue::from("").as_number(), 0.0);
        assert_eq!(FieldValue::Absent.as_number(), 0.0);
        assert_eq!(FieldValue::from(true).as_number(), 1.0);
        assert_eq!(FieldValue::Number(f64::NAN).as_number(), 0.0);
        assert_eq!(FieldValue::Number(f64::INFINITY).as_number(), 0.0);
    }

    #[test]
    fn strings_never_load_as_dates() {
        let value: FieldValue = serde_json::from_value(json!("2020-01-02")).expect("value");
        assert_eq!(value, FieldValue::Text("2020-01-02".into()));
        assert_eq!(value.as_date(), NaiveDate::from_ymd_opt(2020, 1, 2));
    }

    #[test]
    fn whole_numbers_serialize_as_integers() {
        assert_eq!(FieldValue::Number(5.0).to_json(), json!(5));
        assert_eq!(FieldValue::Number(2.5).to_json(), json!(2.5));
        assert_eq!(FieldValue::Absent.to_json(), Value::Null);
        let date = NaiveDate::from_ymd_opt(1990, 6, 1).expect("date");
        assert_eq!(FieldValue::Date(date).to_json(), json!("1990-06-01"));
    }

    #[test]
    fn blank_covers_whitespace_and_absent() {
        assert!(FieldValue::from("   ").is_blank());
        assert!(FieldValue::Absent.is_blank());
        assert!(!FieldValue::from(0.0).is_blank());
        assert!(!FieldValue::from("   ").is_empty());
    }

    #[test]
    fn parse_date_accepts_iso_timestamps() {
        let expected = NaiveDate::from_ymd_opt(2001, 3, 4);
        assert_eq!(parse_date("2001-03-04T10:20:30Z"), expected);
        assert_eq!(parse_date("2001-03-04T10:20"), expected);
        assert_eq!(parse_date("not a date"), None);
    }
}
