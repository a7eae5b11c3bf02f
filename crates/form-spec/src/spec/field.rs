use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::value::FieldValue;

/// Widget kind of a form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Textarea,
    Select,
    Radio,
    Checkbox,
    Date,
}

impl FieldType {
    /// Select and radio fields carry an option list; every other type must not.
    pub fn has_options(self) -> bool {
        matches!(self, FieldType::Select | FieldType::Radio)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Textarea => "textarea",
            FieldType::Select => "select",
            FieldType::Radio => "radio",
            FieldType::Checkbox => "checkbox",
            FieldType::Date => "date",
        }
    }

    /// Whether `value` is an acceptable default for this field type.
    pub fn accepts(self, value: &FieldValue) -> bool {
        match (self, value) {
            (_, FieldValue::Absent) => true,
            (FieldType::Number, FieldValue::Number(_)) => true,
            (FieldType::Number, FieldValue::Text(text)) => {
                text.trim().is_empty() || text.trim().parse::<f64>().is_ok()
            }
            (FieldType::Checkbox, FieldValue::Bool(_)) => true,
            (FieldType::Date, FieldValue::Date(_)) => true,
            (FieldType::Date, FieldValue::Text(text)) => {
                text.is_empty() || crate::value::parse_date(text).is_some()
            }
            (
                FieldType::Text | FieldType::Textarea | FieldType::Select | FieldType::Radio,
                FieldValue::Text(_),
            ) => true,
            _ => false,
        }
    }
}

/// Kind of a single validation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum RuleKind {
    Required,
    NotEmpty,
    MinLength,
    MaxLength,
    Email,
    Password,
}

impl RuleKind {
    /// Length rules need a numeric threshold in [`ValidationRule::value`].
    pub fn needs_threshold(self) -> bool {
        matches!(self, RuleKind::MinLength | RuleKind::MaxLength)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RuleKind::Required => "required",
            RuleKind::NotEmpty => "notEmpty",
            RuleKind::MinLength => "minLength",
            RuleKind::MaxLength => "maxLength",
            RuleKind::Email => "email",
            RuleKind::Password => "password",
        }
    }
}

/// Declarative check attached to a field. Rules run in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationRule {
    #[serde(rename = "type")]
    pub kind: RuleKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    pub message: String,
}

impl ValidationRule {
    pub fn new(kind: RuleKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            value: None,
            message: message.into(),
        }
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.value = Some(serde_json::Value::from(threshold));
        self
    }

    /// Numeric threshold for length rules. The authoring UI stores it either as a
    /// number or as a numeric string.
    pub fn threshold(&self) -> Option<f64> {
        match self.value.as_ref()? {
            serde_json::Value::Number(number) => number.as_f64(),
            serde_json::Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Label/value pair offered by select and radio fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldOption {
    pub label: String,
    pub value: String,
}

/// How a derived field is computed from its parents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Calculation {
    Sum,
    Difference,
    Age,
    Custom,
}

/// Derivation recipe of a derived field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DerivedLogic {
    pub parent_fields: Vec<String>,
    #[serde(rename = "type")]
    pub calculation: Calculation,
    /// Arithmetic over parent ids; only read for [`Calculation::Custom`].
    #[serde(default)]
    pub formula: String,
}

impl DerivedLogic {
    pub fn new(calculation: Calculation, parents: &[&str]) -> Self {
        Self {
            parent_fields: parents.iter().map(|id| id.to_string()).collect(),
            calculation,
            formula: String::new(),
        }
    }

    pub fn custom(formula: impl Into<String>, parents: &[&str]) -> Self {
        Self {
            formula: formula.into(),
            ..Self::new(Calculation::Custom, parents)
        }
    }
}

/// A single field of a form schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    #[schemars(with = "serde_json::Value")]
    pub default_value: FieldValue,
    #[serde(default)]
    pub validation_rules: Vec<ValidationRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<FieldOption>>,
    #[serde(default)]
    pub is_derived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_logic: Option<DerivedLogic>,
    #[serde(default)]
    pub order: usize,
}

impl FieldSpec {
    pub fn new(id: impl Into<String>, kind: FieldType, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            required: false,
            default_value: FieldValue::Absent,
            validation_rules: Vec::new(),
            options: kind.has_options().then(Vec::new),
            is_derived: false,
            derived_logic: None,
            order: 0,
        }
    }

    pub fn derived(
        id: impl Into<String>,
        kind: FieldType,
        label: impl Into<String>,
        logic: DerivedLogic,
    ) -> Self {
        Self {
            is_derived: true,
            derived_logic: Some(logic),
            ..Self::new(id, kind, label)
        }
    }

    pub fn with_rule(mut self, rule: ValidationRule) -> Self {
        self.validation_rules.push(rule);
        self
    }

    pub fn with_default(mut self, value: impl Into<FieldValue>) -> Self {
        self.default_value = value.into();
        self
    }

    /// Derivation recipe, only when the field is flagged as derived.
    pub fn logic(&self) -> Option<&DerivedLogic> {
        if self.is_derived {
            self.derived_logic.as_ref()
        } else {
            None
        }
    }
}
