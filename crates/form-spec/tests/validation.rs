use chrono::NaiveDate;
use serde_json::{Value, json};

use form_spec::{
    EvalContext, FieldSpec, FieldType, FieldValue, FormSchema, PreviewSession, RuleKind,
    ValidationRule, Values, recompute_with, validate, validate_one,
};

fn order_form() -> FormSchema {
    serde_json::from_str(include_str!("../tests/fixtures/order_form.json")).expect("deserialize")
}

fn values(input: Value) -> Values {
    serde_json::from_value(input).expect("values")
}

fn ctx() -> EvalContext {
    EvalContext::on(NaiveDate::from_ymd_opt(2024, 6, 15).expect("date"))
}

#[test]
fn validation_reports_first_failure_per_field() {
    let schema = order_form();
    let input = values(json!({ "name": "   ", "email": "a@b", "password": "short" }));
    let result = validate(&schema, &recompute_with(&schema, &input, &ctx()));

    assert!(!result.valid);
    assert_eq!(result.error_for("name"), Some("Name is required"));
    assert_eq!(result.error_for("email"), Some("Enter a valid email"));
    assert_eq!(
        result.error_for("password"),
        Some("At least 8 characters and one digit")
    );
    assert_eq!(result.errors.len(), 3);
}

#[test]
fn complete_answers_are_valid() {
    let schema = order_form();
    let input = values(json!({
        "name": "abcde",
        "email": "a@b.com",
        "password": "hunter42!"
    }));
    let result = validate(&schema, &recompute_with(&schema, &input, &ctx()));
    assert!(result.valid, "unexpected errors: {:?}", result.errors);
    assert!(result.errors.is_empty());
}

#[test]
fn min_length_boundary() {
    let schema = order_form();
    let short = validate(&schema, &values(json!({ "name": "abcd", "password": "abcdefg1" })));
    let exact = validate(&schema, &values(json!({ "name": "abcde", "password": "abcdefg1" })));
    assert_eq!(
        short.error_for("name"),
        Some("Name must have at least 5 characters")
    );
    assert_eq!(exact.error_for("name"), None);
}

#[test]
fn derived_fields_never_report_errors() {
    let schema = order_form();
    let total = schema.field("total").expect("total field");
    assert!(!total.validation_rules.is_empty());

    let result = validate(&schema, &Values::new());
    assert!(!result.errors.contains_key("total"));
    assert!(!result.errors.contains_key("age"));
    assert_eq!(validate_one(total, &FieldValue::Absent, &Values::new()), None);
}

#[test]
fn defaults_without_rules_validate_cleanly() {
    let schema = FormSchema::new("d", "Defaults")
        .with_field(FieldSpec::new("n", FieldType::Number, "N").with_default(7.0))
        .with_field(FieldSpec::new("t", FieldType::Text, "T").with_default("hello"))
        .with_field(FieldSpec::new("c", FieldType::Checkbox, "C").with_default(false));
    let session = PreviewSession::new(schema.clone()).expect("valid schema");
    assert!(validate(&schema, session.values()).valid);
}

#[test]
fn whitespace_only_fails_not_empty() {
    let field = FieldSpec::new("note", FieldType::Textarea, "Note")
        .with_rule(ValidationRule::new(RuleKind::NotEmpty, "Say something"));
    assert_eq!(validate_one(&field, &"   ".into(), &Values::new()), Some("Say something"));
    assert_eq!(
        validate_one(&field, &FieldValue::Absent, &Values::new()),
        Some("Say something")
    );
    assert_eq!(validate_one(&field, &"ok".into(), &Values::new()), None);
}

#[test]
fn result_serializes_as_error_map() {
    let schema = order_form();
    let result = validate(&schema, &values(json!({ "password": "abcdefg1" })));
    let encoded = serde_json::to_value(&result).expect("encode");
    assert_eq!(encoded["valid"], false);
    assert_eq!(encoded["errors"]["name"], "Name is required");
}

#[test]
fn single_field_check_agrees_with_full_validation() {
    let schema = order_form();
    let input = values(json!({ "name": "Bob", "email": "bob@nowhere", "password": "short" }));
    let report = validate(&schema, &input);
    assert!(!report.valid);
    for field in &schema.fields {
        let value = FieldValue::lookup(&input, &field.id);
        assert_eq!(
            validate_one(field, value, &input),
            report.error_for(&field.id),
            "field {}",
            field.id
        );
    }
}
