use chrono::NaiveDate;

use form_spec::{
    Calculation, DerivedLogic, EvalContext, FieldSpec, FieldType, FieldValue, FormSchema,
    PreviewSession, SchemaError, initial_values,
};

fn ctx() -> EvalContext {
    EvalContext::on(NaiveDate::from_ymd_opt(2024, 6, 15).expect("date"))
}

fn order_form() -> FormSchema {
    serde_json::from_str(include_str!("../tests/fixtures/order_form.json")).expect("deserialize")
}

#[test]
fn initial_values_seed_defaults_and_derived() {
    let values = initial_values(&order_form(), &ctx());
    assert_eq!(values["price"], FieldValue::Number(3.0));
    assert_eq!(values["qty"], FieldValue::Number(4.0));
    assert_eq!(values["shipping"], FieldValue::Text("standard".into()));
    assert_eq!(values["total"], FieldValue::Number(11.0));
    assert_eq!(values["margin"], FieldValue::Number(1.0));
    assert_eq!(values["age"], FieldValue::Number(0.0));
    assert!(!values.contains_key("name"));
}

#[test]
fn editing_recomputes_and_clears_field_error() {
    let mut session = PreviewSession::with_context(order_form(), ctx()).expect("valid schema");
    let result = session.submit();
    assert!(!result.valid);
    assert_eq!(session.errors()["name"], "Name is required");

    session.set_value("name", "Ada Lovelace");
    assert!(!session.errors().contains_key("name"));
    assert!(session.errors().contains_key("password"));

    session.set_value("qty", 10.0);
    assert_eq!(session.value("total"), &FieldValue::Number(23.0));
    assert_eq!(session.value("margin"), &FieldValue::Number(7.0));

    session.set_value("birthday", "2000-06-16");
    assert_eq!(session.value("age"), &FieldValue::Number(23.0));
}

#[test]
fn live_field_check_uses_current_value() {
    let mut session = PreviewSession::with_context(order_form(), ctx()).expect("valid schema");
    session.set_value("email", "nobody");
    assert_eq!(session.validate_field("email"), Some("Enter a valid email"));
    session.set_value("email", "nobody@example.org");
    assert_eq!(session.validate_field("email"), None);
    assert_eq!(session.validate_field("missing"), None);
}

#[test]
fn submit_succeeds_once_inputs_are_fixed() {
    let mut session = PreviewSession::with_context(order_form(), ctx()).expect("valid schema");
    session.set_value("name", "Grace Hopper");
    session.set_value("password", "c0bol-rules");
    let result = session.submit();
    assert!(result.valid, "unexpected errors: {:?}", result.errors);
    assert!(session.errors().is_empty());
}

#[test]
fn reset_restores_defaults_and_blanks() {
    let mut session = PreviewSession::with_context(order_form(), ctx()).expect("valid schema");
    session.set_value("price", 50.0);
    session.set_value("name", "someone");
    session.submit();
    session.reset();

    assert_eq!(session.value("price"), &FieldValue::Number(3.0));
    assert_eq!(session.value("name"), &FieldValue::Text(String::new()));
    assert_eq!(session.value("total"), &FieldValue::Number(11.0));
    assert!(session.errors().is_empty());
}

#[test]
fn session_rejects_derived_from_derived() {
    let schema = FormSchema::new("bad", "Bad")
        .with_field(FieldSpec::new("x", FieldType::Number, "X"))
        .with_field(FieldSpec::derived(
            "y",
            FieldType::Number,
            "Y",
            DerivedLogic::new(Calculation::Sum, &["x"]),
        ))
        .with_field(FieldSpec::derived(
            "z",
            FieldType::Number,
            "Z",
            DerivedLogic::new(Calculation::Sum, &["y"]),
        ));
    let error = PreviewSession::new(schema).expect_err("derived parent");
    assert_eq!(
        error,
        SchemaError::DerivedParent {
            field: "z".into(),
            parent: "y".into()
        }
    );
}
