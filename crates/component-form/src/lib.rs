use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

use form_spec::{
    EvalContext, FieldValue, FormSchema, ValidationResult, Values, check_schema, initial_values,
    recompute_detailed, recompute_with, validate, validate_one,
};

const DEFAULT_SCHEMA: &str = include_str!("../../form-spec/tests/fixtures/order_form.json");

#[derive(Debug, Error)]
enum ComponentError {
    #[error("failed to parse config/{0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("failed to parse values: {0}")]
    ValuesParse(#[source] serde_json::Error),
    #[error("field '{0}' is not part of the form")]
    FieldUnavailable(String),
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct ComponentConfig {
    #[serde(default)]
    form_schema_json: Option<String>,
    #[serde(default)]
    today: Option<NaiveDate>,
}

struct Loaded {
    schema: FormSchema,
    ctx: EvalContext,
}

fn load(config_json: &str) -> Result<Loaded, ComponentError> {
    let config = if config_json.trim().is_empty() {
        ComponentConfig::default()
    } else {
        serde_json::from_str(config_json).map_err(ComponentError::ConfigParse)?
    };

    let schema_json = config.form_schema_json.as_deref().unwrap_or(DEFAULT_SCHEMA);
    let schema = serde_json::from_str(schema_json).map_err(ComponentError::ConfigParse)?;
    let ctx = config.today.map(EvalContext::on).unwrap_or_default();
    Ok(Loaded { schema, ctx })
}

fn parse_values(values_json: &str) -> Result<Values, ComponentError> {
    if values_json.trim().is_empty() {
        return Ok(Values::new());
    }
    serde_json::from_str(values_json).map_err(ComponentError::ValuesParse)
}

fn values_to_json(values: &Values) -> Value {
    Value::Object(
        values
            .iter()
            .map(|(id, value)| (id.clone(), value.to_json()))
            .collect::<Map<_, _>>(),
    )
}

fn respond(result: Result<Value, ComponentError>) -> String {
    match result {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|error| {
            json!({"error": format!("json encode: {}", error)}).to_string()
        }),
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

fn encode_validation(result: &ValidationResult) -> Result<Value, ComponentError> {
    serde_json::to_value(result).map_err(ComponentError::JsonEncode)
}

/// Returns the configured schema as JSON.
pub fn describe(config_json: &str) -> String {
    respond(load(config_json).and_then(|loaded| {
        serde_json::to_value(loaded.schema).map_err(ComponentError::JsonEncode)
    }))
}

/// Lists integrity problems of the configured schema.
pub fn check(config_json: &str) -> String {
    respond(load(config_json).map(|loaded| {
        let problems: Vec<String> = check_schema(&loaded.schema)
            .iter()
            .map(ToString::to_string)
            .collect();
        json!({ "ok": problems.is_empty(), "problems": problems })
    }))
}

pub fn initial(config_json: &str) -> String {
    respond(
        load(config_json)
            .map(|loaded| values_to_json(&initial_values(&loaded.schema, &loaded.ctx))),
    )
}

pub fn recompute(config_json: &str, values_json: &str) -> String {
    respond(load(config_json).and_then(|loaded| {
        let values = parse_values(values_json)?;
        let result = recompute_detailed(&loaded.schema, &values, &loaded.ctx);
        Ok(json!({
            "values": values_to_json(&result.values),
            "passes": result.passes,
            "converged": result.converged,
        }))
    }))
}

/// Recomputes, then validates every field.
pub fn validate_values(config_json: &str, values_json: &str) -> String {
    respond(load(config_json).and_then(|loaded| {
        let values = parse_values(values_json)?;
        let values = recompute_with(&loaded.schema, &values, &loaded.ctx);
        encode_validation(&validate(&loaded.schema, &values))
    }))
}

pub fn validate_field(config_json: &str, field_id: &str, values_json: &str) -> String {
    respond(load(config_json).and_then(|loaded| {
        let field = loaded
            .schema
            .field(field_id)
            .ok_or_else(|| ComponentError::FieldUnavailable(field_id.to_string()))?;
        let values = recompute_with(&loaded.schema, &parse_values(values_json)?, &loaded.ctx);
        let message = validate_one(field, FieldValue::lookup(&values, field_id), &values);
        Ok(json!({ "field_id": field_id, "error": message }))
    }))
}

/// Applies a single edit, recomputes and validates the whole form.
pub fn submit_patch(
    config_json: &str,
    values_json: &str,
    field_id: &str,
    value_json: &str,
) -> String {
    respond(load(config_json).and_then(|loaded| {
        if loaded.schema.field(field_id).is_none() {
            return Err(ComponentError::FieldUnavailable(field_id.to_string()));
        }
        let value: FieldValue =
            serde_json::from_str(value_json).map_err(ComponentError::ValuesParse)?;
        let mut values = parse_values(values_json)?;
        values.insert(field_id.to_string(), value);
        let values = recompute_with(&loaded.schema, &values, &loaded.ctx);
        let validation = validate(&loaded.schema, &values);
        Ok(json!({
            "status": if validation.valid { "valid" } else { "error" },
            "values": values_to_json(&values),
            "validation": encode_validation(&validation)?,
        }))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pinned() -> String {
        json!({ "today": "2024-06-15" }).to_string()
    }

    #[test]
    fn describe_returns_schema_json() {
        let payload = describe("");
        let schema: Value = serde_json::from_str(&payload).expect("valid json");
        assert_eq!(schema["name"], "Order");
        assert_eq!(schema["fields"][0]["validationRules"][0]["type"], "required");
    }

    #[test]
    fn default_schema_passes_check() {
        let parsed: Value = serde_json::from_str(&check("")).expect("json");
        assert_eq!(parsed["ok"], true);
    }

    #[test]
    fn check_lists_problems() {
        let schema = json!({
            "id": "broken",
            "name": "Broken",
            "fields": [
                { "id": "a", "type": "number", "label": "A", "order": 0 },
                {
                    "id": "b", "type": "number", "label": "B", "order": 1,
                    "isDerived": true,
                    "derivedLogic": { "parentFields": ["gone"], "type": "sum", "formula": "" }
                }
            ]
        });
        let config = json!({ "form_schema_json": schema.to_string() });
        let parsed: Value = serde_json::from_str(&check(&config.to_string())).expect("json");
        assert_eq!(parsed["ok"], false);
        assert_eq!(
            parsed["problems"][0],
            "derived field 'b' references unknown field 'gone'"
        );
    }

    #[test]
    fn initial_seeds_defaults() {
        let parsed: Value = serde_json::from_str(&initial(&pinned())).expect("json");
        assert_eq!(parsed["price"], 3);
        assert_eq!(parsed["total"], 11);
        assert!(parsed.get("name").is_none());
    }

    #[test]
    fn recompute_reports_convergence() {
        let response = recompute(&pinned(), r#"{"price": 2, "qty": 5}"#);
        let parsed: Value = serde_json::from_str(&response).expect("json");
        assert_eq!(parsed["values"]["total"], 12);
        assert_eq!(parsed["converged"], true);
        assert_eq!(parsed["passes"], 2);
    }

    #[test]
    fn validate_values_returns_error_map() {
        let response = validate_values(&pinned(), r#"{"name": "abc", "password": "abcdefg1"}"#);
        let parsed: Value = serde_json::from_str(&response).expect("json");
        assert_eq!(parsed["valid"], false);
        assert_eq!(
            parsed["errors"]["name"],
            "Name must have at least 5 characters"
        );
        assert!(parsed["errors"].get("total").is_none());
    }

    #[test]
    fn validate_field_checks_one_field() {
        let response = validate_field(&pinned(), "email", r#"{"email": "x@y"}"#);
        let parsed: Value = serde_json::from_str(&response).expect("json");
        assert_eq!(parsed["error"], "Enter a valid email");

        let response = validate_field(&pinned(), "nope", "{}");
        let parsed: Value = serde_json::from_str(&response).expect("json");
        assert_eq!(parsed["error"], "field 'nope' is not part of the form");
    }

    #[test]
    fn submit_patch_recomputes_and_validates() {
        let values = json!({ "name": "Alan Turing", "password": "enigma1939" });
        let response = submit_patch(&pinned(), &values.to_string(), "qty", "7");
        let parsed: Value = serde_json::from_str(&response).expect("json");
        assert_eq!(parsed["status"], "valid");
        assert_eq!(parsed["values"]["total"], 14);
        assert_eq!(parsed["values"]["qty"], 7);
    }

    #[test]
    fn submit_patch_reports_validation_error() {
        let response = submit_patch(&pinned(), "{}", "name", r#""  ""#);
        let parsed: Value = serde_json::from_str(&response).expect("json");
        assert_eq!(parsed["status"], "error");
        assert_eq!(parsed["validation"]["errors"]["name"], "Name is required");
    }

    #[test]
    fn malformed_values_surface_parse_error() {
        let response = validate_values(&pinned(), "{not json");
        let parsed: Value = serde_json::from_str(&response).expect("json");
        assert!(
            parsed["error"]
                .as_str()
                .is_some_and(|message| message.starts_with("failed to parse values"))
        );
    }
}
