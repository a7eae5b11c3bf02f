use crate::derive::{EvalContext, derive};
use crate::integrity::{SchemaError, ensure_schema};
use crate::recompute::recompute_with;
use crate::spec::form::FormSchema;
use crate::validate::{ErrorMap, ValidationResult, validate, validate_one};
use crate::value::{FieldValue, Values};

/// Seeds a fresh value map: defaults for input fields, computed values for
/// derived fields, nothing for the rest.
pub fn initial_values(schema: &FormSchema, ctx: &EvalContext) -> Values {
    let mut values = Values::new();
    for field in schema.fields_in_order() {
        if let Some(logic) = field.logic() {
            let computed = derive(logic, &values, ctx);
            values.insert(field.id.clone(), FieldValue::Number(computed));
        } else if !field.default_value.is_absent() {
            values.insert(field.id.clone(), field.default_value.clone());
        }
    }
    recompute_with(schema, &values, ctx)
}

/// One preview of a schema: the live value map plus the last reported errors.
///
/// The session only sequences the stateless engine calls (store input,
/// recompute, validate); it never persists anything.
#[derive(Debug, Clone)]
pub struct PreviewSession {
    schema: FormSchema,
    ctx: EvalContext,
    values: Values,
    errors: ErrorMap,
}

impl PreviewSession {
    pub fn new(schema: FormSchema) -> Result<Self, SchemaError> {
        Self::with_context(schema, EvalContext::now())
    }

    pub fn with_context(schema: FormSchema, ctx: EvalContext) -> Result<Self, SchemaError> {
        ensure_schema(&schema)?;
        let values = initial_values(&schema, &ctx);
        Ok(Self {
            schema,
            ctx,
            values,
            errors: ErrorMap::new(),
        })
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    pub fn value(&self, id: &str) -> &FieldValue {
        FieldValue::lookup(&self.values, id)
    }

    pub fn errors(&self) -> &ErrorMap {
        &self.errors
    }

    /// Stores user input for `id`, recomputes derived fields and drops the
    /// stale error of the edited field.
    pub fn set_value(&mut self, id: &str, value: impl Into<FieldValue>) {
        self.values.insert(id.to_string(), value.into());
        self.values = recompute_with(&self.schema, &self.values, &self.ctx);
        self.errors.remove(id);
    }

    /// Live check of one field against the current values.
    pub fn validate_field(&self, id: &str) -> Option<&str> {
        let field = self.schema.field(id)?;
        validate_one(field, self.value(id), &self.values)
    }

    /// Full validation; the result replaces the stored errors.
    pub fn submit(&mut self) -> ValidationResult {
        self.values = recompute_with(&self.schema, &self.values, &self.ctx);
        let result = validate(&self.schema, &self.values);
        self.errors = result.errors.clone();
        result
    }

    /// Back to defaults. Inputs without a default become empty strings.
    pub fn reset(&mut self) {
        let mut values = initial_values(&self.schema, &self.ctx);
        for field in &self.schema.fields {
            if field.logic().is_none() && !values.contains_key(&field.id) {
                values.insert(field.id.clone(), FieldValue::Text(String::new()));
            }
        }
        self.values = values;
        self.errors.clear();
    }
}
