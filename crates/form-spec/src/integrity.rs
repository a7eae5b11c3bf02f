use std::collections::HashSet;

use thiserror::Error;

use crate::formula::{Formula, FormulaError};
use crate::graph::DependencyGraph;
use crate::spec::field::Calculation;
use crate::spec::form::FormSchema;

/// Structural problems that make a schema unfit for preview.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("field id '{0}' is used more than once")]
    DuplicateId(String),
    #[error("field orders must be 0..{expected} without gaps, found {found:?}")]
    OrderNotContiguous { expected: usize, found: Vec<usize> },
    #[error("field '{field}' of type {kind} must define options")]
    MissingOptions { field: String, kind: &'static str },
    #[error("field '{field}' of type {kind} cannot define options")]
    UnexpectedOptions { field: String, kind: &'static str },
    #[error("derived field '{0}' has no derived logic")]
    MissingLogic(String),
    #[error("field '{0}' has derived logic but is not marked derived")]
    UnexpectedLogic(String),
    #[error("derived field '{field}' references unknown field '{parent}'")]
    UnknownParent { field: String, parent: String },
    #[error("derived field '{field}' depends on derived field '{parent}'")]
    DerivedParent { field: String, parent: String },
    #[error("derived fields form a dependency cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
    #[error("formula of '{field}' is invalid: {source}")]
    InvalidFormula {
        field: String,
        #[source]
        source: FormulaError,
    },
    #[error("formula of '{field}' uses '{name}', which is not one of its parents")]
    FormulaNotParent { field: String, name: String },
    #[error("rule {rule} on '{field}' needs a non-negative numeric value")]
    MissingThreshold { field: String, rule: &'static str },
    #[error("default value of '{field}' does not fit type {kind}")]
    IncompatibleDefault { field: String, kind: &'static str },
}

/// Lists every integrity problem of `schema`, field by field. An empty list
/// means the schema is safe to preview.
pub fn check_schema(schema: &FormSchema) -> Vec<SchemaError> {
    let mut problems = Vec::new();

    let mut seen = HashSet::new();
    for field in &schema.fields {
        if !seen.insert(field.id.as_str()) {
            problems.push(SchemaError::DuplicateId(field.id.clone()));
        }
    }

    let mut orders: Vec<usize> = schema.fields.iter().map(|field| field.order).collect();
    orders.sort_unstable();
    if orders.iter().enumerate().any(|(index, order)| index != *order) {
        problems.push(SchemaError::OrderNotContiguous {
            expected: schema.fields.len(),
            found: orders,
        });
    }

    for field in &schema.fields {
        let kind = field.kind.as_str();
        match (field.kind.has_options(), field.options.is_some()) {
            (true, false) => problems.push(SchemaError::MissingOptions {
                field: field.id.clone(),
                kind,
            }),
            (false, true) => problems.push(SchemaError::UnexpectedOptions {
                field: field.id.clone(),
                kind,
            }),
            _ => {}
        }

        if !field.kind.accepts(&field.default_value) {
            problems.push(SchemaError::IncompatibleDefault {
                field: field.id.clone(),
                kind,
            });
        }

        for rule in &field.validation_rules {
            if rule.kind.needs_threshold() && !rule.threshold().is_some_and(|value| value >= 0.0) {
                problems.push(SchemaError::MissingThreshold {
                    field: field.id.clone(),
                    rule: rule.kind.as_str(),
                });
            }
        }

        match (field.is_derived, field.derived_logic.as_ref()) {
            (true, None) => problems.push(SchemaError::MissingLogic(field.id.clone())),
            (false, Some(_)) => problems.push(SchemaError::UnexpectedLogic(field.id.clone())),
            (false, None) => {}
            (true, Some(logic)) => {
                for parent in &logic.parent_fields {
                    match schema.field(parent) {
                        None => problems.push(SchemaError::UnknownParent {
                            field: field.id.clone(),
                            parent: parent.clone(),
                        }),
                        Some(source) if source.is_derived => {
                            problems.push(SchemaError::DerivedParent {
                                field: field.id.clone(),
                                parent: parent.clone(),
                            })
                        }
                        Some(_) => {}
                    }
                }

                if logic.calculation == Calculation::Custom {
                    match Formula::parse(&logic.formula) {
                        Ok(formula) => {
                            for name in formula.variables() {
                                if !logic.parent_fields.contains(&name) {
                                    problems.push(SchemaError::FormulaNotParent {
                                        field: field.id.clone(),
                                        name,
                                    });
                                }
                            }
                        }
                        Err(source) => problems.push(SchemaError::InvalidFormula {
                            field: field.id.clone(),
                            source,
                        }),
                    }
                }
            }
        }
    }

    let cycle = DependencyGraph::build(schema).cycle_members();
    if !cycle.is_empty() {
        problems.push(SchemaError::Cycle(
            cycle.into_iter().map(str::to_string).collect(),
        ));
    }

    problems
}

/// First integrity problem of `schema`, if any.
pub fn ensure_schema(schema: &FormSchema) -> Result<(), SchemaError> {
    match check_schema(schema).into_iter().next() {
        Some(problem) => Err(problem),
        None => Ok(()),
    }
}
