#![allow(missing_docs)]

pub mod derive;
pub mod formula;
pub mod graph;
pub mod integrity;
pub mod recompute;
pub mod session;
pub mod spec;
pub mod validate;
pub mod value;

pub use derive::{EvalContext, age_in_years, derive};
pub use formula::{Formula, FormulaError, evaluate, try_evaluate};
pub use graph::DependencyGraph;
pub use integrity::{SchemaError, check_schema, ensure_schema};
pub use recompute::{Recomputation, recompute, recompute_detailed, recompute_with};
pub use session::{PreviewSession, initial_values};
pub use spec::{
    Calculation, DerivedLogic, FieldOption, FieldSpec, FieldType, FormSchema, RuleKind,
    ValidationRule,
};
pub use validate::{ErrorMap, ValidationResult, validate, validate_one};
pub use value::{FieldValue, Values};
