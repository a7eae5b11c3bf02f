pub mod field;
pub mod form;

pub use field::{
    Calculation, DerivedLogic, FieldOption, FieldSpec, FieldType, RuleKind, ValidationRule,
};
pub use form::FormSchema;
