use std::collections::BTreeMap;

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::formula;
use crate::spec::field::{Calculation, DerivedLogic};
use crate::value::{FieldValue, Values};

/// Environment a derivation may read. Only `age` looks at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalContext {
    pub today: NaiveDate,
}

impl EvalContext {
    pub fn now() -> Self {
        Self {
            today: Local::now().date_naive(),
        }
    }

    pub fn on(today: NaiveDate) -> Self {
        Self { today }
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::now()
    }
}

/// Computes a derived value from the current value map. Never fails: unusable
/// parents count as zero.
pub fn derive(logic: &DerivedLogic, values: &Values, ctx: &EvalContext) -> f64 {
    let result = calculate(logic, values, ctx);
    if result.is_finite() { result } else { 0.0 }
}

fn calculate(logic: &DerivedLogic, values: &Values, ctx: &EvalContext) -> f64 {
    let parents: Vec<&FieldValue> = logic
        .parent_fields
        .iter()
        .map(|id| FieldValue::lookup(values, id))
        .collect();

    match logic.calculation {
        Calculation::Sum => parents.iter().map(|value| value.as_number()).sum(),
        Calculation::Difference => match parents.as_slice() {
            [first, second, ..] => first.as_number() - second.as_number(),
            _ => 0.0,
        },
        Calculation::Age => parents
            .first()
            .and_then(|value| value.as_date())
            .map(|birth| f64::from(age_in_years(birth, ctx.today)))
            .unwrap_or(0.0),
        Calculation::Custom => {
            let substitutions: BTreeMap<String, f64> = logic
                .parent_fields
                .iter()
                .zip(&parents)
                .map(|(id, value)| (id.clone(), value.as_number()))
                .collect();
            formula::evaluate(&logic.formula, &substitutions)
        }
    }
}

/// Whole calendar years from `birth` to `today`.
pub fn age_in_years(birth: NaiveDate, today: NaiveDate) -> i32 {
    let years = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years - 1
    } else {
        years
    }
}
