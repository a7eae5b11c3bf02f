use tracing::{debug, warn};

use crate::derive::{EvalContext, derive};
use crate::graph::DependencyGraph;
use crate::spec::form::FormSchema;
use crate::value::{FieldValue, Values};

/// Outcome of a recomputation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Recomputation {
    pub values: Values,
    /// Full passes over the derived fields, including the confirming pass.
    pub passes: usize,
    pub converged: bool,
}

/// Recomputes every derived field against today's date.
pub fn recompute(schema: &FormSchema, values: &Values) -> Values {
    recompute_with(schema, values, &EvalContext::now())
}

pub fn recompute_with(schema: &FormSchema, values: &Values, ctx: &EvalContext) -> Values {
    recompute_detailed(schema, values, ctx).values
}

/// Repeats passes over the derived fields until a pass changes nothing.
///
/// Derived fields are visited parents-first, so a well-formed schema settles
/// after one computing pass and one confirming pass. Passes are capped at the
/// number of derived fields plus one; a schema that still changes at that point
/// (only possible with cyclic logic) keeps the values of the last pass.
///
/// Entries whose id is not a field of `schema` are dropped, so a removed field
/// can never feed a derivation.
pub fn recompute_detailed(
    schema: &FormSchema,
    values: &Values,
    ctx: &EvalContext,
) -> Recomputation {
    let order = DependencyGraph::build(schema).evaluation_order();
    let mut current: Values = values
        .iter()
        .filter(|(id, _)| schema.field(id).is_some())
        .map(|(id, value)| (id.clone(), value.clone()))
        .collect();
    if order.is_empty() {
        return Recomputation {
            values: current,
            passes: 0,
            converged: true,
        };
    }

    let max_passes = order.len() + 1;
    let mut passes = 0;
    while passes < max_passes {
        passes += 1;
        let mut changed = false;
        for index in &order {
            let field = &schema.fields[*index];
            let Some(logic) = field.logic() else {
                continue;
            };
            let next = FieldValue::Number(derive(logic, &current, ctx));
            if current.get(&field.id) != Some(&next) {
                current.insert(field.id.clone(), next);
                changed = true;
            }
        }
        if !changed {
            debug!(schema = %schema.id, passes, "derived values converged");
            return Recomputation {
                values: current,
                passes,
                converged: true,
            };
        }
    }

    warn!(
        schema = %schema.id,
        passes,
        "derived values still changing at pass cap; keeping last pass"
    );
    Recomputation {
        values: current,
        passes,
        converged: false,
    }
}
