use std::collections::{BTreeSet, HashMap};

use crate::spec::form::FormSchema;

/// Parent → derived edges of a schema.
///
/// Only derived fields are nodes; a parent that is not itself derived is an
/// input and never constrains ordering. Unknown parent ids are ignored.
#[derive(Debug)]
pub struct DependencyGraph<'a> {
    schema: &'a FormSchema,
    derived: Vec<usize>,
    /// `inputs[i]` lists the derived fields that derived field `derived[i]` reads.
    inputs: Vec<Vec<usize>>,
}

impl<'a> DependencyGraph<'a> {
    pub fn build(schema: &'a FormSchema) -> Self {
        let mut index_of: HashMap<&str, usize> = HashMap::new();
        for (index, field) in schema.fields.iter().enumerate() {
            index_of.entry(field.id.as_str()).or_insert(index);
        }

        let derived: Vec<usize> = schema
            .fields
            .iter()
            .enumerate()
            .filter(|(_, field)| field.logic().is_some())
            .map(|(index, _)| index)
            .collect();
        let slot_of: HashMap<usize, usize> = derived
            .iter()
            .enumerate()
            .map(|(slot, index)| (*index, slot))
            .collect();

        let inputs = derived
            .iter()
            .map(|index| {
                let mut reads = Vec::new();
                let Some(logic) = schema.fields[*index].logic() else {
                    return reads;
                };
                for parent in &logic.parent_fields {
                    if let Some(slot) = index_of
                        .get(parent.as_str())
                        .and_then(|parent_index| slot_of.get(parent_index))
                        && !reads.contains(slot)
                    {
                        reads.push(*slot);
                    }
                }
                reads
            })
            .collect();

        Self {
            schema,
            derived,
            inputs,
        }
    }

    pub fn derived_count(&self) -> usize {
        self.derived.len()
    }

    /// Ids of the derived fields that `id` reads from.
    pub fn derived_parents(&self, id: &str) -> Vec<&'a str> {
        let schema = self.schema;
        self.derived
            .iter()
            .position(|index| schema.fields[*index].id == id)
            .map(|slot| {
                self.inputs[slot]
                    .iter()
                    .map(|input| schema.fields[self.derived[*input]].id.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Field indices of every derived field, parents before dependents. Ties
    /// follow `order`; fields caught in a cycle come last, in `order`.
    pub fn evaluation_order(&self) -> Vec<usize> {
        let count = self.derived.len();
        let mut pending: Vec<usize> = self.inputs.iter().map(Vec::len).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (slot, reads) in self.inputs.iter().enumerate() {
            for input in reads {
                dependents[*input].push(slot);
            }
        }

        let rank = |slot: usize| (self.schema.fields[self.derived[slot]].order, slot);
        let mut ready: BTreeSet<(usize, usize)> = (0..count)
            .filter(|slot| pending[*slot] == 0)
            .map(rank)
            .collect();
        let mut placed = vec![false; count];
        let mut sequence = Vec::with_capacity(count);

        while let Some((_, slot)) = ready.pop_first() {
            placed[slot] = true;
            sequence.push(self.derived[slot]);
            for dependent in &dependents[slot] {
                pending[*dependent] -= 1;
                if pending[*dependent] == 0 {
                    ready.insert(rank(*dependent));
                }
            }
        }

        let mut stuck: Vec<usize> = (0..count).filter(|slot| !placed[*slot]).collect();
        stuck.sort_by_key(|slot| rank(*slot));
        sequence.extend(stuck.into_iter().map(|slot| self.derived[slot]));
        sequence
    }

    /// Ids of derived fields that sit on a dependency cycle, in field order.
    pub fn cycle_members(&self) -> Vec<&'a str> {
        let count = self.derived.len();
        let mut alive = vec![true; count];

        // Peel off nodes without live inputs, then nodes without live dependents;
        // whatever survives both passes lies on a cycle.
        loop {
            let mut changed = false;
            for slot in 0..count {
                if !alive[slot] {
                    continue;
                }
                let has_input = self.inputs[slot].iter().any(|input| alive[*input]);
                let has_dependent = (0..count)
                    .any(|other| alive[other] && self.inputs[other].contains(&slot));
                if !has_input || !has_dependent {
                    alive[slot] = false;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        (0..count)
            .filter(|slot| alive[*slot])
            .map(|slot| self.schema.fields[self.derived[slot]].id.as_str())
            .collect()
    }
}
