use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::field::FieldSpec;

/// Top-level form definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormSchema {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl FormSchema {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            fields: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn field(&self, id: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.id == id)
    }

    /// Appends a field at the end of the display order.
    pub fn push_field(&mut self, mut field: FieldSpec) {
        field.order = self.fields.len();
        self.fields.push(field);
    }

    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.push_field(field);
        self
    }

    /// Removes a field and renumbers the remaining ones. Derived fields that named
    /// the removed field as a parent keep the stale id; it coerces to zero.
    pub fn remove_field(&mut self, id: &str) -> Option<FieldSpec> {
        let index = self.fields.iter().position(|field| field.id == id)?;
        let removed = self.fields.remove(index);
        self.renumber();
        Some(removed)
    }

    /// Reorders the fields to follow `ids`, which must name every field exactly once.
    pub fn reorder(&mut self, ids: &[&str]) -> bool {
        if ids.len() != self.fields.len() {
            return false;
        }
        let mut reordered = Vec::with_capacity(ids.len());
        for id in ids {
            match self.fields.iter().position(|field| field.id == *id) {
                Some(index) if !reordered.contains(&index) => reordered.push(index),
                _ => return false,
            }
        }
        let mut slots: Vec<Option<FieldSpec>> = self.fields.drain(..).map(Some).collect();
        self.fields = reordered
            .into_iter()
            .filter_map(|index| slots[index].take())
            .collect();
        self.renumber();
        true
    }

    /// Fields sorted by `order`, declaration position breaking ties.
    pub fn fields_in_order(&self) -> Vec<&FieldSpec> {
        let mut fields: Vec<&FieldSpec> = self.fields.iter().collect();
        fields.sort_by_key(|field| field.order);
        fields
    }

    fn renumber(&mut self) {
        for (index, field) in self.fields.iter_mut().enumerate() {
            field.order = index;
        }
    }
}
