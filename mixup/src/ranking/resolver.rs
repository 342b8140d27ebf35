//! Field value resolution for window candidates
//!
//! The re-ranker only needs to look up a field once per candidate, in any
//! order. Resolution is therefore decoupled from any storage layout: values
//! can come from the candidate itself, from a side table, or from a closure.

use crate::candidate::Candidate;
use crate::Result;
use serde_json::Value;
use std::collections::HashMap;

/// Resolves field values for a candidate.
///
/// `Ok(None)` means the candidate has no value for the field, which is a
/// normal condition (e.g. an empty group key).
pub trait FieldResolver {
    fn resolve(&self, candidate: &Candidate, field: &str) -> Result<Option<Vec<Value>>>;
}

impl<F> FieldResolver for F
where
    F: Fn(&Candidate, &str) -> Result<Option<Vec<Value>>>,
{
    fn resolve(&self, candidate: &Candidate, field: &str) -> Result<Option<Vec<Value>>> {
        self(candidate, field)
    }
}

/// Reads values from `Candidate::fields`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoredFields;

impl FieldResolver for StoredFields {
    fn resolve(&self, candidate: &Candidate, field: &str) -> Result<Option<Vec<Value>>> {
        Ok(candidate.fields.get(field).and_then(normalize_values))
    }
}

/// Side table of field values keyed by candidate id.
#[derive(Debug, Clone, Default)]
pub struct FieldTable {
    values: HashMap<String, HashMap<String, Vec<Value>>>,
}

impl FieldTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, field: impl Into<String>, values: Vec<Value>) {
        self.values
            .entry(id.into())
            .or_default()
            .insert(field.into(), values);
    }
}

impl FieldResolver for FieldTable {
    fn resolve(&self, candidate: &Candidate, field: &str) -> Result<Option<Vec<Value>>> {
        Ok(self
            .values
            .get(&candidate.id)
            .and_then(|fields| fields.get(field))
            .filter(|values| !values.is_empty())
            .cloned())
    }
}

/// Flatten a stored value into a list of scalars. `null` and empty arrays are absent.
fn normalize_values(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Null => None,
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().filter(|v| !v.is_null()).cloned().collect();
            if values.is_empty() {
                None
            } else {
                Some(values)
            }
        }
        other => Some(vec![other.clone()]),
    }
}
