//! Candidate hits and the keys used to group them

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// Resolved extra field values handed to a decline function (field -> values).
pub type FieldValues = HashMap<String, Vec<Value>>;

/// One retrieved item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub score: f32,
    /// Stored field values. A value may be a scalar or an array of scalars;
    /// `null` is treated as absent.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, Value>,
}

impl Candidate {
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
            fields: HashMap::new(),
        }
    }

    /// Builder-style helper to attach a field value
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// Total order used by every score sort: score descending, then id ascending.
pub fn score_order(a: &Candidate, b: &Candidate) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id))
}

/// A globally ordered candidate list plus the informational total-hit count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hits {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub hits: Vec<Candidate>,
}

impl Hits {
    pub fn new(total: u64, hits: Vec<Candidate>) -> Self {
        Self { total, hits }
    }

    /// Wrap a list whose length is also the total count
    pub fn from_candidates(hits: Vec<Candidate>) -> Self {
        Self {
            total: hits.len() as u64,
            hits,
        }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Opaque, totally ordered grouping key.
///
/// The first byte tags the value type (`s` string, `n` number, `b` bool) so
/// that `1` and `"1"` land in different groups. The empty key stands for an
/// absent value and forms its own group.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey(Vec<u8>);

impl GroupKey {
    /// The key shared by all candidates without a group value
    pub fn absent() -> Self {
        Self(Vec::new())
    }

    /// Build a key from the first resolved value of the group field.
    pub fn from_values(values: Option<&[Value]>) -> Self {
        match values.and_then(|v| v.first()) {
            Some(value) => Self::from_value(value),
            None => Self::absent(),
        }
    }

    pub fn from_value(value: &Value) -> Self {
        let (tag, body) = match value {
            Value::String(s) if s.is_empty() => return Self::absent(),
            Value::String(s) => (b's', s.as_bytes().to_vec()),
            Value::Number(n) => (b'n', n.to_string().into_bytes()),
            Value::Bool(b) => (b'b', vec![u8::from(*b)]),
            Value::Null | Value::Array(_) | Value::Object(_) => return Self::absent(),
        };
        let mut bytes = Vec::with_capacity(body.len() + 1);
        bytes.push(tag);
        bytes.extend(body);
        Self(bytes)
    }

    pub fn is_absent(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.split_first() {
            None => write!(f, "<absent>"),
            Some((_, body)) => write!(f, "{}", String::from_utf8_lossy(body)),
        }
    }
}
