use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::types::Value;

/// Key used for errors that belong to the whole object rather than one field.
pub const BASE_KEY: &str = "base";

/// Field name to ordered list of messages.
///
/// Fields keep the order in which their first message was added. An empty
/// collection is the valid state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCollection {
    entries: IndexMap<String, Vec<String>>,
}

impl ErrorCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `message` under `field`.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.entries
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of fields with at least one message.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.entries.get(field).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Appends every message of `other`, keeping this collection's field order.
    pub fn merge(&mut self, other: &ErrorCollection) {
        for (field, messages) in other.iter() {
            for message in messages {
                self.add(field, message.clone());
            }
        }
    }

    /// Renders `"<Field> <message>"` for every entry; `base` messages are bare.
    #[must_use]
    pub fn full_messages(&self) -> Vec<String> {
        self.iter()
            .flat_map(|(field, messages)| {
                messages.iter().map(move |message| {
                    if field == BASE_KEY {
                        message.clone()
                    } else {
                        format!("{} {message}", humanize(field))
                    }
                })
            })
            .collect()
    }

    /// Parses a `Map` of field to array of strings. `Null` yields an empty collection.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::new()),
            Value::Map(map) => {
                let mut errors = Self::new();
                for (field, messages) in map {
                    let Value::Array(messages) = messages else {
                        return None;
                    };
                    for message in messages {
                        errors.add(field.clone(), message.as_str()?);
                    }
                }
                Some(errors)
            }
            _ => None,
        }
    }
}

/// `"first_name"` becomes `"First name"`.
fn humanize(field: &str) -> String {
    let spaced = field.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
