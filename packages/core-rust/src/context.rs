use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::ServiceError;
use crate::error_collection::ErrorCollection;
use crate::registry::BASE_KEYS;
use crate::types::{Args, Value};

/// Write check consulted on every [`Context::set`].
///
/// Built per invocation from the class's registry, so an `unrestrict` on
/// the class is honoured by the next call without rebuilding anything.
#[derive(Debug, Clone)]
pub enum WriteGate {
    /// Any key may be written.
    Open,
    /// Only keys in `allowed` may be written.
    Restricted {
        class: String,
        allowed: Arc<HashSet<String>>,
    },
}

impl WriteGate {
    #[must_use]
    pub fn restricted(class: &str, allowed: HashSet<String>) -> Self {
        WriteGate::Restricted {
            class: class.to_string(),
            allowed: Arc::new(allowed),
        }
    }

    /// # Errors
    ///
    /// Returns `ServiceError::UndeclaredFieldWrite` when the gate is
    /// restricted and `name` is not an allowed key.
    pub fn check(&self, name: &str) -> Result<(), ServiceError> {
        match self {
            WriteGate::Open => Ok(()),
            WriteGate::Restricted { allowed, .. } if allowed.contains(name) => Ok(()),
            WriteGate::Restricted { class, .. } => Err(ServiceError::UndeclaredFieldWrite {
                name: name.to_string(),
                class: class.clone(),
            }),
        }
    }
}

/// Per-invocation record of field values plus the result and error slots.
///
/// Owned by the invocation that created it and never shared. All writes go
/// through [`set`](Self::set), which consults the [`WriteGate`] before the
/// value reaches storage.
#[derive(Debug)]
pub struct Context {
    class_name: String,
    gate: WriteGate,
    values: HashMap<String, Value>,
    result: Option<Value>,
    data: Option<Value>,
    errors: ErrorCollection,
    error_messages: Option<Vec<String>>,
}

impl Context {
    /// Creates an empty context guarded by `gate`.
    #[must_use]
    pub fn new(class_name: impl Into<String>, gate: WriteGate) -> Self {
        Self {
            class_name: class_name.into(),
            gate,
            values: HashMap::new(),
            result: None,
            data: None,
            errors: ErrorCollection::new(),
            error_messages: None,
        }
    }

    /// Creates a context and writes every caller argument through the gate.
    ///
    /// The result and error slots belong to the business logic and its
    /// callbacks; callers cannot seed them.
    ///
    /// # Errors
    ///
    /// Fails on the first argument naming a base key or rejected by the gate.
    pub fn from_args(
        class_name: impl Into<String>,
        gate: WriteGate,
        args: Args,
    ) -> Result<Self, ServiceError> {
        let mut ctx = Self::new(class_name, gate);
        for (name, value) in args {
            if BASE_KEYS.contains(&name.as_str()) {
                return Err(ServiceError::UndeclaredFieldWrite {
                    name,
                    class: ctx.class_name.clone(),
                });
            }
            ctx.set(name, value)?;
        }
        Ok(ctx)
    }

    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    #[must_use]
    pub fn is_restricted(&self) -> bool {
        matches!(self.gate, WriteGate::Restricted { .. })
    }

    /// Stores `value` under `name`.
    ///
    /// `result` and `data` write their slots, `errors` replaces the error
    /// collection (a map of field to string array, or null to clear), and
    /// `error_messages` takes an array of strings.
    ///
    /// # Errors
    ///
    /// `UndeclaredFieldWrite` if the gate rejects `name`; `InvalidBaseValue`
    /// if a base key receives a value of the wrong shape. Nothing is stored
    /// on error.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<(), ServiceError> {
        let name = name.into();
        self.gate.check(&name)?;
        let value = value.into();
        match name.as_str() {
            "result" => self.result = Some(value),
            "data" => self.data = Some(value),
            "errors" => {
                self.errors = ErrorCollection::from_value(&value).ok_or_else(|| {
                    ServiceError::InvalidBaseValue {
                        key: name.clone(),
                        expected: "a map of field to string array",
                    }
                })?;
            }
            "error_messages" => {
                self.error_messages = Some(string_list(&value).ok_or_else(|| {
                    ServiceError::InvalidBaseValue {
                        key: name.clone(),
                        expected: "an array of strings",
                    }
                })?);
            }
            _ => {
                self.values.insert(name, value);
            }
        }
        Ok(())
    }

    /// Stored value for `name`; unset fields read as `None`.
    ///
    /// `result` and `data` read their slots. Errors are read through
    /// [`errors`](Self::errors) and [`error_messages`](Self::error_messages).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        match name {
            "result" => self.result.as_ref(),
            "data" => self.data.as_ref(),
            _ => self.values.get(name),
        }
    }

    /// Stored field values, excluding the base slots.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn has_result(&self) -> bool {
        self.result.is_some()
    }

    /// Explicitly sets the result; an explicit result wins over the
    /// routine's return value.
    pub fn set_result(&mut self, value: impl Into<Value>) {
        self.result = Some(value.into());
    }

    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    #[must_use]
    pub fn errors(&self) -> &ErrorCollection {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut ErrorCollection {
        &mut self.errors
    }

    /// Records a domain failure under `field` without raising.
    pub fn fail(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.add(field, message);
    }

    #[must_use]
    pub fn error_messages(&self) -> Option<&[String]> {
        self.error_messages.as_deref()
    }

    pub(crate) fn finalize(&mut self) {
        self.data.clone_from(&self.result);
        if !self.errors.is_empty() && self.error_messages.is_none() {
            self.error_messages = Some(self.errors.full_messages());
        }
    }
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Null => Some(Vec::new()),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}
