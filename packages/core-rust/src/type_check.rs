//! Type constraints attached to declared fields.
//!
//! A [`TypeSpec`] is a closed variant evaluated against one [`Value`] by
//! [`check`]. Absent values always pass: a declared type never implies
//! presence, which is a separate validation rule.

use std::fmt;
use std::sync::Arc;

use crate::types::{Value, ValueType};

/// Result of checking one value against one [`TypeSpec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeCheck {
    Valid,
    Invalid(String),
}

impl TypeCheck {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, TypeCheck::Valid)
    }
}

/// Verdict returned by a [`RichType`] validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RichVerdict {
    Accept,
    Reject,
    /// Rejected, with the validator's own diagnostic appended to the message.
    RejectWith(String),
}

type RichValidator = Arc<dyn Fn(&Value) -> RichVerdict + Send + Sync>;

/// Descriptor-based type with its own validation function.
///
/// The validator only judges the value; it never replaces it. A value a
/// coercing rule would accept keeps its original representation.
#[derive(Clone)]
pub struct RichType {
    descriptor: String,
    validator: RichValidator,
}

impl RichType {
    pub fn new<F>(descriptor: impl Into<String>, validator: F) -> Self
    where
        F: Fn(&Value) -> RichVerdict + Send + Sync + 'static,
    {
        Self {
            descriptor: descriptor.into(),
            validator: Arc::new(validator),
        }
    }

    #[must_use]
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    fn verdict(&self, value: &Value) -> RichVerdict {
        (self.validator)(value)
    }
}

impl fmt::Debug for RichType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RichType")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Declared type of a field.
#[derive(Debug, Clone)]
pub enum TypeSpec {
    /// Value's runtime type must be this type or one of its subtypes.
    Exact(ValueType),
    /// Any of the listed types, in declaration order.
    Union(Vec<ValueType>),
    /// Delegates to a descriptor-based validator.
    Rich(RichType),
}

impl TypeSpec {
    #[must_use]
    pub fn exact(t: ValueType) -> Self {
        TypeSpec::Exact(t)
    }

    /// Builds a union, dropping repeated members while keeping first-seen order.
    pub fn union(types: impl IntoIterator<Item = ValueType>) -> Self {
        let mut members: Vec<ValueType> = Vec::new();
        for t in types {
            if !members.contains(&t) {
                members.push(t);
            }
        }
        TypeSpec::Union(members)
    }

    /// Message reported for a value that fails this spec.
    #[must_use]
    pub fn message(&self) -> String {
        format!("must be a {self}")
    }
}

impl From<ValueType> for TypeSpec {
    fn from(t: ValueType) -> Self {
        TypeSpec::Exact(t)
    }
}

impl From<RichType> for TypeSpec {
    fn from(t: RichType) -> Self {
        TypeSpec::Rich(t)
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSpec::Exact(t) => write!(f, "{t}"),
            TypeSpec::Union(types) => {
                for (i, t) in types.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" or ")?;
                    }
                    write!(f, "{t}")?;
                }
                Ok(())
            }
            TypeSpec::Rich(rich) => f.write_str(&rich.descriptor),
        }
    }
}

/// Checks `value` against `spec`. `None` and [`Value::Null`] are always valid.
#[must_use]
pub fn check(value: Option<&Value>, spec: &TypeSpec) -> TypeCheck {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return TypeCheck::Valid;
    };

    match spec {
        TypeSpec::Exact(expected) => {
            if matches_type(value, *expected) {
                TypeCheck::Valid
            } else {
                TypeCheck::Invalid(spec.message())
            }
        }
        TypeSpec::Union(types) => {
            if types.iter().any(|t| matches_type(value, *t)) {
                TypeCheck::Valid
            } else {
                TypeCheck::Invalid(spec.message())
            }
        }
        TypeSpec::Rich(rich) => match rich.verdict(value) {
            RichVerdict::Accept => TypeCheck::Valid,
            RichVerdict::Reject => TypeCheck::Invalid(spec.message()),
            RichVerdict::RejectWith(diagnostic) => {
                TypeCheck::Invalid(format!("{}: {diagnostic}", spec.message()))
            }
        },
    }
}

fn matches_type(value: &Value, expected: ValueType) -> bool {
    ValueType::of(value).is_some_and(|actual| actual.is_subtype_of(expected))
}

// ---------------------------------------------------------------------------
// Built-in rich types
// ---------------------------------------------------------------------------

/// Integers, or strings that parse as an integer. The string is not converted.
#[must_use]
pub fn coercible_integer() -> RichType {
    RichType::new("coercible Integer", |v| match v {
        Value::Int(_) => RichVerdict::Accept,
        Value::String(s) if s.trim().parse::<i64>().is_ok() => RichVerdict::Accept,
        Value::String(s) => RichVerdict::RejectWith(format!("{s:?} is not an integer literal")),
        _ => RichVerdict::Reject,
    })
}

/// Numbers, or strings that parse as a float.
#[must_use]
pub fn coercible_float() -> RichType {
    RichType::new("coercible Float", |v| match v {
        Value::Int(_) | Value::Float(_) => RichVerdict::Accept,
        Value::String(s) if s.trim().parse::<f64>().is_ok() => RichVerdict::Accept,
        Value::String(s) => RichVerdict::RejectWith(format!("{s:?} is not a number literal")),
        _ => RichVerdict::Reject,
    })
}

/// Arrays whose every element is of type `element`.
#[must_use]
pub fn array_of(element: ValueType) -> RichType {
    RichType::new(format!("Array of {element}"), move |v| {
        let Value::Array(items) = v else {
            return RichVerdict::Reject;
        };
        match items.iter().position(|item| !matches_type(item, element)) {
            None => RichVerdict::Accept,
            Some(index) => RichVerdict::RejectWith(format!("element {index} is not a {element}")),
        }
    })
}

/// Strings drawn from a fixed set.
#[must_use]
pub fn one_of(allowed: &[&str]) -> RichType {
    let allowed: Vec<String> = allowed.iter().map(|s| (*s).to_string()).collect();
    RichType::new(format!("one of {}", allowed.join(", ")), move |v| match v {
        Value::String(s) if allowed.contains(s) => RichVerdict::Accept,
        Value::String(s) => RichVerdict::RejectWith(format!("got {s:?}")),
        _ => RichVerdict::Reject,
    })
}
