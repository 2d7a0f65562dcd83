//! Pre-execution validation.
//!
//! A class accumulates an ordered list of [`Validation`]s: field/object
//! [`Rule`]s and the type constraints of its declared fields. The
//! [`ValidationEngine`] runs every one of them in declaration order and
//! collects all violations in one pass.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::context::Context;
use crate::error_collection::ErrorCollection;
use crate::type_check::{check, TypeCheck, TypeSpec};
use crate::types::Value;

// ---------------------------------------------------------------------------
// Rule trait
// ---------------------------------------------------------------------------

/// A field- or object-level validation rule.
///
/// Rules read the context and append messages to `errors`; they never
/// mutate the context.
pub trait Rule: Send + Sync {
    fn validate(&self, ctx: &Context, errors: &mut ErrorCollection);
}

impl<F> Rule for F
where
    F: Fn(&Context, &mut ErrorCollection) + Send + Sync,
{
    fn validate(&self, ctx: &Context, errors: &mut ErrorCollection) {
        self(ctx, errors);
    }
}

/// One entry of a class's validation list.
#[derive(Clone)]
pub enum Validation {
    Rule(Arc<dyn Rule>),
    Type { field: String, spec: TypeSpec },
}

impl fmt::Debug for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validation::Rule(_) => f.write_str("Rule(..)"),
            Validation::Type { field, spec } => write!(f, "Type({field}: {spec})"),
        }
    }
}

// ---------------------------------------------------------------------------
// ValidationEngine
// ---------------------------------------------------------------------------

/// Runs a validation list against a context.
pub struct ValidationEngine;

impl ValidationEngine {
    /// Runs every validation in order; never stops at the first failure.
    #[must_use]
    pub fn validate(ctx: &Context, validations: &[Validation]) -> ErrorCollection {
        let mut errors = ErrorCollection::new();
        for validation in validations {
            match validation {
                Validation::Rule(rule) => rule.validate(ctx, &mut errors),
                Validation::Type { field, spec } => {
                    if let TypeCheck::Invalid(message) = check(ctx.get(field), spec) {
                        errors.add(field.clone(), message);
                    }
                }
            }
        }
        errors
    }
}

// ---------------------------------------------------------------------------
// Built-in rules
// ---------------------------------------------------------------------------

fn present(ctx: &Context, field: &str) -> Option<Value> {
    ctx.get(field).filter(|v| !v.is_null()).cloned()
}

/// Field must not be blank.
pub struct Presence {
    field: String,
}

impl Rule for Presence {
    fn validate(&self, ctx: &Context, errors: &mut ErrorCollection) {
        if ctx.get(&self.field).map_or(true, Value::is_blank) {
            errors.add(self.field.clone(), "can't be blank");
        }
    }
}

pub fn presence(field: impl Into<String>) -> Presence {
    Presence {
        field: field.into(),
    }
}

/// Field must be numeric, optionally bounded.
///
/// Numeric strings count as numbers; they are read, not converted.
#[derive(Default)]
pub struct Numericality {
    field: String,
    greater_than: Option<f64>,
    less_than: Option<f64>,
    only_integer: bool,
}

impl Numericality {
    #[must_use]
    pub fn greater_than(mut self, bound: f64) -> Self {
        self.greater_than = Some(bound);
        self
    }

    #[must_use]
    pub fn less_than(mut self, bound: f64) -> Self {
        self.less_than = Some(bound);
        self
    }

    #[must_use]
    pub fn only_integer(mut self) -> Self {
        self.only_integer = true;
        self
    }
}

impl Rule for Numericality {
    fn validate(&self, ctx: &Context, errors: &mut ErrorCollection) {
        let Some(value) = present(ctx, &self.field) else {
            return;
        };
        let number = match &value {
            Value::String(s) => s.trim().parse::<f64>().ok(),
            other => other.as_f64(),
        };
        let Some(number) = number else {
            errors.add(self.field.clone(), "is not a number");
            return;
        };
        if self.only_integer && number.fract() != 0.0 {
            errors.add(self.field.clone(), "must be an integer");
        }
        if let Some(bound) = self.greater_than {
            if number <= bound {
                errors.add(self.field.clone(), format!("must be greater than {bound}"));
            }
        }
        if let Some(bound) = self.less_than {
            if number >= bound {
                errors.add(self.field.clone(), format!("must be less than {bound}"));
            }
        }
    }
}

pub fn numericality(field: impl Into<String>) -> Numericality {
    Numericality {
        field: field.into(),
        ..Numericality::default()
    }
}

/// String field must match a pattern.
pub struct Format {
    field: String,
    pattern: Regex,
}

impl Rule for Format {
    fn validate(&self, ctx: &Context, errors: &mut ErrorCollection) {
        let Some(value) = present(ctx, &self.field) else {
            return;
        };
        if !value.as_str().is_some_and(|s| self.pattern.is_match(s)) {
            errors.add(self.field.clone(), "is invalid");
        }
    }
}

/// # Errors
///
/// Returns the regex compile error for an invalid `pattern`.
pub fn format(field: impl Into<String>, pattern: &str) -> Result<Format, regex::Error> {
    Ok(Format {
        field: field.into(),
        pattern: Regex::new(pattern)?,
    })
}

/// Field must equal one of a fixed list of values.
pub struct Inclusion {
    field: String,
    allowed: Vec<Value>,
}

impl Rule for Inclusion {
    fn validate(&self, ctx: &Context, errors: &mut ErrorCollection) {
        let Some(value) = present(ctx, &self.field) else {
            return;
        };
        if !self.allowed.contains(&value) {
            errors.add(self.field.clone(), "is not included in the list");
        }
    }
}

pub fn inclusion<I, V>(field: impl Into<String>, allowed: I) -> Inclusion
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    Inclusion {
        field: field.into(),
        allowed: allowed.into_iter().map(Into::into).collect(),
    }
}

/// Character length of a string, or element count of an array.
pub struct Length {
    field: String,
    min: Option<usize>,
    max: Option<usize>,
}

impl Rule for Length {
    fn validate(&self, ctx: &Context, errors: &mut ErrorCollection) {
        let Some(value) = present(ctx, &self.field) else {
            return;
        };
        let len = match &value {
            Value::String(s) => s.chars().count(),
            Value::Array(a) => a.len(),
            Value::Bytes(b) => b.len(),
            _ => return,
        };
        if let Some(min) = self.min.filter(|min| len < *min) {
            errors.add(
                self.field.clone(),
                format!("is too short (minimum is {min} characters)"),
            );
        }
        if let Some(max) = self.max.filter(|max| len > *max) {
            errors.add(
                self.field.clone(),
                format!("is too long (maximum is {max} characters)"),
            );
        }
    }
}

pub fn length(field: impl Into<String>, min: Option<usize>, max: Option<usize>) -> Length {
    Length {
        field: field.into(),
        min,
        max,
    }
}
