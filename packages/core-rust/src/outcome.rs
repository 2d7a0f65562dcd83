use std::collections::BTreeMap;

use serde::Serialize;

use crate::context::Context;
use crate::error::ValidationFailure;
use crate::error_collection::ErrorCollection;
use crate::types::Value;

/// Uniform result of one invocation.
///
/// Rebuilt from the [`Context`] at the end of every call. `success` is
/// exactly `errors` being empty; `errors` and `error_messages` are `None`
/// on success.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    class: String,
    success: bool,
    data: Option<Value>,
    fields: BTreeMap<String, Value>,
    errors: Option<ErrorCollection>,
    error_messages: Option<Vec<String>>,
}

impl Outcome {
    pub(crate) fn from_context(ctx: &Context) -> Self {
        let success = ctx.errors().is_empty();
        let (errors, error_messages) = if success {
            (None, None)
        } else {
            (
                Some(ctx.errors().clone()),
                Some(
                    ctx.error_messages()
                        .map_or_else(|| ctx.errors().full_messages(), <[String]>::to_vec),
                ),
            )
        };
        Self {
            class: ctx.class_name().to_string(),
            success,
            data: ctx.data().filter(|v| !v.is_null()).cloned(),
            fields: ctx
                .fields()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
            errors,
            error_messages,
        }
    }

    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.success
    }

    #[must_use]
    pub fn failure(&self) -> bool {
        !self.success
    }

    /// Final result; `None` when validation failed or nothing was produced.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    #[must_use]
    pub fn errors(&self) -> Option<&ErrorCollection> {
        self.errors.as_ref()
    }

    #[must_use]
    pub fn error_messages(&self) -> Option<&[String]> {
        self.error_messages.as_deref()
    }

    /// Value of a declared input or output at the end of the call.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// `Ok(self)` on success.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationFailure` carrying the error collection on failure.
    pub fn into_result(self) -> Result<Self, ValidationFailure> {
        if self.success {
            return Ok(self);
        }
        Err(ValidationFailure {
            class: self.class,
            errors: self.errors.unwrap_or_default(),
        })
    }
}
