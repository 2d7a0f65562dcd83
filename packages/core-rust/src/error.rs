use crate::error_collection::ErrorCollection;

/// Errors raised by an invocation or a declaration block.
///
/// These represent misuse or unexpected failure and always propagate to the
/// caller. Expected domain failures are returned as data in an
/// [`Outcome`](crate::Outcome) instead.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{class} does not declare field `{name}`")]
    UndeclaredFieldWrite { name: String, class: String },
    #[error("invalid value for `{key}`: expected {expected}")]
    InvalidBaseValue { key: String, expected: &'static str },
    #[error("{class} was unrestricted and cannot be restricted again")]
    RestrictionLocked { class: String },
    #[error("{class} raised: {source}")]
    Routine {
        class: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ServiceError {
    /// Wraps an error escaping a routine or callback, keeping `ServiceError`s intact.
    pub(crate) fn from_routine(class: &str, err: anyhow::Error) -> Self {
        match err.downcast::<ServiceError>() {
            Ok(service_error) => service_error,
            Err(source) => ServiceError::Routine {
                class: class.to_string(),
                source,
            },
        }
    }
}

/// A failed [`Outcome`](crate::Outcome) converted into an error value.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{class} failed: {}", errors.full_messages().join(", "))]
pub struct ValidationFailure {
    pub class: String,
    pub errors: ErrorCollection,
}
