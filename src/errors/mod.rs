//! # Error Handling
//!
//! This module defines the error taxonomy for the schema processing core.
//! Every fallible entry point returns [`Result`]; most schema-level problems
//! are not fatal and are instead accumulated as [`crate::diagnostic::Diagnostic`]
//! values rather than returned as `Err`. Only structurally unrecoverable
//! situations (an internal invariant broken, a cancellation signal observed,
//! a hard resource limit hit) ever reach this type.

use crate::pointer::Pointer;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, CoreError>;

/// The error taxonomy a collaborator can match on. Variants line up with the
/// diagnostic kinds surfaced through [`crate::diagnostic::Diagnostic`]; the
/// difference is that a `CoreError` always aborts the operation that raised
/// it, where a `Diagnostic` is collected and the operation continues.
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    /// The input document was not valid JSON, or a `$ref` target could not
    /// be parsed as a JSON Pointer.
    #[error("parse error at {pointer}: {message}")]
    Parse { pointer: Pointer, message: String },

    /// A `$ref` or `$dynamicRef` could not be resolved, or a cycle was
    /// rejected outright (before the cycle-tolerance policy applies).
    #[error("reference error at {pointer}: {message}")]
    Reference { pointer: Pointer, message: String },

    /// A schema node is structurally invalid independent of any instance
    /// being validated against it (e.g. `type` is not a string or array of
    /// strings, `items` is neither schema nor array).
    #[error("schema structure error at {pointer}: {message}")]
    SchemaStructure { pointer: Pointer, message: String },

    /// Data failed validation in a context where the caller asked for a
    /// hard failure instead of an accumulated diagnostic list (used by
    /// `RequestValidator` in strict mode).
    #[error("data validation error at {pointer}: {message}")]
    DataValidation { pointer: Pointer, message: String },

    /// An internal invariant was violated. This always indicates a bug in
    /// this crate, never bad input.
    #[error("internal invariant violated: {message}")]
    Invariant { message: String },

    /// A configured resource limit was exceeded (arena depth, cache
    /// capacity, regex compiled-size budget, generator recursion depth).
    #[error("limit exceeded: {message}")]
    LimitExceeded { message: String },

    /// The operation observed a [`crate::cancellation::CancellationToken`]
    /// that had already been cancelled.
    #[error("operation cancelled: {message}")]
    Cancelled { message: String },

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl CoreError {
    pub fn parse<S: Into<String>>(pointer: Pointer, message: S) -> Self {
        Self::Parse { pointer, message: message.into() }
    }

    pub fn reference<S: Into<String>>(pointer: Pointer, message: S) -> Self {
        Self::Reference { pointer, message: message.into() }
    }

    pub fn schema_structure<S: Into<String>>(pointer: Pointer, message: S) -> Self {
        Self::SchemaStructure { pointer, message: message.into() }
    }

    pub fn data_validation<S: Into<String>>(pointer: Pointer, message: S) -> Self {
        Self::DataValidation { pointer, message: message.into() }
    }

    pub fn invariant<S: Into<String>>(message: S) -> Self {
        Self::Invariant { message: message.into() }
    }

    pub fn limit_exceeded<S: Into<String>>(message: S) -> Self {
        Self::LimitExceeded { message: message.into() }
    }

    pub fn cancelled<S: Into<String>>(message: S) -> Self {
        Self::Cancelled { message: message.into() }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Whether retrying the same operation (e.g. after backing off) could
    /// plausibly change the outcome. Only cancellation and limit errors are
    /// retryable; the rest reflect input or program state that won't change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Cancelled { .. } | CoreError::LimitExceeded { .. })
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(error: serde_json::Error) -> Self {
        Self::Parse { pointer: Pointer::root(), message: error.to_string() }
    }
}

impl From<regex::Error> for CoreError {
    fn from(error: regex::Error) -> Self {
        Self::SchemaStructure { pointer: Pointer::root(), message: error.to_string() }
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(error: config::ConfigError) -> Self {
        Self::config_with_source("failed to load configuration", Box::new(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_expected_variant() {
        let p = Pointer::root();
        assert!(matches!(CoreError::parse(p.clone(), "bad"), CoreError::Parse { .. }));
        assert!(matches!(CoreError::reference(p.clone(), "bad"), CoreError::Reference { .. }));
        assert!(matches!(CoreError::invariant("bad"), CoreError::Invariant { .. }));
    }

    #[test]
    fn only_cancelled_and_limit_are_retryable() {
        assert!(CoreError::cancelled("x").is_retryable());
        assert!(CoreError::limit_exceeded("x").is_retryable());
        assert!(!CoreError::invariant("x").is_retryable());
        assert!(!CoreError::parse(Pointer::root(), "x").is_retryable());
    }

    #[test]
    fn json_errors_convert_to_parse() {
        let err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let core: CoreError = err.into();
        assert!(matches!(core, CoreError::Parse { .. }));
    }

    #[test]
    fn display_includes_pointer_and_message() {
        let err = CoreError::reference(Pointer::parse("/components/schemas/Foo").unwrap(), "missing target");
        let text = err.to_string();
        assert!(text.contains("/components/schemas/Foo"));
        assert!(text.contains("missing target"));
    }
}
