//! # Structured Logging
//!
//! Span-producing macros used across the pipeline: one macro per phase of
//! the processing pipeline (indexing, validation, generation), each
//! carrying a stable `operation_id` for correlating a single
//! processing/validation/generation call across log lines.

/// Span for [`crate::schema::processor::SchemaProcessor`] work: indexing,
/// arena construction, diagnostic emission.
#[macro_export]
macro_rules! schema_span {
    ($operation:expr, $pointer:expr) => {
        tracing::info_span!(
            "schema_processing",
            operation = %$operation,
            pointer = %$pointer,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($operation:expr, $pointer:expr, $($field:tt)*) => {
        tracing::info_span!(
            "schema_processing",
            operation = %$operation,
            pointer = %$pointer,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Span for a single [`crate::validator::RuntimeValidator::validate`] call.
#[macro_export]
macro_rules! validate_span {
    ($schema_pointer:expr) => {
        tracing::debug_span!(
            "schema_validation",
            schema_pointer = %$schema_pointer,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($schema_pointer:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "schema_validation",
            schema_pointer = %$schema_pointer,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Span for a single [`crate::generator::ResponseGenerator::generate`] call.
#[macro_export]
macro_rules! generate_span {
    ($schema_pointer:expr, $seed:expr) => {
        tracing::debug_span!(
            "response_generation",
            schema_pointer = %$schema_pointer,
            seed = %$seed,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($schema_pointer:expr, $seed:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "response_generation",
            schema_pointer = %$schema_pointer,
            seed = %$seed,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Log the active configuration at startup.
pub fn log_config_info(config: &crate::config::CoreConfig) {
    tracing::info!(
        schema_max_depth = config.schema.max_depth,
        generator_max_depth = config.generator.max_depth,
        cache_capacity = config.cache.capacity,
        request_mode = ?config.request.mode,
        "schema-core configuration"
    );
}
