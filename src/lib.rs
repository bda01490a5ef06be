//! # schema-core
//!
//! The JSON Schema 2020-12 processing pipeline underneath an OpenAPI
//! 3.0/3.1 mock server: reference resolution, dependency graph
//! construction and cycle detection, schema indexing, runtime data
//! validation, deterministic example generation, and request-level
//! validation with SDK-vs-spec error attribution.
//!
//! ## Architecture
//!
//! The crate is organized leaves-first, matching each component's
//! dependency order:
//!
//! ```text
//! Pointer -> ReferenceResolver -> ReferenceGraph -> SchemaIndexer -> SchemaProcessor
//!   -> { RuntimeValidator, ResponseGenerator } -> { AttributionAnalyzer, RequestValidator }
//! ```
//!
//! ## Core Components
//!
//! - **`pointer`**: RFC 6901 JSON Pointer parsing, formatting, resolution.
//! - **`reference`**: `$ref` syntax validation, percent-decoded fragment
//!   resolution, eager circular-chain detection.
//! - **`graph`**: the full `$ref` dependency graph, strongly-connected
//!   components, and a deterministic topological order.
//! - **`schema`**: the `Schema` data model, the arena that gives cyclic
//!   schemas stable handles, the indexer, and the `SchemaProcessor` façade
//!   that produces a cached, diagnostic-bearing `ProcessedSchema`.
//! - **`validator`**: `RuntimeValidator`, validating arbitrary data against
//!   a `ProcessedSchema`.
//! - **`generator`**: `ResponseGenerator`, producing deterministic example
//!   values that satisfy a `ProcessedSchema`.
//! - **`attribution`**: `AttributionAnalyzer`, classifying validation
//!   failures as client (SDK), spec, or ambiguous.
//! - **`request`**: `RequestValidator`, mapping an HTTP request onto a spec
//!   operation and validating its parts.

pub mod attribution;
pub mod cancellation;
pub mod config;
pub mod diagnostic;
pub mod errors;
pub mod generator;
pub mod graph;
pub mod observability;
pub mod pointer;
pub mod reference;
pub mod request;
pub mod schema;
pub mod validator;

pub use cancellation::CancellationToken;
pub use config::CoreConfig;
pub use diagnostic::{Attribution, Diagnostic, DiagnosticCode, Severity};
pub use errors::{CoreError, Result};
pub use pointer::Pointer;
pub use schema::ProcessedSchema;

/// Crate version, as declared in Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name, as declared in Cargo.toml.
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_looks_like_semver() {
        let components: Vec<_> = VERSION.split('.').collect();
        assert!(components.len() >= 3, "version should follow semver: {VERSION}");
        assert!(components.iter().all(|part| !part.is_empty()));
        assert_eq!(APP_NAME, "schema-core");
    }
}
