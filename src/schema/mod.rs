//! # Schema data model, arena, indexer, and processor
//!
//! `model` defines the `Schema` tagged union; `arena` gives every schema
//! node a stable [`model::SchemaId`] handle so cyclic schemas never require
//! Rust ownership cycles; `indexer` enumerates sub-schema pointers and
//! nesting depth for a raw (pre-arena) schema value; `processor` is the
//! top-level façade (`SchemaProcessor`) that ties all of the above together
//! into a cached, diagnostic-bearing [`ProcessedSchema`].

pub mod arena;
pub mod indexer;
pub mod model;
pub mod processor;

pub use arena::SchemaArena;
pub use model::{BoolOrSchema, InstanceType, Schema, SchemaId, SchemaObject};
pub use processor::{ProcessOptions, ProcessedSchema, RefInfo, SchemaProcessor};
