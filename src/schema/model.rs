//! The Schema data model: a tagged union `AllowAny | DenyAll | Object(...)`,
//! per the Design Notes' "polymorphism" guidance — keyword presence tables
//! beat class hierarchies, and validators dispatch per keyword rather than
//! per subclass.

use serde_json::Value;
use std::fmt;

/// A stable handle into a [`crate::schema::arena::SchemaArena`]. Using an
/// index rather than an owned/shared schema tree is what lets cyclic
/// schemas exist without Rust ownership cycles (Design Notes, "Cyclic
/// object graphs").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(pub u32);

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// `additionalProperties` / `unevaluatedProperties` can be a boolean or a
/// schema.
#[derive(Debug, Clone)]
pub enum BoolOrSchema {
    Bool(bool),
    Schema(SchemaId),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InstanceType {
    Null,
    Boolean,
    Object,
    Array,
    Number,
    Integer,
    String,
}

impl InstanceType {
    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "null" => InstanceType::Null,
            "boolean" => InstanceType::Boolean,
            "object" => InstanceType::Object,
            "array" => InstanceType::Array,
            "number" => InstanceType::Number,
            "integer" => InstanceType::Integer,
            "string" => InstanceType::String,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceType::Null => "null",
            InstanceType::Boolean => "boolean",
            InstanceType::Object => "object",
            InstanceType::Array => "array",
            InstanceType::Number => "number",
            InstanceType::Integer => "integer",
            InstanceType::String => "string",
        }
    }

    /// Preference order used by [`crate::generator`] when `type` names more
    /// than one candidate.
    pub fn generation_priority(&self) -> u8 {
        match self {
            InstanceType::Object => 0,
            InstanceType::Array => 1,
            InstanceType::String => 2,
            InstanceType::Number => 3,
            InstanceType::Integer => 4,
            InstanceType::Boolean => 5,
            InstanceType::Null => 6,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchemaObject {
    pub schema_type: Option<Vec<InstanceType>>,
    pub format: Option<String>,
    pub enum_values: Option<Vec<Value>>,
    pub const_value: Option<Value>,

    // Numeric
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
    pub multiple_of: Option<f64>,

    // String
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<String>,

    // Array
    pub items: Option<SchemaId>,
    pub prefix_items: Option<Vec<SchemaId>>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique_items: bool,
    pub contains: Option<SchemaId>,
    pub min_contains: Option<u64>,
    pub max_contains: Option<u64>,
    /// Evaluated *after* composition, the same way `unevaluatedProperties`
    /// is: an index validated by `prefixItems`, `items`, or `contains`
    /// anywhere in an `allOf`/`oneOf`/`anyOf`/`if`/`then`/`else` branch does
    /// not count against this.
    pub unevaluated_items: Option<BoolOrSchema>,

    // Object
    pub properties: Option<Vec<(String, SchemaId)>>,
    pub pattern_properties: Option<Vec<(String, SchemaId)>>,
    pub property_names: Option<SchemaId>,
    pub required: Option<Vec<String>>,
    pub additional_properties: Option<BoolOrSchema>,
    pub unevaluated_properties: Option<BoolOrSchema>,
    pub min_properties: Option<u64>,
    pub max_properties: Option<u64>,

    // Composition
    pub all_of: Option<Vec<SchemaId>>,
    pub any_of: Option<Vec<SchemaId>>,
    pub one_of: Option<Vec<SchemaId>>,
    pub not: Option<SchemaId>,

    // Conditionals
    pub if_: Option<SchemaId>,
    pub then: Option<SchemaId>,
    pub else_: Option<SchemaId>,
    pub dependent_schemas: Option<Vec<(String, SchemaId)>>,

    // References
    pub ref_: Option<String>,
    pub dynamic_ref: Option<String>,
    pub dynamic_anchor: Option<String>,

    // Metadata
    pub title: Option<String>,
    pub description: Option<String>,
    pub default: Option<Value>,
    pub examples: Option<Vec<Value>>,
    pub example: Option<Value>,
    pub nullable: bool,
    pub read_only: bool,
    pub write_only: bool,
    pub deprecated: bool,
    pub discriminator: Option<Value>,
    pub xml: Option<Value>,

    /// Keywords this crate does not model explicitly, kept for round-trip
    /// fidelity of diagnostics (e.g. reporting unknown keywords).
    pub unknown_keywords: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum Schema {
    /// Matches any instance. Used both for a literal empty schema (`{}` or
    /// `true`) and as the cycle placeholder sentinel.
    AllowAny { cyclic_origin: Option<String> },
    /// Matches no instance (`false`).
    DenyAll,
    Object(Box<SchemaObject>),
}

impl Schema {
    pub fn allow_any() -> Self {
        Schema::AllowAny { cyclic_origin: None }
    }

    pub fn cycle_placeholder(origin_ref: impl Into<String>) -> Self {
        Schema::AllowAny { cyclic_origin: Some(origin_ref.into()) }
    }

    pub fn is_cycle_placeholder(&self) -> bool {
        matches!(self, Schema::AllowAny { cyclic_origin: Some(_) })
    }

    pub fn as_object(&self) -> Option<&SchemaObject> {
        match self {
            Schema::Object(obj) => Some(obj),
            _ => None,
        }
    }
}
