//! # SchemaIndexer
//!
//! Walks a raw schema node (still a `serde_json::Value`, before
//! [`crate::schema::processor::SchemaProcessor`] builds the arena form) and
//! records every reachable sub-schema pointer, the maximum nesting depth,
//! and the `$ref` strings each node directly contains.
//!
//! `$ref` sites are treated as leaves of this walk: the indexer records the
//! ref string but does not descend into its target. Each ref target is
//! indexed separately, as its own root, when [`crate::schema::processor::SchemaProcessor`]
//! reaches it in topological order. This keeps a shared `$defs` entry from
//! being indexed once per call site.

use crate::diagnostic::{Diagnostic, DiagnosticCode, Severity};
use crate::pointer::Pointer;
use serde_json::Value;
use std::collections::HashMap;

/// Sanity cap on schema nesting depth during indexing.
pub const MAX_DEPTH: u32 = 1024;

#[derive(Debug, Clone, Default)]
pub struct SchemaIndex {
    /// Every schema-node pointer, root first, in depth-first visitation
    /// order.
    pub sub_pointers: Vec<Pointer>,
    pub max_depth: u32,
    /// For each indexed pointer, the `$ref` strings it directly contains.
    pub refs_per_node: HashMap<Pointer, Vec<String>>,
    pub diagnostics: Vec<Diagnostic>,
}

/// The set of (relative-segment-path, child-value) pairs that are
/// themselves schemas, for every 2020-12 keyword whose value contains
/// nested schemas. Keywords like `enum`/`const`/`default`/`examples` hold
/// plain data, not schemas, and are intentionally excluded.
fn schema_children(obj: &serde_json::Map<String, Value>) -> Vec<(Vec<String>, &Value)> {
    let mut out = Vec::new();
    let single = [
        "items",
        "propertyNames",
        "contains",
        "not",
        "if",
        "then",
        "else",
    ];
    for key in single {
        if let Some(v) = obj.get(key) {
            out.push((vec![key.to_string()], v));
        }
    }
    if let Some(Value::Object(props)) = obj.get("properties") {
        for (name, v) in props {
            out.push((vec!["properties".to_string(), name.clone()], v));
        }
    }
    if let Some(Value::Object(props)) = obj.get("patternProperties") {
        for (pattern, v) in props {
            out.push((vec!["patternProperties".to_string(), pattern.clone()], v));
        }
    }
    if let Some(Value::Object(props)) = obj.get("dependentSchemas") {
        for (name, v) in props {
            out.push((vec!["dependentSchemas".to_string(), name.clone()], v));
        }
    }
    if let Some(Value::Object(_)) = obj.get("additionalProperties") {
        out.push((vec!["additionalProperties".to_string()], obj.get("additionalProperties").unwrap()));
    }
    if let Some(Value::Object(_)) = obj.get("unevaluatedProperties") {
        out.push((vec!["unevaluatedProperties".to_string()], obj.get("unevaluatedProperties").unwrap()));
    }
    if let Some(Value::Object(_)) = obj.get("unevaluatedItems") {
        out.push((vec!["unevaluatedItems".to_string()], obj.get("unevaluatedItems").unwrap()));
    }
    for arr_key in ["allOf", "anyOf", "oneOf", "prefixItems"] {
        if let Some(Value::Array(items)) = obj.get(arr_key) {
            for (i, v) in items.iter().enumerate() {
                out.push((vec![arr_key.to_string(), i.to_string()], v));
            }
        }
    }
    out
}

/// Index the schema living at `root` within `document`.
pub fn index(document: &Value, root: &Pointer) -> SchemaIndex {
    let mut result = SchemaIndex::default();
    let Ok(root_value) = root.resolve(document) else {
        return result;
    };
    walk(root_value, root, 0, &mut result);
    result
}

fn walk(node: &Value, at: &Pointer, depth: u32, result: &mut SchemaIndex) {
    result.sub_pointers.push(at.clone());
    result.max_depth = result.max_depth.max(depth);

    let Value::Object(obj) = node else {
        return;
    };

    if let Some(Value::String(r)) = obj.get("$ref") {
        result.refs_per_node.entry(at.clone()).or_default().push(r.clone());
    }
    if let Some(Value::String(r)) = obj.get("$dynamicRef") {
        result.refs_per_node.entry(at.clone()).or_default().push(r.clone());
    }

    if depth >= MAX_DEPTH {
        result.diagnostics.push(Diagnostic::new(
            DiagnosticCode::DEPTH_LIMIT_REACHED,
            Severity::Warning,
            at.clone(),
            format!("schema nesting reached the sanity cap of {MAX_DEPTH}; further descent stopped"),
        ));
        return;
    }

    for (segments, child) in schema_children(obj) {
        let mut child_ptr = at.clone();
        for s in segments {
            child_ptr = child_ptr.push(s);
        }
        walk(child, &child_ptr, depth + 1, result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn indexes_nested_object_and_array_schemas() {
        let doc = json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "tags": {"type": "array", "items": {"type": "string"}}
            }
        });
        let idx = index(&doc, &Pointer::root());
        let formatted: Vec<String> = idx.sub_pointers.iter().map(|p| p.to_string()).collect();
        assert!(formatted.contains(&"".to_string()));
        assert!(formatted.contains(&"/properties/name".to_string()));
        assert!(formatted.contains(&"/properties/tags".to_string()));
        assert!(formatted.contains(&"/properties/tags/items".to_string()));
        assert_eq!(idx.max_depth, 2);
    }

    #[test]
    fn enum_and_const_values_are_not_treated_as_sub_schemas() {
        let doc = json!({"enum": [{"type": "string"}, 1, 2]});
        let idx = index(&doc, &Pointer::root());
        assert_eq!(idx.sub_pointers.len(), 1);
    }

    #[test]
    fn ref_sites_are_not_descended_into() {
        let doc = json!({
            "$defs": {"Thing": {"type": "string"}},
            "properties": {"x": {"$ref": "#/$defs/Thing"}}
        });
        let idx = index(&doc, &Pointer::root());
        let formatted: Vec<String> = idx.sub_pointers.iter().map(|p| p.to_string()).collect();
        assert!(formatted.contains(&"/properties/x".to_string()));
        assert!(!formatted.iter().any(|p| p.starts_with("/properties/x/")));
        assert_eq!(
            idx.refs_per_node.get(&Pointer::parse("/properties/x").unwrap()).unwrap(),
            &vec!["#/$defs/Thing".to_string()]
        );
    }

    #[test]
    fn depth_cap_stops_descent_and_emits_warning() {
        // Build a deeply nested allOf chain past the cap.
        let mut node = json!({"type": "string"});
        for _ in 0..(MAX_DEPTH as usize + 5) {
            node = json!({"allOf": [node]});
        }
        let idx = index(&node, &Pointer::root());
        assert!(idx.max_depth <= MAX_DEPTH);
        assert!(idx.diagnostics.iter().any(|d| d.code == DiagnosticCode::DEPTH_LIMIT_REACHED));
    }
}
