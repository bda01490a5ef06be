//! # ReferenceResolver
//!
//! Resolves `$ref` fragment strings against a document, validates ref
//! syntax, and performs eager circular-reference detection via DFS. This is
//! deliberately a separate, simpler algorithm from [`crate::graph`]'s
//! Tarjan-based `ReferenceGraph`: this module answers "does resolving this
//! one ref chain ever come back to itself", the graph module answers
//! "what is the full dependency structure of every ref in the document".

use crate::errors::CoreError;
use crate::pointer::Pointer;
use serde_json::Value;
use std::collections::HashSet;

/// Validate that `r` is an internal fragment reference this crate supports.
/// Rejects external URLs, file paths, malformed fragments (multiple `#`,
/// backslashes, raw spaces, query strings).
pub fn validate_pointer_syntax(r: &str) -> Result<(), CoreError> {
    if r.contains("://") || r.starts_with("file:") {
        return Err(CoreError::reference(Pointer::root(), format!("external reference not supported: '{r}'")));
    }
    if !r.starts_with('#') {
        return Err(CoreError::reference(
            Pointer::root(),
            format!("reference must be an internal fragment starting with '#': '{r}'"),
        ));
    }
    let rest = &r[1..];
    if rest.contains('#') {
        return Err(CoreError::reference(Pointer::root(), format!("reference contains multiple '#': '{r}'")));
    }
    if rest.contains('\\') {
        return Err(CoreError::reference(Pointer::root(), format!("reference contains a backslash: '{r}'")));
    }
    if rest.contains(' ') {
        return Err(CoreError::reference(
            Pointer::root(),
            format!("reference contains an un-encoded space: '{r}'"),
        ));
    }
    if rest.contains('?') {
        return Err(CoreError::reference(Pointer::root(), format!("reference contains a query string: '{r}'")));
    }
    Ok(())
}

/// Percent-decode a fragment. Rejects any `%` not followed by two valid hex
/// digits as *invalid-percent-encoding*.
pub fn percent_decode(fragment: &str) -> Result<String, CoreError> {
    let bytes = fragment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 2 >= bytes.len() {
                return Err(CoreError::parse(Pointer::root(), format!("invalid percent-encoding in '{fragment}'")));
            }
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                .map_err(|_| CoreError::parse(Pointer::root(), format!("invalid percent-encoding in '{fragment}'")))?;
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|_| CoreError::parse(Pointer::root(), format!("invalid percent-encoding in '{fragment}'")))?;
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| CoreError::parse(Pointer::root(), format!("invalid utf-8 after percent-decoding '{fragment}'")))
}

/// Is `fragment` (the part after `#`) a pointer (`/`-prefixed or empty) or a
/// bare anchor name?
fn is_pointer_fragment(fragment: &str) -> bool {
    fragment.is_empty() || fragment.starts_with('/')
}

/// Find a node anywhere in `doc` carrying `"$anchor": name`, returning its
/// pointer.
fn find_anchor(doc: &Value, name: &str) -> Option<Pointer> {
    fn walk(value: &Value, at: &Pointer, name: &str) -> Option<Pointer> {
        if let Value::Object(map) = value {
            if map.get("$anchor").and_then(Value::as_str) == Some(name) {
                return Some(at.clone());
            }
            for (k, v) in map {
                if let Some(found) = walk(v, &at.push(k), name) {
                    return Some(found);
                }
            }
        } else if let Value::Array(arr) = value {
            for (i, v) in arr.iter().enumerate() {
                if let Some(found) = walk(v, &at.push(i.to_string()), name) {
                    return Some(found);
                }
            }
        }
        None
    }
    walk(doc, &Pointer::root(), name)
}

/// Resolve `r` against `doc`, following any further `$ref` in the resolved
/// target, while tracking `visited` to detect circular chains during eager
/// resolution. `visited` accumulates the canonical ref strings encountered.
pub fn resolve_ref<'a>(doc: &'a Value, r: &str, visited: &mut Vec<String>) -> Result<&'a Value, CoreError> {
    validate_pointer_syntax(r)?;
    if visited.iter().any(|v| v == r) {
        visited.push(r.to_string());
        return Err(CoreError::reference(
            Pointer::root(),
            format!("circular reference detected: {}", visited.join(" -> ")),
        ));
    }
    visited.push(r.to_string());

    let fragment = &r[1..];
    let target = if is_pointer_fragment(fragment) {
        let decoded = percent_decode(fragment)?;
        let pointer = Pointer::parse(&decoded)?;
        pointer.resolve(doc)?
    } else {
        let anchor_pointer = find_anchor(doc, fragment)
            .ok_or_else(|| CoreError::reference(Pointer::root(), format!("anchor not found: '{fragment}'")))?;
        anchor_pointer.resolve(doc)?
    };

    if let Value::Object(map) = target {
        if let Some(Value::String(next_ref)) = map.get("$ref") {
            return resolve_ref(doc, next_ref, visited);
        }
    }
    Ok(target)
}

/// Resolve a single-hop ref fragment to the absolute [`Pointer`] of its
/// target, without following the target's own `$ref`. Used by schema
/// processing to obtain a stable handle before descending to build the
/// target node, keeping ref-chain traversal a property of the arena build
/// (one hop at a time) rather than of this module.
pub fn resolve_fragment_pointer(doc: &Value, r: &str) -> Result<Pointer, CoreError> {
    validate_pointer_syntax(r)?;
    let fragment = &r[1..];
    if is_pointer_fragment(fragment) {
        let decoded = percent_decode(fragment)?;
        Pointer::parse(&decoded)
    } else {
        find_anchor(doc, fragment)
            .ok_or_else(|| CoreError::reference(Pointer::root(), format!("anchor not found: '{fragment}'")))
    }
}

pub fn is_valid_reference(doc: &Value, r: &str) -> bool {
    let mut visited = Vec::new();
    resolve_ref(doc, r, &mut visited).is_ok()
}

/// Collect every `$ref` string found anywhere in the document, in the order
/// first encountered (depth-first, insertion order of object keys).
pub fn get_all_references(doc: &Value) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    fn walk(value: &Value, seen: &mut HashSet<String>, out: &mut Vec<String>) {
        match value {
            Value::Object(map) => {
                if let Some(Value::String(r)) = map.get("$ref") {
                    if seen.insert(r.clone()) {
                        out.push(r.clone());
                    }
                }
                for (k, v) in map {
                    if k != "$ref" {
                        walk(v, seen, out);
                    }
                }
            }
            Value::Array(arr) => {
                for v in arr {
                    walk(v, seen, out);
                }
            }
            _ => {}
        }
    }
    walk(doc, &mut seen, &mut out);
    out
}

/// DFS-based circular reference detection: for every ref found in the
/// document, follow its resolved target's own refs, maintaining a
/// visited/recursion-stack. Any ref that closes a back-edge is returned.
pub fn find_circular_references(doc: &Value) -> Vec<String> {
    let all_refs = get_all_references(doc);
    let mut circular = HashSet::new();
    let mut globally_done: HashSet<String> = HashSet::new();

    for start in &all_refs {
        if globally_done.contains(start) {
            continue;
        }
        let mut stack: Vec<String> = Vec::new();
        let mut on_stack: HashSet<String> = HashSet::new();
        dfs(doc, start, &mut stack, &mut on_stack, &mut circular, &mut globally_done);
    }

    let mut out: Vec<String> = circular.into_iter().collect();
    out.sort();
    out
}

fn dfs(
    doc: &Value,
    current: &str,
    stack: &mut Vec<String>,
    on_stack: &mut HashSet<String>,
    circular: &mut HashSet<String>,
    done: &mut HashSet<String>,
) {
    if on_stack.contains(current) {
        circular.insert(current.to_string());
        return;
    }
    if done.contains(current) {
        return;
    }
    if validate_pointer_syntax(current).is_err() {
        return;
    }

    stack.push(current.to_string());
    on_stack.insert(current.to_string());

    if let Ok(target) = resolve_fragment_only(doc, current) {
        for nested in direct_refs(target) {
            dfs(doc, &nested, stack, on_stack, circular, done);
            if on_stack.contains(&nested) {
                circular.insert(current.to_string());
            }
        }
    }

    stack.pop();
    on_stack.remove(current);
    done.insert(current.to_string());
}

/// Resolve a ref fragment to its direct target without following a trailing
/// `$ref` on the target (used by the cycle DFS, which walks ref-to-ref
/// edges one hop at a time).
fn resolve_fragment_only<'a>(doc: &'a Value, r: &str) -> Result<&'a Value, CoreError> {
    let fragment = &r[1..];
    if is_pointer_fragment(fragment) {
        let decoded = percent_decode(fragment)?;
        Pointer::parse(&decoded)?.resolve(doc)
    } else {
        let anchor_pointer = find_anchor(doc, fragment)
            .ok_or_else(|| CoreError::reference(Pointer::root(), format!("anchor not found: '{fragment}'")))?;
        anchor_pointer.resolve(doc)
    }
}

fn direct_refs(value: &Value) -> Vec<String> {
    get_all_references(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_external_and_malformed_refs() {
        assert!(validate_pointer_syntax("https://example.com/schema.json").is_err());
        assert!(validate_pointer_syntax("file:///tmp/x.json").is_err());
        assert!(validate_pointer_syntax("/relative/path").is_err());
        assert!(validate_pointer_syntax("#/a#/b").is_err());
        assert!(validate_pointer_syntax("#/a b").is_err());
        assert!(validate_pointer_syntax("#/a?x=1").is_err());
        assert!(validate_pointer_syntax("#/a\\b").is_err());
    }

    #[test]
    fn accepts_anchor_form() {
        assert!(validate_pointer_syntax("#MyAnchor").is_ok());
    }

    #[test]
    fn percent_decodes_fragment_for_resolution() {
        let doc = json!({
            "paths": {
                "/users/{id}": {
                    "get": { "responses": { "200": { "description": "ok" } } }
                }
            }
        });
        let resolved = resolve_ref(&doc, "#/paths/~1users~1%7Bid%7D/get/responses/200", &mut Vec::new()).unwrap();
        assert_eq!(resolved, &json!({"description": "ok"}));
    }

    #[test]
    fn rejects_invalid_percent_encoding() {
        assert!(percent_decode("%ZZ").is_err());
        assert!(percent_decode("%7").is_err());
    }

    #[test]
    fn detects_direct_self_cycle() {
        let doc = json!({
            "$defs": {
                "Self": { "$ref": "#/$defs/Self" }
            }
        });
        let circular = find_circular_references(&doc);
        assert!(circular.contains(&"#/$defs/Self".to_string()));
    }

    #[test]
    fn tree_shaped_recursive_schema_is_circular() {
        let doc = json!({
            "$defs": {
                "Tree": {
                    "type": "object",
                    "properties": {
                        "value": {"type": "string"},
                        "children": {"type": "array", "items": {"$ref": "#/$defs/Tree"}}
                    }
                }
            },
            "$ref": "#/$defs/Tree"
        });
        let circular = find_circular_references(&doc);
        assert!(circular.contains(&"#/$defs/Tree".to_string()));
    }

    #[test]
    fn acyclic_refs_are_not_flagged() {
        let doc = json!({
            "$defs": {
                "A": {"type": "string"},
                "B": {"$ref": "#/$defs/A"}
            }
        });
        assert!(find_circular_references(&doc).is_empty());
    }

    #[test]
    fn get_all_references_is_order_preserving_and_deduplicated() {
        let doc = json!({
            "a": {"$ref": "#/$defs/X"},
            "b": {"$ref": "#/$defs/Y"},
            "c": {"$ref": "#/$defs/X"}
        });
        assert_eq!(get_all_references(&doc), vec!["#/$defs/X".to_string(), "#/$defs/Y".to_string()]);
    }
}
