//! # RuntimeValidator
//!
//! Validates arbitrary JSON data against a [`ProcessedSchema`], implementing
//! every JSON Schema 2020-12 keyword this crate models:
//! type/const/enum, numeric and string constraints, array and object
//! constraints including `unevaluatedProperties`, composition
//! (`allOf`/`anyOf`/`oneOf`/`not`), conditionals (`if`/`then`/`else`,
//! `dependentSchemas`), and `$ref`/cycle-placeholder dereference.
//!
//! The outer traversal (array elements, object properties) is driven by
//! plain loops rather than recursion; the one place recursion remains is
//! composition, where a branch's errors and evaluated-property set must be
//! computed before the caller can decide whether to keep them (`oneOf`
//! needs to count successful branches, `if` must not leak its own errors).
//! Recursion depth is bounded by the same `maxDepth` sanity cap
//! [`crate::schema::SchemaProcessor`] enforces when building the arena, so
//! a malicious or merely very deep schema cannot overflow the host stack;
//! this mirrors the depth-capped recursion already used by
//! [`crate::schema::processor`]'s arena builder and [`crate::schema::indexer`].

mod format;

use crate::config::SchemaConfig;
use crate::pointer::Pointer;
use crate::schema::{BoolOrSchema, InstanceType, ProcessedSchema, Schema, SchemaId};
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// A caller-supplied `format` checker, registered via
/// [`RuntimeValidator::with_format`]. Takes precedence over the built-in
/// table in [`format`] for the name it is registered under.
pub type FormatChecker = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// A single keyword-level validation failure.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub data_pointer: Pointer,
    pub schema_pointer: Pointer,
    pub keyword: String,
    pub message: String,
    pub expected: Option<Value>,
    pub actual: Option<Value>,
}

impl ValidationError {
    pub fn new(
        data_pointer: Pointer,
        schema_pointer: Pointer,
        keyword: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ValidationError {
            data_pointer,
            schema_pointer,
            keyword: keyword.into(),
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    pub fn with_expected(mut self, value: Value) -> Self {
        self.expected = Some(value);
        self
    }

    pub fn with_actual(mut self, value: Value) -> Self {
        self.actual = Some(value);
        self
    }
}

/// What a node's applicators (`properties`, `items`, composition, `$ref`,
/// ...) have marked as evaluated, for the two "unevaluated" keywords.
/// Object-property names and array-item indices are tracked separately since
/// `unevaluatedProperties` and `unevaluatedItems` apply to different data
/// shapes, but both need to thread through the same composition recursion.
#[derive(Debug, Clone, Default)]
struct Evaluated {
    properties: HashSet<String>,
    items: HashSet<usize>,
}

impl Evaluated {
    fn merge(&mut self, other: Evaluated) {
        self.properties.extend(other.properties);
        self.items.extend(other.items);
    }
}

/// Stateless validator config. A fresh instance (and its transient regex
/// cache, built per [`Self::validate`] call) is cheap enough to create per
/// request; nothing here is shared mutable state.
#[derive(Clone)]
pub struct RuntimeValidator {
    multiple_of_tolerance: f64,
    regex_size_limit_bytes: usize,
    max_depth: u32,
    custom_formats: HashMap<String, FormatChecker>,
}

impl fmt::Debug for RuntimeValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeValidator")
            .field("multiple_of_tolerance", &self.multiple_of_tolerance)
            .field("regex_size_limit_bytes", &self.regex_size_limit_bytes)
            .field("max_depth", &self.max_depth)
            .field("custom_format_names", &self.custom_formats.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for RuntimeValidator {
    fn default() -> Self {
        RuntimeValidator {
            multiple_of_tolerance: 1e-12,
            regex_size_limit_bytes: 1 << 20,
            max_depth: 1024,
            custom_formats: HashMap::new(),
        }
    }
}

impl RuntimeValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SchemaConfig) -> Self {
        RuntimeValidator {
            multiple_of_tolerance: config.multiple_of_tolerance,
            regex_size_limit_bytes: config.regex_size_limit_bytes,
            max_depth: config.max_depth,
            custom_formats: HashMap::new(),
        }
    }

    /// Register (or override) a `format` checker by name. A collaborator
    /// embedding this crate can use this to add vendor formats (e.g.
    /// `"phone-number"`) or to tighten one of the built-ins without forking
    /// [`format`]. Registering under a name the built-in table already
    /// recognizes shadows it.
    pub fn with_format(
        mut self,
        name: impl Into<String>,
        checker: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.custom_formats.insert(name.into(), Arc::new(checker));
        self
    }

    /// Validate `data` against the schema rooted at `processed.root`,
    /// collecting every keyword failure; data-level problems are reported
    /// as errors, never thrown.
    pub fn validate(&self, processed: &ProcessedSchema, data: &Value) -> Vec<ValidationError> {
        let mut walker = Walker {
            tolerance: self.multiple_of_tolerance,
            size_limit: self.regex_size_limit_bytes,
            max_depth: self.max_depth,
            regex_cache: HashMap::new(),
            dynamic_scope: Vec::new(),
            custom_formats: &self.custom_formats,
        };
        let (errors, _) =
            walker.validate_node(processed, processed.root, data, &Pointer::root(), &Pointer::root(), 0);
        errors
    }
}

fn dynamic_anchor_of(ps: &ProcessedSchema, id: SchemaId) -> Option<String> {
    ps.get(id).as_object().and_then(|o| o.dynamic_anchor.clone())
}

struct Walker<'a> {
    tolerance: f64,
    size_limit: usize,
    max_depth: u32,
    regex_cache: HashMap<String, Option<Regex>>,
    /// The chain of schema nodes currently being validated, outermost
    /// (root) first. A `$dynamicRef` resolves against the first node in
    /// this stack that carries a matching `$dynamicAnchor`, falling back to
    /// the statically-bound anchor when none of the active scopes bind it.
    dynamic_scope: Vec<SchemaId>,
    custom_formats: &'a HashMap<String, FormatChecker>,
}

impl Walker<'_> {
    fn compiled(&mut self, pattern: &str) -> Option<&Regex> {
        self.regex_cache
            .entry(pattern.to_string())
            .or_insert_with(|| RegexBuilder::new(pattern).size_limit(self.size_limit).build().ok())
            .as_ref()
    }

    /// Validate `data` against the node at `id`. Returns the accumulated
    /// errors plus what this node (including anything it composes in)
    /// marked as evaluated — used by the caller to assemble
    /// `unevaluatedProperties`/`unevaluatedItems` at the enclosing level.
    fn validate_node(
        &mut self,
        ps: &ProcessedSchema,
        id: SchemaId,
        data: &Value,
        data_ptr: &Pointer,
        schema_ptr: &Pointer,
        depth: u32,
    ) -> (Vec<ValidationError>, Evaluated) {
        if depth > self.max_depth {
            return (
                vec![ValidationError::new(
                    data_ptr.clone(),
                    schema_ptr.clone(),
                    "$maxDepth",
                    format!("validation nesting exceeded the configured depth cap of {}", self.max_depth),
                )],
                Evaluated::default(),
            );
        }

        match ps.get(id) {
            Schema::AllowAny { .. } => (Vec::new(), Evaluated::default()),
            Schema::DenyAll => (
                vec![ValidationError::new(data_ptr.clone(), schema_ptr.clone(), "false", "schema rejects every instance")],
                Evaluated::default(),
            ),
            Schema::Object(obj) => {
                let obj = obj.as_ref();
                let pushed_scope = obj.dynamic_anchor.is_some();
                if pushed_scope {
                    self.dynamic_scope.push(id);
                }

                let mut errors = Vec::new();
                let mut evaluated = Evaluated::default();

                self.check_type_const_enum(obj, data, data_ptr, schema_ptr, &mut errors);
                self.check_numeric(obj, data, data_ptr, schema_ptr, &mut errors);
                self.check_string(obj, data, data_ptr, schema_ptr, &mut errors);
                self.check_array(ps, obj, data, data_ptr, schema_ptr, depth, &mut errors, &mut evaluated);
                self.check_object(ps, obj, data, data_ptr, schema_ptr, depth, &mut errors, &mut evaluated);
                self.check_composition(ps, obj, data, data_ptr, schema_ptr, depth, &mut errors, &mut evaluated);

                if let Some(r) = &obj.ref_ {
                    if let Some(target_id) = ps.resolve_ref_target(r) {
                        let (e, ev) = self.validate_node(ps, target_id, data, data_ptr, &schema_ptr.push("$ref"), depth + 1);
                        errors.extend(e);
                        evaluated.merge(ev);
                    }
                }

                if let Some(dr) = &obj.dynamic_ref {
                    let name = dr.strip_prefix('#').unwrap_or(dr.as_str());
                    let target = self
                        .dynamic_scope
                        .iter()
                        .find(|&&sid| dynamic_anchor_of(ps, sid).as_deref() == Some(name))
                        .copied()
                        .or_else(|| ps.resolve_dynamic_anchor(name));
                    if let Some(target_id) = target {
                        let (e, ev) =
                            self.validate_node(ps, target_id, data, data_ptr, &schema_ptr.push("$dynamicRef"), depth + 1);
                        errors.extend(e);
                        evaluated.merge(ev);
                    }
                }

                if let Value::Object(map) = data {
                    if let Some(bos) = &obj.unevaluated_properties {
                        for (name, value) in map.iter() {
                            if evaluated.properties.contains(name) {
                                continue;
                            }
                            match bos {
                                BoolOrSchema::Bool(false) => errors.push(ValidationError::new(
                                    data_ptr.push(name.clone()),
                                    schema_ptr.push("unevaluatedProperties"),
                                    "unevaluatedProperties",
                                    format!("property '{name}' is not evaluated by any applicator and unevaluatedProperties is false"),
                                )),
                                BoolOrSchema::Bool(true) => {
                                    evaluated.properties.insert(name.clone());
                                }
                                BoolOrSchema::Schema(sid) => {
                                    evaluated.properties.insert(name.clone());
                                    let (e, _) = self.validate_node(
                                        ps,
                                        *sid,
                                        value,
                                        &data_ptr.push(name.clone()),
                                        &schema_ptr.push("unevaluatedProperties"),
                                        depth + 1,
                                    );
                                    errors.extend(e);
                                }
                            }
                        }
                    }
                }

                if let Value::Array(items) = data {
                    if let Some(bos) = &obj.unevaluated_items {
                        for (i, value) in items.iter().enumerate() {
                            if evaluated.items.contains(&i) {
                                continue;
                            }
                            match bos {
                                BoolOrSchema::Bool(false) => errors.push(ValidationError::new(
                                    data_ptr.push(i.to_string()),
                                    schema_ptr.push("unevaluatedItems"),
                                    "unevaluatedItems",
                                    format!("item at index {i} is not evaluated by any applicator and unevaluatedItems is false"),
                                )),
                                BoolOrSchema::Bool(true) => {
                                    evaluated.items.insert(i);
                                }
                                BoolOrSchema::Schema(sid) => {
                                    evaluated.items.insert(i);
                                    let (e, _) = self.validate_node(
                                        ps,
                                        *sid,
                                        value,
                                        &data_ptr.push(i.to_string()),
                                        &schema_ptr.push("unevaluatedItems"),
                                        depth + 1,
                                    );
                                    errors.extend(e);
                                }
                            }
                        }
                    }
                }

                if pushed_scope {
                    self.dynamic_scope.pop();
                }

                (errors, evaluated)
            }
        }
    }

    fn check_type_const_enum(
        &self,
        obj: &crate::schema::SchemaObject,
        data: &Value,
        data_ptr: &Pointer,
        schema_ptr: &Pointer,
        errors: &mut Vec<ValidationError>,
    ) {
        if let Some(types) = &obj.schema_type {
            let nullable_ok = obj.nullable && data.is_null();
            if !nullable_ok && !types.iter().any(|t| instance_matches_type(data, t)) {
                errors.push(
                    ValidationError::new(
                        data_ptr.clone(),
                        schema_ptr.push("type"),
                        "type",
                        format!("expected type {}, got {}", describe_types(types), json_type_name(data)),
                    )
                    .with_actual(data.clone()),
                );
            }
        }
        if let Some(c) = &obj.const_value {
            if !json_deep_eq(data, c) {
                errors.push(
                    ValidationError::new(data_ptr.clone(), schema_ptr.push("const"), "const", "value does not equal the required constant")
                        .with_expected(c.clone())
                        .with_actual(data.clone()),
                );
            }
        }
        if let Some(values) = &obj.enum_values {
            if !values.iter().any(|v| json_deep_eq(data, v)) {
                errors.push(
                    ValidationError::new(data_ptr.clone(), schema_ptr.push("enum"), "enum", "value does not match any enum member")
                        .with_actual(data.clone()),
                );
            }
        }
    }

    fn check_numeric(
        &self,
        obj: &crate::schema::SchemaObject,
        data: &Value,
        data_ptr: &Pointer,
        schema_ptr: &Pointer,
        errors: &mut Vec<ValidationError>,
    ) {
        let Some(n) = data.as_f64() else { return };
        if let Some(min) = obj.minimum {
            if n < min {
                errors.push(ValidationError::new(data_ptr.clone(), schema_ptr.push("minimum"), "minimum", format!("{n} is less than minimum {min}")));
            }
        }
        if let Some(max) = obj.maximum {
            if n > max {
                errors.push(ValidationError::new(data_ptr.clone(), schema_ptr.push("maximum"), "maximum", format!("{n} is greater than maximum {max}")));
            }
        }
        if let Some(min) = obj.exclusive_minimum {
            if n <= min {
                errors.push(ValidationError::new(
                    data_ptr.clone(),
                    schema_ptr.push("exclusiveMinimum"),
                    "exclusiveMinimum",
                    format!("{n} is not strictly greater than {min}"),
                ));
            }
        }
        if let Some(max) = obj.exclusive_maximum {
            if n >= max {
                errors.push(ValidationError::new(
                    data_ptr.clone(),
                    schema_ptr.push("exclusiveMaximum"),
                    "exclusiveMaximum",
                    format!("{n} is not strictly less than {max}"),
                ));
            }
        }
        if let Some(m) = obj.multiple_of {
            if m != 0.0 {
                let quotient = n / m;
                if (quotient - quotient.round()).abs() > self.tolerance {
                    errors.push(ValidationError::new(
                        data_ptr.clone(),
                        schema_ptr.push("multipleOf"),
                        "multipleOf",
                        format!("{n} is not a multiple of {m}"),
                    ));
                }
            }
        }
    }

    fn check_string(
        &mut self,
        obj: &crate::schema::SchemaObject,
        data: &Value,
        data_ptr: &Pointer,
        schema_ptr: &Pointer,
        errors: &mut Vec<ValidationError>,
    ) {
        let Some(s) = data.as_str() else { return };
        let char_count = s.chars().count() as u64;
        if let Some(min) = obj.min_length {
            if char_count < min {
                errors.push(ValidationError::new(data_ptr.clone(), schema_ptr.push("minLength"), "minLength", format!("length {char_count} is less than minLength {min}")));
            }
        }
        if let Some(max) = obj.max_length {
            if char_count > max {
                errors.push(ValidationError::new(data_ptr.clone(), schema_ptr.push("maxLength"), "maxLength", format!("length {char_count} is greater than maxLength {max}")));
            }
        }
        if let Some(pattern) = &obj.pattern {
            if let Some(re) = self.compiled(pattern) {
                if !re.is_match(s) {
                    errors.push(ValidationError::new(
                        data_ptr.clone(),
                        schema_ptr.push("pattern"),
                        "pattern",
                        format!("'{s}' does not match pattern '{pattern}'"),
                    ));
                }
            }
        }
        if let Some(format_name) = &obj.format {
            let verdict = match self.custom_formats.get(format_name) {
                Some(checker) => Some(checker(s)),
                None => format::check(format_name, s),
            };
            if let Some(false) = verdict {
                errors.push(ValidationError::new(
                    data_ptr.clone(),
                    schema_ptr.push("format"),
                    "format",
                    format!("'{s}' is not a valid '{format_name}'"),
                ));
            }
        }
    }

    fn check_array(
        &mut self,
        ps: &ProcessedSchema,
        obj: &crate::schema::SchemaObject,
        data: &Value,
        data_ptr: &Pointer,
        schema_ptr: &Pointer,
        depth: u32,
        errors: &mut Vec<ValidationError>,
        evaluated: &mut Evaluated,
    ) {
        let Value::Array(items) = data else { return };

        if let Some(min) = obj.min_items {
            if (items.len() as u64) < min {
                errors.push(ValidationError::new(data_ptr.clone(), schema_ptr.push("minItems"), "minItems", format!("array has {} items, fewer than minItems {min}", items.len())));
            }
        }
        if let Some(max) = obj.max_items {
            if (items.len() as u64) > max {
                errors.push(ValidationError::new(data_ptr.clone(), schema_ptr.push("maxItems"), "maxItems", format!("array has {} items, more than maxItems {max}", items.len())));
            }
        }
        if obj.unique_items {
            for i in 0..items.len() {
                for j in 0..i {
                    if json_deep_eq(&items[i], &items[j]) {
                        errors.push(ValidationError::new(
                            data_ptr.push(i.to_string()),
                            schema_ptr.push("uniqueItems"),
                            "uniqueItems",
                            format!("item at index {i} duplicates item at index {j}"),
                        ));
                        break;
                    }
                }
            }
        }

        let prefix_len = obj.prefix_items.as_ref().map_or(0, Vec::len);
        for (i, item) in items.iter().enumerate() {
            let item_ptr = data_ptr.push(i.to_string());
            if i < prefix_len {
                let sid = obj.prefix_items.as_ref().unwrap()[i];
                evaluated.items.insert(i);
                let (e, _) = self.validate_node(ps, sid, item, &item_ptr, &schema_ptr.push("prefixItems").push(i.to_string()), depth + 1);
                errors.extend(e);
            } else if let Some(items_id) = obj.items {
                evaluated.items.insert(i);
                let (e, _) = self.validate_node(ps, items_id, item, &item_ptr, &schema_ptr.push("items"), depth + 1);
                errors.extend(e);
            }
        }

        if let Some(contains_id) = obj.contains {
            let count = items
                .iter()
                .enumerate()
                .filter(|(i, item)| {
                    let (e, _) = self.validate_node(ps, contains_id, item, data_ptr, &schema_ptr.push("contains"), depth + 1);
                    let ok = e.is_empty();
                    if ok {
                        evaluated.items.insert(*i);
                    }
                    ok
                })
                .count() as u64;
            let min_contains = obj.min_contains.unwrap_or(1);
            if count < min_contains {
                errors.push(ValidationError::new(
                    data_ptr.clone(),
                    schema_ptr.push("contains"),
                    "contains",
                    format!("only {count} item(s) satisfy 'contains', need at least {min_contains}"),
                ));
            }
            if let Some(max_contains) = obj.max_contains {
                if count > max_contains {
                    errors.push(ValidationError::new(
                        data_ptr.clone(),
                        schema_ptr.push("contains"),
                        "maxContains",
                        format!("{count} items satisfy 'contains', more than maxContains {max_contains}"),
                    ));
                }
            }
        }
    }

    fn check_object(
        &mut self,
        ps: &ProcessedSchema,
        obj: &crate::schema::SchemaObject,
        data: &Value,
        data_ptr: &Pointer,
        schema_ptr: &Pointer,
        depth: u32,
        errors: &mut Vec<ValidationError>,
        evaluated: &mut Evaluated,
    ) {
        let Value::Object(map) = data else { return };

        if let Some(required) = &obj.required {
            for key in required {
                if !map.contains_key(key) {
                    errors.push(ValidationError::new(
                        data_ptr.clone(),
                        schema_ptr.push("required"),
                        "required",
                        format!("missing required property '{key}'"),
                    ));
                }
            }
        }
        if let Some(min) = obj.min_properties {
            if (map.len() as u64) < min {
                errors.push(ValidationError::new(data_ptr.clone(), schema_ptr.push("minProperties"), "minProperties", format!("object has {} properties, fewer than minProperties {min}", map.len())));
            }
        }
        if let Some(max) = obj.max_properties {
            if (map.len() as u64) > max {
                errors.push(ValidationError::new(data_ptr.clone(), schema_ptr.push("maxProperties"), "maxProperties", format!("object has {} properties, more than maxProperties {max}", map.len())));
            }
        }

        if let Some(properties) = &obj.properties {
            for (name, sid) in properties {
                if let Some(value) = map.get(name) {
                    evaluated.properties.insert(name.clone());
                    let (e, _) =
                        self.validate_node(ps, *sid, value, &data_ptr.push(name.clone()), &schema_ptr.push("properties").push(name.clone()), depth + 1);
                    errors.extend(e);
                }
            }
        }
        if let Some(pattern_properties) = &obj.pattern_properties {
            for (pattern, sid) in pattern_properties {
                let matches: Vec<String> = match self.compiled(pattern) {
                    Some(re) => map.keys().filter(|k| re.is_match(k)).cloned().collect(),
                    None => Vec::new(),
                };
                for name in matches {
                    evaluated.properties.insert(name.clone());
                    let value = &map[&name];
                    let (e, _) = self.validate_node(
                        ps,
                        *sid,
                        value,
                        &data_ptr.push(name.clone()),
                        &schema_ptr.push("patternProperties").push(name.clone()),
                        depth + 1,
                    );
                    errors.extend(e);
                }
            }
        }
        if let Some(bos) = &obj.additional_properties {
            for (name, value) in map.iter() {
                if evaluated.properties.contains(name) {
                    continue;
                }
                match bos {
                    BoolOrSchema::Bool(false) => errors.push(ValidationError::new(
                        data_ptr.push(name.clone()),
                        schema_ptr.push("additionalProperties"),
                        "additionalProperties",
                        format!("property '{name}' is not allowed"),
                    )),
                    BoolOrSchema::Bool(true) => {
                        evaluated.properties.insert(name.clone());
                    }
                    BoolOrSchema::Schema(sid) => {
                        evaluated.properties.insert(name.clone());
                        let (e, _) = self.validate_node(
                            ps,
                            *sid,
                            value,
                            &data_ptr.push(name.clone()),
                            &schema_ptr.push("additionalProperties"),
                            depth + 1,
                        );
                        errors.extend(e);
                    }
                }
            }
        }
        if let Some(pn_id) = obj.property_names {
            for name in map.keys() {
                let (e, _) = self.validate_node(
                    ps,
                    pn_id,
                    &Value::String(name.clone()),
                    &data_ptr.push(name.clone()),
                    &schema_ptr.push("propertyNames"),
                    depth + 1,
                );
                errors.extend(e);
            }
        }
        if let Some(dependent) = &obj.dependent_schemas {
            for (key, sid) in dependent {
                if map.contains_key(key) {
                    let (e, ev) = self.validate_node(ps, *sid, data, data_ptr, &schema_ptr.push("dependentSchemas").push(key.clone()), depth + 1);
                    errors.extend(e);
                    evaluated.merge(ev);
                }
            }
        }
    }

    fn check_composition(
        &mut self,
        ps: &ProcessedSchema,
        obj: &crate::schema::SchemaObject,
        data: &Value,
        data_ptr: &Pointer,
        schema_ptr: &Pointer,
        depth: u32,
        errors: &mut Vec<ValidationError>,
        evaluated: &mut Evaluated,
    ) {
        if let Some(all_of) = &obj.all_of {
            for (i, sid) in all_of.iter().enumerate() {
                let (e, ev) = self.validate_node(ps, *sid, data, data_ptr, &schema_ptr.push("allOf").push(i.to_string()), depth + 1);
                errors.extend(e);
                evaluated.merge(ev);
            }
        }

        if let Some(any_of) = &obj.any_of {
            let branches: Vec<_> = any_of
                .iter()
                .enumerate()
                .map(|(i, sid)| self.validate_node(ps, *sid, data, data_ptr, &schema_ptr.push("anyOf").push(i.to_string()), depth + 1))
                .collect();
            if branches.iter().any(|(e, _)| e.is_empty()) {
                for (_, ev) in branches.into_iter().filter(|(e, _)| e.is_empty()) {
                    evaluated.merge(ev);
                }
            } else {
                errors.push(ValidationError::new(data_ptr.clone(), schema_ptr.push("anyOf"), "anyOf", "no branch of anyOf matched"));
                for (e, _) in branches {
                    errors.extend(e);
                }
            }
        }

        if let Some(one_of) = &obj.one_of {
            let mut matched: Vec<(usize, Evaluated)> = Vec::new();
            let mut rejected_errors = Vec::new();
            for (i, sid) in one_of.iter().enumerate() {
                let (e, ev) = self.validate_node(ps, *sid, data, data_ptr, &schema_ptr.push("oneOf").push(i.to_string()), depth + 1);
                if e.is_empty() {
                    matched.push((i, ev));
                } else {
                    rejected_errors.extend(e);
                }
            }
            match matched.len() {
                1 => evaluated.merge(matched.into_iter().next().unwrap().1),
                0 => {
                    errors.push(ValidationError::new(data_ptr.clone(), schema_ptr.push("oneOf"), "oneOf", "no branch of oneOf matched"));
                    errors.extend(rejected_errors);
                }
                _ => {
                    let indices: Vec<String> = matched.iter().map(|(i, _)| i.to_string()).collect();
                    errors.push(ValidationError::new(
                        data_ptr.clone(),
                        schema_ptr.push("oneOf"),
                        "oneOf",
                        format!("more than one branch of oneOf matched: indices [{}]", indices.join(", ")),
                    ));
                }
            }
        }

        if let Some(not_id) = obj.not {
            let (e, _) = self.validate_node(ps, not_id, data, data_ptr, &schema_ptr.push("not"), depth + 1);
            if e.is_empty() {
                errors.push(ValidationError::new(data_ptr.clone(), schema_ptr.push("not"), "not", "instance must not validate against 'not'"));
            }
        }

        if let Some(if_id) = obj.if_ {
            let (if_errors, _) = self.validate_node(ps, if_id, data, data_ptr, &schema_ptr.push("if"), depth + 1);
            if if_errors.is_empty() {
                if let Some(then_id) = obj.then {
                    let (e, ev) = self.validate_node(ps, then_id, data, data_ptr, &schema_ptr.push("then"), depth + 1);
                    errors.extend(e);
                    evaluated.merge(ev);
                }
            } else if let Some(else_id) = obj.else_ {
                let (e, ev) = self.validate_node(ps, else_id, data, data_ptr, &schema_ptr.push("else"), depth + 1);
                errors.extend(e);
                evaluated.merge(ev);
            }
        }
    }
}

fn instance_matches_type(data: &Value, t: &InstanceType) -> bool {
    match t {
        InstanceType::Null => data.is_null(),
        InstanceType::Boolean => data.is_boolean(),
        InstanceType::Object => data.is_object(),
        InstanceType::Array => data.is_array(),
        InstanceType::String => data.is_string(),
        InstanceType::Number => data.is_number(),
        InstanceType::Integer => data.as_f64().is_some_and(|f| f.fract() == 0.0),
    }
}

fn json_type_name(data: &Value) -> &'static str {
    match data {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn describe_types(types: &[InstanceType]) -> String {
    types.iter().map(InstanceType::as_str).collect::<Vec<_>>().join(" | ")
}

/// Deep structural JSON equality, independent of object key insertion order.
/// Used by `uniqueItems`/`contains` so two objects with the same keys in a
/// different order still compare equal.
pub fn json_deep_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(fx), Some(fy)) => fx == fy,
            _ => x == y,
        },
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| json_deep_eq(a, b)),
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len() && x.iter().all(|(k, v)| y.get(k).is_some_and(|v2| json_deep_eq(v, v2)))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::processor::{ProcessOptions, SchemaProcessor};
    use serde_json::json;

    fn process(doc: &Value) -> std::sync::Arc<ProcessedSchema> {
        SchemaProcessor::new(1000, 1024).process(doc, &Pointer::root(), &ProcessOptions::default()).unwrap()
    }

    #[test]
    fn exclusive_bounds_reject_boundary_accept_interior() {
        let doc = json!({"type": "integer", "exclusiveMinimum": 5, "exclusiveMaximum": 10});
        let processed = process(&doc);
        let validator = RuntimeValidator::new();
        assert!(!validator.validate(&processed, &json!(5)).is_empty());
        assert!(validator.validate(&processed, &json!(6)).is_empty());
        assert!(validator.validate(&processed, &json!(9)).is_empty());
        assert!(!validator.validate(&processed, &json!(10)).is_empty());
    }

    #[test]
    fn cycle_tolerance_scenario_validates_bounded_tree() {
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
        let processed = process(&doc);
        let validator = RuntimeValidator::new();
        let data = json!({"value": "a", "children": [{"value": "b", "children": []}]});
        assert!(validator.validate(&processed, &data).is_empty());
    }

    #[test]
    fn composition_and_unevaluated_properties_scenario() {
        let doc = json!({
            "allOf": [
                {"properties": {"a": {"type": "string"}}},
                {"properties": {"b": {"type": "number"}}}
            ],
            "unevaluatedProperties": false
        });
        let processed = process(&doc);
        let validator = RuntimeValidator::new();
        assert!(validator.validate(&processed, &json!({"a": "x", "b": 1})).is_empty());
        assert!(!validator.validate(&processed, &json!({"a": "x", "b": 1, "c": true})).is_empty());
    }

    #[test]
    fn required_missing_is_reported() {
        let doc = json!({"type": "object", "required": ["email"]});
        let processed = process(&doc);
        let validator = RuntimeValidator::new();
        let errors = validator.validate(&processed, &json!({}));
        assert!(errors.iter().any(|e| e.keyword == "required"));
    }

    #[test]
    fn unsatisfiable_pattern_vs_length_scenario_rejects_every_instance() {
        let doc = json!({"type": "string", "maxLength": 2, "pattern": "^[A-Z]{3}$"});
        let processed = process(&doc);
        let validator = RuntimeValidator::new();
        let errors = validator.validate(&processed, &json!("USD"));
        assert!(!errors.is_empty());
    }

    #[test]
    fn unique_items_uses_deep_equality_regardless_of_key_order() {
        let doc = json!({"type": "array", "uniqueItems": true});
        let processed = process(&doc);
        let validator = RuntimeValidator::new();
        let data = json!([{"a": 1, "b": 2}, {"b": 2, "a": 1}]);
        assert!(!validator.validate(&processed, &data).is_empty());
    }

    #[test]
    fn one_of_requires_exactly_one_match() {
        let doc = json!({"oneOf": [{"type": "string"}, {"type": "number"}]});
        let processed = process(&doc);
        let validator = RuntimeValidator::new();
        assert!(validator.validate(&processed, &json!("hi")).is_empty());
        assert!(!validator.validate(&processed, &json!(true)).is_empty());
    }

    #[test]
    fn unevaluated_items_flags_only_the_index_no_applicator_covers() {
        let doc = json!({
            "prefixItems": [{"type": "string"}],
            "unevaluatedItems": false
        });
        let processed = process(&doc);
        let validator = RuntimeValidator::new();
        assert!(validator.validate(&processed, &json!(["a"])).is_empty());

        let errors = validator.validate(&processed, &json!(["a", "b"]));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].data_pointer, Pointer::parse("/1").unwrap());
    }

    #[test]
    fn dynamic_ref_falls_back_to_the_static_anchor_and_recurses() {
        let doc = json!({
            "$dynamicAnchor": "node",
            "type": "object",
            "properties": {
                "value": {"type": "string"},
                "children": {"type": "array", "items": {"$dynamicRef": "#node"}}
            }
        });
        let processed = process(&doc);
        let validator = RuntimeValidator::new();
        let data = json!({"value": "a", "children": [{"value": "b", "children": []}]});
        assert!(validator.validate(&processed, &data).is_empty());

        let bad = json!({"value": "a", "children": [{"value": 1, "children": []}]});
        assert!(!validator.validate(&processed, &bad).is_empty());
    }

    #[test]
    fn if_then_else_applies_the_chosen_branch_only() {
        let doc = json!({
            "if": {"properties": {"kind": {"const": "cat"}}},
            "then": {"required": ["meow"]},
            "else": {"required": ["bark"]}
        });
        let processed = process(&doc);
        let validator = RuntimeValidator::new();
        assert!(validator.validate(&processed, &json!({"kind": "cat", "meow": true})).is_empty());
        assert!(!validator.validate(&processed, &json!({"kind": "cat"})).is_empty());
        assert!(validator.validate(&processed, &json!({"kind": "dog", "bark": true})).is_empty());
    }

    #[test]
    fn custom_format_checker_shadows_and_extends_the_built_in_table() {
        let doc = json!({"type": "string", "format": "phone-number"});
        let processed = process(&doc);
        let validator = RuntimeValidator::new()
            .with_format("phone-number", |s| s.starts_with('+') && s[1..].chars().all(|c| c.is_ascii_digit()));

        assert!(validator.validate(&processed, &json!("+15551234567")).is_empty());
        assert!(!validator.validate(&processed, &json!("not-a-phone-number")).is_empty());

        // Unregistered formats still fall back to the built-in table.
        let uuid_doc = json!({"type": "string", "format": "uuid"});
        let uuid_processed = process(&uuid_doc);
        let plain = RuntimeValidator::new();
        assert!(!plain.validate(&uuid_processed, &json!("not-a-uuid")).is_empty());
    }
}
