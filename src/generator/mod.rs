//! # ResponseGenerator
//!
//! Deterministic, seeded example generation against a [`ProcessedSchema`]:
//! prefers `example`/`examples`/`default` when present, otherwise
//! synthesizes a value per JSON Schema 2020-12 keyword, honoring
//! bounds, recursing into composition, and bottoming out at cycle
//! placeholders and a configurable depth cap rather than recursing forever.

use crate::config::GeneratorConfig;
use crate::diagnostic::{Attribution, Diagnostic, DiagnosticCode, Severity};
use crate::pointer::Pointer;
use crate::schema::{InstanceType, ProcessedSchema, Schema, SchemaId, SchemaObject};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Map, Value};
use std::collections::HashSet;

const STRING_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Per-call knobs: `{seed?, maxDepth?, preferExamples?}`.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub seed: Option<u64>,
    pub max_depth: Option<u32>,
    pub prefer_examples: Option<bool>,
}

/// The generated value plus any best-effort diagnostics raised along the
/// way — generation never fails outright, it degrades to a best-effort
/// value and records why.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub value: Value,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct ResponseGenerator {
    default_max_depth: u32,
    default_seed: u64,
    default_prefer_examples: bool,
    unique_items_attempts: u32,
}

impl Default for ResponseGenerator {
    fn default() -> Self {
        ResponseGenerator { default_max_depth: 16, default_seed: 0, default_prefer_examples: true, unique_items_attempts: 32 }
    }
}

impl ResponseGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &GeneratorConfig) -> Self {
        ResponseGenerator {
            default_max_depth: config.max_depth,
            default_seed: config.default_seed,
            default_prefer_examples: config.prefer_examples,
            unique_items_attempts: config.unique_items_attempts,
        }
    }

    pub fn generate(&self, processed: &ProcessedSchema, options: &GenerateOptions) -> GenerationOutcome {
        let seed = options.seed.unwrap_or(self.default_seed);
        let mut gen = Gen {
            rng: StdRng::seed_from_u64(seed),
            max_depth: options.max_depth.unwrap_or(self.default_max_depth),
            prefer_examples: options.prefer_examples.unwrap_or(self.default_prefer_examples),
            unique_items_attempts: self.unique_items_attempts,
            diagnostics: Vec::new(),
        };
        let value = gen.generate_node(processed, processed.root, &Pointer::root(), 0);
        GenerationOutcome { value, diagnostics: gen.diagnostics }
    }
}

struct Gen {
    rng: StdRng,
    max_depth: u32,
    prefer_examples: bool,
    unique_items_attempts: u32,
    diagnostics: Vec<Diagnostic>,
}

impl Gen {
    fn generate_node(&mut self, ps: &ProcessedSchema, id: SchemaId, schema_ptr: &Pointer, depth: u32) -> Value {
        if depth > self.max_depth {
            self.diagnostics.push(Diagnostic::new(
                DiagnosticCode::DEPTH_LIMIT_REACHED,
                Severity::Warning,
                schema_ptr.clone(),
                format!("generation reached the depth cap of {}; returning a minimal value", self.max_depth),
            ));
            return Value::Null;
        }

        match ps.get(id) {
            Schema::AllowAny { .. } => Value::Null,
            Schema::DenyAll => {
                self.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::UNSATISFIABLE_CONSTRAINT,
                        Severity::Warning,
                        schema_ptr.clone(),
                        "schema denies every instance; returning null as a best-effort value",
                    )
                    .with_attribution(Attribution::Spec),
                );
                Value::Null
            }
            Schema::Object(obj) => self.generate_object(ps, obj.as_ref(), schema_ptr, depth),
        }
    }

    fn generate_object(&mut self, ps: &ProcessedSchema, obj: &SchemaObject, schema_ptr: &Pointer, depth: u32) -> Value {
        if self.prefer_examples {
            if let Some(example) = &obj.example {
                return example.clone();
            }
            if let Some(examples) = &obj.examples {
                if !examples.is_empty() {
                    let i = self.rng.gen_range(0..examples.len());
                    return examples[i].clone();
                }
            }
            if let Some(default) = &obj.default {
                return default.clone();
            }
        }

        if let Some(c) = &obj.const_value {
            return c.clone();
        }
        if let Some(values) = &obj.enum_values {
            if values.is_empty() {
                self.diagnostics.push(
                    Diagnostic::new(DiagnosticCode::EMPTY_ENUM, Severity::Warning, schema_ptr.clone(), "enum is empty; cannot pick a value")
                        .with_attribution(Attribution::Spec),
                );
                return Value::Null;
            }
            let i = self.rng.gen_range(0..values.len());
            return values[i].clone();
        }

        if let Some(r) = &obj.ref_ {
            if let Some(target_id) = ps.resolve_ref_target(r) {
                return self.generate_node(ps, target_id, &schema_ptr.push("$ref"), depth + 1);
            }
        }

        if let Some(one_of) = &obj.one_of {
            if !one_of.is_empty() {
                let i = self.rng.gen_range(0..one_of.len());
                return self.generate_node(ps, one_of[i], &schema_ptr.push("oneOf").push(i.to_string()), depth + 1);
            }
        }
        if let Some(any_of) = &obj.any_of {
            if !any_of.is_empty() {
                let i = self.rng.gen_range(0..any_of.len());
                return self.generate_node(ps, any_of[i], &schema_ptr.push("anyOf").push(i.to_string()), depth + 1);
            }
        }
        if let Some(not_id) = obj.not {
            return self.generate_not(ps, not_id, schema_ptr, depth);
        }

        let effective = Effective::build(ps, obj);

        let chosen_type = effective.schema_type.as_ref().and_then(|types| {
            types.iter().min_by_key(|t| t.generation_priority()).cloned()
        });

        match chosen_type.or_else(|| effective.infer_type()) {
            Some(InstanceType::Object) => self.generate_object_value(ps, &effective, schema_ptr, depth),
            Some(InstanceType::Array) => self.generate_array_value(ps, &effective, schema_ptr, depth),
            Some(InstanceType::String) => self.generate_string_value(&effective),
            Some(InstanceType::Number) => self.generate_number_value(&effective),
            Some(InstanceType::Integer) => self.generate_integer_value(&effective),
            Some(InstanceType::Boolean) => Value::Bool(self.rng.gen_bool(0.5)),
            Some(InstanceType::Null) | None => Value::Null,
        }
    }

    fn generate_not(&mut self, ps: &ProcessedSchema, not_id: SchemaId, schema_ptr: &Pointer, depth: u32) -> Value {
        let inner = ps.get(not_id);
        if let Schema::Object(obj) = inner {
            if let Some(types) = &obj.schema_type {
                let excludes_null = !types.contains(&InstanceType::Null);
                if excludes_null {
                    return Value::Null;
                }
                if !types.contains(&InstanceType::Object) {
                    return json!({});
                }
                return Value::Bool(true);
            }
        }
        let _ = (ps, schema_ptr, depth);
        Value::Null
    }

    fn generate_string_value(&mut self, effective: &Effective) -> Value {
        if let Some(format_name) = &effective.format {
            if let Some(canonical) = canonical_for_format(format_name) {
                return Value::String(canonical);
            }
        }
        let min = effective.min_length.unwrap_or(4).max(1);
        let max = effective.max_length.unwrap_or(min.max(8)).max(min);
        let len = if min == max { min } else { self.rng.gen_range(min..=max) };
        let s: String = (0..len).map(|_| STRING_ALPHABET[self.rng.gen_range(0..STRING_ALPHABET.len())] as char).collect();
        Value::String(s)
    }

    fn generate_number_value(&mut self, effective: &Effective) -> Value {
        let (mut low, mut high) = numeric_range(effective);
        if low > high {
            std::mem::swap(&mut low, &mut high);
        }
        let mut value = if (high - low).abs() < f64::EPSILON { low } else { self.rng.gen_range(low..=high) };
        if let Some(m) = effective.multiple_of {
            if m > 0.0 {
                value = (value / m).round() * m;
            }
        }
        json!(value)
    }

    fn generate_integer_value(&mut self, effective: &Effective) -> Value {
        let (low, high) = numeric_range(effective);
        let low = low.ceil() as i64;
        let high = high.floor() as i64;
        let (low, high) = if low > high { (high, low) } else { (low, high) };
        let mut value = self.rng.gen_range(low..=high);
        if let Some(m) = effective.multiple_of {
            let m = m.round() as i64;
            if m != 0 {
                value = (value / m) * m;
            }
        }
        json!(value)
    }

    fn generate_array_value(&mut self, ps: &ProcessedSchema, effective: &Effective, schema_ptr: &Pointer, depth: u32) -> Value {
        if let Some(items_id) = effective.items {
            if ps.get(items_id).is_cycle_placeholder() {
                return Value::Array(Vec::new());
            }
        }

        let min = effective.min_items.unwrap_or(0);
        let max = effective.max_items.unwrap_or(min.max(1));
        let len = min.max(1).min(max.max(min)) as usize;

        let mut items = Vec::with_capacity(len);
        for i in 0..len {
            let item_schema = if i < effective.prefix_items.len() {
                Some(effective.prefix_items[i])
            } else {
                effective.items
            };
            let Some(item_id) = item_schema else { break };
            let item_ptr = schema_ptr.push("items").push(i.to_string());
            items.push(self.generate_node(ps, item_id, &item_ptr, depth + 1));
        }

        if effective.unique_items {
            items = self.deduplicate(ps, effective, schema_ptr, depth, items);
        }
        Value::Array(items)
    }

    fn deduplicate(&mut self, ps: &ProcessedSchema, effective: &Effective, schema_ptr: &Pointer, depth: u32, mut items: Vec<Value>) -> Vec<Value> {
        let Some(items_id) = effective.items else { return items };
        for i in 0..items.len() {
            let mut attempts = 0;
            while attempts < self.unique_items_attempts && items[..i].iter().any(|v| crate::validator::json_deep_eq(v, &items[i])) {
                items[i] = self.generate_node(ps, items_id, &schema_ptr.push("items").push(i.to_string()), depth + 1);
                attempts += 1;
            }
        }
        items
    }

    fn generate_object_value(&mut self, ps: &ProcessedSchema, effective: &Effective, schema_ptr: &Pointer, depth: u32) -> Value {
        let mut out = Map::new();
        let required: HashSet<&str> = effective.required.iter().map(String::as_str).collect();

        let mut ordered: Vec<&(String, SchemaId)> = effective.properties.iter().collect();
        ordered.sort_by_key(|(name, _)| (!required.contains(name.as_str()), name.clone()));

        for (name, sid) in &ordered {
            if out.len() as u64 >= effective.max_properties.unwrap_or(u64::MAX) && !required.contains(name.as_str()) {
                continue;
            }
            let prop_ptr = schema_ptr.push("properties").push(name.clone());
            out.insert(name.clone(), self.generate_node(ps, *sid, &prop_ptr, depth + 1));
        }
        for name in &effective.required {
            out.entry(name.clone()).or_insert(Value::Null);
        }
        Value::Object(out)
    }
}

/// A shallow merge of a schema object with its `allOf` branches: merge
/// shallowly, then generate from the merged view. Only object-shaped
/// branches contribute; `AllowAny`/`DenyAll` branches are skipped.
struct Effective {
    schema_type: Option<Vec<InstanceType>>,
    format: Option<String>,
    minimum: Option<f64>,
    maximum: Option<f64>,
    exclusive_minimum: Option<f64>,
    exclusive_maximum: Option<f64>,
    multiple_of: Option<f64>,
    min_length: Option<u64>,
    max_length: Option<u64>,
    pattern: Option<String>,
    items: Option<SchemaId>,
    prefix_items: Vec<SchemaId>,
    min_items: Option<u64>,
    max_items: Option<u64>,
    unique_items: bool,
    properties: Vec<(String, SchemaId)>,
    required: Vec<String>,
    max_properties: Option<u64>,
}

impl Effective {
    fn build(ps: &ProcessedSchema, obj: &SchemaObject) -> Self {
        let mut eff = Effective {
            schema_type: obj.schema_type.clone(),
            format: obj.format.clone(),
            minimum: obj.minimum,
            maximum: obj.maximum,
            exclusive_minimum: obj.exclusive_minimum,
            exclusive_maximum: obj.exclusive_maximum,
            multiple_of: obj.multiple_of,
            min_length: obj.min_length,
            max_length: obj.max_length,
            pattern: obj.pattern.clone(),
            items: obj.items,
            prefix_items: obj.prefix_items.clone().unwrap_or_default(),
            min_items: obj.min_items,
            max_items: obj.max_items,
            unique_items: obj.unique_items,
            properties: obj.properties.clone().unwrap_or_default(),
            required: obj.required.clone().unwrap_or_default(),
            max_properties: obj.max_properties,
        };

        if let Some(all_of) = &obj.all_of {
            for sid in all_of {
                if let Schema::Object(branch) = ps.get(*sid) {
                    eff.merge(branch);
                }
            }
        }
        eff
    }

    fn merge(&mut self, branch: &SchemaObject) {
        if self.schema_type.is_none() {
            self.schema_type = branch.schema_type.clone();
        }
        self.minimum = merge_max(self.minimum, branch.minimum);
        self.maximum = merge_min(self.maximum, branch.maximum);
        self.exclusive_minimum = merge_max(self.exclusive_minimum, branch.exclusive_minimum);
        self.exclusive_maximum = merge_min(self.exclusive_maximum, branch.exclusive_maximum);
        self.min_length = merge_max_u64(self.min_length, branch.min_length);
        self.max_length = merge_min_u64(self.max_length, branch.max_length);
        if let Some(props) = &branch.properties {
            for (name, sid) in props {
                if !self.properties.iter().any(|(n, _)| n == name) {
                    self.properties.push((name.clone(), *sid));
                }
            }
        }
        if let Some(req) = &branch.required {
            for name in req {
                if !self.required.contains(name) {
                    self.required.push(name.clone());
                }
            }
        }
    }

    fn infer_type(&self) -> Option<InstanceType> {
        if !self.properties.is_empty() || !self.required.is_empty() {
            Some(InstanceType::Object)
        } else if self.items.is_some() || !self.prefix_items.is_empty() {
            Some(InstanceType::Array)
        } else if self.pattern.is_some() || self.format.is_some() || self.min_length.is_some() || self.max_length.is_some() {
            Some(InstanceType::String)
        } else if self.minimum.is_some() || self.maximum.is_some() {
            Some(InstanceType::Number)
        } else {
            None
        }
    }
}

fn merge_max(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

fn merge_min(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

fn merge_max_u64(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

fn merge_min_u64(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

fn numeric_range(effective: &Effective) -> (f64, f64) {
    let mut low = effective.minimum.or(effective.exclusive_minimum.map(|m| m + 1.0)).unwrap_or(0.0);
    let mut high = effective.maximum.or(effective.exclusive_maximum.map(|m| m - 1.0)).unwrap_or(100.0);
    if let Some(m) = effective.exclusive_minimum {
        if low <= m {
            low = m + 1.0;
        }
    }
    if let Some(m) = effective.exclusive_maximum {
        if high >= m {
            high = m - 1.0;
        }
    }
    (low, high)
}

fn canonical_for_format(format_name: &str) -> Option<String> {
    Some(
        match format_name {
            "date" => "2024-01-01",
            "date-time" => "2024-01-01T00:00:00Z",
            "time" => "00:00:00",
            "duration" => "P1D",
            "email" => "user@example.com",
            "hostname" => "example.com",
            "ipv4" => "192.0.2.1",
            "ipv6" => "::1",
            "uri" => "https://example.com",
            "uri-reference" => "/example",
            "uuid" => "00000000-0000-4000-8000-000000000000",
            "regex" => "^.*$",
            _ => return None,
        }
        .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::processor::{ProcessOptions, SchemaProcessor};
    use crate::validator::RuntimeValidator;
    use serde_json::json;

    fn process(doc: &Value) -> std::sync::Arc<ProcessedSchema> {
        SchemaProcessor::new(1000, 1024).process(doc, &Pointer::root(), &ProcessOptions::default()).unwrap()
    }

    #[test]
    fn cycle_tolerance_produces_a_bounded_tree_value() {
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
        let generator = ResponseGenerator::new();
        let outcome = generator.generate(&processed, &GenerateOptions { seed: Some(0), max_depth: Some(3), ..Default::default() });
        let obj = outcome.value.as_object().unwrap();
        assert!(obj.get("value").unwrap().is_string());
        assert_eq!(obj.get("children").unwrap(), &json!([]));
    }

    #[test]
    fn generated_values_validate_for_a_simple_object_schema() {
        let doc = json!({
            "type": "object",
            "properties": {"name": {"type": "string", "minLength": 2, "maxLength": 10}, "age": {"type": "integer", "minimum": 0, "maximum": 120}},
            "required": ["name", "age"]
        });
        let processed = process(&doc);
        let generator = ResponseGenerator::new();
        let validator = RuntimeValidator::new();
        for seed in 0..5u64 {
            let outcome = generator.generate(&processed, &GenerateOptions { seed: Some(seed), ..Default::default() });
            assert!(validator.validate(&processed, &outcome.value).is_empty(), "seed {seed} produced invalid value: {:?}", outcome.value);
        }
    }

    #[test]
    fn deterministic_given_the_same_seed() {
        let doc = json!({"type": "string", "minLength": 5, "maxLength": 5});
        let processed = process(&doc);
        let generator = ResponseGenerator::new();
        let a = generator.generate(&processed, &GenerateOptions { seed: Some(42), ..Default::default() });
        let b = generator.generate(&processed, &GenerateOptions { seed: Some(42), ..Default::default() });
        assert_eq!(a.value, b.value);
    }

    #[test]
    fn prefers_example_over_synthesis() {
        let doc = json!({"type": "string", "example": "canonical"});
        let processed = process(&doc);
        let generator = ResponseGenerator::new();
        let outcome = generator.generate(&processed, &GenerateOptions::default());
        assert_eq!(outcome.value, json!("canonical"));
    }

    #[test]
    fn empty_enum_is_reported_rather_than_panicking() {
        let doc = json!({"enum": []});
        let processed = process(&doc);
        let generator = ResponseGenerator::new();
        let outcome = generator.generate(&processed, &GenerateOptions::default());
        assert_eq!(outcome.value, Value::Null);
        assert!(outcome.diagnostics.iter().any(|d| d.code == DiagnosticCode::EMPTY_ENUM));
    }

    #[test]
    fn array_length_honors_min_and_max_items() {
        let doc = json!({"type": "array", "items": {"type": "integer"}, "minItems": 3, "maxItems": 3});
        let processed = process(&doc);
        let generator = ResponseGenerator::new();
        let outcome = generator.generate(&processed, &GenerateOptions::default());
        assert_eq!(outcome.value.as_array().unwrap().len(), 3);
    }
}
