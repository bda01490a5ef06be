//! # RequestValidator
//!
//! Maps an HTTP request onto a spec operation and validates every part of
//! it — path parameters, query, headers, cookies, and body — against the
//! same [`crate::schema::SchemaProcessor`]/[`crate::validator::RuntimeValidator`]
//! pipeline used everywhere else in this crate.
//!
//! Operation metadata is read directly from `openapiv3` types by matching
//! on `ReferenceOr` and resolving named components, rather than
//! re-deriving an OpenAPI model.
//! Once a parameter or request-body schema is resolved to an
//! `openapiv3::Schema`, it is re-serialized into a small synthetic
//! document — `{"components": {"schemas": ...}, "__root": <schema>}` — so
//! that any `$ref` inside it (e.g. `#/components/schemas/Pet`) still
//! resolves the way [`crate::schema::processor::SchemaProcessor`] expects:
//! against a whole document, not an isolated fragment. This keeps 2020-12
//! keyword support (composition, conditionals, `unevaluatedProperties`,
//! cycle tolerance) that `openapiv3`'s own types don't implement.

use crate::config::{CoreConfig, RequestMode};
use crate::errors::Result;
use crate::pointer::Pointer;
use crate::schema::processor::{ProcessOptions, SchemaProcessor};
use crate::validator::{RuntimeValidator, ValidationError};
use openapiv3::{Components, MediaType, Operation, Parameter, ParameterSchemaOrContent, ReferenceOr, RequestBody, Schema};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A request, abstracted down to the shape validation actually needs: `{ method,
/// url-path, url-query-pairs, headers (multi-map), body, content-type }`.
#[derive(Debug, Clone)]
pub struct RequestView {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    /// Multi-map: repeated keys (including repeated header names) are all
    /// present, in request order.
    pub headers: Vec<(String, String)>,
    pub body: Option<BodyData>,
    pub content_type: Option<String>,
}

/// A request body, either already decoded (the common case — the host
/// server typically owns body decoding) or raw bytes this validator will
/// decode itself for JSON content types only.
#[derive(Debug, Clone)]
pub enum BodyData {
    Json(Value),
    Raw(Vec<u8>),
}

impl BodyData {
    fn as_value(&self, content_type: &str) -> Option<Value> {
        match self {
            BodyData::Json(v) => Some(v.clone()),
            BodyData::Raw(bytes) => {
                if content_type.contains("json") {
                    serde_json::from_slice(bytes).ok()
                } else {
                    None
                }
            }
        }
    }
}

/// The result of [`RequestValidator::validate_request`]. Nothing here
/// rejects the request itself; the enclosing server decides the HTTP
/// response from the collected errors and warnings.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub path_parameters: HashMap<String, String>,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct RequestValidator {
    processor: Arc<SchemaProcessor>,
    runtime: RuntimeValidator,
    mode: RequestMode,
}

impl RequestValidator {
    pub fn new(mode: RequestMode) -> Self {
        RequestValidator { processor: Arc::new(SchemaProcessor::new(10_000, 1024)), runtime: RuntimeValidator::new(), mode }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        RequestValidator {
            processor: Arc::new(SchemaProcessor::from_config(config.cache.capacity, &config.schema)),
            runtime: RuntimeValidator::from_config(&config.schema),
            mode: config.request.mode,
        }
    }

    pub fn with_processor(mode: RequestMode, processor: Arc<SchemaProcessor>, runtime: RuntimeValidator) -> Self {
        RequestValidator { processor, runtime, mode }
    }

    /// Validate `request` against `operation`, matching `path_template`
    /// (e.g. `/pets/{id}`) to extract path parameters first.
    pub fn validate_request(
        &self,
        request: &RequestView,
        operation: &Operation,
        components: Option<&Components>,
        path_template: &str,
    ) -> ValidationResult {
        let mut result = ValidationResult::default();
        result.path_parameters = match_path_template(path_template, &request.path).unwrap_or_default();

        let mut declared_query: HashSet<String> = HashSet::new();

        for param_ref in &operation.parameters {
            let Some(param) = resolve_parameter(components, param_ref) else { continue };
            let data = param.parameter_data_ref();
            let location = parameter_location(param);
            if location == "query" {
                declared_query.insert(data.name.clone());
            }

            let raw_value: Option<String> = match location {
                "path" => result.path_parameters.get(&data.name).cloned(),
                "query" => first_value(&request.query, &data.name).map(str::to_string),
                "header" => first_header_value(&request.headers, &data.name).map(str::to_string),
                "cookie" => first_cookie_value(&request.headers, &data.name),
                _ => None,
            };

            let raw_value = match raw_value {
                None if data.required => {
                    result.errors.push(ValidationError::new(
                        Pointer::from_segments([location.to_string(), data.name.clone()]),
                        Pointer::root(),
                        "required",
                        format!("missing required {location} parameter '{}'", data.name),
                    ));
                    continue;
                }
                None => continue,
                Some(v) => v,
            };

            if let ParameterSchemaOrContent::Schema(schema_ref) = &data.format {
                if let Some(schema) = resolve_schema(components, schema_ref) {
                    self.validate_against_schema(
                        components,
                        schema,
                        &coerce_scalar_for_schema(&raw_value, schema),
                        &Pointer::from_segments([location.to_string(), data.name.clone()]),
                        &mut result.errors,
                    );
                }
            }
        }

        for (name, _) in &request.query {
            if !declared_query.contains(name) {
                let err = ValidationError::new(
                    Pointer::from_segments(["query".to_string(), name.clone()]),
                    Pointer::root(),
                    "unknown-parameter",
                    format!("query parameter '{name}' is not declared by the operation"),
                );
                match self.mode {
                    RequestMode::Strict => result.errors.push(err),
                    RequestMode::Relaxed => result.warnings.push(err),
                }
            }
        }

        if let Some(rb_ref) = &operation.request_body {
            self.validate_body(components, rb_ref, request, &mut result);
        }

        result
    }

    fn validate_body(
        &self,
        components: Option<&Components>,
        rb_ref: &ReferenceOr<RequestBody>,
        request: &RequestView,
        result: &mut ValidationResult,
    ) {
        let Some(request_body) = resolve_request_body(components, rb_ref) else { return };

        match &request.body {
            None => {
                if request_body.required {
                    result.errors.push(ValidationError::new(
                        Pointer::from_segments(["body".to_string()]),
                        Pointer::root(),
                        "required",
                        "request body is required but was not supplied",
                    ));
                }
            }
            Some(body) => {
                let content_type = request.content_type.as_deref().unwrap_or("application/json");
                let Some((_, media)) = select_media_type(&request_body.content, content_type) else {
                    return;
                };
                let Some(schema_ref) = &media.schema else { return };
                let Some(schema) = resolve_schema(components, schema_ref) else { return };
                let Some(value) = body.as_value(content_type) else {
                    result.errors.push(ValidationError::new(
                        Pointer::from_segments(["body".to_string()]),
                        Pointer::root(),
                        "parse",
                        format!("request body could not be decoded for content type '{content_type}'"),
                    ));
                    return;
                };

                let mut raw_errors = Vec::new();
                self.validate_against_schema(components, schema, &value, &Pointer::from_segments(["body".to_string()]), &mut raw_errors);

                for error in raw_errors {
                    let demote = matches!(error.keyword.as_str(), "additionalProperties" | "unevaluatedProperties")
                        && self.mode == RequestMode::Relaxed;
                    if demote {
                        result.warnings.push(error);
                    } else {
                        result.errors.push(error);
                    }
                }
            }
        }
    }

    fn validate_against_schema(
        &self,
        components: Option<&Components>,
        schema: &Schema,
        value: &Value,
        data_prefix: &Pointer,
        errors: &mut Vec<ValidationError>,
    ) {
        let Ok(doc) = build_synthetic_document(components, schema) else { return };
        let root = Pointer::parse("/__root").expect("literal pointer always parses");
        let Ok(processed) = self.processor.process(&doc, &root, &ProcessOptions::default()) else {
            return;
        };
        for mut error in self.runtime.validate(&processed, value) {
            error.data_pointer = prefix_pointer(data_prefix, &error.data_pointer);
            errors.push(error);
        }
    }
}

fn prefix_pointer(prefix: &Pointer, suffix: &Pointer) -> Pointer {
    Pointer::from_segments(prefix.segments().iter().cloned().chain(suffix.segments().iter().cloned()))
}

fn parameter_location(p: &Parameter) -> &'static str {
    match p {
        Parameter::Query { .. } => "query",
        Parameter::Path { .. } => "path",
        Parameter::Header { .. } => "header",
        Parameter::Cookie { .. } => "cookie",
    }
}

fn resolve_parameter<'a>(components: Option<&'a Components>, r: &'a ReferenceOr<Parameter>) -> Option<&'a Parameter> {
    match r {
        ReferenceOr::Item(p) => Some(p),
        ReferenceOr::Reference { reference } => {
            let name = reference.strip_prefix("#/components/parameters/")?;
            match components?.parameters.get(name)? {
                ReferenceOr::Item(p) => Some(p),
                ReferenceOr::Reference { .. } => None,
            }
        }
    }
}

fn resolve_request_body<'a>(components: Option<&'a Components>, r: &'a ReferenceOr<RequestBody>) -> Option<&'a RequestBody> {
    match r {
        ReferenceOr::Item(b) => Some(b),
        ReferenceOr::Reference { reference } => {
            let name = reference.strip_prefix("#/components/requestBodies/")?;
            match components?.request_bodies.get(name)? {
                ReferenceOr::Item(b) => Some(b),
                ReferenceOr::Reference { .. } => None,
            }
        }
    }
}

fn resolve_schema<'a>(components: Option<&'a Components>, r: &'a ReferenceOr<Schema>) -> Option<&'a Schema> {
    match r {
        ReferenceOr::Item(s) => Some(s),
        ReferenceOr::Reference { reference } => {
            let name = reference.strip_prefix("#/components/schemas/")?;
            match components?.schemas.get(name)? {
                ReferenceOr::Item(s) => Some(s),
                ReferenceOr::Reference { .. } => None,
            }
        }
    }
}

/// Re-serialize a resolved `openapiv3::Schema` plus the document's
/// `components.schemas` map into a small synthetic document so
/// `$ref: "#/components/schemas/..."` inside the schema body still
/// resolves through [`crate::schema::processor::SchemaProcessor`]'s normal
/// whole-document ref walk.
fn build_synthetic_document(components: Option<&Components>, schema: &Schema) -> Result<Value> {
    let mut doc = serde_json::Map::new();
    if let Some(c) = components {
        let schemas_value = serde_json::to_value(&c.schemas)?;
        let mut components_map = serde_json::Map::new();
        components_map.insert("schemas".to_string(), schemas_value);
        doc.insert("components".to_string(), Value::Object(components_map));
    }
    doc.insert("__root".to_string(), serde_json::to_value(schema)?);
    Ok(Value::Object(doc))
}

fn select_media_type<'a>(
    content: &'a indexmap::IndexMap<String, MediaType>,
    content_type: &str,
) -> Option<(&'a str, &'a MediaType)> {
    let ct = content_type.split(';').next().unwrap_or(content_type).trim();
    if let Some(m) = content.get(ct) {
        return Some((ct, m));
    }
    let type_prefix = ct.split('/').next().unwrap_or(ct);
    for (k, v) in content.iter() {
        if k == &format!("{type_prefix}/*") {
            return Some((k.as_str(), v));
        }
    }
    content.get("*/*").map(|m| ("*/*", m))
}

/// Coerce a raw path/query/header/cookie string into the `Value` shape its
/// *declared* schema type expects, rather than guessing from the string's
/// own shape. A `{"type":"string"}` parameter keeps a value like `"true"`
/// or `"200"` as a JSON string; only a declared `boolean`/`integer`/`number`
/// schema coerces it to the matching JSON type. A value that doesn't parse
/// as its declared type is left as a string so the schema's own `type`
/// check reports the mismatch, rather than this function silently
/// swallowing it.
fn coerce_scalar_for_schema(raw: &str, schema: &Schema) -> Value {
    match &schema.schema_kind {
        openapiv3::SchemaKind::Type(openapiv3::Type::Boolean(_)) => {
            if raw.eq_ignore_ascii_case("true") {
                Value::Bool(true)
            } else if raw.eq_ignore_ascii_case("false") {
                Value::Bool(false)
            } else {
                Value::String(raw.to_string())
            }
        }
        openapiv3::SchemaKind::Type(openapiv3::Type::Integer(_)) => {
            raw.parse::<i64>().map(|i| Value::Number(i.into())).unwrap_or_else(|_| Value::String(raw.to_string()))
        }
        openapiv3::SchemaKind::Type(openapiv3::Type::Number(_)) => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(raw.to_string())),
        _ => Value::String(raw.to_string()),
    }
}

fn first_value<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
}

fn first_header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
}

fn first_cookie_value(headers: &[(String, String)], name: &str) -> Option<String> {
    let raw = first_header_value(headers, "cookie")?;
    for part in raw.split(';') {
        let mut kv = part.splitn(2, '=');
        let k = kv.next()?.trim();
        let v = kv.next().unwrap_or("").trim();
        if k == name {
            return Some(v.to_string());
        }
    }
    None
}

/// Match `path` against a `{name}`-templated path, returning the bound
/// parameters. Percent-decodes each matched segment
/// (ordinary URL percent-decoding, not RFC 6901 pointer unescaping — these
/// are URL path segments, a different domain from [`crate::pointer`]).
fn match_path_template(template: &str, path: &str) -> Option<HashMap<String, String>> {
    let template_segments: Vec<&str> = template.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect();
    let path_segments: Vec<&str> = path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect();
    if template_segments.len() != path_segments.len() {
        return None;
    }

    let mut params = HashMap::new();
    for (t, p) in template_segments.iter().zip(path_segments.iter()) {
        if let Some(name) = t.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            params.insert(name.to_string(), url_decode(p));
        } else if t != p {
            return None;
        }
    }
    Some(params)
}

fn url_decode(segment: &str) -> String {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(hex) = std::str::from_utf8(&bytes[i + 1..i + 3]) {
                if let Ok(byte) = u8::from_str_radix(hex, 16) {
                    out.push(byte);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use openapiv3::{ParameterData, ParameterSchemaOrContent};
    use serde_json::json;

    fn string_schema() -> Schema {
        serde_json::from_value(json!({"type": "string"})).unwrap()
    }

    fn integer_schema() -> Schema {
        serde_json::from_value(json!({"type": "integer", "minimum": 1})).unwrap()
    }

    fn path_param(name: &str, schema: Schema) -> ReferenceOr<Parameter> {
        ReferenceOr::Item(Parameter::Path {
            parameter_data: ParameterData {
                name: name.to_string(),
                description: None,
                required: true,
                deprecated: None,
                format: ParameterSchemaOrContent::Schema(ReferenceOr::Item(schema)),
                example: None,
                examples: Default::default(),
                explode: None,
                extensions: Default::default(),
            },
            style: Default::default(),
        })
    }

    fn query_param(name: &str, required: bool, schema: Schema) -> ReferenceOr<Parameter> {
        ReferenceOr::Item(Parameter::Query {
            parameter_data: ParameterData {
                name: name.to_string(),
                description: None,
                required,
                deprecated: None,
                format: ParameterSchemaOrContent::Schema(ReferenceOr::Item(schema)),
                example: None,
                examples: Default::default(),
                explode: None,
                extensions: Default::default(),
            },
            allow_reserved: false,
            style: Default::default(),
            allow_empty_value: None,
        })
    }

    fn bare_operation() -> Operation {
        Operation::default()
    }

    #[test]
    fn path_parameter_is_extracted_and_type_checked() {
        let mut operation = bare_operation();
        operation.parameters.push(path_param("id", integer_schema()));

        let request = RequestView {
            method: "GET".to_string(),
            path: "/pets/42".to_string(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            content_type: None,
        };

        let validator = RequestValidator::new(RequestMode::Strict);
        let result = validator.validate_request(&request, &operation, None, "/pets/{id}");
        assert_eq!(result.path_parameters.get("id").map(String::as_str), Some("42"));
        assert!(result.is_valid(), "errors: {:?}", result.errors);
    }

    #[test]
    fn path_parameter_violating_minimum_is_reported() {
        let mut operation = bare_operation();
        operation.parameters.push(path_param("id", integer_schema()));

        let request = RequestView {
            method: "GET".to_string(),
            path: "/pets/0".to_string(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            content_type: None,
        };

        let validator = RequestValidator::new(RequestMode::Strict);
        let result = validator.validate_request(&request, &operation, None, "/pets/{id}");
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.keyword == "minimum"));
    }

    #[test]
    fn string_parameter_shaped_like_a_bool_or_number_is_not_miscoerced() {
        let mut operation = bare_operation();
        operation.parameters.push(path_param("flag", string_schema()));

        let request = RequestView {
            method: "GET".to_string(),
            path: "/pets/true".to_string(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            content_type: None,
        };

        let validator = RequestValidator::new(RequestMode::Strict);
        let result = validator.validate_request(&request, &operation, None, "/pets/{flag}");
        assert!(result.is_valid(), "a declared string parameter with value 'true' should validate cleanly: {:?}", result.errors);
    }

    #[test]
    fn integer_parameter_still_coerces_numeric_strings() {
        let mut operation = bare_operation();
        operation.parameters.push(path_param("id", integer_schema()));

        let request = RequestView {
            method: "GET".to_string(),
            path: "/pets/7".to_string(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            content_type: None,
        };

        let validator = RequestValidator::new(RequestMode::Strict);
        let result = validator.validate_request(&request, &operation, None, "/pets/{id}");
        assert!(result.is_valid(), "errors: {:?}", result.errors);
    }

    #[test]
    fn missing_required_query_parameter_is_an_error() {
        let mut operation = bare_operation();
        operation.parameters.push(query_param("limit", true, integer_schema()));

        let request = RequestView {
            method: "GET".to_string(),
            path: "/pets".to_string(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            content_type: None,
        };

        let validator = RequestValidator::new(RequestMode::Relaxed);
        let result = validator.validate_request(&request, &operation, None, "/pets");
        assert!(result.errors.iter().any(|e| e.keyword == "required"));
    }

    #[test]
    fn unknown_query_parameter_is_a_warning_in_relaxed_mode_and_error_in_strict() {
        let operation = bare_operation();
        let request = RequestView {
            method: "GET".to_string(),
            path: "/pets".to_string(),
            query: vec![("debug".to_string(), "1".to_string())],
            headers: Vec::new(),
            body: None,
            content_type: None,
        };

        let relaxed = RequestValidator::new(RequestMode::Relaxed);
        let relaxed_result = relaxed.validate_request(&request, &operation, None, "/pets");
        assert!(relaxed_result.errors.is_empty());
        assert!(relaxed_result.warnings.iter().any(|e| e.keyword == "unknown-parameter"));

        let strict = RequestValidator::new(RequestMode::Strict);
        let strict_result = strict.validate_request(&request, &operation, None, "/pets");
        assert!(strict_result.errors.iter().any(|e| e.keyword == "unknown-parameter"));
    }

    #[test]
    fn request_body_is_validated_against_its_schema() {
        let mut operation = bare_operation();
        let mut content = indexmap::IndexMap::new();
        content.insert(
            "application/json".to_string(),
            MediaType { schema: Some(ReferenceOr::Item(string_schema())), example: None, examples: Default::default(), encoding: Default::default(), extensions: Default::default() },
        );
        operation.request_body = Some(ReferenceOr::Item(RequestBody { description: None, content, required: true }));

        let request = RequestView {
            method: "POST".to_string(),
            path: "/pets".to_string(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Some(BodyData::Json(json!(42))),
            content_type: Some("application/json".to_string()),
        };

        let validator = RequestValidator::new(RequestMode::Strict);
        let result = validator.validate_request(&request, &operation, None, "/pets");
        assert!(result.errors.iter().any(|e| e.keyword == "type"));
        assert!(result.errors.iter().all(|e| e.data_pointer.segments()[0] == "body"));
    }

    #[test]
    fn path_template_matching_is_exact_on_length_and_literal_segments() {
        assert!(match_path_template("/a/{x}/b", "/a/1/b").is_some());
        assert!(match_path_template("/a/{x}/b", "/a/1/c").is_none());
        assert!(match_path_template("/a/{x}", "/a/1/2").is_none());
    }
}
