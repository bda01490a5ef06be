//! End-to-end scenarios exercising the full pipeline (Pointer -> reference
//! resolution -> schema processing -> validation/generation/attribution)
//! against literal inputs, rather than one module's internals in isolation.

use schema_core::attribution::AttributionAnalyzer;
use schema_core::generator::{GenerateOptions, ResponseGenerator};
use schema_core::pointer::Pointer;
use schema_core::reference;
use schema_core::schema::{ProcessOptions, SchemaProcessor};
use schema_core::validator::{RuntimeValidator, ValidationError};
use serde_json::json;

fn process(doc: &serde_json::Value) -> std::sync::Arc<schema_core::ProcessedSchema> {
    let processor = SchemaProcessor::new(100, 1024);
    processor.process(doc, &Pointer::root(), &ProcessOptions::default()).expect("schema should process")
}

#[test]
fn cycle_tolerance_generates_and_validates_a_tree() {
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
    let options = GenerateOptions { seed: Some(0), max_depth: Some(3), prefer_examples: None };
    let outcome = generator.generate(&processed, &options);
    let obj = outcome.value.as_object().expect("generated value should be an object");
    assert!(obj.get("value").and_then(|v| v.as_str()).is_some());
    assert_eq!(obj.get("children"), Some(&json!([])));

    let validator = RuntimeValidator::new();
    let data = json!({"value": "a", "children": [{"value": "b", "children": []}]});
    let errors = validator.validate(&processed, &data);
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
}

#[test]
fn exclusive_bounds_reject_the_boundary_and_accept_the_interior() {
    let doc = json!({"type": "integer", "exclusiveMinimum": 5, "exclusiveMaximum": 10});
    let processed = process(&doc);
    let validator = RuntimeValidator::new();

    assert!(!validator.validate(&processed, &json!(5)).is_empty());
    assert!(validator.validate(&processed, &json!(6)).is_empty());
    assert!(validator.validate(&processed, &json!(9)).is_empty());
    assert!(!validator.validate(&processed, &json!(10)).is_empty());
}

#[test]
fn composition_with_unevaluated_properties_flags_only_the_unknown_key() {
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

    let errors = validator.validate(&processed, &json!({"a": "x", "b": 1, "c": true}));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].data_pointer, Pointer::parse("/c").unwrap());
}

#[test]
fn percent_decoded_ref_resolves_a_path_template_segment() {
    let doc = json!({
        "paths": {
            "/users/{id}": {
                "get": {"responses": {"200": {"description": "ok"}}}
            }
        }
    });
    let resolved = reference::resolve_ref(
        &doc,
        "#/paths/~1users~1%7Bid%7D/get/responses/200",
        &mut Vec::new(),
    )
    .unwrap();
    assert_eq!(resolved, &json!({"description": "ok"}));
}

#[test]
fn a_single_required_miss_is_attributed_to_the_client() {
    let doc = json!({"type": "object", "properties": {"email": {"type": "string"}}, "required": ["email"]});
    let processed = process(&doc);
    let error = ValidationError {
        data_pointer: Pointer::parse("/email").unwrap(),
        schema_pointer: Pointer::parse("/required").unwrap(),
        keyword: "required".to_string(),
        message: "missing required property 'email'".to_string(),
        expected: None,
        actual: None,
    };

    let analyzer = AttributionAnalyzer::new();
    let result = analyzer.analyze(&[error], &json!({}), Some(processed.as_ref()));
    assert_eq!(result.kind, schema_core::Attribution::Sdk);
    assert!(result.confidence >= 0.8, "confidence too low: {}", result.confidence);
}

#[test]
fn a_mutually_unsatisfiable_schema_is_attributed_to_the_spec() {
    let doc = json!({"type": "string", "maxLength": 2, "pattern": "^[A-Z]{3}$"});
    let processed = process(&doc);
    let validator = RuntimeValidator::new();
    let errors = validator.validate(&processed, &json!("USD"));
    assert!(!errors.is_empty());

    let analyzer = AttributionAnalyzer::new();
    let result = analyzer.analyze(&errors, &json!("USD"), Some(processed.as_ref()));
    assert_eq!(result.kind, schema_core::Attribution::Spec);
}
