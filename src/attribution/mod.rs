//! # AttributionAnalyzer
//!
//! Classifies a cluster of [`crate::validator::ValidationError`]s as the
//! likely fault of the client (`sdk`), the API schema itself (`spec`), or
//! neither in particular (`ambiguous`). Each error casts a weighted
//! vote for one of the three kinds; the dominating kind wins and the
//! confidence is the normalized margin over the runner-up, which keeps a
//! single error from producing false certainty while still letting a
//! lopsided cluster (e.g. ten `required` misses) report high confidence.

use crate::diagnostic::{Attribution, Diagnostic, DiagnosticCode, Severity};
use crate::pointer::Pointer;
use crate::schema::ProcessedSchema;
use crate::validator::ValidationError;
use serde_json::Value;

/// The outcome of [`AttributionAnalyzer::analyze`].
#[derive(Debug, Clone)]
pub struct AttributionResult {
    pub kind: Attribution,
    pub confidence: f64,
    /// `None` only for the empty-input case: empty input reports
    /// ambiguous with confidence 0 rather than fabricating a primary error.
    pub primary: Option<ValidationError>,
    pub related: Vec<ValidationError>,
    pub suggestion: String,
}

impl AttributionResult {
    fn empty() -> Self {
        AttributionResult {
            kind: Attribution::Ambiguous,
            confidence: 0.0,
            primary: None,
            related: Vec::new(),
            suggestion: "no validation errors were supplied".to_string(),
        }
    }
}

/// Regex shapes treated as too restrictive for ordinary client input to
/// satisfy, or containing lookarounds.
const LOOKAROUND_MARKERS: &[&str] = &["(?=", "(?!", "(?<=", "(?<!"];

const MAX_REASONABLE_PATTERN_LEN: usize = 50;
const MIN_REASONABLE_MAX_LENGTH: u64 = 3;

/// Well-known formats whose failures are attributed to the client rather
/// than treated as a schema ambiguity.
const WELL_KNOWN_FORMATS: &[&str] = &["email", "uuid", "date-time", "date", "ipv4", "ipv6", "hostname", "uri"];

#[derive(Debug, Clone, Copy)]
struct Vote {
    kind: Attribution,
    weight: f64,
}

pub struct AttributionAnalyzer;

impl Default for AttributionAnalyzer {
    fn default() -> Self {
        AttributionAnalyzer
    }
}

impl AttributionAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `errors` observed while validating `data`. `schema_context`,
    /// when supplied, lets spec-structural diagnostics (e.g. an
    /// already-flagged unsatisfiable `maxLength`/`pattern` pair) dominate
    /// the vote even when the individual keyword errors would otherwise read
    /// as client mistakes.
    pub fn analyze(
        &self,
        errors: &[ValidationError],
        _data: &Value,
        schema_context: Option<&ProcessedSchema>,
    ) -> AttributionResult {
        if errors.is_empty() {
            return AttributionResult::empty();
        }

        let spec_conflict_pointers = schema_context.map(spec_conflict_pointers).unwrap_or_default();

        let mut sdk_weight = 0.0;
        let mut spec_weight = 0.0;
        let mut ambiguous_weight = 0.0;
        let mut rationale_by_weight: Vec<(f64, &'static str, &ValidationError)> = Vec::new();

        for error in errors {
            let Vote { kind, weight } = vote_for(error, &spec_conflict_pointers);
            match kind {
                Attribution::Sdk => sdk_weight += weight,
                Attribution::Spec => spec_weight += weight,
                Attribution::Ambiguous => ambiguous_weight += weight,
            }
            rationale_by_weight.push((weight, rationale_for(error, &spec_conflict_pointers), error));
        }

        let total = sdk_weight + spec_weight + ambiguous_weight;
        let mut ranked = [
            (Attribution::Sdk, sdk_weight),
            (Attribution::Spec, spec_weight),
            (Attribution::Ambiguous, ambiguous_weight),
        ];
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        let (kind, top) = ranked[0];
        let runner_up = ranked[1].1;
        let confidence = if total > 0.0 { ((top - runner_up) / total).clamp(0.0, 1.0) } else { 0.0 };

        // The primary error is the highest-weighted vote that agrees with
        // the winning kind, falling back to the first error overall.
        let primary = rationale_by_weight
            .iter()
            .filter(|(_, _, e)| vote_for(e, &spec_conflict_pointers).kind == kind)
            .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap())
            .map(|(_, _, e)| (*e).clone())
            .unwrap_or_else(|| errors[0].clone());

        let primary_rationale = rationale_by_weight
            .iter()
            .find(|(_, _, e)| (*e).data_pointer == primary.data_pointer && (*e).keyword == primary.keyword)
            .map(|(_, r, _)| *r)
            .unwrap_or("insufficient signal to attribute this failure confidently");

        let related: Vec<ValidationError> =
            errors.iter().filter(|e| e.data_pointer != primary.data_pointer || e.keyword != primary.keyword).cloned().collect();

        let suggestion = suggestion_for(kind, primary_rationale, &primary);

        AttributionResult { kind, confidence, primary: Some(primary), related, suggestion }
    }
}

/// Pointers (schema-relative) where a `schema-structure` diagnostic already
/// marked this node as unsatisfiable from the schema's own construction,
/// independent of any instance — the conflicting/contradictory-schema
/// heuristic.
fn spec_conflict_pointers(processed: &ProcessedSchema) -> Vec<Pointer> {
    processed
        .diagnostics
        .iter()
        .filter(|d| {
            (d.code == DiagnosticCode::UNSATISFIABLE_CONSTRAINT || d.code == DiagnosticCode::CONFLICTING_KEYWORDS)
                && (d.attribution == Attribution::Spec || d.severity >= Severity::Warning)
        })
        .map(|d: &Diagnostic| d.pointer.clone())
        .collect()
}

fn is_under_conflict(schema_pointer: &Pointer, conflicts: &[Pointer]) -> bool {
    conflicts.iter().any(|c| is_prefix(c, schema_pointer))
}

fn is_prefix(prefix: &Pointer, full: &Pointer) -> bool {
    let p = prefix.segments();
    let f = full.segments();
    p.len() <= f.len() && p.iter().zip(f.iter()).all(|(a, b)| a == b)
}

fn vote_for(error: &ValidationError, spec_conflicts: &[Pointer]) -> Vote {
    if is_under_conflict(&error.schema_pointer, spec_conflicts) {
        return Vote { kind: Attribution::Spec, weight: 3.0 };
    }

    match error.keyword.as_str() {
        "type" | "enum" | "const" => Vote { kind: Attribution::Sdk, weight: 3.0 },
        "required" => Vote { kind: Attribution::Sdk, weight: 2.5 },
        "false" => Vote { kind: Attribution::Spec, weight: 3.0 },
        "format" => {
            if is_well_known_format(&error.message) {
                Vote { kind: Attribution::Sdk, weight: 2.5 }
            } else {
                Vote { kind: Attribution::Ambiguous, weight: 1.0 }
            }
        }
        "pattern" => {
            if let Some(pattern) = extract_quoted_pattern(&error.message) {
                if pattern.len() > MAX_REASONABLE_PATTERN_LEN || LOOKAROUND_MARKERS.iter().any(|m| pattern.contains(m)) {
                    return Vote { kind: Attribution::Spec, weight: 2.0 };
                }
            }
            Vote { kind: Attribution::Sdk, weight: 1.5 }
        }
        "maxLength" => {
            if let Some(max) = extract_trailing_number(&error.message, "maxLength") {
                if max < MIN_REASONABLE_MAX_LENGTH {
                    return Vote { kind: Attribution::Spec, weight: 2.0 };
                }
            }
            Vote { kind: Attribution::Sdk, weight: 1.5 }
        }
        "minimum" | "maximum" | "exclusiveMinimum" | "exclusiveMaximum" | "multipleOf" | "minLength" | "minItems"
        | "maxItems" | "uniqueItems" | "minProperties" | "maxProperties" | "additionalProperties"
        | "unevaluatedProperties" => Vote { kind: Attribution::Sdk, weight: 1.5 },
        "oneOf" | "anyOf" => Vote { kind: Attribution::Ambiguous, weight: 1.0 },
        _ => Vote { kind: Attribution::Ambiguous, weight: 1.0 },
    }
}

fn rationale_for(error: &ValidationError, spec_conflicts: &[Pointer]) -> &'static str {
    if is_under_conflict(&error.schema_pointer, spec_conflicts) {
        return "the schema itself combines mutually unsatisfiable constraints";
    }
    match error.keyword.as_str() {
        "type" | "enum" | "const" => "the client sent a value of the wrong type/enum/const",
        "required" => "the client omitted a required field",
        "false" => "the schema rejects every instance at this location",
        "format" if is_well_known_format(&error.message) => "the client sent a malformed well-known format value",
        "pattern" => "the pattern constraint is either too strict for the spec or violated by the client",
        "maxLength" => "maxLength is either unreasonably small for the spec or violated by the client",
        "oneOf" | "anyOf" => "no composition branch matched; responsibility depends on why each branch failed",
        _ => "a keyword constraint was violated",
    }
}

fn suggestion_for(kind: Attribution, rationale: &str, primary: &ValidationError) -> String {
    match kind {
        Attribution::Sdk => format!(
            "fix the request: {rationale} (at {}, keyword '{}')",
            primary.data_pointer, primary.keyword
        ),
        Attribution::Spec => format!(
            "fix the schema: {rationale} (at {}, keyword '{}')",
            primary.schema_pointer, primary.keyword
        ),
        Attribution::Ambiguous => format!(
            "inconclusive: {rationale} (at {}, keyword '{}'); inspect both the request and the schema",
            primary.data_pointer, primary.keyword
        ),
    }
}

fn is_well_known_format(message: &str) -> bool {
    WELL_KNOWN_FORMATS.iter().any(|f| message.contains(&format!("'{f}'")))
}

/// Pull the last single-quoted substring out of a message like
/// `"'USD' does not match pattern '^[A-Z]{3}$'"` — i.e. the pattern text.
fn extract_quoted_pattern(message: &str) -> Option<&str> {
    let last_quote = message.rfind('\'')?;
    let remainder = &message[..last_quote];
    let start = remainder.rfind('\'')? + 1;
    Some(&message[start..last_quote])
}

/// Pull the integer following `keyword ` out of a message like
/// `"length 3 is greater than maxLength 2"`.
fn extract_trailing_number(message: &str, keyword: &str) -> Option<u64> {
    let marker = format!("{keyword} ");
    let idx = message.rfind(&marker)?;
    let rest = &message[idx + marker.len()..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
