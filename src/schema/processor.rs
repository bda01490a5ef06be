//! # SchemaProcessor
//!
//! The top-level façade: consumes a raw schema `Value` rooted at some
//! [`Pointer`] into a [`crate::graph::ReferenceGraph`]-aware document,
//! allocates every reachable sub-schema into a [`SchemaArena`], substitutes
//! [`Schema::cycle_placeholder`] sentinels at cyclic `$ref` sites, and
//! records structural [`Diagnostic`]s along the way. Results are cached by
//! canonical pointer in a process-wide, capacity-bounded, read-mostly LRU.

use crate::cancellation::CancellationToken;
use crate::config::SchemaConfig;
use crate::diagnostic::{Attribution, Diagnostic, DiagnosticCode, Severity};
use crate::errors::{CoreError, Result};
use crate::graph::ReferenceGraph;
use crate::pointer::Pointer;
use crate::reference;
use crate::schema::arena::SchemaArena;
use crate::schema::model::{BoolOrSchema, InstanceType, Schema, SchemaId, SchemaObject};
use dashmap::DashMap;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Every 2020-12 / OpenAPI keyword this crate models explicitly. Anything
/// else present on a schema object is reported as [`DiagnosticCode::UNKNOWN_KEYWORD`]
/// but otherwise ignored.
const KNOWN_KEYWORDS: &[&str] = &[
    "type", "format", "enum", "const",
    "minimum", "maximum", "exclusiveMinimum", "exclusiveMaximum", "multipleOf",
    "minLength", "maxLength", "pattern",
    "items", "prefixItems", "minItems", "maxItems", "uniqueItems", "contains", "minContains", "maxContains",
    "properties", "patternProperties", "propertyNames", "required", "additionalProperties",
    "unevaluatedProperties", "unevaluatedItems", "minProperties", "maxProperties",
    "allOf", "anyOf", "oneOf", "not",
    "if", "then", "else", "dependentSchemas",
    "$ref", "$defs", "$anchor", "$dynamicRef", "$dynamicAnchor", "$id", "$schema", "$comment",
    "title", "description", "default", "examples", "example",
    "nullable", "readOnly", "writeOnly", "deprecated", "discriminator", "xml",
];

/// Options controlling a single [`SchemaProcessor::process`] call.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Reserved for a future external-ref resolution story; this crate only
    /// supports internal `#/...` refs, so `base_uri` is currently unused
    /// beyond being threaded through for collaborators.
    pub base_uri: Option<String>,
    /// A pre-processed JSON Schema 2020-12 meta-schema, validated against
    /// using this crate's own [`crate::validator::RuntimeValidator`] when
    /// supplied.
    pub metaschema: Option<Arc<ProcessedSchema>>,
    /// Override the default depth sanity cap for this call.
    pub max_depth: Option<u32>,
    /// Cooperative cancellation, checked at the outer loop of the build.
    pub cancellation: Option<CancellationToken>,
}

/// Ref bookkeeping for a processed schema.
#[derive(Debug, Clone, Default)]
pub struct RefInfo {
    /// ref-string -> the document-absolute pointer where its target lives.
    /// Only populated for *acyclic* refs; cyclic refs are resolved through
    /// [`ProcessedSchema::resolve_ref_target`] instead of a pointer lookup.
    pub resolved: HashMap<String, Pointer>,
    /// ref-strings found to participate in a cycle.
    pub cyclic: HashSet<String>,
    /// ref-string -> the refs it directly depends on (from the full-document
    /// [`ReferenceGraph`], restricted to refs this schema actually reaches).
    pub dependencies: HashMap<String, Vec<String>>,
}

/// A read-only description of a single ref site, grounded in
/// [`ReferenceGraph`]'s already-materialized adjacency data. Useful for
/// tooling built on top of this core (e.g. a CLI `explain` subcommand).
#[derive(Debug, Clone)]
pub struct RefDescription {
    pub is_cyclic: bool,
    pub resolved_pointer: Option<Pointer>,
    pub dependencies: Vec<String>,
}

/// The result of processing a [`Schema`] against a document: an indexed,
/// cycle-tolerant, diagnostic-bearing tree ready for
/// [`crate::validator::RuntimeValidator`] and
/// [`crate::generator::ResponseGenerator`].
#[derive(Debug, Clone)]
pub struct ProcessedSchema {
    arena: Arc<SchemaArena>,
    pub root: SchemaId,
    /// Sub-pointer (relative to `root`) -> SchemaId, for the *inline*
    /// portion of the schema only; a schema reached by crossing a `$ref` is
    /// indexed separately at its own ref site and is reachable through
    /// [`Self::resolve_ref_target`], not this map.
    pub by_sub_pointer: HashMap<Pointer, SchemaId>,
    pub refs: RefInfo,
    ref_schema_ids: HashMap<String, SchemaId>,
    /// `$dynamicAnchor` name -> the first schema node encountered bearing it,
    /// in build order. Used as the static fallback for `$dynamicRef`
    /// resolution when the active dynamic scope has no matching binding.
    dynamic_anchors: HashMap<String, SchemaId>,
    pub max_depth: u32,
    pub diagnostics: Vec<Diagnostic>,
}

impl ProcessedSchema {
    pub fn arena(&self) -> &SchemaArena {
        &self.arena
    }

    pub fn get(&self, id: SchemaId) -> &Schema {
        self.arena.get(id)
    }

    pub fn root_schema(&self) -> &Schema {
        self.arena.get(self.root)
    }

    /// The SchemaId an acyclic `$ref` resolves to, if this processed schema
    /// encountered it. Cyclic refs never appear here: their site already
    /// holds a [`Schema::cycle_placeholder`].
    pub fn resolve_ref_target(&self, ref_str: &str) -> Option<SchemaId> {
        self.ref_schema_ids.get(ref_str).copied()
    }

    /// The statically-bound target of a `$dynamicAnchor` name, used when
    /// [`crate::validator::RuntimeValidator`]'s active dynamic scope has no
    /// matching binding for a `$dynamicRef`.
    pub fn resolve_dynamic_anchor(&self, name: &str) -> Option<SchemaId> {
        self.dynamic_anchors.get(name).copied()
    }

    pub fn describe_ref(&self, ref_str: &str) -> RefDescription {
        RefDescription {
            is_cyclic: self.refs.cyclic.contains(ref_str),
            resolved_pointer: self.refs.resolved.get(ref_str).cloned(),
            dependencies: self.refs.dependencies.get(ref_str).cloned().unwrap_or_default(),
        }
    }
}

struct CacheEntry {
    schema: Arc<ProcessedSchema>,
    last_used: u64,
}

/// Processes raw schema documents into [`ProcessedSchema`]s, caching results
/// by canonical root pointer plus document content fingerprint in a
/// capacity-bounded LRU.
pub struct SchemaProcessor {
    cache: DashMap<String, CacheEntry>,
    capacity: usize,
    default_max_depth: u32,
    tick: AtomicU64,
}

impl SchemaProcessor {
    pub fn new(cache_capacity: usize, default_max_depth: u32) -> Self {
        SchemaProcessor {
            cache: DashMap::new(),
            capacity: cache_capacity.max(1),
            default_max_depth,
            tick: AtomicU64::new(0),
        }
    }

    pub fn from_config(cache_capacity: usize, schema: &SchemaConfig) -> Self {
        Self::new(cache_capacity, schema.max_depth)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Process the schema rooted at `root` within `document`, returning a
    /// cached result if this exact root pointer of this exact document has
    /// already been processed.
    pub fn process(
        &self,
        document: &Value,
        root: &Pointer,
        options: &ProcessOptions,
    ) -> Result<Arc<ProcessedSchema>> {
        let fingerprint = document_fingerprint(document);
        self.process_with_fingerprint(document, fingerprint, root, options)
    }

    /// Process every named root reachable from `document` — e.g. every
    /// `components.schemas` entry plus inline operation schemas — in
    /// [`ReferenceGraph`] topological order, so that by the time a root is
    /// processed, its non-cyclic ref dependencies are (if they are
    /// themselves named roots) already cached.
    pub fn process_document(
        &self,
        document: &Value,
        roots: &[Pointer],
        options: &ProcessOptions,
    ) -> Result<Vec<Arc<ProcessedSchema>>> {
        let graph = ReferenceGraph::build(document);
        let topo = graph.topological_order();
        let topo_index: HashMap<&str, usize> =
            topo.iter().enumerate().map(|(i, r)| (r.as_str(), i)).collect();

        let mut ordered: Vec<Pointer> = roots.to_vec();
        ordered.sort_by_key(|p| {
            let ref_form = format!("#{p}");
            topo_index.get(ref_form.as_str()).copied().unwrap_or(usize::MAX)
        });

        let fingerprint = document_fingerprint(document);
        let mut out = Vec::with_capacity(ordered.len());
        for root in &ordered {
            if options.cancellation.as_ref().is_some_and(CancellationToken::is_cancelled) {
                return Err(CoreError::cancelled("document processing cancelled"));
            }
            out.push(self.process_with_fingerprint(document, fingerprint, root, options)?);
        }
        Ok(out)
    }

    /// Cache key folds in a content fingerprint of `document` alongside
    /// `root` so that two distinct documents sharing a root pointer (e.g.
    /// both rooted at `""`, or both defining `/components/schemas/Pet`)
    /// never alias each other's cached `ProcessedSchema`.
    fn process_with_fingerprint(
        &self,
        document: &Value,
        fingerprint: u64,
        root: &Pointer,
        options: &ProcessOptions,
    ) -> Result<Arc<ProcessedSchema>> {
        let cache_key = format!("{fingerprint:016x}:{root}");
        if let Some(mut entry) = self.cache.get_mut(&cache_key) {
            entry.last_used = self.tick.fetch_add(1, Ordering::Relaxed);
            return Ok(entry.schema.clone());
        }

        if options.cancellation.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(CoreError::cancelled("schema processing cancelled before start"));
        }

        let built = Arc::new(self.build(document, root, options)?);
        self.insert_cache(cache_key, built.clone());
        Ok(built)
    }

    fn insert_cache(&self, key: String, schema: Arc<ProcessedSchema>) {
        if self.cache.len() >= self.capacity && !self.cache.contains_key(&key) {
            self.evict_one();
        }
        let tick = self.tick.fetch_add(1, Ordering::Relaxed);
        self.cache.insert(key, CacheEntry { schema, last_used: tick });
    }

    fn evict_one(&self) {
        let victim = self.cache.iter().min_by_key(|e| e.value().last_used).map(|e| e.key().clone());
        if let Some(key) = victim {
            self.cache.remove(&key);
        }
    }

    fn build(&self, document: &Value, root: &Pointer, options: &ProcessOptions) -> Result<ProcessedSchema> {
        let root_value = root
            .resolve(document)
            .map_err(|_| CoreError::reference(root.clone(), "processed root does not exist in document"))?;

        let graph = ReferenceGraph::build(document);
        let cyclic_refs: HashSet<String> = graph.cycles().into_iter().flatten().collect();
        let cancellation = options.cancellation.clone().unwrap_or_default();

        let mut builder = Builder {
            document,
            cyclic_refs: &cyclic_refs,
            arena: SchemaArena::new(),
            memo: HashMap::new(),
            by_sub_pointer: HashMap::new(),
            ref_schema_ids: HashMap::new(),
            ref_target_pointers: HashMap::new(),
            dynamic_anchors: HashMap::new(),
            encountered_refs: HashSet::new(),
            diagnostics: Vec::new(),
            max_depth_seen: 0,
            max_depth_cap: options.max_depth.unwrap_or(self.default_max_depth),
            cancellation,
        };

        let root_id = builder.resolve_node(root_value, root, Some(&Pointer::root()), 0)?;

        let mut refs_resolved = HashMap::new();
        let mut refs_cyclic = HashSet::new();
        let mut refs_deps = HashMap::new();
        for r in &builder.encountered_refs {
            refs_deps.insert(r.clone(), graph.dependencies_of(r).to_vec());
            if cyclic_refs.contains(r) {
                refs_cyclic.insert(r.clone());
            } else if let Some(target_ptr) = builder.ref_target_pointers.get(r) {
                refs_resolved.insert(r.clone(), target_ptr.clone());
            }
        }

        let mut diagnostics = builder.diagnostics;
        if let Some(metaschema) = &options.metaschema {
            diagnostics.extend(validate_against_metaschema(root_value, metaschema, root));
        }

        Ok(ProcessedSchema {
            arena: Arc::new(builder.arena),
            root: root_id,
            by_sub_pointer: builder.by_sub_pointer,
            refs: RefInfo { resolved: refs_resolved, cyclic: refs_cyclic, dependencies: refs_deps },
            ref_schema_ids: builder.ref_schema_ids,
            dynamic_anchors: builder.dynamic_anchors,
            max_depth: builder.max_depth_seen,
            diagnostics,
        })
    }
}

fn validate_against_metaschema(
    schema_value: &Value,
    metaschema: &Arc<ProcessedSchema>,
    root: &Pointer,
) -> Vec<Diagnostic> {
    let validator = crate::validator::RuntimeValidator::new();
    validator
        .validate(metaschema, schema_value)
        .into_iter()
        .map(|e| {
            Diagnostic::new(
                DiagnosticCode::METASCHEMA_VIOLATION,
                Severity::Error,
                root.clone(),
                format!("schema fails its meta-schema at {}: {}", e.schema_pointer, e.message),
            )
            .with_attribution(Attribution::Spec)
        })
        .collect()
}

/// A structural content hash of `document`, independent of object key
/// insertion order being the same across two equal documents (it always is,
/// since `preserve_order` makes iteration order the source order) but
/// distinct for documents that differ in content. Folded into the cache key
/// alongside the root pointer so two different documents that happen to
/// share a root pointer (e.g. both rooted at `""`) never alias each other's
/// cached `ProcessedSchema`.
fn document_fingerprint(document: &Value) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::Hasher;
    let mut hasher = DefaultHasher::new();
    hash_value(document, &mut hasher);
    hasher.finish()
}

fn hash_value(value: &Value, hasher: &mut impl std::hash::Hasher) {
    use std::hash::Hash;
    match value {
        Value::Null => 0u8.hash(hasher),
        Value::Bool(b) => {
            1u8.hash(hasher);
            b.hash(hasher);
        }
        Value::Number(n) => {
            2u8.hash(hasher);
            n.as_f64().unwrap_or(f64::NAN).to_bits().hash(hasher);
        }
        Value::String(s) => {
            3u8.hash(hasher);
            s.hash(hasher);
        }
        Value::Array(items) => {
            4u8.hash(hasher);
            items.len().hash(hasher);
            for item in items {
                hash_value(item, hasher);
            }
        }
        Value::Object(map) => {
            5u8.hash(hasher);
            map.len().hash(hasher);
            for (k, v) in map {
                k.hash(hasher);
                hash_value(v, hasher);
            }
        }
    }
}

/// Per-[`SchemaProcessor::process`]-call working state. Builds one
/// [`SchemaArena`] for the whole reachable schema, including any subtree
/// crossed via an acyclic `$ref`.
struct Builder<'a> {
    document: &'a Value,
    cyclic_refs: &'a HashSet<String>,
    arena: SchemaArena,
    /// document-pointer-string -> already-built SchemaId, so a `$defs` entry
    /// referenced from multiple sites is only built once.
    memo: HashMap<String, SchemaId>,
    by_sub_pointer: HashMap<Pointer, SchemaId>,
    ref_schema_ids: HashMap<String, SchemaId>,
    ref_target_pointers: HashMap<String, Pointer>,
    dynamic_anchors: HashMap<String, SchemaId>,
    encountered_refs: HashSet<String>,
    diagnostics: Vec<Diagnostic>,
    max_depth_seen: u32,
    max_depth_cap: u32,
    cancellation: CancellationToken,
}

impl<'a> Builder<'a> {
    /// Build (or reuse, for ref targets) the arena node at `abs_ptr`. When
    /// `rel_ptr` is `Some`, this node is part of the inline subtree reached
    /// directly from the processed root and gets a [`ProcessedSchema::by_sub_pointer`]
    /// entry; `rel_ptr` is threaded as `None` once a `$ref` has been crossed,
    /// since a ref target is indexed separately, as its own root.
    fn resolve_node(
        &mut self,
        value: &Value,
        abs_ptr: &Pointer,
        rel_ptr: Option<&Pointer>,
        depth: u32,
    ) -> Result<SchemaId> {
        if self.cancellation.is_cancelled() {
            return Err(CoreError::cancelled("schema processing cancelled"));
        }
        self.max_depth_seen = self.max_depth_seen.max(depth.min(self.max_depth_cap));

        if depth > self.max_depth_cap {
            self.diagnostics.push(Diagnostic::new(
                DiagnosticCode::DEPTH_LIMIT_REACHED,
                Severity::Warning,
                abs_ptr.clone(),
                format!("schema nesting reached the sanity cap of {}; further descent stopped", self.max_depth_cap),
            ));
            return Ok(self.alloc_leaf(Schema::allow_any(), rel_ptr));
        }

        match value {
            Value::Bool(true) | Value::Null => Ok(self.alloc_leaf(Schema::allow_any(), rel_ptr)),
            Value::Bool(false) => Ok(self.alloc_leaf(Schema::DenyAll, rel_ptr)),
            Value::Object(map) if map.is_empty() => Ok(self.alloc_leaf(Schema::allow_any(), rel_ptr)),
            Value::Object(map) => self.resolve_object(map, abs_ptr, rel_ptr, depth),
            _ => {
                self.diagnostics.push(Diagnostic::new(
                    DiagnosticCode::CONFLICTING_KEYWORDS,
                    Severity::Error,
                    abs_ptr.clone(),
                    "schema node must be an object or boolean",
                ));
                Ok(self.alloc_leaf(Schema::allow_any(), rel_ptr))
            }
        }
    }

    fn alloc_leaf(&mut self, schema: Schema, rel_ptr: Option<&Pointer>) -> SchemaId {
        let id = self.arena.alloc(schema);
        if let Some(rp) = rel_ptr {
            self.by_sub_pointer.insert(rp.clone(), id);
        }
        id
    }

    fn resolve_object(
        &mut self,
        map: &serde_json::Map<String, Value>,
        abs_ptr: &Pointer,
        rel_ptr: Option<&Pointer>,
        depth: u32,
    ) -> Result<SchemaId> {
        if let Some(Value::String(r)) = map.get("$ref") {
            let r = r.clone();
            self.encountered_refs.insert(r.clone());

            if reference::validate_pointer_syntax(&r).is_err() {
                self.diagnostics.push(Diagnostic::new(
                    DiagnosticCode::REF_NOT_FOUND,
                    Severity::Error,
                    abs_ptr.clone(),
                    format!("unsupported or malformed reference: '{r}'"),
                ));
                return Ok(self.alloc_leaf(Schema::allow_any(), rel_ptr));
            }

            if self.cyclic_refs.contains(&r) {
                return Ok(self.alloc_leaf(Schema::cycle_placeholder(r), rel_ptr));
            }

            let target_ptr = match reference::resolve_fragment_pointer(self.document, &r) {
                Ok(p) => p,
                Err(_) => {
                    self.diagnostics.push(Diagnostic::new(
                        DiagnosticCode::REF_NOT_FOUND,
                        Severity::Error,
                        abs_ptr.clone(),
                        format!("reference target not found: '{r}'"),
                    ));
                    return Ok(self.alloc_leaf(Schema::allow_any(), rel_ptr));
                }
            };
            self.ref_target_pointers.insert(r.clone(), target_ptr.clone());

            let memo_key = target_ptr.to_string();
            let target_id = if let Some(&id) = self.memo.get(&memo_key) {
                id
            } else {
                let target_value = match target_ptr.resolve(self.document) {
                    Ok(v) => v,
                    Err(_) => {
                        self.diagnostics.push(Diagnostic::new(
                            DiagnosticCode::REF_NOT_FOUND,
                            Severity::Error,
                            abs_ptr.clone(),
                            format!("reference target not found: '{r}'"),
                        ));
                        return Ok(self.alloc_leaf(Schema::allow_any(), rel_ptr));
                    }
                };
                let id = self.resolve_node(target_value, &target_ptr, None, depth + 1)?;
                self.memo.insert(memo_key, id);
                id
            };
            self.ref_schema_ids.insert(r.clone(), target_id);

            // 2020-12 treats `$ref` as an ordinary applicator: sibling
            // keywords at the same site still apply.
            let mut obj = self.parse_object(map, abs_ptr, rel_ptr, depth)?;
            obj.ref_ = Some(r);
            let anchor = obj.dynamic_anchor.clone();
            let id = self.alloc_leaf(Schema::Object(Box::new(obj)), rel_ptr);
            self.register_dynamic_anchor(anchor, id);
            return Ok(id);
        }

        let obj = self.parse_object(map, abs_ptr, rel_ptr, depth)?;
        let anchor = obj.dynamic_anchor.clone();
        let id = self.alloc_leaf(Schema::Object(Box::new(obj)), rel_ptr);
        self.register_dynamic_anchor(anchor, id);
        Ok(id)
    }

    /// Record the first schema node seen for a given `$dynamicAnchor` name.
    /// Later occurrences of the same name do not overwrite it: this mirrors
    /// `$defs` entries, where the first resolved binding is authoritative.
    fn register_dynamic_anchor(&mut self, anchor: Option<String>, id: SchemaId) {
        if let Some(name) = anchor {
            self.dynamic_anchors.entry(name).or_insert(id);
        }
    }

    fn parse_object(
        &mut self,
        map: &serde_json::Map<String, Value>,
        abs_ptr: &Pointer,
        rel_ptr: Option<&Pointer>,
        depth: u32,
    ) -> Result<SchemaObject> {
        let mut obj = SchemaObject::default();

        if let Some(t) = map.get("type") {
            obj.schema_type = parse_type(t, abs_ptr, &mut self.diagnostics);
        }
        if let Some(Value::Array(vals)) = map.get("enum") {
            if vals.is_empty() {
                self.diagnostics.push(Diagnostic::new(
                    DiagnosticCode::EMPTY_ENUM,
                    Severity::Warning,
                    abs_ptr.clone(),
                    "enum is empty; no instance can satisfy this schema",
                ));
            }
            obj.enum_values = Some(vals.clone());
        }
        if let Some(c) = map.get("const") {
            obj.const_value = Some(c.clone());
        }

        obj.minimum = map.get("minimum").and_then(Value::as_f64);
        obj.maximum = map.get("maximum").and_then(Value::as_f64);
        obj.exclusive_minimum = self.parse_exclusive_bound(map, "exclusiveMinimum", abs_ptr);
        obj.exclusive_maximum = self.parse_exclusive_bound(map, "exclusiveMaximum", abs_ptr);
        obj.multiple_of = map.get("multipleOf").and_then(Value::as_f64);

        if let (Some(min), Some(max)) = (obj.minimum, obj.maximum) {
            if min > max {
                self.push_unsatisfiable(abs_ptr, "minimum is greater than maximum");
            }
        }
        if let (Some(min), Some(max)) = (obj.exclusive_minimum, obj.exclusive_maximum) {
            if min >= max {
                self.push_unsatisfiable(abs_ptr, "exclusiveMinimum is not less than exclusiveMaximum");
            }
        }

        obj.min_length = map.get("minLength").and_then(Value::as_u64);
        obj.max_length = map.get("maxLength").and_then(Value::as_u64);
        obj.pattern = map.get("pattern").and_then(Value::as_str).map(String::from);
        if let (Some(pattern), Some(max_len)) = (&obj.pattern, obj.max_length) {
            if let Some(min_required) = fixed_pattern_min_length(pattern) {
                if min_required as u64 > max_len {
                    self.push_unsatisfiable(
                        abs_ptr,
                        format!(
                            "pattern '{pattern}' requires at least {min_required} characters but maxLength is {max_len}"
                        ),
                    );
                }
            }
        }
        obj.format = map.get("format").and_then(Value::as_str).map(String::from);

        if let Some(items) = map.get("items") {
            let (ca, cr) = child(abs_ptr, rel_ptr, "items");
            obj.items = Some(self.resolve_node(items, &ca, cr.as_ref(), depth + 1)?);
        }
        if let Some(Value::Array(prefix)) = map.get("prefixItems") {
            let mut ids = Vec::with_capacity(prefix.len());
            for (i, item) in prefix.iter().enumerate() {
                let (ca, cr) = indexed_child(abs_ptr, rel_ptr, "prefixItems", i);
                ids.push(self.resolve_node(item, &ca, cr.as_ref(), depth + 1)?);
            }
            obj.prefix_items = Some(ids);
        }
        obj.min_items = map.get("minItems").and_then(Value::as_u64);
        obj.max_items = map.get("maxItems").and_then(Value::as_u64);
        obj.unique_items = map.get("uniqueItems").and_then(Value::as_bool).unwrap_or(false);
        if let Some(contains) = map.get("contains") {
            let (ca, cr) = child(abs_ptr, rel_ptr, "contains");
            obj.contains = Some(self.resolve_node(contains, &ca, cr.as_ref(), depth + 1)?);
        }
        obj.min_contains = map.get("minContains").and_then(Value::as_u64);
        obj.max_contains = map.get("maxContains").and_then(Value::as_u64);

        if let Some(Value::Object(props)) = map.get("properties") {
            let mut pairs = Vec::with_capacity(props.len());
            for (name, v) in props {
                let (ca, cr) = named_child(abs_ptr, rel_ptr, "properties", name);
                pairs.push((name.clone(), self.resolve_node(v, &ca, cr.as_ref(), depth + 1)?));
            }
            obj.properties = Some(pairs);
        }
        if let Some(Value::Object(props)) = map.get("patternProperties") {
            let mut pairs = Vec::with_capacity(props.len());
            for (pattern, v) in props {
                let (ca, cr) = named_child(abs_ptr, rel_ptr, "patternProperties", pattern);
                pairs.push((pattern.clone(), self.resolve_node(v, &ca, cr.as_ref(), depth + 1)?));
            }
            obj.pattern_properties = Some(pairs);
        }
        if let Some(pn) = map.get("propertyNames") {
            let (ca, cr) = child(abs_ptr, rel_ptr, "propertyNames");
            obj.property_names = Some(self.resolve_node(pn, &ca, cr.as_ref(), depth + 1)?);
        }
        if let Some(Value::Array(req)) = map.get("required") {
            obj.required = Some(req.iter().filter_map(Value::as_str).map(String::from).collect());
        }
        obj.additional_properties =
            self.parse_bool_or_schema(map.get("additionalProperties"), abs_ptr, rel_ptr, "additionalProperties", depth)?;
        obj.unevaluated_properties =
            self.parse_bool_or_schema(map.get("unevaluatedProperties"), abs_ptr, rel_ptr, "unevaluatedProperties", depth)?;
        obj.unevaluated_items =
            self.parse_bool_or_schema(map.get("unevaluatedItems"), abs_ptr, rel_ptr, "unevaluatedItems", depth)?;
        obj.min_properties = map.get("minProperties").and_then(Value::as_u64);
        obj.max_properties = map.get("maxProperties").and_then(Value::as_u64);

        obj.all_of = self.parse_schema_array(map.get("allOf"), abs_ptr, rel_ptr, "allOf", depth)?;
        obj.any_of = self.parse_schema_array(map.get("anyOf"), abs_ptr, rel_ptr, "anyOf", depth)?;
        obj.one_of = self.parse_schema_array(map.get("oneOf"), abs_ptr, rel_ptr, "oneOf", depth)?;
        if let Some(not_v) = map.get("not") {
            let (ca, cr) = child(abs_ptr, rel_ptr, "not");
            obj.not = Some(self.resolve_node(not_v, &ca, cr.as_ref(), depth + 1)?);
        }

        if let Some(if_v) = map.get("if") {
            let (ca, cr) = child(abs_ptr, rel_ptr, "if");
            obj.if_ = Some(self.resolve_node(if_v, &ca, cr.as_ref(), depth + 1)?);
        }
        if let Some(then_v) = map.get("then") {
            let (ca, cr) = child(abs_ptr, rel_ptr, "then");
            obj.then = Some(self.resolve_node(then_v, &ca, cr.as_ref(), depth + 1)?);
        }
        if let Some(else_v) = map.get("else") {
            let (ca, cr) = child(abs_ptr, rel_ptr, "else");
            obj.else_ = Some(self.resolve_node(else_v, &ca, cr.as_ref(), depth + 1)?);
        }
        if let Some(Value::Object(deps)) = map.get("dependentSchemas") {
            let mut pairs = Vec::with_capacity(deps.len());
            for (name, v) in deps {
                let (ca, cr) = named_child(abs_ptr, rel_ptr, "dependentSchemas", name);
                pairs.push((name.clone(), self.resolve_node(v, &ca, cr.as_ref(), depth + 1)?));
            }
            obj.dependent_schemas = Some(pairs);
        }

        obj.dynamic_ref = map.get("$dynamicRef").and_then(Value::as_str).map(String::from);
        obj.dynamic_anchor = map.get("$dynamicAnchor").and_then(Value::as_str).map(String::from);

        obj.title = map.get("title").and_then(Value::as_str).map(String::from);
        obj.description = map.get("description").and_then(Value::as_str).map(String::from);
        obj.default = map.get("default").cloned();
        obj.examples = map.get("examples").and_then(Value::as_array).cloned();
        obj.example = map.get("example").cloned();
        obj.nullable = map.get("nullable").and_then(Value::as_bool).unwrap_or(false);
        obj.read_only = map.get("readOnly").and_then(Value::as_bool).unwrap_or(false);
        obj.write_only = map.get("writeOnly").and_then(Value::as_bool).unwrap_or(false);
        obj.deprecated = map.get("deprecated").and_then(Value::as_bool).unwrap_or(false);
        obj.discriminator = map.get("discriminator").cloned();
        obj.xml = map.get("xml").cloned();

        for key in map.keys() {
            if !KNOWN_KEYWORDS.contains(&key.as_str()) {
                obj.unknown_keywords.push(key.clone());
                self.diagnostics.push(Diagnostic::new(
                    DiagnosticCode::UNKNOWN_KEYWORD,
                    Severity::Info,
                    abs_ptr.clone(),
                    format!("unknown keyword '{key}'"),
                ));
            }
        }

        check_conflicting_keywords(&obj, map, abs_ptr, &mut self.diagnostics);

        Ok(obj)
    }

    fn parse_bool_or_schema(
        &mut self,
        value: Option<&Value>,
        abs_ptr: &Pointer,
        rel_ptr: Option<&Pointer>,
        key: &str,
        depth: u32,
    ) -> Result<Option<BoolOrSchema>> {
        match value {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(BoolOrSchema::Bool(*b))),
            Some(v) => {
                let (ca, cr) = child(abs_ptr, rel_ptr, key);
                let id = self.resolve_node(v, &ca, cr.as_ref(), depth + 1)?;
                Ok(Some(BoolOrSchema::Schema(id)))
            }
        }
    }

    fn parse_schema_array(
        &mut self,
        value: Option<&Value>,
        abs_ptr: &Pointer,
        rel_ptr: Option<&Pointer>,
        key: &str,
        depth: u32,
    ) -> Result<Option<Vec<SchemaId>>> {
        match value {
            Some(Value::Array(items)) => {
                let mut ids = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let (ca, cr) = indexed_child(abs_ptr, rel_ptr, key, i);
                    ids.push(self.resolve_node(item, &ca, cr.as_ref(), depth + 1)?);
                }
                Ok(Some(ids))
            }
            _ => Ok(None),
        }
    }

    fn parse_exclusive_bound(
        &mut self,
        map: &serde_json::Map<String, Value>,
        key: &str,
        abs_ptr: &Pointer,
    ) -> Option<f64> {
        match map.get(key) {
            None => None,
            Some(Value::Number(n)) => n.as_f64(),
            Some(_) => {
                self.diagnostics.push(Diagnostic::new(
                    DiagnosticCode::INVALID_EXCLUSIVE_BOUND,
                    Severity::Error,
                    abs_ptr.clone(),
                    format!("'{key}' must be a number (draft 2020-12 semantics)"),
                ));
                None
            }
        }
    }

    fn push_unsatisfiable(&mut self, abs_ptr: &Pointer, message: impl Into<String>) {
        self.diagnostics.push(
            Diagnostic::new(DiagnosticCode::UNSATISFIABLE_CONSTRAINT, Severity::Warning, abs_ptr.clone(), message)
                .with_attribution(Attribution::Spec),
        );
    }
}

fn child(abs_ptr: &Pointer, rel_ptr: Option<&Pointer>, key: &str) -> (Pointer, Option<Pointer>) {
    (abs_ptr.push(key), rel_ptr.map(|r| r.push(key)))
}

fn indexed_child(abs_ptr: &Pointer, rel_ptr: Option<&Pointer>, key: &str, index: usize) -> (Pointer, Option<Pointer>) {
    let seg = index.to_string();
    (abs_ptr.push(key).push(seg.clone()), rel_ptr.map(|r| r.push(key).push(seg)))
}

fn named_child(abs_ptr: &Pointer, rel_ptr: Option<&Pointer>, key: &str, name: &str) -> (Pointer, Option<Pointer>) {
    (abs_ptr.push(key).push(name), rel_ptr.map(|r| r.push(key).push(name)))
}

fn parse_type(value: &Value, abs_ptr: &Pointer, diagnostics: &mut Vec<Diagnostic>) -> Option<Vec<InstanceType>> {
    match value {
        Value::String(s) => match InstanceType::from_str(s) {
            Some(t) => Some(vec![t]),
            None => {
                diagnostics.push(Diagnostic::new(
                    DiagnosticCode::UNKNOWN_KEYWORD,
                    Severity::Warning,
                    abs_ptr.clone(),
                    format!("unrecognized type '{s}'"),
                ));
                None
            }
        },
        Value::Array(arr) => {
            let mut out = Vec::new();
            for v in arr {
                if let Value::String(s) = v {
                    match InstanceType::from_str(s) {
                        Some(t) => out.push(t),
                        None => diagnostics.push(Diagnostic::new(
                            DiagnosticCode::UNKNOWN_KEYWORD,
                            Severity::Warning,
                            abs_ptr.clone(),
                            format!("unrecognized type '{s}'"),
                        )),
                    }
                }
            }
            Some(out)
        }
        _ => None,
    }
}

fn check_conflicting_keywords(
    obj: &SchemaObject,
    map: &serde_json::Map<String, Value>,
    abs_ptr: &Pointer,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Some(types) = &obj.schema_type else { return };
    let allows = |t: InstanceType| types.contains(&t);

    let mut flag = |keywords: &[&str], allowed: bool, label: &str| {
        if allowed {
            return;
        }
        for k in keywords {
            if map.contains_key(*k) {
                diagnostics.push(Diagnostic::new(
                    DiagnosticCode::CONFLICTING_KEYWORDS,
                    Severity::Warning,
                    abs_ptr.clone(),
                    format!("'{k}' is meaningless when type excludes {label}"),
                ));
            }
        }
    };

    flag(&["minLength", "maxLength", "pattern"], allows(InstanceType::String), "string");
    flag(
        &["minimum", "maximum", "exclusiveMinimum", "exclusiveMaximum", "multipleOf"],
        allows(InstanceType::Number) || allows(InstanceType::Integer),
        "number/integer",
    );
    flag(&["items", "prefixItems", "minItems", "maxItems", "uniqueItems", "contains"], allows(InstanceType::Array), "array");
    flag(
        &["properties", "patternProperties", "required", "minProperties", "maxProperties"],
        allows(InstanceType::Object),
        "object",
    );
}

/// Extract a minimum required length from simple anchored, fixed-repetition
/// patterns like `^[A-Z]{3}$` or `^\d{4,}$`. Returns `None` for anything more
/// general — this is a best-effort heuristic used only to flag obviously
/// unsatisfiable `maxLength`/`pattern` combinations, not a general regex
/// length solver.
fn fixed_pattern_min_length(pattern: &str) -> Option<usize> {
    if !pattern.starts_with('^') || !pattern.ends_with('$') || pattern.len() < 2 {
        return None;
    }
    let body = &pattern[1..pattern.len() - 1];
    if !body.ends_with('}') {
        return None;
    }
    let brace_start = body.rfind('{')?;
    let quantifier = &body[brace_start + 1..body.len() - 1];
    let n_str = quantifier.split(',').next()?;
    let n: usize = n_str.trim().parse().ok()?;

    let head = &body[..brace_start];
    let is_single_unit = (head.starts_with('[') && head.ends_with(']'))
        || (head.starts_with('(') && head.ends_with(')'))
        || head.chars().count() == 1
        || (head.starts_with('\\') && head.len() == 2);
    if is_single_unit {
        Some(n)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn processor() -> SchemaProcessor {
        SchemaProcessor::new(10_000, 1024)
    }

    #[test]
    fn processes_a_simple_object_schema() {
        let doc = json!({
            "type": "object",
            "properties": {"name": {"type": "string"}},
            "required": ["name"]
        });
        let processed = processor().process(&doc, &Pointer::root(), &ProcessOptions::default()).unwrap();
        let root = processed.root_schema().as_object().unwrap();
        assert_eq!(root.schema_type, Some(vec![InstanceType::Object]));
        assert_eq!(root.required, Some(vec!["name".to_string()]));
        assert!(processed.by_sub_pointer.contains_key(&Pointer::parse("/properties/name").unwrap()));
    }

    #[test]
    fn cyclic_ref_site_becomes_a_placeholder() {
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
        let processed = processor().process(&doc, &Pointer::root(), &ProcessOptions::default()).unwrap();
        assert!(processed.refs.cyclic.contains("#/$defs/Tree"));

        let root_obj = processed.root_schema().as_object().unwrap();
        let tree_id = root_obj.ref_.as_ref().and_then(|r| processed.resolve_ref_target(r)).unwrap();
        let tree = processed.get(tree_id).as_object().unwrap();
        let children_id = tree.properties.as_ref().unwrap().iter().find(|(n, _)| n == "children").unwrap().1;
        let children = processed.get(children_id).as_object().unwrap();
        let items_schema = processed.get(children.items.unwrap());
        assert!(items_schema.is_cycle_placeholder());
    }

    #[test]
    fn acyclic_ref_is_resolved_and_not_marked_cyclic() {
        let doc = json!({
            "$defs": {"A": {"type": "string"}, "B": {"$ref": "#/$defs/A"}},
            "$ref": "#/$defs/B"
        });
        let processed = processor().process(&doc, &Pointer::root(), &ProcessOptions::default()).unwrap();
        assert!(processed.refs.cyclic.is_empty());
        assert!(processed.refs.resolved.contains_key("#/$defs/B"));
        let target_id = processed.resolve_ref_target("#/$defs/B").unwrap();
        let target = processed.get(target_id).as_object().unwrap();
        assert_eq!(target.schema_type, Some(vec![InstanceType::String]));
    }

    #[test]
    fn unknown_keyword_emits_info_diagnostic() {
        let doc = json!({"type": "string", "totallyMadeUp": 1});
        let processed = processor().process(&doc, &Pointer::root(), &ProcessOptions::default()).unwrap();
        assert!(processed
            .diagnostics
            .iter()
            .any(|d| d.code == DiagnosticCode::UNKNOWN_KEYWORD && d.severity == Severity::Info));
    }

    #[test]
    fn conflicting_keywords_emit_warning() {
        let doc = json!({"type": "string", "maxItems": 3});
        let processed = processor().process(&doc, &Pointer::root(), &ProcessOptions::default()).unwrap();
        assert!(processed.diagnostics.iter().any(|d| d.code == DiagnosticCode::CONFLICTING_KEYWORDS));
    }

    #[test]
    fn unsatisfiable_pattern_vs_max_length_is_flagged() {
        let doc = json!({"type": "string", "maxLength": 2, "pattern": "^[A-Z]{3}$"});
        let processed = processor().process(&doc, &Pointer::root(), &ProcessOptions::default()).unwrap();
        assert!(processed
            .diagnostics
            .iter()
            .any(|d| d.code == DiagnosticCode::UNSATISFIABLE_CONSTRAINT && d.attribution == Attribution::Spec));
    }

    #[test]
    fn invalid_exclusive_bound_type_is_flagged() {
        let doc = json!({"type": "integer", "exclusiveMinimum": "five"});
        let processed = processor().process(&doc, &Pointer::root(), &ProcessOptions::default()).unwrap();
        assert!(processed.diagnostics.iter().any(|d| d.code == DiagnosticCode::INVALID_EXCLUSIVE_BOUND));
    }

    #[test]
    fn same_root_pointer_is_served_from_cache() {
        let doc = json!({"type": "string"});
        let p = processor();
        let first = p.process(&doc, &Pointer::root(), &ProcessOptions::default()).unwrap();
        let second = p.process(&doc, &Pointer::root(), &ProcessOptions::default()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn distinct_documents_sharing_a_root_pointer_do_not_alias_in_the_cache() {
        let p = processor();
        let doc_a = json!({"type": "string"});
        let doc_b = json!({"type": "number"});

        let a = p.process(&doc_a, &Pointer::root(), &ProcessOptions::default()).unwrap();
        let b = p.process(&doc_b, &Pointer::root(), &ProcessOptions::default()).unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a.root, b.root);
        assert_eq!(a.root_schema().as_object().unwrap().schema_type, Some(vec![InstanceType::String]));
        assert_eq!(b.root_schema().as_object().unwrap().schema_type, Some(vec![InstanceType::Number]));

        let a_again = p.process(&doc_a, &Pointer::root(), &ProcessOptions::default()).unwrap();
        assert!(Arc::ptr_eq(&a, &a_again));
    }

    #[test]
    fn cache_evicts_when_over_capacity() {
        let p = SchemaProcessor::new(1, 1024);
        let doc_a = json!({"type": "string"});
        let doc_b = json!({"type": "number"});
        p.process(&doc_a, &Pointer::root(), &ProcessOptions::default()).unwrap();
        assert_eq!(p.cache_len(), 1);
        p.process(&doc_b, &Pointer::root(), &ProcessOptions::default()).unwrap();
        assert_eq!(p.cache_len(), 1);
    }

    #[test]
    fn empty_enum_emits_warning() {
        let doc = json!({"enum": []});
        let processed = processor().process(&doc, &Pointer::root(), &ProcessOptions::default()).unwrap();
        assert!(processed.diagnostics.iter().any(|d| d.code == DiagnosticCode::EMPTY_ENUM));
    }

    #[test]
    fn depth_cap_stops_descent_without_erroring() {
        let mut node = json!({"type": "string"});
        for _ in 0..40 {
            node = json!({"allOf": [node]});
        }
        let processed = SchemaProcessor::new(10_000, 16).process(&node, &Pointer::root(), &ProcessOptions::default()).unwrap();
        assert!(processed.diagnostics.iter().any(|d| d.code == DiagnosticCode::DEPTH_LIMIT_REACHED));
        assert!(processed.max_depth <= 16);
    }
}
