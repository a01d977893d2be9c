//! The validation and normalization engine.
//!
//! A [`Validator`] carries configuration (unknown-field policy, purge
//! flags, registries, handlers) and per-invocation state (the working
//! document, the error stash, path prefixes). Recursion spawns child
//! validators that inherit configuration and extend the paths; children
//! flush their errors back into the parent through the emission interface.
//!
//! One validator must not be shared across threads during an invocation;
//! independent validators on independent documents are safe.

mod logical;
mod normalize;
mod rules;

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

use crate::errors::{
    codes, BasicErrorHandler, DocumentError, ErrorDefinition, ErrorHandler, ErrorList, ErrorTree,
    SchemaError, ValidationError,
};
use crate::handlers::HandlerRegistry;
use crate::schema::{
    self, parse_rules_set, parse_schema, Constraint, Registries, RuleSpec, RulesRef, RulesSet,
    Schema,
};
use crate::types::{TypeDefinition, TypeRegistry};
use crate::value::{Map, Value};

/// The unknown-field policy of a mapping level.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AllowUnknown {
    /// Unknown fields are errors.
    #[default]
    No,
    /// Unknown fields pass unexamined.
    Yes,
    /// Unknown fields are validated against this rule set.
    Rules(RulesRef),
}

impl AllowUnknown {
    pub(crate) fn is_truthy(&self) -> bool {
        !matches!(self, AllowUnknown::No)
    }

    pub(crate) fn as_rules(&self) -> Option<&RulesRef> {
        match self {
            AllowUnknown::Rules(rules) => Some(rules),
            _ => None,
        }
    }
}

/// A custom rule's execution handler: receives the constraint, the field
/// name, the value and an error sink for `(field, message)` pairs.
pub type RuleFn =
    Arc<dyn Fn(&Constraint, &Value, &Value, &mut dyn FnMut(Value, String)) + Send + Sync>;

/// A user-registered rule: its table entry plus its execution handler.
#[derive(Clone)]
pub struct CustomRule {
    /// Phase and constraint shape, merged into the schema-of-schemas.
    pub spec: RuleSpec,
    /// The execution handler.
    pub handler: RuleFn,
}

/// A failure that prevents an invocation from running at all.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProcessingError {
    /// The schema is missing or not meta-valid.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// The document is missing or not a mapping.
    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// The schema-driven validator and normalizer.
pub struct Validator {
    // configuration
    pub(crate) allow_unknown: AllowUnknown,
    pub(crate) require_all: bool,
    pub(crate) purge_unknown: bool,
    pub(crate) purge_readonly: bool,
    pub(crate) ignore_none_values: bool,
    pub(crate) error_handler: Arc<dyn ErrorHandler>,
    pub(crate) registries: Registries,
    pub(crate) types: Arc<TypeRegistry>,
    pub(crate) handlers: Arc<HandlerRegistry>,
    pub(crate) custom_rules: Arc<IndexMap<String, CustomRule>>,

    // per-invocation state
    pub(crate) schema: Option<Schema>,
    pub(crate) document: Option<Value>,
    pub(crate) errors: ErrorList,
    pub(crate) document_tree: ErrorTree,
    pub(crate) schema_tree: ErrorTree,
    pub(crate) document_path: Vec<Value>,
    pub(crate) schema_path: Vec<Value>,
    pub(crate) update: bool,
    pub(crate) is_child: bool,
    pub(crate) is_normalized: bool,
    pub(crate) root_document: Option<Arc<Value>>,
    pub(crate) unrequired_by_excludes: IndexSet<Value>,
    pub(crate) remaining_rules: Vec<String>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    /// A validator with default configuration and fresh registries.
    pub fn new() -> Self {
        Self {
            allow_unknown: AllowUnknown::No,
            require_all: false,
            purge_unknown: false,
            purge_readonly: false,
            ignore_none_values: false,
            error_handler: Arc::new(BasicErrorHandler),
            registries: Registries::new(),
            types: Arc::new(TypeRegistry::builtin()),
            handlers: Arc::new(HandlerRegistry::default()),
            custom_rules: Arc::new(IndexMap::new()),
            schema: None,
            document: None,
            errors: ErrorList::new(),
            document_tree: ErrorTree::for_document(),
            schema_tree: ErrorTree::for_schema(),
            document_path: Vec::new(),
            schema_path: Vec::new(),
            update: false,
            is_child: false,
            is_normalized: false,
            root_document: None,
            unrequired_by_excludes: IndexSet::new(),
            remaining_rules: Vec::new(),
        }
    }

    /// A validator bound to a schema given as a value tree.
    pub fn with_schema(schema: &Value) -> Result<Self, SchemaError> {
        let mut validator = Self::new();
        validator.set_schema(schema)?;
        Ok(validator)
    }

    // Configuration

    /// Parses and stores the schema. Meta-validation happens lazily on the
    /// next invocation (results are cached by fingerprint).
    pub fn set_schema(&mut self, schema: &Value) -> Result<(), SchemaError> {
        self.schema = Some(parse_schema(schema)?);
        Ok(())
    }

    /// Stores an already-built schema AST.
    pub fn set_schema_ast(&mut self, schema: Schema) {
        self.schema = Some(schema);
    }

    /// Sets the boolean unknown-field policy.
    pub fn set_allow_unknown(&mut self, allow: bool) {
        self.allow_unknown = if allow { AllowUnknown::Yes } else { AllowUnknown::No };
    }

    /// Sets a rule set unknown fields are validated against.
    pub fn set_allow_unknown_rules(&mut self, rules: &Value) -> Result<(), SchemaError> {
        let rules = parse_rules_set(rules, "<allow_unknown>")?;
        schema::validate_rules_set(&rules, &self.registries, &self.types, &self.extra_specs())?;
        self.allow_unknown = AllowUnknown::Rules(RulesRef::Inline(rules));
        Ok(())
    }

    /// Requires every declared field, as if each rule set carried
    /// `required: true`.
    pub fn set_require_all(&mut self, require_all: bool) {
        self.require_all = require_all;
    }

    /// Removes unknown fields during normalization.
    pub fn set_purge_unknown(&mut self, purge: bool) {
        self.purge_unknown = purge;
    }

    /// Removes readonly fields during normalization.
    pub fn set_purge_readonly(&mut self, purge: bool) {
        self.purge_readonly = purge;
    }

    /// Treats Null values as absent for `required` and skips the
    /// not-nullable report for them.
    pub fn set_ignore_none_values(&mut self, ignore: bool) {
        self.ignore_none_values = ignore;
    }

    /// Replaces the error handler used by [`Validator::errors`].
    pub fn set_error_handler(&mut self, handler: Arc<dyn ErrorHandler>) {
        self.error_handler = handler;
    }

    /// Wires this validator to a shared registry pair.
    pub fn set_registries(&mut self, registries: Registries) {
        self.registries = registries;
    }

    /// The registry pair this validator resolves references against.
    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    /// Registers a user-defined type.
    pub fn register_type(&mut self, definition: TypeDefinition) {
        Arc::make_mut(&mut self.types).register(definition);
    }

    /// Registers a named coercer.
    pub fn register_coercer(&mut self, name: &str, f: crate::handlers::CoerceFn) {
        Arc::make_mut(&mut self.handlers).add_coercer(name, f);
    }

    /// Registers a named `check_with` handler.
    pub fn register_checker(&mut self, name: &str, f: crate::handlers::CheckFn) {
        Arc::make_mut(&mut self.handlers).add_checker(name, f);
    }

    /// Registers a named default setter.
    pub fn register_setter(&mut self, name: &str, f: crate::handlers::SetterFn) {
        Arc::make_mut(&mut self.handlers).add_setter(name, f);
    }

    /// Registers a custom rule: its table entry joins the
    /// schema-of-schemas, its handler runs in the declared phase.
    pub fn register_rule(&mut self, name: &str, rule: CustomRule) {
        Arc::make_mut(&mut self.custom_rules).insert(name.to_string(), rule);
    }

    pub(crate) fn extra_specs(&self) -> IndexMap<String, RuleSpec> {
        self.custom_rules
            .iter()
            .map(|(name, rule)| (name.clone(), rule.spec))
            .collect()
    }

    // Driver operations

    /// Normalizes and validates a document against the stored schema.
    /// Returns whether the document is valid; the collected errors stay
    /// available through the accessors.
    pub fn validate(&mut self, document: &Value) -> Result<bool, ProcessingError> {
        self.run(document, false, true)
    }

    /// Like [`Validator::validate`] with a one-off schema.
    pub fn validate_with(
        &mut self,
        document: &Value,
        schema: &Value,
    ) -> Result<bool, ProcessingError> {
        self.set_schema(schema)?;
        self.run(document, false, true)
    }

    /// Validates in update mode: missing `required` fields don't count as
    /// errors.
    pub fn validate_update(&mut self, document: &Value) -> Result<bool, ProcessingError> {
        self.run(document, true, true)
    }

    /// Validates and returns the normalized document on success, `None`
    /// otherwise.
    pub fn validated(&mut self, document: &Value) -> Result<Option<Value>, ProcessingError> {
        let valid = self.validate(document)?;
        Ok(if valid { self.document.clone() } else { None })
    }

    /// Normalizes only. Returns the normalized document, or `None` when
    /// normalization recorded errors.
    pub fn normalized(&mut self, document: &Value) -> Result<Option<Value>, ProcessingError> {
        self.run_normalize_only(document)?;
        Ok(if self.errors.is_empty() { self.document.clone() } else { None })
    }

    /// Normalizes only, returning the working document even when errors
    /// were recorded.
    pub fn normalized_always(&mut self, document: &Value) -> Result<Value, ProcessingError> {
        self.run_normalize_only(document)?;
        Ok(self.document.clone().expect("working document exists"))
    }

    // Accessors

    /// The errors of the last invocation, rendered by the error handler.
    pub fn errors(&self) -> Value {
        self.error_handler.format(&self.errors)
    }

    /// The flat error list of the last invocation.
    pub fn error_list(&self) -> &ErrorList {
        &self.errors
    }

    /// The working document of the last invocation.
    pub fn document(&self) -> Option<&Value> {
        self.document.as_ref()
    }

    /// Errors indexed by document path.
    pub fn document_error_tree(&self) -> &ErrorTree {
        &self.document_tree
    }

    /// Errors indexed by schema path.
    pub fn schema_error_tree(&self) -> &ErrorTree {
        &self.schema_tree
    }

    // Invocation plumbing

    fn run(
        &mut self,
        document: &Value,
        update: bool,
        normalize: bool,
    ) -> Result<bool, ProcessingError> {
        let working = self.init_processing(document)?;
        self.update = update;
        self.document = Some(Value::Map(working.clone()));

        let working = if normalize {
            let schema = self.schema.clone().expect("schema initialized");
            let normalized = self.normalize_mapping(working, &schema);
            self.is_normalized = true;
            normalized
        } else {
            working
        };

        self.document = Some(Value::Map(working));
        self.root_document = Some(Arc::new(self.document.clone().unwrap()));

        self.validate_level();
        if !self.update {
            self.validate_required_fields();
        }

        self.errors.sort();
        self.rebuild_trees();
        Ok(self.errors.is_empty())
    }

    fn run_normalize_only(&mut self, document: &Value) -> Result<(), ProcessingError> {
        let working = self.init_processing(document)?;
        self.document = Some(Value::Map(working.clone()));
        let schema = self.schema.clone().expect("schema initialized");
        let normalized = self.normalize_mapping(working, &schema);
        self.is_normalized = true;
        self.document = Some(Value::Map(normalized));
        self.errors.sort();
        self.rebuild_trees();
        Ok(())
    }

    /// Resets per-invocation state, checks the document shape and
    /// meta-validates the schema. Returns the cloned working mapping.
    fn init_processing(&mut self, document: &Value) -> Result<Map, ProcessingError> {
        self.errors.clear();
        self.document_tree.clear();
        self.schema_tree.clear();
        self.unrequired_by_excludes.clear();
        self.is_normalized = false;

        if self.schema.is_none() {
            if self.allow_unknown.is_truthy() {
                self.schema = Some(Schema::new());
            } else {
                return Err(SchemaError::Missing.into());
            }
        }

        let schema = self.schema.as_ref().unwrap();
        schema::validate_schema(schema, &self.registries, &self.types, &self.extra_specs())?;

        match document {
            Value::Map(map) => Ok(map.clone()),
            Value::Null => Err(DocumentError::Missing.into()),
            other => Err(DocumentError::NotAMapping(other.to_string()).into()),
        }
    }

    // The trees are projections of the sorted flat list; rebuilding after
    // the sort keeps all three views consistent.
    fn rebuild_trees(&mut self) {
        self.document_tree.clear();
        self.schema_tree.clear();
        let errors: Vec<_> = self.errors.iter().cloned().collect();
        for error in &errors {
            self.document_tree.add(error);
            self.schema_tree.add(error);
        }
    }

    // Child validators

    /// A child validator inheriting configuration and extending the paths
    /// by the given crumbs.
    pub(crate) fn child(
        &self,
        document_crumb: Option<&[Value]>,
        schema_crumb: Option<&[Value]>,
        schema: Schema,
    ) -> Validator {
        let mut child = Validator {
            allow_unknown: self.allow_unknown.clone(),
            require_all: self.require_all,
            purge_unknown: self.purge_unknown,
            purge_readonly: self.purge_readonly,
            ignore_none_values: self.ignore_none_values,
            error_handler: Arc::clone(&self.error_handler),
            registries: self.registries.clone(),
            types: Arc::clone(&self.types),
            handlers: Arc::clone(&self.handlers),
            custom_rules: Arc::clone(&self.custom_rules),
            schema: Some(schema),
            document: None,
            errors: ErrorList::new(),
            document_tree: ErrorTree::for_document(),
            schema_tree: ErrorTree::for_schema(),
            document_path: self.document_path.clone(),
            schema_path: self.schema_path.clone(),
            update: self.update,
            is_child: true,
            is_normalized: self.is_normalized,
            root_document: self.root_document.clone(),
            unrequired_by_excludes: IndexSet::new(),
            remaining_rules: Vec::new(),
        };
        if let Some(crumb) = document_crumb {
            child.document_path.extend(crumb.iter().cloned());
        }
        if let Some(crumb) = schema_crumb {
            child.schema_path.extend(crumb.iter().cloned());
        }
        child
    }

    /// Runs a child validation without normalization and without the
    /// top-level entry checks. Returns validity; errors stay in the child
    /// until the parent absorbs them.
    pub(crate) fn validate_child(&mut self, document: Map, update: bool) -> bool {
        self.update = update;
        self.document = Some(Value::Map(document));
        self.validate_level();
        if !self.update {
            self.validate_required_fields();
        }
        self.errors.is_empty()
    }

    /// Takes the child's collected errors.
    pub(crate) fn take_errors(&mut self) -> Vec<ValidationError> {
        let errors = std::mem::take(&mut self.errors);
        errors.into_iter().collect()
    }

    // Error emission

    /// Records one error for `field` at the current level.
    pub(crate) fn emit(&mut self, field: &Value, definition: ErrorDefinition, info: Vec<Value>) {
        let error = self.build_error(field, definition, info);
        self.push_error(error);
    }

    /// Records a group error wrapping child-validator errors.
    pub(crate) fn emit_group(
        &mut self,
        field: &Value,
        definition: ErrorDefinition,
        children: Vec<ValidationError>,
        info: Vec<Value>,
    ) {
        let mut error = self.build_error(field, definition, info);
        error.child_errors = children;
        self.push_error(error);
    }

    /// Records a custom error with a plain message. Custom errors carry no
    /// rule, so their schema path stays at the current level.
    pub(crate) fn emit_custom(&mut self, field: &Value, message: String) {
        let error = self.build_error(field, codes::CUSTOM, vec![Value::String(message)]);
        self.push_error(error);
    }

    fn build_error(
        &self,
        field: &Value,
        definition: ErrorDefinition,
        info: Vec<Value>,
    ) -> ValidationError {
        let mut document_path = self.document_path.clone();
        document_path.push(field.clone());

        let mut schema_path = self.schema_path.clone();
        if definition.code != codes::UNKNOWN_FIELD.code {
            if let Some(rule) = definition.rule {
                schema_path.push(field.clone());
                schema_path.push(Value::from(rule));
            }
        }

        let constraint = definition
            .rule
            .and_then(|rule| self.constraint_for(field, rule));
        let value = self
            .document
            .as_ref()
            .and_then(Value::as_map)
            .and_then(|map| map.get(field))
            .cloned();

        ValidationError::new(document_path, schema_path, definition, constraint, value, info)
    }

    /// The constraint recorded on an error, with the implicit defaults for
    /// `nullable` and `required` filled in.
    fn constraint_for(&self, field: &Value, rule: &str) -> Option<Value> {
        let rules = self.resolved_rules(field)?;
        let declared = rules.get(rule).and_then(|c| c.as_value().cloned());
        match rule {
            "nullable" => declared.or(Some(Value::Bool(false))),
            "required" => declared.or(Some(Value::Bool(self.require_all))),
            _ => declared,
        }
    }

    /// The resolved rule set for a declared field, if resolution succeeds.
    /// The schema has meta-validated by the time this runs, so references
    /// resolve unless the registry was mutated mid-invocation.
    pub(crate) fn resolved_rules(&self, field: &Value) -> Option<RulesSet> {
        let reference = self.schema.as_ref()?.get(field)?;
        self.registries.resolve_rules(reference).ok()
    }

    pub(crate) fn push_error(&mut self, error: ValidationError) {
        self.document_tree.add(&error);
        self.schema_tree.add(&error);
        self.errors.push(error);
    }

    /// Flushes a batch of child errors into this validator's stash.
    pub(crate) fn absorb(&mut self, errors: Vec<ValidationError>) {
        for error in errors {
            self.push_error(error);
        }
    }

    // Queue management

    /// Drops specific rules from the current field's queue.
    pub(crate) fn drop_remaining_rules(&mut self, rules: &[&str]) {
        self.remaining_rules.retain(|r| !rules.contains(&r.as_str()));
    }

    /// Empties the current field's queue.
    pub(crate) fn drop_all_remaining_rules(&mut self) {
        self.remaining_rules.clear();
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("allow_unknown", &self.allow_unknown)
            .field("require_all", &self.require_all)
            .field("purge_unknown", &self.purge_unknown)
            .field("purge_readonly", &self.purge_readonly)
            .field("ignore_none_values", &self.ignore_none_values)
            .field("is_child", &self.is_child)
            .field("errors", &self.errors.len())
            .finish_non_exhaustive()
    }
}
