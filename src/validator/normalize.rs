//! The normalization pipeline.
//!
//! For every mapping level: rename, purge readonly, purge unknown, report
//! readonly violations, inject defaults, coerce, then recurse into
//! containers. The order is observable. Normalization works on an owned
//! copy; the caller's input is never touched. Logical combinators are not
//! recursed into.

use indexmap::IndexMap;

use crate::errors::{codes, ErrorDefinition, ValidationError};
use crate::handlers::{Coercer, DefaultSetter, SETTER_RETRY};
use crate::report;
use crate::schema::{Constraint, RulesSet, Schema, SubSchema};
use crate::value::{Map, Value};

use super::{AllowUnknown, Validator};

impl Validator {
    /// Normalizes one mapping level against a schema. Emits normalization
    /// errors into this validator's stash and returns the rewritten map.
    pub(crate) fn normalize_mapping(&mut self, mut mapping: Map, schema: &Schema) -> Map {
        let resolved = self.resolve_schema_fields(schema);

        self.normalize_rename_fields(&mut mapping, &resolved);

        // A rule-set valued `allow_unknown` claims the unknown fields for
        // its own scope, which takes precedence over purging.
        if self.purge_unknown && !self.allow_unknown.is_truthy() {
            mapping.retain(|field, _| resolved.contains_key(field));
        }
        if self.purge_readonly {
            mapping.retain(|field, _| {
                !resolved
                    .get(field)
                    .map(|rules| rules.bool_rule("readonly", false))
                    .unwrap_or(false)
            });
        }

        // Readonly violations are reported before defaults so a rule set
        // carrying both `readonly` and `default` doesn't flag its own
        // injected value.
        self.check_readonly_fields(&mapping, &resolved);

        self.normalize_default_fields(&mut mapping, &resolved);
        self.normalize_coerce(&mut mapping, &resolved);
        self.normalize_containers(&mut mapping, &resolved);
        mapping
    }

    /// Child-validator entry: normalize an owned sub-document.
    pub(crate) fn normalize_child(&mut self, document: Map) -> Map {
        let schema = self.schema.clone().unwrap_or_default();
        self.document = Some(Value::Map(document.clone()));
        let result = self.normalize_mapping(document, &schema);
        self.is_normalized = true;
        result
    }

    pub(crate) fn resolve_schema_fields(&self, schema: &Schema) -> IndexMap<Value, RulesSet> {
        let mut resolved = IndexMap::new();
        for (field, reference) in schema.iter() {
            if let Ok(rules) = self.registries.resolve_rules(reference) {
                resolved.insert(field.clone(), rules);
            }
        }
        resolved
    }

    pub(crate) fn unknown_field_rules(&self) -> Option<RulesSet> {
        let reference = self.allow_unknown.as_rules()?;
        self.registries.resolve_rules(reference).ok()
    }

    // Step 1: rename

    fn normalize_rename_fields(
        &mut self,
        mapping: &mut Map,
        resolved: &IndexMap<Value, RulesSet>,
    ) {
        let unknown_rules = self.unknown_field_rules();
        let fields: Vec<Value> = mapping.keys().cloned().collect();
        for field in fields {
            if let Some(rules) = resolved.get(&field) {
                self.apply_rename(mapping, &field, rules.clone());
            } else if let Some(rules) = &unknown_rules {
                if rules.contains("rename_handler") {
                    self.apply_rename(mapping, &field, rules.clone());
                }
            }
        }
    }

    fn apply_rename(&mut self, mapping: &mut Map, field: &Value, rules: RulesSet) {
        let mut current = field.clone();

        if let Some(Constraint::Value(new_name)) = rules.get("rename") {
            if new_name != &current {
                if mapping.contains_key(new_name) {
                    self.emit(
                        &current,
                        codes::RENAMING_FAILED,
                        vec![Value::String(format!(
                            "renaming to {} collides with an existing field",
                            new_name
                        ))],
                    );
                } else if let Some(value) = mapping.shift_remove(&current) {
                    mapping.insert(new_name.clone(), value);
                    current = new_name.clone();
                }
            }
        }

        if let Some(Constraint::Coercers(chain)) = rules.get("rename_handler") {
            let renamed = self.apply_coercer_chain(
                &current,
                current.clone(),
                chain,
                false,
                codes::RENAMING_FAILED,
            );
            if renamed != current {
                if let Some(value) = mapping.shift_remove(&current) {
                    mapping.insert(renamed, value);
                }
            }
        }
    }

    // Steps 2-4: purging happens inline above; readonly reporting here.

    fn check_readonly_fields(&mut self, mapping: &Map, resolved: &IndexMap<Value, RulesSet>) {
        for (field, rules) in resolved {
            if rules.bool_rule("readonly", false) && mapping.contains_key(field) {
                self.emit(field, codes::READONLY_FIELD, vec![]);
            }
        }
    }

    /// `true` when a readonly violation for this field was already
    /// recorded (by the normalization pass).
    pub(crate) fn has_readonly_error(&self, field: &Value) -> bool {
        let mut path = self.document_path.clone();
        path.push(field.clone());
        self.errors
            .iter()
            .any(|e| e.code == codes::READONLY_FIELD.code && e.document_path == path)
    }

    // Step 5: defaults

    fn normalize_default_fields(
        &mut self,
        mapping: &mut Map,
        resolved: &IndexMap<Value, RulesSet>,
    ) {
        // A field is defaultable when absent, or present as Null while not
        // nullable (a nullable Null is a legitimate value and is kept).
        let empty_fields: Vec<Value> = resolved
            .iter()
            .filter(|(field, rules)| match mapping.get(*field) {
                None => true,
                Some(Value::Null) => !rules.bool_rule("nullable", false),
                Some(_) => false,
            })
            .map(|(field, _)| field.clone())
            .collect();

        for field in &empty_fields {
            if let Some(Constraint::Value(default)) = resolved[field].get("default") {
                mapping.insert(field.clone(), default.clone());
            }
        }

        // Setters may depend on each other; repeated passes discover a
        // topological order. A pass without progress means the remaining
        // setters are stuck or cyclic.
        let mut pending: Vec<Value> = empty_fields
            .into_iter()
            .filter(|field| resolved[field].contains("default_setter"))
            .collect();

        while !pending.is_empty() {
            let mut progressed = false;
            let mut retry = Vec::new();

            for field in pending.drain(..) {
                let setter = match resolved[&field].get("default_setter") {
                    Some(Constraint::Setter(setter)) => setter.clone(),
                    _ => continue,
                };
                match self.run_setter(&setter, mapping) {
                    Ok(value) => {
                        mapping.insert(field, value);
                        progressed = true;
                    }
                    Err(reason) if reason == SETTER_RETRY => retry.push(field),
                    Err(reason) => {
                        self.emit(
                            &field,
                            codes::SETTING_DEFAULT_FAILED,
                            vec![Value::String(reason)],
                        );
                        progressed = true;
                    }
                }
            }

            if retry.is_empty() {
                break;
            }
            if !progressed {
                for field in retry {
                    self.emit(
                        &field,
                        codes::SETTING_DEFAULT_FAILED,
                        vec![Value::String(
                            "circular dependencies of default setters".into(),
                        )],
                    );
                }
                break;
            }
            pending = retry;
        }
    }

    fn run_setter(&self, setter: &DefaultSetter, mapping: &Map) -> Result<Value, String> {
        match setter {
            DefaultSetter::Fn(f) => f(mapping),
            DefaultSetter::Named(name) => match self.handlers.setter(name) {
                Some(f) => f(mapping),
                None => Err(format!("unknown default setter '{}'", name)),
            },
        }
    }

    // Step 6: coercion

    fn normalize_coerce(&mut self, mapping: &mut Map, resolved: &IndexMap<Value, RulesSet>) {
        let unknown_rules = self.unknown_field_rules();
        let fields: Vec<Value> = mapping.keys().cloned().collect();

        for field in fields {
            let (chain, nullable) = match resolved.get(&field) {
                Some(rules) => match rules.get("coerce") {
                    Some(Constraint::Coercers(chain)) => {
                        (chain.clone(), rules.bool_rule("nullable", false))
                    }
                    _ => continue,
                },
                None => match &unknown_rules {
                    Some(rules) => match rules.get("coerce") {
                        Some(Constraint::Coercers(chain)) => {
                            (chain.clone(), rules.bool_rule("nullable", false))
                        }
                        _ => continue,
                    },
                    None => continue,
                },
            };

            let value = mapping[&field].clone();
            let coerced =
                self.apply_coercer_chain(&field, value, &chain, nullable, codes::COERCION_FAILED);
            mapping.insert(field, coerced);
        }
    }

    /// Folds a value through a coercer chain. On failure the error is
    /// emitted (unless a Null value is covered by `nullable`) and the
    /// partially coerced value is returned, so validation still sees it.
    pub(crate) fn apply_coercer_chain(
        &mut self,
        field: &Value,
        value: Value,
        chain: &[Coercer],
        nullable: bool,
        definition: ErrorDefinition,
    ) -> Value {
        let mut current = value;
        for coercer in chain {
            let f = match coercer {
                Coercer::Fn(f) => f.clone(),
                Coercer::Named(name) => match self.handlers.coercer(name) {
                    Some(f) => f,
                    None => {
                        self.emit(
                            field,
                            definition,
                            vec![Value::String(format!("unknown handler '{}'", name))],
                        );
                        return current;
                    }
                },
            };
            match f(&current) {
                Ok(next) => current = next,
                Err(reason) => {
                    if !(nullable && current.is_null()) {
                        self.emit(field, definition, vec![Value::String(reason)]);
                    }
                    return current;
                }
            }
        }
        current
    }

    // Step 7: recursion

    fn normalize_containers(&mut self, mapping: &mut Map, resolved: &IndexMap<Value, RulesSet>) {
        let unknown_rules = self.unknown_field_rules();
        let fields: Vec<Value> = mapping.keys().cloned().collect();

        for field in fields {
            let rules = resolved
                .get(&field)
                .cloned()
                .or_else(|| unknown_rules.clone());
            let rules = match rules {
                Some(rules) => rules,
                None => continue,
            };

            let is_mapping = matches!(mapping.get(&field), Some(Value::Map(_)));
            let is_sequence = matches!(
                mapping.get(&field),
                Some(Value::Seq(_)) | Some(Value::Tuple(_))
            );

            if is_mapping {
                if let Some(Constraint::Rules(reference)) = rules.get("keysrules") {
                    let reference = reference.clone();
                    self.normalize_mapping_keys(mapping, &field, &reference);
                }
                if let Some(Constraint::Rules(reference)) = rules.get("valuesrules") {
                    let reference = reference.clone();
                    self.normalize_mapping_values(mapping, &field, &reference);
                }

                let has_mapping_schema = matches!(
                    rules.get("schema"),
                    Some(Constraint::SubSchema(SubSchema::Mapping(_)))
                );
                if has_mapping_schema
                    || rules.contains("allow_unknown")
                    || rules.contains("purge_unknown")
                    || matches!(self.allow_unknown, AllowUnknown::Rules(_))
                {
                    self.normalize_mapping_per_schema(mapping, &field, &rules);
                }
            } else if is_sequence {
                if let Some(Constraint::SubSchema(SubSchema::Sequence(reference))) =
                    rules.get("schema")
                {
                    let reference = reference.clone();
                    self.normalize_sequence_elements(mapping, &field, &reference);
                } else if let Some(Constraint::RulesList(items)) = rules.get("items") {
                    let items = items.clone();
                    self.normalize_sequence_items(mapping, &field, &items);
                }
            }
        }
    }

    fn normalize_mapping_keys(
        &mut self,
        mapping: &mut Map,
        field: &Value,
        keysrules: &crate::schema::RulesRef,
    ) {
        let inner = match mapping.get(field).and_then(Value::as_map) {
            Some(inner) => inner.clone(),
            None => return,
        };

        // Keys are piped through normalization as a key -> key document.
        let child_schema: Schema = inner
            .keys()
            .map(|k| (k.clone(), keysrules.clone()))
            .collect();
        let key_document: Map = inner.keys().map(|k| (k.clone(), k.clone())).collect();

        let mut child = self.child(
            Some(&[field.clone()]),
            Some(&[field.clone(), Value::from("keysrules")]),
            child_schema,
        );
        let result = child.normalize_child(key_document);
        let mut errors = child.take_errors();
        drop_schema_path_nodes(
            &mut errors,
            &[self.schema_path.len() + 4, self.schema_path.len() + 2],
        );
        self.absorb(errors);

        let mut inner = inner;
        for (old_key, new_key) in result {
            if old_key == new_key {
                continue;
            }
            if inner.contains_key(&new_key) {
                let old = old_key.to_string();
                let new = new_key.to_string();
                report::warn(
                    "key_collision",
                    &[("key", old.as_str()), ("replaced", new.as_str())],
                );
            }
            if let Some(value) = inner.shift_remove(&old_key) {
                inner.insert(new_key, value);
            }
        }
        mapping.insert(field.clone(), Value::Map(inner));
    }

    fn normalize_mapping_values(
        &mut self,
        mapping: &mut Map,
        field: &Value,
        valuesrules: &crate::schema::RulesRef,
    ) {
        let inner = match mapping.get(field).and_then(Value::as_map) {
            Some(inner) => inner.clone(),
            None => return,
        };

        let child_schema: Schema = inner
            .keys()
            .map(|k| (k.clone(), valuesrules.clone()))
            .collect();

        let mut child = self.child(
            Some(&[field.clone()]),
            Some(&[field.clone(), Value::from("valuesrules")]),
            child_schema,
        );
        let result = child.normalize_child(inner);
        let mut errors = child.take_errors();
        drop_schema_path_nodes(&mut errors, &[self.schema_path.len() + 2]);
        self.absorb(errors);

        mapping.insert(field.clone(), Value::Map(result));
    }

    fn normalize_mapping_per_schema(&mut self, mapping: &mut Map, field: &Value, rules: &RulesSet) {
        let inner = match mapping.get(field).and_then(Value::as_map) {
            Some(inner) => inner.clone(),
            None => return,
        };

        let child_schema = match rules.get("schema") {
            Some(Constraint::SubSchema(SubSchema::Mapping(reference))) => self
                .registries
                .resolve_schema(reference)
                .unwrap_or_default(),
            _ => Schema::new(),
        };

        let mut child = self.child(
            Some(&[field.clone()]),
            Some(&[field.clone(), Value::from("schema")]),
            child_schema,
        );
        child.allow_unknown = match rules.get("allow_unknown") {
            Some(Constraint::Value(Value::Bool(true))) => AllowUnknown::Yes,
            Some(Constraint::Value(Value::Bool(false))) => AllowUnknown::No,
            Some(Constraint::Rules(reference)) => AllowUnknown::Rules(reference.clone()),
            _ => self.allow_unknown.clone(),
        };
        if let Some(purge) = rules.get("purge_unknown").and_then(Constraint::as_bool) {
            child.purge_unknown = purge;
        }
        if let Some(require_all) = rules.get("require_all").and_then(Constraint::as_bool) {
            child.require_all = require_all;
        }

        let result = child.normalize_child(inner);
        let errors = child.take_errors();
        self.absorb(errors);

        mapping.insert(field.clone(), Value::Map(result));
    }

    fn normalize_sequence_elements(
        &mut self,
        mapping: &mut Map,
        field: &Value,
        rules: &crate::schema::RulesRef,
    ) {
        let elements = match mapping.get(field).and_then(Value::as_slice) {
            Some(elements) => elements.to_vec(),
            None => return,
        };
        let was_tuple = matches!(mapping.get(field), Some(Value::Tuple(_)));

        let child_schema: Schema = (0..elements.len())
            .map(|i| (Value::from(i), rules.clone()))
            .collect();
        let document: Map = elements
            .iter()
            .enumerate()
            .map(|(i, v)| (Value::from(i), v.clone()))
            .collect();

        let mut child = self.child(
            Some(&[field.clone()]),
            Some(&[field.clone(), Value::from("schema")]),
            child_schema,
        );
        let result = child.normalize_child(document);
        let mut errors = child.take_errors();
        drop_schema_path_nodes(&mut errors, &[self.schema_path.len() + 2]);
        self.absorb(errors);

        let rebuilt = rebuild_sequence(&result, elements.len(), was_tuple);
        mapping.insert(field.clone(), rebuilt);
    }

    fn normalize_sequence_items(
        &mut self,
        mapping: &mut Map,
        field: &Value,
        items: &[crate::schema::RulesRef],
    ) {
        let elements = match mapping.get(field).and_then(Value::as_slice) {
            Some(elements) => elements.to_vec(),
            None => return,
        };
        if elements.len() != items.len() {
            // Validation reports the length mismatch; nothing to do here.
            return;
        }
        let was_tuple = matches!(mapping.get(field), Some(Value::Tuple(_)));

        let child_schema: Schema = items
            .iter()
            .enumerate()
            .map(|(i, rules)| (Value::from(i), rules.clone()))
            .collect();
        let document: Map = elements
            .iter()
            .enumerate()
            .map(|(i, v)| (Value::from(i), v.clone()))
            .collect();

        let mut child = self.child(
            Some(&[field.clone()]),
            Some(&[field.clone(), Value::from("items")]),
            child_schema,
        );
        let result = child.normalize_child(document);
        let mut errors = child.take_errors();
        drop_schema_path_nodes(&mut errors, &[self.schema_path.len() + 2]);
        self.absorb(errors);

        let rebuilt = rebuild_sequence(&result, elements.len(), was_tuple);
        mapping.insert(field.clone(), rebuilt);
    }
}

fn rebuild_sequence(result: &Map, len: usize, was_tuple: bool) -> Value {
    let elements: Vec<Value> = (0..len)
        .map(|i| result.get(&Value::from(i)).cloned().unwrap_or(Value::Null))
        .collect();
    if was_tuple {
        Value::Tuple(elements)
    } else {
        Value::Seq(elements)
    }
}

/// Removes schema-path segments at the given absolute positions
/// (descending order expected), recursing into group children. Used to
/// hide the synthesized keys of key/value/element child schemas.
pub(crate) fn drop_schema_path_nodes(errors: &mut [ValidationError], positions: &[usize]) {
    for error in errors {
        for &position in positions {
            if position < error.schema_path.len() {
                error.schema_path.remove(position);
            }
        }
        drop_schema_path_nodes(&mut error.child_errors, positions);
    }
}
