//! Per-field rule dispatch and the builtin rule handlers.
//!
//! Each present field gets a queue: the priority rules (`readonly`,
//! `nullable`, `type`, `empty`, in that order; `nullable` runs even when
//! undeclared) followed by the remaining declared validation rules in
//! declaration order. Handlers may drop rules from the queue; a dropped
//! queue terminates the field's pipeline without affecting other fields.

use crate::errors::codes;
use crate::schema::{Constraint, Phase, RulesSet, Schema, SubSchema};
use crate::value::{Map, Value};

use super::normalize::drop_schema_path_nodes;
use super::{AllowUnknown, Validator};

/// Rules `nullable` suppresses for a Null value. Cross-field rules and
/// custom checks still run.
const DROPPED_ON_NULL: &[&str] = &[
    "allowed",
    "empty",
    "forbidden",
    "items",
    "keysrules",
    "min",
    "max",
    "minlength",
    "maxlength",
    "regex",
    "schema",
    "valuesrules",
    "type",
];

/// Rules skipped for an empty value.
const DROPPED_ON_EMPTY: &[&str] = &[
    "allowed",
    "forbidden",
    "items",
    "minlength",
    "maxlength",
    "regex",
    "check_with",
];

impl Validator {
    /// Validates every field of the current level: declared fields against
    /// their rule sets, the rest through the unknown-field policy.
    pub(crate) fn validate_level(&mut self) {
        let document = match self.document.clone() {
            Some(Value::Map(map)) => map,
            _ => return,
        };
        let schema = self.schema.clone().unwrap_or_default();

        for (field, value) in &document {
            if schema.contains(field) {
                if let Some(definitions) = self.resolved_rules(field) {
                    self.validate_field(field, &definitions, value);
                }
            } else {
                self.validate_unknown_field(field, value);
            }
        }
    }

    fn validate_field(&mut self, field: &Value, definitions: &RulesSet, value: &Value) {
        self.remaining_rules = self.build_rules_queue(definitions);
        while !self.remaining_rules.is_empty() {
            let rule = self.remaining_rules.remove(0);
            self.dispatch_rule(&rule, definitions, field, value);
        }
    }

    /// Priority rules first (fixed order), then the remaining declared
    /// validation rules in declaration order.
    fn build_rules_queue(&self, definitions: &RulesSet) -> Vec<String> {
        let mut queue: Vec<String> = Vec::new();

        for rule in ["readonly", "nullable", "type", "empty"] {
            // `nullable` is mandatory: an undeclared Null still errors.
            if definitions.contains(rule) || rule == "nullable" {
                queue.push(rule.to_string());
            }
        }

        for rule in definitions.rule_names() {
            if queue.iter().any(|r| r == rule) {
                continue;
            }
            let phase = crate::schema::rule_spec(rule)
                .map(|spec| spec.phase)
                .or_else(|| self.custom_rules.get(rule).map(|r| r.spec.phase));
            if matches!(phase, Some(Phase::Normal)) {
                queue.push(rule.to_string());
            }
        }
        queue
    }

    fn dispatch_rule(&mut self, rule: &str, definitions: &RulesSet, field: &Value, value: &Value) {
        let constraint = definitions.get(rule).cloned();
        match rule {
            "readonly" => self.validate_readonly(&constraint, field),
            "nullable" => self.validate_nullable(&constraint, field, value),
            "type" => self.validate_type(&constraint, field, value),
            "empty" => self.validate_empty(&constraint, field, value),
            "min" => self.validate_min(&constraint, field, value),
            "max" => self.validate_max(&constraint, field, value),
            "minlength" => self.validate_minlength(&constraint, field, value),
            "maxlength" => self.validate_maxlength(&constraint, field, value),
            "allowed" => self.validate_allowed(&constraint, field, value),
            "forbidden" => self.validate_forbidden(&constraint, field, value),
            "regex" => self.validate_regex(&constraint, field, value),
            "contains" => self.validate_contains(&constraint, field, value),
            "dependencies" => self.validate_dependencies(&constraint, field),
            "excludes" => self.validate_excludes(&constraint, definitions, field),
            "items" => self.validate_items(&constraint, field, value),
            "schema" => self.validate_schema_rule(&constraint, definitions, field, value),
            "keysrules" => self.validate_keysrules(&constraint, field, value),
            "valuesrules" => self.validate_valuesrules(&constraint, field, value),
            "check_with" => self.validate_check_with(&constraint, field, value),
            "allof" | "anyof" | "noneof" | "oneof" => {
                if let Some(Constraint::RulesList(alternatives)) = &constraint {
                    self.validate_logical(rule, alternatives, field);
                }
            }
            _ => self.dispatch_custom_rule(rule, &constraint, field, value),
        }
    }

    fn dispatch_custom_rule(
        &mut self,
        rule: &str,
        constraint: &Option<Constraint>,
        field: &Value,
        value: &Value,
    ) {
        let handler = match self.custom_rules.get(rule) {
            Some(custom) => custom.handler.clone(),
            None => return,
        };
        let constraint = match constraint {
            Some(constraint) => constraint.clone(),
            None => return,
        };
        let mut emitted: Vec<(Value, String)> = Vec::new();
        handler(&constraint, field, value, &mut |f, message| {
            emitted.push((f, message));
        });
        for (f, message) in emitted {
            self.emit_custom(&f, message);
        }
    }

    // Priority rules

    fn validate_readonly(&mut self, constraint: &Option<Constraint>, field: &Value) {
        let readonly = constraint
            .as_ref()
            .and_then(Constraint::as_bool)
            .unwrap_or(false);
        if !readonly {
            return;
        }
        if !self.is_normalized {
            self.emit(field, codes::READONLY_FIELD, vec![]);
        } else if self.has_readonly_error(field) {
            // Normalization already reported the violation; running the
            // remaining rules would only produce noise about a value that
            // must not be there at all.
            self.drop_all_remaining_rules();
        }
    }

    fn validate_nullable(&mut self, constraint: &Option<Constraint>, field: &Value, value: &Value) {
        if !value.is_null() {
            return;
        }
        let nullable = constraint
            .as_ref()
            .and_then(Constraint::as_bool)
            .unwrap_or(false);
        if !(nullable || self.ignore_none_values) {
            self.emit(field, codes::NOT_NULLABLE, vec![]);
        }
        self.drop_remaining_rules(DROPPED_ON_NULL);
    }

    fn validate_type(&mut self, constraint: &Option<Constraint>, field: &Value, value: &Value) {
        let names = match constraint.as_ref().and_then(Constraint::as_value) {
            Some(Value::Seq(names)) => names,
            _ => return,
        };
        for name in names {
            if let Some(name) = name.as_str() {
                if let Some(definition) = self.types.get(name) {
                    if definition.matches(value) {
                        return;
                    }
                }
            }
        }
        self.emit(field, codes::BAD_TYPE, vec![]);
        self.drop_all_remaining_rules();
    }

    fn validate_empty(&mut self, constraint: &Option<Constraint>, field: &Value, value: &Value) {
        if !value.is_empty_sized() {
            return;
        }
        self.drop_remaining_rules(DROPPED_ON_EMPTY);
        let empty_allowed = constraint
            .as_ref()
            .and_then(Constraint::as_bool)
            .unwrap_or(true);
        if !empty_allowed {
            self.emit(field, codes::EMPTY_NOT_ALLOWED, vec![]);
        }
    }

    // Bounds and membership

    fn validate_min(&mut self, constraint: &Option<Constraint>, field: &Value, value: &Value) {
        if let Some(bound) = constraint.as_ref().and_then(Constraint::as_value) {
            if value.compare(bound) == Some(std::cmp::Ordering::Less) {
                self.emit(field, codes::MIN_VALUE, vec![]);
            }
        }
    }

    fn validate_max(&mut self, constraint: &Option<Constraint>, field: &Value, value: &Value) {
        if let Some(bound) = constraint.as_ref().and_then(Constraint::as_value) {
            if value.compare(bound) == Some(std::cmp::Ordering::Greater) {
                self.emit(field, codes::MAX_VALUE, vec![]);
            }
        }
    }

    fn validate_minlength(&mut self, constraint: &Option<Constraint>, field: &Value, value: &Value) {
        let bound = constraint
            .as_ref()
            .and_then(Constraint::as_value)
            .and_then(Value::as_int);
        if let (Some(bound), Some(len)) = (bound, value.len()) {
            if (len as i64) < bound {
                self.emit(field, codes::MIN_LENGTH, vec![Value::from(len)]);
            }
        }
    }

    fn validate_maxlength(&mut self, constraint: &Option<Constraint>, field: &Value, value: &Value) {
        let bound = constraint
            .as_ref()
            .and_then(Constraint::as_value)
            .and_then(Value::as_int);
        if let (Some(bound), Some(len)) = (bound, value.len()) {
            if (len as i64) > bound {
                self.emit(field, codes::MAX_LENGTH, vec![Value::from(len)]);
            }
        }
    }

    fn validate_allowed(&mut self, constraint: &Option<Constraint>, field: &Value, value: &Value) {
        let allowed = match constraint.as_ref().and_then(Constraint::as_value) {
            Some(allowed) => allowed,
            None => return,
        };

        if value.is_container() && value.as_str().is_none() {
            let unallowed: Vec<Value> = value
                .members()
                .filter(|member| !allowed.contains(member))
                .cloned()
                .collect();
            if !unallowed.is_empty() {
                self.emit(
                    field,
                    codes::UNALLOWED_VALUES,
                    vec![Value::Seq(unallowed)],
                );
            }
        } else if !allowed.contains(value) {
            self.emit(field, codes::UNALLOWED_VALUE, vec![value.clone()]);
        }
    }

    fn validate_forbidden(&mut self, constraint: &Option<Constraint>, field: &Value, value: &Value) {
        let forbidden = match constraint.as_ref().and_then(Constraint::as_value) {
            Some(forbidden) => forbidden,
            None => return,
        };

        if value.as_str().is_some() || !value.is_container() {
            if forbidden.contains(value) {
                self.emit(field, codes::FORBIDDEN_VALUE, vec![value.clone()]);
            }
        } else {
            let hits: Vec<Value> = value
                .members()
                .filter(|member| forbidden.contains(member))
                .cloned()
                .collect();
            if !hits.is_empty() {
                self.emit(field, codes::FORBIDDEN_VALUES, vec![Value::Seq(hits)]);
            }
        }
    }

    fn validate_regex(&mut self, constraint: &Option<Constraint>, field: &Value, value: &Value) {
        let pattern = match constraint.as_ref().and_then(Constraint::as_value) {
            Some(Value::String(pattern)) => pattern,
            _ => return,
        };
        let subject = match value.as_str() {
            Some(subject) => subject,
            None => return,
        };

        // The pattern matches from the start; a missing end anchor is
        // added so partial matches don't pass.
        let anchored = if pattern.ends_with('$') {
            format!("^(?:{})", pattern)
        } else {
            format!("^(?:{})$", pattern)
        };
        match regex::Regex::new(&anchored) {
            Ok(re) if re.is_match(subject) => {}
            _ => self.emit(field, codes::REGEX_MISMATCH, vec![]),
        }
    }

    fn validate_contains(&mut self, constraint: &Option<Constraint>, field: &Value, value: &Value) {
        if !value.is_container() {
            return;
        }
        let expected = match constraint.as_ref().and_then(Constraint::as_value) {
            Some(Value::Seq(expected)) => expected,
            _ => return,
        };
        let missing: Vec<Value> = expected
            .iter()
            .filter(|item| !value.contains(item))
            .cloned()
            .collect();
        if !missing.is_empty() {
            self.emit(field, codes::MISSING_MEMBERS, vec![Value::Seq(missing)]);
        }
    }

    // Cross-field rules

    fn validate_dependencies(&mut self, constraint: &Option<Constraint>, field: &Value) {
        match constraint.as_ref().and_then(Constraint::as_value) {
            Some(Value::Seq(dependencies)) => {
                for dependency in dependencies.clone() {
                    let path = match dependency.as_str() {
                        Some(path) => path.to_string(),
                        None => continue,
                    };
                    if self.lookup_field(&path).is_none() {
                        self.emit(field, codes::DEPENDENCIES_FIELD, vec![dependency.clone()]);
                    }
                }
            }
            Some(Value::Map(dependencies)) => {
                let dependencies = dependencies.clone();
                let mut satisfied = 0usize;
                let mut unmet = Map::new();
                for (name, wanted) in &dependencies {
                    let path = match name.as_str() {
                        Some(path) => path.to_string(),
                        None => continue,
                    };
                    let found = self.lookup_field(&path);
                    match &found {
                        Some(value) if wanted.contains(value) => satisfied += 1,
                        _ => {
                            unmet.insert(name.clone(), found.unwrap_or(Value::Null));
                        }
                    }
                }
                if satisfied != dependencies.len() {
                    self.emit(
                        field,
                        codes::DEPENDENCIES_FIELD_VALUE,
                        vec![Value::Map(unmet)],
                    );
                }
            }
            _ => {}
        }
    }

    /// Resolves a dot-notation dependency path. A leading `^` addresses
    /// the root document; a doubled `^^` is a literal caret in the first
    /// segment name.
    fn lookup_field(&self, path: &str) -> Option<Value> {
        let (context, path) = match path.strip_prefix('^') {
            Some(stripped) if stripped.starts_with('^') => (self.document.clone(), stripped),
            Some(stripped) => (
                self.root_document.as_ref().map(|root| (**root).clone()),
                stripped,
            ),
            None => (self.document.clone(), path),
        };

        let mut current = context?;
        for part in path.split('.') {
            let key = Value::from(part);
            current = current.as_map()?.get(&key)?.clone();
        }
        Some(current)
    }

    fn validate_excludes(
        &mut self,
        constraint: &Option<Constraint>,
        definitions: &RulesSet,
        field: &Value,
    ) {
        let excluded_fields = match constraint.as_ref().and_then(Constraint::as_value) {
            Some(Value::Seq(excluded)) => excluded.clone(),
            _ => return,
        };

        // Mutually excluded required fields are tentatively unrequired;
        // the required check later demands at least one of them.
        let field_required = definitions.bool_rule("required", self.require_all);
        if field_required {
            self.unrequired_by_excludes.insert(field.clone());
        }
        let schema = self.schema.clone().unwrap_or_default();
        for excluded in &excluded_fields {
            if schema.contains(excluded) && field_required {
                self.unrequired_by_excludes.insert(excluded.clone());
            }
        }

        let document = self.document.clone();
        let present = document
            .as_ref()
            .and_then(Value::as_map)
            .map(|map| excluded_fields.iter().any(|f| map.contains_key(f)))
            .unwrap_or(false);
        if present {
            let listing = excluded_fields
                .iter()
                .map(|f| format!("'{}'", template_field(f)))
                .collect::<Vec<_>>()
                .join(", ");
            self.emit(field, codes::EXCLUDES_FIELD, vec![Value::String(listing)]);
        }
    }

    // Structural recursion

    fn validate_items(&mut self, constraint: &Option<Constraint>, field: &Value, value: &Value) {
        let items = match constraint {
            Some(Constraint::RulesList(items)) => items.clone(),
            _ => return,
        };
        let elements = match value.as_slice() {
            Some(elements) => elements.to_vec(),
            None => return,
        };

        if items.len() != elements.len() {
            self.emit(
                field,
                codes::ITEMS_LENGTH,
                vec![Value::from(items.len()), Value::from(elements.len())],
            );
            return;
        }

        let child_schema: Schema = items
            .iter()
            .enumerate()
            .map(|(i, rules)| (Value::from(i), rules.clone()))
            .collect();
        let document: Map = elements
            .into_iter()
            .enumerate()
            .map(|(i, v)| (Value::from(i), v))
            .collect();

        let mut child = self.child(
            Some(&[field.clone()]),
            Some(&[field.clone(), Value::from("items")]),
            child_schema,
        );
        let update = self.update;
        if !child.validate_child(document, update) {
            let errors = child.take_errors();
            self.emit_group(field, codes::BAD_ITEMS, errors, vec![]);
        }
    }

    fn validate_schema_rule(
        &mut self,
        constraint: &Option<Constraint>,
        definitions: &RulesSet,
        field: &Value,
        value: &Value,
    ) {
        match constraint {
            Some(Constraint::SubSchema(SubSchema::Mapping(reference))) => {
                let inner = match value.as_map() {
                    Some(inner) => inner.clone(),
                    None => return,
                };
                let child_schema = self
                    .registries
                    .resolve_schema(reference)
                    .unwrap_or_default();

                let mut child = self.child(
                    Some(&[field.clone()]),
                    Some(&[field.clone(), Value::from("schema")]),
                    child_schema,
                );
                child.allow_unknown = match definitions.get("allow_unknown") {
                    Some(Constraint::Value(Value::Bool(true))) => AllowUnknown::Yes,
                    Some(Constraint::Value(Value::Bool(false))) => AllowUnknown::No,
                    Some(Constraint::Rules(rules)) => AllowUnknown::Rules(rules.clone()),
                    _ => self.allow_unknown.clone(),
                };
                if let Some(require_all) =
                    definitions.get("require_all").and_then(Constraint::as_bool)
                {
                    child.require_all = require_all;
                }

                let update = self.update;
                if !child.validate_child(inner, update) {
                    let errors = child.take_errors();
                    self.emit_group(field, codes::MAPPING_SCHEMA, errors, vec![]);
                }
            }
            Some(Constraint::SubSchema(SubSchema::Sequence(reference))) => {
                let elements = match value.as_slice() {
                    Some(elements) => elements.to_vec(),
                    None => return,
                };

                let child_schema: Schema = (0..elements.len())
                    .map(|i| (Value::from(i), reference.clone()))
                    .collect();
                let document: Map = elements
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (Value::from(i), v))
                    .collect();

                let mut child = self.child(
                    Some(&[field.clone()]),
                    Some(&[field.clone(), Value::from("schema")]),
                    child_schema,
                );
                let update = self.update;
                if !child.validate_child(document, update) {
                    let mut errors = child.take_errors();
                    drop_schema_path_nodes(&mut errors, &[self.schema_path.len() + 2]);
                    self.emit_group(field, codes::SEQUENCE_SCHEMA, errors, vec![]);
                }
            }
            _ => {}
        }
    }

    fn validate_keysrules(&mut self, constraint: &Option<Constraint>, field: &Value, value: &Value) {
        let rules = match constraint {
            Some(Constraint::Rules(rules)) => rules.clone(),
            _ => return,
        };
        let inner = match value.as_map() {
            Some(inner) => inner,
            None => return,
        };

        let child_schema: Schema = inner.keys().map(|k| (k.clone(), rules.clone())).collect();
        let key_document: Map = inner.keys().map(|k| (k.clone(), k.clone())).collect();

        let mut child = self.child(
            Some(&[field.clone()]),
            Some(&[field.clone(), Value::from("keysrules")]),
            child_schema,
        );
        let update = self.update;
        if !child.validate_child(key_document, update) {
            let mut errors = child.take_errors();
            drop_schema_path_nodes(
                &mut errors,
                &[self.schema_path.len() + 4, self.schema_path.len() + 2],
            );
            self.emit_group(field, codes::KEYSRULES, errors, vec![]);
        }
    }

    fn validate_valuesrules(
        &mut self,
        constraint: &Option<Constraint>,
        field: &Value,
        value: &Value,
    ) {
        let rules = match constraint {
            Some(Constraint::Rules(rules)) => rules.clone(),
            _ => return,
        };
        let inner = match value.as_map() {
            Some(inner) => inner.clone(),
            None => return,
        };

        let child_schema: Schema = inner.keys().map(|k| (k.clone(), rules.clone())).collect();

        let mut child = self.child(
            Some(&[field.clone()]),
            Some(&[field.clone(), Value::from("valuesrules")]),
            child_schema,
        );
        let update = self.update;
        if !child.validate_child(inner, update) {
            let mut errors = child.take_errors();
            drop_schema_path_nodes(&mut errors, &[self.schema_path.len() + 2]);
            self.emit_group(field, codes::VALUESRULES, errors, vec![]);
        }
    }

    fn validate_check_with(&mut self, constraint: &Option<Constraint>, field: &Value, value: &Value) {
        let checks = match constraint {
            Some(Constraint::Checks(checks)) => checks.clone(),
            _ => return,
        };
        for check in checks {
            let f = match &check {
                crate::handlers::Checker::Fn(f) => f.clone(),
                crate::handlers::Checker::Named(name) => match self.handlers.checker(name) {
                    Some(f) => f,
                    None => {
                        self.emit_custom(field, format!("unknown check_with handler '{}'", name));
                        continue;
                    }
                },
            };
            let mut emitted: Vec<(Value, String)> = Vec::new();
            f(field, value, &mut |f, message| emitted.push((f, message)));
            for (f, message) in emitted {
                self.emit_custom(&f, message);
            }
        }
    }

    // Level-wide checks

    pub(crate) fn validate_unknown_field(&mut self, field: &Value, value: &Value) {
        match self.allow_unknown.clone() {
            AllowUnknown::No => self.emit(field, codes::UNKNOWN_FIELD, vec![]),
            AllowUnknown::Yes => {}
            AllowUnknown::Rules(reference) => {
                let crumb = if self.is_child {
                    "allow_unknown"
                } else {
                    "__allow_unknown__"
                };
                let mut child_schema = Schema::new();
                child_schema.insert(field.clone(), reference);

                let mut child = self.child(None, Some(&[Value::from(crumb)]), child_schema);

                let mut document = Map::new();
                document.insert(field.clone(), value.clone());
                if !child.validate_child(document, false) {
                    let errors = child.take_errors();
                    self.absorb(errors);
                }
            }
        }
    }

    /// Reports missing required fields. `excludes` may waive requiredness
    /// for a group of fields, of which at least one must then be present.
    pub(crate) fn validate_required_fields(&mut self) {
        let schema = self.schema.clone().unwrap_or_default();
        let document = self.document.clone();
        let map = document.as_ref().and_then(Value::as_map);
        let ignore_none_values = self.ignore_none_values;

        let present = |field: &Value| -> bool {
            match map.and_then(|m| m.get(field)) {
                Some(Value::Null) => !ignore_none_values,
                Some(_) => true,
                None => false,
            }
        };

        for field in schema.field_names() {
            let required = self
                .resolved_rules(field)
                .map(|rules| rules.bool_rule("required", self.require_all))
                .unwrap_or(false);
            if required && !self.unrequired_by_excludes.contains(field) && !present(field) {
                self.emit(field, codes::REQUIRED_FIELD, vec![]);
            }
        }

        if !self.unrequired_by_excludes.is_empty() {
            let any_present = self
                .unrequired_by_excludes
                .iter()
                .any(|field| matches!(map.and_then(|m| m.get(field)), Some(v) if !v.is_null()));
            if !any_present {
                let fields: Vec<Value> = self.unrequired_by_excludes.iter().cloned().collect();
                for field in fields {
                    self.emit(&field, codes::REQUIRED_FIELD, vec![]);
                }
            }
        }
    }
}

fn template_field(field: &Value) -> String {
    match field {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
