//! Schema AST: constraints, rule sets and schemas.
//!
//! A [`Schema`] maps field names to [`RulesSet`]s; a rules set maps rule
//! names to [`Constraint`]s. Constraints are stored in canonical form (see
//! [`crate::schema::parse`]): scalar `type`/`dependencies`/`excludes`
//! constraints are promoted to sequences, aliases are rewritten and
//! `of_<rule>` shortcuts are expanded before anything reaches the engine.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::handlers::{Checker, Coercer, DefaultSetter};
use crate::value::{FieldName, Value};

/// A nested rule set, inline or referencing the rules-set registry.
#[derive(Debug, Clone, PartialEq)]
pub enum RulesRef {
    /// Inline definition.
    Inline(RulesSet),
    /// Registry reference, resolved lazily.
    Ref(String),
}

/// A nested schema, inline or referencing the schema registry.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaRef {
    /// Inline definition.
    Inline(Schema),
    /// Registry reference, resolved lazily.
    Ref(String),
}

/// The two forms of the `schema` rule.
#[derive(Debug, Clone, PartialEq)]
pub enum SubSchema {
    /// Mapping form: the value is a mapping validated against a schema.
    Mapping(SchemaRef),
    /// Sequence form: one rule set applied to every element.
    Sequence(RulesRef),
}

/// The payload of one rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Plain data: booleans, bounds, allowed lists, dependency specs.
    Value(Value),
    /// A nested rule set (`keysrules`, `valuesrules`, rule-set form of
    /// `allow_unknown`).
    Rules(RulesRef),
    /// A list of rule sets (`items` and the logical combinators).
    RulesList(Vec<RulesRef>),
    /// The `schema` rule in either of its forms.
    SubSchema(SubSchema),
    /// A coercer chain (`coerce`, `rename_handler`).
    Coercers(Vec<Coercer>),
    /// Custom checks (`check_with`).
    Checks(Vec<Checker>),
    /// A default setter (`default_setter`).
    Setter(DefaultSetter),
}

impl Constraint {
    /// The plain value, if this is a data constraint.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Constraint::Value(v) => Some(v),
            _ => None,
        }
    }

    /// The boolean payload of a data constraint.
    pub fn as_bool(&self) -> Option<bool> {
        self.as_value().and_then(Value::as_bool)
    }
}

impl From<Value> for Constraint {
    fn from(v: Value) -> Self {
        Constraint::Value(v)
    }
}

/// The rules governing a single field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RulesSet {
    rules: IndexMap<String, Constraint>,
}

impl RulesSet {
    /// An empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a rule, replacing any previous constraint for it.
    pub fn insert(&mut self, rule: impl Into<String>, constraint: Constraint) {
        self.rules.insert(rule.into(), constraint);
    }

    /// Removes a rule.
    pub fn remove(&mut self, rule: &str) -> Option<Constraint> {
        self.rules.shift_remove(rule)
    }

    /// The constraint for a rule.
    pub fn get(&self, rule: &str) -> Option<&Constraint> {
        self.rules.get(rule)
    }

    /// `true` when the rule is declared.
    pub fn contains(&self, rule: &str) -> bool {
        self.rules.contains_key(rule)
    }

    /// The boolean constraint for a rule, `default` when undeclared.
    pub fn bool_rule(&self, rule: &str, default: bool) -> bool {
        self.get(rule).and_then(Constraint::as_bool).unwrap_or(default)
    }

    /// Iterates rules in declaration order.
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Constraint> {
        self.rules.iter()
    }

    /// Declared rule names in declaration order.
    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Number of declared rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// `true` when no rule is declared.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FromIterator<(String, Constraint)> for RulesSet {
    fn from_iter<T: IntoIterator<Item = (String, Constraint)>>(iter: T) -> Self {
        Self { rules: iter.into_iter().collect() }
    }
}

impl From<RulesSet> for RulesRef {
    fn from(rules: RulesSet) -> Self {
        RulesRef::Inline(rules)
    }
}

/// A validation schema: field names mapped to their rule sets. A field may
/// also reference a registered rules set by name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    fields: IndexMap<FieldName, RulesRef>,
}

impl Schema {
    /// An empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a field definition.
    pub fn insert(&mut self, field: impl Into<FieldName>, rules: impl Into<RulesRef>) {
        self.fields.insert(field.into(), rules.into());
    }

    /// The rule set (or reference) for a field.
    pub fn get(&self, field: &FieldName) -> Option<&RulesRef> {
        self.fields.get(field)
    }

    /// `true` when the field is declared.
    pub fn contains(&self, field: &FieldName) -> bool {
        self.fields.contains_key(field)
    }

    /// Iterates fields in declaration order.
    pub fn iter(&self) -> indexmap::map::Iter<'_, FieldName, RulesRef> {
        self.fields.iter()
    }

    /// Declared field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &FieldName> {
        self.fields.keys()
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// `true` when no field is declared.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// A stable fingerprint used to cache meta-validation results. Every
    /// nested constraint contributes; handlers hash by name or by closure
    /// identity.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        hash_schema(self, &mut hasher);
        std::hash::Hasher::finish(&hasher)
    }
}

impl FromIterator<(FieldName, RulesRef)> for Schema {
    fn from_iter<T: IntoIterator<Item = (FieldName, RulesRef)>>(iter: T) -> Self {
        Self { fields: iter.into_iter().collect() }
    }
}

fn hash_schema<H: Hasher>(schema: &Schema, hasher: &mut H) {
    for (field, rules) in &schema.fields {
        field.hash(hasher);
        hash_rules_ref(rules, hasher);
    }
}

fn hash_rules_ref<H: Hasher>(reference: &RulesRef, hasher: &mut H) {
    match reference {
        RulesRef::Ref(name) => name.hash(hasher),
        RulesRef::Inline(rules) => {
            for (rule, constraint) in rules.iter() {
                rule.hash(hasher);
                hash_constraint(constraint, hasher);
            }
        }
    }
}

fn hash_constraint<H: Hasher>(constraint: &Constraint, hasher: &mut H) {
    std::mem::discriminant(constraint).hash(hasher);
    match constraint {
        Constraint::Value(v) => v.hash(hasher),
        Constraint::Rules(reference) => hash_rules_ref(reference, hasher),
        Constraint::RulesList(list) => {
            list.len().hash(hasher);
            for reference in list {
                hash_rules_ref(reference, hasher);
            }
        }
        Constraint::SubSchema(SubSchema::Mapping(SchemaRef::Ref(name))) => name.hash(hasher),
        Constraint::SubSchema(SubSchema::Mapping(SchemaRef::Inline(schema))) => {
            hash_schema(schema, hasher)
        }
        Constraint::SubSchema(SubSchema::Sequence(reference)) => hash_rules_ref(reference, hasher),
        Constraint::Coercers(chain) => {
            for coercer in chain {
                match coercer {
                    Coercer::Named(name) => name.hash(hasher),
                    Coercer::Fn(f) => (Arc::as_ptr(f) as *const () as usize).hash(hasher),
                }
            }
        }
        Constraint::Checks(checks) => {
            for check in checks {
                match check {
                    Checker::Named(name) => name.hash(hasher),
                    Checker::Fn(f) => (Arc::as_ptr(f) as *const () as usize).hash(hasher),
                }
            }
        }
        Constraint::Setter(DefaultSetter::Named(name)) => name.hash(hasher),
        Constraint::Setter(DefaultSetter::Fn(f)) => {
            (Arc::as_ptr(f) as *const () as usize).hash(hasher)
        }
    }
}
