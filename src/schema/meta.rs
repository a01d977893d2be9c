//! The schema-of-schemas: the rule table and the meta-validator.
//!
//! The rule table is the single authority for which rules exist, in which
//! phase they run and what shape their constraints may take. Parsing uses
//! it to canonicalize constraints; the meta-validator uses it to reject
//! invalid schemas before any document is touched. Extensions register
//! additional entries per validator.

use std::sync::OnceLock;

use indexmap::IndexMap;

use crate::errors::SchemaError;
use crate::types::TypeRegistry;
use crate::value::Value;

use super::registry::Registries;
use super::ruleset::{Constraint, RulesRef, RulesSet, Schema, SchemaRef, SubSchema};

/// When a rule runs relative to the others of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Runs before all normal rules, in ascending order of the index.
    Priority(u8),
    /// Runs in declaration order after the priority rules.
    Normal,
    /// Evaluated by the normalization engine, never dispatched during
    /// validation.
    Normalization,
    /// Evaluated outside the per-field queue (level-wide policy rules).
    Structural,
}

/// The accepted shape of a rule's constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintShape {
    /// A boolean.
    Bool,
    /// An integer.
    Integer,
    /// A string.
    StringLike,
    /// Any single comparable value.
    Scalar,
    /// A type name or a sequence of type names.
    TypeNames,
    /// A non-string container of values.
    Container,
    /// Field name(s), or a mapping of field name to accepted value(s).
    Dependencies,
    /// Field name(s).
    FieldList,
    /// A rule set or a rules-set registry reference.
    Rules,
    /// A boolean, a rule set, or a rules-set registry reference.
    BoolOrRules,
    /// A sequence of rule sets (or rules-set references).
    RulesList,
    /// A schema (mapping form), a rule set (sequence form) or a schema
    /// registry reference.
    SubSchema,
    /// A coercer chain.
    Coercers,
    /// One or more `check_with` handlers.
    Checks,
    /// A default setter.
    Setter,
    /// Arbitrary data, not interpreted.
    Any,
}

/// One entry of the rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleSpec {
    /// Evaluation phase.
    pub phase: Phase,
    /// Accepted constraint shape.
    pub shape: ConstraintShape,
}

/// Rule-name aliases kept for migration. Using one behaves identically to
/// the replacement and emits a deprecation warning.
pub const ALIASES: &[(&str, &str)] = &[
    ("keyschema", "keysrules"),
    ("propertyschema", "keysrules"),
    ("valueschema", "valuesrules"),
    ("validator", "check_with"),
];

/// The builtin rule table. Immutable; per-validator extensions are layered
/// on top by the validator itself.
pub fn rule_table() -> &'static IndexMap<&'static str, RuleSpec> {
    static TABLE: OnceLock<IndexMap<&'static str, RuleSpec>> = OnceLock::new();
    TABLE.get_or_init(|| {
        use ConstraintShape::*;
        use Phase::*;

        let mut table = IndexMap::new();
        let mut add = |name, phase, shape| {
            table.insert(name, RuleSpec { phase, shape });
        };

        // Priority rules, in their fixed evaluation order.
        add("readonly", Priority(0), Bool);
        add("nullable", Priority(1), Bool);
        add("type", Priority(2), TypeNames);
        add("empty", Priority(3), Bool);

        // Normal validation rules.
        add("min", Normal, Scalar);
        add("max", Normal, Scalar);
        add("minlength", Normal, Integer);
        add("maxlength", Normal, Integer);
        add("allowed", Normal, Container);
        add("forbidden", Normal, Container);
        add("contains", Normal, Container);
        add("regex", Normal, StringLike);
        add("dependencies", Normal, Dependencies);
        add("excludes", Normal, FieldList);
        add("items", Normal, RulesList);
        add("schema", Normal, SubSchema);
        add("keysrules", Normal, Rules);
        add("valuesrules", Normal, Rules);
        add("allof", Normal, RulesList);
        add("anyof", Normal, RulesList);
        add("noneof", Normal, RulesList);
        add("oneof", Normal, RulesList);
        add("check_with", Normal, Checks);

        // Level-wide policy rules.
        add("required", Structural, Bool);
        add("require_all", Structural, Bool);
        add("allow_unknown", Structural, BoolOrRules);
        add("purge_unknown", Structural, Bool);
        add("meta", Structural, Any);

        // Normalization rules.
        add("rename", Normalization, Scalar);
        add("rename_handler", Normalization, Coercers);
        add("default", Normalization, Any);
        add("default_setter", Normalization, Setter);
        add("coerce", Normalization, Coercers);

        table
    })
}

/// Looks up a rule in the builtin table.
pub fn rule_spec(rule: &str) -> Option<&'static RuleSpec> {
    rule_table().get(rule)
}

/// Meta-validates a schema against the rule table: every rule must exist,
/// every constraint must have the accepted shape, every type name must be
/// registered and every registry reference must resolve. Named references
/// already being checked are skipped, so cyclic schemas terminate.
pub fn validate_schema(
    schema: &Schema,
    registries: &Registries,
    types: &TypeRegistry,
    extra_rules: &IndexMap<String, RuleSpec>,
) -> Result<(), SchemaError> {
    if registries.is_known_valid(schema.fingerprint()) {
        return Ok(());
    }

    let mut walker = MetaWalker {
        registries,
        types,
        extra_rules,
        seen_rules: Vec::new(),
        seen_schemas: Vec::new(),
    };
    walker.check_schema(schema)?;

    registries.mark_valid(schema.fingerprint());
    Ok(())
}

/// Meta-validates a standalone rule set (e.g. an `allow_unknown`
/// configuration).
pub fn validate_rules_set(
    rules: &RulesSet,
    registries: &Registries,
    types: &TypeRegistry,
    extra_rules: &IndexMap<String, RuleSpec>,
) -> Result<(), SchemaError> {
    let mut walker = MetaWalker {
        registries,
        types,
        extra_rules,
        seen_rules: Vec::new(),
        seen_schemas: Vec::new(),
    };
    walker.check_rules_set(rules, "<allow_unknown>")
}

struct MetaWalker<'a> {
    registries: &'a Registries,
    types: &'a TypeRegistry,
    extra_rules: &'a IndexMap<String, RuleSpec>,
    seen_rules: Vec<String>,
    seen_schemas: Vec<String>,
}

impl MetaWalker<'_> {
    fn spec_for(&self, rule: &str) -> Option<RuleSpec> {
        rule_spec(rule)
            .copied()
            .or_else(|| self.extra_rules.get(rule).copied())
    }

    fn check_schema(&mut self, schema: &Schema) -> Result<(), SchemaError> {
        for (field, rules) in schema.iter() {
            let label = field.to_string();
            self.check_rules_ref(rules, &label)?;
        }
        Ok(())
    }

    fn check_schema_ref(&mut self, reference: &SchemaRef) -> Result<(), SchemaError> {
        if let SchemaRef::Ref(name) = reference {
            if self.seen_schemas.iter().any(|n| n == name) {
                return Ok(());
            }
            self.seen_schemas.push(name.clone());
        }
        let schema = self.registries.resolve_schema(reference)?;
        self.check_schema(&schema)
    }

    fn check_rules_ref(&mut self, reference: &RulesRef, field: &str) -> Result<(), SchemaError> {
        if let RulesRef::Ref(name) = reference {
            if self.seen_rules.iter().any(|n| n == name) {
                return Ok(());
            }
            self.seen_rules.push(name.clone());
        }
        let rules = self.registries.resolve_rules(reference)?;
        self.check_rules_set(&rules, field)
    }

    fn check_rules_set(&mut self, rules: &RulesSet, field: &str) -> Result<(), SchemaError> {
        for (rule, constraint) in rules.iter() {
            let spec = self.spec_for(rule).ok_or_else(|| SchemaError::UnknownRule {
                rule: rule.clone(),
                field: field.to_string(),
            })?;
            self.check_constraint(rule, spec.shape, constraint, field)?;
        }
        Ok(())
    }

    fn check_constraint(
        &mut self,
        rule: &str,
        shape: ConstraintShape,
        constraint: &Constraint,
        field: &str,
    ) -> Result<(), SchemaError> {
        let bad = |detail: &str| SchemaError::BadConstraint {
            rule: rule.to_string(),
            field: field.to_string(),
            detail: detail.to_string(),
        };

        match shape {
            ConstraintShape::Bool => match constraint {
                Constraint::Value(Value::Bool(_)) => Ok(()),
                _ => Err(bad("expected a boolean")),
            },
            ConstraintShape::Integer => match constraint {
                Constraint::Value(Value::Int(_)) => Ok(()),
                _ => Err(bad("expected an integer")),
            },
            ConstraintShape::StringLike => match constraint {
                Constraint::Value(Value::String(pattern)) => {
                    // A malformed regex is caught here instead of failing
                    // silently on every document.
                    if rule == "regex" && regex::Regex::new(pattern).is_err() {
                        return Err(bad("pattern does not compile"));
                    }
                    Ok(())
                }
                _ => Err(bad("expected a string")),
            },
            ConstraintShape::Scalar | ConstraintShape::Any => match constraint {
                Constraint::Value(_) => Ok(()),
                _ => Err(bad("expected a plain value")),
            },
            ConstraintShape::TypeNames => {
                let names = match constraint {
                    Constraint::Value(Value::Seq(names)) => names,
                    _ => return Err(bad("expected a type name or a sequence of them")),
                };
                for name in names {
                    let name = name
                        .as_str()
                        .ok_or_else(|| bad("type names must be strings"))?;
                    if !self.types.contains(name) {
                        return Err(SchemaError::UnknownType(name.to_string()));
                    }
                }
                Ok(())
            }
            ConstraintShape::Container => match constraint {
                Constraint::Value(v) if v.is_container() && !matches!(v, Value::String(_)) => {
                    Ok(())
                }
                _ => Err(bad("expected a non-string container")),
            },
            ConstraintShape::Dependencies => match constraint {
                Constraint::Value(Value::Seq(_)) | Constraint::Value(Value::Map(_)) => Ok(()),
                _ => Err(bad("expected field name(s) or a mapping of them to values")),
            },
            ConstraintShape::FieldList => match constraint {
                Constraint::Value(Value::Seq(_)) => Ok(()),
                _ => Err(bad("expected field name(s)")),
            },
            ConstraintShape::Rules => match constraint {
                Constraint::Rules(reference) => self.check_rules_ref(reference, field),
                _ => Err(bad("expected a rule set")),
            },
            ConstraintShape::BoolOrRules => match constraint {
                Constraint::Value(Value::Bool(_)) => Ok(()),
                Constraint::Rules(reference) => self.check_rules_ref(reference, field),
                _ => Err(bad("expected a boolean or a rule set")),
            },
            ConstraintShape::RulesList => match constraint {
                Constraint::RulesList(list) => {
                    for reference in list {
                        self.check_rules_ref(reference, field)?;
                    }
                    Ok(())
                }
                _ => Err(bad("expected a sequence of rule sets")),
            },
            ConstraintShape::SubSchema => match constraint {
                Constraint::SubSchema(SubSchema::Mapping(reference)) => {
                    self.check_schema_ref(reference)
                }
                Constraint::SubSchema(SubSchema::Sequence(reference)) => {
                    self.check_rules_ref(reference, field)
                }
                _ => Err(bad("expected a schema or a rule set")),
            },
            ConstraintShape::Coercers => match constraint {
                Constraint::Coercers(chain) if !chain.is_empty() => Ok(()),
                _ => Err(bad("expected a handler or a chain of handlers")),
            },
            ConstraintShape::Checks => match constraint {
                Constraint::Checks(checks) if !checks.is_empty() => Ok(()),
                _ => Err(bad("expected a handler or a sequence of handlers")),
            },
            ConstraintShape::Setter => match constraint {
                Constraint::Setter(_) => Ok(()),
                _ => Err(bad("expected a handler")),
            },
        }
    }
}
