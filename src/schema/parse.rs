//! Parsing plain values into the schema AST.
//!
//! Schemas are authored as value trees (commonly via `serde_json::json!`)
//! and parsed into [`Schema`]/[`RulesSet`] with canonicalization applied:
//!
//! - rule-name aliases are rewritten (with a deprecation warning),
//! - `<combinator>_<rule>` typesaver keys are expanded,
//! - scalar `type`/`dependencies`/`excludes`/`contains` constraints are
//!   promoted to sequences,
//! - the dual-form `schema` rule is disambiguated, preferring an explicit
//!   `type` hint over the structural heuristic.
//!
//! Handlers parsed from values are always named references; closures are
//! attached programmatically.

use crate::errors::SchemaError;
use crate::handlers::{Checker, Coercer, DefaultSetter};
use crate::report;
use crate::value::Value;

use super::meta::{self, ConstraintShape};
use super::ruleset::{Constraint, RulesRef, RulesSet, Schema, SchemaRef, SubSchema};

/// Parses a schema from a value tree.
pub fn parse_schema(value: &Value) -> Result<Schema, SchemaError> {
    let map = match value {
        Value::Map(map) => map,
        other => return Err(SchemaError::BadFormat(other.to_string())),
    };

    let mut schema = Schema::new();
    for (field, rules_value) in map {
        let rules = match rules_value {
            Value::Map(_) => RulesRef::Inline(parse_rules_set(rules_value, &field.to_string())?),
            Value::String(name) => RulesRef::Ref(name.clone()),
            _ => return Err(SchemaError::BadRulesSet(field.to_string())),
        };
        schema.insert(field.clone(), rules);
    }
    Ok(schema)
}

/// Parses one rule set from a value tree.
pub fn parse_rules_set(value: &Value, field: &str) -> Result<RulesSet, SchemaError> {
    let map = match value {
        Value::Map(map) => map,
        _ => return Err(SchemaError::BadRulesSet(field.to_string())),
    };

    // The `type` constraint disambiguates the dual-form `schema` rule, so
    // it is read ahead of the entry loop.
    let type_hint = map
        .get(&Value::from("type"))
        .map(|v| type_names_of(v))
        .unwrap_or_default();

    let mut rules = RulesSet::new();
    for (key, constraint_value) in map {
        let raw_name = key
            .as_str()
            .ok_or_else(|| SchemaError::BadRulesSet(field.to_string()))?
            .replace(' ', "_");
        let name = resolve_alias(&raw_name);

        if let Some((combinator, inner_rule)) = split_of_shortcut(&name) {
            let expanded = expand_of_shortcut(combinator, inner_rule, constraint_value, field)?;
            rules.insert(combinator, expanded);
            continue;
        }

        if name == "itemsrules" {
            // Accepted spelling for the sequence form of `schema`.
            if rules.contains("schema") || map.contains_key(&Value::from("schema")) {
                return Err(SchemaError::BadConstraint {
                    rule: "itemsrules".into(),
                    field: field.to_string(),
                    detail: "conflicts with a `schema` rule in the same rule set".into(),
                });
            }
            let reference = parse_rules_or_ref(constraint_value, field)?;
            rules.insert(
                "schema",
                Constraint::SubSchema(SubSchema::Sequence(reference)),
            );
            continue;
        }

        let constraint = match meta::rule_spec(&name) {
            Some(spec) => parse_constraint(&name, spec.shape, constraint_value, field, &type_hint)?,
            // Rules beyond the builtin table (validator extensions) parse
            // as plain values; meta-validation decides whether they exist.
            None => Constraint::Value(constraint_value.clone()),
        };
        rules.insert(name, constraint);
    }
    Ok(rules)
}

fn resolve_alias(name: &str) -> String {
    for &(alias, replacement) in meta::ALIASES {
        if name == alias {
            report::warn(
                "alias_deprecated",
                &[("alias", alias), ("replacement", replacement)],
            );
            return replacement.to_string();
        }
    }
    name.to_string()
}

fn split_of_shortcut(name: &str) -> Option<(&'static str, &str)> {
    for combinator in ["allof", "anyof", "noneof", "oneof"] {
        if let Some(rest) = name.strip_prefix(combinator) {
            if let Some(inner) = rest.strip_prefix('_') {
                if !inner.is_empty() {
                    return Some((combinator, inner));
                }
            }
        }
    }
    None
}

fn expand_of_shortcut(
    combinator: &str,
    inner_rule: &str,
    value: &Value,
    field: &str,
) -> Result<Constraint, SchemaError> {
    let values = value
        .as_slice()
        .ok_or_else(|| SchemaError::BadConstraint {
            rule: format!("{}_{}", combinator, inner_rule),
            field: field.to_string(),
            detail: "expected a sequence of constraints".into(),
        })?;

    let inner_rule = resolve_alias(inner_rule);
    let spec = meta::rule_spec(&inner_rule).ok_or_else(|| SchemaError::UnknownRule {
        rule: inner_rule.clone(),
        field: field.to_string(),
    })?;

    let mut alternatives = Vec::with_capacity(values.len());
    for v in values {
        let constraint = parse_constraint(&inner_rule, spec.shape, v, field, &[])?;
        let mut rules = RulesSet::new();
        rules.insert(inner_rule.clone(), constraint);
        alternatives.push(RulesRef::Inline(rules));
    }
    Ok(Constraint::RulesList(alternatives))
}

fn parse_constraint(
    rule: &str,
    shape: ConstraintShape,
    value: &Value,
    field: &str,
    type_hint: &[String],
) -> Result<Constraint, SchemaError> {
    let bad = |detail: &str| SchemaError::BadConstraint {
        rule: rule.to_string(),
        field: field.to_string(),
        detail: detail.to_string(),
    };

    Ok(match shape {
        ConstraintShape::Bool
        | ConstraintShape::Integer
        | ConstraintShape::StringLike
        | ConstraintShape::Scalar
        | ConstraintShape::Any => Constraint::Value(value.clone()),

        ConstraintShape::TypeNames => match value {
            Value::String(name) => {
                Constraint::Value(Value::Seq(vec![Value::String(name.clone())]))
            }
            Value::Seq(_) | Value::Tuple(_) => {
                Constraint::Value(Value::Seq(value.as_slice().unwrap().to_vec()))
            }
            _ => return Err(bad("expected a type name or a sequence of them")),
        },

        ConstraintShape::Container => match (rule, value) {
            // A scalar `contains` constraint means "contains this one".
            ("contains", v) if !v.is_container() || v.as_str().is_some() => {
                Constraint::Value(Value::Seq(vec![v.clone()]))
            }
            (_, v) if v.is_container() && v.as_str().is_none() => Constraint::Value(v.clone()),
            _ => return Err(bad("expected a non-string container")),
        },

        ConstraintShape::Dependencies => match value {
            Value::String(s) => {
                Constraint::Value(Value::Seq(vec![Value::String(s.clone())]))
            }
            Value::Seq(_) | Value::Tuple(_) => {
                Constraint::Value(Value::Seq(value.as_slice().unwrap().to_vec()))
            }
            Value::Map(map) => {
                let mut canonical = crate::value::Map::new();
                for (k, v) in map {
                    let values = match v {
                        Value::Seq(items) | Value::Tuple(items) => Value::Seq(items.clone()),
                        scalar => Value::Seq(vec![scalar.clone()]),
                    };
                    canonical.insert(k.clone(), values);
                }
                Constraint::Value(Value::Map(canonical))
            }
            _ => return Err(bad("expected field name(s) or a mapping")),
        },

        ConstraintShape::FieldList => match value {
            Value::Seq(_) | Value::Tuple(_) => {
                Constraint::Value(Value::Seq(value.as_slice().unwrap().to_vec()))
            }
            scalar => Constraint::Value(Value::Seq(vec![scalar.clone()])),
        },

        ConstraintShape::Rules => Constraint::Rules(parse_rules_or_ref(value, field)?),

        ConstraintShape::BoolOrRules => match value {
            Value::Bool(b) => Constraint::Value(Value::Bool(*b)),
            _ => Constraint::Rules(parse_rules_or_ref(value, field)?),
        },

        ConstraintShape::RulesList => {
            let elements = value
                .as_slice()
                .ok_or_else(|| bad("expected a sequence of rule sets"))?;
            let mut list = Vec::with_capacity(elements.len());
            for element in elements {
                list.push(parse_rules_or_ref(element, field)?);
            }
            Constraint::RulesList(list)
        }

        ConstraintShape::SubSchema => match value {
            Value::String(name) => {
                Constraint::SubSchema(SubSchema::Mapping(SchemaRef::Ref(name.clone())))
            }
            Value::Map(map) => {
                let sequence_hint = type_hint.iter().any(|t| {
                    matches!(t.as_str(), "list" | "tuple" | "set" | "frozenset" | "Sequence")
                });
                let mapping_hint = type_hint
                    .iter()
                    .any(|t| matches!(t.as_str(), "dict" | "Mapping"));
                let looks_like_schema =
                    !map.is_empty() && map.values().all(|v| matches!(v, Value::Map(_)));

                if sequence_hint {
                    Constraint::SubSchema(SubSchema::Sequence(parse_rules_or_ref(value, field)?))
                } else if mapping_hint || looks_like_schema || map.is_empty() {
                    Constraint::SubSchema(SubSchema::Mapping(SchemaRef::Inline(parse_schema(
                        value,
                    )?)))
                } else {
                    Constraint::SubSchema(SubSchema::Sequence(parse_rules_or_ref(value, field)?))
                }
            }
            _ => return Err(bad("expected a schema or a rule set")),
        },

        ConstraintShape::Coercers => Constraint::Coercers(parse_handler_chain(
            value,
            field,
            rule,
            Coercer::named,
        )?),

        ConstraintShape::Checks => Constraint::Checks(parse_handler_chain(
            value,
            field,
            rule,
            Checker::named,
        )?),

        ConstraintShape::Setter => match value {
            Value::String(name) => Constraint::Setter(DefaultSetter::named(name.clone())),
            _ => return Err(bad("expected a handler name")),
        },
    })
}

fn parse_rules_or_ref(value: &Value, field: &str) -> Result<RulesRef, SchemaError> {
    match value {
        Value::Map(_) => Ok(RulesRef::Inline(parse_rules_set(value, field)?)),
        Value::String(name) => Ok(RulesRef::Ref(name.clone())),
        _ => Err(SchemaError::BadRulesSet(field.to_string())),
    }
}

fn parse_handler_chain<T>(
    value: &Value,
    field: &str,
    rule: &str,
    named: impl Fn(String) -> T,
) -> Result<Vec<T>, SchemaError> {
    let bad = || SchemaError::BadConstraint {
        rule: rule.to_string(),
        field: field.to_string(),
        detail: "expected a handler name or a sequence of them".to_string(),
    };

    match value {
        Value::String(name) => Ok(vec![named(name.clone())]),
        Value::Seq(items) | Value::Tuple(items) if !items.is_empty() => items
            .iter()
            .map(|item| item.as_str().map(|s| named(s.to_string())).ok_or_else(bad))
            .collect(),
        _ => Err(bad()),
    }
}

fn type_names_of(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Seq(items) | Value::Tuple(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}
