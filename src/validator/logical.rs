//! The logical combinators: `allof`, `anyof`, `noneof`, `oneof`.
//!
//! Each alternative replaces the current field's rule set in a speculative
//! child validation running on a single-field schema; sibling fields pass
//! unexamined and normalization never runs inside an alternative. The
//! counted outcomes decide the combinator; the failures of the
//! alternatives are collected under the combinator's group error.

use crate::errors::{codes, ErrorDefinition, ValidationError};
use crate::schema::{Constraint, RulesRef, Schema};
use crate::value::Value;

use super::normalize::drop_schema_path_nodes;
use super::{AllowUnknown, Validator};

impl Validator {
    pub(crate) fn validate_logical(
        &mut self,
        operator: &str,
        alternatives: &[RulesRef],
        field: &Value,
    ) {
        let (valid_count, collected) = self.run_alternatives(operator, alternatives, field);
        let total = alternatives.len();

        let failed = match operator {
            "allof" => valid_count < total,
            "anyof" => valid_count < 1,
            "noneof" => valid_count > 0,
            "oneof" => valid_count != 1,
            _ => false,
        };
        if !failed {
            return;
        }

        let definition: ErrorDefinition = match operator {
            "allof" => codes::ALLOF,
            "anyof" => codes::ANYOF,
            "noneof" => codes::NONEOF,
            _ => codes::ONEOF,
        };
        self.emit_group(
            field,
            definition,
            collected,
            vec![Value::from(valid_count), Value::from(total)],
        );
    }

    fn run_alternatives(
        &mut self,
        operator: &str,
        alternatives: &[RulesRef],
        field: &Value,
    ) -> (usize, Vec<ValidationError>) {
        let parent_rules = self.resolved_rules(field).unwrap_or_default();
        let document = self
            .document
            .as_ref()
            .and_then(Value::as_map)
            .cloned()
            .unwrap_or_default();

        let mut valid_count = 0usize;
        let mut collected = Vec::new();

        for (index, reference) in alternatives.iter().enumerate() {
            let mut definition = match self.registries.resolve_rules(reference) {
                Ok(definition) => definition,
                Err(_) => continue,
            };

            // The alternative inherits the field's `type` and
            // `allow_unknown` unless it overrides them itself.
            for inherited in ["type", "allow_unknown"] {
                if !definition.contains(inherited) {
                    if let Some(constraint) = parent_rules.get(inherited) {
                        definition.insert(inherited, constraint.clone());
                    }
                }
            }
            if !definition.contains("allow_unknown") && self.allow_unknown.is_truthy() {
                let constraint = match &self.allow_unknown {
                    AllowUnknown::Rules(rules) => Constraint::Rules(rules.clone()),
                    _ => Constraint::Value(Value::Bool(true)),
                };
                definition.insert("allow_unknown", constraint);
            }

            let mut child_schema = Schema::new();
            child_schema.insert(field.clone(), RulesRef::Inline(definition));

            let mut child = self.child(
                None,
                Some(&[
                    field.clone(),
                    Value::from(operator),
                    Value::from(index),
                ]),
                child_schema,
            );
            // Sibling fields are outside the alternative's concern.
            child.allow_unknown = AllowUnknown::Yes;

            let update = self.update;
            if child.validate_child(document.clone(), update) {
                valid_count += 1;
            } else {
                let mut errors = child.take_errors();
                // Drop the duplicated field segment after (field, operator,
                // index) so the definition index stays addressable.
                drop_schema_path_nodes(&mut errors, &[self.schema_path.len() + 3]);
                collected.extend(errors);
            }
        }

        (valid_count, collected)
    }
}
