//! Schema Meta-Validation & Registry Tests
//!
//! - Invalid schemas fail before any document traversal
//! - Rule-name aliases behave like their replacements
//! - Named registries with lazy (and cyclic) reference resolution
//! - Error codes and tree projections

use docvet::errors::codes;
use docvet::schema::{parse_rules_set, parse_schema, Registries};
use docvet::{ProcessingError, SchemaError, Validator, Value};
use serde_json::json;

// =============================================================================
// Meta-Validation
// =============================================================================

#[test]
fn test_unknown_rule_is_a_schema_error() {
    let mut v =
        Validator::with_schema(&Value::from(json!({"f": {"frobnicate": true}}))).unwrap();
    let err = v.validate(&Value::from(json!({}))).unwrap_err();
    assert!(matches!(
        err,
        ProcessingError::Schema(SchemaError::UnknownRule { .. })
    ));
}

#[test]
fn test_unknown_type_is_a_schema_error() {
    let mut v = Validator::with_schema(&Value::from(json!({"f": {"type": "elephant"}}))).unwrap();
    let err = v.validate(&Value::from(json!({}))).unwrap_err();
    assert_eq!(
        err,
        ProcessingError::Schema(SchemaError::UnknownType("elephant".into()))
    );
}

#[test]
fn test_bad_constraint_shape_is_a_schema_error() {
    let mut v =
        Validator::with_schema(&Value::from(json!({"f": {"required": "yes"}}))).unwrap();
    let err = v.validate(&Value::from(json!({}))).unwrap_err();
    assert!(matches!(
        err,
        ProcessingError::Schema(SchemaError::BadConstraint { .. })
    ));
}

#[test]
fn test_schema_error_precedes_document_traversal() {
    let mut v = Validator::with_schema(&Value::from(json!({"f": {"type": "elephant"}}))).unwrap();
    // Even a document that would be trivially valid never gets looked at.
    assert!(v.validate(&Value::from(json!({}))).is_err());
    assert!(v.error_list().is_empty());
}

#[test]
fn test_nested_schemas_are_meta_validated() {
    let mut v = Validator::with_schema(&Value::from(json!({
        "sub": {"type": "dict", "schema": {"inner": {"type": "unicorn"}}},
    })))
    .unwrap();
    assert!(v.validate(&Value::from(json!({}))).is_err());
}

#[test]
fn test_combinator_alternatives_are_meta_validated() {
    let mut v = Validator::with_schema(&Value::from(json!({
        "f": {"anyof": [{"type": "integer"}, {"no_such_rule": 1}]},
    })));
    // The bad alternative is caught at parse time already.
    assert!(v.is_err() || v.as_mut().unwrap().validate(&Value::from(json!({}))).is_err());
}

// =============================================================================
// Aliases
// =============================================================================

#[test]
fn test_valueschema_alias() {
    let mut v = Validator::with_schema(&Value::from(json!({
        "counts": {"type": "dict", "valueschema": {"type": "integer"}},
    })))
    .unwrap();
    assert!(v.validate(&Value::from(json!({"counts": {"a": 1}}))).unwrap());
    assert!(!v.validate(&Value::from(json!({"counts": {"a": "x"}}))).unwrap());
}

#[test]
fn test_keyschema_and_propertyschema_aliases() {
    for alias in ["keyschema", "propertyschema"] {
        let schema = Value::from(json!({
            "counts": {"type": "dict", alias: {"regex": "[a-z]+"}},
        }));
        let mut v = Validator::with_schema(&schema).unwrap();
        assert!(v.validate(&Value::from(json!({"counts": {"ok": 1}}))).unwrap());
        assert!(!v.validate(&Value::from(json!({"counts": {"NO": 1}}))).unwrap());
    }
}

#[test]
fn test_validator_alias_for_check_with() {
    use std::sync::Arc;

    let mut v =
        Validator::with_schema(&Value::from(json!({"f": {"validator": "positive"}}))).unwrap();
    v.register_checker(
        "positive",
        Arc::new(|field: &Value, value: &Value, emit: &mut dyn FnMut(Value, String)| {
            if !matches!(value, Value::Int(i) if *i > 0) {
                emit(field.clone(), "must be a positive number".into());
            }
        }),
    );
    assert!(v.validate(&Value::from(json!({"f": 2}))).unwrap());
    assert!(!v.validate(&Value::from(json!({"f": -2}))).unwrap());
}

// =============================================================================
// Registries
// =============================================================================

#[test]
fn test_rules_set_reference_in_field_position() {
    let registries = Registries::new();
    registries.add_rules(
        "boolean-flag",
        parse_rules_set(&Value::from(json!({"type": "boolean"})), "boolean-flag").unwrap(),
    );

    let mut v = Validator::with_schema(&Value::from(json!({"flag": "boolean-flag"}))).unwrap();
    v.set_registries(registries);
    assert!(v.validate(&Value::from(json!({"flag": true}))).unwrap());
    assert!(!v.validate(&Value::from(json!({"flag": 1}))).unwrap());
}

#[test]
fn test_unresolved_reference_is_a_schema_error() {
    let mut v = Validator::with_schema(&Value::from(json!({"flag": "no-such-rules"}))).unwrap();
    let err = v.validate(&Value::from(json!({}))).unwrap_err();
    assert!(matches!(
        err,
        ProcessingError::Schema(SchemaError::UnresolvedReference(..))
    ));
}

#[test]
fn test_schema_registry_reference() {
    let registries = Registries::new();
    registries.add_schema(
        "address",
        parse_schema(&Value::from(json!({
            "city": {"type": "string", "required": true},
        })))
        .unwrap(),
    );

    let mut v = Validator::with_schema(&Value::from(json!({
        "home": {"type": "dict", "schema": "address"},
    })))
    .unwrap();
    v.set_registries(registries);
    assert!(v
        .validate(&Value::from(json!({"home": {"city": "Brno"}})))
        .unwrap());
    assert!(!v.validate(&Value::from(json!({"home": {}}))).unwrap());
}

#[test]
fn test_cyclic_schema_reference_terminates() {
    let registries = Registries::new();
    registries.add_schema(
        "node",
        parse_schema(&Value::from(json!({
            "label": {"type": "string", "required": true},
            "child": {"type": "dict", "schema": "node"},
        })))
        .unwrap(),
    );

    let mut v = Validator::with_schema(&Value::from(json!({
        "root": {"type": "dict", "schema": "node"},
    })))
    .unwrap();
    v.set_registries(registries);

    let document = Value::from(json!({
        "root": {"label": "a", "child": {"label": "b", "child": {"label": "c"}}},
    }));
    assert!(v.validate(&document).unwrap());

    let document = Value::from(json!({
        "root": {"label": "a", "child": {"child": {"label": "c"}}},
    }));
    assert!(!v.validate(&document).unwrap());
}

#[test]
fn test_registry_update_retriggers_meta_validation() {
    let registries = Registries::new();
    registries.add_rules(
        "flag",
        parse_rules_set(&Value::from(json!({"type": "boolean"})), "flag").unwrap(),
    );

    let mut v = Validator::with_schema(&Value::from(json!({"f": "flag"}))).unwrap();
    v.set_registries(registries.clone());
    assert!(v.validate(&Value::from(json!({"f": true}))).unwrap());

    // Replacing the referenced rules changes the behavior on next use.
    registries.add_rules(
        "flag",
        parse_rules_set(&Value::from(json!({"type": "integer"})), "flag").unwrap(),
    );
    assert!(v.validate(&Value::from(json!({"f": true}))).is_ok());
    assert!(!v.validate(&Value::from(json!({"f": true}))).unwrap());
}

// =============================================================================
// Error Model
// =============================================================================

#[test]
fn test_error_codes_and_paths() {
    let mut v = Validator::with_schema(&Value::from(json!({
        "age": {"type": "integer", "min": 10},
    })))
    .unwrap();
    assert!(!v.validate(&Value::from(json!({"age": 5}))).unwrap());

    let error = v.error_list().iter().next().unwrap();
    assert_eq!(error.code, codes::MIN_VALUE.code);
    assert_eq!(error.rule, Some("min"));
    assert_eq!(error.document_path, vec![Value::from("age")]);
    assert_eq!(
        error.schema_path,
        vec![Value::from("age"), Value::from("min")]
    );
    assert_eq!(error.constraint, Some(Value::Int(10)));
    assert_eq!(error.value, Some(Value::Int(5)));
}

#[test]
fn test_document_and_schema_error_trees() {
    let mut v = Validator::with_schema(&Value::from(json!({
        "sub": {"type": "dict", "schema": {"leaf": {"type": "integer"}}},
    })))
    .unwrap();
    assert!(!v
        .validate(&Value::from(json!({"sub": {"leaf": "x"}})))
        .unwrap());

    let doc_path = [Value::from("sub"), Value::from("leaf")];
    assert!(!v.document_error_tree().errors_at(&doc_path).is_empty());

    let schema_path = [
        Value::from("sub"),
        Value::from("schema"),
        Value::from("leaf"),
        Value::from("type"),
    ];
    assert!(!v.schema_error_tree().errors_at(&schema_path).is_empty());
}

#[test]
fn test_normalization_errors_carry_the_phase_bit() {
    let mut v = Validator::with_schema(&Value::from(json!({
        "amount": {"coerce": "int"},
    })))
    .unwrap();
    assert!(!v.validate(&Value::from(json!({"amount": []}))).unwrap());
    let error = v.error_list().iter().next().unwrap();
    assert!(error.is_normalization_error());
    assert_eq!(error.code, codes::COERCION_FAILED.code);
}

#[test]
fn test_custom_rule_registration() {
    use std::sync::Arc;

    use docvet::schema::{ConstraintShape, Phase, RuleSpec};
    use docvet::CustomRule;

    let mut v = Validator::with_schema(&Value::from(json!({
        "f": {"type": "integer", "is_even": true},
    })))
    .unwrap();
    v.register_rule(
        "is_even",
        CustomRule {
            spec: RuleSpec { phase: Phase::Normal, shape: ConstraintShape::Bool },
            handler: Arc::new(|constraint, field, value, emit| {
                let wanted = matches!(
                    constraint,
                    docvet::schema::Constraint::Value(Value::Bool(true))
                );
                if wanted && !matches!(value, Value::Int(i) if i % 2 == 0) {
                    emit(field.clone(), "must be an even number".into());
                }
            }),
        },
    );

    assert!(v.validate(&Value::from(json!({"f": 4}))).unwrap());
    assert!(!v.validate(&Value::from(json!({"f": 5}))).unwrap());
    assert_eq!(
        v.errors(),
        Value::from(json!({"f": ["must be an even number"]}))
    );
}
