//! Logical Combinator Tests
//!
//! `allof` / `anyof` / `oneof` / `noneof` semantics:
//! - Speculative child validation per alternative
//! - Error reporting only for the failing outcome
//! - Typesaver `<combinator>_<rule>` expansion

use docvet::{Validator, Value};
use serde_json::json;

fn check(schema: serde_json::Value, document: serde_json::Value) -> (bool, Validator) {
    let mut v = Validator::with_schema(&Value::from(schema)).unwrap();
    let valid = v.validate(&Value::from(document)).unwrap();
    (valid, v)
}

// =============================================================================
// anyof
// =============================================================================

#[test]
fn test_anyof_passes_when_one_alternative_holds() {
    let schema = json!({
        "prop1": {"type": "number", "anyof": [
            {"min": 0, "max": 10},
            {"min": 100, "max": 110},
        ]},
    });
    assert!(check(schema.clone(), json!({"prop1": 5})).0);
    assert!(check(schema.clone(), json!({"prop1": 105})).0);
    assert!(!check(schema, json!({"prop1": 55})).0);
}

#[test]
fn test_anyof_failure_lists_child_errors() {
    let (_, v) = check(
        json!({
            "prop1": {"type": "number", "anyof": [
                {"min": 0, "max": 10},
                {"min": 100, "max": 110},
            ]},
        }),
        json!({"prop1": 55}),
    );

    let error = v.error_list().iter().next().unwrap();
    assert!(error.is_logical_error());
    assert_eq!(error.child_errors.len(), 2);

    let rendered = v.errors();
    let prop = &rendered.as_map().unwrap()[&Value::from("prop1")];
    let items = prop.as_slice().unwrap();
    assert_eq!(items[0], Value::from("no definitions validate"));
    let nested = items.last().unwrap().as_map().unwrap();
    assert!(nested.contains_key(&Value::from("anyof definition 0")));
    assert!(nested.contains_key(&Value::from("anyof definition 1")));
}

#[test]
fn test_anyof_inherits_field_type() {
    // The alternatives only constrain bounds; the type still gates them.
    let schema = json!({
        "prop1": {"type": "integer", "anyof": [{"min": 0}]},
    });
    assert!(!check(schema, json!({"prop1": "not a number"})).0);
}

#[test]
fn test_single_alternative_anyof_equals_plain_rule() {
    let plain = json!({"f": {"type": "integer", "min": 10}});
    let wrapped = json!({"f": {"type": "integer", "anyof": [{"min": 10}]}});

    for doc in [json!({"f": 15}), json!({"f": 5})] {
        let (plain_valid, _) = check(plain.clone(), doc.clone());
        let (wrapped_valid, _) = check(wrapped.clone(), doc);
        assert_eq!(plain_valid, wrapped_valid);
    }
}

// =============================================================================
// allof
// =============================================================================

#[test]
fn test_allof_requires_every_alternative() {
    let schema = json!({
        "f": {"allof": [{"min": 0}, {"max": 10}]},
    });
    assert!(check(schema.clone(), json!({"f": 5})).0);
    assert!(!check(schema.clone(), json!({"f": -1})).0);
    assert!(!check(schema, json!({"f": 11})).0);
}

#[test]
fn test_allof_equals_sequential_application() {
    let combined = json!({"f": {"allof": [{"min": 0}, {"max": 10}]}});
    let sequential = json!({"f": {"min": 0, "max": 10}});

    for doc in [json!({"f": 5}), json!({"f": -3}), json!({"f": 30})] {
        assert_eq!(
            check(combined.clone(), doc.clone()).0,
            check(sequential.clone(), doc).0
        );
    }
}

// =============================================================================
// oneof / noneof
// =============================================================================

#[test]
fn test_oneof_requires_exactly_one() {
    let schema = json!({
        "f": {"oneof": [{"min": 0}, {"min": 10}]},
    });
    // 5 satisfies only the first, 15 satisfies both, -1 satisfies neither.
    assert!(check(schema.clone(), json!({"f": 5})).0);
    assert!(!check(schema.clone(), json!({"f": 15})).0);
    assert!(!check(schema, json!({"f": -1})).0);
}

#[test]
fn test_noneof_requires_every_alternative_to_fail() {
    let schema = json!({
        "f": {"noneof": [{"type": "string"}, {"min": 100}]},
    });
    assert!(check(schema.clone(), json!({"f": 5})).0);
    assert!(!check(schema.clone(), json!({"f": "x"})).0);
    assert!(!check(schema, json!({"f": 200})).0);
}

// =============================================================================
// Composition
// =============================================================================

#[test]
fn test_alternatives_may_nest_schemas() {
    let schema = json!({
        "setting": {"anyof": [
            {"type": "boolean"},
            {"type": "dict", "schema": {"enabled": {"type": "boolean", "required": true}}},
        ]},
    });
    assert!(check(schema.clone(), json!({"setting": true})).0);
    assert!(check(schema.clone(), json!({"setting": {"enabled": false}})).0);
    assert!(!check(schema.clone(), json!({"setting": {"wrong": 1}})).0);
    assert!(!check(schema, json!({"setting": 3})).0);
}

#[test]
fn test_sibling_fields_do_not_leak_into_alternatives() {
    let schema = json!({
        "a": {"type": "integer"},
        "b": {"anyof": [{"min": 0}]},
    });
    // `a` is invalid, but that failure belongs to `a` alone; `b`'s anyof
    // still passes.
    let (valid, v) = check(schema, json!({"a": "bad", "b": 1}));
    assert!(!valid);
    assert_eq!(v.error_list().len(), 1);
    assert_eq!(
        v.errors(),
        Value::from(json!({"a": ["must be of integer type"]}))
    );
}

// =============================================================================
// Typesaver Shortcuts
// =============================================================================

#[test]
fn test_anyof_type_shortcut() {
    let schema = json!({"id": {"anyof_type": ["string", "integer"]}});
    assert!(check(schema.clone(), json!({"id": 3})).0);
    assert!(check(schema.clone(), json!({"id": "three"})).0);
    assert!(!check(schema, json!({"id": 3.5})).0);
}

#[test]
fn test_allof_regex_shortcut() {
    let schema = json!({"name": {"allof_regex": [".*john.*", ".*doe.*"]}});
    assert!(check(schema.clone(), json!({"name": "john doe"})).0);
    assert!(!check(schema, json!({"name": "john smith"})).0);
}
