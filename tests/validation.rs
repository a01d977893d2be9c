//! Validation Rule Tests
//!
//! Per-rule behavior of the validation engine:
//! - Type checking precedes and gates the other rules
//! - Errors accumulate, they never abort the invocation
//! - Unknown-field policy, requiredness and readonly handling
//! - Recursion into nested mappings and sequences

use docvet::{Validator, Value};
use serde_json::json;

fn validator(schema: serde_json::Value) -> Validator {
    Validator::with_schema(&Value::from(schema)).unwrap()
}

fn check(schema: serde_json::Value, document: serde_json::Value) -> (bool, Value) {
    let mut v = validator(schema);
    let valid = v.validate(&Value::from(document)).unwrap();
    (valid, v.errors())
}

// =============================================================================
// Type Checking
// =============================================================================

#[test]
fn test_type_match_passes() {
    let (valid, _) = check(
        json!({"name": {"type": "string"}}),
        json!({"name": "john doe"}),
    );
    assert!(valid);
}

#[test]
fn test_type_mismatch_reports() {
    let (valid, errors) = check(json!({"name": {"type": "string"}}), json!({"name": 3}));
    assert!(!valid);
    assert_eq!(
        errors,
        Value::from(json!({"name": ["must be of string type"]}))
    );
}

#[test]
fn test_multiple_types_match_any() {
    let schema = json!({"id": {"type": ["string", "integer"]}});
    assert!(check(schema.clone(), json!({"id": 7})).0);
    assert!(check(schema.clone(), json!({"id": "seven"})).0);
    assert!(!check(schema, json!({"id": 7.5})).0);
}

#[test]
fn test_type_failure_gates_remaining_rules() {
    // Only the type error is reported; minlength is not evaluated against
    // the integer.
    let (_, errors) = check(
        json!({"name": {"type": "string", "minlength": 10}}),
        json!({"name": 5}),
    );
    assert_eq!(
        errors,
        Value::from(json!({"name": ["must be of string type"]}))
    );
}

#[test]
fn test_number_accepts_int_and_float() {
    let schema = json!({"x": {"type": "number"}});
    assert!(check(schema.clone(), json!({"x": 1})).0);
    assert!(check(schema.clone(), json!({"x": 1.5})).0);
    assert!(!check(schema, json!({"x": true})).0);
}

// =============================================================================
// Requiredness
// =============================================================================

#[test]
fn test_missing_required_field() {
    let (valid, errors) = check(
        json!({"name": {"type": "string", "required": true}}),
        json!({}),
    );
    assert!(!valid);
    assert_eq!(errors, Value::from(json!({"name": ["required field"]})));
}

#[test]
fn test_missing_optional_field_passes() {
    let (valid, _) = check(json!({"name": {"type": "string"}}), json!({}));
    assert!(valid);
}

#[test]
fn test_require_all_makes_every_field_required() {
    let mut v = validator(json!({"a": {"type": "integer"}, "b": {"type": "integer"}}));
    v.set_require_all(true);
    assert!(!v.validate(&Value::from(json!({"a": 1}))).unwrap());
    assert_eq!(v.errors(), Value::from(json!({"b": ["required field"]})));
}

#[test]
fn test_required_reports_independently_from_dependencies() {
    // Both the missing required field and the unmet dependency of the
    // present field are reported.
    let (valid, errors) = check(
        json!({
            "a": {"required": true},
            "b": {"dependencies": "a"},
        }),
        json!({"b": 1}),
    );
    assert!(!valid);
    let map = errors.as_map().unwrap();
    assert!(map.contains_key(&Value::from("a")));
    assert!(map.contains_key(&Value::from("b")));
}

// =============================================================================
// Unknown Fields
// =============================================================================

#[test]
fn test_unknown_field_rejected_by_default() {
    let (valid, errors) = check(json!({"name": {"type": "string"}}), json!({"surprise": 1}));
    assert!(!valid);
    assert_eq!(errors, Value::from(json!({"surprise": ["unknown field"]})));
}

#[test]
fn test_allow_unknown_bool() {
    let mut v = validator(json!({"name": {"type": "string"}}));
    v.set_allow_unknown(true);
    assert!(v.validate(&Value::from(json!({"surprise": 1}))).unwrap());
}

#[test]
fn test_allow_unknown_rules_validate_unknown_values() {
    let mut v = validator(json!({"name": {"type": "string"}}));
    v.set_allow_unknown_rules(&Value::from(json!({"type": "integer"})))
        .unwrap();
    assert!(v.validate(&Value::from(json!({"surprise": 1}))).unwrap());
    assert!(!v.validate(&Value::from(json!({"surprise": "x"}))).unwrap());
}

#[test]
fn test_nested_allow_unknown_overrides_inherited() {
    let mut v = validator(json!({
        "sub": {
            "type": "dict",
            "allow_unknown": true,
            "schema": {"known": {"type": "integer"}},
        },
    }));
    // The root rejects unknowns, the sub-mapping accepts them.
    assert!(v
        .validate(&Value::from(json!({"sub": {"known": 1, "extra": "ok"}})))
        .unwrap());
    assert!(!v
        .validate(&Value::from(json!({"extra": 1, "sub": {}})))
        .unwrap());
}

// =============================================================================
// Nullable / Readonly / Empty
// =============================================================================

#[test]
fn test_null_rejected_by_default() {
    let (valid, errors) = check(json!({"f": {"type": "string"}}), json!({"f": null}));
    assert!(!valid);
    assert_eq!(errors, Value::from(json!({"f": ["null value not allowed"]})));
}

#[test]
fn test_nullable_null_passes_and_skips_type() {
    let (valid, _) = check(
        json!({"f": {"type": "string", "nullable": true}}),
        json!({"f": null}),
    );
    assert!(valid);
}

#[test]
fn test_readonly_field_rejected_when_present() {
    let (valid, errors) = check(json!({"f": {"readonly": true}}), json!({"f": 1}));
    assert!(!valid);
    assert_eq!(errors, Value::from(json!({"f": ["field is read-only"]})));
}

#[test]
fn test_empty_string_rejected_when_disallowed() {
    let (valid, errors) = check(
        json!({"f": {"type": "string", "empty": false}}),
        json!({"f": ""}),
    );
    assert!(!valid);
    assert_eq!(
        errors,
        Value::from(json!({"f": ["empty values not allowed"]}))
    );
}

#[test]
fn test_empty_value_skips_membership_and_length_rules() {
    // The empty list only reports emptiness, not minlength or allowed.
    let (_, errors) = check(
        json!({"f": {"empty": false, "minlength": 2, "allowed": [1, 2]}}),
        json!({"f": []}),
    );
    assert_eq!(
        errors,
        Value::from(json!({"f": ["empty values not allowed"]}))
    );
}

#[test]
fn test_empty_allowed_passes() {
    let (valid, _) = check(
        json!({"f": {"type": "string", "empty": true, "minlength": 2}}),
        json!({"f": ""}),
    );
    assert!(valid);
}

// =============================================================================
// Bounds
// =============================================================================

#[test]
fn test_min_max() {
    let schema = json!({"age": {"type": "integer", "min": 10, "max": 99}});
    assert!(check(schema.clone(), json!({"age": 50})).0);

    let (_, errors) = check(schema.clone(), json!({"age": 5}));
    assert_eq!(errors, Value::from(json!({"age": ["min value is 10"]})));

    let (_, errors) = check(schema, json!({"age": 120}));
    assert_eq!(errors, Value::from(json!({"age": ["max value is 99"]})));
}

#[test]
fn test_min_compares_across_int_and_float() {
    let (valid, _) = check(json!({"x": {"min": 1}}), json!({"x": 1.5}));
    assert!(valid);
    let (valid, _) = check(json!({"x": {"min": 2}}), json!({"x": 1.5}));
    assert!(!valid);
}

#[test]
fn test_incomparable_min_is_ignored() {
    let (valid, _) = check(json!({"x": {"min": 10}}), json!({"x": "abc"}));
    assert!(valid);
}

#[test]
fn test_minlength_maxlength() {
    let schema = json!({"f": {"minlength": 2, "maxlength": 3}});
    assert!(check(schema.clone(), json!({"f": "ab"})).0);
    assert!(!check(schema.clone(), json!({"f": "a"})).0);
    assert!(!check(schema.clone(), json!({"f": [1, 2, 3, 4]})).0);

    let (_, errors) = check(schema, json!({"f": "a"}));
    assert_eq!(errors, Value::from(json!({"f": ["min length is 2"]})));
}

// =============================================================================
// Membership
// =============================================================================

#[test]
fn test_allowed_scalar() {
    let schema = json!({"kind": {"allowed": ["sale", "purchase"]}});
    assert!(check(schema.clone(), json!({"kind": "sale"})).0);

    let (_, errors) = check(schema, json!({"kind": "theft"}));
    assert_eq!(
        errors,
        Value::from(json!({"kind": ["unallowed value 'theft'"]}))
    );
}

#[test]
fn test_allowed_over_iterable_checks_every_member() {
    let schema = json!({"tags": {"allowed": ["a", "b"]}});
    assert!(check(schema.clone(), json!({"tags": ["a", "b", "a"]})).0);
    assert!(!check(schema, json!({"tags": ["a", "c"]})).0);
}

#[test]
fn test_forbidden() {
    let schema = json!({"user": {"forbidden": ["root", "admin"]}});
    assert!(check(schema.clone(), json!({"user": "alice"})).0);
    assert!(!check(schema.clone(), json!({"user": "root"})).0);
    assert!(!check(schema, json!({"user": ["alice", "admin"]})).0);
}

#[test]
fn test_contains() {
    let schema = json!({"states": {"contains": ["peace", "war"]}});
    assert!(check(schema.clone(), json!({"states": ["war", "peace", "other"]})).0);

    let (valid, errors) = check(schema, json!({"states": ["peace"]}));
    assert!(!valid);
    assert_eq!(
        errors,
        Value::from(json!({"states": ["missing members ['war']"]}))
    );
}

#[test]
fn test_contains_scalar_constraint() {
    let schema = json!({"states": {"contains": "peace"}});
    assert!(check(schema.clone(), json!({"states": ["peace", "war"]})).0);
    assert!(!check(schema, json!({"states": ["war"]})).0);
}

// =============================================================================
// Regex
// =============================================================================

#[test]
fn test_regex_full_match_required() {
    let schema = json!({"email": {"regex": "[a-z]+@[a-z]+\\.[a-z]+"}});
    assert!(check(schema.clone(), json!({"email": "john@example.com"})).0);

    let (_, errors) = check(schema.clone(), json!({"email": "john@example.com extra"}));
    assert_eq!(
        errors,
        Value::from(json!({
            "email": ["value does not match regex '[a-z]+@[a-z]+\\.[a-z]+'"]
        }))
    );
    assert!(!check(schema, json!({"email": "not-an-email"})).0);
}

#[test]
fn test_regex_ignores_non_strings() {
    let (valid, _) = check(json!({"f": {"regex": "[0-9]+"}}), json!({"f": 42}));
    assert!(valid);
}

// =============================================================================
// Dependencies & Excludes
// =============================================================================

#[test]
fn test_dependency_on_presence() {
    let schema = json!({
        "crypt": {"dependencies": ["userid"]},
        "userid": {},
    });
    assert!(check(schema.clone(), json!({"crypt": "x", "userid": "u1"})).0);

    let (valid, errors) = check(schema, json!({"crypt": "x"}));
    assert!(!valid);
    assert_eq!(
        errors,
        Value::from(json!({"crypt": ["field 'userid' is required"]}))
    );
}

#[test]
fn test_dependency_on_values() {
    let schema = json!({
        "field1": {"required": false},
        "field2": {"required": true, "dependencies": {"field1": ["one", "two"]}},
    });
    assert!(check(schema.clone(), json!({"field1": "one", "field2": 7})).0);

    let (valid, _) = check(schema.clone(), json!({"field2": 7}));
    assert!(!valid);
    let (valid, _) = check(schema, json!({"field1": "three", "field2": 7}));
    assert!(!valid);
}

#[test]
fn test_dependency_with_dot_notation() {
    let schema = json!({
        "a": {"type": "dict", "schema": {"b": {"dependencies": "^sibling.flag"}}},
        "sibling": {"type": "dict", "schema": {"flag": {}}},
    });
    assert!(check(
        schema.clone(),
        json!({"a": {"b": 1}, "sibling": {"flag": true}}),
    )
    .0);
    assert!(!check(schema, json!({"a": {"b": 1}, "sibling": {}})).0);
}

#[test]
fn test_dependency_relative_to_current_level() {
    let schema = json!({
        "sub": {"type": "dict", "schema": {
            "x": {"dependencies": "y"},
            "y": {},
        }},
    });
    assert!(check(schema.clone(), json!({"sub": {"x": 1, "y": 2}})).0);
    assert!(!check(schema, json!({"sub": {"x": 1}})).0);
}

#[test]
fn test_excludes_rejects_co_presence() {
    let schema = json!({
        "this_field": {"type": "dict", "excludes": "that_field"},
        "that_field": {"type": "dict"},
    });
    assert!(check(schema.clone(), json!({"this_field": {}})).0);
    assert!(check(schema.clone(), json!({"that_field": {}})).0);
    assert!(!check(schema, json!({"this_field": {}, "that_field": {}})).0);
}

#[test]
fn test_mutually_excluded_required_fields_need_one_present() {
    let schema = json!({
        "this_field": {"type": "dict", "excludes": "that_field", "required": true},
        "that_field": {"type": "dict", "excludes": "this_field", "required": true},
    });
    // Either one alone satisfies both requirements.
    assert!(check(schema.clone(), json!({"this_field": {}})).0);
    assert!(check(schema.clone(), json!({"that_field": {}})).0);
    // Neither present: the requirement group reports.
    assert!(!check(schema, json!({})).0);
}

// =============================================================================
// Recursion
// =============================================================================

#[test]
fn test_nested_mapping_schema() {
    let schema = json!({
        "address": {"type": "dict", "schema": {
            "city": {"type": "string", "required": true},
            "zip": {"type": "string"},
        }},
    });
    assert!(check(
        schema.clone(),
        json!({"address": {"city": "NYC", "zip": "10001"}}),
    )
    .0);

    let (valid, errors) = check(schema, json!({"address": {"zip": "10001"}}));
    assert!(!valid);
    assert_eq!(
        errors,
        Value::from(json!({"address": [{"city": ["required field"]}]}))
    );
}

#[test]
fn test_sequence_schema_applies_to_every_element() {
    let schema = json!({"tags": {"type": "list", "schema": {"type": "string"}}});
    assert!(check(schema.clone(), json!({"tags": ["a", "b"]})).0);

    let (valid, errors) = check(schema, json!({"tags": ["a", 3, "b"]}));
    assert!(!valid);
    // The offending element is addressed by its index.
    let tags = &errors.as_map().unwrap()[&Value::from("tags")];
    let nested = tags.as_slice().unwrap().last().unwrap().as_map().unwrap();
    assert_eq!(
        nested[&Value::Int(1)],
        Value::from(json!(["must be of string type"]))
    );
}

#[test]
fn test_items_validates_positionally() {
    let schema = json!({"f": {"items": [{"type": "integer"}, {"type": "string"}]}});
    assert!(check(schema.clone(), json!({"f": [1, "x"]})).0);
    assert!(!check(schema.clone(), json!({"f": ["x", 1]})).0);

    let (_, errors) = check(schema, json!({"f": [1, "x", 9]}));
    assert_eq!(
        errors,
        Value::from(json!({"f": ["length of list should be 2, it is 3"]}))
    );
}

#[test]
fn test_keysrules() {
    let schema = json!({"counts": {"type": "dict", "keysrules": {"regex": "[a-z]+"}}});
    assert!(check(schema.clone(), json!({"counts": {"ab": 1, "cd": 2}})).0);
    assert!(!check(schema, json!({"counts": {"AB": 1}})).0);
}

#[test]
fn test_valuesrules() {
    let schema = json!({"counts": {"type": "dict", "valuesrules": {"type": "integer", "min": 0}}});
    assert!(check(schema.clone(), json!({"counts": {"a": 1, "b": 2}})).0);

    let (valid, errors) = check(schema, json!({"counts": {"a": -1}}));
    assert!(!valid);
    assert_eq!(
        errors,
        Value::from(json!({"counts": [{"a": ["min value is 0"]}]}))
    );
}

#[test]
fn test_deeply_nested_paths_in_error_tree() {
    let mut v = validator(json!({
        "outer": {"type": "dict", "schema": {
            "inner": {"type": "dict", "schema": {
                "leaf": {"type": "integer"},
            }},
        }},
    }));
    assert!(!v
        .validate(&Value::from(json!({"outer": {"inner": {"leaf": "x"}}})))
        .unwrap());

    let path = [
        Value::from("outer"),
        Value::from("inner"),
        Value::from("leaf"),
    ];
    assert!(!v.document_error_tree().errors_at(&path).is_empty());
}

// =============================================================================
// check_with
// =============================================================================

#[test]
fn test_check_with_named_handler() {
    use std::sync::Arc;

    let mut v = validator(json!({"f": {"check_with": "odd"}}));
    v.register_checker(
        "odd",
        Arc::new(|field: &Value, value: &Value, emit: &mut dyn FnMut(Value, String)| {
            if !matches!(value, Value::Int(i) if i % 2 == 1) {
                emit(field.clone(), "must be an odd number".to_string());
            }
        }),
    );

    assert!(v.validate(&Value::from(json!({"f": 3}))).unwrap());
    assert!(!v.validate(&Value::from(json!({"f": 4}))).unwrap());
    assert_eq!(
        v.errors(),
        Value::from(json!({"f": ["must be an odd number"]}))
    );
}
