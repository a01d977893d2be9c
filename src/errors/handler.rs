//! Error handlers: converting the flat error list into an output
//! representation.
//!
//! The default [`BasicErrorHandler`] produces a nested mapping
//! `field -> [message, ..., {nested_field -> [...]}]` with template
//! messages keyed by error code.

use crate::value::{Map, Value};

use super::error::{ErrorList, ValidationError};

/// Converts an error list into an output value.
pub trait ErrorHandler: Send + Sync {
    /// Renders all errors of one invocation.
    fn format(&self, errors: &ErrorList) -> Value;
}

/// The default handler emitting nested message lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicErrorHandler;

impl ErrorHandler for BasicErrorHandler {
    fn format(&self, errors: &ErrorList) -> Value {
        let mut tree = Map::new();
        for error in errors {
            insert(&mut tree, error);
        }
        Value::Map(tree)
    }
}

/// The message template for an error code. Placeholders: `{constraint}`,
/// `{value}`, `{field}` and positional `{0}`/`{1}` referring to the
/// error's info items.
pub fn message_template(code: u16) -> Option<&'static str> {
    Some(match code {
        0x00 => "{0}",
        0x01 => "document is missing",
        0x02 => "required field",
        0x03 => "unknown field",
        0x04 => "field '{0}' is required",
        0x05 => "depends on these values: {constraint}",
        0x06 => "{0} must not be present with '{field}'",
        0x21 => "'{0}' is not a document, must be a dict",
        0x22 => "empty values not allowed",
        0x23 => "null value not allowed",
        0x24 => "must be of {constraint} type",
        0x26 => "length of list should be {0}, it is {1}",
        0x27 => "min length is {constraint}",
        0x28 => "max length is {constraint}",
        0x41 => "value does not match regex '{constraint}'",
        0x42 => "min value is {constraint}",
        0x43 => "max value is {constraint}",
        0x44 => "unallowed value {value}",
        0x45 => "unallowed values {0}",
        0x46 => "unallowed value {value}",
        0x47 => "unallowed values {0}",
        0x48 => "missing members {0}",
        0x61 => "field '{field}' cannot be coerced: {0}",
        0x62 => "field '{field}' cannot be renamed: {0}",
        0x63 => "field is read-only",
        0x64 => "default value for '{field}' cannot be set: {0}",
        0x81 => "mapping doesn't validate subschema: {0}",
        0x82 => "one or more sequence-items don't validate: {0}",
        0x83 => "one or more keys of a mapping don't validate: {0}",
        0x84 => "one or more values in a mapping don't validate: {0}",
        0x91 => "one or more definitions validate",
        0x92 => "none or more than one rule validate",
        0x93 => "no definitions validate",
        0x94 => "one or more definitions don't validate",
        _ => return None,
    })
}

/// Formats one error through its template.
pub fn format_message(error: &ValidationError) -> String {
    let template = match message_template(error.code) {
        Some(t) => t,
        None => return format!("error 0x{:02x}", error.code),
    };

    let mut message = template.to_string();
    if let Some(constraint) = &error.constraint {
        message = message.replace("{constraint}", &template_arg(constraint));
    }
    if let Some(value) = &error.value {
        message = message.replace("{value}", &value.to_string());
    }
    if let Some(field) = error.field() {
        message = message.replace("{field}", &template_arg(field));
    }
    for (i, item) in error.info.iter().enumerate() {
        message = message.replace(&format!("{{{}}}", i), &info_arg(item));
    }
    message
}

// In constraint position strings render bare and one-element sequences
// collapse, so e.g. a canonicalized `type: ['string']` constraint reads
// "string" in messages.
fn template_arg(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Seq(items) | Value::Tuple(items) if items.len() == 1 => template_arg(&items[0]),
        other => other.to_string(),
    }
}

// Info items keep their container rendering; only bare strings lose their
// quotes (they are usually field names interpolated into quoted slots).
fn info_arg(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn insert(tree: &mut Map, error: &ValidationError) {
    if error.is_logical_error() {
        insert_logical(tree, error);
    } else if error.is_group_error() {
        for child in &error.child_errors {
            insert(tree, child);
        }
    } else if message_template(error.code).is_some() {
        insert_message(
            tree,
            &error.document_path,
            Value::String(format_message(error)),
        );
    }
}

fn insert_logical(tree: &mut Map, error: &ValidationError) {
    insert_message(
        tree,
        &error.document_path,
        Value::String(format_message(error)),
    );

    // Children are grouped by the alternative they came from; the
    // definition index sits right after the rule in their schema path.
    let index_position = error.schema_path.len();
    for child in &error.child_errors {
        let index = child
            .schema_path
            .get(index_position)
            .cloned()
            .unwrap_or(Value::Null);
        let label = Value::String(format!(
            "{} definition {}",
            error.rule.unwrap_or("logical"),
            index
        ));
        let mut labelled_path = error.document_path.clone();
        labelled_path.push(label);

        if child.is_group_error() && !child.is_logical_error() {
            for grandchild in &child.child_errors {
                let mut path = labelled_path.clone();
                path.extend(
                    grandchild
                        .document_path
                        .iter()
                        .skip(error.document_path.len())
                        .cloned(),
                );
                insert_message(tree, &path, Value::String(format_message(grandchild)));
            }
        } else if message_template(child.code).is_some() {
            insert_message(tree, &labelled_path, Value::String(format_message(child)));
        }
    }
}

// The rendered tree maps each field to a list of messages; nested fields
// live in a single trailing map element of that list.
fn insert_message(tree: &mut Map, path: &[Value], message: Value) {
    let (field, rest) = match path.split_first() {
        Some(split) => split,
        None => return,
    };

    let entry = tree
        .entry(field.clone())
        .or_insert_with(|| Value::Seq(Vec::new()));
    let items = match entry {
        Value::Seq(items) => items,
        _ => return,
    };

    if rest.is_empty() {
        // Messages come before the nested-map element, if one exists.
        let at = items
            .iter()
            .position(|x| x.is_mapping())
            .unwrap_or(items.len());
        items.insert(at, message);
        return;
    }

    if !items.last().map(Value::is_mapping).unwrap_or(false) {
        items.push(Value::Map(Map::new()));
    }
    if let Some(Value::Map(nested)) = items.last_mut() {
        insert_message(nested, rest, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::codes;

    fn basic_error(
        doc_path: &[&str],
        definition: codes::ErrorDefinition,
        constraint: Option<Value>,
    ) -> ValidationError {
        ValidationError::new(
            doc_path.iter().map(|p| Value::from(*p)).collect(),
            vec![],
            definition,
            constraint,
            None,
            vec![],
        )
    }

    #[test]
    fn test_flat_error_renders_as_message_list() {
        let mut list = ErrorList::new();
        list.push(basic_error(&["age"], codes::MIN_VALUE, Some(Value::Int(10))));
        let out = BasicErrorHandler.format(&list);
        let map = out.as_map().unwrap();
        assert_eq!(
            map[&Value::from("age")],
            Value::Seq(vec![Value::from("min value is 10")])
        );
    }

    #[test]
    fn test_type_constraint_renders_bare() {
        let mut list = ErrorList::new();
        list.push(basic_error(
            &["name"],
            codes::BAD_TYPE,
            Some(Value::Seq(vec![Value::from("string")])),
        ));
        let out = BasicErrorHandler.format(&list);
        assert_eq!(
            out.as_map().unwrap()[&Value::from("name")],
            Value::Seq(vec![Value::from("must be of string type")])
        );
    }

    #[test]
    fn test_group_error_flattens_children_into_nested_map() {
        let mut group = basic_error(&["outer"], codes::MAPPING_SCHEMA, None);
        group.child_errors.push(basic_error(
            &["outer", "inner"],
            codes::REQUIRED_FIELD,
            None,
        ));
        let mut list = ErrorList::new();
        list.push(group);

        let out = BasicErrorHandler.format(&list);
        let outer = &out.as_map().unwrap()[&Value::from("outer")];
        let nested = outer.as_slice().unwrap().last().unwrap();
        assert_eq!(
            nested.as_map().unwrap()[&Value::from("inner")],
            Value::Seq(vec![Value::from("required field")])
        );
    }

    #[test]
    fn test_logical_error_lists_definitions() {
        let mut logical = ValidationError::new(
            vec![Value::from("prop1")],
            vec![Value::from("prop1"), Value::from("anyof")],
            codes::ANYOF,
            None,
            None,
            vec![],
        );
        for i in 0..2i64 {
            logical.child_errors.push(ValidationError::new(
                vec![Value::from("prop1")],
                vec![
                    Value::from("prop1"),
                    Value::from("anyof"),
                    Value::Int(i),
                    Value::from("min"),
                ],
                codes::MIN_VALUE,
                Some(Value::Int(0)),
                None,
                vec![],
            ));
        }
        let mut list = ErrorList::new();
        list.push(logical);

        let out = BasicErrorHandler.format(&list);
        let prop = &out.as_map().unwrap()[&Value::from("prop1")];
        let items = prop.as_slice().unwrap();
        assert_eq!(items[0], Value::from("no definitions validate"));
        let nested = items.last().unwrap().as_map().unwrap();
        assert!(nested.contains_key(&Value::from("anyof definition 0")));
        assert!(nested.contains_key(&Value::from("anyof definition 1")));
    }
}
