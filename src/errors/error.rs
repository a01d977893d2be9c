//! The structured validation error and the flat error list.

use std::cmp::Ordering;
use std::fmt;

use crate::value::Value;

use super::codes::{self, ErrorDefinition};

/// A path into a document or schema: field names, indices and rule names,
/// all represented as values.
pub type ErrorPath = Vec<Value>;

/// One validation failure, located in both the document and the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Keys and indices leading to the offending value.
    pub document_path: ErrorPath,
    /// Keys and rule names leading to the violated rule.
    pub schema_path: ErrorPath,
    /// Error code; see [`crate::errors::codes`] for the reserved bits.
    pub code: u16,
    /// Name of the violated rule, if the error belongs to one.
    pub rule: Option<&'static str>,
    /// The rule's constraint value, if any.
    pub constraint: Option<Value>,
    /// The offending value, if any.
    pub value: Option<Value>,
    /// Auxiliary payload referenced by message templates.
    pub info: Vec<Value>,
    /// Errors of child validators, for group errors.
    pub child_errors: Vec<ValidationError>,
}

impl ValidationError {
    /// Builds an error from its definition and location.
    pub fn new(
        document_path: ErrorPath,
        schema_path: ErrorPath,
        definition: ErrorDefinition,
        constraint: Option<Value>,
        value: Option<Value>,
        info: Vec<Value>,
    ) -> Self {
        Self {
            document_path,
            schema_path,
            code: definition.code,
            rule: definition.rule,
            constraint,
            value,
            info,
            child_errors: Vec::new(),
        }
    }

    /// The field this error is attached to: the last document path segment.
    pub fn field(&self) -> Option<&Value> {
        self.document_path.last()
    }

    /// `true` when this error aggregates child-validator errors.
    pub fn is_group_error(&self) -> bool {
        self.code & codes::GROUP_MASK != 0
    }

    /// `true` when the error was emitted during normalization.
    pub fn is_normalization_error(&self) -> bool {
        self.code & codes::NORMALIZATION_MASK == codes::NORMALIZATION_MASK
    }

    /// `true` when the error was emitted by an `*of`-rule.
    pub fn is_logical_error(&self) -> bool {
        self.code & codes::LOGICAL_MASK == codes::LOGICAL_MASK
    }

    /// `true` when the definition matches this error's code and rule.
    pub fn is(&self, definition: ErrorDefinition) -> bool {
        self.code == definition.code && self.rule == definition.rule
    }

    /// Deterministic ordering for stable error enumeration:
    /// document path, then schema path, then code.
    pub fn sort_cmp(&self, other: &ValidationError) -> Ordering {
        path_cmp(&self.document_path, &other.document_path)
            .then_with(|| path_cmp(&self.schema_path, &other.schema_path))
            .then_with(|| self.code.cmp(&other.code))
    }
}

fn path_cmp(a: &[Value], b: &[Value]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match x.total_cmp(y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error 0x{:02x} at {}",
            self.code,
            self.document_path
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(".")
        )?;
        if let Some(rule) = self.rule {
            write!(f, " (rule '{}')", rule)?;
        }
        Ok(())
    }
}

/// The flat error stash of one validator invocation, in insertion order
/// until [`ErrorList::sort`] fixes the final deterministic order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorList {
    errors: Vec<ValidationError>,
}

impl ErrorList {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an error.
    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Appends several errors.
    pub fn extend(&mut self, errors: impl IntoIterator<Item = ValidationError>) {
        self.errors.extend(errors);
    }

    /// Sorts into the deterministic enumeration order.
    pub fn sort(&mut self) {
        self.errors.sort_by(ValidationError::sort_cmp);
    }

    /// Number of errors.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// `true` when no error was recorded.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Iterates the errors.
    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.errors.iter()
    }

    /// Removes all errors.
    pub fn clear(&mut self) {
        self.errors.clear();
    }

    /// `true` when any recorded error matches the definition, searching
    /// group errors recursively.
    pub fn contains_definition(&self, definition: ErrorDefinition) -> bool {
        fn walk(errors: &[ValidationError], definition: ErrorDefinition) -> bool {
            errors
                .iter()
                .any(|e| e.is(definition) || walk(&e.child_errors, definition))
        }
        walk(&self.errors, definition)
    }
}

impl IntoIterator for ErrorList {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::codes;

    fn error_at(path: &[&str], definition: ErrorDefinition) -> ValidationError {
        ValidationError::new(
            path.iter().map(|p| Value::from(*p)).collect(),
            vec![],
            definition,
            None,
            None,
            vec![],
        )
    }

    #[test]
    fn test_sort_orders_by_document_path() {
        let mut list = ErrorList::new();
        list.push(error_at(&["b"], codes::BAD_TYPE));
        list.push(error_at(&["a"], codes::REQUIRED_FIELD));
        list.sort();
        let fields: Vec<_> = list.iter().map(|e| e.field().cloned().unwrap()).collect();
        assert_eq!(fields, vec![Value::from("a"), Value::from("b")]);
    }

    #[test]
    fn test_contains_definition_descends_into_groups() {
        let mut group = error_at(&["outer"], codes::MAPPING_SCHEMA);
        group
            .child_errors
            .push(error_at(&["outer", "inner"], codes::MIN_VALUE));
        let mut list = ErrorList::new();
        list.push(group);
        assert!(list.contains_definition(codes::MIN_VALUE));
        assert!(!list.contains_definition(codes::MAX_VALUE));
    }

    #[test]
    fn test_field_is_last_path_segment() {
        let e = error_at(&["a", "b"], codes::BAD_TYPE);
        assert_eq!(e.field(), Some(&Value::from("b")));
    }
}
