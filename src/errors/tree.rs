//! Path-indexed projections of the flat error list.
//!
//! The same errors can be looked up by where they occurred in the document
//! or by which part of the schema they violated.

use indexmap::IndexMap;

use crate::value::Value;

use super::error::ValidationError;

/// One node of an error tree: the errors recorded exactly here plus the
/// children keyed by the next path segment.
#[derive(Debug, Clone, Default)]
pub struct ErrorTreeNode {
    /// Errors whose path ends at this node.
    pub errors: Vec<ValidationError>,
    /// Child nodes by path segment.
    pub descendants: IndexMap<Value, ErrorTreeNode>,
}

impl ErrorTreeNode {
    fn insert(&mut self, path: &[Value], error: ValidationError) {
        match path.split_first() {
            None => self.errors.push(error),
            Some((head, rest)) => self
                .descendants
                .entry(head.clone())
                .or_default()
                .insert(rest, error),
        }
    }

    /// The node at `path`, if any error was recorded at or below it.
    pub fn node_at(&self, path: &[Value]) -> Option<&ErrorTreeNode> {
        match path.split_first() {
            None => Some(self),
            Some((head, rest)) => self.descendants.get(head)?.node_at(rest),
        }
    }

    /// The errors recorded exactly at `path`.
    pub fn errors_at(&self, path: &[Value]) -> &[ValidationError] {
        self.node_at(path).map(|n| n.errors.as_slice()).unwrap_or(&[])
    }
}

/// An error tree selecting one of the two paths carried by every error.
#[derive(Debug, Clone, Default)]
pub struct ErrorTree {
    root: ErrorTreeNode,
    by_schema_path: bool,
}

impl ErrorTree {
    /// A tree indexed by document path.
    pub fn for_document() -> Self {
        Self { root: ErrorTreeNode::default(), by_schema_path: false }
    }

    /// A tree indexed by schema path.
    pub fn for_schema() -> Self {
        Self { root: ErrorTreeNode::default(), by_schema_path: true }
    }

    /// Adds an error under its path. Group errors also surface their
    /// children at the children's own paths.
    pub fn add(&mut self, error: &ValidationError) {
        let path = if self.by_schema_path {
            error.schema_path.clone()
        } else {
            error.document_path.clone()
        };
        self.root.insert(&path, error.clone());
        if error.is_group_error() {
            for child in &error.child_errors {
                self.add(child);
            }
        }
    }

    /// Drops all recorded errors.
    pub fn clear(&mut self) {
        self.root = ErrorTreeNode::default();
    }

    /// The root node.
    pub fn root(&self) -> &ErrorTreeNode {
        &self.root
    }

    /// The subtree at `path`.
    pub fn node_at(&self, path: &[Value]) -> Option<&ErrorTreeNode> {
        self.root.node_at(path)
    }

    /// The errors recorded exactly at `path`.
    pub fn errors_at(&self, path: &[Value]) -> &[ValidationError] {
        self.root.errors_at(path)
    }
}
