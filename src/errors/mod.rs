//! Structured error model
//!
//! Document-class failures accumulate as [`ValidationError`]s in an
//! [`ErrorList`] and project into path-indexed trees; schema-class
//! failures surface as the exception-like [`SchemaError`] and
//! [`DocumentError`] before any document traversal.

pub mod codes;
mod error;
mod handler;
mod tree;

pub use codes::ErrorDefinition;
pub use error::{ErrorList, ErrorPath, ValidationError};
pub use handler::{format_message, message_template, BasicErrorHandler, ErrorHandler};
pub use tree::{ErrorTree, ErrorTreeNode};

use thiserror::Error;

/// Raised when a schema is missing, malformed or not meta-valid.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    /// No schema was provided to the validator.
    #[error("validation schema missing")]
    Missing,
    /// A schema or rules-set reference did not resolve.
    #[error("definition '{0}' not found in the {1} registry")]
    UnresolvedReference(String, &'static str),
    /// A `type` constraint names an unregistered type.
    #[error("unrecognized data-type '{0}'")]
    UnknownType(String),
    /// A rule name is not part of the rule table.
    #[error("unknown rule '{rule}' for field '{field}'")]
    UnknownRule {
        /// The unknown rule name.
        rule: String,
        /// The field whose rules set carries it.
        field: String,
    },
    /// A rule's constraint has the wrong shape.
    #[error("constraint for rule '{rule}' of field '{field}' is invalid: {detail}")]
    BadConstraint {
        /// The violated rule.
        rule: String,
        /// The field whose rules set carries it.
        field: String,
        /// What was wrong with the constraint.
        detail: String,
    },
    /// The schema value is not a mapping of fields to rule sets.
    #[error("schema definition for field '{0}' must be a mapping of rules")]
    BadRulesSet(String),
    /// The top-level schema value is not a mapping.
    #[error("'{0}' is not a schema, must be a mapping")]
    BadFormat(String),
}

/// Raised when the target document is missing or has the wrong shape.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DocumentError {
    /// No document was provided.
    #[error("document is missing")]
    Missing,
    /// The top-level document is not a mapping.
    #[error("'{0}' is not a document, must be a dict")]
    NotAMapping(String),
}
