//! docvet - a schema-driven validator and normalizer for document trees
//!
//! Given a schema (a mapping of field names to rule sets) and a document
//! (a tree of maps, sequences and scalars), a [`Validator`] either reports
//! a structured collection of errors or yields a normalized copy of the
//! document.
//!
//! ```
//! use docvet::{Validator, Value};
//! use serde_json::json;
//!
//! let mut validator = Validator::with_schema(&Value::from(json!({
//!     "name": {"type": "string"},
//!     "age": {"type": "integer", "min": 10},
//! }))).unwrap();
//!
//! assert!(validator
//!     .validate(&Value::from(json!({"name": "john doe", "age": 30})))
//!     .unwrap());
//! ```
//!
//! # Design Principles
//!
//! - Validation never aborts: every field's errors are collected
//! - Normalization rewrites a copy; the input document is never mutated
//! - Invalid schemas fail before any document traversal
//! - Deterministic error enumeration, rule ordering and output

pub mod errors;
pub mod handlers;
pub mod report;
pub mod schema;
pub mod types;
pub mod validator;
pub mod value;

pub use errors::{DocumentError, SchemaError};
pub use validator::{AllowUnknown, CustomRule, ProcessingError, RuleFn, Validator};
pub use value::Value;
