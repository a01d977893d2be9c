//! Schema subsystem: the rules AST, named registries and meta-validation.
//!
//! # Design Principles
//!
//! - Schemas are parsed into a canonical AST before anything else sees them
//! - The rule table is the single authority on rules and constraint shapes
//! - Invalid schemas fail fast, before any document traversal
//! - Registry references resolve lazily, so cyclic schemas are legal

mod meta;
mod parse;
mod registry;
mod ruleset;

pub use meta::{
    rule_spec, rule_table, validate_rules_set, validate_schema, ConstraintShape, Phase, RuleSpec,
    ALIASES,
};
pub use parse::{parse_rules_set, parse_schema};
pub use registry::{Registries, Registry};
pub use ruleset::{Constraint, RulesRef, RulesSet, Schema, SchemaRef, SubSchema};
