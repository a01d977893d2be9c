//! Named registries for reusable schemas and rule sets.
//!
//! A string in a position where a schema or rule set is expected refers to
//! a registry entry. Resolution is lazy, so entries may reference each
//! other cyclically; an unresolved name is a schema error. Registry
//! mutation flushes the cache of meta-validated schemas.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock, RwLock};

use indexmap::IndexMap;

use crate::errors::SchemaError;

use super::ruleset::{RulesRef, RulesSet, Schema, SchemaRef};

/// A named collection of reusable definitions.
#[derive(Debug, Clone, Default)]
pub struct Registry<T> {
    storage: IndexMap<String, T>,
}

impl<T: Clone> Registry<T> {
    /// An empty registry.
    pub fn new() -> Self {
        Self { storage: IndexMap::new() }
    }

    /// Registers a definition, replacing an existing one silently.
    pub fn add(&mut self, name: impl Into<String>, definition: T) {
        self.storage.insert(name.into(), definition);
    }

    /// Registers several definitions at once.
    pub fn extend(&mut self, definitions: impl IntoIterator<Item = (String, T)>) {
        for (name, definition) in definitions {
            self.add(name, definition);
        }
    }

    /// Retrieves a definition.
    pub fn get(&self, name: &str) -> Option<&T> {
        self.storage.get(name)
    }

    /// Unregisters definitions by name.
    pub fn remove(&mut self, names: &[&str]) {
        for name in names {
            self.storage.shift_remove(*name);
        }
    }

    /// Purges all definitions.
    pub fn clear(&mut self) {
        self.storage.clear();
    }

    /// All registered definitions mapped to their names.
    pub fn all(&self) -> &IndexMap<String, T> {
        &self.storage
    }
}

/// The shared registry handles of a validator family: one for schemas, one
/// for rule sets, plus the cache of schemas already known to be meta-valid.
/// Child validators share the parent's handle; independent validators get
/// fresh ones unless explicitly wired to a shared pair.
#[derive(Debug, Clone, Default)]
pub struct Registries {
    schemas: Arc<RwLock<Registry<Schema>>>,
    rules: Arc<RwLock<Registry<RulesSet>>>,
    valid_cache: Arc<RwLock<HashSet<u64>>>,
}

impl Registries {
    /// A fresh, empty pair of registries.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide default pair.
    pub fn global() -> Registries {
        static GLOBAL: OnceLock<Registries> = OnceLock::new();
        GLOBAL.get_or_init(Registries::new).clone()
    }

    /// Registers a named schema. Flushes the meta-validation cache.
    pub fn add_schema(&self, name: impl Into<String>, schema: Schema) {
        self.schemas.write().unwrap().add(name, schema);
        self.flush_cache();
    }

    /// Registers a named rule set. Flushes the meta-validation cache.
    pub fn add_rules(&self, name: impl Into<String>, rules: RulesSet) {
        self.rules.write().unwrap().add(name, rules);
        self.flush_cache();
    }

    /// Removes named schemas. Flushes the meta-validation cache.
    pub fn remove_schemas(&self, names: &[&str]) {
        self.schemas.write().unwrap().remove(names);
        self.flush_cache();
    }

    /// Removes named rule sets. Flushes the meta-validation cache.
    pub fn remove_rules(&self, names: &[&str]) {
        self.rules.write().unwrap().remove(names);
        self.flush_cache();
    }

    /// Purges both registries. Flushes the meta-validation cache.
    pub fn clear(&self) {
        self.schemas.write().unwrap().clear();
        self.rules.write().unwrap().clear();
        self.flush_cache();
    }

    /// Resolves a schema reference to an owned schema.
    pub fn resolve_schema(&self, reference: &SchemaRef) -> Result<Schema, SchemaError> {
        match reference {
            SchemaRef::Inline(schema) => Ok(schema.clone()),
            SchemaRef::Ref(name) => self
                .schemas
                .read()
                .unwrap()
                .get(name)
                .cloned()
                .ok_or_else(|| SchemaError::UnresolvedReference(name.clone(), "schema")),
        }
    }

    /// Resolves a rules-set reference to an owned rule set.
    pub fn resolve_rules(&self, reference: &RulesRef) -> Result<RulesSet, SchemaError> {
        match reference {
            RulesRef::Inline(rules) => Ok(rules.clone()),
            RulesRef::Ref(name) => self
                .rules
                .read()
                .unwrap()
                .get(name)
                .cloned()
                .ok_or_else(|| SchemaError::UnresolvedReference(name.clone(), "rules-set")),
        }
    }

    /// `true` when a schema with this fingerprint already meta-validated.
    pub fn is_known_valid(&self, fingerprint: u64) -> bool {
        self.valid_cache.read().unwrap().contains(&fingerprint)
    }

    /// Records a schema fingerprint as meta-valid.
    pub fn mark_valid(&self, fingerprint: u64) {
        self.valid_cache.write().unwrap().insert(fingerprint);
    }

    fn flush_cache(&self) {
        self.valid_cache.write().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_resolve_rules() {
        let registries = Registries::new();
        registries.add_rules("id", RulesSet::new());
        let resolved = registries
            .resolve_rules(&RulesRef::Ref("id".into()))
            .unwrap();
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_unresolved_reference_is_schema_error() {
        let registries = Registries::new();
        let err = registries
            .resolve_schema(&SchemaRef::Ref("ghost".into()))
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnresolvedReference("ghost".into(), "schema")
        );
    }

    #[test]
    fn test_mutation_flushes_validation_cache() {
        let registries = Registries::new();
        registries.mark_valid(42);
        assert!(registries.is_known_valid(42));
        registries.add_rules("x", RulesSet::new());
        assert!(!registries.is_known_valid(42));
    }

    #[test]
    fn test_clones_share_storage() {
        let a = Registries::new();
        let b = a.clone();
        a.add_schema("s", Schema::new());
        assert!(b.resolve_schema(&SchemaRef::Ref("s".into())).is_ok());
    }

    #[test]
    fn test_remove() {
        let registries = Registries::new();
        registries.add_rules("x", RulesSet::new());
        registries.remove_rules(&["x"]);
        assert!(registries
            .resolve_rules(&RulesRef::Ref("x".into()))
            .is_err());
    }
}
