//! Type registry
//!
//! Maps type names to predicates over [`Value`]. The builtin catalog covers
//! the concrete leaf and container types plus the abstract container
//! algebra; validators may register additional names for user-defined
//! (opaque) types.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::value::Value;

/// A predicate deciding whether a value belongs to a named type.
pub type TypePredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A named type usable as a `type` rule constraint.
#[derive(Clone)]
pub struct TypeDefinition {
    name: String,
    predicate: TypePredicate,
}

impl TypeDefinition {
    /// Defines a type from a name and a predicate.
    pub fn new(name: impl Into<String>, predicate: TypePredicate) -> Self {
        Self { name: name.into(), predicate }
    }

    /// The registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tests a value against this type.
    pub fn matches(&self, value: &Value) -> bool {
        (self.predicate)(value)
    }
}

impl fmt::Debug for TypeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDefinition")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The set of type names known to a validator.
#[derive(Clone, Debug)]
pub struct TypeRegistry {
    definitions: IndexMap<String, TypeDefinition>,
}

impl TypeRegistry {
    /// A registry preloaded with the builtin catalog.
    pub fn builtin() -> Self {
        let mut registry = Self { definitions: IndexMap::new() };

        fn add(r: &mut TypeRegistry, name: &str, p: fn(&Value) -> bool) {
            r.register(TypeDefinition::new(name, Arc::new(p)));
        }

        // Concrete types. `number` spans integers and floats; booleans are
        // a distinct variant and never count as numbers.
        add(&mut registry, "boolean", |v| matches!(v, Value::Bool(_)));
        add(&mut registry, "integer", |v| matches!(v, Value::Int(_)));
        add(&mut registry, "float", |v| matches!(v, Value::Float(_)));
        add(&mut registry, "number", |v| {
            matches!(v, Value::Int(_) | Value::Float(_))
        });
        add(&mut registry, "string", |v| matches!(v, Value::String(_)));
        add(&mut registry, "bytes", |v| matches!(v, Value::Bytes(_)));
        add(&mut registry, "bytearray", |v| matches!(v, Value::Bytes(_)));
        add(&mut registry, "date", |v| matches!(v, Value::Date(_)));
        add(&mut registry, "datetime", |v| matches!(v, Value::DateTime(_)));
        add(&mut registry, "dict", |v| matches!(v, Value::Map(_)));
        add(&mut registry, "list", |v| matches!(v, Value::Seq(_)));
        add(&mut registry, "tuple", |v| matches!(v, Value::Tuple(_)));
        add(&mut registry, "set", |v| matches!(v, Value::Set(_)));
        add(&mut registry, "frozenset", |v| {
            matches!(v, Value::FrozenSet(_))
        });
        // Types with no native variant match opaque payloads by name.
        add(&mut registry, "complex", |v| {
            matches!(v, Value::Opaque { type_name, .. } if type_name == "complex")
        });
        add(&mut registry, "type", |v| {
            matches!(v, Value::Opaque { type_name, .. } if type_name == "type")
        });

        // Abstract container algebra. Sequences exclude strings.
        add(&mut registry, "Mapping", Value::is_mapping);
        add(&mut registry, "Sequence", Value::is_sequence);
        add(&mut registry, "Set", Value::is_set_like);
        add(&mut registry, "Sized", Value::is_sized);
        add(&mut registry, "Iterable", Value::is_iterable);
        add(&mut registry, "Container", Value::is_container);
        // Every representable value hashes.
        add(&mut registry, "Hashable", |_| true);

        registry
    }

    /// Registers a definition, replacing any previous one of the same name.
    pub fn register(&mut self, definition: TypeDefinition) {
        self.definitions.insert(definition.name.clone(), definition);
    }

    /// Looks up a definition by name.
    pub fn get(&self, name: &str) -> Option<&TypeDefinition> {
        // `bytesarray` is an accepted alias spelling.
        if name == "bytesarray" {
            return self.definitions.get("bytearray");
        }
        self.definitions.get(name)
    }

    /// `true` when the name denotes a known type.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All registered type names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
