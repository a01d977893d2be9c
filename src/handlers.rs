//! Extension points: coercers, checkers, default setters.
//!
//! Handlers appear in rule constraints either as names (resolved against
//! the validator's registered handlers, or the builtin coercer catalog) or
//! as shared closures. All handlers are synchronous and return `Result`;
//! failures become field errors, they never abort an invocation.

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use crate::value::{Map, Value};

/// A value-transforming function used by `coerce` and `rename_handler`.
pub type CoerceFn = Arc<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

/// A custom check: receives the field name, the value and an error sink
/// accepting `(field, message)` pairs.
pub type CheckFn = Arc<dyn Fn(&Value, &Value, &mut dyn FnMut(Value, String)) + Send + Sync>;

/// A default producer receiving the partially built sibling mapping.
/// An `Err(reason)` marks failure; returning `Err` with the sentinel
/// [`SETTER_RETRY`] asks to be re-run after other setters have filled in
/// their fields.
pub type SetterFn = Arc<dyn Fn(&Map) -> Result<Value, String> + Send + Sync>;

/// Sentinel failure reason a default setter returns when a sibling it
/// depends on is not available yet.
pub const SETTER_RETRY: &str = "\u{0}retry";

macro_rules! handler_ref {
    ($(#[$doc:meta])* $name:ident, $fn_type:ty) => {
        $(#[$doc])*
        #[derive(Clone)]
        pub enum $name {
            /// A registered handler, by name.
            Named(String),
            /// An inline closure.
            Fn($fn_type),
        }

        impl $name {
            /// Reference a registered handler by name.
            pub fn named(name: impl Into<String>) -> Self {
                Self::Named(name.into())
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                match (self, other) {
                    (Self::Named(a), Self::Named(b)) => a == b,
                    (Self::Fn(a), Self::Fn(b)) => Arc::ptr_eq(a, b),
                    _ => false,
                }
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    Self::Named(name) => write!(f, "{}({:?})", stringify!($name), name),
                    Self::Fn(_) => write!(f, "{}(<fn>)", stringify!($name)),
                }
            }
        }
    };
}

handler_ref!(
    /// A reference to a coercer (or rename handler).
    Coercer,
    CoerceFn
);
handler_ref!(
    /// A reference to a `check_with` handler.
    Checker,
    CheckFn
);
handler_ref!(
    /// A reference to a default setter.
    DefaultSetter,
    SetterFn
);

/// The handlers registered on one validator, keyed by name.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    coercers: indexmap::IndexMap<String, CoerceFn>,
    checkers: indexmap::IndexMap<String, CheckFn>,
    setters: indexmap::IndexMap<String, SetterFn>,
}

impl HandlerRegistry {
    /// Registers a named coercer (also usable as a rename handler).
    pub fn add_coercer(&mut self, name: impl Into<String>, f: CoerceFn) {
        self.coercers.insert(name.into(), f);
    }

    /// Registers a named `check_with` handler.
    pub fn add_checker(&mut self, name: impl Into<String>, f: CheckFn) {
        self.checkers.insert(name.into(), f);
    }

    /// Registers a named default setter.
    pub fn add_setter(&mut self, name: impl Into<String>, f: SetterFn) {
        self.setters.insert(name.into(), f);
    }

    /// Resolves a coercer name, falling back to the builtin catalog.
    pub fn coercer(&self, name: &str) -> Option<CoerceFn> {
        self.coercers.get(name).cloned().or_else(|| builtin_coercer(name))
    }

    /// Resolves a checker name.
    pub fn checker(&self, name: &str) -> Option<CheckFn> {
        self.checkers.get(name).cloned()
    }

    /// Resolves a setter name.
    pub fn setter(&self, name: &str) -> Option<SetterFn> {
        self.setters.get(name).cloned()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("coercers", &self.coercers.keys().collect::<Vec<_>>())
            .field("checkers", &self.checkers.keys().collect::<Vec<_>>())
            .field("setters", &self.setters.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The builtin named coercers.
pub fn builtin_coercer(name: &str) -> Option<CoerceFn> {
    Some(match name {
        "int" => Arc::new(coerce_int),
        "float" => Arc::new(coerce_float),
        "string" => Arc::new(coerce_string),
        "boolean" => Arc::new(coerce_boolean),
        "date" => Arc::new(coerce_date),
        "datetime" => Arc::new(coerce_datetime),
        _ => return None,
    })
}

fn coerce_int(value: &Value) -> Result<Value, String> {
    match value {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(f) => Ok(Value::Int(*f as i64)),
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| format!("invalid integer '{}': {}", s, e)),
        other => Err(format!("cannot coerce {} to integer", other.type_name())),
    }
}

fn coerce_float(value: &Value) -> Result<Value, String> {
    match value {
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| format!("invalid float '{}': {}", s, e)),
        other => Err(format!("cannot coerce {} to float", other.type_name())),
    }
}

fn coerce_string(value: &Value) -> Result<Value, String> {
    match value {
        Value::String(s) => Ok(Value::String(s.clone())),
        Value::Int(i) => Ok(Value::String(i.to_string())),
        Value::Float(f) => Ok(Value::String(f.to_string())),
        Value::Bool(b) => Ok(Value::String(b.to_string())),
        Value::Date(d) => Ok(Value::String(d.to_string())),
        Value::DateTime(d) => Ok(Value::String(d.to_string())),
        other => Err(format!("cannot coerce {} to string", other.type_name())),
    }
}

fn coerce_boolean(value: &Value) -> Result<Value, String> {
    match value {
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::Int(0) => Ok(Value::Bool(false)),
        Value::Int(1) => Ok(Value::Bool(true)),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
            "false" | "0" | "no" | "off" => Ok(Value::Bool(false)),
            _ => Err(format!("invalid boolean '{}'", s)),
        },
        other => Err(format!("cannot coerce {} to boolean", other)),
    }
}

fn coerce_date(value: &Value) -> Result<Value, String> {
    match value {
        Value::Date(d) => Ok(Value::Date(*d)),
        Value::DateTime(d) => Ok(Value::Date(d.date())),
        Value::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|e| format!("invalid date '{}': {}", s, e)),
        other => Err(format!("cannot coerce {} to date", other.type_name())),
    }
}

fn coerce_datetime(value: &Value) -> Result<Value, String> {
    match value {
        Value::DateTime(d) => Ok(Value::DateTime(*d)),
        Value::Date(d) => d
            .and_hms_opt(0, 0, 0)
            .map(Value::DateTime)
            .ok_or_else(|| "invalid date".to_string()),
        Value::String(s) => {
            let s = s.trim();
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
                .map(Value::DateTime)
                .map_err(|e| format!("invalid datetime '{}': {}", s, e))
        }
        other => Err(format!("cannot coerce {} to datetime", other.type_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_coercer_parses_strings() {
        let f = builtin_coercer("int").unwrap();
        assert_eq!(f(&Value::from("1")).unwrap(), Value::Int(1));
        assert_eq!(f(&Value::from(" 42 ")).unwrap(), Value::Int(42));
        assert!(f(&Value::from("one")).is_err());
    }

    #[test]
    fn test_int_coercer_truncates_floats() {
        let f = builtin_coercer("int").unwrap();
        assert_eq!(f(&Value::Float(1.9)).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_boolean_coercer() {
        let f = builtin_coercer("boolean").unwrap();
        assert_eq!(f(&Value::from("Yes")).unwrap(), Value::Bool(true));
        assert_eq!(f(&Value::Int(0)).unwrap(), Value::Bool(false));
        assert!(f(&Value::Int(2)).is_err());
    }

    #[test]
    fn test_date_coercer_parses_iso() {
        let f = builtin_coercer("date").unwrap();
        let d = f(&Value::from("2021-03-04")).unwrap();
        assert_eq!(d, Value::Date(NaiveDate::from_ymd_opt(2021, 3, 4).unwrap()));
    }

    #[test]
    fn test_datetime_coercer_accepts_both_separators() {
        let f = builtin_coercer("datetime").unwrap();
        assert!(f(&Value::from("2021-03-04T05:06:07")).is_ok());
        assert!(f(&Value::from("2021-03-04 05:06:07")).is_ok());
        assert!(f(&Value::from("2021-03-04")).is_err());
    }

    #[test]
    fn test_registered_handler_shadows_builtin() {
        let mut registry = HandlerRegistry::default();
        registry.add_coercer("int", Arc::new(|_: &Value| Ok(Value::Int(7))));
        let f = registry.coercer("int").unwrap();
        assert_eq!(f(&Value::from("1")).unwrap(), Value::Int(7));
    }

    #[test]
    fn test_handler_ref_equality() {
        assert_eq!(Coercer::named("int"), Coercer::named("int"));
        assert_ne!(Coercer::named("int"), Coercer::named("float"));
        let f: CoerceFn = Arc::new(|v: &Value| Ok(v.clone()));
        assert_eq!(Coercer::Fn(f.clone()), Coercer::Fn(f.clone()));
    }
}
