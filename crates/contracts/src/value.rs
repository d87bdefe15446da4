//! Value - host payload model
//!
//! Instrumentation hands over arbitrary request/response payloads. They are
//! modelled as a tagged value whose containers are shared (`Arc`), so a payload
//! may reference the same node from several places, or from itself. Container
//! identity (`ptr_eq` / `id`) is what cycle detection keys on.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

/// Arbitrary host value
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent value. Omitted when it is an object property.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    BigInt(i128),
    String(String),
    /// `None` is a date that failed to parse
    Date(Option<DateTime<Utc>>),
    /// Function reference, optionally named
    Function(Option<String>),
    /// Symbol, optionally described
    Symbol(Option<String>),
    Array(Array),
    Object(Object),
}

impl Value {
    /// Build an object value from key/value pairs
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(entries.into_iter().collect())
    }

    /// Build an array value
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(items.into_iter().collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Value::Function(_))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(Some(d))
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Value::Array(a)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Shared, ordered list of values
#[derive(Clone, Default)]
pub struct Array(Arc<RwLock<Vec<Value>>>);

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, value: Value) {
        write(&self.0).push(value);
    }

    pub fn len(&self) -> usize {
        read(&self.0).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.0).is_empty()
    }

    /// Clone the current items out of the lock.
    ///
    /// Nested containers are cloned by handle, so this is shallow.
    pub fn snapshot(&self) -> Vec<Value> {
        read(&self.0).clone()
    }

    /// Identity of the underlying allocation
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &Array) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl FromIterator<Value> for Array {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(Arc::new(RwLock::new(iter.into_iter().collect())))
    }
}

impl From<Vec<Value>> for Array {
    fn from(items: Vec<Value>) -> Self {
        Self(Arc::new(RwLock::new(items)))
    }
}

// Never recurse: a container may contain itself.
impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("id", &format_args!("{:#x}", self.id()))
            .field("len", &self.len())
            .finish()
    }
}

/// Shared object with insertion-ordered properties
#[derive(Clone, Default)]
pub struct Object(Arc<RwLock<Vec<(String, Value)>>>);

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a property, keeping the original position on replace
    pub fn insert(&self, key: impl Into<String>, value: Value) {
        let key = key.into();
        let mut entries = write(&self.0);
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        read(&self.0)
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut entries = write(&self.0);
        let idx = entries.iter().position(|(k, _)| k == key)?;
        Some(entries.remove(idx).1)
    }

    pub fn len(&self) -> usize {
        read(&self.0).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.0).is_empty()
    }

    /// Clone the current properties out of the lock (shallow)
    pub fn entries(&self) -> Vec<(String, Value)> {
        read(&self.0).clone()
    }

    /// Identity of the underlying allocation
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Object {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let object = Object::new();
        for (k, v) in iter {
            object.insert(k, v);
        }
        object
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = read(&self.0).iter().map(|(k, _)| k.clone()).collect();
        f.debug_struct("Object")
            .field("id", &format_args!("{:#x}", self.id()))
            .field("keys", &keys)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_insert_replaces_in_place() {
        let obj = Object::new();
        obj.insert("a", Value::from(1i64));
        obj.insert("b", Value::from(2i64));
        obj.insert("a", Value::from(3i64));

        let entries = obj.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "a");
        assert!(matches!(entries[0].1, Value::Integer(3)));
    }

    #[test]
    fn test_clone_shares_identity() {
        let obj = Object::new();
        let alias = obj.clone();
        alias.insert("k", Value::from("v"));

        assert!(obj.ptr_eq(&alias));
        assert_eq!(obj.get("k").and_then(|v| v.as_str().map(String::from)), Some("v".into()));
    }

    #[test]
    fn test_self_reference_debug_terminates() {
        let obj = Object::new();
        obj.insert("self", Value::Object(obj.clone()));

        let rendered = format!("{:?}", Value::Object(obj));
        assert!(rendered.contains("self"));
    }

    #[test]
    fn test_from_json_preserves_shape() {
        let json = serde_json::json!({"a": [1, 2.5, "x"], "b": null});
        let value = Value::from(json);

        let Value::Object(obj) = value else {
            panic!("expected object");
        };
        let Some(Value::Array(items)) = obj.get("a") else {
            panic!("expected array");
        };
        let items = items.snapshot();
        assert!(matches!(items[0], Value::Integer(1)));
        assert!(matches!(items[1], Value::Number(n) if n == 2.5));
        assert!(matches!(obj.get("b"), Some(Value::Null)));
    }
}
