//! Dynamic values passed into and out of coroutines.
//!
//! A [`Value`] is what a settled [`Deferred`](crate::Deferred) carries and what a
//! coroutine is resumed with. Plain containers ([`Value::List`], [`Value::Map`]) are
//! walked by the normalizer; an [`Opaque`] object never is.

use std::{any::Any, fmt, sync::Arc};

/// A resolved value.
///
/// `Map` keeps insertion order, and lookups are linear. Keyed results built by the
/// normalizer are small, and key order is observable, so a `Vec` of pairs is used
/// instead of a hash map.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// No value at all; what a coroutine is first resumed with.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Ordered sequence.
    List(Vec<Value>),
    /// Plain keyed mapping in insertion order.
    Map(Vec<(String, Value)>),
    /// Non-plain object, passed through without inspection.
    Object(Opaque),
}

impl Value {
    /// Build a [`Value::List`] from anything convertible into values.
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// Build a [`Value::Map`] from key/value pairs, keeping their order.
    ///
    /// A repeated key overwrites the earlier entry in place.
    ///
    /// ```rust
    /// use codrive::Value;
    ///
    /// let map = Value::map([("b", 1), ("a", 2), ("b", 3)]);
    /// assert_eq!(map.get("b"), Some(&Value::Int(3)));
    /// assert_eq!(map.to_string(), "[object Object]");
    /// ```
    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut map = Vec::new();
        for (key, value) in entries {
            insert_entry(&mut map, key.into(), value.into());
        }
        Value::Map(map)
    }

    /// Wrap an arbitrary Rust value as an opaque object.
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Value::Object(Opaque::new(value))
    }

    /// Truthiness in the loose sense: `undefined`, `null`, `false`, `0`, `NaN` and `""`
    /// are falsy, everything else (empty containers included) is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::List(_) | Value::Map(_) | Value::Object(_) => true,
        }
    }

    pub fn is_falsy(&self) -> bool {
        !self.is_truthy()
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Opaque> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Look up a key of a [`Value::Map`].
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Keys of a [`Value::Map`] in order; empty for anything else.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        let entries: &[(String, Value)] = match self {
            Value::Map(entries) => entries,
            _ => &[],
        };
        entries.iter().map(|(k, _)| k.as_str())
    }
}

fn insert_entry(map: &mut Vec<(String, Value)>, key: String, value: Value) {
    match map.iter_mut().find(|(k, _)| *k == key) {
        Some((_, slot)) => *slot = value,
        None => map.push((key, value)),
    }
}

/// String form used in diagnostics such as the invalid yieldable error.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) if x.is_infinite() => {
                f.write_str(if *x > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    match item {
                        Value::Undefined | Value::Null => {}
                        other => write!(f, "{other}")?,
                    }
                }
                Ok(())
            }
            Value::Map(_) => f.write_str("[object Object]"),
            Value::Object(o) => write!(f, "{o}"),
        }
    }
}

/// A shared, type-erased object.
///
/// Two `Opaque`s are equal when they point at the same allocation.
#[derive(Clone)]
pub struct Opaque {
    name: Arc<str>,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Opaque {
    /// Wrap `value`, naming it after its type (`[object Foo]`).
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        let type_name = std::any::type_name::<T>();
        let short = type_name.rsplit("::").next().unwrap_or(type_name);
        Self::named(format!("[object {short}]"), value)
    }

    /// Wrap `value` with an explicit string form.
    pub fn named<T: Any + Send + Sync>(name: impl Into<String>, value: T) -> Self {
        Opaque {
            name: Arc::from(name.into()),
            inner: Arc::new(value),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl PartialEq for Opaque {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.inner), Arc::as_ptr(&other.inner))
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Opaque").field(&self.name).finish()
    }
}

impl fmt::Display for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Undefined
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(i: $t) -> Self {
                Value::Int(i64::from(i))
            }
        })*
    };
}

from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::list(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<Opaque> for Value {
    fn from(o: Opaque) -> Self {
        Value::Object(o)
    }
}

#[cfg(feature = "json")]
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::Str(s),
            Json::Array(items) => Value::list(items),
            Json::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(feature = "json")]
impl Value {
    /// Lossy conversion to JSON: `undefined` becomes `null`, objects become their
    /// string form, and non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Undefined | Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(x) => serde_json::Number::from_f64(*x).map_or(Json::Null, Json::Number),
            Value::Str(s) => Json::String(s.clone()),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(entries) => Json::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Object(o) => Json::String(o.name().to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget;

    #[test]
    fn test_falsy_values() {
        for v in [
            Value::Undefined,
            Value::Null,
            Value::Bool(false),
            Value::Int(0),
            Value::Float(0.0),
            Value::Float(f64::NAN),
            Value::from(""),
        ] {
            assert!(v.is_falsy(), "{v:?} should be falsy");
        }
    }

    #[test]
    fn test_empty_containers_are_truthy() {
        assert!(Value::List(vec![]).is_truthy());
        assert!(Value::Map(vec![]).is_truthy());
        assert!(Value::object(Widget).is_truthy());
    }

    #[test]
    fn test_display_matches_loose_string_form() {
        assert_eq!(Value::Undefined.to_string(), "undefined");
        assert_eq!(Value::Float(1.5).to_string(), "1.5");
        assert_eq!(Value::Float(f64::INFINITY).to_string(), "Infinity");
        assert_eq!(Value::list([Value::Int(1), Value::Null, Value::from("x")]).to_string(), "1,,x");
        assert_eq!(Value::object(Widget).to_string(), "[object Widget]");
        assert_eq!(
            Value::Object(Opaque::named("<widget>", Widget)).to_string(),
            "<widget>"
        );
    }

    #[test]
    fn test_map_keeps_insertion_order() {
        let map = Value::map([("z", 1), ("a", 2)]);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["z", "a"]);
        assert_eq!(map.get("a"), Some(&Value::Int(2)));
        assert_eq!(map.get("missing"), None);
    }

    #[test]
    fn test_opaque_equality_is_identity() {
        let a = Opaque::new(Widget);
        let b = Opaque::new(Widget);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert!(a.downcast_ref::<Widget>().is_some());
        assert!(a.downcast_ref::<String>().is_none());
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json_conversion() {
        let v = Value::from(serde_json::json!({"a": [1, 2.5, null], "b": "s"}));
        assert_eq!(
            v.get("a"),
            Some(&Value::list([Value::Int(1), Value::Float(2.5), Value::Null]))
        );
        assert_eq!(v.to_json(), serde_json::json!({"a": [1, 2.5, null], "b": "s"}));
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json_objects_keep_document_order() {
        let parsed: serde_json::Value = serde_json::from_str(r#"{"zeta": 1, "alpha": 2}"#).unwrap();
        let v = Value::from(parsed.clone());
        assert_eq!(v.keys().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
        assert_eq!(v.to_json().to_string(), parsed.to_string());
    }
}
