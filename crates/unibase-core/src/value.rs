//! Backend-neutral value model
//!
//! Queries and rows carry application values as [`Value`]s. Backends never
//! see application structs directly; the type resolver registry converts
//! between a field's application-level value and its backend-native encoded
//! form, both expressed as `Value`.
//!
//! `Value` implements `Hash`/`Eq` (floats hash by bit pattern) so that query
//! descriptors stay usable as cache keys for translator output.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// A single backend-neutral scalar or collection value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	Text(String),
	Bytes(Vec<u8>),
	Uuid(Uuid),
	Timestamp(DateTime<Utc>),
	/// Homogeneous list, e.g. the right-hand side of an `IN` filter or a
	/// collection-valued column.
	List(Vec<Value>),
	/// Key/value pairs in insertion order.
	Map(Vec<(Value, Value)>),
}

impl Value {
	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	/// Variant name, used in error reasons.
	pub fn kind(&self) -> &'static str {
		match self {
			Value::Null => "null",
			Value::Bool(_) => "bool",
			Value::Int(_) => "int",
			Value::Float(_) => "float",
			Value::Text(_) => "text",
			Value::Bytes(_) => "bytes",
			Value::Uuid(_) => "uuid",
			Value::Timestamp(_) => "timestamp",
			Value::List(_) => "list",
			Value::Map(_) => "map",
		}
	}

	pub fn as_text(&self) -> Option<&str> {
		match self {
			Value::Text(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_int(&self) -> Option<i64> {
		match self {
			Value::Int(i) => Some(*i),
			_ => None,
		}
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Value::Null, Value::Null) => true,
			(Value::Bool(a), Value::Bool(b)) => a == b,
			(Value::Int(a), Value::Int(b)) => a == b,
			(Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
			(Value::Text(a), Value::Text(b)) => a == b,
			(Value::Bytes(a), Value::Bytes(b)) => a == b,
			(Value::Uuid(a), Value::Uuid(b)) => a == b,
			(Value::Timestamp(a), Value::Timestamp(b)) => a == b,
			(Value::List(a), Value::List(b)) => a == b,
			(Value::Map(a), Value::Map(b)) => a == b,
			_ => false,
		}
	}
}

impl Eq for Value {}

impl Hash for Value {
	fn hash<H: Hasher>(&self, state: &mut H) {
		std::mem::discriminant(self).hash(state);
		match self {
			Value::Null => {}
			Value::Bool(b) => b.hash(state),
			Value::Int(i) => i.hash(state),
			Value::Float(f) => f.to_bits().hash(state),
			Value::Text(s) => s.hash(state),
			Value::Bytes(b) => b.hash(state),
			Value::Uuid(u) => u.hash(state),
			Value::Timestamp(t) => t.hash(state),
			Value::List(items) => items.hash(state),
			Value::Map(pairs) => pairs.hash(state),
		}
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Null => write!(f, "NULL"),
			Value::Bool(b) => write!(f, "{b}"),
			Value::Int(i) => write!(f, "{i}"),
			Value::Float(x) => write!(f, "{x}"),
			Value::Text(s) => write!(f, "{s}"),
			Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
			Value::Uuid(u) => write!(f, "{u}"),
			Value::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
			Value::List(items) => write!(f, "<list of {}>", items.len()),
			Value::Map(pairs) => write!(f, "<map of {}>", pairs.len()),
		}
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Value::Bool(v)
	}
}

impl From<i32> for Value {
	fn from(v: i32) -> Self {
		Value::Int(v as i64)
	}
}

impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Value::Int(v)
	}
}

impl From<f64> for Value {
	fn from(v: f64) -> Self {
		Value::Float(v)
	}
}

impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Value::Text(v.to_owned())
	}
}

impl From<String> for Value {
	fn from(v: String) -> Self {
		Value::Text(v)
	}
}

impl From<Uuid> for Value {
	fn from(v: Uuid) -> Self {
		Value::Uuid(v)
	}
}

impl From<DateTime<Utc>> for Value {
	fn from(v: DateTime<Utc>) -> Self {
		Value::Timestamp(v)
	}
}

impl<T: Into<Value>> From<Vec<T>> for Value {
	fn from(v: Vec<T>) -> Self {
		Value::List(v.into_iter().map(Into::into).collect())
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(v: Option<T>) -> Self {
		match v {
			Some(inner) => inner.into(),
			None => Value::Null,
		}
	}
}

/// A raw backend row or document: column name to raw (encoded) value.
///
/// Column order is preserved, matching the schema's ordered field list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
	values: IndexMap<String, Value>,
}

impl Row {
	pub fn new() -> Self {
		Self {
			values: IndexMap::new(),
		}
	}

	pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
		self.values.insert(column.into(), value.into());
		self
	}

	pub fn get(&self, column: &str) -> Option<&Value> {
		self.values.get(column)
	}

	pub fn contains(&self, column: &str) -> bool {
		self.values.contains_key(column)
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
		self.values.iter().map(|(k, v)| (k.as_str(), v))
	}
}

impl FromIterator<(String, Value)> for Row {
	fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
		Self {
			values: iter.into_iter().collect(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::hash_map::DefaultHasher;

	fn hash_of(v: &Value) -> u64 {
		let mut h = DefaultHasher::new();
		v.hash(&mut h);
		h.finish()
	}

	#[test]
	fn float_values_hash_by_bit_pattern() {
		assert_eq!(
			hash_of(&Value::Float(1.5)),
			hash_of(&Value::Float(1.5))
		);
		assert_ne!(
			hash_of(&Value::Float(1.5)),
			hash_of(&Value::Float(2.5))
		);
	}

	#[test]
	fn int_and_float_are_distinct() {
		assert_ne!(Value::Int(1), Value::Float(1.0));
	}

	#[test]
	fn row_preserves_column_order() {
		let mut row = Row::new();
		row.insert("id", 1i64);
		row.insert("name", "alice");
		row.insert("age", 30i64);
		let columns: Vec<&str> = row.iter().map(|(k, _)| k).collect();
		assert_eq!(columns, vec!["id", "name", "age"]);
	}
}
