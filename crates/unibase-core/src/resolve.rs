//! Type resolver registry
//!
//! A [`TypeResolver`] converts one semantic field type between its
//! application-level [`Value`] form and the backend-native encoded form
//! (also a [`Value`], but restricted to what the backend can store). Each
//! backend ships a default registry mapping the built-in types; callers may
//! override individual registrations. Enum types are registered lazily on
//! first encounter as text passthroughs, and unknown types fall back to an
//! opaque JSON-bytes codec so materialization never hard-fails on a missing
//! registration.

use crate::error::ResolveError;
use crate::schema::FieldType;
use crate::value::Value;
use dashmap::DashMap;
use std::sync::Arc;

type CodecFn = dyn Fn(&Value) -> Result<Value, ResolveError> + Send + Sync;

/// A bidirectional codec for one semantic type on one backend.
#[derive(Clone)]
pub struct TypeResolver {
	/// Backend-native column/field type name, used in generated DDL.
	storage_type: String,
	encode: Arc<CodecFn>,
	decode: Arc<CodecFn>,
}

impl std::fmt::Debug for TypeResolver {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TypeResolver")
			.field("storage_type", &self.storage_type)
			.finish_non_exhaustive()
	}
}

impl TypeResolver {
	pub fn new(
		storage_type: impl Into<String>,
		encode: impl Fn(&Value) -> Result<Value, ResolveError> + Send + Sync + 'static,
		decode: impl Fn(&Value) -> Result<Value, ResolveError> + Send + Sync + 'static,
	) -> Self {
		Self {
			storage_type: storage_type.into(),
			encode: Arc::new(encode),
			decode: Arc::new(decode),
		}
	}

	/// Identity codec: the application value is already backend-native.
	pub fn passthrough(storage_type: impl Into<String>) -> Self {
		Self::new(storage_type, |v| Ok(v.clone()), |v| Ok(v.clone()))
	}

	pub fn storage_type(&self) -> &str {
		&self.storage_type
	}

	pub fn encode(&self, value: &Value) -> Result<Value, ResolveError> {
		if value.is_null() {
			return Ok(Value::Null);
		}
		(self.encode)(value)
	}

	pub fn decode(&self, value: &Value) -> Result<Value, ResolveError> {
		if value.is_null() {
			return Ok(Value::Null);
		}
		(self.decode)(value)
	}
}

/// Registry of resolvers keyed by semantic field type.
///
/// Lookups are lock-free on the hot path; lazy enum registration goes
/// through the map's entry API so concurrent first encounters agree on one
/// resolver.
pub struct TypeResolverRegistry {
	resolvers: DashMap<FieldType, Arc<TypeResolver>>,
	named: DashMap<String, Arc<TypeResolver>>,
	opaque: Arc<TypeResolver>,
}

impl TypeResolverRegistry {
	pub fn new() -> Self {
		Self {
			resolvers: DashMap::new(),
			named: DashMap::new(),
			opaque: Arc::new(opaque_resolver()),
		}
	}

	/// Register (or replace) the resolver for a semantic type.
	pub fn register(&self, field_type: FieldType, resolver: TypeResolver) {
		self.resolvers.insert(field_type, Arc::new(resolver));
	}

	/// Register a resolver addressable by name, for per-field overrides.
	pub fn register_named(&self, name: impl Into<String>, resolver: TypeResolver) {
		self.named.insert(name.into(), Arc::new(resolver));
	}

	pub fn named(&self, name: &str) -> Option<Arc<TypeResolver>> {
		self.named.get(name).map(|entry| Arc::clone(entry.value()))
	}

	/// Resolver for a semantic type, registering enum passthroughs lazily.
	pub fn resolve(&self, field_type: &FieldType) -> Result<Arc<TypeResolver>, ResolveError> {
		if let Some(entry) = self.resolvers.get(field_type) {
			return Ok(Arc::clone(entry.value()));
		}
		if let FieldType::Enum(name) = field_type {
			tracing::debug!(enum_name = %name, "registering enum resolver on first use");
			let resolver = self
				.resolvers
				.entry(field_type.clone())
				.or_insert_with(|| Arc::new(TypeResolver::passthrough("TEXT")));
			return Ok(Arc::clone(resolver.value()));
		}
		Err(ResolveError::MissingResolver {
			type_name: field_type.to_string(),
		})
	}

	/// Like [`resolve`](Self::resolve), but unknown types fall back to the
	/// opaque JSON-bytes codec instead of erroring.
	pub fn resolve_or_opaque(&self, field_type: &FieldType) -> Arc<TypeResolver> {
		match self.resolve(field_type) {
			Ok(resolver) => resolver,
			Err(_) => {
				tracing::debug!(%field_type, "no resolver registered, using opaque codec");
				Arc::clone(&self.opaque)
			}
		}
	}

	/// Backend storage type for DDL generation.
	pub fn storage_type(&self, field_type: &FieldType) -> String {
		self.resolve_or_opaque(field_type).storage_type().to_owned()
	}
}

impl Default for TypeResolverRegistry {
	fn default() -> Self {
		Self::new()
	}
}

/// Fallback codec: serialize the application value to JSON bytes on the way
/// in, parse it back on the way out.
fn opaque_resolver() -> TypeResolver {
	TypeResolver::new(
		"BLOB",
		|value| {
			let bytes = serde_json::to_vec(value).map_err(|e| ResolveError::Encode {
				kind: value.kind(),
				storage_type: "BLOB".into(),
				message: e.to_string(),
			})?;
			Ok(Value::Bytes(bytes))
		},
		|value| match value {
			Value::Bytes(bytes) => {
				serde_json::from_slice(bytes).map_err(|e| ResolveError::Decode {
					kind: "bytes",
					type_name: "opaque".into(),
					message: e.to_string(),
				})
			}
			other => Err(ResolveError::Decode {
				kind: other.kind(),
				type_name: "opaque".into(),
				message: "expected a byte payload".into(),
			}),
		},
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn missing_resolver_is_an_error() {
		let registry = TypeResolverRegistry::new();
		let err = registry.resolve(&FieldType::Uuid).unwrap_err();
		assert!(matches!(err, ResolveError::MissingResolver { .. }));
	}

	#[test]
	fn enum_types_register_lazily_as_text() {
		let registry = TypeResolverRegistry::new();
		let resolver = registry
			.resolve(&FieldType::Enum("Color".into()))
			.unwrap();
		assert_eq!(resolver.storage_type(), "TEXT");
		let encoded = resolver.encode(&Value::Text("RED".into())).unwrap();
		assert_eq!(encoded, Value::Text("RED".into()));
		// Second lookup hits the registered entry.
		assert!(registry.resolve(&FieldType::Enum("Color".into())).is_ok());
	}

	#[test]
	fn opaque_fallback_round_trips_through_json_bytes() {
		let registry = TypeResolverRegistry::new();
		let resolver = registry.resolve_or_opaque(&FieldType::Custom("Point".into()));
		let original = Value::Map(vec![
			(Value::Text("x".into()), Value::Int(3)),
			(Value::Text("y".into()), Value::Int(7)),
		]);
		let encoded = resolver.encode(&original).unwrap();
		assert!(matches!(encoded, Value::Bytes(_)));
		assert_eq!(resolver.decode(&encoded).unwrap(), original);
	}

	#[test]
	fn null_short_circuits_both_directions() {
		let resolver = TypeResolver::new(
			"TEXT",
			|_| panic!("encode must not run for null"),
			|_| panic!("decode must not run for null"),
		);
		assert_eq!(resolver.encode(&Value::Null).unwrap(), Value::Null);
		assert_eq!(resolver.decode(&Value::Null).unwrap(), Value::Null);
	}
}
