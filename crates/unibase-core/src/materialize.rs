//! Entity materialization
//!
//! Turns raw backend rows into entity instances and back. Per field the
//! materializer decodes the stored value through the type resolver registry,
//! resolves relationship fields through the relationship resolver (eagerly
//! or as a deferred handle, honoring the query's prefetch set), and hands
//! the result to the schema's accessor.
//!
//! Decode strategy for plain fields: a registered resolver is authoritative
//! and its failures are errors; a missing registration falls back to the
//! raw stored value for built-in types and to the opaque JSON-bytes codec
//! for custom types.

use crate::context::DataContext;
use crate::error::{MaterializeError, ResolveError};
use crate::relations::{RelationValue, RelationshipResolver};
use crate::resolve::TypeResolverRegistry;
use crate::schema::{
	FieldDescriptor, FieldType, FieldValue, Relation, SchemaDescriptor, SharedEntity,
};
use crate::value::{Row, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

pub struct EntityMaterializer {
	#[allow(dead_code)]
	context: Arc<DataContext>,
	registry: Arc<TypeResolverRegistry>,
	resolver: RelationshipResolver,
}

impl EntityMaterializer {
	pub fn new(context: Arc<DataContext>, registry: Arc<TypeResolverRegistry>) -> Self {
		let resolver = RelationshipResolver::new(Arc::clone(&context));
		Self {
			context,
			registry,
			resolver,
		}
	}

	/// Share an existing resolver (and its cache) instead of creating one.
	pub fn with_resolver(
		context: Arc<DataContext>,
		registry: Arc<TypeResolverRegistry>,
		resolver: RelationshipResolver,
	) -> Self {
		Self {
			context,
			registry,
			resolver,
		}
	}

	pub fn resolver(&self) -> &RelationshipResolver {
		&self.resolver
	}

	/// Materialize one row without prefetch overrides.
	pub fn materialize(
		&self,
		schema: &Arc<SchemaDescriptor>,
		row: &Row,
	) -> Result<SharedEntity, MaterializeError> {
		self.materialize_prefetched(schema, row, &BTreeSet::new())
	}

	/// Materialize one row; relationship fields named in `prefetch` are
	/// resolved eagerly even when declared lazy.
	pub fn materialize_prefetched(
		&self,
		schema: &Arc<SchemaDescriptor>,
		row: &Row,
		prefetch: &BTreeSet<String>,
	) -> Result<SharedEntity, MaterializeError> {
		let mut entity = schema
			.new_instance()
			.ok_or_else(|| MaterializeError::MissingFactory {
				entity: schema.entity().to_owned(),
			})?;

		let pk_name = &schema.primary_key().name;
		let owner_id = match row.get(pk_name) {
			Some(raw) => self.decode_scalar(schema, schema.primary_key(), raw)?,
			None => Value::Null,
		};

		for field in schema.fields() {
			let value = if let Some(relation) = &field.relation {
				// Foreign keys stay raw; primary-key encodings are identity
				// on every provided backend.
				let fk = row.get(&field.name);
				self.relation_value(schema, field, relation, &owner_id, fk, prefetch)?
			} else {
				let Some(raw) = row.get(&field.name) else {
					continue;
				};
				FieldValue::Scalar(self.decode_scalar(schema, field, raw)?)
			};

			let accessor =
				schema
					.accessor(&field.name)
					.ok_or_else(|| MaterializeError::MissingAccessor {
						entity: schema.entity().to_owned(),
						field: field.name.clone(),
					})?;
			(accessor.set)(entity.as_mut(), value).map_err(|e| MaterializeError::Accessor {
				entity: schema.entity().to_owned(),
				field: field.name.clone(),
				message: e.0,
			})?;
		}

		Ok(Arc::from(entity))
	}

	/// Turn an entity back into its encoded row. Relationship fields that
	/// read back as entities are skipped; foreign-key scalars are included.
	pub fn deconstruct(
		&self,
		schema: &SchemaDescriptor,
		entity: &SharedEntity,
	) -> Result<Row, MaterializeError> {
		let mut row = Row::new();
		for field in schema.fields() {
			let accessor =
				schema
					.accessor(&field.name)
					.ok_or_else(|| MaterializeError::MissingAccessor {
						entity: schema.entity().to_owned(),
						field: field.name.clone(),
					})?;
			let Some(value) = (accessor.get)(entity.as_ref()) else {
				continue;
			};
			let FieldValue::Scalar(value) = value else {
				continue;
			};
			let encoded = self.encode_scalar(schema, field, &value)?;
			row.insert(field.name.clone(), encoded);
		}
		Ok(row)
	}

	fn relation_value(
		&self,
		schema: &Arc<SchemaDescriptor>,
		field: &FieldDescriptor,
		relation: &Relation,
		owner_id: &Value,
		fk: Option<&Value>,
		prefetch: &BTreeSet<String>,
	) -> Result<FieldValue, MaterializeError> {
		let eager = !relation.is_lazy() || prefetch.contains(&field.name);
		if !eager {
			let lazy = self.resolver.resolve_lazy(schema, field, owner_id, fk)?;
			return Ok(FieldValue::Deferred(Arc::new(lazy)));
		}
		let resolved = self.resolver.resolve(schema, field, owner_id, fk)?;
		let many = matches!(relation, Relation::OneToMany { .. });
		Ok(match resolved {
			RelationValue::One(entity) => FieldValue::One(Some(entity)),
			RelationValue::Many(entities) => FieldValue::Many(entities),
			RelationValue::Empty | RelationValue::Degraded => {
				if many {
					FieldValue::Many(Vec::new())
				} else {
					FieldValue::One(None)
				}
			}
		})
	}

	fn decode_scalar(
		&self,
		schema: &SchemaDescriptor,
		field: &FieldDescriptor,
		raw: &Value,
	) -> Result<Value, MaterializeError> {
		self.apply_codec(schema, field, raw, false)
	}

	fn encode_scalar(
		&self,
		schema: &SchemaDescriptor,
		field: &FieldDescriptor,
		value: &Value,
	) -> Result<Value, MaterializeError> {
		self.apply_codec(schema, field, value, true)
	}

	fn apply_codec(
		&self,
		schema: &SchemaDescriptor,
		field: &FieldDescriptor,
		value: &Value,
		encoding: bool,
	) -> Result<Value, MaterializeError> {
		let wrap = |source: ResolveError| MaterializeError::Resolve {
			entity: schema.entity().to_owned(),
			field: field.name.clone(),
			source,
		};

		if let Some(name) = &field.resolver_override {
			let resolver = self
				.registry
				.named(name)
				.ok_or_else(|| wrap(ResolveError::MissingResolver {
					type_name: name.clone(),
				}))?;
			let run = if encoding {
				resolver.encode(value)
			} else {
				resolver.decode(value)
			};
			return run.map_err(wrap);
		}

		match &field.field_type {
			// Element-wise conversion; a missing element registration keeps
			// the collection raw.
			FieldType::List(elem) => match self.registry.resolve(elem) {
				Ok(resolver) => {
					let Value::List(items) = value else {
						return Ok(value.clone());
					};
					let mut out = Vec::with_capacity(items.len());
					for item in items {
						let run = if encoding {
							resolver.encode(item)
						} else {
							resolver.decode(item)
						};
						out.push(run.map_err(wrap)?);
					}
					Ok(Value::List(out))
				}
				Err(_) => {
					tracing::debug!(
						field = %field.name,
						"no element resolver for list field, keeping raw"
					);
					Ok(value.clone())
				}
			},
			FieldType::Map(_, val_type) => match self.registry.resolve(val_type) {
				Ok(resolver) => {
					let Value::Map(pairs) = value else {
						return Ok(value.clone());
					};
					let mut out = Vec::with_capacity(pairs.len());
					for (key, item) in pairs {
						let run = if encoding {
							resolver.encode(item)
						} else {
							resolver.decode(item)
						};
						out.push((key.clone(), run.map_err(wrap)?));
					}
					Ok(Value::Map(out))
				}
				Err(_) => {
					tracing::debug!(
						field = %field.name,
						"no value resolver for map field, keeping raw"
					);
					Ok(value.clone())
				}
			},
			other => match self.registry.resolve(other) {
				Ok(resolver) => {
					let run = if encoding {
						resolver.encode(value)
					} else {
						resolver.decode(value)
					};
					run.map_err(wrap)
				}
				Err(ResolveError::MissingResolver { .. }) => {
					if matches!(other, FieldType::Custom(_)) {
						let opaque = self.registry.resolve_or_opaque(other);
						let run = if encoding {
							opaque.encode(value)
						} else {
							opaque.decode(value)
						};
						run.map_err(wrap)
					} else {
						Ok(value.clone())
					}
				}
				Err(error) => Err(wrap(error)),
			},
		}
	}
}
