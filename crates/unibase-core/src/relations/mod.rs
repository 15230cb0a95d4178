//! Relationship resolution
//!
//! Resolves one-to-one, one-to-many and many-to-one fields by issuing
//! portable select queries against the target entity's adapter. Resolved
//! values are cached per (owner entity, owner id, field) with an explicit
//! null marker, so "resolved to nothing" is remembered and not re-queried.
//!
//! Failure handling is asymmetric on purpose: a relationship target with no
//! registered schema or adapter is a configuration error and surfaces as
//! `Err`; a backend failure while fetching is logged and degrades the value
//! to [`RelationValue::Degraded`], which is never cached so a later access
//! retries.

mod lazy;

pub use lazy::Lazy;

use crate::context::DataContext;
use crate::error::ConfigError;
use crate::query::{FilterTarget, Query, SelectQuery};
use crate::schema::{CachePolicy, FieldDescriptor, Relation, SchemaDescriptor, SharedEntity};
use crate::value::Value;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Outcome of resolving one relationship field.
#[derive(Clone)]
pub enum RelationValue {
	/// Resolved cleanly to nothing.
	Empty,
	One(SharedEntity),
	Many(Vec<SharedEntity>),
	/// The fetch failed; the real value is unknown.
	Degraded,
}

impl RelationValue {
	pub fn is_empty(&self) -> bool {
		matches!(self, RelationValue::Empty)
	}

	pub fn is_degraded(&self) -> bool {
		matches!(self, RelationValue::Degraded)
	}

	pub fn as_one(&self) -> Option<&SharedEntity> {
		match self {
			RelationValue::One(entity) => Some(entity),
			_ => None,
		}
	}

	pub fn as_many(&self) -> Option<&[SharedEntity]> {
		match self {
			RelationValue::Many(entities) => Some(entities),
			_ => None,
		}
	}
}

impl std::fmt::Debug for RelationValue {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			RelationValue::Empty => f.write_str("Empty"),
			RelationValue::One(_) => f.write_str("One(<entity>)"),
			RelationValue::Many(v) => write!(f, "Many(<{} entities>)", v.len()),
			RelationValue::Degraded => f.write_str("Degraded"),
		}
	}
}

/// Cache key: owner entity type, owner primary key, relationship field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RelationshipKey {
	entity: String,
	id: Value,
	field: String,
}

/// Cached slot. `Null` is the explicit nothing-marker; degraded values are
/// never stored.
#[derive(Clone)]
enum CacheSlot {
	Null,
	One(SharedEntity),
	Many(Vec<SharedEntity>),
}

impl CacheSlot {
	fn to_value(&self) -> RelationValue {
		match self {
			CacheSlot::Null => RelationValue::Empty,
			CacheSlot::One(entity) => RelationValue::One(Arc::clone(entity)),
			CacheSlot::Many(entities) => RelationValue::Many(entities.clone()),
		}
	}
}

/// Hit/miss counters for the relationship cache.
#[derive(Debug, Default)]
pub struct CacheStatistics {
	hits: AtomicU64,
	misses: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSnapshot {
	pub hits: u64,
	pub misses: u64,
}

impl CacheStatistics {
	pub fn snapshot(&self) -> CacheSnapshot {
		CacheSnapshot {
			hits: self.hits.load(Ordering::Relaxed),
			misses: self.misses.load(Ordering::Relaxed),
		}
	}
}

/// Resolves relationship fields through the data context, with caching.
///
/// Cheap to clone; clones share one cache.
#[derive(Clone)]
pub struct RelationshipResolver {
	context: Arc<DataContext>,
	cache: Arc<DashMap<RelationshipKey, CacheSlot>>,
	stats: Arc<CacheStatistics>,
}

impl RelationshipResolver {
	pub fn new(context: Arc<DataContext>) -> Self {
		Self {
			context,
			cache: Arc::new(DashMap::new()),
			stats: Arc::new(CacheStatistics::default()),
		}
	}

	pub fn statistics(&self) -> CacheSnapshot {
		self.stats.snapshot()
	}

	/// Resolve a relationship field eagerly.
	///
	/// `owner_id` is the owner's primary key value; `fk` is the stored
	/// foreign-key value, required for many-to-one fields.
	pub fn resolve(
		&self,
		schema: &SchemaDescriptor,
		field: &FieldDescriptor,
		owner_id: &Value,
		fk: Option<&Value>,
	) -> Result<RelationValue, ConfigError> {
		let relation = field.relation.as_ref().ok_or_else(|| {
			ConfigError::NotARelationship {
				entity: schema.entity().to_owned(),
				field: field.name.clone(),
			}
		})?;

		let cacheable = schema.cache_policy() != CachePolicy::Disabled;
		let key = RelationshipKey {
			entity: schema.entity().to_owned(),
			id: owner_id.clone(),
			field: field.name.clone(),
		};
		if cacheable {
			if let Some(slot) = self.cache.get(&key) {
				self.stats.hits.fetch_add(1, Ordering::Relaxed);
				return Ok(slot.to_value());
			}
			self.stats.misses.fetch_add(1, Ordering::Relaxed);
		}

		let (query, single) = self.target_query(schema, field, relation, owner_id, fk)?;
		let target = relation.target();
		let adapter = self.context.require_adapter(target)?;

		let value = match query {
			// Null foreign key: nothing to fetch.
			None => RelationValue::Empty,
			Some(query) => match adapter.find(&query) {
				Ok(mut entities) => {
					if single {
						match entities.pop() {
							Some(entity) => RelationValue::One(entity),
							None => RelationValue::Empty,
						}
					} else {
						RelationValue::Many(entities)
					}
				}
				Err(error) => {
					tracing::error!(
						entity = schema.entity(),
						id = %owner_id,
						field = %field.name,
						%error,
						"relationship fetch failed, degrading value"
					);
					return Ok(RelationValue::Degraded);
				}
			},
		};

		if cacheable {
			let slot = match &value {
				RelationValue::Empty => CacheSlot::Null,
				RelationValue::One(entity) => CacheSlot::One(Arc::clone(entity)),
				RelationValue::Many(entities) => CacheSlot::Many(entities.clone()),
				RelationValue::Degraded => unreachable!("degraded values return early"),
			};
			// First write wins: a racing resolution of the same key keeps
			// the earlier entry, and every caller observes the cached value.
			let entry = self.cache.entry(key).or_insert(slot);
			return Ok(entry.to_value());
		}
		Ok(value)
	}

	/// Resolve a relationship field lazily. Configuration is checked now;
	/// the backend fetch is deferred to first access of the returned handle.
	pub fn resolve_lazy(
		&self,
		schema: &Arc<SchemaDescriptor>,
		field: &FieldDescriptor,
		owner_id: &Value,
		fk: Option<&Value>,
	) -> Result<Lazy<RelationValue>, ConfigError> {
		let relation = field.relation.as_ref().ok_or_else(|| {
			ConfigError::NotARelationship {
				entity: schema.entity().to_owned(),
				field: field.name.clone(),
			}
		})?;
		// Fail fast on wiring problems instead of deferring them.
		self.context.require_schema(relation.target())?;
		self.context.require_adapter(relation.target())?;
		self.target_query(schema, field, relation, owner_id, fk)?;

		let resolver = self.clone();
		let schema = Arc::clone(schema);
		let field = field.clone();
		let owner_id = owner_id.clone();
		let fk = fk.cloned();
		Ok(Lazy::new(move || {
			match resolver.resolve(&schema, &field, &owner_id, fk.as_ref()) {
				Ok(value) => value,
				// Unreachable after the eager checks above; degrade anyway.
				Err(error) => {
					tracing::error!(%error, "deferred relationship resolution failed");
					RelationValue::Degraded
				}
			}
		}))
	}

	/// Build the select against the target entity. Returns `None` for a
	/// many-to-one with a null foreign key, plus whether at most one row is
	/// expected.
	fn target_query(
		&self,
		schema: &SchemaDescriptor,
		field: &FieldDescriptor,
		relation: &Relation,
		owner_id: &Value,
		fk: Option<&Value>,
	) -> Result<(Option<SelectQuery>, bool), ConfigError> {
		let target_schema = self.context.require_schema(relation.target())?;
		match relation {
			Relation::ManyToOne { .. } => {
				let fk = fk.filter(|v| !v.is_null());
				let Some(fk) = fk else {
					return Ok((None, true));
				};
				let query = Query::select()
					.where_field(target_schema.primary_key().name.clone())
					.eq(fk.clone())
					.limit(1)
					.build_select();
				Ok((Some(query), true))
			}
			Relation::OneToOne { .. } => {
				let back = target_schema
					.back_reference_to(schema.entity())
					.ok_or_else(|| ConfigError::MissingBackReference {
						entity: schema.entity().to_owned(),
						field: field.name.clone(),
						target: target_schema.entity().to_owned(),
					})?;
				let query = Query::select()
					.where_field(back.name.clone())
					.eq(owner_id.clone())
					.limit(1)
					.build_select();
				Ok((Some(query), true))
			}
			Relation::OneToMany { mapped_by, .. } => {
				let query = Query::select()
					.where_field(mapped_by.clone())
					.eq(owner_id.clone())
					.build_select();
				Ok((Some(query), false))
			}
		}
	}
}
