//! Schema descriptors
//!
//! Entity metadata is registered explicitly at startup instead of being
//! scanned from the entity declarations: the caller builds one
//! [`SchemaDescriptor`] per entity type (field list, semantic types,
//! relationship roles) and supplies plain accessor function pairs for field
//! access. Descriptors are immutable after [`SchemaBuilder::build`] and are
//! shared behind `Arc` for the process lifetime.

use crate::error::SchemaError;
use crate::relations::{Lazy, RelationValue};
use crate::value::Value;
use indexmap::IndexMap;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A materialized entity instance, shared between the relationship cache and
/// callers. Concrete access goes through the schema's accessors or a
/// `downcast_ref` on the caller's side.
pub type SharedEntity = Arc<dyn Any + Send + Sync>;

/// Semantic type of a field, independent of any backend's column types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
	Bool,
	Int,
	Float,
	Text,
	Bytes,
	Uuid,
	Timestamp,
	/// An enumeration, keyed by its declared name. Resolvers for enums are
	/// registered lazily on first encounter.
	Enum(String),
	/// Collection of a single element type.
	List(Box<FieldType>),
	/// Key/value collection.
	Map(Box<FieldType>, Box<FieldType>),
	/// Foreign-key column referencing another entity's primary key.
	Reference(String),
	/// Application-defined semantic type, resolved via a custom registration
	/// or the opaque fallback codec.
	Custom(String),
}

impl fmt::Display for FieldType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			FieldType::Bool => write!(f, "bool"),
			FieldType::Int => write!(f, "int"),
			FieldType::Float => write!(f, "float"),
			FieldType::Text => write!(f, "text"),
			FieldType::Bytes => write!(f, "bytes"),
			FieldType::Uuid => write!(f, "uuid"),
			FieldType::Timestamp => write!(f, "timestamp"),
			FieldType::Enum(name) => write!(f, "enum({name})"),
			FieldType::List(elem) => write!(f, "list({elem})"),
			FieldType::Map(k, v) => write!(f, "map({k}, {v})"),
			FieldType::Reference(entity) => write!(f, "reference({entity})"),
			FieldType::Custom(name) => write!(f, "custom({name})"),
		}
	}
}

/// Relationship role declared on a field. A field carries at most one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
	/// This entity owns a single counterpart; resolved through the target's
	/// back-reference field.
	OneToOne { target: String, lazy: bool },
	/// This entity owns a collection of counterparts, mapped by a field on
	/// the target that stores this entity's primary key.
	OneToMany {
		target: String,
		mapped_by: String,
		lazy: bool,
	},
	/// This field stores a foreign key to the target's primary key.
	ManyToOne { target: String },
}

impl Relation {
	pub fn target(&self) -> &str {
		match self {
			Relation::OneToOne { target, .. }
			| Relation::OneToMany { target, .. }
			| Relation::ManyToOne { target } => target,
		}
	}

	pub fn is_lazy(&self) -> bool {
		match self {
			Relation::OneToOne { lazy, .. } | Relation::OneToMany { lazy, .. } => *lazy,
			Relation::ManyToOne { .. } => false,
		}
	}
}

/// Referential action emitted in foreign-key DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentialAction {
	Cascade,
	SetNull,
	Restrict,
	NoAction,
}

impl ReferentialAction {
	pub fn as_sql(&self) -> &'static str {
		match self {
			ReferentialAction::Cascade => "CASCADE",
			ReferentialAction::SetNull => "SET NULL",
			ReferentialAction::Restrict => "RESTRICT",
			ReferentialAction::NoAction => "NO ACTION",
		}
	}
}

/// Foreign-key metadata for a many-to-one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignRef {
	pub entity: String,
	pub field: String,
	pub on_delete: Option<ReferentialAction>,
	pub on_update: Option<ReferentialAction>,
}

/// Per-field metadata. Owned exclusively by its [`SchemaDescriptor`].
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
	pub name: String,
	pub field_type: FieldType,
	pub primary_key: bool,
	pub auto_generated: bool,
	pub not_null: bool,
	pub unique: bool,
	pub indexed: bool,
	/// Column defaults to the current timestamp on insert.
	pub timestamp_default: bool,
	pub relation: Option<Relation>,
	pub foreign_ref: Option<ForeignRef>,
	/// Name of a custom resolver registration overriding the type-keyed one.
	pub resolver_override: Option<String>,
	pub default: Option<Value>,
	/// Raw CHECK expression emitted in DDL.
	pub check: Option<String>,
}

impl FieldDescriptor {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			primary_key: false,
			auto_generated: false,
			not_null: false,
			unique: false,
			indexed: false,
			timestamp_default: false,
			relation: None,
			foreign_ref: None,
			resolver_override: None,
			default: None,
			check: None,
		}
	}

	pub fn primary_key(mut self) -> Self {
		self.primary_key = true;
		self
	}

	pub fn auto_generated(mut self) -> Self {
		self.auto_generated = true;
		self
	}

	pub fn not_null(mut self) -> Self {
		self.not_null = true;
		self
	}

	pub fn unique(mut self) -> Self {
		self.unique = true;
		self
	}

	pub fn indexed(mut self) -> Self {
		self.indexed = true;
		self
	}

	pub fn timestamp_default(mut self) -> Self {
		self.timestamp_default = true;
		self
	}

	pub fn relation(mut self, relation: Relation) -> Self {
		self.relation = Some(relation);
		self
	}

	pub fn foreign_ref(mut self, foreign_ref: ForeignRef) -> Self {
		self.foreign_ref = Some(foreign_ref);
		self
	}

	pub fn resolver_override(mut self, name: impl Into<String>) -> Self {
		self.resolver_override = Some(name.into());
		self
	}

	pub fn default_value(mut self, value: impl Into<Value>) -> Self {
		self.default = Some(value.into());
		self
	}

	pub fn check(mut self, expression: impl Into<String>) -> Self {
		self.check = Some(expression.into());
		self
	}

	pub fn is_relationship(&self) -> bool {
		self.relation.is_some()
	}

	pub fn is_collection(&self) -> bool {
		matches!(self.field_type, FieldType::List(_) | FieldType::Map(..))
	}
}

/// Class-level named constraint over a group of fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
	pub name: String,
	pub fields: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
	Normal,
	Unique,
}

/// Index declaration carried on the schema and emitted as DDL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
	pub name: String,
	pub fields: Vec<String>,
	pub kind: IndexKind,
}

/// Relationship-cache policy for entities of this schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
	/// Never cache resolved relationships for this entity type.
	Disabled,
	/// Cache without bound, for the resolver's lifetime.
	#[default]
	Unbounded,
}

/// Value passed through a field accessor: either a plain scalar, a resolved
/// relationship, or a deferred relationship handle.
#[derive(Clone)]
pub enum FieldValue {
	Scalar(Value),
	One(Option<SharedEntity>),
	Many(Vec<SharedEntity>),
	Deferred(Arc<Lazy<RelationValue>>),
}

impl fmt::Debug for FieldValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			FieldValue::Scalar(v) => f.debug_tuple("Scalar").field(v).finish(),
			FieldValue::One(v) => f
				.debug_tuple("One")
				.field(&v.as_ref().map(|_| "<entity>"))
				.finish(),
			FieldValue::Many(v) => write!(f, "Many(<{} entities>)", v.len()),
			FieldValue::Deferred(_) => write!(f, "Deferred(..)"),
		}
	}
}

/// Error returned by an accessor's set function when the value does not fit
/// the entity field.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct AccessorError(pub String);

type GetFn = dyn Fn(&dyn Any) -> Option<FieldValue> + Send + Sync;
type SetFn = dyn Fn(&mut dyn Any, FieldValue) -> Result<(), AccessorError> + Send + Sync;
type FactoryFn = dyn Fn() -> Box<dyn Any + Send + Sync> + Send + Sync;

/// Plain get/set function pair replacing runtime field introspection.
#[derive(Clone)]
pub struct FieldAccessor {
	pub get: Arc<GetFn>,
	pub set: Arc<SetFn>,
}

impl FieldAccessor {
	pub fn new(
		get: impl Fn(&dyn Any) -> Option<FieldValue> + Send + Sync + 'static,
		set: impl Fn(&mut dyn Any, FieldValue) -> Result<(), AccessorError> + Send + Sync + 'static,
	) -> Self {
		Self {
			get: Arc::new(get),
			set: Arc::new(set),
		}
	}
}

/// Immutable storage-shape metadata for one entity type.
pub struct SchemaDescriptor {
	entity: String,
	repository: String,
	fields: IndexMap<String, FieldDescriptor>,
	accessors: HashMap<String, FieldAccessor>,
	primary_key: String,
	constraints: Vec<Constraint>,
	indexes: Vec<IndexSpec>,
	cache_policy: CachePolicy,
	factory: Option<Arc<FactoryFn>>,
}

impl fmt::Debug for SchemaDescriptor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SchemaDescriptor")
			.field("entity", &self.entity)
			.field("repository", &self.repository)
			.field("primary_key", &self.primary_key)
			.field("fields", &self.fields.keys().collect::<Vec<_>>())
			.finish()
	}
}

impl SchemaDescriptor {
	pub fn builder(entity: impl Into<String>, repository: impl Into<String>) -> SchemaBuilder {
		SchemaBuilder {
			entity: entity.into(),
			repository: repository.into(),
			fields: IndexMap::new(),
			accessors: HashMap::new(),
			duplicate: None,
			constraints: Vec::new(),
			indexes: Vec::new(),
			cache_policy: CachePolicy::default(),
			factory: None,
		}
	}

	/// Application entity type name.
	pub fn entity(&self) -> &str {
		&self.entity
	}

	/// Backend table/collection name.
	pub fn repository(&self) -> &str {
		&self.repository
	}

	pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
		self.fields.get(name)
	}

	/// Fields in declaration order.
	pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
		self.fields.values()
	}

	pub fn primary_key(&self) -> &FieldDescriptor {
		&self.fields[&self.primary_key]
	}

	pub fn accessor(&self, name: &str) -> Option<&FieldAccessor> {
		self.accessors.get(name)
	}

	pub fn constraints(&self) -> &[Constraint] {
		&self.constraints
	}

	pub fn indexes(&self) -> &[IndexSpec] {
		&self.indexes
	}

	pub fn cache_policy(&self) -> CachePolicy {
		self.cache_policy
	}

	pub fn has_factory(&self) -> bool {
		self.factory.is_some()
	}

	pub fn new_instance(&self) -> Option<Box<dyn Any + Send + Sync>> {
		self.factory.as_ref().map(|f| f())
	}

	/// Find the field on this schema that references back to `entity`,
	/// either through an explicit foreign reference or a relationship role.
	/// Used to locate the mapped-by side of one-to-one links.
	pub fn back_reference_to(&self, entity: &str) -> Option<&FieldDescriptor> {
		self.fields.values().find(|f| {
			f.foreign_ref.as_ref().is_some_and(|r| r.entity == entity)
				|| f.relation.as_ref().is_some_and(|r| r.target() == entity)
		})
	}
}

/// Builder for [`SchemaDescriptor`]; `build` enforces the schema invariants
/// (exactly one primary key, no duplicate fields, constraint and index
/// references resolve).
pub struct SchemaBuilder {
	entity: String,
	repository: String,
	fields: IndexMap<String, FieldDescriptor>,
	accessors: HashMap<String, FieldAccessor>,
	duplicate: Option<String>,
	constraints: Vec<Constraint>,
	indexes: Vec<IndexSpec>,
	cache_policy: CachePolicy,
	factory: Option<Arc<FactoryFn>>,
}

impl SchemaBuilder {
	pub fn field(mut self, descriptor: FieldDescriptor) -> Self {
		if self.fields.contains_key(&descriptor.name) && self.duplicate.is_none() {
			self.duplicate = Some(descriptor.name.clone());
		}
		self.fields.insert(descriptor.name.clone(), descriptor);
		self
	}

	pub fn field_with_accessor(
		mut self,
		descriptor: FieldDescriptor,
		accessor: FieldAccessor,
	) -> Self {
		self.accessors.insert(descriptor.name.clone(), accessor);
		self.field(descriptor)
	}

	pub fn constraint(mut self, constraint: Constraint) -> Self {
		self.constraints.push(constraint);
		self
	}

	pub fn index(mut self, index: IndexSpec) -> Self {
		self.indexes.push(index);
		self
	}

	pub fn cache_policy(mut self, policy: CachePolicy) -> Self {
		self.cache_policy = policy;
		self
	}

	pub fn factory(
		mut self,
		factory: impl Fn() -> Box<dyn Any + Send + Sync> + Send + Sync + 'static,
	) -> Self {
		self.factory = Some(Arc::new(factory));
		self
	}

	pub fn build(self) -> Result<SchemaDescriptor, SchemaError> {
		if let Some(field) = self.duplicate {
			return Err(SchemaError::DuplicateField {
				entity: self.entity,
				field,
			});
		}
		let mut primary_key: Option<String> = None;
		for field in self.fields.values() {
			if field.primary_key {
				if let Some(first) = &primary_key {
					return Err(SchemaError::DuplicatePrimaryKey {
						entity: self.entity,
						first: first.clone(),
						second: field.name.clone(),
					});
				}
				primary_key = Some(field.name.clone());
			}
		}
		let primary_key = primary_key.ok_or_else(|| SchemaError::MissingPrimaryKey {
			entity: self.entity.clone(),
		})?;

		for constraint in &self.constraints {
			for field in &constraint.fields {
				if !self.fields.contains_key(field) {
					return Err(SchemaError::UnknownConstraintField {
						entity: self.entity,
						constraint: constraint.name.clone(),
						field: field.clone(),
					});
				}
			}
		}
		for index in &self.indexes {
			for field in &index.fields {
				if !self.fields.contains_key(field) {
					return Err(SchemaError::UnknownIndexField {
						entity: self.entity,
						index: index.name.clone(),
						field: field.clone(),
					});
				}
			}
		}

		Ok(SchemaDescriptor {
			entity: self.entity,
			repository: self.repository,
			fields: self.fields,
			accessors: self.accessors,
			primary_key,
			constraints: self.constraints,
			indexes: self.indexes,
			cache_policy: self.cache_policy,
			factory: self.factory,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn id_field() -> FieldDescriptor {
		FieldDescriptor::new("id", FieldType::Int).primary_key()
	}

	#[test]
	fn build_requires_exactly_one_primary_key() {
		let err = SchemaDescriptor::builder("User", "users")
			.field(FieldDescriptor::new("name", FieldType::Text))
			.build()
			.unwrap_err();
		assert!(matches!(err, SchemaError::MissingPrimaryKey { .. }));

		let err = SchemaDescriptor::builder("User", "users")
			.field(id_field())
			.field(FieldDescriptor::new("other", FieldType::Int).primary_key())
			.build()
			.unwrap_err();
		assert!(matches!(err, SchemaError::DuplicatePrimaryKey { .. }));
	}

	#[test]
	fn duplicate_field_declarations_fail() {
		let err = SchemaDescriptor::builder("User", "users")
			.field(id_field())
			.field(FieldDescriptor::new("name", FieldType::Text))
			.field(FieldDescriptor::new("name", FieldType::Text))
			.build()
			.unwrap_err();
		assert!(matches!(err, SchemaError::DuplicateField { field, .. } if field == "name"));
	}

	#[test]
	fn constraint_fields_must_exist() {
		let err = SchemaDescriptor::builder("User", "users")
			.field(id_field())
			.constraint(Constraint {
				name: "uq_email".into(),
				fields: vec!["email".into()],
			})
			.build()
			.unwrap_err();
		assert!(matches!(err, SchemaError::UnknownConstraintField { .. }));
	}

	#[test]
	fn fields_keep_declaration_order() {
		let schema = SchemaDescriptor::builder("User", "users")
			.field(id_field())
			.field(FieldDescriptor::new("name", FieldType::Text))
			.field(FieldDescriptor::new("age", FieldType::Int))
			.build()
			.unwrap();
		let names: Vec<&str> = schema.fields().map(|f| f.name.as_str()).collect();
		assert_eq!(names, vec!["id", "name", "age"]);
		assert_eq!(schema.primary_key().name, "id");
	}

	#[test]
	fn back_reference_finds_foreign_ref() {
		let schema = SchemaDescriptor::builder("Player", "players")
			.field(id_field())
			.field(
				FieldDescriptor::new("team", FieldType::Reference("Team".into()))
					.relation(Relation::ManyToOne {
						target: "Team".into(),
					}),
			)
			.build()
			.unwrap();
		let back = schema.back_reference_to("Team").unwrap();
		assert_eq!(back.name, "team");
		assert!(schema.back_reference_to("Faction").is_none());
	}
}
