//! Backend-neutral core of unibase
//!
//! This crate defines everything that does not depend on a concrete storage
//! backend: the portable query algebra, explicit schema descriptors, the
//! validation verdict types, the type resolver registry, the data context,
//! relationship resolution with caching and deferred handles, and the
//! entity materializer. The `unibase-sql` and `unibase-nosql` crates build
//! backend-specific validators and translators on top of these types.

pub mod adapter;
pub mod context;
pub mod error;
pub mod materialize;
pub mod query;
pub mod relations;
pub mod resolve;
pub mod schema;
pub mod validate;
pub mod value;

pub use adapter::{Adapter, TransactionContext};
pub use context::{DataContext, DataContextBuilder};
pub use error::{AdapterError, ConfigError, MaterializeError, ResolveError, SchemaError};
pub use materialize::EntityMaterializer;
pub use query::{
	DeleteQuery, Filter, FilterExpr, FilterTarget, Operator, Query, SelectQuery, SortDirection,
	SortSpec, UpdateQuery, UNBOUNDED,
};
pub use relations::{CacheSnapshot, Lazy, RelationValue, RelationshipResolver};
pub use resolve::{TypeResolver, TypeResolverRegistry};
pub use schema::{
	AccessorError, CachePolicy, Constraint, FieldAccessor, FieldDescriptor, FieldType, FieldValue,
	ForeignRef, IndexKind, IndexSpec, ReferentialAction, Relation, SchemaDescriptor, SharedEntity,
};
pub use validate::{QueryValidator, ValidationEstimation, ValidationResult};
pub use value::{Row, Value};
