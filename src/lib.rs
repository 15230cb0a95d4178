//! # Unibase
//!
//! A storage-agnostic data-access layer: one portable query algebra,
//! translated per backend into SQL dialects, document filters or CQL.
//!
//! Applications describe entities with explicit [`schema`] descriptors,
//! build queries with the fluent builders in [`query`], and hand both to a
//! backend adapter. Before execution, a backend-aware validator estimates
//! whether the query can run on that backend at all; translation itself is
//! deterministic and cached.
//!
//! ## Crate layout
//!
//! - `unibase-core` (re-exported at the root): the query algebra, schema
//!   descriptors, validation verdicts, the type resolver registry, the data
//!   context, relationship resolution and the entity materializer
//! - [`sql`]: dialect profiles, SQL validation, statement translation and
//!   DDL generation for MySQL, PostgreSQL and SQLite
//! - [`nosql`]: the same roles for document and wide-column stores
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use unibase::query::{FilterTarget, Query};
//! use unibase::schema::{FieldDescriptor, FieldType, SchemaDescriptor};
//! use unibase::sql::{SqlDialect, SqlQueryValidator, SqlTranslator};
//! use unibase::validate::QueryValidator;
//!
//! let schema = Arc::new(
//! 	SchemaDescriptor::builder("User", "users")
//! 		.field(FieldDescriptor::new("id", FieldType::Int).primary_key())
//! 		.field(FieldDescriptor::new("age", FieldType::Int))
//! 		.build()
//! 		.unwrap(),
//! );
//!
//! let query = Query::select().where_field("age").gte(18i64).build();
//!
//! let validator = SqlQueryValidator::new(Arc::clone(&schema), SqlDialect::Postgres);
//! assert!(validator.validate(&query).is_pass());
//!
//! let translator = SqlTranslator::new(schema, SqlDialect::Postgres);
//! let statement = translator.translate(&query);
//! assert_eq!(statement.sql, r#"SELECT * FROM "users" WHERE age >= ?"#);
//! ```

pub use unibase_core::*;

pub mod sql {
	//! SQL backend support; see the `unibase-sql` crate.
	pub use unibase_sql::*;
}

pub mod nosql {
	//! Document and wide-column backend support; see the `unibase-nosql`
	//! crate.
	pub use unibase_nosql::*;
}
