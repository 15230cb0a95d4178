//! SQL backend support for unibase
//!
//! Dialect profiles for MySQL, PostgreSQL and SQLite, plus the three pieces
//! a SQL adapter composes: the semantic validator, the query-to-statement
//! translator and the DDL generator. Everything operates on the portable
//! descriptors from `unibase-core`; no driver code lives here.

pub mod ddl;
pub mod dialect;
pub mod translate;
pub mod validator;

pub use ddl::DdlGenerator;
pub use dialect::{default_registry, SqlDialect};
pub use translate::{EntityStatement, SqlStatement, SqlTranslator};
pub use validator::SqlQueryValidator;
