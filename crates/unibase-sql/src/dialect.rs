//! SQL dialect profiles
//!
//! The translator and DDL generator are dialect-parameterized rather than
//! per-engine: a [`SqlDialect`] captures the handful of syntax differences
//! that matter (identifier quoting, auto-increment syntax, array support),
//! and [`default_registry`] maps the semantic field types onto each
//! engine's column types.

use unibase_core::error::ResolveError;
use unibase_core::resolve::{TypeResolver, TypeResolverRegistry};
use unibase_core::schema::FieldType;
use unibase_core::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDialect {
	MySql,
	Postgres,
	Sqlite,
}

impl SqlDialect {
	pub fn name(&self) -> &'static str {
		match self {
			SqlDialect::MySql => "mysql",
			SqlDialect::Postgres => "postgres",
			SqlDialect::Sqlite => "sqlite",
		}
	}

	/// Identifier quote character.
	pub fn quote_char(&self) -> char {
		match self {
			SqlDialect::MySql => '`',
			SqlDialect::Postgres | SqlDialect::Sqlite => '"',
		}
	}

	pub fn auto_increment_keyword(&self) -> &'static str {
		match self {
			SqlDialect::MySql => "AUTO_INCREMENT",
			SqlDialect::Postgres => "GENERATED ALWAYS AS IDENTITY",
			SqlDialect::Sqlite => "AUTOINCREMENT",
		}
	}

	pub fn supports_arrays(&self) -> bool {
		matches!(self, SqlDialect::Postgres)
	}

	/// Quote an identifier for this dialect.
	pub fn quote(&self, identifier: &str) -> String {
		let q = self.quote_char();
		format!("{q}{identifier}{q}")
	}
}

/// Default type registry for one dialect.
pub fn default_registry(dialect: SqlDialect) -> TypeResolverRegistry {
	let registry = TypeResolverRegistry::new();
	match dialect {
		SqlDialect::MySql => {
			registry.register(FieldType::Bool, TypeResolver::passthrough("TINYINT(1)"));
			registry.register(FieldType::Int, TypeResolver::passthrough("BIGINT"));
			registry.register(FieldType::Float, TypeResolver::passthrough("DOUBLE"));
			registry.register(FieldType::Text, TypeResolver::passthrough("TEXT"));
			registry.register(FieldType::Bytes, TypeResolver::passthrough("BLOB"));
			registry.register(FieldType::Uuid, uuid_as_text("CHAR(36)"));
			registry.register(FieldType::Timestamp, TypeResolver::passthrough("DATETIME"));
		}
		SqlDialect::Postgres => {
			registry.register(FieldType::Bool, TypeResolver::passthrough("BOOLEAN"));
			registry.register(FieldType::Int, TypeResolver::passthrough("BIGINT"));
			registry.register(
				FieldType::Float,
				TypeResolver::passthrough("DOUBLE PRECISION"),
			);
			registry.register(FieldType::Text, TypeResolver::passthrough("TEXT"));
			registry.register(FieldType::Bytes, TypeResolver::passthrough("BYTEA"));
			registry.register(FieldType::Uuid, TypeResolver::passthrough("UUID"));
			registry.register(
				FieldType::Timestamp,
				TypeResolver::passthrough("TIMESTAMPTZ"),
			);
		}
		SqlDialect::Sqlite => {
			registry.register(FieldType::Bool, bool_as_int());
			registry.register(FieldType::Int, TypeResolver::passthrough("INTEGER"));
			registry.register(FieldType::Float, TypeResolver::passthrough("REAL"));
			registry.register(FieldType::Text, TypeResolver::passthrough("TEXT"));
			registry.register(FieldType::Bytes, TypeResolver::passthrough("BLOB"));
			registry.register(FieldType::Uuid, uuid_as_text("TEXT"));
			registry.register(FieldType::Timestamp, timestamp_as_text());
		}
	}
	registry
}

/// UUIDs stored as their canonical hyphenated text form.
fn uuid_as_text(storage_type: &str) -> TypeResolver {
	TypeResolver::new(
		storage_type,
		|value| match value {
			Value::Uuid(u) => Ok(Value::Text(u.to_string())),
			other => Err(ResolveError::Encode {
				kind: other.kind(),
				storage_type: "uuid text".into(),
				message: "expected a uuid".into(),
			}),
		},
		|value| match value {
			Value::Text(s) => s
				.parse()
				.map(Value::Uuid)
				.map_err(|e: uuid::Error| ResolveError::Decode {
					kind: "text",
					type_name: "uuid".into(),
					message: e.to_string(),
				}),
			Value::Uuid(u) => Ok(Value::Uuid(*u)),
			other => Err(ResolveError::Decode {
				kind: other.kind(),
				type_name: "uuid".into(),
				message: "expected uuid text".into(),
			}),
		},
	)
}

/// SQLite has no boolean affinity; store 0/1.
fn bool_as_int() -> TypeResolver {
	TypeResolver::new(
		"INTEGER",
		|value| match value {
			Value::Bool(b) => Ok(Value::Int(*b as i64)),
			other => Err(ResolveError::Encode {
				kind: other.kind(),
				storage_type: "INTEGER".into(),
				message: "expected a bool".into(),
			}),
		},
		|value| match value {
			Value::Int(i) => Ok(Value::Bool(*i != 0)),
			Value::Bool(b) => Ok(Value::Bool(*b)),
			other => Err(ResolveError::Decode {
				kind: other.kind(),
				type_name: "bool".into(),
				message: "expected 0 or 1".into(),
			}),
		},
	)
}

/// SQLite timestamps stored as RFC 3339 text.
fn timestamp_as_text() -> TypeResolver {
	TypeResolver::new(
		"TEXT",
		|value| match value {
			Value::Timestamp(t) => Ok(Value::Text(t.to_rfc3339())),
			other => Err(ResolveError::Encode {
				kind: other.kind(),
				storage_type: "TEXT".into(),
				message: "expected a timestamp".into(),
			}),
		},
		|value| match value {
			Value::Text(s) => chrono::DateTime::parse_from_rfc3339(s)
				.map(|t| Value::Timestamp(t.with_timezone(&chrono::Utc)))
				.map_err(|e| ResolveError::Decode {
					kind: "text",
					type_name: "timestamp".into(),
					message: e.to_string(),
				}),
			Value::Timestamp(t) => Ok(Value::Timestamp(*t)),
			other => Err(ResolveError::Decode {
				kind: other.kind(),
				type_name: "timestamp".into(),
				message: "expected rfc3339 text".into(),
			}),
		},
	)
}
