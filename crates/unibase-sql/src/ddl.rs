//! Schema to DDL generation
//!
//! Emits `CREATE TABLE` / `CREATE INDEX` statements from a schema
//! descriptor. Collection fields become child tables keyed by the owner's
//! primary key, except lists on PostgreSQL which map to native array
//! columns. Many-to-one fields become foreign-key columns typed after the
//! target's primary key, which is why generation needs the data context.

use crate::dialect::SqlDialect;
use std::sync::Arc;
use unibase_core::context::DataContext;
use unibase_core::error::ConfigError;
use unibase_core::resolve::TypeResolverRegistry;
use unibase_core::schema::{
	FieldDescriptor, FieldType, IndexKind, IndexSpec, Relation, SchemaDescriptor,
};
use unibase_core::value::Value;

pub struct DdlGenerator {
	dialect: SqlDialect,
	registry: Arc<TypeResolverRegistry>,
	if_not_exists: bool,
}

impl DdlGenerator {
	pub fn new(dialect: SqlDialect, registry: Arc<TypeResolverRegistry>) -> Self {
		Self {
			dialect,
			registry,
			if_not_exists: false,
		}
	}

	pub fn if_not_exists(mut self) -> Self {
		self.if_not_exists = true;
		self
	}

	fn create_prefix(&self) -> &'static str {
		if self.if_not_exists {
			"CREATE TABLE IF NOT EXISTS"
		} else {
			"CREATE TABLE"
		}
	}

	/// Main table plus one child table per non-inline collection field.
	pub fn create_table(
		&self,
		schema: &SchemaDescriptor,
		context: &DataContext,
	) -> Result<Vec<String>, ConfigError> {
		let mut columns = Vec::new();
		let mut table_constraints = Vec::new();
		let mut child_tables = Vec::new();

		for field in schema.fields() {
			match &field.relation {
				None => {}
				Some(Relation::ManyToOne { target }) => {
					let target_schema = context.require_schema(target)?;
					let pk_type = &target_schema.primary_key().field_type;
					columns.push(self.column_def(field, &self.storage_type(pk_type)));
					table_constraints.push(self.foreign_key_clause(field, target_schema));
					continue;
				}
				// The owning column lives on the other side.
				Some(_) => continue,
			}

			match &field.field_type {
				FieldType::List(elem) if self.dialect.supports_arrays() => {
					let array_type = format!("{}[]", self.storage_type(elem));
					columns.push(self.column_def(field, &array_type));
				}
				FieldType::List(elem) => {
					child_tables.push(self.child_table(schema, field, None, elem));
				}
				FieldType::Map(key, value) => {
					child_tables.push(self.child_table(schema, field, Some(key), value));
				}
				other => {
					columns.push(self.column_def(field, &self.storage_type(other)));
				}
			}
		}

		for constraint in schema.constraints() {
			table_constraints.push(format!(
				"CONSTRAINT {} UNIQUE ({})",
				constraint.name,
				constraint.fields.join(", ")
			));
		}

		let mut body = columns;
		body.extend(table_constraints);
		let mut statements = vec![format!(
			"{} {} ({})",
			self.create_prefix(),
			self.dialect.quote(schema.repository()),
			body.join(", ")
		)];
		statements.extend(child_tables);
		Ok(statements)
	}

	pub fn create_index(&self, schema: &SchemaDescriptor, index: &IndexSpec) -> String {
		let unique = match index.kind {
			IndexKind::Unique => "UNIQUE ",
			IndexKind::Normal => "",
		};
		format!(
			"CREATE {unique}INDEX {} ON {} ({})",
			index.name,
			self.dialect.quote(schema.repository()),
			index.fields.join(", ")
		)
	}

	fn storage_type(&self, field_type: &FieldType) -> String {
		self.registry.storage_type(field_type)
	}

	fn column_def(&self, field: &FieldDescriptor, storage_type: &str) -> String {
		let mut def = format!("{} {storage_type}", field.name);
		if field.primary_key {
			def.push_str(" PRIMARY KEY");
			if field.auto_generated {
				def.push(' ');
				def.push_str(self.dialect.auto_increment_keyword());
			}
		} else {
			if field.not_null {
				def.push_str(" NOT NULL");
			}
			if field.unique {
				def.push_str(" UNIQUE");
			}
		}
		if field.timestamp_default {
			def.push_str(" DEFAULT CURRENT_TIMESTAMP");
		} else if let Some(default) = &field.default {
			if let Some(literal) = sql_literal(default) {
				def.push_str(&format!(" DEFAULT {literal}"));
			}
		}
		if let Some(check) = &field.check {
			def.push_str(&format!(" CHECK ({check})"));
		}
		def
	}

	fn foreign_key_clause(
		&self,
		field: &FieldDescriptor,
		target_schema: &SchemaDescriptor,
	) -> String {
		let mut clause = format!(
			"FOREIGN KEY ({}) REFERENCES {} ({})",
			field.name,
			self.dialect.quote(target_schema.repository()),
			target_schema.primary_key().name
		);
		if let Some(foreign_ref) = &field.foreign_ref {
			if let Some(action) = foreign_ref.on_delete {
				clause.push_str(&format!(" ON DELETE {}", action.as_sql()));
			}
			if let Some(action) = foreign_ref.on_update {
				clause.push_str(&format!(" ON UPDATE {}", action.as_sql()));
			}
		}
		clause
	}

	/// Child table holding one collection field, keyed by the owner's
	/// primary key.
	fn child_table(
		&self,
		schema: &SchemaDescriptor,
		field: &FieldDescriptor,
		key_type: Option<&FieldType>,
		value_type: &FieldType,
	) -> String {
		let owner_pk = schema.primary_key();
		let owner_column = format!("{}_{}", schema.repository(), owner_pk.name);
		let mut columns = vec![format!(
			"{owner_column} {} NOT NULL",
			self.storage_type(&owner_pk.field_type)
		)];
		if let Some(key_type) = key_type {
			columns.push(format!("entry_key {} NOT NULL", self.storage_type(key_type)));
		}
		columns.push(format!("entry_value {}", self.storage_type(value_type)));
		columns.push(format!(
			"FOREIGN KEY ({owner_column}) REFERENCES {} ({}) ON DELETE CASCADE",
			self.dialect.quote(schema.repository()),
			owner_pk.name
		));
		format!(
			"{} {} ({})",
			self.create_prefix(),
			self.dialect
				.quote(&format!("{}_{}", schema.repository(), field.name)),
			columns.join(", ")
		)
	}
}

/// Render a default value as a SQL literal; unsupported kinds are omitted
/// from the column definition.
fn sql_literal(value: &Value) -> Option<String> {
	match value {
		Value::Bool(b) => Some(if *b { "TRUE".into() } else { "FALSE".into() }),
		Value::Int(i) => Some(i.to_string()),
		Value::Float(x) => Some(x.to_string()),
		Value::Text(s) => Some(format!("'{}'", s.replace('\'', "''"))),
		_ => None,
	}
}
