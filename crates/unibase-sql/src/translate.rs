//! Portable query to SQL translation
//!
//! Translation is deterministic: the same descriptor always produces the
//! same SQL text and the same parameter order, so statements are cached per
//! query and backend drivers can reuse prepared statements. All values
//! travel as `?` placeholders; nothing from the query ever lands in the SQL
//! text itself.

use crate::dialect::SqlDialect;
use dashmap::DashMap;
use std::sync::Arc;
use unibase_core::query::{
	DeleteQuery, Filter, FilterExpr, Operator, Query, SelectQuery, SortDirection, UpdateQuery,
	UNBOUNDED,
};
use unibase_core::schema::{Relation, SchemaDescriptor};
use unibase_core::value::Value;

/// A translated statement: SQL text plus its positional parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlStatement {
	pub sql: String,
	pub params: Vec<Value>,
}

/// A statement template keyed to entity columns instead of a query; the
/// caller binds values from an encoded row in `columns` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityStatement {
	pub sql: String,
	pub columns: Vec<String>,
}

pub struct SqlTranslator {
	dialect: SqlDialect,
	schema: Arc<SchemaDescriptor>,
	cache: DashMap<Query, Arc<SqlStatement>>,
}

impl SqlTranslator {
	pub fn new(schema: Arc<SchemaDescriptor>, dialect: SqlDialect) -> Self {
		Self {
			dialect,
			schema,
			cache: DashMap::new(),
		}
	}

	pub fn dialect(&self) -> SqlDialect {
		self.dialect
	}

	fn table(&self) -> String {
		self.dialect.quote(self.schema.repository())
	}

	/// Translate any portable query, reusing a cached statement when the
	/// same descriptor was translated before.
	pub fn translate(&self, query: &Query) -> Arc<SqlStatement> {
		if let Some(cached) = self.cache.get(query) {
			return Arc::clone(cached.value());
		}
		let statement = Arc::new(match query {
			Query::Select(q) => self.translate_select(q),
			Query::Update(q) => self.translate_update(q),
			Query::Delete(q) => self.translate_delete(q),
		});
		self.cache.insert(query.clone(), Arc::clone(&statement));
		statement
	}

	pub fn translate_select(&self, query: &SelectQuery) -> SqlStatement {
		let projection = if query.columns.is_empty() {
			"*".to_owned()
		} else {
			query.columns.join(", ")
		};
		let mut sql = format!("SELECT {projection} FROM {}", self.table());
		let mut params = Vec::new();
		push_where(&mut sql, &mut params, &query.filters);
		if !query.sorts.is_empty() {
			let order: Vec<String> = query
				.sorts
				.iter()
				.map(|sort| {
					let direction = match sort.direction {
						SortDirection::Ascending => "ASC",
						SortDirection::Descending => "DESC",
					};
					format!("{} {direction}", sort.field)
				})
				.collect();
			sql.push_str(" ORDER BY ");
			sql.push_str(&order.join(", "));
		}
		if query.limit != UNBOUNDED {
			sql.push_str(&format!(" LIMIT {}", query.limit));
		}
		SqlStatement { sql, params }
	}

	pub fn translate_update(&self, query: &UpdateQuery) -> SqlStatement {
		let mut params = Vec::new();
		let assignments: Vec<String> = query
			.updates
			.iter()
			.map(|(field, value)| {
				params.push(value.clone());
				format!("{field} = ?")
			})
			.collect();
		let mut sql = format!(
			"UPDATE {} SET {}",
			self.table(),
			assignments.join(", ")
		);
		push_where(&mut sql, &mut params, &query.filters);
		SqlStatement { sql, params }
	}

	pub fn translate_delete(&self, query: &DeleteQuery) -> SqlStatement {
		let mut sql = format!("DELETE FROM {}", self.table());
		let mut params = Vec::new();
		push_where(&mut sql, &mut params, &query.filters);
		SqlStatement { sql, params }
	}

	/// INSERT template over the entity's scalar columns. Auto-generated
	/// columns are left to the backend; collection columns live in child
	/// tables and are skipped.
	pub fn insert_statement(&self) -> EntityStatement {
		let columns: Vec<String> = self
			.insertable_fields()
			.map(|name| name.to_owned())
			.collect();
		let placeholders = vec!["?"; columns.len()].join(", ");
		let sql = format!(
			"INSERT INTO {} ({}) VALUES ({})",
			self.table(),
			columns.join(", "),
			placeholders
		);
		EntityStatement { sql, columns }
	}

	/// UPDATE-by-primary-key template; the key binds last.
	pub fn update_by_pk(&self) -> EntityStatement {
		let pk = self.schema.primary_key().name.clone();
		let mut columns: Vec<String> = self
			.insertable_fields()
			.filter(|name| *name != pk)
			.map(|name| name.to_owned())
			.collect();
		let assignments: Vec<String> =
			columns.iter().map(|c| format!("{c} = ?")).collect();
		let sql = format!(
			"UPDATE {} SET {} WHERE {pk} = ?",
			self.table(),
			assignments.join(", ")
		);
		columns.push(pk);
		EntityStatement { sql, columns }
	}

	pub fn delete_by_pk(&self) -> EntityStatement {
		let pk = self.schema.primary_key().name.clone();
		let sql = format!("DELETE FROM {} WHERE {pk} = ?", self.table());
		EntityStatement {
			sql,
			columns: vec![pk],
		}
	}

	/// Scalar columns that belong in the main table, in declaration order.
	fn insertable_fields(&self) -> impl Iterator<Item = &str> {
		self.schema.fields().filter_map(|field| {
			if field.auto_generated || field.is_collection() {
				return None;
			}
			match &field.relation {
				// The foreign key lives on this table for many-to-one only.
				None | Some(Relation::ManyToOne { .. }) => Some(field.name.as_str()),
				Some(_) => None,
			}
		})
	}
}

fn push_where(sql: &mut String, params: &mut Vec<Value>, filters: &[FilterExpr]) {
	if filters.is_empty() {
		return;
	}
	let rendered: Vec<String> = filters
		.iter()
		.map(|expr| render_expr(expr, params, false))
		.collect();
	sql.push_str(" WHERE ");
	sql.push_str(&rendered.join(" AND "));
}

/// Render one expression node, collecting parameters in text order. Leaves
/// render bare; groups get parentheses only when nested under another node.
fn render_expr(expr: &FilterExpr, params: &mut Vec<Value>, nested: bool) -> String {
	match expr {
		FilterExpr::Cond(filter) => render_leaf(filter, params),
		FilterExpr::And(children) | FilterExpr::Or(children) => {
			let joiner = if matches!(expr, FilterExpr::And(_)) {
				" AND "
			} else {
				" OR "
			};
			let parts: Vec<String> = children
				.iter()
				.map(|child| render_expr(child, params, true))
				.collect();
			let body = parts.join(joiner);
			if nested || children.len() > 1 {
				format!("({body})")
			} else {
				body
			}
		}
		FilterExpr::Not(inner) => {
			format!("NOT {}", render_expr(inner, params, true))
		}
	}
}

fn render_leaf(filter: &Filter, params: &mut Vec<Value>) -> String {
	match filter.operator {
		Operator::In => {
			let items = match &filter.value {
				Value::List(items) => items.clone(),
				other => vec![other.clone()],
			};
			// `IN ()` is a syntax error everywhere; an empty list can
			// never match, so render a false predicate instead.
			if items.is_empty() {
				return "1 = 0".to_owned();
			}
			let placeholders = vec!["?"; items.len()].join(", ");
			params.extend(items);
			format!("{} IN ({placeholders})", filter.field)
		}
		operator => {
			params.push(filter.value.clone());
			format!("{} {} ?", filter.field, operator.as_str())
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use unibase_core::query::FilterTarget;
	use unibase_core::schema::{FieldDescriptor, FieldType};

	fn user_schema() -> Arc<SchemaDescriptor> {
		Arc::new(
			SchemaDescriptor::builder("User", "users")
				.field(
					FieldDescriptor::new("id", FieldType::Int)
						.primary_key()
						.auto_generated(),
				)
				.field(FieldDescriptor::new("name", FieldType::Text))
				.field(FieldDescriptor::new("age", FieldType::Int))
				.field(FieldDescriptor::new(
					"tags",
					FieldType::List(Box::new(FieldType::Text)),
				))
				.build()
				.unwrap(),
		)
	}

	fn translator(dialect: SqlDialect) -> SqlTranslator {
		SqlTranslator::new(user_schema(), dialect)
	}

	#[test]
	fn simple_select_uses_placeholders() {
		let query = Query::select().where_field("age").gte(18i64).build();
		let statement = translator(SqlDialect::Postgres).translate(&query);
		assert_eq!(statement.sql, r#"SELECT * FROM "users" WHERE age >= ?"#);
		assert_eq!(statement.params, vec![Value::Int(18)]);
	}

	#[test]
	fn mysql_quotes_with_backticks() {
		let query = Query::select().build();
		let statement = translator(SqlDialect::MySql).translate(&query);
		assert_eq!(statement.sql, "SELECT * FROM `users`");
	}

	#[test]
	fn translation_is_deterministic_and_cached() {
		let translator = translator(SqlDialect::Postgres);
		let query = Query::select()
			.where_field("age")
			.gte(18i64)
			.where_field("name")
			.like("a%")
			.build();
		let first = translator.translate(&query);
		let second = translator.translate(&query);
		assert_eq!(first.sql, second.sql);
		assert_eq!(first.params, second.params);
		// Same descriptor hits the cache and reuses the allocation.
		assert!(Arc::ptr_eq(&first, &second));
	}

	#[test]
	fn cache_is_keyed_by_the_full_descriptor() {
		let translator = translator(SqlDialect::Postgres);
		let adults = Query::select().where_field("age").gte(18i64).build();
		let seniors = Query::select().where_field("age").gte(65i64).build();
		let first_adults = translator.translate(&adults);
		let first_seniors = translator.translate(&seniors);
		assert_ne!(first_adults.params, first_seniors.params);
		// Each descriptor reuses its own entry, never the other's.
		assert!(Arc::ptr_eq(&first_adults, &translator.translate(&adults)));
		assert!(Arc::ptr_eq(&first_seniors, &translator.translate(&seniors)));
	}

	#[test]
	fn empty_in_list_renders_a_never_matching_predicate() {
		let query = Query::select()
			.where_field("id")
			.within(Vec::<i64>::new())
			.build();
		let statement = translator(SqlDialect::Postgres).translate(&query);
		assert_eq!(statement.sql, r#"SELECT * FROM "users" WHERE 1 = 0"#);
		assert!(statement.params.is_empty());
	}

	#[test]
	fn in_filters_expand_one_placeholder_per_element() {
		let query = Query::select()
			.where_field("id")
			.within([1i64, 2, 3])
			.build();
		let statement = translator(SqlDialect::Postgres).translate(&query);
		assert_eq!(
			statement.sql,
			r#"SELECT * FROM "users" WHERE id IN (?, ?, ?)"#
		);
		assert_eq!(
			statement.params,
			vec![Value::Int(1), Value::Int(2), Value::Int(3)]
		);
	}

	#[test]
	fn grouped_filters_are_parenthesized() {
		let query = Query::select()
			.where_expr(FilterExpr::or([
				FilterExpr::cond("age", Operator::Lt, 13i64),
				FilterExpr::cond("age", Operator::Gt, 64i64),
			]))
			.where_field("name")
			.ne("root")
			.build();
		let statement = translator(SqlDialect::Postgres).translate(&query);
		assert_eq!(
			statement.sql,
			r#"SELECT * FROM "users" WHERE (age < ? OR age > ?) AND name != ?"#
		);
		assert_eq!(
			statement.params,
			vec![Value::Int(13), Value::Int(64), Value::Text("root".into())]
		);
	}

	#[test]
	fn negation_renders_with_not() {
		let query = Query::delete()
			.where_expr(FilterExpr::negate(FilterExpr::cond(
				"name",
				Operator::Eq,
				"admin",
			)))
			.build();
		let statement = translator(SqlDialect::Postgres).translate(&query);
		assert_eq!(
			statement.sql,
			r#"DELETE FROM "users" WHERE NOT name = ?"#
		);
	}

	#[test]
	fn sort_and_limit_render_in_order() {
		let query = Query::select()
			.order_by("name", SortDirection::Ascending)
			.order_by("age", SortDirection::Descending)
			.limit(20)
			.build();
		let statement = translator(SqlDialect::Postgres).translate(&query);
		assert_eq!(
			statement.sql,
			r#"SELECT * FROM "users" ORDER BY name ASC, age DESC LIMIT 20"#
		);
	}

	#[test]
	fn unbounded_limit_is_elided() {
		let query = Query::select().build();
		let statement = translator(SqlDialect::Postgres).translate(&query);
		assert!(!statement.sql.contains("LIMIT"));
	}

	#[test]
	fn projection_lists_requested_columns() {
		let query = Query::select().columns(["id", "name"]).build();
		let statement = translator(SqlDialect::Postgres).translate(&query);
		assert_eq!(statement.sql, r#"SELECT id, name FROM "users""#);
	}

	#[test]
	fn update_renders_assignments_then_filters() {
		let query = Query::update()
			.set("name", "bob")
			.set("age", 42i64)
			.where_field("id")
			.eq(7i64)
			.build();
		let statement = translator(SqlDialect::Postgres).translate(&query);
		assert_eq!(
			statement.sql,
			r#"UPDATE "users" SET name = ?, age = ? WHERE id = ?"#
		);
		assert_eq!(
			statement.params,
			vec![Value::Text("bob".into()), Value::Int(42), Value::Int(7)]
		);
	}

	#[test]
	fn insert_skips_generated_and_collection_columns() {
		let statement = translator(SqlDialect::Postgres).insert_statement();
		assert_eq!(
			statement.sql,
			r#"INSERT INTO "users" (name, age) VALUES (?, ?)"#
		);
		assert_eq!(statement.columns, vec!["name", "age"]);
	}

	#[test]
	fn update_by_pk_binds_the_key_last() {
		let statement = translator(SqlDialect::Postgres).update_by_pk();
		assert_eq!(
			statement.sql,
			r#"UPDATE "users" SET name = ?, age = ? WHERE id = ?"#
		);
		assert_eq!(statement.columns, vec!["name", "age", "id"]);
	}

	#[test]
	fn delete_by_pk_targets_one_row() {
		let statement = translator(SqlDialect::Postgres).delete_by_pk();
		assert_eq!(statement.sql, r#"DELETE FROM "users" WHERE id = ?"#);
	}
}
