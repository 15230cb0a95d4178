//! SQL semantic validation
//!
//! Estimates whether a portable query can run on a SQL backend before any
//! translation happens. Checks run in a fixed order: unknown fields, then
//! operator vocabulary, then a text-payload injection heuristic, then the
//! destructive-query guards. Advisory findings (legal but likely slow
//! queries) are logged as warnings and never fail the estimation.

use crate::dialect::SqlDialect;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use unibase_core::query::{
	DeleteQuery, Filter, FilterExpr, Operator, SelectQuery, UpdateQuery, UNBOUNDED,
};
use unibase_core::schema::SchemaDescriptor;
use unibase_core::validate::{QueryValidator, ValidationEstimation};
use unibase_core::value::Value;

/// Conservative first-pass screen for SQL metacharacters and keywords in
/// text payloads. Parameterized execution is the real defense; this catches
/// values that were concatenated from user input upstream.
static INJECTION_PATTERN: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"(?i)('|--|/\*|;|\bOR\b|\bAND\b|\bUNION\b|\bDROP\b|\bDELETE\b|\bINSERT\b|\bUPDATE\b)")
		.expect("injection pattern is valid")
});

const LIMIT_WARN_THRESHOLD: i64 = 50_000;
const SQLITE_LIMIT_WARN_THRESHOLD: i64 = 10_000;

pub struct SqlQueryValidator {
	schema: Arc<SchemaDescriptor>,
	dialect: SqlDialect,
}

impl SqlQueryValidator {
	pub fn new(schema: Arc<SchemaDescriptor>, dialect: SqlDialect) -> Self {
		Self { schema, dialect }
	}

	fn field_exists(&self, name: &str) -> bool {
		self.schema.field(name).is_some()
	}

	fn is_indexed(&self, name: &str) -> bool {
		let Some(field) = self.schema.field(name) else {
			return false;
		};
		field.primary_key
			|| field.unique
			|| field.indexed
			|| self
				.schema
				.indexes()
				.iter()
				.any(|index| index.fields.iter().any(|f| f == name))
	}

	/// Unknown fields and unsupported operators across every filter leaf.
	fn check_filters(&self, filters: &[FilterExpr]) -> Option<ValidationEstimation> {
		let mut verdict = None;
		for expr in filters {
			expr.visit_leaves(&mut |leaf: &Filter| {
				if verdict.is_some() {
					return;
				}
				if !self.field_exists(&leaf.field) {
					verdict = Some(ValidationEstimation::fail(format!(
						"unknown field '{}' on entity '{}'",
						leaf.field,
						self.schema.entity()
					)));
					return;
				}
				if matches!(leaf.operator, Operator::Regex | Operator::Exists) {
					verdict = Some(ValidationEstimation::fail(format!(
						"operator {} is not supported on SQL backends",
						leaf.operator
					)));
					return;
				}
				if leaf.operator == Operator::In
					&& matches!(&leaf.value, Value::List(items) if items.is_empty())
				{
					verdict = Some(ValidationEstimation::fail(format!(
						"IN filter on '{}' has an empty value list",
						leaf.field
					)));
					return;
				}
				if let Some(found) = suspicious_text(&leaf.value) {
					verdict = Some(ValidationEstimation::fail(format!(
						"filter on '{}' contains suspicious SQL fragment '{}'",
						leaf.field, found
					)));
				}
			});
			if verdict.is_some() {
				break;
			}
		}
		verdict
	}

	fn has_indexed_filter(&self, filters: &[FilterExpr]) -> bool {
		filters.iter().any(|expr| {
			let mut indexed = false;
			expr.visit_leaves(&mut |leaf| indexed |= self.is_indexed(&leaf.field));
			indexed
		})
	}

	fn warn_slow_filters(&self, filters: &[FilterExpr], operation: &str) {
		for expr in filters {
			expr.visit_leaves(&mut |leaf| {
				if leaf.operator == Operator::Like {
					if let Some(pattern) = leaf.value.as_text() {
						if pattern.starts_with('%') {
							tracing::warn!(
								entity = self.schema.entity(),
								field = %leaf.field,
								operation,
								"LIKE pattern with a leading wildcard cannot use an index"
							);
						}
					}
					if !self.is_indexed(&leaf.field) {
						tracing::warn!(
							entity = self.schema.entity(),
							field = %leaf.field,
							operation,
							"LIKE on an unindexed field forces a full scan"
						);
					}
				}
			});
		}
	}
}

impl QueryValidator for SqlQueryValidator {
	fn validate_select(&self, query: &SelectQuery) -> ValidationEstimation {
		for column in &query.columns {
			if !self.field_exists(column) {
				return ValidationEstimation::fail(format!(
					"unknown column '{}' on entity '{}'",
					column,
					self.schema.entity()
				));
			}
		}
		for sort in &query.sorts {
			if !self.field_exists(&sort.field) {
				return ValidationEstimation::fail(format!(
					"unknown sort field '{}' on entity '{}'",
					sort.field,
					self.schema.entity()
				));
			}
		}
		if let Some(verdict) = self.check_filters(&query.filters) {
			return verdict;
		}
		if query.limit == 0 || query.limit < UNBOUNDED {
			return ValidationEstimation::fail(format!(
				"limit {} selects nothing",
				query.limit
			));
		}

		if query.limit > LIMIT_WARN_THRESHOLD {
			tracing::warn!(
				entity = self.schema.entity(),
				limit = query.limit,
				"very large result limit"
			);
		}
		if self.dialect == SqlDialect::Sqlite
			&& query.limit > SQLITE_LIMIT_WARN_THRESHOLD
		{
			tracing::warn!(
				entity = self.schema.entity(),
				limit = query.limit,
				"large limit on sqlite, result paging is advisable"
			);
		}
		if self.dialect == SqlDialect::MySql && query.limit != UNBOUNDED && query.sorts.is_empty() {
			tracing::warn!(
				entity = self.schema.entity(),
				"LIMIT without ORDER BY returns nondeterministic rows on mysql"
			);
		}
		if query.filters.is_empty() {
			for sort in &query.sorts {
				if !self.is_indexed(&sort.field) {
					tracing::warn!(
						entity = self.schema.entity(),
						field = %sort.field,
						"unfiltered sort on an unindexed field sorts the whole table"
					);
				}
			}
		}
		self.warn_slow_filters(&query.filters, "select");
		ValidationEstimation::pass()
	}

	fn validate_update(&self, query: &UpdateQuery) -> ValidationEstimation {
		if query.updates.is_empty() {
			return ValidationEstimation::fail("update sets no fields");
		}
		let pk = &self.schema.primary_key().name;
		for (field, value) in &query.updates {
			if !self.field_exists(field) {
				return ValidationEstimation::fail(format!(
					"unknown field '{}' on entity '{}'",
					field,
					self.schema.entity()
				));
			}
			if field == pk {
				return ValidationEstimation::fail(format!(
					"primary key '{pk}' cannot be updated"
				));
			}
			if let Some(found) = suspicious_text(value) {
				return ValidationEstimation::fail(format!(
					"update of '{field}' contains suspicious SQL fragment '{found}'"
				));
			}
		}
		if let Some(verdict) = self.check_filters(&query.filters) {
			return verdict;
		}
		if query.filters.is_empty() {
			return ValidationEstimation::fail(
				"update without WHERE would touch every row",
			);
		}

		if !self.has_indexed_filter(&query.filters) {
			tracing::warn!(
				entity = self.schema.entity(),
				"update filtered only by unindexed fields"
			);
		}
		self.warn_slow_filters(&query.filters, "update");
		ValidationEstimation::pass()
	}

	fn validate_delete(&self, query: &DeleteQuery) -> ValidationEstimation {
		if let Some(verdict) = self.check_filters(&query.filters) {
			return verdict;
		}
		if query.filters.is_empty() {
			return ValidationEstimation::fail(
				"delete without WHERE would remove every row",
			);
		}

		if !self.has_indexed_filter(&query.filters) {
			tracing::warn!(
				entity = self.schema.entity(),
				"delete filtered only by unindexed fields"
			);
		}
		self.warn_slow_filters(&query.filters, "delete");
		ValidationEstimation::pass()
	}
}

/// First suspicious fragment found in a text payload, searching lists
/// element-wise.
fn suspicious_text(value: &Value) -> Option<String> {
	match value {
		Value::Text(s) => INJECTION_PATTERN
			.find(s)
			.map(|m| m.as_str().to_owned()),
		Value::List(items) => items.iter().find_map(suspicious_text),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use unibase_core::query::{FilterTarget, Query, SortDirection};
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
				.field(FieldDescriptor::new("email", FieldType::Text).unique())
				.field(FieldDescriptor::new("age", FieldType::Int))
				.build()
				.unwrap(),
		)
	}

	fn validator(dialect: SqlDialect) -> SqlQueryValidator {
		SqlQueryValidator::new(user_schema(), dialect)
	}

	#[test]
	fn plain_select_passes() {
		let query = Query::select().where_field("age").gte(18i64).build();
		assert!(validator(SqlDialect::Postgres).validate(&query).is_pass());
	}

	#[test]
	fn select_with_default_limit_passes() {
		let query = Query::select().build();
		assert!(validator(SqlDialect::Postgres).validate(&query).is_pass());
	}

	#[rstest]
	#[case(0)]
	#[case(-2)]
	fn degenerate_limits_fail(#[case] limit: i64) {
		let query = Query::select().limit(limit).build();
		let verdict = validator(SqlDialect::Postgres).validate(&query);
		assert!(verdict.is_fail());
		assert!(verdict.reason().contains("limit"));
	}

	#[test]
	fn unknown_filter_field_fails_with_the_name() {
		let query = Query::select().where_field("nickname").eq("x").build();
		let verdict = validator(SqlDialect::Postgres).validate(&query);
		assert!(verdict.is_fail());
		assert!(verdict.reason().contains("nickname"));
	}

	#[rstest]
	#[case(Operator::Regex)]
	#[case(Operator::Exists)]
	fn document_operators_are_rejected(#[case] operator: Operator) {
		let query = Query::select().filter("name", operator, "x").build();
		let verdict = validator(SqlDialect::Postgres).validate(&query);
		assert!(verdict.is_fail());
		assert!(verdict.reason().contains("not supported"));
	}

	#[rstest]
	#[case("'; DROP TABLE users")]
	#[case("a OR b")]
	#[case("x -- comment")]
	#[case("1 UNION SELECT")]
	fn injection_fragments_fail(#[case] payload: &str) {
		let query = Query::select().where_field("name").eq(payload).build();
		let verdict = validator(SqlDialect::Postgres).validate(&query);
		assert!(verdict.is_fail());
		assert!(verdict.reason().contains("suspicious"));
	}

	#[test]
	fn empty_in_list_fails_with_the_field_name() {
		let query = Query::select()
			.where_field("id")
			.within(Vec::<i64>::new())
			.build();
		let verdict = validator(SqlDialect::Postgres).validate(&query);
		assert!(verdict.is_fail());
		assert!(verdict.reason().contains("id"));
		assert!(verdict.reason().contains("empty"));
	}

	#[test]
	fn injection_check_covers_in_lists() {
		let query = Query::select()
			.where_field("name")
			.within(["alice", "bob'; --"])
			.build();
		assert!(validator(SqlDialect::Postgres).validate(&query).is_fail());
	}

	#[test]
	fn delete_without_filters_fails() {
		let query = Query::delete().build();
		let verdict = validator(SqlDialect::Postgres).validate(&query);
		assert!(verdict.is_fail());
		assert!(verdict.reason().contains("without WHERE"));
	}

	#[test]
	fn update_without_filters_fails() {
		let query = Query::update().set("age", 21i64).build();
		let verdict = validator(SqlDialect::Postgres).validate(&query);
		assert!(verdict.is_fail());
		assert!(verdict.reason().contains("without WHERE"));
	}

	#[test]
	fn update_of_the_primary_key_fails() {
		let query = Query::update()
			.set("id", 2i64)
			.where_field("id")
			.eq(1i64)
			.build();
		let verdict = validator(SqlDialect::Postgres).validate(&query);
		assert!(verdict.is_fail());
		assert!(verdict.reason().contains("primary key"));
	}

	#[test]
	fn update_setting_nothing_fails() {
		let query = Query::update().where_field("id").eq(1i64).build();
		let verdict = validator(SqlDialect::Postgres).validate(&query);
		assert!(verdict.is_fail());
		assert!(verdict.reason().contains("no fields"));
	}

	#[test]
	fn advisory_findings_never_fail() {
		// Large limit, unindexed sort, LIKE with a leading wildcard: all
		// legal, all merely warned about.
		let query = Query::select()
			.where_field("name")
			.like("%smith")
			.order_by("age", SortDirection::Ascending)
			.limit(60_000)
			.build();
		assert!(validator(SqlDialect::MySql).validate(&query).is_pass());
		assert!(validator(SqlDialect::Sqlite).validate(&query).is_pass());
	}
}
