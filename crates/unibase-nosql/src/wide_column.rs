//! Wide-column store translation and validation
//!
//! Targets Cassandra-style stores, where the storage model constrains the
//! queries much harder than SQL does: filters and sorts are only legal on
//! partition-key or indexed columns, and only plain secondary indexes
//! exist. Translation produces CQL text with `?` placeholders; CQL never
//! quotes identifiers the way SQL dialects do.

use std::sync::Arc;
use thiserror::Error;
use unibase_core::query::{
	DeleteQuery, Filter, FilterExpr, Operator, SelectQuery, SortDirection, UpdateQuery, UNBOUNDED,
};
use unibase_core::schema::{IndexKind, IndexSpec, Relation, SchemaDescriptor};
use unibase_core::validate::{QueryValidator, ValidationEstimation};
use unibase_core::value::Value;

#[derive(Debug, Error)]
pub enum WideColumnDdlError {
	#[error("index '{0}' has a kind other than NORMAL, which wide-column stores cannot create")]
	UnsupportedIndexKind(String),
}

pub struct WideColumnValidator {
	schema: Arc<SchemaDescriptor>,
}

impl WideColumnValidator {
	pub fn new(schema: Arc<SchemaDescriptor>) -> Self {
		Self { schema }
	}

	/// Columns the store can serve a predicate from: the partition key and
	/// indexed columns.
	fn is_queryable(&self, name: &str) -> bool {
		let Some(field) = self.schema.field(name) else {
			return false;
		};
		field.primary_key
			|| field.indexed
			|| self
				.schema
				.indexes()
				.iter()
				.any(|index| index.fields.iter().any(|f| f == name))
	}

	fn check_filters(&self, filters: &[FilterExpr]) -> Option<ValidationEstimation> {
		let mut verdict = None;
		for expr in filters {
			expr.visit_leaves(&mut |leaf: &Filter| {
				if verdict.is_some() {
					return;
				}
				if self.schema.field(&leaf.field).is_none() {
					verdict = Some(ValidationEstimation::fail(format!(
						"unknown field '{}' on entity '{}'",
						leaf.field,
						self.schema.entity()
					)));
					return;
				}
				if matches!(
					leaf.operator,
					Operator::Like | Operator::Regex | Operator::Exists
				) {
					verdict = Some(ValidationEstimation::fail(format!(
						"operator {} is not supported on wide-column backends",
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
				if !self.is_queryable(&leaf.field) {
					verdict = Some(ValidationEstimation::fail(format!(
						"field '{}' is neither part of the primary key nor indexed",
						leaf.field
					)));
				}
			});
			if verdict.is_some() {
				break;
			}
		}
		verdict
	}
}

impl QueryValidator for WideColumnValidator {
	fn validate_select(&self, query: &SelectQuery) -> ValidationEstimation {
		for column in &query.columns {
			if self.schema.field(column).is_none() {
				return ValidationEstimation::fail(format!(
					"unknown column '{}' on entity '{}'",
					column,
					self.schema.entity()
				));
			}
		}
		for sort in &query.sorts {
			if !self.is_queryable(&sort.field) {
				return ValidationEstimation::fail(format!(
					"cannot order by '{}', it is neither part of the primary key nor indexed",
					sort.field
				));
			}
		}
		if let Some(fail) = self.check_filters(&query.filters) {
			return fail;
		}
		if query.limit == 0 || query.limit < UNBOUNDED {
			return ValidationEstimation::fail(format!("limit {} selects nothing", query.limit));
		}
		ValidationEstimation::pass()
	}

	fn validate_update(&self, query: &UpdateQuery) -> ValidationEstimation {
		if query.updates.is_empty() {
			return ValidationEstimation::fail("update sets no fields");
		}
		let pk = &self.schema.primary_key().name;
		for (field, _) in &query.updates {
			if self.schema.field(field).is_none() {
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
		}
		if let Some(fail) = self.check_filters(&query.filters) {
			return fail;
		}
		if query.filters.is_empty() {
			return ValidationEstimation::fail("update without a filter would touch every row");
		}
		ValidationEstimation::pass()
	}

	fn validate_delete(&self, query: &DeleteQuery) -> ValidationEstimation {
		if let Some(fail) = self.check_filters(&query.filters) {
			return fail;
		}
		if query.filters.is_empty() {
			return ValidationEstimation::fail("delete without a filter would remove every row");
		}
		ValidationEstimation::pass()
	}
}

/// A translated CQL statement with positional parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CqlStatement {
	pub cql: String,
	pub params: Vec<Value>,
}

pub struct WideColumnTranslator {
	schema: Arc<SchemaDescriptor>,
}

impl WideColumnTranslator {
	pub fn new(schema: Arc<SchemaDescriptor>) -> Self {
		Self { schema }
	}

	fn table(&self) -> &str {
		self.schema.repository()
	}

	pub fn translate_select(&self, query: &SelectQuery) -> CqlStatement {
		let projection = if query.columns.is_empty() {
			"*".to_owned()
		} else {
			query.columns.join(", ")
		};
		let mut cql = format!("SELECT {projection} FROM {}", self.table());
		let mut params = Vec::new();
		push_where(&mut cql, &mut params, &query.filters);
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
			cql.push_str(" ORDER BY ");
			cql.push_str(&order.join(", "));
		}
		if query.limit != UNBOUNDED {
			cql.push_str(&format!(" LIMIT {}", query.limit));
		}
		CqlStatement { cql, params }
	}

	pub fn translate_update(&self, query: &UpdateQuery) -> CqlStatement {
		let mut params = Vec::new();
		let assignments: Vec<String> = query
			.updates
			.iter()
			.map(|(field, value)| {
				params.push(value.clone());
				format!("{field} = ?")
			})
			.collect();
		let mut cql = format!("UPDATE {} SET {}", self.table(), assignments.join(", "));
		push_where(&mut cql, &mut params, &query.filters);
		CqlStatement { cql, params }
	}

	pub fn translate_delete(&self, query: &DeleteQuery) -> CqlStatement {
		let mut cql = format!("DELETE FROM {}", self.table());
		let mut params = Vec::new();
		push_where(&mut cql, &mut params, &query.filters);
		CqlStatement { cql, params }
	}

	/// INSERT over the entity's storable columns.
	pub fn insert_statement(&self) -> (String, Vec<String>) {
		let columns: Vec<String> = self
			.schema
			.fields()
			.filter_map(|field| match &field.relation {
				None | Some(Relation::ManyToOne { .. }) => Some(field.name.clone()),
				Some(_) => None,
			})
			.collect();
		let placeholders = vec!["?"; columns.len()].join(", ");
		let cql = format!(
			"INSERT INTO {} ({}) VALUES ({})",
			self.table(),
			columns.join(", "),
			placeholders
		);
		(cql, columns)
	}

	/// Secondary index DDL; only plain indexes exist on this backend.
	pub fn create_index(&self, index: &IndexSpec) -> Result<String, WideColumnDdlError> {
		if index.kind != IndexKind::Normal {
			return Err(WideColumnDdlError::UnsupportedIndexKind(index.name.clone()));
		}
		Ok(format!(
			"CREATE INDEX {} ON {} ({})",
			index.name,
			self.table(),
			index.fields.join(", ")
		))
	}
}

/// CQL has no OR and no grouping; only ANDed leaf predicates survive
/// validation, so flatten the tree into a conjunction.
fn push_where(cql: &mut String, params: &mut Vec<Value>, filters: &[FilterExpr]) {
	let mut predicates = Vec::new();
	for expr in filters {
		expr.visit_leaves(&mut |leaf: &Filter| {
			match leaf.operator {
				Operator::In => {
					let items = match &leaf.value {
						Value::List(items) => items.clone(),
						other => vec![other.clone()],
					};
					let placeholders = vec!["?"; items.len()].join(", ");
					params.extend(items);
					predicates.push(format!("{} IN ({placeholders})", leaf.field));
				}
				operator => {
					params.push(leaf.value.clone());
					predicates.push(format!("{} {} ?", leaf.field, operator.as_str()));
				}
			}
		});
	}
	if !predicates.is_empty() {
		cql.push_str(" WHERE ");
		cql.push_str(&predicates.join(" AND "));
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use unibase_core::query::{FilterTarget, Query};
	use unibase_core::schema::{FieldDescriptor, FieldType};

	fn event_schema() -> Arc<SchemaDescriptor> {
		Arc::new(
			SchemaDescriptor::builder("Event", "events")
				.field(FieldDescriptor::new("id", FieldType::Uuid).primary_key())
				.field(FieldDescriptor::new("kind", FieldType::Text).indexed())
				.field(FieldDescriptor::new("payload", FieldType::Text))
				.build()
				.unwrap(),
		)
	}

	fn validator() -> WideColumnValidator {
		WideColumnValidator::new(event_schema())
	}

	fn translator() -> WideColumnTranslator {
		WideColumnTranslator::new(event_schema())
	}

	#[test]
	fn filters_on_key_and_indexed_columns_pass() {
		let query = Query::select()
			.where_field("kind")
			.eq("login")
			.limit(10)
			.build();
		assert!(validator().validate(&query).is_pass());
	}

	#[test]
	fn filters_on_plain_columns_fail() {
		let query = Query::select().where_field("payload").eq("x").build();
		let verdict = validator().validate(&query);
		assert!(verdict.is_fail());
		assert!(verdict.reason().contains("payload"));
	}

	#[rstest]
	#[case(Operator::Like)]
	#[case(Operator::Regex)]
	#[case(Operator::Exists)]
	fn text_matching_operators_fail(#[case] operator: Operator) {
		let query = Query::select().filter("kind", operator, "x").build();
		assert!(validator().validate(&query).is_fail());
	}

	#[test]
	fn empty_in_list_fails_with_the_field_name() {
		let query = Query::select()
			.where_field("kind")
			.within(Vec::<String>::new())
			.build();
		let verdict = validator().validate(&query);
		assert!(verdict.is_fail());
		assert!(verdict.reason().contains("kind"));
		assert!(verdict.reason().contains("empty"));
	}

	#[test]
	fn ordering_by_a_plain_column_fails() {
		let query = Query::select()
			.order_by("payload", SortDirection::Ascending)
			.build();
		assert!(validator().validate(&query).is_fail());
	}

	#[test]
	fn select_renders_cql_with_placeholders() {
		let query = Query::select()
			.where_field("kind")
			.eq("login")
			.limit(10)
			.build_select();
		let statement = translator().translate_select(&query);
		assert_eq!(
			statement.cql,
			"SELECT * FROM events WHERE kind = ? LIMIT 10"
		);
		assert_eq!(statement.params, vec![Value::Text("login".into())]);
	}

	#[test]
	fn update_renders_set_then_where() {
		let query = Query::update()
			.set("payload", "p")
			.where_field("id")
			.eq(Value::Uuid(uuid_for_tests()))
			.build_update();
		let statement = translator().translate_update(&query);
		assert_eq!(
			statement.cql,
			"UPDATE events SET payload = ? WHERE id = ?"
		);
		assert_eq!(statement.params.len(), 2);
	}

	#[test]
	fn insert_lists_every_storable_column() {
		let (cql, columns) = translator().insert_statement();
		assert_eq!(cql, "INSERT INTO events (id, kind, payload) VALUES (?, ?, ?)");
		assert_eq!(columns, vec!["id", "kind", "payload"]);
	}

	#[test]
	fn only_normal_indexes_can_be_created() {
		let ok = translator()
			.create_index(&IndexSpec {
				name: "ix_events_kind".into(),
				fields: vec!["kind".into()],
				kind: IndexKind::Normal,
			})
			.unwrap();
		assert_eq!(ok, "CREATE INDEX ix_events_kind ON events (kind)");

		let err = translator()
			.create_index(&IndexSpec {
				name: "ux_events_kind".into(),
				fields: vec!["kind".into()],
				kind: IndexKind::Unique,
			})
			.unwrap_err();
		assert!(matches!(err, WideColumnDdlError::UnsupportedIndexKind(_)));
	}

	fn uuid_for_tests() -> uuid::Uuid {
		uuid::Uuid::nil()
	}
}
