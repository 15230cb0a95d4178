//! Document store translation and validation
//!
//! Targets MongoDB-style document databases: portable queries become BSON
//! filter documents, updates become `$set` documents and the schema's
//! primary key is addressed as `_id`. Validation enforces the document
//! model's own rules, which differ from SQL: `REGEX` and `EXISTS` are
//! native here while `LIKE` is not, field names may not contain dots or
//! start with `$`, and single values must stay under the 16 MB document
//! cap.

use bson::{Bson, Document};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use unibase_core::query::{
	DeleteQuery, Filter, FilterExpr, Operator, SelectQuery, SortDirection, UpdateQuery, UNBOUNDED,
};
use unibase_core::schema::SchemaDescriptor;
use unibase_core::validate::{QueryValidator, ValidationEstimation};
use unibase_core::value::Value;

/// Field names that the document model rejects outright.
static INVALID_FIELD_NAME: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^\$.*|.*\..*").expect("field name pattern is valid"));

/// Hard cap on a single stored document.
const MAX_VALUE_BYTES: usize = 16 * 1024 * 1024;

pub struct DocumentQueryValidator {
	schema: Arc<SchemaDescriptor>,
	/// Memoized verdicts for regex patterns seen before, keyed by pattern.
	regex_cache: DashMap<String, bool>,
}

impl DocumentQueryValidator {
	pub fn new(schema: Arc<SchemaDescriptor>) -> Self {
		Self {
			schema,
			regex_cache: DashMap::new(),
		}
	}

	fn regex_is_valid(&self, pattern: &str) -> bool {
		if let Some(cached) = self.regex_cache.get(pattern) {
			return *cached;
		}
		let valid = Regex::new(pattern).is_ok();
		self.regex_cache.insert(pattern.to_owned(), valid);
		valid
	}

	fn check_field_name(&self, name: &str) -> Option<ValidationEstimation> {
		if INVALID_FIELD_NAME.is_match(name) {
			return Some(ValidationEstimation::fail(format!(
				"field name '{name}' contains a dot or starts with '$'"
			)));
		}
		if self.schema.field(name).is_none() {
			return Some(ValidationEstimation::fail(format!(
				"unknown field '{}' on entity '{}'",
				name,
				self.schema.entity()
			)));
		}
		None
	}

	fn check_filters(&self, filters: &[FilterExpr]) -> Option<ValidationEstimation> {
		let mut verdict = None;
		for expr in filters {
			expr.visit_leaves(&mut |leaf: &Filter| {
				if verdict.is_some() {
					return;
				}
				if let Some(fail) = self.check_field_name(&leaf.field) {
					verdict = Some(fail);
					return;
				}
				match leaf.operator {
					Operator::Like => {
						verdict = Some(ValidationEstimation::fail(
							"LIKE is not supported on document backends, use REGEX",
						));
					}
					Operator::Regex => match leaf.value.as_text() {
						Some(pattern) if self.regex_is_valid(pattern) => {}
						Some(pattern) => {
							verdict = Some(ValidationEstimation::fail(format!(
								"invalid regex pattern '{pattern}'"
							)));
						}
						None => {
							verdict = Some(ValidationEstimation::fail(
								"REGEX requires a text pattern",
							));
						}
					},
					_ => {}
				}
				if verdict.is_none() && !self.is_indexed(&leaf.field) {
					tracing::warn!(
						entity = self.schema.entity(),
						field = %leaf.field,
						"filter on an unindexed field forces a collection scan"
					);
				}
			});
			if verdict.is_some() {
				break;
			}
		}
		verdict
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
}

impl QueryValidator for DocumentQueryValidator {
	fn validate_select(&self, query: &SelectQuery) -> ValidationEstimation {
		for column in &query.columns {
			if let Some(fail) = self.check_field_name(column) {
				return fail;
			}
		}
		for sort in &query.sorts {
			if let Some(fail) = self.check_field_name(&sort.field) {
				return fail;
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
		for (field, value) in &query.updates {
			if let Some(fail) = self.check_field_name(field) {
				return fail;
			}
			if field == pk {
				return ValidationEstimation::fail("_id is immutable");
			}
			if let Some(size) = oversized(value) {
				return ValidationEstimation::fail(format!(
					"value for '{field}' is {size} bytes, over the 16 MB document cap"
				));
			}
		}
		if let Some(fail) = self.check_filters(&query.filters) {
			return fail;
		}
		if query.filters.is_empty() {
			return ValidationEstimation::fail("update without a filter would touch every document");
		}
		ValidationEstimation::pass()
	}

	fn validate_delete(&self, query: &DeleteQuery) -> ValidationEstimation {
		if let Some(fail) = self.check_filters(&query.filters) {
			return fail;
		}
		if query.filters.is_empty() {
			return ValidationEstimation::fail("delete without a filter would remove every document");
		}
		ValidationEstimation::pass()
	}
}

/// Byte size of a value when it clearly exceeds the document cap.
fn oversized(value: &Value) -> Option<usize> {
	let size = match value {
		Value::Bytes(b) => b.len(),
		Value::Text(s) => s.len(),
		Value::List(items) => items.iter().filter_map(oversized).sum::<usize>(),
		_ => 0,
	};
	(size > MAX_VALUE_BYTES).then_some(size)
}

/// A translated find: filter, sort and projection documents plus the limit.
#[derive(Debug, Clone, PartialEq)]
pub struct FindSpec {
	pub filter: Document,
	pub sort: Document,
	pub projection: Option<Document>,
	pub limit: Option<i64>,
}

pub struct DocumentTranslator {
	schema: Arc<SchemaDescriptor>,
}

impl DocumentTranslator {
	pub fn new(schema: Arc<SchemaDescriptor>) -> Self {
		Self { schema }
	}

	/// The primary key is stored as `_id`.
	fn storage_name(&self, field: &str) -> String {
		if field == self.schema.primary_key().name {
			"_id".to_owned()
		} else {
			field.to_owned()
		}
	}

	pub fn translate_select(&self, query: &SelectQuery) -> FindSpec {
		let mut sort = Document::new();
		for spec in &query.sorts {
			let direction = match spec.direction {
				SortDirection::Ascending => 1,
				SortDirection::Descending => -1,
			};
			sort.insert(self.storage_name(&spec.field), direction);
		}
		let projection = if query.columns.is_empty() {
			None
		} else {
			let mut doc = Document::new();
			for column in &query.columns {
				doc.insert(self.storage_name(column), 1);
			}
			Some(doc)
		};
		FindSpec {
			filter: self.filter_document(&query.filters),
			sort,
			projection,
			limit: (query.limit != UNBOUNDED).then_some(query.limit),
		}
	}

	/// Returns the filter document and the `$set` update document.
	pub fn translate_update(&self, query: &UpdateQuery) -> (Document, Document) {
		let mut set = Document::new();
		for (field, value) in &query.updates {
			set.insert(self.storage_name(field), value_to_bson(value));
		}
		let mut update = Document::new();
		update.insert("$set", set);
		(self.filter_document(&query.filters), update)
	}

	pub fn translate_delete(&self, query: &DeleteQuery) -> Document {
		self.filter_document(&query.filters)
	}

	fn filter_document(&self, filters: &[FilterExpr]) -> Document {
		match filters {
			[] => Document::new(),
			[single] => self.expr_document(single),
			many => {
				let parts: Vec<Bson> = many
					.iter()
					.map(|expr| Bson::Document(self.expr_document(expr)))
					.collect();
				let mut doc = Document::new();
				doc.insert("$and", parts);
				doc
			}
		}
	}

	fn expr_document(&self, expr: &FilterExpr) -> Document {
		match expr {
			FilterExpr::Cond(filter) => self.leaf_document(filter),
			FilterExpr::And(children) | FilterExpr::Or(children) => {
				let key = if matches!(expr, FilterExpr::And(_)) {
					"$and"
				} else {
					"$or"
				};
				let parts: Vec<Bson> = children
					.iter()
					.map(|child| Bson::Document(self.expr_document(child)))
					.collect();
				let mut doc = Document::new();
				doc.insert(key, parts);
				doc
			}
			FilterExpr::Not(inner) => {
				let mut doc = Document::new();
				doc.insert("$nor", vec![Bson::Document(self.expr_document(inner))]);
				doc
			}
		}
	}

	fn leaf_document(&self, filter: &Filter) -> Document {
		let operator = match filter.operator {
			Operator::Eq => "$eq",
			Operator::Ne => "$ne",
			Operator::Lt => "$lt",
			Operator::Lte => "$lte",
			Operator::Gt => "$gt",
			Operator::Gte => "$gte",
			Operator::In => "$in",
			Operator::Regex => "$regex",
			Operator::Exists => "$exists",
			// Rejected by validation; translate to an equality that cannot
			// match rather than panic.
			Operator::Like => "$eq",
		};
		let mut condition = Document::new();
		condition.insert(operator, value_to_bson(&filter.value));
		let mut doc = Document::new();
		doc.insert(self.storage_name(&filter.field), condition);
		doc
	}
}

pub fn value_to_bson(value: &Value) -> Bson {
	match value {
		Value::Null => Bson::Null,
		Value::Bool(b) => Bson::Boolean(*b),
		Value::Int(i) => Bson::Int64(*i),
		Value::Float(x) => Bson::Double(*x),
		Value::Text(s) => Bson::String(s.clone()),
		Value::Bytes(b) => Bson::Binary(bson::Binary {
			subtype: bson::spec::BinarySubtype::Generic,
			bytes: b.clone(),
		}),
		Value::Uuid(u) => Bson::String(u.to_string()),
		Value::Timestamp(t) => Bson::DateTime(bson::DateTime::from_millis(t.timestamp_millis())),
		Value::List(items) => Bson::Array(items.iter().map(value_to_bson).collect()),
		Value::Map(pairs) => {
			let mut doc = Document::new();
			for (key, item) in pairs {
				doc.insert(key.to_string(), value_to_bson(item));
			}
			Bson::Document(doc)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use bson::doc;
	use rstest::rstest;
	use unibase_core::query::{FilterTarget, Query};
	use unibase_core::schema::{FieldDescriptor, FieldType};

	fn user_schema() -> Arc<SchemaDescriptor> {
		Arc::new(
			SchemaDescriptor::builder("User", "users")
				.field(FieldDescriptor::new("id", FieldType::Int).primary_key())
				.field(FieldDescriptor::new("name", FieldType::Text).indexed())
				.field(FieldDescriptor::new("age", FieldType::Int))
				.build()
				.unwrap(),
		)
	}

	fn validator() -> DocumentQueryValidator {
		DocumentQueryValidator::new(user_schema())
	}

	fn translator() -> DocumentTranslator {
		DocumentTranslator::new(user_schema())
	}

	#[test]
	fn regex_and_exists_are_native_here() {
		let query = Query::select()
			.where_field("name")
			.regex("^a.*")
			.where_field("age")
			.exists(true)
			.build();
		assert!(validator().validate(&query).is_pass());
	}

	#[test]
	fn like_is_rejected() {
		let query = Query::select().where_field("name").like("a%").build();
		let verdict = validator().validate(&query);
		assert!(verdict.is_fail());
		assert!(verdict.reason().contains("REGEX"));
	}

	#[test]
	fn invalid_regex_patterns_fail_and_are_memoized() {
		let v = validator();
		let query = Query::select().where_field("name").regex("[unclosed").build();
		assert!(v.validate(&query).is_fail());
		// Second validation answers from the memo.
		assert!(v.validate(&query).is_fail());
		assert_eq!(v.regex_cache.len(), 1);
	}

	#[rstest]
	#[case("a.b")]
	#[case("$set")]
	fn malformed_field_names_fail(#[case] name: &str) {
		let query = Query::select().where_field(name).eq(1i64).build();
		let verdict = validator().validate(&query);
		assert!(verdict.is_fail());
		assert!(verdict.reason().contains(name));
	}

	#[test]
	fn primary_key_update_fails_as_immutable_id() {
		let query = Query::update()
			.set("id", 2i64)
			.where_field("name")
			.eq("x")
			.build();
		let verdict = validator().validate(&query);
		assert!(verdict.is_fail());
		assert!(verdict.reason().contains("_id"));
	}

	#[test]
	fn unfiltered_update_and_delete_fail() {
		assert!(validator()
			.validate(&Query::update().set("age", 1i64).build())
			.is_fail());
		assert!(validator().validate(&Query::delete().build()).is_fail());
	}

	#[test]
	fn select_translates_to_find_components() {
		let query = Query::select()
			.columns(["name"])
			.where_field("age")
			.gte(18i64)
			.order_by("name", SortDirection::Descending)
			.limit(5)
			.build_select();
		let spec = translator().translate_select(&query);
		assert_eq!(spec.filter, doc! { "age": { "$gte": 18i64 } });
		assert_eq!(spec.sort, doc! { "name": -1 });
		assert_eq!(spec.projection, Some(doc! { "name": 1 }));
		assert_eq!(spec.limit, Some(5));
	}

	#[test]
	fn primary_key_filters_address_the_underscore_id() {
		let query = Query::select().where_field("id").eq(7i64).build_select();
		let spec = translator().translate_select(&query);
		assert_eq!(spec.filter, doc! { "_id": { "$eq": 7i64 } });
	}

	#[test]
	fn multiple_filters_join_under_and() {
		let query = Query::select()
			.where_field("age")
			.gte(18i64)
			.where_field("name")
			.ne("root")
			.build_select();
		let spec = translator().translate_select(&query);
		assert_eq!(
			spec.filter,
			doc! { "$and": [
				{ "age": { "$gte": 18i64 } },
				{ "name": { "$ne": "root" } },
			] }
		);
	}

	#[test]
	fn update_wraps_assignments_in_set() {
		let query = Query::update()
			.set("age", 31i64)
			.where_field("name")
			.eq("ada")
			.build_update();
		let (filter, update) = translator().translate_update(&query);
		assert_eq!(filter, doc! { "name": { "$eq": "ada" } });
		assert_eq!(update, doc! { "$set": { "age": 31i64 } });
	}

	#[test]
	fn negation_uses_nor() {
		let query = Query::delete()
			.where_expr(FilterExpr::negate(FilterExpr::cond(
				"name",
				Operator::Eq,
				"admin",
			)))
			.build_delete();
		let filter = translator().translate_delete(&query);
		assert_eq!(
			filter,
			doc! { "$nor": [ { "name": { "$eq": "admin" } } ] }
		);
	}

	#[test]
	fn in_filters_translate_to_dollar_in() {
		let query = Query::select()
			.where_field("age")
			.within([1i64, 2])
			.build_select();
		let spec = translator().translate_select(&query);
		assert_eq!(spec.filter, doc! { "age": { "$in": [1i64, 2i64] } });
	}
}
