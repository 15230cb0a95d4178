//! One portable query, three backends: the same descriptor validates and
//! translates differently per storage model.

use std::sync::Arc;
use unibase::nosql::{DocumentQueryValidator, DocumentTranslator, WideColumnValidator};
use unibase::query::{FilterTarget, Query, SortDirection};
use unibase::schema::{FieldDescriptor, FieldType, SchemaDescriptor};
use unibase::sql::{SqlDialect, SqlQueryValidator, SqlTranslator};
use unibase::validate::QueryValidator;
use unibase::value::Value;

fn account_schema() -> Arc<SchemaDescriptor> {
	Arc::new(
		SchemaDescriptor::builder("Account", "accounts")
			.field(FieldDescriptor::new("id", FieldType::Int).primary_key())
			.field(FieldDescriptor::new("owner", FieldType::Text).indexed())
			.field(FieldDescriptor::new("balance", FieldType::Int))
			.build()
			.unwrap(),
	)
}

#[test]
fn indexed_equality_passes_everywhere() {
	let schema = account_schema();
	let query = Query::select().where_field("owner").eq("ada").build();

	assert!(SqlQueryValidator::new(Arc::clone(&schema), SqlDialect::Postgres)
		.validate(&query)
		.is_pass());
	assert!(DocumentQueryValidator::new(Arc::clone(&schema))
		.validate(&query)
		.is_pass());
	assert!(WideColumnValidator::new(schema).validate(&query).is_pass());
}

#[test]
fn unindexed_filter_only_fails_on_wide_column() {
	let schema = account_schema();
	let query = Query::select().where_field("balance").gte(100i64).build();

	assert!(SqlQueryValidator::new(Arc::clone(&schema), SqlDialect::Postgres)
		.validate(&query)
		.is_pass());
	assert!(DocumentQueryValidator::new(Arc::clone(&schema))
		.validate(&query)
		.is_pass());
	let verdict = WideColumnValidator::new(schema).validate(&query);
	assert!(verdict.is_fail());
	assert!(verdict.reason().contains("balance"));
}

#[test]
fn regex_splits_sql_from_document_backends() {
	let schema = account_schema();
	let query = Query::select().where_field("owner").regex("^a").build();

	assert!(SqlQueryValidator::new(Arc::clone(&schema), SqlDialect::MySql)
		.validate(&query)
		.is_fail());
	assert!(DocumentQueryValidator::new(schema).validate(&query).is_pass());
}

#[test]
fn one_descriptor_translates_per_backend() {
	let schema = account_schema();
	let select = Query::select()
		.where_field("owner")
		.eq("ada")
		.order_by("id", SortDirection::Ascending)
		.limit(10)
		.build_select();

	let sql = SqlTranslator::new(Arc::clone(&schema), SqlDialect::Postgres)
		.translate_select(&select);
	assert_eq!(
		sql.sql,
		r#"SELECT * FROM "accounts" WHERE owner = ? ORDER BY id ASC LIMIT 10"#
	);
	assert_eq!(sql.params, vec![Value::Text("ada".into())]);

	let spec = DocumentTranslator::new(schema).translate_select(&select);
	assert_eq!(spec.filter, bson::doc! { "owner": { "$eq": "ada" } });
	assert_eq!(spec.sort, bson::doc! { "_id": 1 });
	assert_eq!(spec.limit, Some(10));
}

#[test]
fn destructive_queries_without_filters_fail_on_every_backend() {
	let schema = account_schema();
	let delete = Query::delete().build();
	let update = Query::update().set("balance", 0i64).build();

	for verdict in [
		SqlQueryValidator::new(Arc::clone(&schema), SqlDialect::Sqlite).validate(&delete),
		DocumentQueryValidator::new(Arc::clone(&schema)).validate(&delete),
		WideColumnValidator::new(Arc::clone(&schema)).validate(&delete),
		SqlQueryValidator::new(Arc::clone(&schema), SqlDialect::Sqlite).validate(&update),
		DocumentQueryValidator::new(Arc::clone(&schema)).validate(&update),
		WideColumnValidator::new(schema).validate(&update),
	] {
		assert!(verdict.is_fail());
	}
}
