//! Fluent builders for query descriptors.
//!
//! Builders are pure: `build` borrows the builder and clones the accumulated
//! state, so building twice from the same builder yields equal descriptors
//! and never mutates the builder.

use super::{
	DeleteQuery, Filter, FilterExpr, Operator, Query, SelectQuery, SortDirection, SortSpec,
	UpdateQuery, UNBOUNDED,
};
use crate::value::Value;
use std::collections::BTreeSet;

/// Implemented by all three builders so [`FieldFilter`] works against any of
/// them.
pub trait FilterTarget: Sized {
	fn push_filter(&mut self, expr: FilterExpr);

	/// Start a field-scoped comparison.
	fn where_field(self, field: impl Into<String>) -> FieldFilter<Self> {
		FieldFilter {
			target: self,
			field: field.into(),
		}
	}

	/// Add a raw comparison filter.
	fn filter(mut self, field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
		self.push_filter(FilterExpr::cond(field, operator, value));
		self
	}

	/// Add a pre-built expression, for grouped OR / NOT conditions.
	fn where_expr(mut self, expr: FilterExpr) -> Self {
		self.push_filter(expr);
		self
	}
}

/// A comparison scoped to one field, started by
/// [`FilterTarget::where_field`]. Each terminal method adds the filter and
/// hands the builder back.
pub struct FieldFilter<T: FilterTarget> {
	target: T,
	field: String,
}

impl<T: FilterTarget> FieldFilter<T> {
	fn finish(mut self, operator: Operator, value: Value) -> T {
		self.target
			.push_filter(FilterExpr::Cond(Filter {
				field: self.field,
				operator,
				value,
			}));
		self.target
	}

	pub fn eq(self, value: impl Into<Value>) -> T {
		self.finish(Operator::Eq, value.into())
	}

	pub fn ne(self, value: impl Into<Value>) -> T {
		self.finish(Operator::Ne, value.into())
	}

	pub fn lt(self, value: impl Into<Value>) -> T {
		self.finish(Operator::Lt, value.into())
	}

	pub fn lte(self, value: impl Into<Value>) -> T {
		self.finish(Operator::Lte, value.into())
	}

	pub fn gt(self, value: impl Into<Value>) -> T {
		self.finish(Operator::Gt, value.into())
	}

	pub fn gte(self, value: impl Into<Value>) -> T {
		self.finish(Operator::Gte, value.into())
	}

	pub fn within(self, values: impl IntoIterator<Item = impl Into<Value>>) -> T {
		let list = Value::List(values.into_iter().map(Into::into).collect());
		self.finish(Operator::In, list)
	}

	pub fn like(self, pattern: impl Into<String>) -> T {
		self.finish(Operator::Like, Value::Text(pattern.into()))
	}

	pub fn regex(self, pattern: impl Into<String>) -> T {
		self.finish(Operator::Regex, Value::Text(pattern.into()))
	}

	pub fn exists(self, present: bool) -> T {
		self.finish(Operator::Exists, Value::Bool(present))
	}
}

/// Builder for [`SelectQuery`].
#[derive(Debug, Clone, Default)]
pub struct SelectBuilder {
	columns: Vec<String>,
	filters: Vec<FilterExpr>,
	sorts: Vec<SortSpec>,
	limit: Option<i64>,
	prefetch: BTreeSet<String>,
}

impl SelectBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Restrict the projection; without this all columns are returned.
	pub fn columns(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.columns.extend(columns.into_iter().map(Into::into));
		self
	}

	pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
		self.sorts.push(SortSpec {
			field: field.into(),
			direction,
		});
		self
	}

	pub fn limit(mut self, limit: i64) -> Self {
		self.limit = Some(limit);
		self
	}

	/// Force eager resolution of a lazy relationship field.
	pub fn prefetch(mut self, field: impl Into<String>) -> Self {
		self.prefetch.insert(field.into());
		self
	}

	pub fn build(&self) -> Query {
		Query::Select(self.build_select())
	}

	pub fn build_select(&self) -> SelectQuery {
		SelectQuery {
			columns: self.columns.clone(),
			filters: self.filters.clone(),
			sorts: self.sorts.clone(),
			limit: self.limit.unwrap_or(UNBOUNDED),
			prefetch: self.prefetch.clone(),
		}
	}
}

impl FilterTarget for SelectBuilder {
	fn push_filter(&mut self, expr: FilterExpr) {
		self.filters.push(expr);
	}
}

/// Builder for [`UpdateQuery`].
#[derive(Debug, Clone, Default)]
pub struct UpdateBuilder {
	updates: Vec<(String, Value)>,
	filters: Vec<FilterExpr>,
}

impl UpdateBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Assign a field. Assigning the same field twice keeps the last value.
	pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
		let field = field.into();
		let value = value.into();
		match self.updates.iter_mut().find(|(name, _)| *name == field) {
			Some(entry) => entry.1 = value,
			None => self.updates.push((field, value)),
		}
		self
	}

	pub fn build(&self) -> Query {
		Query::Update(self.build_update())
	}

	pub fn build_update(&self) -> UpdateQuery {
		UpdateQuery {
			updates: self.updates.clone(),
			filters: self.filters.clone(),
		}
	}
}

impl FilterTarget for UpdateBuilder {
	fn push_filter(&mut self, expr: FilterExpr) {
		self.filters.push(expr);
	}
}

/// Builder for [`DeleteQuery`].
#[derive(Debug, Clone, Default)]
pub struct DeleteBuilder {
	filters: Vec<FilterExpr>,
}

impl DeleteBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn build(&self) -> Query {
		Query::Delete(self.build_delete())
	}

	pub fn build_delete(&self) -> DeleteQuery {
		DeleteQuery {
			filters: self.filters.clone(),
		}
	}
}

impl FilterTarget for DeleteBuilder {
	fn push_filter(&mut self, expr: FilterExpr) {
		self.filters.push(expr);
	}
}
