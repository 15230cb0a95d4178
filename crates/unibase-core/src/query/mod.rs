//! Portable query algebra
//!
//! Queries are plain data: a [`Query`] value describes a select, update or
//! delete over one entity without committing to any backend's syntax. The
//! per-backend translators turn these descriptors into dialect SQL, document
//! filters or CQL; validators inspect the same descriptors before execution.
//!
//! Descriptors implement `Hash`/`Eq` so translators can key their output
//! caches directly on the query.
//!
//! # Examples
//!
//! ```
//! use unibase_core::query::{FilterTarget, Query, SortDirection};
//!
//! let query = Query::select()
//! 	.where_field("age").gte(18i64)
//! 	.order_by("name", SortDirection::Ascending)
//! 	.limit(20)
//! 	.build();
//! ```

mod builder;

pub use builder::{DeleteBuilder, FieldFilter, FilterTarget, SelectBuilder, UpdateBuilder};

use crate::value::Value;
use std::collections::BTreeSet;
use std::fmt;

/// Sentinel meaning "no limit requested".
pub const UNBOUNDED: i64 = -1;

/// Comparison and composition operators usable in filters.
///
/// Not every backend supports every operator; the backend validators reject
/// unsupported ones with an explanatory reason instead of failing at
/// translation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
	Eq,
	Ne,
	Lt,
	Lte,
	Gt,
	Gte,
	In,
	Like,
	Regex,
	Exists,
}

impl Operator {
	pub fn as_str(&self) -> &'static str {
		match self {
			Operator::Eq => "=",
			Operator::Ne => "!=",
			Operator::Lt => "<",
			Operator::Lte => "<=",
			Operator::Gt => ">",
			Operator::Gte => ">=",
			Operator::In => "IN",
			Operator::Like => "LIKE",
			Operator::Regex => "REGEX",
			Operator::Exists => "EXISTS",
		}
	}

	/// Case-insensitive parse; accepts `<>` as an alias for `!=`.
	pub fn parse(token: &str) -> Option<Operator> {
		match token.to_ascii_uppercase().as_str() {
			"=" | "==" => Some(Operator::Eq),
			"!=" | "<>" => Some(Operator::Ne),
			"<" => Some(Operator::Lt),
			"<=" => Some(Operator::Lte),
			">" => Some(Operator::Gt),
			">=" => Some(Operator::Gte),
			"IN" => Some(Operator::In),
			"LIKE" => Some(Operator::Like),
			"REGEX" => Some(Operator::Regex),
			"EXISTS" => Some(Operator::Exists),
			_ => None,
		}
	}
}

impl fmt::Display for Operator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// One field comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Filter {
	pub field: String,
	pub operator: Operator,
	pub value: Value,
}

impl Filter {
	pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
		Self {
			field: field.into(),
			operator,
			value: value.into(),
		}
	}
}

/// Boolean filter expression tree. Leaves are single comparisons; interior
/// nodes compose them with AND / OR / NOT.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterExpr {
	Cond(Filter),
	And(Vec<FilterExpr>),
	Or(Vec<FilterExpr>),
	Not(Box<FilterExpr>),
}

impl FilterExpr {
	pub fn cond(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
		FilterExpr::Cond(Filter::new(field, operator, value))
	}

	pub fn and(exprs: impl IntoIterator<Item = FilterExpr>) -> Self {
		FilterExpr::And(exprs.into_iter().collect())
	}

	pub fn or(exprs: impl IntoIterator<Item = FilterExpr>) -> Self {
		FilterExpr::Or(exprs.into_iter().collect())
	}

	pub fn negate(expr: FilterExpr) -> Self {
		FilterExpr::Not(Box::new(expr))
	}

	/// Visit every leaf comparison in the tree, depth first.
	pub fn visit_leaves<'a>(&'a self, visit: &mut impl FnMut(&'a Filter)) {
		match self {
			FilterExpr::Cond(filter) => visit(filter),
			FilterExpr::And(children) | FilterExpr::Or(children) => {
				for child in children {
					child.visit_leaves(visit);
				}
			}
			FilterExpr::Not(inner) => inner.visit_leaves(visit),
		}
	}

	/// All leaf comparisons, collected in visit order.
	pub fn leaves(&self) -> Vec<&Filter> {
		let mut out = Vec::new();
		self.visit_leaves(&mut |f| out.push(f));
		out
	}
}

impl From<Filter> for FilterExpr {
	fn from(filter: Filter) -> Self {
		FilterExpr::Cond(filter)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
	Ascending,
	Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortSpec {
	pub field: String,
	pub direction: SortDirection,
}

/// Read query descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectQuery {
	/// Requested columns; empty means all.
	pub columns: Vec<String>,
	/// Top-level filters, implicitly ANDed together.
	pub filters: Vec<FilterExpr>,
	pub sorts: Vec<SortSpec>,
	/// Row cap, or [`UNBOUNDED`].
	pub limit: i64,
	/// Relationship fields to resolve eagerly during materialization even
	/// when declared lazy.
	pub prefetch: BTreeSet<String>,
}

/// Write query descriptor: field assignments plus the row selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpdateQuery {
	/// Assignments in declaration order; one entry per field.
	pub updates: Vec<(String, Value)>,
	pub filters: Vec<FilterExpr>,
}

/// Removal descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeleteQuery {
	pub filters: Vec<FilterExpr>,
}

/// A complete portable query, tagged by operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Query {
	Select(SelectQuery),
	Update(UpdateQuery),
	Delete(DeleteQuery),
}

impl Query {
	pub fn select() -> SelectBuilder {
		SelectBuilder::new()
	}

	pub fn update() -> UpdateBuilder {
		UpdateBuilder::new()
	}

	pub fn delete() -> DeleteBuilder {
		DeleteBuilder::new()
	}

	pub fn operation(&self) -> &'static str {
		match self {
			Query::Select(_) => "select",
			Query::Update(_) => "update",
			Query::Delete(_) => "delete",
		}
	}

	pub fn filters(&self) -> &[FilterExpr] {
		match self {
			Query::Select(q) => &q.filters,
			Query::Update(q) => &q.filters,
			Query::Delete(q) => &q.filters,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("in", Some(Operator::In))]
	#[case("LIKE", Some(Operator::Like))]
	#[case("<>", Some(Operator::Ne))]
	#[case("==", Some(Operator::Eq))]
	#[case("exists", Some(Operator::Exists))]
	#[case("~", None)]
	fn operator_parse_is_case_insensitive(
		#[case] token: &str,
		#[case] expected: Option<Operator>,
	) {
		assert_eq!(Operator::parse(token), expected);
	}

	#[test]
	fn leaves_are_collected_depth_first() {
		let expr = FilterExpr::or([
			FilterExpr::cond("a", Operator::Eq, 1i64),
			FilterExpr::and([
				FilterExpr::cond("b", Operator::Gt, 2i64),
				FilterExpr::negate(FilterExpr::cond("c", Operator::Lt, 3i64)),
			]),
		]);
		let fields: Vec<&str> = expr.leaves().iter().map(|f| f.field.as_str()).collect();
		assert_eq!(fields, vec!["a", "b", "c"]);
	}
}
