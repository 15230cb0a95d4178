//! Validation verdicts
//!
//! Backend validators estimate whether a portable query is executable on
//! their backend BEFORE it is translated. The verdict is a value, not an
//! error: a failed estimation carries a human-readable reason, and advisory
//! findings (slow but legal queries) are logged as warnings by the
//! validators themselves rather than failing the query.

use crate::query::{DeleteQuery, Query, SelectQuery, UpdateQuery};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationResult {
	Pass,
	Fail,
}

/// Outcome of validating one query against one backend.
///
/// Invariant: the reason is empty exactly when the result is `Pass`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationEstimation {
	result: ValidationResult,
	reason: String,
}

impl ValidationEstimation {
	pub fn pass() -> Self {
		Self {
			result: ValidationResult::Pass,
			reason: String::new(),
		}
	}

	pub fn fail(reason: impl Into<String>) -> Self {
		Self {
			result: ValidationResult::Fail,
			reason: reason.into(),
		}
	}

	pub fn result(&self) -> ValidationResult {
		self.result
	}

	pub fn reason(&self) -> &str {
		&self.reason
	}

	pub fn is_pass(&self) -> bool {
		self.result == ValidationResult::Pass
	}

	pub fn is_fail(&self) -> bool {
		self.result == ValidationResult::Fail
	}
}

impl fmt::Display for ValidationEstimation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.result {
			ValidationResult::Pass => write!(f, "PASS"),
			ValidationResult::Fail => write!(f, "FAIL: {}", self.reason),
		}
	}
}

/// Backend-aware semantic validation of portable queries.
pub trait QueryValidator {
	fn validate_select(&self, query: &SelectQuery) -> ValidationEstimation;

	fn validate_update(&self, query: &UpdateQuery) -> ValidationEstimation;

	fn validate_delete(&self, query: &DeleteQuery) -> ValidationEstimation;

	fn validate(&self, query: &Query) -> ValidationEstimation {
		match query {
			Query::Select(q) => self.validate_select(q),
			Query::Update(q) => self.validate_update(q),
			Query::Delete(q) => self.validate_delete(q),
		}
	}
}
