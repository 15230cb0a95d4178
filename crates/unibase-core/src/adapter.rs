//! Backend adapter seam
//!
//! An [`Adapter`] executes portable query descriptors against one concrete
//! store for one entity type and speaks in materialized entities. The
//! relationship resolver and the data context only ever talk to this trait;
//! the SQL / document / wide-column crates provide the validation and
//! translation machinery an adapter implementation composes with its driver.

use crate::error::AdapterError;
use crate::query::{DeleteQuery, SelectQuery, UpdateQuery};
use crate::schema::SharedEntity;

/// An in-flight backend transaction. Both terminal operations consume the
/// context.
pub trait TransactionContext: Send {
	fn commit(self: Box<Self>) -> Result<(), AdapterError>;

	fn rollback(self: Box<Self>) -> Result<(), AdapterError>;
}

/// Executes portable queries for one entity type on one backend.
pub trait Adapter: Send + Sync {
	/// Run a select and return the matching entities.
	fn find(&self, query: &SelectQuery) -> Result<Vec<SharedEntity>, AdapterError>;

	/// Persist one entity.
	fn insert(&self, entity: SharedEntity) -> Result<(), AdapterError>;

	/// Apply an update to every matching row; returns the affected count.
	fn update_all(&self, query: &UpdateQuery) -> Result<u64, AdapterError>;

	/// Delete every matching row; returns the affected count.
	fn delete_all(&self, query: &DeleteQuery) -> Result<u64, AdapterError>;

	fn begin_transaction(&self) -> Result<Box<dyn TransactionContext>, AdapterError>;
}
