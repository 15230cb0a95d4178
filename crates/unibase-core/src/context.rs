//! Data context
//!
//! All wiring between entity types, their schemas and their adapters lives
//! in one explicitly-built [`DataContext`] object. The builder validates the
//! whole graph up front: duplicate registrations and relationship targets
//! without a registered schema or adapter fail the build, so a context that
//! exists is internally consistent.

use crate::adapter::Adapter;
use crate::error::ConfigError;
use crate::schema::SchemaDescriptor;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub struct DataContext {
	schemas: HashMap<String, Arc<SchemaDescriptor>>,
	adapters: HashMap<String, Arc<dyn Adapter>>,
}

impl fmt::Debug for DataContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DataContext")
			.field("schemas", &self.schemas.keys().collect::<Vec<_>>())
			.field("adapters", &self.adapters.keys().collect::<Vec<_>>())
			.finish()
	}
}

impl DataContext {
	pub fn builder() -> DataContextBuilder {
		DataContextBuilder {
			schemas: HashMap::new(),
			adapters: HashMap::new(),
		}
	}

	pub fn schema(&self, entity: &str) -> Option<&Arc<SchemaDescriptor>> {
		self.schemas.get(entity)
	}

	pub fn adapter(&self, entity: &str) -> Option<&Arc<dyn Adapter>> {
		self.adapters.get(entity)
	}

	pub fn require_schema(&self, entity: &str) -> Result<&Arc<SchemaDescriptor>, ConfigError> {
		self.schemas
			.get(entity)
			.ok_or_else(|| ConfigError::MissingSchema(entity.to_owned()))
	}

	pub fn require_adapter(&self, entity: &str) -> Result<&Arc<dyn Adapter>, ConfigError> {
		self.adapters
			.get(entity)
			.ok_or_else(|| ConfigError::MissingAdapter(entity.to_owned()))
	}

	pub fn entities(&self) -> impl Iterator<Item = &str> {
		self.schemas.keys().map(String::as_str)
	}
}

pub struct DataContextBuilder {
	schemas: HashMap<String, Arc<SchemaDescriptor>>,
	adapters: HashMap<String, Arc<dyn Adapter>>,
}

impl std::fmt::Debug for DataContextBuilder {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DataContextBuilder")
			.field("schemas", &self.schemas.keys().collect::<Vec<_>>())
			.field("adapters", &self.adapters.keys().collect::<Vec<_>>())
			.finish()
	}
}

impl DataContextBuilder {
	pub fn register_schema(mut self, schema: SchemaDescriptor) -> Result<Self, ConfigError> {
		let entity = schema.entity().to_owned();
		if self.schemas.contains_key(&entity) {
			return Err(ConfigError::DuplicateSchema(entity));
		}
		self.schemas.insert(entity, Arc::new(schema));
		Ok(self)
	}

	pub fn register_adapter(
		mut self,
		entity: impl Into<String>,
		adapter: Arc<dyn Adapter>,
	) -> Result<Self, ConfigError> {
		let entity = entity.into();
		if self.adapters.contains_key(&entity) {
			return Err(ConfigError::DuplicateAdapter(entity));
		}
		self.adapters.insert(entity, adapter);
		Ok(self)
	}

	/// Validate the graph and freeze it. Every registered schema must have
	/// an adapter, and every relationship target must itself be registered.
	pub fn build(self) -> Result<DataContext, ConfigError> {
		for (entity, schema) in &self.schemas {
			if !self.adapters.contains_key(entity) {
				return Err(ConfigError::MissingAdapter(entity.clone()));
			}
			for field in schema.fields() {
				let Some(relation) = &field.relation else {
					continue;
				};
				let target = relation.target();
				if !self.schemas.contains_key(target) {
					return Err(ConfigError::UnresolvableRelationTarget {
						entity: entity.clone(),
						field: field.name.clone(),
						target: target.to_owned(),
						missing: "schema",
					});
				}
				if !self.adapters.contains_key(target) {
					return Err(ConfigError::UnresolvableRelationTarget {
						entity: entity.clone(),
						field: field.name.clone(),
						target: target.to_owned(),
						missing: "adapter",
					});
				}
			}
		}
		tracing::debug!(
			entities = self.schemas.len(),
			"data context built"
		);
		Ok(DataContext {
			schemas: self.schemas,
			adapters: self.adapters,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::adapter::TransactionContext;
	use crate::error::AdapterError;
	use crate::query::{DeleteQuery, SelectQuery, UpdateQuery};
	use crate::schema::{FieldDescriptor, FieldType, Relation, SharedEntity};

	struct NullAdapter;

	impl Adapter for NullAdapter {
		fn find(&self, _query: &SelectQuery) -> Result<Vec<SharedEntity>, AdapterError> {
			Ok(Vec::new())
		}

		fn insert(&self, _entity: SharedEntity) -> Result<(), AdapterError> {
			Ok(())
		}

		fn update_all(&self, _query: &UpdateQuery) -> Result<u64, AdapterError> {
			Ok(0)
		}

		fn delete_all(&self, _query: &DeleteQuery) -> Result<u64, AdapterError> {
			Ok(0)
		}

		fn begin_transaction(&self) -> Result<Box<dyn TransactionContext>, AdapterError> {
			unimplemented!("not exercised")
		}
	}

	fn team_schema() -> SchemaDescriptor {
		SchemaDescriptor::builder("Team", "teams")
			.field(FieldDescriptor::new("id", FieldType::Int).primary_key())
			.build()
			.unwrap()
	}

	#[test]
	fn duplicate_schema_registration_fails() {
		let err = DataContext::builder()
			.register_schema(team_schema())
			.unwrap()
			.register_schema(team_schema())
			.unwrap_err();
		assert!(matches!(err, ConfigError::DuplicateSchema(e) if e == "Team"));
	}

	#[test]
	fn relation_target_without_schema_fails_build() {
		let owner = SchemaDescriptor::builder("Player", "players")
			.field(FieldDescriptor::new("id", FieldType::Int).primary_key())
			.field(
				FieldDescriptor::new("team", FieldType::Reference("Team".into()))
					.relation(Relation::ManyToOne {
						target: "Team".into(),
					}),
			)
			.build()
			.unwrap();
		let err = DataContext::builder()
			.register_schema(owner)
			.unwrap()
			.register_adapter("Player", Arc::new(NullAdapter))
			.unwrap()
			.build()
			.unwrap_err();
		assert!(matches!(
			err,
			ConfigError::UnresolvableRelationTarget { target, .. } if target == "Team"
		));
	}

	#[test]
	fn consistent_graph_builds() {
		let context = DataContext::builder()
			.register_schema(team_schema())
			.unwrap()
			.register_adapter("Team", Arc::new(NullAdapter))
			.unwrap()
			.build()
			.unwrap();
		assert!(context.schema("Team").is_some());
		assert!(context.require_adapter("Team").is_ok());
		assert!(matches!(
			context.require_schema("Faction").unwrap_err(),
			ConfigError::MissingSchema(_)
		));
	}
}
