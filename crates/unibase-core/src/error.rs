//! Error taxonomy
//!
//! Validation failures are deliberately NOT part of this module: they are
//! returned as [`crate::validate::ValidationEstimation`] values, never as
//! errors. Everything here is either a configuration problem that should
//! fail fast at startup, or a runtime failure wrapped with enough context
//! to diagnose after the fact.

use thiserror::Error;

/// Raised while building a [`crate::schema::SchemaDescriptor`].
#[derive(Debug, Error)]
pub enum SchemaError {
	#[error("entity '{entity}' declares more than one primary key ('{first}' and '{second}')")]
	DuplicatePrimaryKey {
		entity: String,
		first: String,
		second: String,
	},

	#[error("entity '{entity}' declares no primary key")]
	MissingPrimaryKey { entity: String },

	#[error("entity '{entity}' declares field '{field}' more than once")]
	DuplicateField { entity: String, field: String },

	#[error("constraint '{constraint}' on entity '{entity}' references unknown field '{field}'")]
	UnknownConstraintField {
		entity: String,
		constraint: String,
		field: String,
	},

	#[error("index '{index}' on entity '{entity}' references unknown field '{field}'")]
	UnknownIndexField {
		entity: String,
		index: String,
		field: String,
	},
}

/// Object-graph configuration errors: the declared schemas, adapters and
/// relationships are inconsistent. These are fatal at context build or on
/// first relationship resolution, never silently defaulted.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("schema for entity '{0}' registered twice")]
	DuplicateSchema(String),

	#[error("adapter for entity '{0}' registered twice")]
	DuplicateAdapter(String),

	#[error("no schema registered for entity '{0}'")]
	MissingSchema(String),

	#[error("no adapter registered for entity '{0}'")]
	MissingAdapter(String),

	#[error(
		"relationship field '{field}' on entity '{entity}' targets '{target}' which has no registered {missing}"
	)]
	UnresolvableRelationTarget {
		entity: String,
		field: String,
		target: String,
		missing: &'static str,
	},

	#[error(
		"no back-reference from entity '{target}' to entity '{entity}' for one-to-one field '{field}'"
	)]
	MissingBackReference {
		entity: String,
		field: String,
		target: String,
	},

	#[error("field '{field}' on entity '{entity}' is not a relationship field")]
	NotARelationship { entity: String, field: String },
}

/// Encode/decode failures inside the type resolver registry.
#[derive(Debug, Error)]
pub enum ResolveError {
	#[error("no resolver registered for type {type_name}")]
	MissingResolver { type_name: String },

	#[error("cannot encode {kind} value as {storage_type}: {message}")]
	Encode {
		kind: &'static str,
		storage_type: String,
		message: String,
	},

	#[error("cannot decode {kind} value as {type_name}: {message}")]
	Decode {
		kind: &'static str,
		type_name: String,
		message: String,
	},
}

/// Failures while turning a raw row into an entity (or back).
#[derive(Debug, Error)]
pub enum MaterializeError {
	#[error("entity '{entity}' has no registered factory")]
	MissingFactory { entity: String },

	#[error("field '{field}' on entity '{entity}' has no registered accessor")]
	MissingAccessor { entity: String, field: String },

	#[error("accessor for field '{field}' on entity '{entity}' rejected the value: {message}")]
	Accessor {
		entity: String,
		field: String,
		message: String,
	},

	#[error("field '{field}' on entity '{entity}': {source}")]
	Resolve {
		entity: String,
		field: String,
		#[source]
		source: ResolveError,
	},

	#[error(transparent)]
	Config(#[from] ConfigError),
}

/// Backend execution failures surfaced by an adapter, wrapped with the
/// repository and operation they occurred in.
#[derive(Debug, Error)]
pub enum AdapterError {
	#[error("{operation} on '{entity}' failed: {source}")]
	Backend {
		entity: String,
		operation: &'static str,
		#[source]
		source: Box<dyn std::error::Error + Send + Sync>,
	},
}

impl AdapterError {
	pub fn backend(
		entity: impl Into<String>,
		operation: &'static str,
		source: impl std::error::Error + Send + Sync + 'static,
	) -> Self {
		AdapterError::Backend {
			entity: entity.into(),
			operation,
			source: Box::new(source),
		}
	}
}
