//! Document and wide-column backend support for unibase
//!
//! Two backend families live here because they share almost nothing with
//! SQL: the document module speaks BSON filter and update documents, the
//! wide-column module speaks CQL under the storage model's query
//! restrictions. Both validate and translate the portable descriptors from
//! `unibase-core`; driver code stays with the adapter implementations.

pub mod document;
pub mod wide_column;

pub use document::{value_to_bson, DocumentQueryValidator, DocumentTranslator, FindSpec};
pub use wide_column::{
	CqlStatement, WideColumnDdlError, WideColumnTranslator, WideColumnValidator,
};
