//! Core traits and types for doctemplate document hosts.
//!
//! This crate defines the abstractions the placeholder logic is written against:
//! - `DocumentTree`: selection, named ranges, coloring and structural removal on one document
//! - `DocumentStore`: opening, saving, copying and batch-updating documents
//! - `PropertyStore`: document-scoped key/value properties

mod error;
mod model;
mod properties;
mod store;
mod tree;

pub use error::TemplateError;
pub use model::{
    strip_kind_prefix, ElementType, NamedRange, NodeId, PlaceholderKind, Position, RangeElement,
    ReplaceNamedRangeContent, Span, UpdateRequest, NAMED_RANGE_ID_PREFIX,
};
pub use properties::{Property, PropertyStore};
pub use store::DocumentStore;
pub use tree::DocumentTree;
