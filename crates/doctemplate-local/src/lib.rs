//! Local backends for doctemplate: an in-memory document tree persisted as
//! JSON files, and document property stores.

pub mod backends;
pub mod document;
pub mod properties;
pub mod store;

pub use backends::create_backends;
pub use document::{MemoryDocument, Node, NodeKind};
pub use properties::{FilePropertyStore, MemoryPropertyStore};
pub use store::LocalDocumentStore;
