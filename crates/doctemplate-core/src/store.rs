use async_trait::async_trait;

use crate::error::TemplateError;
use crate::model::UpdateRequest;
use crate::tree::DocumentTree;

/// Storage and file facilities of a document host.
///
/// Handles opening and persisting documents, duplicating them, and the
/// remote batch update call that replaces named range content.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Concrete document type handed out by this store.
    type Document: DocumentTree + Send + Sync;

    /// Open a document for editing.
    async fn open(&self, id: &str) -> Result<Self::Document, TemplateError>;

    /// Persist an edited document.
    async fn save(&self, document: &Self::Document) -> Result<(), TemplateError>;

    /// Duplicate a document under a new name.
    ///
    /// The copy keeps node ids and named range ids of the source.
    ///
    /// # Returns
    /// Id of the new document
    async fn make_copy(&self, id: &str, name: &str) -> Result<String, TemplateError>;

    /// Apply update directives to a stored document in one call.
    ///
    /// Either every request applies and the document is saved, or the
    /// stored document is left untouched.
    async fn batch_update(&self, id: &str, requests: &[UpdateRequest]) -> Result<(), TemplateError>;
}
