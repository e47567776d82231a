use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TemplateError;

/// A document-scoped name/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: String,
}

/// Key/value store scoped per document.
///
/// Keys are unique within a document. No ordering is promised on listing.
#[async_trait]
pub trait PropertyStore: Send + Sync {
    /// All properties of a document.
    async fn list(&self, document_id: &str) -> Result<Vec<Property>, TemplateError>;

    async fn get(&self, document_id: &str, name: &str) -> Result<Option<String>, TemplateError>;

    /// Insert or overwrite a property (last write wins).
    async fn set(&self, document_id: &str, name: &str, value: &str) -> Result<(), TemplateError>;

    /// Delete a property. Deleting an absent name is not an error.
    async fn delete(&self, document_id: &str, name: &str) -> Result<(), TemplateError>;
}
