use doctemplate_core::{Property, PropertyStore, TemplateError};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::response::OperationResponse;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListPropertiesResponse {
    pub properties: Vec<Property>,
}

impl ListPropertiesResponse {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}

pub async fn list_properties(
    store: &dyn PropertyStore,
    document_id: &str,
) -> Result<ListPropertiesResponse, TemplateError> {
    Ok(ListPropertiesResponse {
        properties: store.list(document_id).await?,
    })
}

/// Insert or overwrite a property; names and values are stored as given.
pub async fn create_property(
    store: &dyn PropertyStore,
    document_id: &str,
    name: &str,
    value: &str,
) -> Result<OperationResponse<ListPropertiesResponse>, TemplateError> {
    store.set(document_id, name, value).await?;
    info!("Stored property {} on document {}", name, document_id);
    Ok(OperationResponse::ok(list_properties(store, document_id).await?))
}

pub async fn remove_property(
    store: &dyn PropertyStore,
    document_id: &str,
    name: &str,
) -> Result<ListPropertiesResponse, TemplateError> {
    store.delete(document_id, name).await?;
    info!("Removed property {} from document {}", name, document_id);
    list_properties(store, document_id).await
}
