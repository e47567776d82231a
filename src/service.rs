use std::sync::Arc;

use doctemplate_core::{DocumentStore, DocumentTree, PropertyStore, TemplateError};
use tracing::{instrument, warn};

use crate::generator::{self, GenerateDocumentRequest, GenerationOutcome, DEFAULT_COPY_PREFIX};
use crate::inspector::{self, InspectionReport};
use crate::mapper::{self, CreateNamedRangeOptions};
use crate::navigation;
use crate::properties::{self, ListPropertiesResponse};
use crate::registry::{self, ListNamedRangesResponse};
use crate::remover;
use crate::response::OperationResponse;

/// Placeholder operations bound to a document store and a property store.
///
/// Every call opens the document it is given, works on it, and saves it back
/// when it was changed. Nothing is cached between calls.
pub struct TemplateService<S: DocumentStore> {
    documents: Arc<S>,
    properties: Arc<dyn PropertyStore>,
    copy_prefix: String,
}

impl<S: DocumentStore> TemplateService<S> {
    pub fn new(documents: Arc<S>, properties: Arc<dyn PropertyStore>) -> Self {
        Self {
            documents,
            properties,
            copy_prefix: DEFAULT_COPY_PREFIX.to_string(),
        }
    }

    /// Override the name prefix of generated copies.
    pub fn with_copy_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.copy_prefix = prefix.into();
        self
    }

    pub fn documents(&self) -> &Arc<S> {
        &self.documents
    }

    pub fn copy_prefix(&self) -> &str {
        &self.copy_prefix
    }

    // =========================================================================
    // Named ranges
    // =========================================================================

    #[instrument(skip(self), level = "debug")]
    pub async fn create_named_range(
        &self,
        document_id: &str,
        options: &CreateNamedRangeOptions,
    ) -> Result<OperationResponse<ListNamedRangesResponse>, TemplateError> {
        let mut doc = self.documents.open(document_id).await?;
        let response = mapper::create_named_range(&mut doc, options)?;
        self.documents.save(&doc).await?;
        Ok(response)
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn list_named_ranges(
        &self,
        document_id: &str,
        with_color: bool,
        update_color: bool,
    ) -> Result<ListNamedRangesResponse, TemplateError> {
        let mut doc = self.documents.open(document_id).await?;
        if !update_color {
            return Ok(registry::list_placeholders(&doc, with_color));
        }
        let listing = registry::list_named_ranges(&mut doc, with_color, true)?;
        self.documents.save(&doc).await?;
        Ok(listing)
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn remove_named_range(
        &self,
        document_id: &str,
        id: &str,
    ) -> Result<ListNamedRangesResponse, TemplateError> {
        let mut doc = self.documents.open(document_id).await?;
        let known = doc.named_range(id).is_some();
        let listing = remover::remove_named_range(&mut doc, id)?;
        if known {
            self.documents.save(&doc).await?;
        }
        Ok(listing)
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn remove_all_named_ranges(
        &self,
        document_id: &str,
    ) -> Result<ListNamedRangesResponse, TemplateError> {
        let mut doc = self.documents.open(document_id).await?;
        let listing = remover::remove_all_named_ranges(&mut doc)?;
        self.documents.save(&doc).await?;
        Ok(listing)
    }

    /// Move the cursor to a named range; an unknown id leaves it in place.
    #[instrument(skip(self), level = "debug")]
    pub async fn locate_named_range(
        &self,
        document_id: &str,
        id: &str,
    ) -> Result<(), TemplateError> {
        let mut doc = self.documents.open(document_id).await?;
        if navigation::locate_named_range(&mut doc, id)? {
            self.documents.save(&doc).await?;
        }
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn selected_text(&self, document_id: &str) -> Result<Vec<String>, TemplateError> {
        let doc = self.documents.open(document_id).await?;
        navigation::selected_text(&doc)
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn named_range_text(
        &self,
        document_id: &str,
        id: &str,
    ) -> Result<Vec<String>, TemplateError> {
        let doc = self.documents.open(document_id).await?;
        navigation::named_range_text(&doc, id)
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn inspect_named_range(
        &self,
        document_id: &str,
        id: &str,
    ) -> Result<InspectionReport, TemplateError> {
        let doc = self.documents.open(document_id).await?;
        inspector::inspect_named_range(&doc, id)
    }

    // =========================================================================
    // Properties
    // =========================================================================

    #[instrument(skip(self), level = "debug")]
    pub async fn list_properties(
        &self,
        document_id: &str,
    ) -> Result<ListPropertiesResponse, TemplateError> {
        properties::list_properties(self.properties.as_ref(), document_id).await
    }

    #[instrument(skip(self, value), level = "debug")]
    pub async fn create_property(
        &self,
        document_id: &str,
        name: &str,
        value: &str,
    ) -> Result<OperationResponse<ListPropertiesResponse>, TemplateError> {
        properties::create_property(self.properties.as_ref(), document_id, name, value).await
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn remove_property(
        &self,
        document_id: &str,
        name: &str,
    ) -> Result<ListPropertiesResponse, TemplateError> {
        properties::remove_property(self.properties.as_ref(), document_id, name).await
    }

    // =========================================================================
    // Generation
    // =========================================================================

    /// Generate a filled-in copy of a document. Failures come back as
    /// [`GenerationOutcome::Error`], never as `Err`.
    #[instrument(skip(self, request), level = "debug")]
    pub async fn generate_document(
        &self,
        document_id: &str,
        request: &GenerateDocumentRequest,
    ) -> GenerationOutcome {
        let result = generator::generate_document(
            self.documents.as_ref(),
            self.properties.as_ref(),
            document_id,
            request,
            &self.copy_prefix,
        )
        .await;
        if let Err(e) = &result {
            warn!("Generation from {} failed: {}", document_id, e);
        }
        result.into()
    }
}
