use thiserror::Error;

use crate::model::{ElementType, NodeId};

/// Errors raised by document hosts and the placeholder logic built on them.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Invalid document id: {0}")]
    InvalidDocumentId(String),

    #[error("Element not found: {0}")]
    ElementNotFound(NodeId),

    #[error("Element {0} is no longer attached to the document")]
    Detached(NodeId),

    #[error("Named range not found: {0}")]
    NamedRangeNotFound(String),

    #[error("Offsets {start}..={end} out of bounds for element {element} (length {len})")]
    OffsetOutOfBounds {
        element: NodeId,
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("Element {0} cannot be edited as text")]
    NotText(NodeId),

    #[error("Cannot remove the last child of a {0}")]
    LastChild(ElementType),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TemplateError {
    /// Whether the error means the addressed thing does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TemplateError::DocumentNotFound(_)
                | TemplateError::ElementNotFound(_)
                | TemplateError::NamedRangeNotFound(_)
        )
    }
}

impl From<serde_json::Error> for TemplateError {
    fn from(e: serde_json::Error) -> Self {
        TemplateError::Serialization(e.to_string())
    }
}
