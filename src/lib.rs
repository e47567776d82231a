//! Placeholder templating for structured documents.
//!
//! Users mark fragments of a document as placeholders: fillers (`[F]`) whose
//! text is replaced, and conditions (`[C]`) whose content is kept or removed.
//! A generation call produces a filled-in copy of the document.
//!
//! The component modules work on any [`DocumentTree`](doctemplate_core::DocumentTree);
//! [`TemplateService`] binds them to a document store and a property store.

pub mod generator;
pub mod inspector;
pub mod mapper;
pub mod navigation;
pub mod properties;
pub mod registry;
pub mod remover;
pub mod response;
pub mod service;

pub use generator::{
    GenerateDocumentRequest, GenerationOutcome, GenerationSummary, Operation, PlaceholderEntry,
    PlaceholderValue, DEFAULT_COPY_PREFIX, UNSET_VALUE,
};
pub use inspector::{ElementReport, InspectionReport};
pub use mapper::{CreateNamedRangeOptions, Scope, HIGHLIGHT_COLOR};
pub use properties::ListPropertiesResponse;
pub use registry::{ListNamedRangesResponse, Placeholder, PALETTE};
pub use response::{OperationResponse, STATUS_ERROR, STATUS_OK};
pub use service::TemplateService;
