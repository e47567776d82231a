use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use doctemplate_core::{
    strip_kind_prefix, DocumentStore, DocumentTree, ElementType, NamedRange, NodeId,
    PropertyStore, TemplateError, UpdateRequest,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::navigation::{descendants, structural_container, top_level_container};
use crate::registry::list_named_ranges;

/// Replacement used when neither the request nor a stored property gives a value.
pub const UNSET_VALUE: &str = "Unset";

/// Name prefix of generated copies.
pub const DEFAULT_COPY_PREFIX: &str = "Test Case of ";

/// Value chosen for one placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlaceholderValue {
    /// Condition decision: keep (`true`) or remove (`false`) the covered content.
    Keep(bool),
    /// Filler text; blank text falls back to a stored property.
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderEntry {
    pub id: String,
    pub value: PlaceholderValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GenerateDocumentRequest {
    #[serde(alias = "mockedPlaceholders")]
    pub placeholders: Vec<PlaceholderEntry>,
}

/// Structural change made to the generated copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Operation {
    RemovedContainer {
        placeholder_id: String,
        element: NodeId,
        element_type: ElementType,
    },
    RemovedTable {
        placeholder_id: String,
        table: NodeId,
    },
    RemovedEmptyParagraph {
        element: NodeId,
    },
    /// A condition's content was already removed along with another condition.
    AlreadyRemoved {
        placeholder_id: String,
    },
    /// A filler's content was removed by a condition, so no replacement was sent.
    SkippedReplacement {
        placeholder_id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupStage {
    TableRemoval,
    EmptyParagraphRemoval,
}

/// A best-effort removal that failed and was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupFailure {
    pub stage: CleanupStage,
    pub element: NodeId,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenerationReport {
    pub operations: Vec<Operation>,
    pub failures: Vec<CleanupFailure>,
}

impl GenerationReport {
    fn fail(&mut self, stage: CleanupStage, element: NodeId, error: &TemplateError) {
        warn!("Skipped {:?} of {}: {}", stage, element, error);
        self.failures.push(CleanupFailure {
            stage,
            element,
            detail: error.to_string(),
        });
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSummary {
    pub document_id: String,
    pub document_name: String,
    pub source_document_id: String,
    pub generated_at: DateTime<Utc>,
    /// One slot per request entry; conditions leave `None`.
    pub requests: Vec<Option<UpdateRequest>>,
    pub operations: Vec<Operation>,
    pub failures: Vec<CleanupFailure>,
}

/// Result of a generation call: a summary or the reason it failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationOutcome {
    Success { summary: GenerationSummary },
    Error { detail: String },
}

impl GenerationOutcome {
    pub fn summary(&self) -> Option<&GenerationSummary> {
        match self {
            GenerationOutcome::Success { summary } => Some(summary),
            GenerationOutcome::Error { .. } => None,
        }
    }
}

impl From<Result<GenerationSummary, TemplateError>> for GenerationOutcome {
    fn from(result: Result<GenerationSummary, TemplateError>) -> Self {
        match result {
            Ok(summary) => GenerationOutcome::Success { summary },
            Err(e) => GenerationOutcome::Error {
                detail: e.to_string(),
            },
        }
    }
}

/// Produce a copy of `source_id` with every placeholder resolved.
///
/// 1. Strip placeholder colors from the source.
/// 2. Copy the source as `{copy_prefix}{source name}`.
/// 3. Remove the content of false conditions; build filler replacements.
/// 4. Send the replacements in one batch update.
/// 5. Remove paragraphs left empty.
pub async fn generate_document<S: DocumentStore>(
    store: &S,
    properties: &dyn PropertyStore,
    source_id: &str,
    request: &GenerateDocumentRequest,
    copy_prefix: &str,
) -> Result<GenerationSummary, TemplateError> {
    let mut source = store.open(source_id).await?;
    list_named_ranges(&mut source, false, true)?;
    store.save(&source).await?;
    let source_names: HashMap<String, String> = source
        .named_ranges()
        .into_iter()
        .map(|r| (r.id, r.name))
        .collect();
    if let Some(unknown) = request
        .placeholders
        .iter()
        .find(|e| !source_names.contains_key(&e.id))
    {
        return Err(TemplateError::NamedRangeNotFound(unknown.id.clone()));
    }
    let copy_name = format!("{}{}", copy_prefix, source.name());

    let copy_id = store.make_copy(source_id, &copy_name).await?;
    let mut copy = store.open(&copy_id).await?;
    let stored: HashMap<String, String> = properties
        .list(source_id)
        .await?
        .into_iter()
        .map(|p| (p.name, p.value))
        .collect();

    let mut report = GenerationReport::default();
    let mut requests = apply_placeholders(
        &mut copy,
        &source_names,
        &request.placeholders,
        &stored,
        &mut report,
    )?;
    drop_orphaned_requests(&copy, &request.placeholders, &mut requests, &mut report);
    store.save(&copy).await?;

    let directives: Vec<UpdateRequest> = requests.iter().flatten().cloned().collect();
    if !directives.is_empty() {
        store.batch_update(&copy_id, &directives).await?;
    }

    let mut copy = store.open(&copy_id).await?;
    remove_empty_paragraphs(&mut copy, &mut report)?;
    store.save(&copy).await?;

    info!(
        "Generated {} from {}: {} replacement(s), {} operation(s), {} skipped failure(s)",
        copy_id,
        source_id,
        directives.len(),
        report.operations.len(),
        report.failures.len()
    );
    Ok(GenerationSummary {
        document_id: copy_id,
        document_name: copy_name,
        source_document_id: source_id.to_string(),
        generated_at: Utc::now(),
        requests,
        operations: report.operations,
        failures: report.failures,
    })
}

/// Filler text for a placeholder: the given value, else the property named
/// after the placeholder (kind prefix stripped), else [`UNSET_VALUE`].
pub fn resolve_filler_text(
    value: &str,
    range_name: &str,
    stored: &HashMap<String, String>,
) -> String {
    if !value.trim().is_empty() {
        return value.to_string();
    }
    stored
        .get(strip_kind_prefix(range_name))
        .cloned()
        .unwrap_or_else(|| UNSET_VALUE.to_string())
}

/// Resolve every entry against the copy.
///
/// Conditions set to remove are applied to the copy directly; fillers become
/// replacement directives. `source_names` maps range ids of the source to names.
pub fn apply_placeholders<D: DocumentTree + ?Sized>(
    copy: &mut D,
    source_names: &HashMap<String, String>,
    entries: &[PlaceholderEntry],
    stored: &HashMap<String, String>,
    report: &mut GenerationReport,
) -> Result<Vec<Option<UpdateRequest>>, TemplateError> {
    let mut requests = Vec::with_capacity(entries.len());
    for entry in entries {
        let name = source_names
            .get(&entry.id)
            .ok_or_else(|| TemplateError::NamedRangeNotFound(entry.id.clone()))?;
        match &entry.value {
            PlaceholderValue::Text(value) => {
                let text = resolve_filler_text(value, name, stored);
                debug!("Filler {} resolves to {:?}", name, text);
                requests.push(Some(UpdateRequest::replace_named_range_content(&entry.id, text)));
            }
            PlaceholderValue::Keep(true) => {
                debug!("Keeping condition {}", name);
                requests.push(None);
            }
            PlaceholderValue::Keep(false) => {
                match copy.named_range(&entry.id) {
                    Some(range) => remove_condition(copy, &range, report)?,
                    None => report.operations.push(Operation::AlreadyRemoved {
                        placeholder_id: entry.id.clone(),
                    }),
                }
                requests.push(None);
            }
        }
    }
    Ok(requests)
}

/// Delete the paragraphs and list items holding a condition's content, and
/// the tables they sit in.
///
/// Elements are processed last to first. Table removal is best effort and
/// failures land in the report.
pub fn remove_condition<D: DocumentTree + ?Sized>(
    copy: &mut D,
    range: &NamedRange,
    report: &mut GenerationReport,
) -> Result<(), TemplateError> {
    let mut targets = Vec::with_capacity(range.elements.len());
    for element in range.elements.iter().rev() {
        let container = structural_container(copy, element.element)?;
        let table = match top_level_container(copy, element.element)? {
            Some(top) if copy.element_type(top)? == ElementType::Table => Some(top),
            _ => None,
        };
        targets.push((container, table));
    }

    let mut removed: HashSet<NodeId> = HashSet::new();
    for (container, table) in targets {
        if let Some(container) = container {
            if removed.insert(container) {
                let element_type = copy.element_type(container)?;
                copy.remove_from_parent(container)?;
                report.operations.push(Operation::RemovedContainer {
                    placeholder_id: range.id.clone(),
                    element: container,
                    element_type,
                });
            }
        }
        if let Some(table) = table {
            if removed.insert(table) {
                match copy.remove_from_parent(table) {
                    Ok(()) => report.operations.push(Operation::RemovedTable {
                        placeholder_id: range.id.clone(),
                        table,
                    }),
                    Err(e) => report.fail(CleanupStage::TableRemoval, table, &e),
                }
            }
        }
    }
    info!("Removed content of condition {} ({})", range.name, range.id);
    Ok(())
}

/// Withdraw replacements whose range no longer exists in the copy.
fn drop_orphaned_requests<D: DocumentTree + ?Sized>(
    copy: &D,
    entries: &[PlaceholderEntry],
    requests: &mut [Option<UpdateRequest>],
    report: &mut GenerationReport,
) {
    for (entry, request) in entries.iter().zip(requests.iter_mut()) {
        if request.is_some() && copy.named_range(&entry.id).is_none() {
            debug!("Filler {} lost its content to a condition", entry.id);
            *request = None;
            report.operations.push(Operation::SkippedReplacement {
                placeholder_id: entry.id.clone(),
            });
        }
    }
}

/// Remove every paragraph or list item whose text is blank and that holds no
/// inline image, scanning the body last to first.
pub fn remove_empty_paragraphs<D: DocumentTree + ?Sized>(
    doc: &mut D,
    report: &mut GenerationReport,
) -> Result<(), TemplateError> {
    let body = doc.body();
    let mut paragraphs = Vec::new();
    for node in descendants(&*doc, body)? {
        if doc.element_type(node)?.is_paragraph_like() {
            paragraphs.push(node);
        }
    }

    for paragraph in paragraphs.into_iter().rev() {
        let blank = doc
            .text(paragraph)?
            .map(|t| t.trim().is_empty())
            .unwrap_or(true);
        if !blank || doc.contains_inline_image(paragraph)? {
            continue;
        }
        match doc.remove_from_parent(paragraph) {
            Ok(()) => report
                .operations
                .push(Operation::RemovedEmptyParagraph { element: paragraph }),
            Err(e) => report.fail(CleanupStage::EmptyParagraphRemoval, paragraph, &e),
        }
    }
    Ok(())
}
