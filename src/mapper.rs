use doctemplate_core::{
    DocumentTree, ElementType, NamedRange, NodeId, PlaceholderKind, RangeElement, Span,
    TemplateError,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::navigation::descendants;
use crate::registry::{list_named_ranges, ListNamedRangesResponse};
use crate::response::OperationResponse;

/// Background given to freshly selected text before it is registered.
pub const HIGHLIGHT_COLOR: &str = "#00FF00";

/// Which occurrences of the selected text a new placeholder covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Exactly the selection.
    #[default]
    One,
    /// The selection plus every other occurrence of the selected text,
    /// in document order.
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateNamedRangeOptions {
    pub name: String,
    pub kind: PlaceholderKind,
    #[serde(default)]
    pub scope: Scope,
}

/// Turn the current selection into a highlighted named range.
///
/// Nothing selected: status -1, message "Error", and the listing.
/// Range construction failed: status -1, the error text, no data.
/// Otherwise status 0 and the recolored listing.
pub fn create_named_range<D: DocumentTree + ?Sized>(
    doc: &mut D,
    options: &CreateNamedRangeOptions,
) -> Result<OperationResponse<ListNamedRangesResponse>, TemplateError> {
    let Some(selection) = doc.selection() else {
        warn!("Please select something to create a placeholder");
        let listing = list_named_ranges(doc, true, true)?;
        return Ok(OperationResponse::error("Error", Some(listing)));
    };

    match build_named_range(doc, options, &selection) {
        Ok(range) => {
            info!(
                "Created placeholder {} ({} element(s)) in document {}",
                range.name,
                range.elements.len(),
                doc.id()
            );
            Ok(OperationResponse::ok(list_named_ranges(doc, true, true)?))
        }
        Err(e) => {
            warn!("Failed to create placeholder {}: {}", options.name, e);
            Ok(OperationResponse::error(e.to_string(), None))
        }
    }
}

fn build_named_range<D: DocumentTree + ?Sized>(
    doc: &mut D,
    options: &CreateNamedRangeOptions,
    selection: &[RangeElement],
) -> Result<NamedRange, TemplateError> {
    let mut elements = Vec::new();
    let mut fragments = Vec::new();

    for selected in selection {
        let Some(text) = doc.text(selected.element)? else {
            debug!("Skipping non-text element {}", selected.element);
            continue;
        };
        let span = match selected.span() {
            Some(span) => span,
            None => {
                let len = text.chars().count();
                if len == 0 {
                    continue;
                }
                Span::new(0, len - 1)
            }
        };
        doc.set_background_color(selected.element, Some(span), Some(HIGHLIGHT_COLOR))?;
        fragments.push(text.chars().skip(span.start).take(span.width()).collect::<String>());
        elements.push(RangeElement::partial(selected.element, span.start, span.end_inclusive));
    }

    if options.scope == Scope::All {
        for occurrence in other_occurrences(doc, &fragments, &elements)? {
            let span = occurrence.span().ok_or_else(|| {
                TemplateError::InvalidRange("occurrence without offsets".to_string())
            })?;
            doc.set_background_color(occurrence.element, Some(span), Some(HIGHLIGHT_COLOR))?;
            elements.push(occurrence);
        }
        let body = doc.body();
        let order = descendants(&*doc, body)?;
        elements.sort_by_key(|e| {
            let position = order.iter().position(|n| *n == e.element).unwrap_or(usize::MAX);
            (position, e.start_offset.unwrap_or(0))
        });
    }

    if elements.is_empty() {
        return Err(TemplateError::InvalidRange(
            "the selection does not cover any text".to_string(),
        ));
    }
    doc.add_named_range(&options.kind.range_name(&options.name), elements)
}

/// Non-overlapping occurrences of each fragment in the document's text runs,
/// in document order, excluding spans that overlap what is already covered.
fn other_occurrences<D: DocumentTree + ?Sized>(
    doc: &D,
    fragments: &[String],
    covered: &[RangeElement],
) -> Result<Vec<RangeElement>, TemplateError> {
    let mut found: Vec<RangeElement> = Vec::new();
    for node in descendants(doc, doc.body())? {
        if doc.element_type(node)? != ElementType::Text {
            continue;
        }
        let Some(text) = doc.text(node)? else { continue };
        let haystack: Vec<char> = text.chars().collect();
        for fragment in fragments {
            let needle: Vec<char> = fragment.chars().collect();
            for start in find_all(&haystack, &needle) {
                let candidate = Span::new(start, start + needle.len() - 1);
                let taken = covered
                    .iter()
                    .chain(found.iter())
                    .any(|e| overlaps(e, node, candidate));
                if !taken {
                    found.push(RangeElement::partial(
                        node,
                        candidate.start,
                        candidate.end_inclusive,
                    ));
                }
            }
        }
    }
    Ok(found)
}

fn find_all(haystack: &[char], needle: &[char]) -> Vec<usize> {
    let mut starts = Vec::new();
    if needle.is_empty() || needle.len() > haystack.len() {
        return starts;
    }
    let mut i = 0;
    while i + needle.len() <= haystack.len() {
        if haystack[i..i + needle.len()] == *needle {
            starts.push(i);
            i += needle.len();
        } else {
            i += 1;
        }
    }
    starts
}

/// Whether a covered element touches `span` of `node`. Whole elements and
/// elements on container nodes are compared by node only.
fn overlaps(element: &RangeElement, node: NodeId, span: Span) -> bool {
    if element.element != node {
        return false;
    }
    match element.span() {
        Some(s) => s.start <= span.end_inclusive && span.start <= s.end_inclusive,
        None => true,
    }
}
