//! Tree walks shared by the placeholder operations, plus the text and cursor
//! helpers the dialogs call directly.

use doctemplate_core::{DocumentTree, ElementType, NodeId, Position, RangeElement, TemplateError};
use tracing::debug;

/// All nodes under `root` in document order, `root` excluded.
pub fn descendants<D: DocumentTree + ?Sized>(
    doc: &D,
    root: NodeId,
) -> Result<Vec<NodeId>, TemplateError> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = doc.children(root)?.into_iter().rev().collect();
    while let Some(node) = stack.pop() {
        out.push(node);
        stack.extend(doc.children(node)?.into_iter().rev());
    }
    Ok(out)
}

/// Nearest ancestor-or-self of `node` that sits directly under the body.
///
/// `None` when the node is the body itself or no longer attached.
pub fn top_level_container<D: DocumentTree + ?Sized>(
    doc: &D,
    node: NodeId,
) -> Result<Option<NodeId>, TemplateError> {
    let mut current = node;
    loop {
        match doc.parent(current)? {
            Some(parent) if doc.element_type(parent)? == ElementType::BodySection => {
                return Ok(Some(current))
            }
            Some(parent) => current = parent,
            None => return Ok(None),
        }
    }
}

/// Paragraph or list item holding `node`: the node itself if it is one,
/// otherwise its parent if that is one.
pub fn structural_container<D: DocumentTree + ?Sized>(
    doc: &D,
    node: NodeId,
) -> Result<Option<NodeId>, TemplateError> {
    if doc.element_type(node)?.is_paragraph_like() {
        return Ok(Some(node));
    }
    match doc.parent(node)? {
        Some(parent) if doc.element_type(parent)?.is_paragraph_like() => Ok(Some(parent)),
        _ => Ok(None),
    }
}

/// Text covered by each range element.
///
/// Partial elements yield their exact slice; whole elements yield their full
/// text, skipping elements with no text (images, empty paragraphs).
pub fn range_text<D: DocumentTree + ?Sized>(
    doc: &D,
    elements: &[RangeElement],
) -> Result<Vec<String>, TemplateError> {
    let mut out = Vec::new();
    for element in elements {
        let text = doc.text(element.element)?;
        match (element.span(), text) {
            (Some(span), Some(text)) => {
                let len = text.chars().count();
                if span.start > span.end_inclusive || span.end_inclusive >= len {
                    return Err(TemplateError::OffsetOutOfBounds {
                        element: element.element,
                        start: span.start,
                        end: span.end_inclusive,
                        len,
                    });
                }
                out.push(text.chars().skip(span.start).take(span.width()).collect());
            }
            (Some(_), None) => return Err(TemplateError::NotText(element.element)),
            (None, Some(text)) if !text.is_empty() => out.push(text),
            (None, _) => {}
        }
    }
    Ok(out)
}

/// Text of the current selection; empty when nothing is selected.
pub fn selected_text<D: DocumentTree + ?Sized>(doc: &D) -> Result<Vec<String>, TemplateError> {
    match doc.selection() {
        Some(elements) => range_text(doc, &elements),
        None => Ok(Vec::new()),
    }
}

/// Text covered by a named range.
pub fn named_range_text<D: DocumentTree + ?Sized>(
    doc: &D,
    id: &str,
) -> Result<Vec<String>, TemplateError> {
    let range = doc
        .named_range(id)
        .ok_or_else(|| TemplateError::NamedRangeNotFound(id.to_string()))?;
    range_text(doc, &range.elements)
}

/// Move the cursor to the start of a named range.
///
/// # Returns
/// false (and no cursor move) when the id is unknown
pub fn locate_named_range<D: DocumentTree + ?Sized>(
    doc: &mut D,
    id: &str,
) -> Result<bool, TemplateError> {
    let Some(first) = doc.named_range(id).and_then(|r| r.elements.into_iter().next()) else {
        debug!("Named range {} not found, cursor left in place", id);
        return Ok(false);
    };
    doc.set_cursor(Position {
        element: first.element,
        offset: first.start_offset.unwrap_or(0),
    })?;
    Ok(true)
}
