use doctemplate_core::{DocumentTree, ElementType, NodeId, RangeElement, TemplateError};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::navigation::top_level_container;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementReport {
    pub element: NodeId,
    pub start_offset: Option<usize>,
    pub end_offset_inclusive: Option<usize>,
    pub element_type: ElementType,
    pub parent_type: Option<ElementType>,
    pub top_level_type: Option<ElementType>,
    /// Set when the top-level container is a table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_text: Option<String>,
    /// Set when the top-level container is a list item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionFailure {
    pub element: NodeId,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionReport {
    pub range_id: String,
    pub name: String,
    pub count: usize,
    pub elements: Vec<ElementReport>,
    pub failures: Vec<InspectionFailure>,
}

/// Describe the structure under a named range.
///
/// Elements that cannot be traversed are listed under `failures` and the
/// rest of the report is still produced.
pub fn inspect_named_range<D: DocumentTree + ?Sized>(
    doc: &D,
    id: &str,
) -> Result<InspectionReport, TemplateError> {
    let range = doc
        .named_range(id)
        .ok_or_else(|| TemplateError::NamedRangeNotFound(id.to_string()))?;

    let mut elements = Vec::with_capacity(range.elements.len());
    let mut failures = Vec::new();
    for element in &range.elements {
        match describe(doc, element) {
            Ok(report) => elements.push(report),
            Err(e) => {
                warn!("Could not inspect {} of named range {}: {}", element.element, id, e);
                failures.push(InspectionFailure {
                    element: element.element,
                    detail: e.to_string(),
                });
            }
        }
    }

    Ok(InspectionReport {
        range_id: range.id,
        name: range.name,
        count: range.elements.len(),
        elements,
        failures,
    })
}

fn describe<D: DocumentTree + ?Sized>(
    doc: &D,
    element: &RangeElement,
) -> Result<ElementReport, TemplateError> {
    let node = element.element;
    let parent_type = match doc.parent(node)? {
        Some(parent) => Some(doc.element_type(parent)?),
        None => None,
    };

    let mut report = ElementReport {
        element: node,
        start_offset: element.start_offset,
        end_offset_inclusive: element.end_offset_inclusive,
        element_type: doc.element_type(node)?,
        parent_type,
        top_level_type: None,
        table_text: None,
        list_id: None,
    };

    if let Some(top) = top_level_container(doc, node)? {
        let top_type = doc.element_type(top)?;
        report.top_level_type = Some(top_type);
        match top_type {
            ElementType::Table => report.table_text = doc.text(top)?,
            ElementType::ListItem => report.list_id = doc.list_id(top)?,
            _ => {}
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use doctemplate_local::MemoryDocument;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_inspect_table_and_list_membership() {
        let mut doc = MemoryDocument::new("d", "D");
        let table = doc.append_table(&[&["Fee", "50"]]);
        let item = doc.append_list_item("list-7", "Bring ID");
        let cell_text = doc
            .first_text(doc.table_cell_paragraph(table, 0, 1).unwrap())
            .unwrap();
        let item_text = doc.first_text(item).unwrap();
        let range = doc
            .add_named_range(
                "[C]extras",
                vec![
                    RangeElement::partial(cell_text, 0, 1),
                    RangeElement::whole(item_text),
                ],
            )
            .unwrap();

        let report = inspect_named_range(&doc, &range.id).unwrap();

        assert_eq!(report.count, 2);
        assert!(report.failures.is_empty());
        assert_eq!(
            report.elements[0],
            ElementReport {
                element: cell_text,
                start_offset: Some(0),
                end_offset_inclusive: Some(1),
                element_type: ElementType::Text,
                parent_type: Some(ElementType::Paragraph),
                top_level_type: Some(ElementType::Table),
                table_text: Some("Fee\n50".to_string()),
                list_id: None,
            }
        );
        assert_eq!(report.elements[1].parent_type, Some(ElementType::ListItem));
        assert_eq!(report.elements[1].list_id.as_deref(), Some("list-7"));
        assert_eq!(report.elements[1].table_text, None);
    }

    #[test]
    fn test_inspect_unknown_range() {
        let doc = MemoryDocument::new("d", "D");
        let err = inspect_named_range(&doc, "nope").unwrap_err();
        assert!(matches!(err, TemplateError::NamedRangeNotFound(_)));
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let mut doc = MemoryDocument::new("d", "D");
        let paragraph = doc.append_paragraph("Hi");
        let text = doc.first_text(paragraph).unwrap();
        let range = doc
            .add_named_range("[F]greeting", vec![RangeElement::partial(text, 0, 1)])
            .unwrap();

        let value = serde_json::to_value(inspect_named_range(&doc, &range.id).unwrap()).unwrap();
        assert_eq!(value["count"], 1);
        assert_eq!(value["elements"][0]["endOffsetInclusive"], 1);
        assert_eq!(value["elements"][0]["topLevelType"], "PARAGRAPH");
        assert!(value["elements"][0].get("tableText").is_none());
    }
}
