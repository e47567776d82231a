use doctemplate_core::{DocumentTree, NamedRange, TemplateError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Display colors, handed out by enumeration index.
pub const PALETTE: [&str; 7] = [
    "#FFD700", "#FF69B4", "#00CED1", "#32CD32", "#FFA500", "#9370DB", "#20B2AA",
];

/// Color of the placeholder at `index` in the current enumeration.
///
/// Positional, not tied to range identity: adding or removing ranges shifts
/// the colors of the ranges after it.
pub fn palette_color(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

/// View of a named range for the placeholder list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placeholder {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListNamedRangesResponse {
    pub placeholders: Vec<Placeholder>,
}

impl ListNamedRangesResponse {
    pub fn ids(&self) -> Vec<&str> {
        self.placeholders.iter().map(|p| p.id.as_str()).collect()
    }
}

/// List the document's named ranges, assigning each a palette color.
///
/// With `update_color`, the covered text is painted with the assigned color
/// (`with_color`) or has its background cleared (`!with_color`). Without it
/// the document is left untouched.
pub fn list_named_ranges<D: DocumentTree + ?Sized>(
    doc: &mut D,
    with_color: bool,
    update_color: bool,
) -> Result<ListNamedRangesResponse, TemplateError> {
    let ranges = doc.named_ranges();
    if update_color {
        for (index, range) in ranges.iter().enumerate() {
            let color = with_color.then(|| palette_color(index));
            paint_range(doc, range, color)?;
        }
        debug!(
            "Repainted {} named range(s) (colored: {})",
            ranges.len(),
            with_color
        );
    }
    Ok(project(&ranges, with_color))
}

/// Read-only listing; never touches the document.
pub fn list_placeholders<D: DocumentTree + ?Sized>(
    doc: &D,
    with_color: bool,
) -> ListNamedRangesResponse {
    project(&doc.named_ranges(), with_color)
}

fn project(ranges: &[NamedRange], with_color: bool) -> ListNamedRangesResponse {
    let placeholders = ranges
        .iter()
        .enumerate()
        .map(|(index, range)| Placeholder {
            id: range.id.clone(),
            name: range.name.clone(),
            color: with_color.then(|| palette_color(index).to_string()),
        })
        .collect();
    ListNamedRangesResponse { placeholders }
}

/// Set (or clear) the background of every text-bearing element of a range.
///
/// Elements without offsets are painted as a whole.
pub(crate) fn paint_range<D: DocumentTree + ?Sized>(
    doc: &mut D,
    range: &NamedRange,
    color: Option<&str>,
) -> Result<(), TemplateError> {
    for element in &range.elements {
        if doc.text(element.element)?.is_none() {
            continue;
        }
        doc.set_background_color(element.element, element.span(), color)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use doctemplate_core::RangeElement;
    use doctemplate_local::MemoryDocument;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_palette_cycles_every_seven() {
        assert_eq!(palette_color(0), "#FFD700");
        assert_eq!(palette_color(6), "#20B2AA");
        assert_eq!(palette_color(7), palette_color(0));
        assert_eq!(palette_color(15), palette_color(1));
    }

    #[test]
    fn test_listing_paints_and_clears() {
        let mut doc = MemoryDocument::new("d", "D");
        let paragraph = doc.append_paragraph("Dear NAME, welcome");
        let text = doc.first_text(paragraph).unwrap();
        doc.add_named_range("[F]name", vec![RangeElement::partial(text, 5, 8)])
            .unwrap();
        doc.add_named_range("[C]whole", vec![RangeElement::whole(paragraph)])
            .unwrap();

        let listing = list_named_ranges(&mut doc, true, true).unwrap();
        assert_eq!(listing.placeholders[0].color.as_deref(), Some("#FFD700"));
        assert_eq!(listing.placeholders[1].color.as_deref(), Some("#FF69B4"));
        // The whole-paragraph range is painted last and wins on shared characters.
        assert_eq!(doc.background_at(text, 0).as_deref(), Some("#FF69B4"));
        assert_eq!(doc.background_at(text, 17).as_deref(), Some("#FF69B4"));

        let cleared = list_named_ranges(&mut doc, false, true).unwrap();
        assert!(cleared.placeholders.iter().all(|p| p.color.is_none()));
        assert_eq!(doc.background_at(text, 5), None);
    }

    #[test]
    fn test_listing_without_update_leaves_document() {
        let mut doc = MemoryDocument::new("d", "D");
        let paragraph = doc.append_paragraph("NAME");
        let text = doc.first_text(paragraph).unwrap();
        doc.add_named_range("[F]name", vec![RangeElement::partial(text, 0, 3)])
            .unwrap();
        let before = doc.clone();

        let listing = list_named_ranges(&mut doc, true, false).unwrap();
        assert_eq!(listing.placeholders[0].color.as_deref(), Some("#FFD700"));
        assert_eq!(doc, before);
        assert_eq!(list_placeholders(&doc, true), listing);
    }
}
