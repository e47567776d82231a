use doctemplate_core::{DocumentTree, TemplateError};
use tracing::{debug, info};

use crate::registry::{list_named_ranges, paint_range, ListNamedRangesResponse};

/// Clear a range's background and delete its registration.
///
/// An unknown id is a no-op: the document is not touched and the listing is
/// computed read-only.
pub fn remove_named_range<D: DocumentTree + ?Sized>(
    doc: &mut D,
    id: &str,
) -> Result<ListNamedRangesResponse, TemplateError> {
    if !clear_and_remove(doc, id)? {
        debug!("Named range {} not found, nothing removed", id);
        return list_named_ranges(doc, true, false);
    }
    list_named_ranges(doc, true, true)
}

/// Remove every named range of the document.
pub fn remove_all_named_ranges<D: DocumentTree + ?Sized>(
    doc: &mut D,
) -> Result<ListNamedRangesResponse, TemplateError> {
    let ranges = doc.named_ranges();
    for range in &ranges {
        clear_and_remove(doc, &range.id)?;
    }
    if !ranges.is_empty() {
        info!("Removed all {} named range(s) from document {}", ranges.len(), doc.id());
    }
    list_named_ranges(doc, true, true)
}

fn clear_and_remove<D: DocumentTree + ?Sized>(
    doc: &mut D,
    id: &str,
) -> Result<bool, TemplateError> {
    let Some(range) = doc.named_range(id) else {
        return Ok(false);
    };
    paint_range(doc, &range, None)?;
    doc.remove_named_range(id);
    info!("Removed named range {} ({})", range.name, id);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use doctemplate_core::RangeElement;
    use doctemplate_local::MemoryDocument;
    use pretty_assertions::assert_eq;

    fn two_ranges() -> (MemoryDocument, String, String) {
        let mut doc = MemoryDocument::new("d", "D");
        let paragraph = doc.append_paragraph("Alice lives in Paris");
        let text = doc.first_text(paragraph).unwrap();
        let name = doc
            .add_named_range("[F]name", vec![RangeElement::partial(text, 0, 4)])
            .unwrap();
        let city = doc
            .add_named_range("[F]city", vec![RangeElement::partial(text, 15, 19)])
            .unwrap();
        list_named_ranges(&mut doc, true, true).unwrap();
        (doc, name.id, city.id)
    }

    #[test]
    fn test_remove_clears_color_and_recolors_rest() {
        let (mut doc, name, city) = two_ranges();
        let text = doc.first_text(doc.children(doc.body()).unwrap()[0]).unwrap();

        let listing = remove_named_range(&mut doc, &name).unwrap();

        assert_eq!(listing.ids(), vec![city.as_str()]);
        assert_eq!(doc.background_at(text, 0), None);
        // The remaining range moved to index 0 and takes the first palette color.
        assert_eq!(doc.background_at(text, 15).as_deref(), Some("#FFD700"));
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let (mut doc, _, _) = two_ranges();
        let before = doc.clone();
        let listing_before = list_named_ranges(&mut doc, true, false).unwrap();

        let listing = remove_named_range(&mut doc, "does-not-exist").unwrap();

        assert_eq!(listing, listing_before);
        assert_eq!(doc, before);
    }

    #[test]
    fn test_remove_all_twice() {
        let (mut doc, _, _) = two_ranges();
        assert!(remove_all_named_ranges(&mut doc).unwrap().placeholders.is_empty());
        assert!(remove_all_named_ranges(&mut doc).unwrap().placeholders.is_empty());
    }
}
