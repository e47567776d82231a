use doctemplate_core::{
    DocumentTree, ElementType, NamedRange, NodeId, Position, RangeElement, Span, TemplateError,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

const BODY: NodeId = NodeId(0);

/// Payload of one node of a [`MemoryDocument`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    BodySection,
    Paragraph,
    ListItem {
        list_id: String,
        #[serde(default)]
        nesting_level: u32,
    },
    Table,
    TableRow,
    TableCell,
    Text {
        text: String,
        /// One entry per character; missing entries mean "no background".
        #[serde(default)]
        background: Vec<Option<String>>,
    },
    InlineImage {
        #[serde(default)]
        alt_text: Option<String>,
    },
}

impl NodeKind {
    fn element_type(&self) -> ElementType {
        match self {
            NodeKind::BodySection => ElementType::BodySection,
            NodeKind::Paragraph => ElementType::Paragraph,
            NodeKind::ListItem { .. } => ElementType::ListItem,
            NodeKind::Table => ElementType::Table,
            NodeKind::TableRow => ElementType::TableRow,
            NodeKind::TableCell => ElementType::TableCell,
            NodeKind::Text { .. } => ElementType::Text,
            NodeKind::InlineImage { .. } => ElementType::InlineImage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    #[serde(default)]
    pub parent: Option<NodeId>,
    #[serde(default)]
    pub children: Vec<NodeId>,
}

/// A run of text inside a container, located by its offset in the container's text.
#[derive(Debug, Clone, Copy)]
struct Segment {
    node: NodeId,
    start: usize,
    len: usize,
}

/// Arena-backed document tree.
///
/// Node 0 is the body section. Removed nodes stay in the arena detached from
/// the tree, so node ids are never reused and survive copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryDocument {
    id: String,
    name: String,
    nodes: Vec<Node>,
    #[serde(default)]
    named_ranges: Vec<NamedRange>,
    #[serde(default)]
    selection: Option<Vec<RangeElement>>,
    #[serde(default)]
    cursor: Option<Position>,
}

impl MemoryDocument {
    /// Create an empty document.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nodes: vec![Node {
                kind: NodeKind::BodySection,
                parent: None,
                children: Vec::new(),
            }],
            named_ranges: Vec::new(),
            selection: None,
            cursor: None,
        }
    }

    /// Parse and validate a serialized document.
    pub fn from_json(json: &str) -> Result<Self, TemplateError> {
        let document: MemoryDocument = serde_json::from_str(json)?;
        document.validate()?;
        Ok(document)
    }

    /// Check arena invariants of a deserialized document.
    pub fn validate(&self) -> Result<(), TemplateError> {
        match self.nodes.first() {
            Some(node) if node.kind == NodeKind::BodySection && node.parent.is_none() => {}
            _ => {
                return Err(TemplateError::Serialization(
                    "node 0 must be a body section without parent".to_string(),
                ))
            }
        }
        for (index, node) in self.nodes.iter().enumerate() {
            let id = NodeId(index as u64);
            for child in &node.children {
                let child_node = self.node(*child)?;
                if child_node.parent != Some(id) {
                    return Err(TemplateError::Serialization(format!(
                        "child {} of {} does not point back at its parent",
                        child, id
                    )));
                }
            }
        }
        for range in &self.named_ranges {
            for element in &range.elements {
                self.node(element.element)?;
            }
        }
        Ok(())
    }

    /// Same content under a new identity, as produced by a file copy.
    pub fn copied_as(&self, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nodes: self.nodes.clone(),
            named_ranges: self.named_ranges.clone(),
            selection: None,
            cursor: None,
        }
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Replace the user's selection; `None` clears it.
    pub fn set_selection(
        &mut self,
        selection: Option<Vec<RangeElement>>,
    ) -> Result<(), TemplateError> {
        if let Some(elements) = &selection {
            for element in elements {
                self.ensure_attached(element.element)?;
            }
        }
        self.selection = selection;
        Ok(())
    }

    pub fn cursor(&self) -> Option<Position> {
        self.cursor
    }

    /// Append a paragraph to the body; non-empty text becomes its single run.
    pub fn append_paragraph(&mut self, text: &str) -> NodeId {
        let paragraph = self.push_node(BODY, NodeKind::Paragraph);
        if !text.is_empty() {
            self.push_text(paragraph, text);
        }
        paragraph
    }

    /// Append a list item to the body.
    pub fn append_list_item(&mut self, list_id: &str, text: &str) -> NodeId {
        let item = self.push_node(
            BODY,
            NodeKind::ListItem {
                list_id: list_id.to_string(),
                nesting_level: 0,
            },
        );
        if !text.is_empty() {
            self.push_text(item, text);
        }
        item
    }

    /// Append a table whose cells each hold one paragraph with the given text.
    pub fn append_table(&mut self, rows: &[&[&str]]) -> NodeId {
        let table = self.push_node(BODY, NodeKind::Table);
        for row in rows {
            let row_id = self.push_node(table, NodeKind::TableRow);
            for cell in row.iter() {
                let cell_id = self.push_node(row_id, NodeKind::TableCell);
                let paragraph = self.push_node(cell_id, NodeKind::Paragraph);
                if !cell.is_empty() {
                    self.push_text(paragraph, cell);
                }
            }
        }
        table
    }

    /// Append a paragraph holding only an inline image.
    pub fn append_image_paragraph(&mut self, alt_text: Option<&str>) -> NodeId {
        let paragraph = self.push_node(BODY, NodeKind::Paragraph);
        self.push_node(
            paragraph,
            NodeKind::InlineImage {
                alt_text: alt_text.map(str::to_string),
            },
        );
        paragraph
    }

    /// Append a text run to a paragraph or list item.
    pub fn append_text(&mut self, container: NodeId, text: &str) -> Result<NodeId, TemplateError> {
        self.ensure_attached(container)?;
        if !self.node(container)?.kind.element_type().is_paragraph_like() {
            return Err(TemplateError::InvalidRange(format!(
                "text runs can only be added to paragraphs, not to {}",
                container
            )));
        }
        Ok(self.push_text(container, text))
    }

    /// Paragraph of a table cell, addressed by row and column.
    pub fn table_cell_paragraph(&self, table: NodeId, row: usize, col: usize) -> Option<NodeId> {
        let row_id = *self.node(table).ok()?.children.get(row)?;
        let cell_id = *self.node(row_id).ok()?.children.get(col)?;
        self.node(cell_id).ok()?.children.first().copied()
    }

    /// First text run of a container (or the node itself if it is a text run).
    pub fn first_text(&self, container: NodeId) -> Option<NodeId> {
        let node = self.node(container).ok()?;
        if let NodeKind::Text { .. } = node.kind {
            return Some(container);
        }
        node.children.iter().find_map(|child| self.first_text(*child))
    }

    /// Background color of one character of a text run.
    pub fn background_at(&self, text_node: NodeId, offset: usize) -> Option<String> {
        match &self.node(text_node).ok()?.kind {
            NodeKind::Text { background, .. } => background.get(offset).cloned().flatten(),
            _ => None,
        }
    }

    /// Whether a node is still reachable from the body.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == BODY {
                return true;
            }
            match self.node(current).ok().and_then(|n| n.parent) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Text of every top-level body element, in order.
    pub fn body_texts(&self) -> Vec<String> {
        self.nodes[0]
            .children
            .iter()
            .map(|child| self.collect_text(*child).0)
            .collect()
    }

    /// Replace the content covered by a named range with `text`.
    ///
    /// The covered text is deleted, the replacement is inserted where the
    /// range starts in document order, and the range is re-pointed at the
    /// inserted text. A range replaced by an empty string is removed. Other
    /// named ranges are shifted to keep covering the same characters.
    pub fn replace_named_range_content(
        &mut self,
        id: &str,
        text: &str,
    ) -> Result<(), TemplateError> {
        let range = self
            .named_range(id)
            .ok_or_else(|| TemplateError::NamedRangeNotFound(id.to_string()))?;

        let mut pieces: Vec<(NodeId, Span)> = Vec::new();
        for element in &range.elements {
            self.ensure_attached(element.element)?;
            pieces.extend(self.covered_pieces(element)?);
        }
        let order = self.document_order();
        pieces.sort_by_key(|(node, span)| {
            let position = order.get(node.0 as usize).copied().unwrap_or(usize::MAX);
            (position, span.start)
        });
        let pieces = merge_overlapping(pieces);

        let (anchor, anchor_offset) = match pieces.first() {
            Some((node, span)) => (*node, span.start),
            None => {
                let first = range.elements.first().ok_or_else(|| {
                    TemplateError::InvalidRange(format!("named range {} is empty", id))
                })?;
                match self.element_type(first.element)? {
                    ElementType::Text => (first.element, 0),
                    t if t.is_paragraph_like() => (self.push_text(first.element, ""), 0),
                    _ => return Err(TemplateError::NotText(first.element)),
                }
            }
        };

        // Back to front, so earlier pieces of the same run keep their offsets.
        for (node, span) in pieces.iter().rev() {
            self.delete_text(*node, *span)?;
            self.shift_ranges(id, *node, TextEdit::Delete { at: span.start, len: span.width() });
        }
        let width = text.chars().count();
        self.insert_text(anchor, anchor_offset, text)?;
        self.shift_ranges(id, anchor, TextEdit::Insert { at: anchor_offset, len: width });

        if width == 0 {
            self.named_ranges.retain(|r| r.id != id);
        } else if let Some(range) = self.named_ranges.iter_mut().find(|r| r.id == id) {
            range.elements = vec![RangeElement::partial(
                anchor,
                anchor_offset,
                anchor_offset + width - 1,
            )];
        }
        debug!("Replaced content of named range {} ({} chars)", id, width);
        Ok(())
    }

    /// Preorder position of every attached node, `usize::MAX` for detached ones.
    fn document_order(&self) -> Vec<usize> {
        let mut order = vec![usize::MAX; self.nodes.len()];
        let mut stack = vec![BODY];
        let mut next = 0;
        while let Some(id) = stack.pop() {
            if let Some(slot) = order.get_mut(id.0 as usize) {
                *slot = next;
                next += 1;
            }
            if let Ok(node) = self.node(id) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        order
    }

    /// Where `run` starts in the text of itself and of each of its ancestors.
    fn run_bases(&self, run: NodeId) -> Vec<(NodeId, usize)> {
        let mut bases = vec![(run, 0)];
        let mut current = run;
        while let Some(parent) = self.node(current).ok().and_then(|n| n.parent) {
            let (_, segments) = self.collect_text(parent);
            if let Some(segment) = segments.iter().find(|s| s.node == run) {
                bases.push((parent, segment.start));
            }
            current = parent;
        }
        bases
    }

    /// Keep the other named ranges on the same characters after an edit of `run`.
    ///
    /// Elements whose whole span was deleted are dropped, and so are ranges
    /// left without elements.
    fn shift_ranges(&mut self, skip: &str, run: NodeId, edit: TextEdit) {
        if edit.is_noop() {
            return;
        }
        let bases = self.run_bases(run);
        for range in self.named_ranges.iter_mut().filter(|r| r.id != skip) {
            range.elements.retain_mut(|element| {
                let Some(span) = element.span() else { return true };
                let Some(&(_, base)) = bases.iter().find(|(node, _)| *node == element.element)
                else {
                    return true;
                };
                match edit.apply(span, base) {
                    Some(shifted) => {
                        element.start_offset = Some(shifted.start);
                        element.end_offset_inclusive = Some(shifted.end_inclusive);
                        true
                    }
                    None => false,
                }
            });
        }
        self.named_ranges.retain(|r| !r.elements.is_empty());
    }

    fn node(&self, id: NodeId) -> Result<&Node, TemplateError> {
        self.nodes
            .get(id.0 as usize)
            .ok_or(TemplateError::ElementNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, TemplateError> {
        self.nodes
            .get_mut(id.0 as usize)
            .ok_or(TemplateError::ElementNotFound(id))
    }

    fn ensure_attached(&self, id: NodeId) -> Result<(), TemplateError> {
        self.node(id)?;
        if self.is_attached(id) {
            Ok(())
        } else {
            Err(TemplateError::Detached(id))
        }
    }

    fn push_node(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u64);
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0 as usize].children.push(id);
        id
    }

    fn push_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push_node(
            parent,
            NodeKind::Text {
                text: text.to_string(),
                background: vec![None; text.chars().count()],
            },
        )
    }

    /// Text of a node plus the text runs it is made of.
    ///
    /// Runs inside a paragraph are concatenated; every other container joins
    /// its children with a newline.
    fn collect_text(&self, id: NodeId) -> (String, Vec<Segment>) {
        let mut text = String::new();
        let mut segments = Vec::new();
        let mut position = 0;
        self.collect_into(id, &mut text, &mut segments, &mut position);
        (text, segments)
    }

    fn collect_into(
        &self,
        id: NodeId,
        text: &mut String,
        segments: &mut Vec<Segment>,
        position: &mut usize,
    ) {
        let Ok(node) = self.node(id) else { return };
        match &node.kind {
            NodeKind::Text { text: run, .. } => {
                let len = run.chars().count();
                segments.push(Segment {
                    node: id,
                    start: *position,
                    len,
                });
                text.push_str(run);
                *position += len;
            }
            NodeKind::InlineImage { .. } => {}
            kind => {
                let separator = !kind.element_type().is_paragraph_like();
                for (i, child) in node.children.iter().enumerate() {
                    if separator && i > 0 {
                        text.push('\n');
                        *position += 1;
                    }
                    self.collect_into(*child, text, segments, position);
                }
            }
        }
    }

    /// Resolve a range element to the text runs (and spans within them) it covers.
    fn covered_pieces(&self, element: &RangeElement) -> Result<Vec<(NodeId, Span)>, TemplateError> {
        let (text, segments) = self.collect_text(element.element);
        let total = text.chars().count();
        let (start, end) = match element.span() {
            Some(span) => {
                check_span(element.element, span, total)?;
                (span.start, span.end_inclusive)
            }
            None if total == 0 => return Ok(Vec::new()),
            None => (0, total - 1),
        };
        Ok(segments
            .iter()
            .filter(|s| s.len > 0 && s.start <= end && s.start + s.len > start)
            .map(|s| {
                let local_start = start.max(s.start) - s.start;
                let local_end = end.min(s.start + s.len - 1) - s.start;
                (s.node, Span::new(local_start, local_end))
            })
            .collect())
    }

    fn delete_text(&mut self, node: NodeId, span: Span) -> Result<(), TemplateError> {
        match &mut self.node_mut(node)?.kind {
            NodeKind::Text { text, background } => {
                let mut chars: Vec<char> = text.chars().collect();
                check_span(node, span, chars.len())?;
                background.resize(chars.len(), None);
                let chars_tail = chars.split_off(span.end_inclusive + 1);
                let background_tail = background.split_off(span.end_inclusive + 1);
                chars.truncate(span.start);
                background.truncate(span.start);
                chars.extend(chars_tail);
                background.extend(background_tail);
                *text = chars.into_iter().collect();
                Ok(())
            }
            _ => Err(TemplateError::NotText(node)),
        }
    }

    fn insert_text(
        &mut self,
        node: NodeId,
        offset: usize,
        inserted: &str,
    ) -> Result<(), TemplateError> {
        match &mut self.node_mut(node)?.kind {
            NodeKind::Text { text, background } => {
                let mut chars: Vec<char> = text.chars().collect();
                if offset > chars.len() {
                    return Err(TemplateError::OffsetOutOfBounds {
                        element: node,
                        start: offset,
                        end: offset,
                        len: chars.len(),
                    });
                }
                background.resize(chars.len(), None);
                let chars_tail = chars.split_off(offset);
                let background_tail = background.split_off(offset);
                chars.extend(inserted.chars());
                background.resize(chars.len(), None);
                chars.extend(chars_tail);
                background.extend(background_tail);
                *text = chars.into_iter().collect();
                Ok(())
            }
            _ => Err(TemplateError::NotText(node)),
        }
    }

    /// Drop range elements, selection and cursor pointing at detached nodes.
    fn prune_detached(&mut self) {
        let attached: Vec<bool> = (0..self.nodes.len())
            .map(|i| self.is_attached(NodeId(i as u64)))
            .collect();
        let is_live = |id: NodeId| attached.get(id.0 as usize).copied().unwrap_or(false);

        for range in &mut self.named_ranges {
            range.elements.retain(|e| is_live(e.element));
        }
        let before = self.named_ranges.len();
        self.named_ranges.retain(|r| !r.elements.is_empty());
        if self.named_ranges.len() < before {
            debug!(
                "Dropped {} named range(s) whose content was removed",
                before - self.named_ranges.len()
            );
        }
        if let Some(selection) = &mut self.selection {
            selection.retain(|e| is_live(e.element));
        }
        if self.selection.as_ref().is_some_and(|s| s.is_empty()) {
            self.selection = None;
        }
        if self.cursor.is_some_and(|p| !is_live(p.element)) {
            self.cursor = None;
        }
    }
}

fn check_span(element: NodeId, span: Span, len: usize) -> Result<(), TemplateError> {
    if span.start > span.end_inclusive || span.end_inclusive >= len {
        return Err(TemplateError::OffsetOutOfBounds {
            element,
            start: span.start,
            end: span.end_inclusive,
            len,
        });
    }
    Ok(())
}

/// Merge pieces of the same run that overlap. Expects document order.
fn merge_overlapping(pieces: Vec<(NodeId, Span)>) -> Vec<(NodeId, Span)> {
    let mut merged: Vec<(NodeId, Span)> = Vec::with_capacity(pieces.len());
    for (node, span) in pieces {
        match merged.last_mut() {
            Some((last_node, last)) if *last_node == node && span.start <= last.end_inclusive => {
                last.end_inclusive = last.end_inclusive.max(span.end_inclusive);
            }
            _ => merged.push((node, span)),
        }
    }
    merged
}

/// A single edit of one text run, offsets local to the run.
#[derive(Debug, Clone, Copy)]
enum TextEdit {
    Delete { at: usize, len: usize },
    Insert { at: usize, len: usize },
}

impl TextEdit {
    fn is_noop(self) -> bool {
        match self {
            TextEdit::Delete { len, .. } | TextEdit::Insert { len, .. } => len == 0,
        }
    }

    /// `span` after the edit, for an element whose text holds the run at `base`.
    /// `None` when nothing of the span survives.
    fn apply(self, span: Span, base: usize) -> Option<Span> {
        match self {
            TextEdit::Delete { at, len } => {
                let at = base + at;
                let end = at + len;
                if span.end_inclusive < at {
                    Some(span)
                } else if span.start >= end {
                    Some(Span::new(span.start - len, span.end_inclusive - len))
                } else if span.start >= at && span.end_inclusive < end {
                    None
                } else {
                    let end_inclusive = if span.end_inclusive >= end {
                        span.end_inclusive - len
                    } else {
                        at - 1
                    };
                    Some(Span::new(span.start.min(at), end_inclusive))
                }
            }
            TextEdit::Insert { at, len } => {
                let at = base + at;
                if span.end_inclusive < at {
                    Some(span)
                } else if span.start >= at {
                    Some(Span::new(span.start + len, span.end_inclusive + len))
                } else {
                    Some(Span::new(span.start, span.end_inclusive + len))
                }
            }
        }
    }
}

impl DocumentTree for MemoryDocument {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn body(&self) -> NodeId {
        BODY
    }

    fn selection(&self) -> Option<Vec<RangeElement>> {
        self.selection.clone()
    }

    fn named_ranges(&self) -> Vec<NamedRange> {
        self.named_ranges.clone()
    }

    fn add_named_range(
        &mut self,
        name: &str,
        elements: Vec<RangeElement>,
    ) -> Result<NamedRange, TemplateError> {
        if elements.is_empty() {
            return Err(TemplateError::InvalidRange(
                "a named range needs at least one element".to_string(),
            ));
        }
        for element in &elements {
            self.ensure_attached(element.element)?;
            if let Some(span) = element.span() {
                let text = self
                    .text(element.element)?
                    .ok_or(TemplateError::NotText(element.element))?;
                check_span(element.element, span, text.chars().count())?;
            }
        }
        let range = NamedRange {
            id: Uuid::new_v4().simple().to_string(),
            name: name.to_string(),
            elements,
        };
        self.named_ranges.push(range.clone());
        Ok(range)
    }

    fn remove_named_range(&mut self, id: &str) -> bool {
        let before = self.named_ranges.len();
        self.named_ranges.retain(|r| r.id != id);
        self.named_ranges.len() < before
    }

    fn element_type(&self, node: NodeId) -> Result<ElementType, TemplateError> {
        Ok(self.node(node)?.kind.element_type())
    }

    fn parent(&self, node: NodeId) -> Result<Option<NodeId>, TemplateError> {
        Ok(self.node(node)?.parent)
    }

    fn children(&self, node: NodeId) -> Result<Vec<NodeId>, TemplateError> {
        Ok(self.node(node)?.children.clone())
    }

    fn text(&self, node: NodeId) -> Result<Option<String>, TemplateError> {
        match &self.node(node)?.kind {
            NodeKind::Text { text, .. } => Ok(Some(text.clone())),
            NodeKind::InlineImage { .. } => Ok(None),
            _ => Ok(Some(self.collect_text(node).0)),
        }
    }

    fn set_background_color(
        &mut self,
        node: NodeId,
        span: Option<Span>,
        color: Option<&str>,
    ) -> Result<(), TemplateError> {
        if let NodeKind::InlineImage { .. } = self.node(node)?.kind {
            return Err(TemplateError::NotText(node));
        }
        let pieces = self.covered_pieces(&match span {
            Some(span) => RangeElement::partial(node, span.start, span.end_inclusive),
            None => RangeElement::whole(node),
        })?;
        for (run, local) in pieces {
            if let NodeKind::Text { text, background } = &mut self.node_mut(run)?.kind {
                background.resize(text.chars().count(), None);
                for slot in &mut background[local.start..=local.end_inclusive] {
                    *slot = color.map(str::to_string);
                }
            }
        }
        Ok(())
    }

    fn remove_from_parent(&mut self, node: NodeId) -> Result<(), TemplateError> {
        if node == BODY {
            return Err(TemplateError::InvalidRange("the body cannot be removed".to_string()));
        }
        self.ensure_attached(node)?;
        let parent = self.node(node)?.parent.ok_or(TemplateError::Detached(node))?;
        let parent_node = self.node(parent)?;
        if parent == BODY && parent_node.children.len() == 1 {
            return Err(TemplateError::LastChild(ElementType::BodySection));
        }
        self.node_mut(parent)?.children.retain(|c| *c != node);
        self.node_mut(node)?.parent = None;
        self.prune_detached();
        debug!("Removed {} from {}", node, parent);
        Ok(())
    }

    fn list_id(&self, node: NodeId) -> Result<Option<String>, TemplateError> {
        match &self.node(node)?.kind {
            NodeKind::ListItem { list_id, .. } => Ok(Some(list_id.clone())),
            _ => Ok(None),
        }
    }

    fn contains_inline_image(&self, node: NodeId) -> Result<bool, TemplateError> {
        let n = self.node(node)?;
        if let NodeKind::InlineImage { .. } = n.kind {
            return Ok(true);
        }
        for child in &n.children {
            if self.contains_inline_image(*child)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn set_cursor(&mut self, position: Position) -> Result<(), TemplateError> {
        self.ensure_attached(position.element)?;
        let len = self
            .text(position.element)?
            .map(|t| t.chars().count())
            .unwrap_or(0);
        if position.offset > len {
            return Err(TemplateError::OffsetOutOfBounds {
                element: position.element,
                start: position.offset,
                end: position.offset,
                len,
            });
        }
        self.cursor = Some(position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn sample() -> (MemoryDocument, NodeId, NodeId) {
        let mut doc = MemoryDocument::new("doc-1", "Lease");
        let first = doc.append_paragraph("Dear Alice,");
        let second = doc.append_paragraph("Rent is due monthly.");
        (doc, first, second)
    }

    #[test]
    fn test_paragraph_text_concatenates_runs() {
        let (mut doc, first, _) = sample();
        doc.append_text(first, " welcome").unwrap();
        assert_eq!(doc.text(first).unwrap().as_deref(), Some("Dear Alice, welcome"));
    }

    #[test]
    fn test_table_text_joins_cells() {
        let mut doc = MemoryDocument::new("doc-1", "Table");
        let table = doc.append_table(&[&["a", "b"], &["c", "d"]]);
        assert_eq!(doc.text(table).unwrap().as_deref(), Some("a\nb\nc\nd"));
        let cell = doc.table_cell_paragraph(table, 1, 0).unwrap();
        assert_eq!(doc.text(cell).unwrap().as_deref(), Some("c"));
    }

    #[test]
    fn test_background_color_spans_runs() {
        let (mut doc, first, _) = sample();
        let tail = doc.append_text(first, "!!").unwrap();
        let head = doc.first_text(first).unwrap();

        // "Dear Alice,!!" -> color "Alice,!" (5..=11)
        doc.set_background_color(first, Some(Span::new(5, 11)), Some("#FFD700"))
            .unwrap();
        assert_eq!(doc.background_at(head, 4), None);
        assert_eq!(doc.background_at(head, 5).as_deref(), Some("#FFD700"));
        assert_eq!(doc.background_at(tail, 0).as_deref(), Some("#FFD700"));
        assert_eq!(doc.background_at(tail, 1), None);

        doc.set_background_color(first, None, None).unwrap();
        assert_eq!(doc.background_at(head, 5), None);
    }

    #[test]
    fn test_background_color_rejects_out_of_bounds() {
        let (mut doc, first, _) = sample();
        let err = doc
            .set_background_color(first, Some(Span::new(3, 99)), Some("#00FF00"))
            .unwrap_err();
        assert!(matches!(err, TemplateError::OffsetOutOfBounds { len: 11, .. }));
    }

    #[test]
    fn test_remove_last_body_child_fails() {
        let mut doc = MemoryDocument::new("doc-1", "Single");
        let only = doc.append_paragraph("only");
        let err = doc.remove_from_parent(only).unwrap_err();
        assert!(matches!(err, TemplateError::LastChild(ElementType::BodySection)));
    }

    #[test]
    fn test_remove_prunes_named_ranges() {
        let (mut doc, first, second) = sample();
        let text = doc.first_text(first).unwrap();
        let range = doc
            .add_named_range("[C]greeting", vec![RangeElement::partial(text, 0, 3)])
            .unwrap();
        doc.remove_from_parent(first).unwrap();

        assert!(doc.named_range(&range.id).is_none());
        assert!(!doc.is_attached(text));
        assert_eq!(doc.body_texts(), vec!["Rent is due monthly.".to_string()]);
        assert!(matches!(
            doc.remove_from_parent(first),
            Err(TemplateError::Detached(_))
        ));
        assert!(doc.is_attached(second));
    }

    #[test]
    fn test_replace_named_range_content() {
        let (mut doc, first, _) = sample();
        let text = doc.first_text(first).unwrap();
        let range = doc
            .add_named_range("[F]name", vec![RangeElement::partial(text, 5, 9)])
            .unwrap();
        doc.set_background_color(text, Some(Span::new(5, 9)), Some("#00FF00"))
            .unwrap();

        doc.replace_named_range_content(&range.id, "Bob").unwrap();

        assert_eq!(doc.text(first).unwrap().as_deref(), Some("Dear Bob,"));
        let updated = doc.named_range(&range.id).unwrap();
        assert_eq!(updated.elements, vec![RangeElement::partial(text, 5, 7)]);
        assert_eq!(doc.background_at(text, 5), None);
    }

    #[test]
    fn test_replace_with_empty_text_drops_range() {
        let (mut doc, first, _) = sample();
        let text = doc.first_text(first).unwrap();
        let range = doc
            .add_named_range("[F]name", vec![RangeElement::partial(text, 5, 9)])
            .unwrap();
        doc.replace_named_range_content(&range.id, "").unwrap();
        assert_eq!(doc.text(first).unwrap().as_deref(), Some("Dear ,"));
        assert!(doc.named_range(&range.id).is_none());
    }

    fn letter() -> (MemoryDocument, NodeId, NodeId) {
        let mut doc = MemoryDocument::new("doc-2", "Letter");
        let paragraph = doc.append_paragraph("Dear NAME from CITY.");
        let run = doc.first_text(paragraph).unwrap();
        (doc, paragraph, run)
    }

    #[rstest]
    #[case("Al")]
    #[case("Alexander")]
    fn test_replace_keeps_later_range_in_same_run(#[case] name: &str) {
        let (mut doc, paragraph, run) = letter();
        let who = doc
            .add_named_range("[F]name", vec![RangeElement::partial(run, 5, 8)])
            .unwrap();
        let town = doc
            .add_named_range("[F]city", vec![RangeElement::partial(run, 15, 18)])
            .unwrap();
        let width = name.chars().count();

        doc.replace_named_range_content(&who.id, name).unwrap();
        assert_eq!(
            doc.named_range(&town.id).unwrap().elements,
            vec![RangeElement::partial(run, 11 + width, 14 + width)]
        );

        doc.replace_named_range_content(&town.id, "Paris").unwrap();
        assert_eq!(
            doc.text(paragraph).unwrap(),
            Some(format!("Dear {} from Paris.", name))
        );
        assert_eq!(
            doc.named_range(&who.id).unwrap().elements,
            vec![RangeElement::partial(run, 5, 4 + width)]
        );
    }

    #[test]
    fn test_replace_shifts_paragraph_level_range() {
        let (mut doc, paragraph, run) = letter();
        doc.append_text(paragraph, " Regards").unwrap();
        let who = doc
            .add_named_range("[F]name", vec![RangeElement::partial(run, 5, 8)])
            .unwrap();
        let closing = doc
            .add_named_range("[C]closing", vec![RangeElement::partial(paragraph, 21, 27)])
            .unwrap();

        doc.replace_named_range_content(&who.id, "Bob").unwrap();

        assert_eq!(
            doc.named_range(&closing.id).unwrap().elements,
            vec![RangeElement::partial(paragraph, 20, 26)]
        );
        let text = doc.text(paragraph).unwrap().unwrap();
        assert_eq!(text.chars().skip(20).take(7).collect::<String>(), "Regards");
    }

    #[test]
    fn test_replace_drops_range_inside_deleted_text() {
        let (mut doc, _, run) = letter();
        let who = doc
            .add_named_range("[F]name", vec![RangeElement::partial(run, 5, 8)])
            .unwrap();
        let initial = doc
            .add_named_range("[C]initial", vec![RangeElement::partial(run, 5, 5)])
            .unwrap();

        doc.replace_named_range_content(&who.id, "Bob").unwrap();

        assert!(doc.named_range(&initial.id).is_none());
        assert!(doc.named_range(&who.id).is_some());
    }

    #[test]
    fn test_replace_discontinuous_range_in_document_order() {
        let mut doc = MemoryDocument::new("doc-3", "Deal");
        let paragraph = doc.append_paragraph("ACME sells to ACME.");
        let run = doc.first_text(paragraph).unwrap();
        // Later occurrence listed first.
        let company = doc
            .add_named_range(
                "[F]company",
                vec![RangeElement::partial(run, 14, 17), RangeElement::partial(run, 0, 3)],
            )
            .unwrap();

        doc.replace_named_range_content(&company.id, "Globex").unwrap();

        assert_eq!(doc.text(paragraph).unwrap().as_deref(), Some("Globex sells to ."));
        assert_eq!(
            doc.named_range(&company.id).unwrap().elements,
            vec![RangeElement::partial(run, 0, 5)]
        );
    }

    #[test]
    fn test_json_round_trip_validates() {
        let (mut doc, first, _) = sample();
        let text = doc.first_text(first).unwrap();
        doc.add_named_range("[F]name", vec![RangeElement::partial(text, 5, 9)])
            .unwrap();
        let json = serde_json::to_string(&doc).unwrap();
        let parsed = MemoryDocument::from_json(&json).unwrap();
        assert_eq!(parsed, doc);

        let broken = r#"{"id":"x","name":"x","nodes":[{"kind":{"type":"PARAGRAPH"}}]}"#;
        assert!(MemoryDocument::from_json(broken).is_err());
    }
}
