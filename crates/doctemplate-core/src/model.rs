use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix the batch update API expects in front of a named range id.
pub const NAMED_RANGE_ID_PREFIX: &str = "kix.";

/// Stable handle to a node of one document.
///
/// Handles survive a document copy, so a range id resolved on the source
/// points at the same content in the copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Element types of the document tree, named the way the host reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementType {
    BodySection,
    Paragraph,
    ListItem,
    Table,
    TableRow,
    TableCell,
    Text,
    InlineImage,
}

impl ElementType {
    /// Paragraphs and list items are the structural containers a condition removes.
    pub fn is_paragraph_like(self) -> bool {
        matches!(self, ElementType::Paragraph | ElementType::ListItem)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::BodySection => "BODY_SECTION",
            ElementType::Paragraph => "PARAGRAPH",
            ElementType::ListItem => "LIST_ITEM",
            ElementType::Table => "TABLE",
            ElementType::TableRow => "TABLE_ROW",
            ElementType::TableCell => "TABLE_CELL",
            ElementType::Text => "TEXT",
            ElementType::InlineImage => "INLINE_IMAGE",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive character span inside one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end_inclusive: usize,
}

impl Span {
    pub fn new(start: usize, end_inclusive: usize) -> Self {
        Self { start, end_inclusive }
    }

    /// Number of characters covered.
    pub fn width(&self) -> usize {
        self.end_inclusive + 1 - self.start
    }
}

/// Reference to (part of) an element covered by a selection or a named range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeElement {
    pub element: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_offset: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_offset_inclusive: Option<usize>,
}

impl RangeElement {
    /// The whole element is covered.
    pub fn whole(element: NodeId) -> Self {
        Self {
            element,
            start_offset: None,
            end_offset_inclusive: None,
        }
    }

    /// Only `start..=end_inclusive` of the element is covered.
    pub fn partial(element: NodeId, start: usize, end_inclusive: usize) -> Self {
        Self {
            element,
            start_offset: Some(start),
            end_offset_inclusive: Some(end_inclusive),
        }
    }

    pub fn is_partial(&self) -> bool {
        self.span().is_some()
    }

    /// The covered span, if offsets are defined.
    pub fn span(&self) -> Option<Span> {
        match (self.start_offset, self.end_offset_inclusive) {
            (Some(start), Some(end)) => Some(Span::new(start, end)),
            _ => None,
        }
    }
}

/// A host-identified, possibly discontinuous span of document content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRange {
    pub id: String,
    pub name: String,
    pub elements: Vec<RangeElement>,
}

/// What a placeholder does at generation time, recorded as a name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderKind {
    Filler,
    Condition,
}

impl PlaceholderKind {
    pub fn prefix(self) -> &'static str {
        match self {
            PlaceholderKind::Filler => "[F]",
            PlaceholderKind::Condition => "[C]",
        }
    }

    /// Name under which a range of this kind is registered.
    pub fn range_name(self, name: &str) -> String {
        format!("{}{}", self.prefix(), name)
    }

    /// Kind recorded in a range name, `None` for bare names.
    pub fn from_name(name: &str) -> Option<Self> {
        [PlaceholderKind::Filler, PlaceholderKind::Condition]
            .into_iter()
            .find(|kind| name.starts_with(kind.prefix()))
    }
}

/// Strip a recognised kind prefix; bare names come back unchanged.
pub fn strip_kind_prefix(name: &str) -> &str {
    match PlaceholderKind::from_name(name) {
        Some(kind) => &name[kind.prefix().len()..],
        None => name,
    }
}

/// Cursor position inside an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub element: NodeId,
    pub offset: usize,
}

/// Replace the content of a named range with literal text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceNamedRangeContent {
    /// Range id including the [`NAMED_RANGE_ID_PREFIX`].
    pub named_range_id: String,
    pub text: String,
}

/// One directive of a batch document update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateRequest {
    ReplaceNamedRangeContent(ReplaceNamedRangeContent),
}

impl UpdateRequest {
    pub fn replace_named_range_content(range_id: &str, text: impl Into<String>) -> Self {
        UpdateRequest::ReplaceNamedRangeContent(ReplaceNamedRangeContent {
            named_range_id: format!("{}{}", NAMED_RANGE_ID_PREFIX, range_id),
            text: text.into(),
        })
    }
}
