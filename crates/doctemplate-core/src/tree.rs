use crate::error::TemplateError;
use crate::model::{ElementType, NamedRange, NodeId, Position, RangeElement, Span};

/// Mutable view of one open document.
///
/// Mirrors what an editing host offers an add-on: the user's selection,
/// named range CRUD, text background coloring and structural removal.
/// Calls are synchronous and non-transactional; callers that remove several
/// nodes in one pass must do so in reverse document order.
pub trait DocumentTree {
    /// Host-assigned document id.
    fn id(&self) -> &str;

    /// Display name of the document.
    fn name(&self) -> &str;

    /// Root of the body section.
    fn body(&self) -> NodeId;

    /// Elements covered by the user's current selection, `None` when nothing is selected.
    fn selection(&self) -> Option<Vec<RangeElement>>;

    /// All named ranges, in the host's native enumeration order.
    fn named_ranges(&self) -> Vec<NamedRange>;

    /// Look up one named range by id.
    fn named_range(&self, id: &str) -> Option<NamedRange> {
        self.named_ranges().into_iter().find(|r| r.id == id)
    }

    /// Register a new named range and return it with its host-assigned id.
    fn add_named_range(
        &mut self,
        name: &str,
        elements: Vec<RangeElement>,
    ) -> Result<NamedRange, TemplateError>;

    /// Delete a named range registration. Returns false if the id was unknown.
    fn remove_named_range(&mut self, id: &str) -> bool;

    fn element_type(&self, node: NodeId) -> Result<ElementType, TemplateError>;

    /// Parent of a node, `None` for the body and for detached nodes.
    fn parent(&self, node: NodeId) -> Result<Option<NodeId>, TemplateError>;

    fn children(&self, node: NodeId) -> Result<Vec<NodeId>, TemplateError>;

    /// Text of an element, `None` when the element cannot be edited as text.
    fn text(&self, node: NodeId) -> Result<Option<String>, TemplateError>;

    /// Set (or with `None`, clear) the background color of a span of an
    /// element, or of the whole element when `span` is `None`.
    fn set_background_color(
        &mut self,
        node: NodeId,
        span: Option<Span>,
        color: Option<&str>,
    ) -> Result<(), TemplateError>;

    /// Detach a node (and its subtree) from its parent.
    fn remove_from_parent(&mut self, node: NodeId) -> Result<(), TemplateError>;

    /// List id of a list item, `None` for other elements.
    fn list_id(&self, node: NodeId) -> Result<Option<String>, TemplateError>;

    /// Whether the element or one of its descendants is an inline image.
    fn contains_inline_image(&self, node: NodeId) -> Result<bool, TemplateError>;

    fn set_cursor(&mut self, position: Position) -> Result<(), TemplateError>;
}
