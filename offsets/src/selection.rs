//! Selection translation.
//!
//! The content viewer renders a document as a tree of nodes and reports
//! selections as boundary points inside that tree. [`translate_selection`]
//! walks the tree in document order, keeping a running character count, and
//! converts both boundary points into absolute offsets in the source text.
//!
//! Decoration elements (gutters, badges, highlight markers) are rendered but
//! carry no document text, so they contribute nothing to the count.

use serde::{Deserialize, Serialize};

use crate::range::{CharRange, slice_chars};

/// Identifier of a node in the rendered tree.
pub type NodeId = u64;

/// How an element contributes to the semantic text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// Block-level container (paragraph, list item).
    Block,

    /// Inline wrapper (emphasis, highlight span).
    Inline,

    /// Visual-only markup whose text is not part of the document.
    Decoration,
}

/// A node in the rendered view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderNode {
    /// A run of rendered text.
    Text { id: NodeId, text: String },

    /// A container of other nodes.
    Element {
        id: NodeId,
        kind: ElementKind,
        children: Vec<RenderNode>,
    },
}

impl RenderNode {
    /// Create a text node.
    pub fn text(id: NodeId, text: impl Into<String>) -> Self {
        Self::Text {
            id,
            text: text.into(),
        }
    }

    /// Create an element node.
    pub fn element(id: NodeId, kind: ElementKind, children: Vec<RenderNode>) -> Self {
        Self::Element { id, kind, children }
    }

    /// The node's identifier.
    pub fn id(&self) -> NodeId {
        match self {
            Self::Text { id, .. } | Self::Element { id, .. } => *id,
        }
    }

    /// Number of document characters rendered by this subtree.
    pub fn semantic_len(&self) -> usize {
        semantic_len(self, false)
    }

    /// The document text rendered by this subtree, decorations excluded.
    pub fn semantic_text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

fn semantic_len(node: &RenderNode, muted: bool) -> usize {
    match node {
        RenderNode::Text { text, .. } => {
            if muted {
                0
            } else {
                text.chars().count()
            }
        }
        RenderNode::Element { kind, children, .. } => {
            let muted = muted || *kind == ElementKind::Decoration;
            children.iter().map(|child| semantic_len(child, muted)).sum()
        }
    }
}

fn collect_text(node: &RenderNode, out: &mut String) {
    match node {
        RenderNode::Text { text, .. } => out.push_str(text),
        RenderNode::Element { kind, children, .. } => {
            if *kind != ElementKind::Decoration {
                for child in children {
                    collect_text(child, out);
                }
            }
        }
    }
}

/// A position inside the rendered tree.
///
/// For text nodes `offset` counts characters into the text; for elements it is
/// a child index, so `offset == children.len()` points past the last child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryPoint {
    pub node: NodeId,
    pub offset: usize,
}

impl BoundaryPoint {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// A selection as reported by the viewer. The anchor may come after the focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub anchor: BoundaryPoint,
    pub focus: BoundaryPoint,
}

impl Selection {
    pub fn new(anchor: BoundaryPoint, focus: BoundaryPoint) -> Self {
        Self { anchor, focus }
    }

    /// Whether anchor and focus are the same point.
    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

/// A selection resolved to document offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSelection {
    /// Start offset (inclusive).
    pub start: usize,

    /// End offset (exclusive).
    pub end: usize,

    /// The selected document text.
    pub text: String,
}

impl TextSelection {
    /// The selection as a character range.
    pub fn range(&self) -> CharRange {
        CharRange {
            start: self.start,
            end: self.end,
        }
    }
}

/// Translate a viewer selection into offsets of `document_text`.
///
/// Returns `None` when there is no selection, when it is collapsed, when
/// either boundary lies outside `root`, or when the resolved range does not
/// fit the document.
pub fn translate_selection(
    root: &RenderNode,
    selection: Option<&Selection>,
    document_text: &str,
) -> Option<TextSelection> {
    let selection = selection?;
    if selection.is_collapsed() {
        return None;
    }

    let anchor = resolve(root, selection.anchor)?;
    let focus = resolve(root, selection.focus)?;
    let (start, end) = (anchor.min(focus), anchor.max(focus));
    if start == end {
        return None;
    }

    let range = CharRange { start, end };
    let text = slice_chars(document_text, range)?;
    Some(TextSelection {
        start,
        end,
        text: text.to_string(),
    })
}

/// Absolute character offset of a boundary point, or `None` if the point's
/// node is not in the tree.
fn resolve(root: &RenderNode, point: BoundaryPoint) -> Option<usize> {
    let mut walker = Walker {
        target: point,
        consumed: 0,
    };
    walker.visit(root, false)
}

struct Walker {
    target: BoundaryPoint,
    consumed: usize,
}

impl Walker {
    fn visit(&mut self, node: &RenderNode, muted: bool) -> Option<usize> {
        match node {
            RenderNode::Text { id, text } => {
                let len = if muted { 0 } else { text.chars().count() };
                if *id == self.target.node {
                    return Some(self.consumed + self.target.offset.min(len));
                }
                self.consumed += len;
                None
            }
            RenderNode::Element { id, kind, children } => {
                let muted = muted || *kind == ElementKind::Decoration;
                if *id == self.target.node {
                    let index = self.target.offset.min(children.len());
                    self.consumed += children[..index]
                        .iter()
                        .map(|child| semantic_len(child, muted))
                        .sum::<usize>();
                    return Some(self.consumed);
                }
                children.iter().find_map(|child| self.visit(child, muted))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOC: &str = "First paragraph.Second one here.";

    /// <div 1>
    ///   <p 2>"First " <em 3>"paragraph"</em> "."</p>
    ///   <p 6><span 7 decoration>"¶ 2"</span>"Second one here."</p>
    /// </div>
    fn view() -> RenderNode {
        RenderNode::element(
            1,
            ElementKind::Block,
            vec![
                RenderNode::element(
                    2,
                    ElementKind::Block,
                    vec![
                        RenderNode::text(10, "First "),
                        RenderNode::element(3, ElementKind::Inline, vec![RenderNode::text(11, "paragraph")]),
                        RenderNode::text(12, "."),
                    ],
                ),
                RenderNode::element(
                    6,
                    ElementKind::Block,
                    vec![
                        RenderNode::element(7, ElementKind::Decoration, vec![RenderNode::text(13, "¶ 2")]),
                        RenderNode::text(14, "Second one here."),
                    ],
                ),
            ],
        )
    }

    fn select(anchor: (NodeId, usize), focus: (NodeId, usize)) -> Selection {
        Selection::new(
            BoundaryPoint::new(anchor.0, anchor.1),
            BoundaryPoint::new(focus.0, focus.1),
        )
    }

    #[test]
    fn test_rendered_text_mirrors_document() {
        assert_eq!(view().semantic_text(), DOC);
        assert_eq!(view().semantic_len(), DOC.chars().count());
    }

    #[test]
    fn test_single_node_selection() {
        let selection = select((11, 0), (11, 9));
        let result = translate_selection(&view(), Some(&selection), DOC).unwrap();

        assert_eq!(result.start, 6);
        assert_eq!(result.end, 15);
        assert_eq!(result.text, "paragraph");
    }

    #[test]
    fn test_multi_node_selection_skips_decoration() {
        let selection = select((10, 0), (14, 6));
        let result = translate_selection(&view(), Some(&selection), DOC).unwrap();

        assert_eq!(result.start, 0);
        assert_eq!(result.end, 22);
        assert_eq!(result.text, "First paragraph.Second");
    }

    #[test]
    fn test_reversed_selection_is_normalized() {
        let forward = select((10, 2), (14, 3));
        let backward = select((14, 3), (10, 2));

        let a = translate_selection(&view(), Some(&forward), DOC).unwrap();
        let b = translate_selection(&view(), Some(&backward), DOC).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.text, &DOC[2..19]);
    }

    #[test]
    fn test_boundary_inside_decoration_snaps_to_its_position() {
        let selection = select((13, 2), (14, 6));
        let result = translate_selection(&view(), Some(&selection), DOC).unwrap();

        assert_eq!(result.start, 16);
        assert_eq!(result.text, "Second");
    }

    #[test]
    fn test_element_boundary_uses_child_index() {
        // Whole second paragraph, addressed via child indices of node 6.
        let selection = select((6, 0), (6, 2));
        let result = translate_selection(&view(), Some(&selection), DOC).unwrap();

        assert_eq!(result.text, "Second one here.");
    }

    #[test]
    fn test_empty_and_foreign_selections() {
        assert_eq!(translate_selection(&view(), None, DOC), None);

        let collapsed = select((11, 4), (11, 4));
        assert_eq!(translate_selection(&view(), Some(&collapsed), DOC), None);

        let foreign = select((11, 0), (999, 1));
        assert_eq!(translate_selection(&view(), Some(&foreign), DOC), None);

        // Distinct points that resolve to the same offset.
        let touching = select((10, 6), (11, 0));
        assert_eq!(translate_selection(&view(), Some(&touching), DOC), None);
    }

    #[test]
    fn test_selection_past_document_end() {
        let selection = select((10, 0), (14, 16));
        assert_eq!(translate_selection(&view(), Some(&selection), "First"), None);
    }

    #[test]
    fn test_translation_is_idempotent() {
        let selection = select((11, 3), (14, 2));
        let root = view();
        let first = translate_selection(&root, Some(&selection), DOC);
        let second = translate_selection(&root, Some(&selection), DOC);
        assert_eq!(first, second);
    }
}
