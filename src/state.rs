use crate::geometry::{Bounds, Region, ViewTransform};

pub type LayerId = u32;

/// Guides attached to this id belong to the document rather than a layer.
pub const DOCUMENT_GUIDE_LAYER: LayerId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Selection,
    DirectSelection,
    Pen,
    Type,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectedLayer {
    pub id: LayerId,
    /// Canvas-space bounds.
    pub bounds: Bounds,
    pub is_artboard: bool,
    /// Canvas-space bounds of the artboard's content, when known.
    pub child_bounds: Option<Bounds>,
}

impl SelectedLayer {
    pub fn layer(id: LayerId, bounds: Bounds) -> Self {
        Self {
            id,
            bounds,
            is_artboard: false,
            child_bounds: None,
        }
    }

    pub fn artboard(id: LayerId, bounds: Bounds) -> Self {
        Self {
            id,
            bounds,
            is_artboard: true,
            child_bounds: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Guide {
    pub id: u32,
    pub layer_id: LayerId,
    pub orientation: Orientation,
    /// Canvas-space coordinate of the line (y for horizontal, x for vertical).
    pub position: f64,
}

/// The slice of an open document the policy helpers read.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentView {
    pub id: u32,
    pub transform: ViewTransform,
    /// Visible canvas area in window coordinates.
    pub canvas: Region,
    pub selection: Vec<SelectedLayer>,
    /// Top-level ancestors of the selected layers.
    pub top_level_ancestors: Vec<LayerId>,
    pub guides: Vec<Guide>,
    pub guides_visible: bool,
}

impl DocumentView {
    pub fn new(id: u32, canvas: Region) -> Self {
        Self {
            id,
            transform: ViewTransform::IDENTITY,
            canvas,
            selection: Vec::new(),
            top_level_ancestors: Vec::new(),
            guides: Vec::new(),
            guides_visible: true,
        }
    }

    pub fn has_selection(&self) -> bool {
        !self.selection.is_empty()
    }
}

/// Combined document/application/tool state the reinstaller observes.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorState {
    pub document: Option<DocumentView>,
    pub tool: Tool,
    pub vector_mask_mode: bool,
}

impl Default for EditorState {
    fn default() -> Self {
        Self {
            document: None,
            tool: Tool::Selection,
            vector_mask_mode: false,
        }
    }
}

impl EditorState {
    pub fn with_document(document: DocumentView) -> Self {
        Self {
            document: Some(document),
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> PolicySnapshot {
        PolicySnapshot {
            document: self.document.as_ref().map(|doc| DocumentKey {
                id: doc.id,
                transform: doc.transform,
                canvas: doc.canvas,
                selection: doc.selection.clone(),
                ancestors: doc.top_level_ancestors.clone(),
                guides: if doc.guides_visible {
                    doc.guides.clone()
                } else {
                    Vec::new()
                },
            }),
            tool: self.tool,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct DocumentKey {
    id: u32,
    transform: ViewTransform,
    canvas: Region,
    selection: Vec<SelectedLayer>,
    ancestors: Vec<LayerId>,
    guides: Vec<Guide>,
}

/// Everything border and guide policies depend on. Two equal snapshots
/// always produce the same policies, so recomputation can be skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicySnapshot {
    document: Option<DocumentKey>,
    tool: Tool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> DocumentView {
        let mut doc = DocumentView::new(1, Region::new(0, 0, 800, 600));
        doc.selection
            .push(SelectedLayer::layer(5, Bounds::new(0.0, 0.0, 10.0, 10.0)));
        doc
    }

    #[test]
    fn unrelated_changes_keep_snapshot_equal() {
        let a = EditorState::with_document(doc());
        let mut b = a.clone();
        b.vector_mask_mode = true;
        assert_eq!(a.snapshot(), b.snapshot());
    }

    #[test]
    fn hidden_guides_do_not_matter() {
        let mut a = doc();
        a.guides_visible = false;
        let mut b = a.clone();
        b.guides.push(Guide {
            id: 1,
            layer_id: 0,
            orientation: Orientation::Vertical,
            position: 4.0,
        });
        assert_eq!(
            EditorState::with_document(a).snapshot(),
            EditorState::with_document(b).snapshot()
        );
    }

    #[test]
    fn zoom_and_tool_change_snapshot() {
        let a = EditorState::with_document(doc());
        let mut zoomed = a.clone();
        if let Some(doc) = zoomed.document.as_mut() {
            doc.transform.zoom = 2.0;
        }
        assert_ne!(a.snapshot(), zoomed.snapshot());
        let mut pen = a.clone();
        pen.tool = Tool::Pen;
        assert_ne!(a.snapshot(), pen.snapshot());
    }
}
