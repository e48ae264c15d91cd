//! Nested rectangles around the selection that let transform handles reach
//! the host while clicks inside the selection stay with the overlay.

use crossterm::event::KeyModifiers;

use crate::config::{ArbiterConfig, Platform};
use crate::geometry::{Bounds, Region};
use crate::policy::{EventKind, PointerPolicy, PolicyAction};
use crate::state::{DocumentView, Tool};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorderRects {
    /// Clicks here go to the overlay.
    pub inner: Region,
    /// Resize/distort handle band.
    pub middle: Region,
    /// Rotation band.
    pub outer: Region,
}

impl BorderRects {
    /// `bounds` are window coordinates. Artboards get no rotation band, so
    /// their outer rectangle equals the middle one.
    pub fn around(bounds: &Bounds, inset: i32, outset: i32, artboard: bool) -> Self {
        let outset = if artboard { inset } else { outset };
        Self {
            inner: bounds.inset(inset),
            middle: bounds.outset(inset),
            outer: bounds.outset(outset),
        }
    }

    pub fn policies(&self, platform: Platform) -> Vec<PointerPolicy> {
        let distort = platform.distort_modifier();
        let rule = |action, modifiers, region: Region| {
            (!region.is_empty()).then(|| {
                PointerPolicy::new(action, EventKind::LeftMouseDown, modifiers, Some(region))
            })
        };
        [
            rule(PolicyAction::PropagateToOverlay, KeyModifiers::NONE, self.inner),
            rule(PolicyAction::PropagateToOverlay, KeyModifiers::SHIFT, self.inner),
            // proportional resize
            rule(PolicyAction::PropagateByAlpha, KeyModifiers::SHIFT, self.middle),
            rule(PolicyAction::PropagateByAlpha, distort, self.middle),
            rule(
                PolicyAction::PropagateByAlpha,
                distort | KeyModifiers::SHIFT,
                self.middle,
            ),
            // free and shift-constrained rotation
            rule(PolicyAction::PropagateByAlpha, KeyModifiers::NONE, self.outer),
            rule(PolicyAction::PropagateByAlpha, KeyModifiers::SHIFT, self.outer),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Window-space rectangles the host draws handles around.
///
/// A selection containing artboards is measured per artboard; the host draws
/// no combined box for a mixed selection. Otherwise the union of all
/// selected layers is used.
pub fn selection_rects(doc: &DocumentView, config: &ArbiterConfig) -> Vec<BorderRects> {
    let (inset, outset) = (config.border_inset, config.border_outset);
    if doc.selection.iter().any(|layer| layer.is_artboard) {
        return doc
            .selection
            .iter()
            .filter(|layer| layer.is_artboard)
            .map(|board| board.child_bounds.unwrap_or(board.bounds))
            .filter(|bounds| !bounds.is_empty())
            .map(|bounds| BorderRects::around(&doc.transform.to_window(&bounds), inset, outset, true))
            .collect();
    }
    Bounds::union_all(doc.selection.iter().map(|layer| &layer.bounds))
        .map(|bounds| BorderRects::around(&doc.transform.to_window(&bounds), inset, outset, false))
        .into_iter()
        .collect()
}

/// Border policies for the current state, or `None` when there is nothing
/// to draw handles around and any installed border list should go.
pub fn border_policies(
    doc: Option<&DocumentView>,
    tool: Tool,
    config: &ArbiterConfig,
) -> Option<Vec<PointerPolicy>> {
    let doc = doc.filter(|doc| doc.has_selection())?;
    if tool != Tool::Selection {
        return None;
    }
    let policies: Vec<PointerPolicy> = selection_rects(doc, config)
        .iter()
        .flat_map(|rects| rects.policies(config.platform))
        .collect();
    (!policies.is_empty()).then_some(policies)
}
