//! Grab strips that let guides be dragged through the host.

use std::collections::BTreeSet;

use crossterm::event::KeyModifiers;

use crate::geometry::{Region, ViewTransform};
use crate::policy::{EventKind, PointerPolicy, PolicyAction};
use crate::state::{DOCUMENT_GUIDE_LAYER, DocumentView, Guide, Orientation, Tool};

/// Guides that currently accept drags: document guides always, layer guides
/// only while their layer is a top-level ancestor of the selection.
pub fn active_guides<'a>(doc: &'a DocumentView, tool: Tool) -> Vec<&'a Guide> {
    if !doc.guides_visible || doc.guides.is_empty() || tool != Tool::Selection {
        return Vec::new();
    }
    let ancestors: BTreeSet<_> = doc.top_level_ancestors.iter().copied().collect();
    doc.guides
        .iter()
        .filter(|guide| {
            guide.layer_id == DOCUMENT_GUIDE_LAYER || ancestors.contains(&guide.layer_id)
        })
        .collect()
}

/// Strip straddling the guide line, clipped to the visible canvas.
pub fn guide_region(
    guide: &Guide,
    transform: &ViewTransform,
    canvas: &Region,
    half_thickness: i32,
) -> Option<Region> {
    let thickness = (half_thickness * 2) as u32;
    let strip = match guide.orientation {
        Orientation::Horizontal => {
            let y = transform.y_to_window(guide.position).round() as i32;
            Region::new(canvas.x, y - half_thickness, canvas.width, thickness)
        }
        Orientation::Vertical => {
            let x = transform.x_to_window(guide.position).round() as i32;
            Region::new(x - half_thickness, canvas.y, thickness, canvas.height)
        }
    };
    canvas.intersect(&strip)
}

pub fn guide_policies(doc: Option<&DocumentView>, tool: Tool, half_thickness: i32) -> Vec<PointerPolicy> {
    let Some(doc) = doc else {
        return Vec::new();
    };
    active_guides(doc, tool)
        .into_iter()
        .filter_map(|guide| guide_region(guide, &doc.transform, &doc.canvas, half_thickness))
        .map(|region| {
            PointerPolicy::new(
                PolicyAction::PropagateToHost,
                EventKind::LeftMouseDown,
                KeyModifiers::NONE,
                Some(region),
            )
        })
        .collect()
}
