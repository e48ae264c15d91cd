//! Capture-everywhere rules used while a vector mask is being edited.

use crossterm::event::KeyModifiers;

use crate::config::Platform;
use crate::policy::{EventKind, PointerPolicy, PolicyAction};

/// Path editing intercepts clicks anywhere on the canvas, so none of these
/// rules carry a region.
pub fn vector_mask_policies(platform: Platform) -> Vec<PointerPolicy> {
    let mut policies = vec![PointerPolicy::new(
        PolicyAction::PropagateToHost,
        EventKind::RightMouseDown,
        KeyModifiers::CONTROL,
        None,
    )];
    if platform == Platform::Mac {
        // control-click is the context-menu click there
        policies.push(PointerPolicy::new(
            PolicyAction::PropagateToHost,
            EventKind::LeftMouseDown,
            KeyModifiers::CONTROL,
            None,
        ));
    }
    policies.push(PointerPolicy::new(
        PolicyAction::PropagateByAlpha,
        EventKind::LeftMouseDown,
        KeyModifiers::NONE,
        None,
    ));
    policies
}
