//! Pure functions turning editor state into pointer policies. None of them
//! touch the store; the coordinator swaps their output in.

pub mod border;
pub mod guides;
pub mod vector_mask;

pub use border::{BorderRects, border_policies, selection_rects};
pub use guides::{active_guides, guide_policies, guide_region};
pub use vector_mask::vector_mask_policies;
