//! Shared crate-wide constants.

use std::time::Duration;

/// Distance (in window pixels) the inner "click through to the overlay"
/// rectangle is shrunk from the selection bounds.
///
/// The same distance is used to grow the middle band that carries the
/// resize/distort handle rules, so the transform handles drawn by the host
/// straddle the selection edge with this much slack on either side.
pub const BORDER_INSET: i32 = 4;

/// Distance (in window pixels) the outer rotation rectangle is grown from the
/// selection bounds.
///
/// Artboards have no rotate handles, so for them the outer rectangle collapses
/// to `BORDER_INSET` instead.
pub const BORDER_OUTSET: i32 = 27;

/// Half of the grab strip installed around each guide line.
///
/// Units: window pixels on each side of the line.
pub const GUIDE_HALF_THICKNESS: i32 = 2;

/// How long the reinstaller waits for state to settle before recomputing
/// border and guide policies.
pub const REINSTALL_DEBOUNCE: Duration = Duration::from_millis(150);

/// Upper bound accepted for a configured debounce window.
pub const MAX_REINSTALL_DEBOUNCE: Duration = Duration::from_secs(5);

/// Capacity of the policy notification channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;
