//! Boundary to the out-of-process host application.
//!
//! The host is treated as an ordered, reliable asynchronous peer. It takes
//! whole policy lists (replace, never patch) and a default propagation mode
//! per kind, and emits tool/geometry notifications that drive recomputation.

pub mod descriptor;
mod recording;

pub use recording::{HostRequest, RecordingHost};

use std::fmt;

use async_trait::async_trait;

use crate::error::HostError;
use crate::policy::{KeyboardPolicy, PointerPolicy, PolicyKind, PropagationMode};

/// Names of the host calls, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostCall {
    SetKeyboardPolicy,
    SetPointerPolicy,
    SetKeyboardMode,
    SetPointerMode,
    GetKeyboardMode,
}

impl HostCall {
    pub fn set_policy(kind: PolicyKind) -> Self {
        match kind {
            PolicyKind::Keyboard => HostCall::SetKeyboardPolicy,
            PolicyKind::Pointer => HostCall::SetPointerPolicy,
        }
    }

    pub fn set_mode(kind: PolicyKind) -> Self {
        match kind {
            PolicyKind::Keyboard => HostCall::SetKeyboardMode,
            PolicyKind::Pointer => HostCall::SetPointerMode,
        }
    }
}

impl fmt::Display for HostCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HostCall::SetKeyboardPolicy => "setKeyboardEventPropagationPolicy",
            HostCall::SetPointerPolicy => "setPointerEventPropagationPolicy",
            HostCall::SetKeyboardMode => "setKeyboardPropagationMode",
            HostCall::SetPointerMode => "setPointerPropagationMode",
            HostCall::GetKeyboardMode => "getKeyboardPropagationMode",
        };
        write!(f, "{}", s)
    }
}

#[async_trait]
pub trait HostPort: Send + Sync {
    async fn set_keyboard_policy(&self, policies: Vec<KeyboardPolicy>) -> Result<(), HostError>;
    async fn set_pointer_policy(&self, policies: Vec<PointerPolicy>) -> Result<(), HostError>;
    async fn set_keyboard_mode(&self, mode: PropagationMode) -> Result<(), HostError>;
    async fn set_pointer_mode(&self, mode: PropagationMode) -> Result<(), HostError>;
    async fn keyboard_mode(&self) -> Result<PropagationMode, HostError>;

    async fn set_mode(&self, kind: PolicyKind, mode: PropagationMode) -> Result<(), HostError> {
        match kind {
            PolicyKind::Keyboard => self.set_keyboard_mode(mode).await,
            PolicyKind::Pointer => self.set_pointer_mode(mode).await,
        }
    }
}

#[async_trait]
impl<T: HostPort + ?Sized> HostPort for std::sync::Arc<T> {
    async fn set_keyboard_policy(&self, policies: Vec<KeyboardPolicy>) -> Result<(), HostError> {
        (**self).set_keyboard_policy(policies).await
    }

    async fn set_pointer_policy(&self, policies: Vec<PointerPolicy>) -> Result<(), HostError> {
        (**self).set_pointer_policy(policies).await
    }

    async fn set_keyboard_mode(&self, mode: PropagationMode) -> Result<(), HostError> {
        (**self).set_keyboard_mode(mode).await
    }

    async fn set_pointer_mode(&self, mode: PropagationMode) -> Result<(), HostError> {
        (**self).set_pointer_mode(mode).await
    }

    async fn keyboard_mode(&self) -> Result<PropagationMode, HostError> {
        (**self).keyboard_mode().await
    }
}

/// Modal tool states during which the host needs raw input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalState {
    TextEntry,
    PathEditing,
}

/// Notifications the host emits. This crate consumes them; it does not own them.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    ToolModalStateChanged {
        state: ModalState,
        active: bool,
    },
    /// Canvas scrolled, zoomed or the window resized.
    GeometryChanged,
    ToolChanged,
}
