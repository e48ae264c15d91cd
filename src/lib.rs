//! Input-routing policy arbiter.
//!
//! Decides, for every pointer and keyboard event, whether the native host
//! canvas or the web overlay sees it first, by keeping ordered propagation
//! policy lists installed in the host and swapping them as selection, tool,
//! zoom and focus change.

pub mod config;
pub mod constants;
pub mod coordinator;
pub mod error;
pub mod geometry;
pub mod host;
pub mod policy;
pub mod regions;
pub mod reinstaller;
pub mod state;
pub mod sync;
pub mod tracing_sub;

pub use config::{ArbiterConfig, Platform};
pub use coordinator::{BorderOutcome, Commit, PolicyCoordinator, PolicyTransaction};
pub use error::{HostError, PolicyError, PolicyResult};
pub use host::{HostEvent, HostPort, RecordingHost};
pub use policy::{
    EventKind, InputEvent, KeyboardPolicy, MasterPolicyList, PointerEvent, PointerPolicy, Policy,
    PolicyAction, PolicyKind, PolicyListId, PolicyStore, PropagationMode, Route,
};
pub use reinstaller::{Reinstaller, ReinstallerHandle};
pub use sync::PolicyEvent;
