use thiserror::Error;

use crate::host::HostCall;
use crate::policy::{PolicyKind, PolicyListId};

/// Failure reported by the host process for a single RPC.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("host is unreachable")]
    Unreachable,
    #[error("host rejected the request: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum PolicyError {
    /// Removing a list id that is not installed.
    #[error("no {kind} policies found for list {id}")]
    NotFound { kind: PolicyKind, id: PolicyListId },
    #[error("{0} policies are already suspended")]
    AlreadySuspended(PolicyKind),
    #[error("{0} policies are not suspended")]
    NotSuspended(PolicyKind),
    #[error("unknown policy kind: {0:?}")]
    UnknownKind(String),
    /// A rule of one kind was handed to a list of the other kind.
    #[error("{found} policy cannot be installed in a {expected} list")]
    KindMismatch {
        expected: PolicyKind,
        found: PolicyKind,
    },
    #[error("host call {call} failed: {source}")]
    Host {
        call: HostCall,
        #[source]
        source: HostError,
    },
}

impl PolicyError {
    pub fn host(call: HostCall, source: HostError) -> Self {
        Self::Host { call, source }
    }

    /// True for misuse detected locally, before any host interaction.
    pub fn is_caller_error(&self) -> bool {
        !matches!(self, Self::Host { .. })
    }
}

pub type PolicyResult<T> = Result<T, PolicyError>;
