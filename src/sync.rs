//! Pushes the store's master lists to the host, only when they changed.
//!
//! The dirty flag is the only thing standing between a burst of store
//! mutations and a burst of host RPCs: it is cleared after a successful
//! push and nowhere else, so a failed push is retried by the next sync.

use tokio::sync::broadcast;

use crate::error::{HostError, PolicyError, PolicyResult};
use crate::host::{HostCall, HostPort};
use crate::policy::{MasterPolicyList, PolicyKind, PolicyStore, PropagationMode};

/// Notifications for collaborators that mirror policy state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyEvent {
    PoliciesInstalled { kind: PolicyKind, count: usize },
    ModeChanged { kind: PolicyKind, mode: PropagationMode },
}

async fn push<H: HostPort + ?Sized>(host: &H, master: &MasterPolicyList) -> Result<(), HostError> {
    match master.kind() {
        PolicyKind::Keyboard => host.set_keyboard_policy(master.keyboard()).await,
        PolicyKind::Pointer => host.set_pointer_policy(master.pointer()).await,
    }
}

async fn push_if_dirty<H: HostPort + ?Sized>(
    host: &H,
    master: Option<&MasterPolicyList>,
) -> Option<Result<(), HostError>> {
    match master {
        Some(master) => Some(push(host, master).await),
        None => None,
    }
}

fn installed(
    store: &mut PolicyStore,
    events: &broadcast::Sender<PolicyEvent>,
    master: &MasterPolicyList,
) {
    let kind = master.kind();
    store.mark_clean(kind);
    tracing::debug!(%kind, count = master.len(), "policies installed");
    // no subscribers is fine
    let _ = events.send(PolicyEvent::PoliciesInstalled {
        kind,
        count: master.len(),
    });
}

/// Sends the master list for `kind` if it is dirty.
///
/// Returns whether a host call was made.
pub async fn sync_policies<H: HostPort + ?Sized>(
    store: &mut PolicyStore,
    host: &H,
    events: &broadcast::Sender<PolicyEvent>,
    kind: PolicyKind,
) -> PolicyResult<bool> {
    if !store.is_dirty(kind) {
        return Ok(false);
    }
    let master = store.master_policy_list(kind);
    match push(host, &master).await {
        Ok(()) => {
            installed(store, events, &master);
            Ok(true)
        }
        Err(err) => {
            tracing::warn!(%kind, error = %err, "policy sync failed");
            Err(PolicyError::host(HostCall::set_policy(kind), err))
        }
    }
}

/// Syncs keyboard and pointer concurrently.
///
/// Both pushes run to completion even if one fails; a failure leaves only
/// its own kind dirty. The keyboard error is reported when both fail.
pub async fn sync_all_policies<H: HostPort + ?Sized>(
    store: &mut PolicyStore,
    host: &H,
    events: &broadcast::Sender<PolicyEvent>,
) -> PolicyResult<()> {
    let keyboard = store
        .is_dirty(PolicyKind::Keyboard)
        .then(|| store.master_policy_list(PolicyKind::Keyboard));
    let pointer = store
        .is_dirty(PolicyKind::Pointer)
        .then(|| store.master_policy_list(PolicyKind::Pointer));

    let (keyboard_result, pointer_result) = futures::join!(
        push_if_dirty(host, keyboard.as_ref()),
        push_if_dirty(host, pointer.as_ref())
    );

    let mut first_error = None;
    for (master, result) in [(keyboard, keyboard_result), (pointer, pointer_result)] {
        let (Some(master), Some(result)) = (master, result) else {
            continue;
        };
        let kind = master.kind();
        match result {
            Ok(()) => installed(store, events, &master),
            Err(err) => {
                tracing::warn!(%kind, error = %err, "policy sync failed");
                if first_error.is_none() {
                    first_error = Some(PolicyError::host(HostCall::set_policy(kind), err));
                }
            }
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
