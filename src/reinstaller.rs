//! Debounced recomputation of border, guide and vector-mask policies.
//!
//! Editor state arrives through a `watch` channel, which already keeps only
//! the newest value. The task waits until no new value has arrived for the
//! debounce window, then recomputes from whatever is current; intermediate
//! states are never installed. Coordinator invalidations (a reset, host
//! geometry or tool notifications) force a recompute of the current state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::coordinator::PolicyCoordinator;
use crate::host::HostPort;
use crate::state::{EditorState, PolicySnapshot};

pub struct Reinstaller<H: HostPort + 'static> {
    coordinator: Arc<Mutex<PolicyCoordinator<H>>>,
    debounce: Duration,
}

impl<H: HostPort + 'static> Reinstaller<H> {
    pub fn new(coordinator: Arc<Mutex<PolicyCoordinator<H>>>, debounce: Duration) -> Self {
        Self {
            coordinator,
            debounce,
        }
    }

    /// Spawns the listener on the current tokio runtime. The current value
    /// of `states` is applied once the debounce window passes.
    pub fn start(self, mut states: watch::Receiver<EditorState>) -> ReinstallerHandle {
        states.mark_changed();
        let task = tokio::spawn(run(self.coordinator, states, self.debounce));
        ReinstallerHandle { task }
    }
}

/// Keeps the listener alive. Dropping it stops the listener too.
pub struct ReinstallerHandle {
    task: JoinHandle<()>,
}

impl ReinstallerHandle {
    pub fn stop(self) {
        drop(self);
    }

    /// True once the state sender is gone and the listener has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ReinstallerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Waits for a state change or an invalidation, then for `debounce` of
/// quiet. `None` once the state sender is gone, otherwise whether an
/// invalidation arrived.
async fn settled(
    states: &mut watch::Receiver<EditorState>,
    invalidations: &mut watch::Receiver<u64>,
    debounce: Duration,
) -> Option<bool> {
    let mut invalidated = false;
    tokio::select! {
        changed = states.changed() => changed.ok()?,
        Ok(()) = invalidations.changed() => invalidated = true,
    }
    loop {
        tokio::select! {
            changed = states.changed() => changed.ok()?,
            Ok(()) = invalidations.changed() => invalidated = true,
            _ = tokio::time::sleep(debounce) => return Some(invalidated),
        }
    }
}

async fn run<H: HostPort + 'static>(
    coordinator: Arc<Mutex<PolicyCoordinator<H>>>,
    mut states: watch::Receiver<EditorState>,
    debounce: Duration,
) {
    let mut invalidations = coordinator.lock().await.invalidations();
    let mut applied: Option<PolicySnapshot> = None;
    while let Some(invalidated) = settled(&mut states, &mut invalidations, debounce).await {
        if invalidated {
            applied = None;
        }
        let state = states.borrow_and_update().clone();
        let mut coordinator = coordinator.lock().await;

        if coordinator.vector_mask_list().is_some() != state.vector_mask_mode
            && let Err(err) = coordinator
                .set_vector_mask_mode(state.vector_mask_mode)
                .await
        {
            tracing::warn!(enabled = state.vector_mask_mode, error = %err, "vector mask policies not updated");
        }

        let snapshot = state.snapshot();
        if applied.as_ref() == Some(&snapshot) {
            tracing::trace!("policy inputs unchanged");
            continue;
        }
        match coordinator.apply_state(&state).await {
            Ok(()) => applied = Some(snapshot),
            Err(err) => {
                tracing::warn!(error = %err, "border/guide policies not updated");
                applied = None;
            }
        }
    }
    tracing::debug!("reinstaller stopped");
}
