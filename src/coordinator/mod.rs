//! The action layer: the only code allowed to mutate the policy store.
//!
//! Every operation runs its store mutation before its first await, and the
//! coordinator is driven through `&mut self`, so two operations can never
//! interleave. Callers that share it across tasks wrap it in a
//! `tokio::sync::Mutex` and hold the guard for the whole operation.

mod transaction;

pub use transaction::PolicyTransaction;

use crossterm::event::KeyCode;
use tokio::sync::{broadcast, watch};

use crate::config::ArbiterConfig;
use crate::constants::EVENT_CHANNEL_CAPACITY;
use crate::error::{PolicyError, PolicyResult};
use crate::host::{HostCall, HostEvent, HostPort};
use crate::policy::{
    InputEvent, KeyboardPolicy, MasterPolicyList, ModifierMask, PointerPolicy, Policy,
    PolicyAction, PolicyKind, PolicyListId, PolicyStore, PropagationMode, Route,
};
use crate::regions::{border_policies, guide_policies, vector_mask_policies};
use crate::state::EditorState;
use crate::sync::{self, PolicyEvent};

/// Whether a mutation is pushed to the host right away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    Immediate,
    /// Leave the store dirty; a later sync or transaction commit pushes it.
    Deferred,
}

/// What `reset_border_policies` ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderOutcome {
    Installed(PolicyListId),
    /// Nothing to draw handles around. Any border list was removed and guide
    /// policies were already recomputed.
    TornDown,
}

pub struct PolicyCoordinator<H: HostPort> {
    host: H,
    store: PolicyStore,
    events: broadcast::Sender<PolicyEvent>,
    config: ArbiterConfig,
    border_list: Option<PolicyListId>,
    guide_list: Option<PolicyListId>,
    vector_mask_list: Option<PolicyListId>,
    // bumped whenever derived policies must be recomputed from scratch
    invalidated: watch::Sender<u64>,
}

impl<H: HostPort> PolicyCoordinator<H> {
    pub fn new(host: H, config: ArbiterConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (invalidated, _) = watch::channel(0);
        Self {
            host,
            store: PolicyStore::new(),
            events,
            config,
            border_list: None,
            guide_list: None,
            vector_mask_list: None,
            invalidated,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn store(&self) -> &PolicyStore {
        &self.store
    }

    pub fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PolicyEvent> {
        self.events.subscribe()
    }

    /// Ticks each time border, guide and vector-mask policies must be
    /// recomputed even though the editor state did not change.
    pub fn invalidations(&self) -> watch::Receiver<u64> {
        self.invalidated.subscribe()
    }

    pub fn invalidate(&mut self) {
        self.invalidated.send_modify(|generation| *generation += 1);
    }

    pub fn border_list(&self) -> Option<PolicyListId> {
        self.border_list
    }

    pub fn guide_list(&self) -> Option<PolicyListId> {
        self.guide_list
    }

    pub fn vector_mask_list(&self) -> Option<PolicyListId> {
        self.vector_mask_list
    }

    pub fn master_policy_list(&self, kind: PolicyKind) -> MasterPolicyList {
        self.store.master_policy_list(kind)
    }

    /// Where the host will send `event` given the last synced state.
    pub fn route(&self, event: &InputEvent) -> Route {
        let kind = event.kind();
        self.store
            .master_policy_list(kind)
            .route(event, self.store.mode(kind))
    }

    /// Clears every list, suspension and cached id. The next sync pushes
    /// empty lists to the host.
    pub fn reset(&mut self) {
        self.store.reset();
        self.border_list = None;
        self.guide_list = None;
        self.vector_mask_list = None;
        self.invalidate();
        tracing::debug!("policy state reset");
    }

    pub async fn sync_policies(&mut self, kind: PolicyKind) -> PolicyResult<bool> {
        sync::sync_policies(&mut self.store, &self.host, &self.events, kind).await
    }

    pub async fn sync_all_policies(&mut self) -> PolicyResult<()> {
        sync::sync_all_policies(&mut self.store, &self.host, &self.events).await
    }

    /// Starts a staged remove/add batch that reaches the host in one commit.
    pub fn transaction(&mut self) -> PolicyTransaction<'_, H> {
        PolicyTransaction::new(self)
    }

    /// Installs a list. If the immediate sync fails the list is taken back
    /// out of the store before the error is returned.
    pub async fn add_policies(
        &mut self,
        kind: PolicyKind,
        policies: Vec<Policy>,
        commit: Commit,
    ) -> PolicyResult<PolicyListId> {
        let id = self.store.add_policy_list(kind, policies)?;
        if commit == Commit::Deferred {
            return Ok(id);
        }
        if let Err(err) = self.sync_policies(kind).await {
            if !self.store.remove_policy_list(kind, id) {
                tracing::debug!(%kind, %id, "rollback found nothing to remove");
            }
            return Err(err);
        }
        Ok(id)
    }

    pub async fn add_keyboard_policies(
        &mut self,
        policies: Vec<KeyboardPolicy>,
        commit: Commit,
    ) -> PolicyResult<PolicyListId> {
        let policies = policies.into_iter().map(Policy::from).collect();
        self.add_policies(PolicyKind::Keyboard, policies, commit).await
    }

    pub async fn add_pointer_policies(
        &mut self,
        policies: Vec<PointerPolicy>,
        commit: Commit,
    ) -> PolicyResult<PolicyListId> {
        let policies = policies.into_iter().map(Policy::from).collect();
        self.add_policies(PolicyKind::Pointer, policies, commit).await
    }

    /// Single key rule: `propagate` sends the key to the host, otherwise the
    /// overlay keeps it.
    pub async fn add_keydown_policy(
        &mut self,
        propagate: bool,
        key: KeyCode,
        modifiers: ModifierMask,
    ) -> PolicyResult<PolicyListId> {
        let action = if propagate {
            PolicyAction::PropagateToHost
        } else {
            PolicyAction::PropagateToOverlay
        };
        self.add_keyboard_policies(
            vec![KeyboardPolicy::new(action, modifiers, key)],
            Commit::Immediate,
        )
        .await
    }

    /// Removes a list. A failed sync is reported but the list stays removed.
    pub async fn remove_policies(
        &mut self,
        kind: PolicyKind,
        id: PolicyListId,
        commit: Commit,
    ) -> PolicyResult<()> {
        self.remove_local(kind, id)?;
        if commit == Commit::Immediate {
            self.sync_policies(kind).await?;
        }
        Ok(())
    }

    pub async fn remove_keyboard_policies(
        &mut self,
        id: PolicyListId,
        commit: Commit,
    ) -> PolicyResult<()> {
        self.remove_policies(PolicyKind::Keyboard, id, commit).await
    }

    pub async fn remove_pointer_policies(
        &mut self,
        id: PolicyListId,
        commit: Commit,
    ) -> PolicyResult<()> {
        self.remove_policies(PolicyKind::Pointer, id, commit).await
    }

    fn remove_local(&mut self, kind: PolicyKind, id: PolicyListId) -> PolicyResult<()> {
        if self.store.remove_policy_list(kind, id) {
            Ok(())
        } else {
            Err(PolicyError::NotFound { kind, id })
        }
    }

    async fn push_mode(&mut self, kind: PolicyKind, mode: PropagationMode) -> PolicyResult<()> {
        self.host
            .set_mode(kind, mode)
            .await
            .map_err(|err| PolicyError::host(HostCall::set_mode(kind), err))?;
        tracing::debug!(%kind, %mode, "propagation mode set");
        let _ = self.events.send(PolicyEvent::ModeChanged { kind, mode });
        Ok(())
    }

    /// Sets the fallback mode for `kind`; `None` picks the kind's default.
    pub async fn set_mode(
        &mut self,
        kind: PolicyKind,
        mode: Option<PropagationMode>,
    ) -> PolicyResult<()> {
        let mode = mode.unwrap_or_else(|| PropagationMode::default_for(kind));
        self.push_mode(kind, mode).await?;
        self.store.set_mode(kind, mode);
        Ok(())
    }

    /// `set_mode` for a kind named at runtime.
    pub async fn set_mode_named(
        &mut self,
        kind: &str,
        mode: Option<PropagationMode>,
    ) -> PolicyResult<()> {
        let kind = kind.parse::<PolicyKind>()?;
        self.set_mode(kind, mode).await
    }

    async fn suspend_kinds(&mut self, kinds: &[PolicyKind]) -> PolicyResult<()> {
        if let Some(&kind) = kinds.iter().find(|kind| self.store.is_suspended(**kind)) {
            return Err(PolicyError::AlreadySuspended(kind));
        }
        if kinds.contains(&PolicyKind::Keyboard) {
            // cache what the host actually uses, which focus handling may have changed
            let current = self
                .host
                .keyboard_mode()
                .await
                .map_err(|err| PolicyError::host(HostCall::GetKeyboardMode, err))?;
            self.store.set_mode(PolicyKind::Keyboard, current);
        }
        let permissive = PropagationMode::permissive();
        for (done, &kind) in kinds.iter().enumerate() {
            if let Err(err) = self.push_mode(kind, permissive).await {
                self.undo_suspend(&kinds[..done]).await;
                return Err(err);
            }
            self.store.suspend(kind)?;
            self.store.set_mode(kind, permissive);
            tracing::debug!(%kind, "policies suspended");
        }
        self.sync_kinds(kinds).await
    }

    /// Puts kinds suspended earlier in a failed batch back the way they were,
    /// so the batch leaves either every kind suspended or none.
    async fn undo_suspend(&mut self, kinds: &[PolicyKind]) {
        for &kind in kinds {
            let Some(mode) = self.store.suspended_mode(kind) else {
                continue;
            };
            if self.store.restore(kind).is_err() {
                continue;
            }
            if let Err(err) = self.push_mode(kind, mode).await {
                tracing::warn!(%kind, error = %err, "could not reset mode after failed suspend");
            }
            if let Err(err) = self.sync_policies(kind).await {
                tracing::warn!(%kind, error = %err, "could not resync after failed suspend");
            }
        }
    }

    async fn restore_kinds(&mut self, kinds: &[PolicyKind]) -> PolicyResult<()> {
        if let Some(&kind) = kinds.iter().find(|kind| !self.store.is_suspended(**kind)) {
            return Err(PolicyError::NotSuspended(kind));
        }
        for (done, &kind) in kinds.iter().enumerate() {
            let mode = self
                .store
                .suspended_mode(kind)
                .ok_or(PolicyError::NotSuspended(kind))?;
            if let Err(err) = self.push_mode(kind, mode).await {
                // kinds already restored still get their lists back
                if done > 0
                    && let Err(sync_err) = self.sync_kinds(&kinds[..done]).await
                {
                    tracing::warn!(error = %sync_err, "resync after partial restore failed");
                }
                return Err(err);
            }
            self.store.restore(kind)?;
            tracing::debug!(%kind, "policies restored");
        }
        self.sync_kinds(kinds).await
    }

    async fn sync_kinds(&mut self, kinds: &[PolicyKind]) -> PolicyResult<()> {
        match kinds {
            [kind] => self.sync_policies(*kind).await.map(|_| ()),
            _ => self.sync_all_policies().await,
        }
    }

    /// Blanks every rule of `kind` and lets the host take all input until
    /// `restore_policies`. Suspension does not nest.
    pub async fn suspend_policies(&mut self, kind: PolicyKind) -> PolicyResult<()> {
        self.suspend_kinds(&[kind]).await
    }

    pub async fn suspend_all_policies(&mut self) -> PolicyResult<()> {
        self.suspend_kinds(&PolicyKind::ALL).await
    }

    pub async fn restore_policies(&mut self, kind: PolicyKind) -> PolicyResult<()> {
        self.restore_kinds(&[kind]).await
    }

    /// Restores every kind that is still suspended. A batch cut short by a
    /// host failure can be finished by calling this again.
    pub async fn restore_all_policies(&mut self) -> PolicyResult<()> {
        let suspended: Vec<PolicyKind> = PolicyKind::ALL
            .into_iter()
            .filter(|kind| self.store.is_suspended(*kind))
            .collect();
        if suspended.is_empty() {
            return Err(PolicyError::NotSuspended(PolicyKind::Keyboard));
        }
        self.restore_kinds(&suspended).await
    }

    /// Suspends around host modal states. Misuse (a double enter or a stray
    /// exit) is logged and dropped. Geometry and tool notifications
    /// invalidate the derived policies so the reinstaller recomputes them.
    pub async fn handle_host_event(&mut self, event: &HostEvent) -> PolicyResult<()> {
        let (state, active) = match event {
            HostEvent::ToolModalStateChanged { state, active } => (state, active),
            HostEvent::GeometryChanged | HostEvent::ToolChanged => {
                tracing::debug!(?event, "derived policies invalidated");
                self.invalidate();
                return Ok(());
            }
        };
        let result = if *active {
            self.suspend_all_policies().await
        } else {
            self.restore_all_policies().await
        };
        match result {
            Err(err) if err.is_caller_error() => {
                tracing::warn!(?state, active, error = %err, "ignoring modal state change");
                Ok(())
            }
            other => other,
        }
    }

    /// Replaces the border list for the current selection, or tears it down
    /// and recomputes guide policies when there is no selection.
    pub async fn reset_border_policies(
        &mut self,
        state: &EditorState,
    ) -> PolicyResult<BorderOutcome> {
        let Some(policies) = border_policies(state.document.as_ref(), state.tool, &self.config)
        else {
            if let Some(id) = self.border_list.take() {
                self.drop_pointer_list(id).await?;
            }
            self.reset_guide_policies(state).await?;
            return Ok(BorderOutcome::TornDown);
        };
        let previous = self.border_list.take();
        let (id, committed) = self.swap_pointer_list(previous, policies).await?;
        self.border_list = Some(id);
        committed?;
        Ok(BorderOutcome::Installed(id))
    }

    pub async fn reset_guide_policies(&mut self, state: &EditorState) -> PolicyResult<()> {
        let policies = guide_policies(
            state.document.as_ref(),
            state.tool,
            self.config.guide_half_thickness,
        );
        let previous = self.guide_list.take();
        if policies.is_empty() {
            if let Some(id) = previous {
                self.drop_pointer_list(id).await?;
            }
            return Ok(());
        }
        let (id, committed) = self.swap_pointer_list(previous, policies).await?;
        self.guide_list = Some(id);
        committed
    }

    /// Recomputes border and guide policies for `state`.
    pub async fn apply_state(&mut self, state: &EditorState) -> PolicyResult<()> {
        match self.reset_border_policies(state).await? {
            BorderOutcome::TornDown => Ok(()),
            BorderOutcome::Installed(_) => self.reset_guide_policies(state).await,
        }
    }

    pub async fn set_vector_mask_mode(&mut self, enabled: bool) -> PolicyResult<()> {
        let previous = self.vector_mask_list.take();
        if !enabled {
            if let Some(id) = previous {
                self.drop_pointer_list(id).await?;
            }
            return Ok(());
        }
        let policies = vector_mask_policies(self.config.platform);
        let (id, committed) = self.swap_pointer_list(previous, policies).await?;
        self.vector_mask_list = Some(id);
        committed
    }

    /// Removes a cached list, treating one that is already gone as removed.
    async fn drop_pointer_list(&mut self, id: PolicyListId) -> PolicyResult<()> {
        if !self.store.contains(PolicyKind::Pointer, id) {
            tracing::debug!(%id, "cached list already gone");
            return Ok(());
        }
        self.remove_pointer_policies(id, Commit::Immediate).await
    }

    /// Remove `previous`, add `policies`, one commit. The new id comes back
    /// even when the commit fails: the store keeps the list and stays dirty,
    /// so the caller must still record it.
    async fn swap_pointer_list(
        &mut self,
        previous: Option<PolicyListId>,
        policies: Vec<PointerPolicy>,
    ) -> PolicyResult<(PolicyListId, PolicyResult<()>)> {
        let mut tx = self.transaction();
        match previous {
            Some(old) if tx.contains(PolicyKind::Pointer, old) => {
                tx.remove(PolicyKind::Pointer, old)?
            }
            Some(old) => tracing::debug!(id = %old, "previous list already gone"),
            None => {}
        }
        let id = tx.add_pointer(policies)?;
        Ok((id, tx.commit().await))
    }
}
