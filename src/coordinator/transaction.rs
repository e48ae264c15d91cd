use super::PolicyCoordinator;
use crate::error::PolicyResult;
use crate::host::HostPort;
use crate::policy::{KeyboardPolicy, PointerPolicy, Policy, PolicyKind, PolicyListId};
use crate::sync;

/// Staged removals and additions that reach the host in a single commit.
///
/// The transaction holds the coordinator exclusively, so nothing can sync
/// between a staged removal and the matching addition: the host never sees
/// the old list gone without the new one in place.
///
/// Dropping a transaction without committing keeps the staged changes in the
/// store; they go out with the next sync.
#[must_use = "staged changes reach the host only on commit"]
pub struct PolicyTransaction<'a, H: HostPort> {
    coordinator: &'a mut PolicyCoordinator<H>,
    staged: usize,
}

impl<'a, H: HostPort> PolicyTransaction<'a, H> {
    pub(super) fn new(coordinator: &'a mut PolicyCoordinator<H>) -> Self {
        Self {
            coordinator,
            staged: 0,
        }
    }

    pub fn stage_removal(&mut self, kind: PolicyKind, id: PolicyListId) -> PolicyResult<()> {
        self.coordinator.remove_local(kind, id)?;
        self.staged += 1;
        Ok(())
    }

    pub fn stage_addition(
        &mut self,
        kind: PolicyKind,
        policies: Vec<Policy>,
    ) -> PolicyResult<PolicyListId> {
        let id = self.coordinator.store.add_policy_list(kind, policies)?;
        self.staged += 1;
        Ok(id)
    }

    pub fn remove(&mut self, kind: PolicyKind, id: PolicyListId) -> PolicyResult<()> {
        self.stage_removal(kind, id)
    }

    pub fn add_pointer(&mut self, policies: Vec<PointerPolicy>) -> PolicyResult<PolicyListId> {
        let policies = policies.into_iter().map(Policy::from).collect();
        self.stage_addition(PolicyKind::Pointer, policies)
    }

    pub fn add_keyboard(&mut self, policies: Vec<KeyboardPolicy>) -> PolicyResult<PolicyListId> {
        let policies = policies.into_iter().map(Policy::from).collect();
        self.stage_addition(PolicyKind::Keyboard, policies)
    }

    pub fn contains(&self, kind: PolicyKind, id: PolicyListId) -> bool {
        self.coordinator.store.contains(kind, id)
    }

    pub fn staged(&self) -> usize {
        self.staged
    }

    /// One sync of every dirty kind. Staged changes are not undone on
    /// failure; the store stays dirty and the next sync retries.
    pub async fn commit(self) -> PolicyResult<()> {
        let PolicyCoordinator {
            host,
            store,
            events,
            ..
        } = self.coordinator;
        tracing::debug!(staged = self.staged, "committing policy transaction");
        sync::sync_all_policies(store, host, events).await
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ArbiterConfig;
    use crate::coordinator::{Commit, PolicyCoordinator};
    use crate::error::PolicyError;
    use crate::geometry::Region;
    use crate::host::{HostCall, HostRequest, RecordingHost};
    use crate::policy::{EventKind, KeyboardPolicy, PointerPolicy, PolicyAction, PolicyKind};
    use crossterm::event::{KeyCode, KeyModifiers};

    fn rect(x: i32) -> PointerPolicy {
        PointerPolicy::new(
            PolicyAction::PropagateByAlpha,
            EventKind::LeftMouseDown,
            KeyModifiers::NONE,
            Some(Region::new(x, 0, 10, 10)),
        )
    }

    #[tokio::test]
    async fn swap_reaches_host_in_one_call() {
        let host = RecordingHost::new();
        let mut coordinator = PolicyCoordinator::new(host.clone(), ArbiterConfig::default());
        let old = coordinator
            .add_pointer_policies(vec![rect(0)], Commit::Immediate)
            .await
            .unwrap();
        host.clear_requests();

        let mut tx = coordinator.transaction();
        tx.remove(PolicyKind::Pointer, old).unwrap();
        let new = tx.add_pointer(vec![rect(50)]).unwrap();
        assert_eq!(tx.staged(), 2);
        tx.commit().await.unwrap();

        assert_eq!(host.requests(), vec![HostRequest::SetPointerPolicy(vec![rect(50)])]);
        assert_eq!(coordinator.store().installed_ids(PolicyKind::Pointer), vec![new]);
    }

    #[tokio::test]
    async fn mixed_kinds_commit_with_one_call_each() {
        let host = RecordingHost::new();
        let mut coordinator = PolicyCoordinator::new(host.clone(), ArbiterConfig::default());
        let space = KeyboardPolicy::new(
            PolicyAction::PropagateToHost,
            KeyModifiers::NONE,
            KeyCode::Char(' '),
        );

        let mut tx = coordinator.transaction();
        let keys = tx.add_keyboard(vec![space.clone()]).unwrap();
        let rects = tx.add_pointer(vec![rect(0), rect(20)]).unwrap();
        assert!(tx.contains(PolicyKind::Keyboard, keys));
        assert!(!tx.contains(PolicyKind::Pointer, keys));
        assert_eq!(tx.staged(), 2);
        tx.commit().await.unwrap();

        assert_eq!(host.count(HostCall::SetKeyboardPolicy), 1);
        assert_eq!(host.count(HostCall::SetPointerPolicy), 1);
        assert_eq!(host.keyboard_policies(), vec![space]);
        assert_eq!(host.pointer_policies(), vec![rect(0), rect(20)]);
        assert_ne!(keys, rects);
    }

    #[tokio::test]
    async fn unknown_removal_is_rejected_before_anything_is_staged() {
        let host = RecordingHost::new();
        let mut coordinator = PolicyCoordinator::new(host.clone(), ArbiterConfig::default());
        let id = coordinator
            .add_pointer_policies(vec![rect(0)], Commit::Immediate)
            .await
            .unwrap();
        coordinator
            .remove_pointer_policies(id, Commit::Immediate)
            .await
            .unwrap();

        let mut tx = coordinator.transaction();
        assert!(matches!(
            tx.remove(PolicyKind::Pointer, id),
            Err(PolicyError::NotFound { .. })
        ));
        assert_eq!(tx.staged(), 0);
    }

    #[tokio::test]
    async fn failed_commit_keeps_staged_state_dirty() {
        let host = RecordingHost::new();
        let mut coordinator = PolicyCoordinator::new(host.clone(), ArbiterConfig::default());
        host.fail_next(
            HostCall::SetPointerPolicy,
            crate::error::HostError::Unreachable,
        );
        let mut tx = coordinator.transaction();
        let id = tx.add_pointer(vec![rect(0)]).unwrap();
        assert!(tx.commit().await.is_err());
        assert!(coordinator.store().contains(PolicyKind::Pointer, id));
        assert!(coordinator.store().is_dirty(PolicyKind::Pointer));

        coordinator.sync_all_policies().await.unwrap();
        assert_eq!(host.pointer_policies(), vec![rect(0)]);
    }
}
