use std::collections::BTreeMap;

use super::{MasterPolicyList, Policy, PolicyKind, PolicyList, PolicyListId, PropagationMode};
use crate::error::{PolicyError, PolicyResult};

#[derive(Debug, Clone)]
struct Suspended {
    lists: BTreeMap<PolicyListId, PolicyList>,
    mode: PropagationMode,
}

#[derive(Debug, Clone)]
struct KindState {
    // ids are allocated monotonically, so key order is install order
    installed: BTreeMap<PolicyListId, PolicyList>,
    mode: PropagationMode,
    dirty: bool,
    suspended: Option<Suspended>,
}

impl KindState {
    fn new(kind: PolicyKind) -> Self {
        Self {
            installed: BTreeMap::new(),
            mode: PropagationMode::default_for(kind),
            dirty: false,
            suspended: None,
        }
    }
}

/// Installed policy lists per kind, plus the mode, dirty flag and suspension
/// cache the sync engine reads.
///
/// The store performs no host interaction. Only the coordinator mutates it.
#[derive(Debug, Clone)]
pub struct PolicyStore {
    keyboard: KindState,
    pointer: KindState,
    next_id: u64,
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyStore {
    pub fn new() -> Self {
        Self {
            keyboard: KindState::new(PolicyKind::Keyboard),
            pointer: KindState::new(PolicyKind::Pointer),
            next_id: 1,
        }
    }

    fn state(&self, kind: PolicyKind) -> &KindState {
        match kind {
            PolicyKind::Keyboard => &self.keyboard,
            PolicyKind::Pointer => &self.pointer,
        }
    }

    fn state_mut(&mut self, kind: PolicyKind) -> &mut KindState {
        match kind {
            PolicyKind::Keyboard => &mut self.keyboard,
            PolicyKind::Pointer => &mut self.pointer,
        }
    }

    /// Appends a list and returns its fresh id. Every rule must belong to `kind`.
    ///
    /// While `kind` is suspended the list is parked with the suspended ones:
    /// the master list stays empty and `restore` brings it in.
    pub fn add_policy_list(
        &mut self,
        kind: PolicyKind,
        policies: Vec<Policy>,
    ) -> PolicyResult<PolicyListId> {
        if let Some(stray) = policies.iter().find(|p| p.kind() != kind) {
            return Err(PolicyError::KindMismatch {
                expected: kind,
                found: stray.kind(),
            });
        }
        let id = PolicyListId::new(self.next_id);
        self.next_id += 1;
        let count = policies.len();
        let list = PolicyList {
            id,
            kind,
            policies,
        };
        let state = self.state_mut(kind);
        if let Some(suspended) = state.suspended.as_mut() {
            suspended.lists.insert(id, list);
            tracing::debug!(%kind, %id, count, "parked policy list until restore");
            return Ok(id);
        }
        state.installed.insert(id, list);
        state.dirty = true;
        tracing::debug!(%kind, %id, count, "added policy list");
        Ok(id)
    }

    /// Returns false, without touching state, when `id` is neither installed
    /// nor parked.
    ///
    /// A list parked by `suspend` can still be removed; it is then not
    /// reinstated by `restore`.
    pub fn remove_policy_list(&mut self, kind: PolicyKind, id: PolicyListId) -> bool {
        let state = self.state_mut(kind);
        if state.installed.remove(&id).is_some() {
            state.dirty = true;
        } else if !state
            .suspended
            .as_mut()
            .is_some_and(|s| s.lists.remove(&id).is_some())
        {
            return false;
        }
        tracing::debug!(%kind, %id, "removed policy list");
        true
    }

    pub fn suspend(&mut self, kind: PolicyKind) -> PolicyResult<()> {
        let state = self.state_mut(kind);
        if state.suspended.is_some() {
            return Err(PolicyError::AlreadySuspended(kind));
        }
        state.suspended = Some(Suspended {
            lists: std::mem::take(&mut state.installed),
            mode: state.mode,
        });
        state.dirty = true;
        Ok(())
    }

    /// Reinstates the lists and mode cached by `suspend`, including lists
    /// added while suspended.
    pub fn restore(&mut self, kind: PolicyKind) -> PolicyResult<()> {
        let state = self.state_mut(kind);
        let Some(suspended) = state.suspended.take() else {
            return Err(PolicyError::NotSuspended(kind));
        };
        state.installed = suspended.lists;
        state.mode = suspended.mode;
        state.dirty = true;
        Ok(())
    }

    pub fn is_suspended(&self, kind: PolicyKind) -> bool {
        self.state(kind).suspended.is_some()
    }

    /// Mode that `restore` will reinstate, if suspended.
    pub fn suspended_mode(&self, kind: PolicyKind) -> Option<PropagationMode> {
        self.state(kind).suspended.as_ref().map(|s| s.mode)
    }

    pub fn mode(&self, kind: PolicyKind) -> PropagationMode {
        self.state(kind).mode
    }

    pub fn set_mode(&mut self, kind: PolicyKind, mode: PropagationMode) {
        let state = self.state_mut(kind);
        if state.mode != mode {
            state.mode = mode;
            state.dirty = true;
        }
    }

    pub fn master_policy_list(&self, kind: PolicyKind) -> MasterPolicyList {
        let policies = self
            .state(kind)
            .installed
            .values()
            .flat_map(|list| list.policies.iter().cloned())
            .collect();
        MasterPolicyList::new(kind, policies)
    }

    pub fn installed_ids(&self, kind: PolicyKind) -> Vec<PolicyListId> {
        self.state(kind).installed.keys().copied().collect()
    }

    /// True for installed lists and for lists parked by `suspend`.
    pub fn contains(&self, kind: PolicyKind, id: PolicyListId) -> bool {
        let state = self.state(kind);
        state.installed.contains_key(&id)
            || state
                .suspended
                .as_ref()
                .is_some_and(|s| s.lists.contains_key(&id))
    }

    pub fn is_dirty(&self, kind: PolicyKind) -> bool {
        self.state(kind).dirty
    }

    pub(crate) fn mark_clean(&mut self, kind: PolicyKind) {
        self.state_mut(kind).dirty = false;
    }

    /// Drops every list, suspension and mode override. Ids keep counting so
    /// handles issued before the reset never alias new lists.
    pub fn reset(&mut self) {
        for kind in PolicyKind::ALL {
            let mut fresh = KindState::new(kind);
            // the host still holds whatever was last synced
            fresh.dirty = true;
            *self.state_mut(kind) = fresh;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Region;
    use crate::policy::{EventKind, KeyboardPolicy, PolicyAction, PointerPolicy};
    use crossterm::event::{KeyCode, KeyModifiers};
    use std::collections::HashSet;

    fn pointer(x: i32) -> Policy {
        PointerPolicy::new(
            PolicyAction::PropagateToHost,
            EventKind::LeftMouseDown,
            KeyModifiers::NONE,
            Some(Region::new(x, 0, 1, 1)),
        )
        .into()
    }

    fn key(c: char) -> Policy {
        KeyboardPolicy::new(PolicyAction::PropagateToHost, KeyModifiers::NONE, KeyCode::Char(c))
            .into()
    }

    #[test]
    fn ids_are_unique_across_kinds_and_removals() {
        let mut store = PolicyStore::new();
        let mut seen = HashSet::new();
        for i in 0..20 {
            let id = store.add_policy_list(PolicyKind::Pointer, vec![pointer(i)]).unwrap();
            assert!(seen.insert(id));
            let id = store.add_policy_list(PolicyKind::Keyboard, vec![key('a')]).unwrap();
            assert!(seen.insert(id));
            if i % 3 == 0 {
                assert!(store.remove_policy_list(PolicyKind::Keyboard, id));
            }
        }
        store.reset();
        let id = store.add_policy_list(PolicyKind::Pointer, vec![]).unwrap();
        assert!(seen.insert(id));
    }

    #[test]
    fn master_list_is_concatenation_in_install_order() {
        let mut store = PolicyStore::new();
        let a = store
            .add_policy_list(PolicyKind::Pointer, vec![pointer(1), pointer(2)])
            .unwrap();
        let _b = store.add_policy_list(PolicyKind::Pointer, vec![pointer(3)]).unwrap();
        let _c = store.add_policy_list(PolicyKind::Pointer, vec![pointer(4), pointer(5)]).unwrap();
        assert_eq!(
            store.master_policy_list(PolicyKind::Pointer).policies(),
            &[pointer(1), pointer(2), pointer(3), pointer(4), pointer(5)]
        );
        assert!(store.remove_policy_list(PolicyKind::Pointer, a));
        assert_eq!(
            store.master_policy_list(PolicyKind::Pointer).policies(),
            &[pointer(3), pointer(4), pointer(5)]
        );
        assert!(store.master_policy_list(PolicyKind::Keyboard).is_empty());
    }

    #[test]
    fn removing_unknown_id_leaves_state_alone() {
        let mut store = PolicyStore::new();
        let id = store.add_policy_list(PolicyKind::Keyboard, vec![key('x')]).unwrap();
        store.mark_clean(PolicyKind::Keyboard);
        // right id, wrong kind
        assert!(!store.remove_policy_list(PolicyKind::Pointer, id));
        assert!(!store.remove_policy_list(PolicyKind::Keyboard, PolicyListId::new(999)));
        assert!(!store.is_dirty(PolicyKind::Keyboard));
        assert_eq!(store.master_policy_list(PolicyKind::Keyboard).len(), 1);
    }

    #[test]
    fn mismatched_rule_is_rejected() {
        let mut store = PolicyStore::new();
        let err = store
            .add_policy_list(PolicyKind::Keyboard, vec![key('a'), pointer(1)])
            .unwrap_err();
        assert!(matches!(
            err,
            PolicyError::KindMismatch {
                expected: PolicyKind::Keyboard,
                found: PolicyKind::Pointer
            }
        ));
        assert!(store.installed_ids(PolicyKind::Keyboard).is_empty());
        assert!(!store.is_dirty(PolicyKind::Keyboard));
    }

    #[test]
    fn suspend_restore_round_trip() {
        let mut store = PolicyStore::new();
        store.add_policy_list(PolicyKind::Pointer, vec![pointer(1)]).unwrap();
        store.add_policy_list(PolicyKind::Pointer, vec![pointer(2)]).unwrap();
        store.set_mode(PolicyKind::Pointer, PropagationMode::NeverToHost);
        let before = store.master_policy_list(PolicyKind::Pointer);

        store.suspend(PolicyKind::Pointer).unwrap();
        assert!(store.master_policy_list(PolicyKind::Pointer).is_empty());
        assert_eq!(
            store.suspended_mode(PolicyKind::Pointer),
            Some(PropagationMode::NeverToHost)
        );
        store.set_mode(PolicyKind::Pointer, PropagationMode::AlwaysToHost);
        assert!(matches!(
            store.suspend(PolicyKind::Pointer),
            Err(PolicyError::AlreadySuspended(PolicyKind::Pointer))
        ));

        store.restore(PolicyKind::Pointer).unwrap();
        assert_eq!(store.master_policy_list(PolicyKind::Pointer), before);
        assert_eq!(store.mode(PolicyKind::Pointer), PropagationMode::NeverToHost);
        assert!(matches!(
            store.restore(PolicyKind::Pointer),
            Err(PolicyError::NotSuspended(PolicyKind::Pointer))
        ));
    }

    #[test]
    fn removal_while_suspended_is_not_reinstated() {
        let mut store = PolicyStore::new();
        let stale = store.add_policy_list(PolicyKind::Pointer, vec![pointer(1)]).unwrap();
        store.add_policy_list(PolicyKind::Pointer, vec![pointer(2)]).unwrap();
        store.suspend(PolicyKind::Pointer).unwrap();
        assert!(store.remove_policy_list(PolicyKind::Pointer, stale));
        store.restore(PolicyKind::Pointer).unwrap();
        assert_eq!(
            store.master_policy_list(PolicyKind::Pointer).policies(),
            &[pointer(2)]
        );
    }

    #[test]
    fn additions_while_suspended_wait_for_restore() {
        let mut store = PolicyStore::new();
        store.add_policy_list(PolicyKind::Pointer, vec![pointer(1)]).unwrap();
        store.suspend(PolicyKind::Pointer).unwrap();
        store.mark_clean(PolicyKind::Pointer);

        let late = store.add_policy_list(PolicyKind::Pointer, vec![pointer(2)]).unwrap();
        assert!(store.master_policy_list(PolicyKind::Pointer).is_empty());
        assert!(!store.is_dirty(PolicyKind::Pointer));
        assert!(store.contains(PolicyKind::Pointer, late));

        store.restore(PolicyKind::Pointer).unwrap();
        assert_eq!(
            store.master_policy_list(PolicyKind::Pointer).policies(),
            &[pointer(1), pointer(2)]
        );
    }

    #[test]
    fn restore_without_suspend_fails() {
        let mut store = PolicyStore::new();
        assert!(matches!(
            store.restore(PolicyKind::Keyboard),
            Err(PolicyError::NotSuspended(PolicyKind::Keyboard))
        ));
        // kinds are independent
        store.suspend(PolicyKind::Keyboard).unwrap();
        assert!(!store.is_suspended(PolicyKind::Pointer));
    }

    #[test]
    fn dirty_tracks_mutations() {
        let mut store = PolicyStore::new();
        assert!(!store.is_dirty(PolicyKind::Pointer));
        let id = store.add_policy_list(PolicyKind::Pointer, vec![pointer(1)]).unwrap();
        assert!(store.is_dirty(PolicyKind::Pointer));
        store.mark_clean(PolicyKind::Pointer);
        store.set_mode(PolicyKind::Pointer, PropagationMode::Alpha);
        // unchanged mode is not a mutation
        assert!(!store.is_dirty(PolicyKind::Pointer));
        store.remove_policy_list(PolicyKind::Pointer, id);
        assert!(store.is_dirty(PolicyKind::Pointer));
        assert!(!store.is_dirty(PolicyKind::Keyboard));
    }
}
