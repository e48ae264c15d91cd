use crossterm::event::{KeyCode, KeyModifiers};
use policy_arbiter::config::ArbiterConfig;
use policy_arbiter::geometry::Region;
use policy_arbiter::host::{HostCall, HostRequest};
use policy_arbiter::{
    Commit, EventKind, KeyboardPolicy, PointerPolicy, PolicyAction, PolicyCoordinator,
    PolicyEvent, PolicyKind, RecordingHost,
};

fn strip(x: i32, action: PolicyAction) -> PointerPolicy {
    PointerPolicy::new(
        action,
        EventKind::LeftMouseDown,
        KeyModifiers::NONE,
        Some(Region::new(x, 0, 4, 100)),
    )
}

fn coordinator() -> (RecordingHost, PolicyCoordinator<RecordingHost>) {
    let host = RecordingHost::new();
    let coordinator = PolicyCoordinator::new(host.clone(), ArbiterConfig::default());
    (host, coordinator)
}

#[tokio::test]
async fn swap_never_exposes_an_empty_list() {
    let (host, mut coordinator) = coordinator();
    let keep = coordinator
        .add_pointer_policies(vec![strip(0, PolicyAction::PropagateToHost)], Commit::Immediate)
        .await
        .unwrap();
    let mut current = coordinator
        .add_pointer_policies(vec![strip(10, PolicyAction::PropagateByAlpha)], Commit::Immediate)
        .await
        .unwrap();

    for x in [20, 30, 40] {
        let mut tx = coordinator.transaction();
        tx.stage_removal(PolicyKind::Pointer, current).unwrap();
        current = tx
            .add_pointer(vec![strip(x, PolicyAction::PropagateByAlpha)])
            .unwrap();
        tx.commit().await.unwrap();
    }

    // every push after the first carries the kept list plus one border strip
    for request in host.requests().iter().skip(1) {
        let HostRequest::SetPointerPolicy(policies) = request else {
            panic!("unexpected request {:?}", request);
        };
        assert_eq!(policies.len(), 2);
    }
    assert_eq!(host.count(HostCall::SetPointerPolicy), 5);
    assert_eq!(
        coordinator.store().installed_ids(PolicyKind::Pointer),
        vec![keep, current]
    );
    assert_eq!(
        host.pointer_policies(),
        vec![
            strip(0, PolicyAction::PropagateToHost),
            strip(40, PolicyAction::PropagateByAlpha)
        ]
    );
}

#[tokio::test]
async fn committing_each_mutation_does_expose_a_gap() {
    let (host, mut coordinator) = coordinator();
    let old = coordinator
        .add_pointer_policies(vec![strip(10, PolicyAction::PropagateByAlpha)], Commit::Immediate)
        .await
        .unwrap();
    coordinator
        .remove_pointer_policies(old, Commit::Immediate)
        .await
        .unwrap();
    coordinator
        .add_pointer_policies(vec![strip(20, PolicyAction::PropagateByAlpha)], Commit::Immediate)
        .await
        .unwrap();

    assert_eq!(
        host.requests()[1],
        HostRequest::SetPointerPolicy(Vec::new())
    );
}

#[tokio::test]
async fn deferred_calls_make_one_rpc_per_kind() {
    let (host, mut coordinator) = coordinator();
    let old = coordinator
        .add_pointer_policies(vec![strip(0, PolicyAction::PropagateByAlpha)], Commit::Immediate)
        .await
        .unwrap();
    host.clear_requests();

    coordinator
        .remove_pointer_policies(old, Commit::Deferred)
        .await
        .unwrap();
    coordinator
        .add_pointer_policies(vec![strip(5, PolicyAction::PropagateByAlpha)], Commit::Deferred)
        .await
        .unwrap();
    coordinator
        .add_keyboard_policies(
            vec![KeyboardPolicy::new(
                PolicyAction::PropagateToOverlay,
                KeyModifiers::SUPER,
                KeyCode::Char('z'),
            )],
            Commit::Deferred,
        )
        .await
        .unwrap();
    assert!(host.requests().is_empty());

    coordinator.sync_all_policies().await.unwrap();
    assert_eq!(host.count(HostCall::SetPointerPolicy), 1);
    assert_eq!(host.count(HostCall::SetKeyboardPolicy), 1);

    // nothing changed since, so nothing is sent
    coordinator.sync_all_policies().await.unwrap();
    assert!(!coordinator.sync_policies(PolicyKind::Pointer).await.unwrap());
    assert_eq!(host.requests().len(), 2);
}

#[tokio::test]
async fn installs_are_announced_to_subscribers() {
    let (_host, mut coordinator) = coordinator();
    let mut events = coordinator.subscribe();
    coordinator
        .add_pointer_policies(
            vec![
                strip(0, PolicyAction::PropagateToHost),
                strip(8, PolicyAction::PropagateToHost),
            ],
            Commit::Immediate,
        )
        .await
        .unwrap();
    assert_eq!(
        events.recv().await.unwrap(),
        PolicyEvent::PoliciesInstalled {
            kind: PolicyKind::Pointer,
            count: 2
        }
    );
}

#[tokio::test]
async fn staged_but_uncommitted_changes_go_out_with_the_next_sync() {
    let (host, mut coordinator) = coordinator();
    {
        let mut tx = coordinator.transaction();
        tx.add_pointer(vec![strip(0, PolicyAction::PropagateToHost)])
            .unwrap();
        drop(tx);
    }
    assert!(host.requests().is_empty());
    assert!(coordinator.store().is_dirty(PolicyKind::Pointer));

    coordinator.sync_policies(PolicyKind::Pointer).await.unwrap();
    assert_eq!(
        host.pointer_policies(),
        vec![strip(0, PolicyAction::PropagateToHost)]
    );
}
