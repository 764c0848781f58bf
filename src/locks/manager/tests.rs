use super::*;
use tempfile::tempdir;

fn setup() -> (Database, RecoveryManager, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let db = Database::new(dir.path()).unwrap();
    let recovery = RecoveryManager::new(dir.path()).unwrap();
    (db, recovery, dir)
}

fn active_with(entries: &[(Trid, u32)]) -> BTreeMap<Trid, TxnProgress> {
    entries
        .iter()
        .map(|&(trid, ops_done)| (trid, TxnProgress { ops_done, last_did: None }))
        .collect()
}

/// Two transactions holding one item each and requesting the other's
fn build_deadlock(locks: &mut LockManager) {
    assert!(locks.acquire(1, 0, LockMode::Exclusive));
    assert!(locks.acquire(2, 1, LockMode::Exclusive));
    assert!(!locks.acquire(1, 1, LockMode::Exclusive));
    assert!(!locks.acquire(2, 0, LockMode::Exclusive));
}

#[test]
fn test_shared_locks_coexist() {
    let mut locks = LockManager::new(0.0, 0, 7);

    assert!(locks.acquire(1, 3, LockMode::Shared));
    assert!(locks.acquire(2, 3, LockMode::Shared));

    let order: Vec<Trid> = locks.holders(3).unwrap().iter().map(|e| e.trid).collect();
    assert_eq!(order, vec![1, 2]);
}

#[test]
fn test_exclusive_blocks_everyone() {
    let mut locks = LockManager::new(0.0, 0, 7);

    assert!(locks.acquire(1, 3, LockMode::Exclusive));
    assert!(!locks.acquire(2, 3, LockMode::Shared));
    assert!(!locks.acquire(3, 3, LockMode::Exclusive));

    assert_eq!(locks.waiting_on(2), Some((3, LockMode::Shared)));
    assert_eq!(locks.waiting_on(3), Some((3, LockMode::Exclusive)));
    // Denied requests leave no partial holder state
    assert_eq!(locks.holders(3).unwrap().len(), 1);
    assert!(locks.locks_held_by(2).is_none());
}

#[test]
fn test_shared_blocks_exclusive() {
    let mut locks = LockManager::new(0.0, 0, 7);

    assert!(locks.acquire(1, 5, LockMode::Shared));
    assert!(!locks.acquire(2, 5, LockMode::Exclusive));
    assert_eq!(locks.waiting_on(2), Some((5, LockMode::Exclusive)));
}

#[test]
fn test_reacquire_is_granted() {
    let mut locks = LockManager::new(0.0, 0, 7);

    assert!(locks.acquire(1, 3, LockMode::Exclusive));
    assert!(locks.acquire(1, 3, LockMode::Exclusive));
    assert!(locks.acquire(1, 3, LockMode::Shared));

    // An exclusive holder keeps its single exclusive entry
    let holders = locks.holders(3).unwrap();
    assert_eq!(holders.len(), 1);
    assert_eq!(holders.find(1).map(|e| e.mode), Some(LockMode::Exclusive));
}

#[test]
fn test_sole_holder_upgrade_succeeds() {
    let mut locks = LockManager::new(0.0, 0, 7);

    assert!(locks.acquire(1, 3, LockMode::Shared));
    assert!(locks.acquire(1, 3, LockMode::Exclusive));

    let holders = locks.holders(3).unwrap();
    assert_eq!(holders.len(), 1);
    assert_eq!(holders.find(1).map(|e| e.mode), Some(LockMode::Exclusive));
}

#[test]
fn test_upgrade_with_other_shared_holders_waits() {
    let mut locks = LockManager::new(0.0, 0, 7);

    assert!(locks.acquire(1, 3, LockMode::Shared));
    assert!(locks.acquire(2, 3, LockMode::Shared));
    assert!(!locks.acquire(1, 3, LockMode::Exclusive));

    // T1 keeps its shared lock and is recorded as waiting
    let holders = locks.holders(3).unwrap();
    assert_eq!(holders.len(), 2);
    assert_eq!(holders.find(1).map(|e| e.mode), Some(LockMode::Shared));
    assert_eq!(locks.waiting_on(1), Some((3, LockMode::Exclusive)));
}

#[test]
fn test_granted_acquire_clears_stale_wait() {
    let mut locks = LockManager::new(0.0, 0, 7);

    assert!(locks.acquire(1, 0, LockMode::Exclusive));
    assert!(!locks.acquire(2, 0, LockMode::Shared));
    assert!(locks.waiting_on(2).is_some());

    // T2 moves on to a free item; it is no longer blocked
    assert!(locks.acquire(2, 1, LockMode::Shared));
    assert!(locks.waiting_on(2).is_none());
}

#[test]
fn test_release_reports_presence() {
    let mut locks = LockManager::new(0.0, 0, 7);

    assert!(locks.acquire(1, 3, LockMode::Shared));
    assert!(locks.release(1, 3));
    assert!(!locks.release(1, 3));
    assert!(!locks.release(9, 0));
}

#[test]
fn test_release_all_leaves_no_trace() {
    let mut locks = LockManager::new(0.0, 0, 7);

    assert!(locks.acquire(1, 0, LockMode::Shared));
    assert!(locks.acquire(1, 1, LockMode::Exclusive));
    assert!(locks.acquire(2, 0, LockMode::Shared));

    locks.release_all(1);

    assert!(locks.locks_held_by(1).is_none());
    assert!(locks.holders(0).unwrap().find(1).is_none());
    assert!(locks.holders(1).unwrap().is_empty());

    // T2's lock survives
    assert!(locks.holders(0).unwrap().find(2).is_some());
    assert_eq!(locks.locks_held_by(2).unwrap().len(), 1);
}

#[test]
fn test_release_all_clears_wait_state() {
    let mut locks = LockManager::new(0.0, 0, 7);

    assert!(locks.acquire(2, 5, LockMode::Exclusive));
    assert!(locks.acquire(1, 0, LockMode::Shared));
    assert!(!locks.acquire(1, 5, LockMode::Shared));
    assert!(locks.waiting_on(1).is_some());

    // T1 ends while still logically waiting; nothing of it may remain
    locks.release_all(1);
    assert!(locks.waiting_on(1).is_none());
    assert!(locks.locks_held_by(1).is_none());
}

#[test]
fn test_transaction_locks_mirror_lock_table() {
    let mut locks = LockManager::new(0.0, 0, 7);

    assert!(locks.acquire(1, 0, LockMode::Shared));
    assert!(locks.acquire(1, 5, LockMode::Shared));
    assert!(locks.acquire(1, 9, LockMode::Exclusive));

    let held = locks.locks_held_by(1).unwrap();
    assert_eq!(held.iter().copied().collect::<Vec<_>>(), vec![0, 5, 9]);
    for &did in held {
        assert!(locks.holders(did).unwrap().find(1).is_some());
    }
}

#[test]
fn test_wait_for_graph_edges() {
    let mut locks = LockManager::new(0.0, 0, 7);
    build_deadlock(&mut locks);

    let graph = locks.wait_for_graph();
    assert!(graph.get(&1).unwrap().contains(&2), "T1 holds what T2 waits on");
    assert!(graph.get(&2).unwrap().contains(&1), "T2 holds what T1 waits on");
}

#[test]
fn test_find_cycle_exact_members() {
    // 10 -> 1 -> 2 -> 1: the candidate cycle must exclude the ancestor 10
    let mut graph: BTreeMap<Trid, BTreeSet<Trid>> = BTreeMap::new();
    graph.entry(10).or_default().insert(1);
    graph.entry(1).or_default().insert(2);
    graph.entry(2).or_default().insert(1);

    let mut cycle = LockManager::find_cycle(&graph).unwrap();
    cycle.sort_unstable();
    assert_eq!(cycle, vec![1, 2]);
}

#[test]
fn test_find_cycle_none_in_dag() {
    let mut graph: BTreeMap<Trid, BTreeSet<Trid>> = BTreeMap::new();
    graph.entry(1).or_default().insert(2);
    graph.entry(2).or_default().insert(3);
    graph.entry(1).or_default().insert(3);

    assert!(LockManager::find_cycle(&graph).is_none());
}

#[test]
fn test_detect_deadlock_rolls_back_victim() {
    let (mut db, mut recovery, _dir) = setup();
    let mut locks = LockManager::new(1.0, 0, 7);

    recovery.log_start(1).unwrap();
    recovery.log_start(2).unwrap();
    build_deadlock(&mut locks);

    // T1 has done less work, so it is the victim
    let mut active = active_with(&[(1, 1), (2, 3)]);
    let detected = locks
        .detect_deadlock(&mut active, &mut recovery, &mut db, 0)
        .unwrap();

    assert!(detected);
    assert!(!active.contains_key(&1));
    assert!(active.contains_key(&2));
    assert!(locks.locks_held_by(1).is_none());
    assert!(locks.waiting_on(1).is_none());

    // The survivor can now take the contested item
    assert!(locks.acquire(2, 0, LockMode::Exclusive));
}

#[test]
fn test_victim_tiebreak_prefers_smaller_trid() {
    let (mut db, mut recovery, _dir) = setup();
    let mut locks = LockManager::new(1.0, 0, 7);

    recovery.log_start(1).unwrap();
    recovery.log_start(2).unwrap();
    build_deadlock(&mut locks);

    let mut active = active_with(&[(1, 2), (2, 2)]);
    locks
        .detect_deadlock(&mut active, &mut recovery, &mut db, 0)
        .unwrap();

    assert!(!active.contains_key(&1), "tie must fall to the smaller trid");
    assert!(active.contains_key(&2));
}

#[test]
fn test_deadlock_without_rollback_marks_blocked() {
    let (mut db, mut recovery, _dir) = setup();
    let mut locks = LockManager::new(0.0, 3, 7);

    build_deadlock(&mut locks);

    let mut active = active_with(&[(1, 1), (2, 3)]);
    let detected = locks
        .detect_deadlock(&mut active, &mut recovery, &mut db, 10)
        .unwrap();

    assert!(detected);
    assert_eq!(locks.blocked_at(1), Some(10));
    assert!(active.contains_key(&1), "marked victim stays active until timeout");

    // A later detection pass must not refresh the mark
    locks
        .detect_deadlock(&mut active, &mut recovery, &mut db, 12)
        .unwrap();
    assert_eq!(locks.blocked_at(1), Some(10));
}

#[test]
fn test_timeout_rolls_back_marked_victim() {
    let (mut db, mut recovery, _dir) = setup();
    let mut locks = LockManager::new(0.0, 3, 7);

    recovery.log_start(1).unwrap();
    recovery.log_start(2).unwrap();
    build_deadlock(&mut locks);

    let mut active = active_with(&[(1, 1), (2, 3)]);
    locks
        .detect_deadlock(&mut active, &mut recovery, &mut db, 10)
        .unwrap();
    assert_eq!(locks.blocked_at(1), Some(10));

    // Within the timeout nothing happens
    locks
        .check_timeouts(&mut active, &mut recovery, &mut db, 13)
        .unwrap();
    assert!(active.contains_key(&1));

    // One cycle past the timeout the victim is rolled back
    locks
        .check_timeouts(&mut active, &mut recovery, &mut db, 14)
        .unwrap();
    assert!(!active.contains_key(&1));
    assert!(locks.blocked_at(1).is_none());
    assert!(locks.locks_held_by(1).is_none());
}

#[test]
fn test_no_deadlock_without_cycle() {
    let (mut db, mut recovery, _dir) = setup();
    let mut locks = LockManager::new(1.0, 0, 7);

    assert!(locks.acquire(1, 0, LockMode::Exclusive));
    assert!(!locks.acquire(2, 0, LockMode::Shared));

    let mut active = active_with(&[(1, 1), (2, 1)]);
    let detected = locks
        .detect_deadlock(&mut active, &mut recovery, &mut db, 0)
        .unwrap();

    assert!(!detected);
    assert_eq!(active.len(), 2);
}

#[test]
fn test_inactive_victim_skips_resolution() {
    let (mut db, mut recovery, _dir) = setup();
    let mut locks = LockManager::new(1.0, 0, 7);

    build_deadlock(&mut locks);

    // Neither cycle member is in the active table
    let mut active = active_with(&[(5, 0)]);
    let detected = locks
        .detect_deadlock(&mut active, &mut recovery, &mut db, 0)
        .unwrap();

    assert!(detected, "the cycle is still reported");
    assert!(active.contains_key(&5));
    assert!(locks.holders(0).unwrap().find(1).is_some(), "no rollback happened");
}

#[test]
fn test_close_clears_state() {
    let mut locks = LockManager::new(0.0, 0, 7);

    assert!(locks.acquire(1, 0, LockMode::Shared));
    assert!(!locks.acquire(2, 0, LockMode::Exclusive));
    locks.close();

    assert!(locks.holders(0).is_none());
    assert!(locks.waiting_on(2).is_none());
    assert!(locks.locks_held_by(1).is_none());
}
