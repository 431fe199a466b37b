use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use raftlog::{
    build_logger, Config, Entry, Error, LogStore, Logger, MemStorage, RaftLog, Slogger,
    Snapshot, SnapshotMetadata, Storage, StorageError,
};

fn new_logger() -> Arc<dyn Logger> {
    Arc::new(Slogger::discard())
}

fn new_entry(index: u64, term: u64) -> Entry {
    Entry::new(index, term, format!("{}@{}", index, term).into_bytes())
}

fn batch(lo: u64, hi: u64, term: u64) -> Vec<Entry> {
    (lo..=hi).map(|i| new_entry(i, term)).collect()
}

fn check_invariants(log: &RaftLog<MemStorage>) {
    assert!(
        log.applied() <= log.committed(),
        "applied({}) > committed({})",
        log.applied(),
        log.committed()
    );
    assert!(
        log.committed() <= log.last_index(),
        "committed({}) > lastIndex({})",
        log.committed(),
        log.last_index()
    );
    assert!(log.stabled() <= log.last_index());

    let resident = log.resident_entries();
    if let Some(first) = resident.first() {
        assert_eq!(first.index, log.snap_index() + 1);
        for (k, e) in resident.iter().enumerate() {
            assert_eq!(e.index, first.index + k as u64);
        }
    }
}

/// Minimal driving loop around a log and the storage handle it reads from.
struct Replica {
    log: RaftLog<MemStorage>,
    storage: MemStorage,
    applied: Vec<Entry>,
}

impl Replica {
    fn new(config: &Config) -> Self {
        let storage = MemStorage::create(new_logger());
        let log = RaftLog::with_config(storage.clone(), config, new_logger()).unwrap();
        Self {
            log,
            storage,
            applied: vec![],
        }
    }

    fn persist(&mut self) {
        let unstable = self.log.unstable_entries().to_vec();
        if let Some(last) = unstable.last() {
            self.storage.append(&unstable).unwrap();
            self.log.stable_to(last.index, last.term);
        }
    }

    fn commit(&mut self, commit: u64) {
        self.log.commit_to(commit);
        self.storage.set_hard_state_commit(self.log.committed()).unwrap();
    }

    fn apply(&mut self) {
        loop {
            let ents = self.log.next_entries().to_vec();
            let last = match ents.last() {
                Some(e) => e.index,
                None => break,
            };
            self.applied.extend(ents);
            self.log.applied_to(last);
        }
    }

    fn compact(&mut self, index: u64) {
        self.storage.create_snapshot(index - 1, vec![]).unwrap();
        self.storage.compact(index).unwrap();
        self.log.maybe_compact();
    }
}

#[test]
fn test_replica_lifecycle_keeps_invariants() {
    let mut r = Replica::new(&Config::default());
    check_invariants(&r.log);
    let mut snap_index = r.log.snap_index();

    let mut step = |r: &mut Replica, name: &str| {
        check_invariants(&r.log);
        assert!(
            r.log.snap_index() >= snap_index,
            "{}: snapIndex moved back from {} to {}",
            name,
            snap_index,
            r.log.snap_index()
        );
        snap_index = r.log.snap_index();
    };

    r.log.append(&batch(1, 3, 1));
    step(&mut r, "append");
    assert_eq!(r.log.unstable_entries().len(), 3);

    r.persist();
    r.commit(2);
    r.apply();
    step(&mut r, "apply");
    assert_eq!(r.log.applied(), 2);
    assert_eq!(r.log.stabled(), 3);

    // A new leader overwrites the uncommitted tail.
    r.log.append(&batch(3, 5, 2));
    step(&mut r, "overwrite");
    assert_eq!(r.log.stabled(), 2);
    assert_eq!(r.log.unstable_entries(), batch(3, 5, 2).as_slice());

    r.persist();
    r.commit(5);
    r.apply();
    step(&mut r, "apply after overwrite");
    assert_eq!(r.log.stabled(), 5);
    assert_eq!(r.log.applied(), 5);
    assert_eq!(r.storage.all_entries().unwrap(), {
        let mut ents = batch(1, 2, 1);
        ents.extend(batch(3, 5, 2));
        ents
    });

    r.compact(4);
    step(&mut r, "compact");
    assert_eq!(r.log.first_index(), 4);
    assert_eq!(r.log.term(3), Ok(2));
    assert_eq!(r.log.term(2), Err(Error::Store(StorageError::Compacted)));

    // Far behind the leader: catch up through a snapshot.
    let meta = SnapshotMetadata::new(10, 3);
    r.log.restore(meta);
    step(&mut r, "restore");
    assert_eq!(r.log.last_index(), 10);
    assert_eq!(r.log.term(7), Err(Error::Store(StorageError::Compacted)));

    r.storage
        .apply_snapshot(Snapshot::new(meta.index, meta.term, vec![]))
        .unwrap();
    r.log.stable_snap_to(meta.index);
    r.log.applied_to(meta.index);
    r.log.maybe_compact();
    step(&mut r, "snapshot installed");
    assert!(r.log.pending_snapshot().is_none());
    assert_eq!(r.log.term(10), Ok(3));

    r.log.append(&batch(11, 12, 3));
    r.persist();
    r.commit(12);
    r.apply();
    step(&mut r, "append after snapshot");
    assert_eq!(r.log.applied(), 12);
    assert_eq!(r.log.last_term(), 3);

    let applied: Vec<u64> = r.applied.iter().map(|e| e.index).collect();
    assert_eq!(applied, vec![1, 2, 3, 4, 5, 11, 12]);
}

#[test]
fn test_find_entries_round_trip() {
    let mut r = Replica::new(&Config::default());
    r.log.append(&batch(1, 4, 1));
    r.persist();
    r.log.append(&batch(5, 8, 1));

    // 1..4 come from storage, 5..8 from the window.
    let ents = r.log.find_entries(1, 9).unwrap();
    assert_eq!(ents.len(), 8);
    assert_eq!(ents, batch(1, 8, 1));
    assert!(ents.windows(2).all(|w| w[0].index + 1 == w[1].index));

    let ents = r.log.find_entries(3, 7).unwrap();
    assert_eq!(ents.len(), 4);
    assert_eq!(ents, batch(3, 6, 1));
}

#[test]
fn test_append_same_batch_twice() {
    let mut once = Replica::new(&Config::default());
    let mut twice = Replica::new(&Config::default());
    for r in [&mut once, &mut twice] {
        r.log.append(&batch(1, 5, 1));
        r.persist();
        r.commit(3);
    }

    let ents = batch(4, 7, 2);
    once.log.append(&ents);
    twice.log.append(&ents);
    twice.log.append(&ents);

    assert_eq!(once.log.status(), twice.log.status());
    assert_eq!(once.log.resident_entries(), twice.log.resident_entries());
}

#[test]
fn test_fatal_path_is_observable() {
    let mut r = Replica::new(&Config::default());
    r.log.append(&batch(1, 3, 1));
    r.commit(2);

    let res = panic::catch_unwind(AssertUnwindSafe(|| r.log.applied_to(3)));
    let payload = res.unwrap_err();
    let msg = payload
        .downcast_ref::<String>()
        .cloned()
        .unwrap_or_default();
    assert!(msg.contains("applied(3) is out of range"), "{}", msg);
}

#[test]
fn test_overwriting_applied_entries_is_fatal() {
    let mut r = Replica::new(&Config::default());
    r.log.append(&batch(1, 5, 1));
    r.persist();
    r.commit(5);
    r.apply();
    assert_eq!(r.log.applied(), 5);

    let res = panic::catch_unwind(AssertUnwindSafe(|| r.log.append(&[new_entry(3, 9)])));
    assert!(res.is_err());

    // Nothing was touched before the breach was reported.
    check_invariants(&r.log);
    assert_eq!(r.log.applied(), 5);
    assert_eq!(r.log.committed(), 5);
    assert_eq!(r.log.term(3), Ok(1));
    assert_eq!(r.applied, batch(1, 5, 1));
}

#[test]
fn test_catch_up_query_after_far_snapshot() {
    let mut r = Replica::new(&Config::default());
    r.log.append(&batch(1, 3, 1));
    r.persist();
    r.commit(3);

    r.log.restore(SnapshotMetadata::new(1 << 40, 5));
    check_invariants(&r.log);
    assert_eq!(
        r.log.entries_since(0),
        Err(Error::Store(StorageError::Compacted))
    );
}

#[test]
fn test_recover_from_storage_with_toml_config() {
    let config = Config::from_toml_str(
        r#"
        applied = 3
        max_committed_size_per_ready = 1
        log_level = "debug"
        log_destination = "discard"
        "#,
    )
    .unwrap();

    let mut storage = MemStorage::create(new_logger());
    storage.append(&batch(1, 6, 1)).unwrap();
    storage.set_hard_state_commit(5).unwrap();

    let logger: Arc<dyn Logger> = Arc::new(Slogger::new(build_logger(&config).unwrap()));
    let mut log = RaftLog::with_config(storage, &config, logger).unwrap();
    assert_eq!(log.applied(), 3);
    assert_eq!(log.committed(), 5);
    assert_eq!(log.stabled(), 6);

    // One entry per batch.
    assert_eq!(log.next_entries(), &[new_entry(4, 1)]);
    log.applied_to(4);
    assert_eq!(log.next_entries(), &[new_entry(5, 1)]);
    log.applied_to(5);
    assert!(!log.has_next_entries());

    assert_eq!(log.entries_since(2), Ok(batch(3, 5, 1)));
    assert!(!log.has_entries_since(5));
    assert_eq!(log.store().last_index(), Ok(6));
}
