use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::{cmp::max, sync::Arc};

use super::{utils::limit_size, LogStore, Storage};
use crate::{
    eraftpb::{Entry, HardState, Snapshot, SnapshotMetadata},
    error::{Result, StorageError},
    logger::Logger,
};

/// In-memory reference backend. Clones share the same underlying log, so a
/// driver can keep a handle for compaction while `RaftLog` reads through
/// another.
#[derive(Clone)]
pub struct MemStorage(Arc<RwLock<MemStorageCore>>);

impl MemStorage {
    pub fn create(logger: Arc<dyn Logger>) -> Self {
        logger.trace("Used MemStorage");
        Self(Arc::new(RwLock::new(MemStorageCore::new(logger))))
    }

    fn wl(&mut self) -> RwLockWriteGuard<MemStorageCore> {
        self.0.write()
    }

    fn rl(&self) -> RwLockReadGuard<MemStorageCore> {
        self.0.read()
    }
}

impl LogStore for MemStorage {
    fn append(&mut self, entries: &[Entry]) -> Result<()> {
        self.wl().append(entries);
        Ok(())
    }

    fn hard_state(&self) -> Result<HardState> {
        Ok(self.rl().hard_state)
    }

    fn set_hard_state(&mut self, hard_state: &HardState) -> Result<()> {
        self.wl().hard_state = *hard_state;
        Ok(())
    }

    fn set_hard_state_commit(&mut self, commit: u64) -> Result<()> {
        self.wl().hard_state.set_commit(commit);
        Ok(())
    }

    fn create_snapshot(&mut self, index: u64, data: Vec<u8>) -> Result<Snapshot> {
        self.wl().create_snapshot(index, data)
    }

    fn apply_snapshot(&mut self, snapshot: Snapshot) -> Result<()> {
        self.wl().apply_snapshot(snapshot)
    }

    fn compact(&mut self, index: u64) -> Result<()> {
        self.wl().compact(index);
        Ok(())
    }

    fn all_entries(&self) -> Result<Vec<Entry>> {
        Ok(self.rl().entries.clone())
    }
}

impl Storage for MemStorage {
    fn initial_state(&self) -> Result<HardState> {
        Ok(self.rl().hard_state)
    }

    fn entries(&self, low: u64, high: u64, max_size: Option<u64>) -> Result<Vec<Entry>> {
        self.rl().entries(low, high, max_size)
    }

    fn term(&self, idx: u64) -> Result<u64> {
        self.rl().term(idx)
    }

    fn first_index(&self) -> Result<u64> {
        Ok(self.rl().first_index())
    }

    fn last_index(&self) -> Result<u64> {
        Ok(self.rl().last_index())
    }

    fn snapshot(&self, request_index: u64) -> Result<Snapshot> {
        let store = self.rl();
        if store.snapshot.get_metadata().index < request_index {
            return Err(StorageError::SnapshotTemporarilyUnavailable.into());
        }
        Ok(store.snapshot.clone())
    }
}

pub struct MemStorageCore {
    hard_state: HardState,
    // Index and term of the last discarded entry.
    boundary: SnapshotMetadata,
    entries: Vec<Entry>,
    snapshot: Snapshot,
    logger: Arc<dyn Logger>,
}

impl MemStorageCore {
    fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            hard_state: HardState::default(),
            boundary: SnapshotMetadata::default(),
            entries: Vec::new(),
            snapshot: Snapshot::default(),
            logger,
        }
    }

    fn first_index(&self) -> u64 {
        self.boundary.index + 1
    }

    fn last_index(&self) -> u64 {
        self.boundary.index + self.entries.len() as u64
    }

    fn term(&self, idx: u64) -> Result<u64> {
        if idx == self.boundary.index {
            return Ok(self.boundary.term);
        }
        if idx < self.boundary.index {
            return Err(StorageError::Compacted.into());
        }
        if idx > self.last_index() {
            return Err(StorageError::Unavailable.into());
        }
        Ok(self.entries[(idx - self.first_index()) as usize].term)
    }

    fn entries(&self, low: u64, high: u64, max_size: Option<u64>) -> Result<Vec<Entry>> {
        self.logger
            .trace(format!("Entries [{low}, {high}) requested.", low = low, high = high).as_str());

        if low < self.first_index() {
            return Err(StorageError::Compacted.into());
        }
        if high > self.last_index() + 1 {
            return Err(StorageError::Unavailable.into());
        }
        if low >= high {
            return Ok(Vec::new());
        }

        let offset = self.first_index();
        let mut entries = self.entries[(low - offset) as usize..(high - offset) as usize].to_vec();
        limit_size(&mut entries, max_size);
        Ok(entries)
    }

    fn append(&mut self, entries: &[Entry]) {
        if entries.is_empty() {
            return;
        }

        let first_index = self.first_index();
        if first_index > entries[0].index {
            self.logger.fatal(&format!(
                "overwrite compacted raft logs, compacted: {}, append: {}",
                first_index - 1,
                entries[0].index,
            ));
        }

        let last_index = self.last_index();
        if last_index + 1 < entries[0].index {
            self.logger.fatal(&format!(
                "raft logs should be continuous, last index: {}, new appended: {}",
                last_index, entries[0].index,
            ));
        }

        // Conflicting suffix is overwritten.
        self.entries.truncate((entries[0].index - first_index) as usize);
        self.entries.extend_from_slice(entries);
    }

    fn compact(&mut self, compact_index: u64) {
        if compact_index <= self.first_index() {
            return;
        }

        let last_index = self.last_index();
        if compact_index > last_index + 1 {
            self.logger.fatal(&format!(
                "compact not received raft logs: {}, last index: {}",
                compact_index, last_index
            ));
        }

        let drained = (compact_index - self.first_index()) as usize;
        let last_dropped = &self.entries[drained - 1];
        self.boundary = SnapshotMetadata::new(last_dropped.index, last_dropped.term);
        self.entries.drain(..drained);

        self.logger.debug(&format!(
            "Compacted raft logs before {}, first index is now {}",
            compact_index,
            self.first_index()
        ));
    }

    fn create_snapshot(&mut self, index: u64, data: Vec<u8>) -> Result<Snapshot> {
        if index <= self.snapshot.get_metadata().index {
            return Err(StorageError::SnapshotOutOfDate.into());
        }

        let term = self.term(index)?;
        self.snapshot = Snapshot::new(index, term, data);
        Ok(self.snapshot.clone())
    }

    fn apply_snapshot(&mut self, snapshot: Snapshot) -> Result<()> {
        let metadata = snapshot.get_metadata();

        if self.first_index() > metadata.index {
            return Err(StorageError::SnapshotOutOfDate.into());
        }

        self.hard_state.set_term(max(self.hard_state.term, metadata.term));
        self.hard_state.set_commit(metadata.index);

        self.entries.clear();
        self.boundary = metadata;
        self.snapshot = snapshot;

        self.logger.info(&format!(
            "Applied snapshot at index {}, term {}",
            metadata.index, metadata.term
        ));
        Ok(())
    }
}
