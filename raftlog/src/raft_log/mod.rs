mod window;

pub use window::EntryWindow;

use serde::Serialize;
use std::{
    cmp::{max, min},
    fmt,
    sync::Arc,
};

use crate::{
    config::Config,
    eraftpb::{Entry, SnapshotMetadata},
    error::{Error, Result, StorageError},
    logger::Logger,
    storage::{utils::limited_len, Storage},
};

/// Log of a single replica, split between `store` and a resident window.
///
/// ```text
///  snapshot/first.....applied....committed....stabled.....last
///  --------|------------------------------------------------|
///                            log entries
/// ```
///
/// Entries above `stabled` exist only in the window and must be handed to the
/// driver for persistence (`unstable_entries`). Entries at or below `stabled`
/// may still be resident; they are dropped once `store` compacts them
/// (`maybe_compact`).
///
/// `RaftLog` is not thread-safe. A multi-threaded driver has to wrap the whole
/// value in a single lock, because the watermarks are only consistent as a set.
pub struct RaftLog<T: Storage> {
    store: T,
    window: EntryWindow,

    /// Highest index known to be replicated on a quorum.
    committed: u64,
    /// Highest index handed to the state machine.
    /// Invariant: applied <= committed
    applied: u64,
    /// Highest index persisted to `store`.
    stabled: u64,

    /// Received snapshot not yet reflected by `store`.
    pending_snapshot: Option<SnapshotMetadata>,

    max_next_ents_size: u64,
    logger: Arc<dyn Logger>,
}

/// Point-in-time summary of the watermarks of a `RaftLog`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LogStatus {
    pub first_index: u64,
    pub last_index: u64,
    pub snap_index: u64,
    pub applied: u64,
    pub committed: u64,
    pub stabled: u64,
    pub pending_snapshot: Option<u64>,
    pub resident: usize,
}

impl<T: Storage> RaftLog<T> {
    pub fn new(store: T, logger: Arc<dyn Logger>) -> Result<Self> {
        Self::with_config(store, &Config::default(), logger)
    }

    /// Recovers the log from `store`: `committed` comes from the persisted hard
    /// state, every retained entry is loaded as resident and already stable,
    /// and `applied` starts right before the first retained entry (or at
    /// `config.applied` when set).
    pub fn with_config(store: T, config: &Config, logger: Arc<dyn Logger>) -> Result<Self> {
        config.validate()?;

        let hard_state = store.initial_state()?;
        let first_index = store.first_index().unwrap_or(1);
        let last_index = store.last_index().unwrap_or(0);

        let entries = if last_index >= first_index {
            store.entries(first_index, last_index + 1, None)?
        } else {
            Vec::new()
        };

        let mut log = RaftLog {
            store,
            window: EntryWindow::new(first_index, entries),
            committed: hard_state.commit,
            applied: first_index.saturating_sub(1),
            stabled: last_index,
            pending_snapshot: None,
            max_next_ents_size: config.max_committed_size_per_ready,
            logger,
        };

        if log.committed > log.last_index() {
            log.logger.fatal(&format!(
                "committed({}) is out of range [lastIndex({})], storage is corrupted",
                log.committed,
                log.last_index()
            ));
        }

        if config.applied > 0 {
            log.applied_to(config.applied);
        }

        log.logger.debug(&format!("RaftLog recovered. {}", log));
        Ok(log)
    }

    pub fn store(&self) -> &T {
        &self.store
    }

    pub fn mut_store(&mut self) -> &mut T {
        &mut self.store
    }

    pub fn committed(&self) -> u64 {
        self.committed
    }

    pub fn applied(&self) -> u64 {
        self.applied
    }

    pub fn stabled(&self) -> u64 {
        self.stabled
    }

    /// Index immediately preceding the first resident slot.
    pub fn snap_index(&self) -> u64 {
        self.window.offset().saturating_sub(1)
    }

    pub fn pending_snapshot(&self) -> Option<&SnapshotMetadata> {
        self.pending_snapshot.as_ref()
    }

    pub fn resident_entries(&self) -> &[Entry] {
        self.window.entries()
    }

    fn storage_first_index(&self) -> u64 {
        match self.store.first_index() {
            Ok(index) => index,
            Err(e) => self
                .logger
                .fatal(&format!("failed to read first index from storage: {:?}", e)),
        }
    }

    fn storage_last_index(&self) -> u64 {
        match self.store.last_index() {
            Ok(index) => index,
            Err(e) => self
                .logger
                .fatal(&format!("failed to read last index from storage: {:?}", e)),
        }
    }

    /// Drops the resident entries `store` has compacted away since the last
    /// call.
    pub fn maybe_compact(&mut self) {
        let first_index = self.storage_first_index();
        let prev_offset = self.window.offset();
        if self.window.compact_to(first_index) {
            self.logger.debug(&format!(
                "Resident entries compacted from {} to {}, {} entries left",
                prev_offset,
                first_index,
                self.window.len()
            ));
        }
    }

    /// Lowest index still resident. With an empty window this is
    /// `store.first_index() - 1`, which must not be read.
    pub fn first_index(&self) -> u64 {
        match self.window.first_index() {
            Some(index) => index,
            None => self.storage_first_index().saturating_sub(1),
        }
    }

    pub fn last_index(&self) -> u64 {
        let last = match self.window.last_index() {
            Some(index) => index,
            None => self.storage_last_index(),
        };
        match self.pending_snapshot {
            Some(meta) => max(last, meta.index),
            None => last,
        }
    }

    pub fn last_term(&self) -> u64 {
        let last_index = self.last_index();
        if last_index == 0 {
            return 0;
        }
        match self.term(last_index) {
            Ok(term) => term,
            Err(e) => self.logger.fatal(&format!(
                "unexpected error when getting the last term at {}: {:?}",
                last_index, e
            )),
        }
    }

    pub fn term(&self, idx: u64) -> Result<u64> {
        let last_index = self.last_index();
        if idx > last_index {
            return Err(Error::OutOfRange {
                index: idx,
                last_index,
            });
        }

        if let Some(entry) = self.window.get(idx) {
            return Ok(entry.term);
        }

        if let Some(meta) = self.pending_snapshot {
            if meta.index == idx {
                return Ok(meta.term);
            }
        }

        match self.store.term(idx) {
            Err(Error::Store(StorageError::Unavailable)) => match self.pending_snapshot {
                Some(meta) if idx < meta.index => Err(Error::Store(StorageError::Compacted)),
                _ => Err(Error::Store(StorageError::Unavailable)),
            },
            res => res,
        }
    }

    pub fn match_term(&self, idx: u64, term: u64) -> bool {
        self.term(idx).map(|t| t == term).unwrap_or(false)
    }

    /// Whether a log ending at `(last_index, term)` is at least as up-to-date
    /// as this one.
    pub fn is_up_to_date(&self, last_index: u64, term: u64) -> bool {
        let last_term = self.last_term();
        term > last_term || (term == last_term && last_index >= self.last_index())
    }

    /// Resident entries not yet persisted, i.e. with index above `stabled`.
    /// Empty unless the entry right after `stabled` is resident.
    pub fn unstable_entries(&self) -> &[Entry] {
        self.window
            .slice(self.stabled + 1, self.window.end())
            .unwrap_or(&[])
    }

    /// Committed but not yet applied entries, capped at
    /// `max_committed_size_per_ready` bytes. Empty unless the entry right
    /// after `applied` is resident.
    pub fn next_entries(&self) -> &[Entry] {
        let lo = self.applied + 1;
        let hi = min(self.committed + 1, self.window.end());
        if lo >= hi {
            return &[];
        }

        match self.window.slice(lo, hi) {
            Some(ents) => &ents[..limited_len(ents, Some(self.max_next_ents_size))],
            None => &[],
        }
    }

    pub fn has_next_entries(&self) -> bool {
        !self.next_entries().is_empty()
    }

    /// Entries in `[lo, hi)`: the part at or below `stabled` is read from
    /// `store`, the rest from the window.
    pub fn find_entries(&self, lo: u64, hi: u64) -> Result<Vec<Entry>> {
        if lo > hi {
            self.logger.fatal(&format!("invalid slice {} > {}", lo, hi));
        }

        let last_index = self.last_index();
        if hi > last_index + 1 {
            return Err(Error::OutOfRange {
                index: hi - 1,
                last_index,
            });
        }
        if lo == hi {
            return Ok(Vec::new());
        }

        let mut ents = Vec::new();

        if lo <= self.stabled {
            let stable_hi = min(hi, self.stabled + 1);
            match self.store.entries(lo, stable_hi, None) {
                Ok(stable_ents) => ents.extend(stable_ents),
                Err(Error::Store(StorageError::Unavailable))
                    if self.pending_snapshot.is_some_and(|meta| lo <= meta.index) =>
                {
                    return Err(Error::Store(StorageError::Compacted));
                }
                Err(e) => return Err(e),
            }
        }

        if hi > self.stabled + 1 {
            let unstable_lo = max(self.stabled + 1, lo);
            match self.window.slice(unstable_lo, hi) {
                Some(unstable) => ents.extend_from_slice(unstable),
                None => {
                    self.logger.warn(&format!(
                        "Unstable entries [{}, {}) are not resident, window is [{}, {})",
                        unstable_lo,
                        hi,
                        self.window.offset(),
                        self.window.end()
                    ));
                    return Err(Error::Store(StorageError::Unavailable));
                }
            }
        }

        Ok(ents)
    }

    /// Appends a contiguous batch, overwriting whatever is resident from its
    /// first index on, and returns the new last index.
    ///
    /// Replaying a batch that matches the resident entries leaves the log
    /// unchanged. Overwritten entries are no longer considered stable.
    /// Committed entries may be replayed but never replaced or dropped.
    pub fn append(&mut self, ents: &[Entry]) -> u64 {
        let start = match ents.first() {
            Some(e) => e.index,
            None => return self.last_index(),
        };

        if start == 0 {
            self.logger.fatal("index 0 is reserved and cannot hold an entry");
        }

        if let Some((k, e)) = ents
            .iter()
            .enumerate()
            .find(|(k, e)| e.index != start + *k as u64)
        {
            self.logger.fatal(&format!(
                "raft logs should be continuous, expected index {} at position {}, got {}",
                start + k as u64,
                k,
                e.index
            ));
        }

        let last_index = self.last_index();
        let window_end = if self.window.is_empty() {
            last_index + 1
        } else {
            self.window.end()
        };
        if start > min(last_index + 1, window_end) {
            self.logger.fatal(&format!(
                "raft logs should be continuous, last index: {}, new appended: {}",
                last_index, start
            ));
        }

        if start <= self.committed {
            let batch_last = start + ents.len() as u64 - 1;
            if batch_last < self.committed {
                self.logger.fatal(&format!(
                    "entries [{}, {}] would truncate committed entries, committed({})",
                    start, batch_last, self.committed
                ));
            }
            if let Some(e) = ents
                .iter()
                .take_while(|e| e.index <= self.committed)
                .find(|e| !self.match_term(e.index, e.term))
            {
                self.logger.fatal(&format!(
                    "entry {} at term {} conflicts with committed({})",
                    e.index, e.term, self.committed
                ));
            }
        }

        self.stabled = min(self.stabled, start - 1);
        self.window.truncate_and_append(ents);

        let last_index = self.last_index();

        self.logger.debug(&format!(
            "Appended entries [{}, {}], stabled({}), lastIndex({})",
            start,
            start + ents.len() as u64 - 1,
            self.stabled,
            last_index
        ));
        last_index
    }

    /// Raises `committed` to `commit` when it is an advance within the known
    /// log. Returns whether it moved.
    pub fn commit_to(&mut self, commit: u64) -> bool {
        if commit <= self.committed {
            return false;
        }

        let last_index = self.last_index();
        if commit > last_index {
            self.logger.debug(&format!(
                "Ignored commit to {} beyond lastIndex({})",
                commit, last_index
            ));
            return false;
        }

        self.committed = commit;
        self.logger.debug(&format!("Committed to {}", commit));
        true
    }

    /// Records that the state machine has applied everything up to `idx`.
    ///
    /// `idx == 0` is ignored. Any other value outside `[applied, committed]`
    /// means the apply pipeline is out of step with consensus and is fatal.
    pub fn applied_to(&mut self, idx: u64) {
        if idx == 0 {
            return;
        }
        if self.committed < idx || idx < self.applied {
            self.logger.fatal(&format!(
                "applied({}) is out of range [prevApplied({}), committed({})]",
                idx, self.applied, self.committed
            ));
        }
        self.applied = idx;
    }

    /// Records that entries up to `(idx, term)` have been persisted. Stale or
    /// mismatching acknowledgements are ignored.
    pub fn stable_to(&mut self, idx: u64, term: u64) {
        if idx <= self.stabled {
            return;
        }
        if self.match_term(idx, term) {
            self.stabled = idx;
            self.logger.debug(&format!("Stabled to {}", idx));
        } else {
            self.logger.debug(&format!(
                "Ignored stale stable acknowledgement ({}, {})",
                idx, term
            ));
        }
    }

    /// Takes a received snapshot as the new base of the log. Everything
    /// resident is dropped and the log continues right after the snapshot.
    pub fn restore(&mut self, meta: SnapshotMetadata) {
        if meta.index < self.committed {
            self.logger.fatal(&format!(
                "snapshot index({}) is behind committed({})",
                meta.index, self.committed
            ));
        }

        self.logger.info(&format!(
            "Restoring log from snapshot at index {}, term {}",
            meta.index, meta.term
        ));
        self.committed = meta.index;
        self.stabled = meta.index;
        self.window.reset(meta.index + 1);
        self.pending_snapshot = Some(meta);
    }

    /// Clears the pending snapshot once `store` has installed it.
    pub fn stable_snap_to(&mut self, idx: u64) {
        match self.pending_snapshot {
            Some(meta) if meta.index == idx => {
                self.pending_snapshot = None;
                self.logger.debug(&format!("Snapshot at {} is stable", idx));
            }
            _ => {}
        }
    }

    // `index` is expected to be a known index. Anything past the last index
    // has nothing after it, and is reported rather than wrapped around.
    fn since_range(&self, index: u64) -> Option<(u64, u64)> {
        let last_index = self.last_index();
        if index > last_index {
            self.logger.warn(&format!(
                "Entries since {} requested beyond lastIndex({})",
                index, last_index
            ));
            return None;
        }

        let lo = max(index.saturating_add(1), self.storage_first_index());
        let hi = self.committed + 1;
        (hi > lo).then_some((lo, hi))
    }

    /// Whether committed entries exist after `index`, clamped to the oldest
    /// retained entry.
    pub fn has_entries_since(&self, index: u64) -> bool {
        self.since_range(index).is_some()
    }

    pub fn entries_since(&self, index: u64) -> Result<Vec<Entry>> {
        match self.since_range(index) {
            Some((lo, hi)) => self.find_entries(lo, hi),
            None => Ok(Vec::new()),
        }
    }

    pub fn status(&self) -> LogStatus {
        LogStatus {
            first_index: self.first_index(),
            last_index: self.last_index(),
            snap_index: self.snap_index(),
            applied: self.applied,
            committed: self.committed,
            stabled: self.stabled,
            pending_snapshot: self.pending_snapshot.map(|meta| meta.index),
            resident: self.window.len(),
        }
    }
}

impl<T: Storage> fmt::Display for RaftLog<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = serde_json::to_string(&self.status()).map_err(|_| fmt::Error)?;
        write!(f, "{}", status)
    }
}
