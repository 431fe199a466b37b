pub mod inmemory_storage;
pub mod utils;

pub use inmemory_storage::MemStorage;

use crate::{
    eraftpb::{Entry, HardState, Snapshot},
    error::Result,
};

/// Read side of the durable log, consulted by `RaftLog` for everything older
/// than its resident window.
///
/// Indices that predate retained history must fail with
/// `StorageError::Compacted`; indices the backend does not hold (yet) must fail
/// with `StorageError::Unavailable`.
pub trait Storage {
    /// Hard state recovered at startup.
    fn initial_state(&self) -> Result<HardState>;

    /// Entries in `[low, high)`, cut down to `max_size` bytes (at least one
    /// entry is always returned when the range is not empty).
    fn entries(&self, low: u64, high: u64, max_size: Option<u64>) -> Result<Vec<Entry>>;

    fn term(&self, idx: u64) -> Result<u64>;

    /// Index of the first retained entry. When every entry has been compacted
    /// this is one past the compaction point.
    fn first_index(&self) -> Result<u64>;

    fn last_index(&self) -> Result<u64>;

    fn snapshot(&self, request_index: u64) -> Result<Snapshot>;
}

/// Write side of the durable log, driven by the consensus loop.
pub trait LogStore: Storage {
    fn append(&mut self, entries: &[Entry]) -> Result<()>;
    fn hard_state(&self) -> Result<HardState>;
    fn set_hard_state(&mut self, hard_state: &HardState) -> Result<()>;
    fn set_hard_state_commit(&mut self, commit: u64) -> Result<()>;
    fn create_snapshot(&mut self, index: u64, data: Vec<u8>) -> Result<Snapshot>;
    fn apply_snapshot(&mut self, snapshot: Snapshot) -> Result<()>;
    /// Discards every entry before `index`.
    fn compact(&mut self, index: u64) -> Result<()>;
    fn all_entries(&self) -> Result<Vec<Entry>>;
}
