use prost::Message;

/// A single record of the replicated log.
#[derive(Clone, PartialEq, Eq, Message)]
pub struct Entry {
    #[prost(uint64, tag = "1")]
    pub term: u64,
    #[prost(uint64, tag = "2")]
    pub index: u64,
    #[prost(bytes = "vec", tag = "3")]
    pub data: Vec<u8>,
}

impl Entry {
    pub fn new(index: u64, term: u64, data: Vec<u8>) -> Self {
        Self {
            term,
            index,
            data,
        }
    }
}

/// Persisted election and commit state of a replica.
#[derive(Clone, Copy, PartialEq, Eq, Message)]
pub struct HardState {
    #[prost(uint64, tag = "1")]
    pub term: u64,
    #[prost(uint64, tag = "2")]
    pub vote: u64,
    #[prost(uint64, tag = "3")]
    pub commit: u64,
}

impl HardState {
    pub fn set_commit(&mut self, commit: u64) {
        self.commit = commit;
    }

    pub fn set_term(&mut self, term: u64) {
        self.term = term;
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Message)]
pub struct SnapshotMetadata {
    #[prost(uint64, tag = "1")]
    pub index: u64,
    #[prost(uint64, tag = "2")]
    pub term: u64,
}

impl SnapshotMetadata {
    pub fn new(index: u64, term: u64) -> Self {
        Self { index, term }
    }
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct Snapshot {
    #[prost(bytes = "vec", tag = "1")]
    pub data: Vec<u8>,
    #[prost(message, optional, tag = "2")]
    pub metadata: Option<SnapshotMetadata>,
}

impl Snapshot {
    pub fn new(index: u64, term: u64, data: Vec<u8>) -> Self {
        Self {
            data,
            metadata: Some(SnapshotMetadata::new(index, term)),
        }
    }

    pub fn get_metadata(&self) -> SnapshotMetadata {
        self.metadata.unwrap_or_default()
    }

    /// A snapshot at index 0 carries no state and is treated as absent.
    pub fn is_empty(&self) -> bool {
        self.get_metadata().index == 0
    }
}
