use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("Storage error: `{0}`")]
    Store(#[from] StorageError),
    #[error("Index {index} is out of range [last index {last_index}]")]
    OutOfRange { index: u64, last_index: u64 },

    #[error("Invalid config: `{0}`")]
    ConfigInvalid(String),
    #[error("Failed to build logger: `{0}`")]
    LoggerInit(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unexpected error")]
    Other(#[source] Box<dyn std::error::Error + Sync + Send + 'static>),
}

impl PartialEq for Error {
    fn eq(&self, other: &Error) -> bool {
        match (self, other) {
            (Error::Store(e1), Error::Store(e2)) => e1 == e2,
            (
                Error::OutOfRange {
                    index: i1,
                    last_index: l1,
                },
                Error::OutOfRange {
                    index: i2,
                    last_index: l2,
                },
            ) => i1 == i2 && l1 == l2,
            (Error::ConfigInvalid(s1), Error::ConfigInvalid(s2)) => s1 == s2,
            (Error::LoggerInit(s1), Error::LoggerInit(s2)) => s1 == s2,
            (Error::Io(e1), Error::Io(e2)) => e1.kind() == e2.kind(),
            _ => false,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::Other(Box::new(e))
    }
}

/// Failures reported by a `Storage` backend.
#[derive(Debug, ThisError)]
pub enum StorageError {
    /// The index predates retained history.
    #[error("log compacted")]
    Compacted,
    /// The index is not (yet) retained by the backend.
    #[error("log unavailable")]
    Unavailable,
    #[error("snapshot out of date")]
    SnapshotOutOfDate,
    #[error("snapshot is temporarily unavailable")]
    SnapshotTemporarilyUnavailable,
    #[error("unknown error {0}")]
    Other(#[from] Box<dyn std::error::Error + Sync + Send>),
}

impl PartialEq for StorageError {
    fn eq(&self, other: &StorageError) -> bool {
        matches!(
            (self, other),
            (StorageError::Compacted, StorageError::Compacted)
                | (StorageError::Unavailable, StorageError::Unavailable)
                | (
                    StorageError::SnapshotOutOfDate,
                    StorageError::SnapshotOutOfDate
                )
                | (
                    StorageError::SnapshotTemporarilyUnavailable,
                    StorageError::SnapshotTemporarilyUnavailable,
                )
        )
    }
}
