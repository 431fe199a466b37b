mod config;
mod error;
mod logger;
mod raft_log;

pub mod eraftpb;
pub mod storage;

pub use crate::{
    config::{Config, ConfigBuilder, LogDestination},
    eraftpb::{Entry, HardState, Snapshot, SnapshotMetadata},
    error::{Error, Result, StorageError},
    logger::{build_logger, Logger, Slogger},
    raft_log::{EntryWindow, LogStatus, RaftLog},
    storage::{utils, LogStore, MemStorage, Storage},
};
