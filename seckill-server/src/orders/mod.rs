//! Durable order persistence

pub mod storage;

pub use storage::{DeadLetterDraft, OrderStorage, StorageError, StorageResult};
