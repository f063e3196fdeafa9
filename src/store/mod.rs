//! Durable key-value staging storage for uploaded objects.
//!
//! Objects are keyed by path-like strings and carry an arrival timestamp plus
//! a set of key/value labels. Nothing in the pipeline ever deletes an object;
//! retention is owned by whatever operates the backing storage.

mod fs;
mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single key/value label attached to a stored object.
///
/// Serialized with capitalized field names (`Key`/`Value`), the wire format
/// the tagging step emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectLabel {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl ObjectLabel {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("invalid object key: {key}")]
    InvalidKey { key: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("label sidecar error: {0}")]
    Sidecar(#[from] serde_json::Error),
}

/// Backend-agnostic staging storage.
///
/// Implementations must be safe to share across the engine, the scan handler
/// and the intake endpoint; keys for distinct uploads are disjoint, so
/// implementations only need per-object consistency.
pub trait StagingStore: Send + Sync {
    /// Write `bytes` under `key`, overwriting any previous content.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Read the full content stored under `key`.
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Replace the labels attached to `key`.
    fn tag(&self, key: &str, labels: &[ObjectLabel]) -> Result<(), StoreError>;

    /// Current labels of `key`. Empty for an untagged object.
    fn tags(&self, key: &str) -> Result<Vec<ObjectLabel>, StoreError>;

    /// When the object under `key` arrived in staging.
    fn arrived_at(&self, key: &str) -> Result<DateTime<Utc>, StoreError>;
}
