//! In-memory staging store used by the demo subcommand and tests.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use super::{ObjectLabel, StagingStore, StoreError};

struct Entry {
    bytes: Vec<u8>,
    arrived_at: DateTime<Utc>,
    labels: Vec<ObjectLabel>,
}

/// Staging store backed by a process-local map.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StagingStore for MemoryStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let mut objects = self.objects.lock().expect("store lock poisoned");
        objects.insert(
            key.to_string(),
            Entry {
                bytes: bytes.to_vec(),
                arrived_at: Utc::now(),
                labels: Vec::new(),
            },
        );
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let objects = self.objects.lock().expect("store lock poisoned");
        objects
            .get(key)
            .map(|entry| entry.bytes.clone())
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    fn tag(&self, key: &str, labels: &[ObjectLabel]) -> Result<(), StoreError> {
        let mut objects = self.objects.lock().expect("store lock poisoned");
        let entry = objects.get_mut(key).ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })?;
        entry.labels = labels.to_vec();
        Ok(())
    }

    fn tags(&self, key: &str) -> Result<Vec<ObjectLabel>, StoreError> {
        let objects = self.objects.lock().expect("store lock poisoned");
        objects
            .get(key)
            .map(|entry| entry.labels.clone())
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    fn arrived_at(&self, key: &str) -> Result<DateTime<Utc>, StoreError> {
        let objects = self.objects.lock().expect("store lock poisoned");
        objects
            .get(key)
            .map(|entry| entry.arrived_at)
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_roundtrip() {
        let store = MemoryStore::new();
        store.put("incoming/sample.txt", b"hello").unwrap();
        assert_eq!(store.get("incoming/sample.txt").unwrap(), b"hello");
    }

    #[test]
    fn get_missing_key_is_not_found() {
        let store = MemoryStore::new();
        let err = store.get("nope").unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn objects_start_untagged() {
        let store = MemoryStore::new();
        store.put("a.txt", b"x").unwrap();
        assert!(store.tags("a.txt").unwrap().is_empty());
    }

    #[test]
    fn tag_replaces_labels() {
        let store = MemoryStore::new();
        store.put("a.txt", b"x").unwrap();
        store
            .tag("a.txt", &[ObjectLabel::new("MalwareStatus", "Clean")])
            .unwrap();

        let labels = store.tags("a.txt").unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].key, "MalwareStatus");
        assert_eq!(labels[0].value, "Clean");
    }

    #[test]
    fn tag_missing_key_is_not_found() {
        let store = MemoryStore::new();
        let err = store.tag("nope", &[]).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn put_records_arrival_time() {
        let store = MemoryStore::new();
        let before = Utc::now();
        store.put("a.txt", b"x").unwrap();
        let arrived = store.arrived_at("a.txt").unwrap();
        assert!(arrived >= before);
        assert!(arrived <= Utc::now());
    }

    #[test]
    fn overwrite_clears_labels() {
        let store = MemoryStore::new();
        store.put("a.txt", b"x").unwrap();
        store
            .tag("a.txt", &[ObjectLabel::new("MalwareStatus", "Clean")])
            .unwrap();
        store.put("a.txt", b"y").unwrap();
        assert!(store.tags("a.txt").unwrap().is_empty());
    }
}
