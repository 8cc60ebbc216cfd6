//! In-Memory Object Store
//!
//! BTreeMap-backed fake implementing the same listing semantics as S3
//! (delimiter-style common prefixes). Used by unit and integration tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::{ObjectEntry, ObjectStore, StorageError};

struct StoredObject {
    body: Bytes,
    last_modified: DateTime<Utc>,
}

/// In-memory store keyed by object path. Puts record the wall-clock time as
/// the object's last-modified timestamp, like a real store would.
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    base_url: String,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            base_url: "memory://bucket".to_string(),
        }
    }

    /// Last-modified timestamp recorded for `key`, if present.
    pub fn last_modified(&self, key: &str) -> Option<DateTime<Utc>> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|o| o.last_modified)
    }

    /// Raw body stored at `key`, if present.
    pub fn body(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(key).map(|o| o.body.clone())
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_prefixes(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let objects = self.objects.lock().unwrap();
        let mut prefixes = Vec::new();
        for key in objects.keys() {
            let Some(rest) = key.strip_prefix(prefix) else {
                continue;
            };
            if let Some(slash) = rest.find('/') {
                let common = format!("{}{}/", prefix, &rest[..slash]);
                if prefixes.last() != Some(&common) {
                    prefixes.push(common);
                }
            }
        }
        Ok(prefixes)
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectEntry>, StorageError> {
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, stored)| ObjectEntry {
                key: key.clone(),
                size: stored.body.len() as u64,
                last_modified: stored.last_modified,
            })
            .collect())
    }

    async fn get_text(&self, key: &str) -> Result<String, StorageError> {
        let objects = self.objects.lock().unwrap();
        let stored = objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(String::from_utf8_lossy(&stored.body).into_owned())
    }

    async fn put_object(&self, key: &str, body: Bytes) -> Result<(), StorageError> {
        let mut objects = self.objects.lock().unwrap();
        objects.insert(
            key.to_string(),
            StoredObject {
                body,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}
