//! Object Storage Abstraction
//!
//! The release engine talks to an S3-compatible store through this trait so
//! the core logic can run against an in-memory fake in tests. The bucket,
//! endpoint, and credentials are constructor inputs of the implementation;
//! core code never reads configuration ambiently.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod memory;
pub mod s3;

pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

/// Storage-level failures.
///
/// Absence of objects is not an error: listing an empty prefix returns an
/// empty vec. `NotFound` only surfaces when a specific key read misses.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Storage request failed with status {status}: {body}")]
    Request { status: u16, body: String },
    #[error("Invalid listing response: {0}")]
    InvalidListing(String),
    #[error("Invalid storage endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("Object not found: {0}")]
    NotFound(String),
}

/// Metadata for one stored object.
#[derive(Debug, Clone)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Directory-style listing, small-object reads, and whole-object writes
/// against a single configured bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List immediate "directory" entries under `prefix` (delimiter `/`).
    ///
    /// Returned entries are full prefix strings ending in `/`.
    async fn list_prefixes(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// List all objects under `prefix`.
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectEntry>, StorageError>;

    /// Read a small object in full as UTF-8 text.
    async fn get_text(&self, key: &str) -> Result<String, StorageError>;

    /// Write an object, overwriting any existing content at `key`.
    async fn put_object(&self, key: &str, body: Bytes) -> Result<(), StorageError>;

    /// Public download URL for `key`.
    fn object_url(&self, key: &str) -> String;
}
