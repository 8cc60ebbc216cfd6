//! Version Catalog
//!
//! Lists the version directories stored under a release channel and parses
//! each into an ordered semantic version. Entries that do not parse are not
//! releases (stray objects, malformed directories) and are skipped.

use std::sync::Arc;

use semver::Version;
use tracing::debug;

use super::release::ReleaseKey;
use super::storage::{ObjectStore, StorageError};

pub struct VersionCatalog {
    store: Arc<dyn ObjectStore>,
}

impl VersionCatalog {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// All parseable versions stored under the channel, in storage order.
    ///
    /// An empty vec is a normal outcome, not an error.
    pub async fn list_versions(&self, key: &ReleaseKey) -> Result<Vec<Version>, StorageError> {
        let prefixes = self.store.list_prefixes(&key.prefix()).await?;
        let mut versions = Vec::with_capacity(prefixes.len());
        for prefix in prefixes {
            let segment = prefix
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or_default();
            match Version::parse(segment) {
                Ok(version) => versions.push(version),
                Err(_) => {
                    debug!(directory = %segment, channel = %key.prefix(), "skipping non-version directory");
                }
            }
        }
        Ok(versions)
    }
}
