//! Release Resolver
//!
//! Answers "is there a newer release than X?" for one channel. Every call
//! re-derives the answer from current storage contents, so a freshly
//! published release is visible to the very next query with no cache to
//! invalidate.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::catalog::VersionCatalog;
use super::release::{is_signature_key, ReleaseKey};
use super::storage::{ObjectEntry, ObjectStore, StorageError};

/// Wire-level answer describing an available update. Constructed fresh per
/// request, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateManifest {
    pub version: String,
    /// Artifact upload time, RFC 3339 UTC.
    pub pub_date: DateTime<Utc>,
    pub url: String,
    pub signature: String,
    pub notes: String,
}

/// Outcome of one resolution. `InvalidVersion` is a client input problem,
/// not a server fault; `NoUpdate` is a first-class success.
#[derive(Debug)]
pub enum ResolveOutcome {
    NoUpdate,
    UpdateAvailable(UpdateManifest),
    InvalidVersion,
}

pub struct ReleaseResolver {
    store: Arc<dyn ObjectStore>,
    catalog: VersionCatalog,
}

impl ReleaseResolver {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            catalog: VersionCatalog::new(store.clone()),
            store,
        }
    }

    /// Find the latest stored version newer than `current_version` and
    /// assemble its manifest.
    ///
    /// A version directory that fails the completeness rule (exactly one
    /// artifact object and exactly one signature object) is treated as
    /// absent: a half-published release must never be offered to clients.
    pub async fn resolve(
        &self,
        key: &ReleaseKey,
        current_version: &str,
    ) -> Result<ResolveOutcome, StorageError> {
        let current = match Version::parse(current_version) {
            Ok(version) => version,
            Err(_) => return Ok(ResolveOutcome::InvalidVersion),
        };

        let versions = self.catalog.list_versions(key).await?;
        let Some(candidate) = versions.into_iter().filter(|v| *v > current).max() else {
            return Ok(ResolveOutcome::NoUpdate);
        };
        debug!(channel = %key.prefix(), %current, %candidate, "update candidate selected");

        let objects = self.store.list_objects(&key.version_prefix(&candidate)).await?;
        let Some((artifact, signature)) = split_release_objects(&objects) else {
            debug!(
                channel = %key.prefix(),
                version = %candidate,
                objects = objects.len(),
                "release directory incomplete, treating as absent"
            );
            return Ok(ResolveOutcome::NoUpdate);
        };

        let signature_text = self.store.get_text(&signature.key).await?;
        Ok(ResolveOutcome::UpdateAvailable(UpdateManifest {
            version: candidate.to_string(),
            pub_date: artifact.last_modified,
            url: self.store.object_url(&artifact.key),
            signature: signature_text,
            notes: String::new(),
        }))
    }
}

/// Apply the completeness rule: exactly one signature object and exactly one
/// non-signature object. Returns `(artifact, signature)` when satisfied.
fn split_release_objects(objects: &[ObjectEntry]) -> Option<(&ObjectEntry, &ObjectEntry)> {
    let mut artifact = None;
    let mut signature = None;
    for object in objects {
        let slot = if is_signature_key(&object.key) {
            &mut signature
        } else {
            &mut artifact
        };
        if slot.is_some() {
            // More than one of either kind: ambiguous, treat as incomplete.
            return None;
        }
        *slot = Some(object);
    }
    Some((artifact?, signature?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::storage::MemoryObjectStore;
    use bytes::Bytes;

    fn key() -> ReleaseKey {
        ReleaseKey::new("app", "windows", "x64")
    }

    async fn publish_raw(store: &MemoryObjectStore, version: &str, signature: &str) {
        let artifact_key = format!("app/windows/x64/{v}/app-{v}.msi.zip", v = version);
        let signature_key = format!("app/windows/x64/{v}/app-{v}.msi.zip.sig", v = version);
        store
            .put_object(&artifact_key, Bytes::from("artifact bytes"))
            .await
            .unwrap();
        store
            .put_object(&signature_key, Bytes::from(signature.to_string()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_selects_latest_newer_version() {
        let store = Arc::new(MemoryObjectStore::new());
        publish_raw(&store, "1.0.0", "sig-1.0.0").await;
        publish_raw(&store, "1.2.0", "sig-1.2.0").await;
        publish_raw(&store, "1.1.0", "sig-1.1.0").await;

        let resolver = ReleaseResolver::new(store);
        let outcome = resolver.resolve(&key(), "1.0.0").await.unwrap();
        let ResolveOutcome::UpdateAvailable(manifest) = outcome else {
            panic!("expected an update");
        };
        assert_eq!(manifest.version, "1.2.0");
        assert_eq!(manifest.signature, "sig-1.2.0");
        assert!(manifest.url.ends_with("app/windows/x64/1.2.0/app-1.2.0.msi.zip"));
        assert_eq!(manifest.notes, "");
    }

    #[tokio::test]
    async fn test_no_update_when_current_is_latest() {
        let store = Arc::new(MemoryObjectStore::new());
        publish_raw(&store, "1.0.0", "sig").await;
        publish_raw(&store, "1.2.0", "sig").await;

        let resolver = ReleaseResolver::new(store);
        let outcome = resolver.resolve(&key(), "2.0.0").await.unwrap();
        assert!(matches!(outcome, ResolveOutcome::NoUpdate));
    }

    #[tokio::test]
    async fn test_empty_catalog_is_no_update() {
        let store = Arc::new(MemoryObjectStore::new());
        let resolver = ReleaseResolver::new(store);
        let outcome = resolver.resolve(&key(), "1.0.0").await.unwrap();
        assert!(matches!(outcome, ResolveOutcome::NoUpdate));
    }

    #[tokio::test]
    async fn test_malformed_current_version() {
        let store = Arc::new(MemoryObjectStore::new());
        publish_raw(&store, "1.2.0", "sig").await;

        let resolver = ReleaseResolver::new(store);
        let outcome = resolver.resolve(&key(), "not-a-version").await.unwrap();
        assert!(matches!(outcome, ResolveOutcome::InvalidVersion));
    }

    #[tokio::test]
    async fn test_unparsable_directories_are_ignored() {
        let store = Arc::new(MemoryObjectStore::new());
        publish_raw(&store, "1.0.0", "sig-1.0.0").await;
        publish_raw(&store, "1.2.0", "sig-1.2.0").await;
        store
            .put_object("app/windows/x64/bogus/file.txt", Bytes::from("x"))
            .await
            .unwrap();

        let resolver = ReleaseResolver::new(store);
        let outcome = resolver.resolve(&key(), "1.0.0").await.unwrap();
        let ResolveOutcome::UpdateAvailable(manifest) = outcome else {
            panic!("expected an update");
        };
        assert_eq!(manifest.version, "1.2.0");
    }

    #[tokio::test]
    async fn test_artifact_without_signature_is_invisible() {
        let store = Arc::new(MemoryObjectStore::new());
        store
            .put_object(
                "app/windows/x64/1.5.0/app-1.5.0.msi.zip",
                Bytes::from("artifact"),
            )
            .await
            .unwrap();

        let resolver = ReleaseResolver::new(store);
        let outcome = resolver.resolve(&key(), "1.0.0").await.unwrap();
        assert!(matches!(outcome, ResolveOutcome::NoUpdate));
    }

    #[tokio::test]
    async fn test_signature_without_artifact_is_invisible() {
        let store = Arc::new(MemoryObjectStore::new());
        store
            .put_object(
                "app/windows/x64/1.5.0/app-1.5.0.msi.zip.sig",
                Bytes::from("sig"),
            )
            .await
            .unwrap();

        let resolver = ReleaseResolver::new(store);
        let outcome = resolver.resolve(&key(), "1.0.0").await.unwrap();
        assert!(matches!(outcome, ResolveOutcome::NoUpdate));
    }

    #[tokio::test]
    async fn test_two_artifacts_is_invisible() {
        let store = Arc::new(MemoryObjectStore::new());
        publish_raw(&store, "1.5.0", "sig").await;
        store
            .put_object("app/windows/x64/1.5.0/extra.bin", Bytes::from("extra"))
            .await
            .unwrap();

        let resolver = ReleaseResolver::new(store);
        let outcome = resolver.resolve(&key(), "1.0.0").await.unwrap();
        assert!(matches!(outcome, ResolveOutcome::NoUpdate));
    }

    #[tokio::test]
    async fn test_incomplete_newer_version_does_not_shadow() {
        // A half-published 2.0.0 must not be offered, and the resolver does
        // not fall back to the older complete 1.2.0 either: the directory is
        // simply absent for this query.
        let store = Arc::new(MemoryObjectStore::new());
        publish_raw(&store, "1.2.0", "sig").await;
        store
            .put_object("app/windows/x64/2.0.0/app-2.0.0.msi.zip", Bytes::from("a"))
            .await
            .unwrap();

        let resolver = ReleaseResolver::new(store);
        let outcome = resolver.resolve(&key(), "1.0.0").await.unwrap();
        assert!(matches!(outcome, ResolveOutcome::NoUpdate));
    }

    #[tokio::test]
    async fn test_prerelease_sorts_below_release() {
        let store = Arc::new(MemoryObjectStore::new());
        publish_raw(&store, "1.2.0", "sig-release").await;
        publish_raw(&store, "1.2.0-rc.1", "sig-rc").await;

        let resolver = ReleaseResolver::new(store);
        let outcome = resolver.resolve(&key(), "1.0.0").await.unwrap();
        let ResolveOutcome::UpdateAvailable(manifest) = outcome else {
            panic!("expected an update");
        };
        assert_eq!(manifest.version, "1.2.0");
    }

    #[tokio::test]
    async fn test_pub_date_is_artifact_last_modified() {
        let store = Arc::new(MemoryObjectStore::new());
        publish_raw(&store, "1.2.0", "sig").await;

        let expected = store
            .last_modified("app/windows/x64/1.2.0/app-1.2.0.msi.zip")
            .unwrap();
        let resolver = ReleaseResolver::new(store);
        let ResolveOutcome::UpdateAvailable(manifest) =
            resolver.resolve(&key(), "1.0.0").await.unwrap()
        else {
            panic!("expected an update");
        };
        assert_eq!(manifest.pub_date, expected);
    }

    #[test]
    fn test_manifest_wire_shape() {
        let manifest = UpdateManifest {
            version: "1.2.0".to_string(),
            pub_date: "2026-03-01T12:00:00Z".parse().unwrap(),
            url: "http://localhost:9000/releases/app/windows/x64/1.2.0/app-1.2.0.msi.zip"
                .to_string(),
            signature: "sig".to_string(),
            notes: String::new(),
        };
        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["version"], "1.2.0");
        assert_eq!(json["pub_date"], "2026-03-01T12:00:00Z");
        assert!(json["url"].as_str().unwrap().contains("app-1.2.0.msi.zip"));
        assert_eq!(json["notes"], "");
    }
}
