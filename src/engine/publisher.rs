//! Release Publisher
//!
//! Files a freshly built release away: writes the artifact and its detached
//! signature under the deterministic key layout for one channel + version.
//!
//! The two uploads are independent object writes; there is no multi-object
//! transaction. A partial publish leaves the directory incomplete, which the
//! resolver treats as absent, so clients never see a half-published release.

use std::sync::Arc;

use bytes::Bytes;
use semver::Version;
use thiserror::Error;
use tracing::{info, warn};

use super::release::{is_signature_key, ReleaseKey, SIGNATURE_SUFFIX};
use super::storage::{ObjectStore, StorageError};

/// Input rejection, reported before any upload is attempted.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Missing or empty {0} upload")]
    MissingInput(&'static str),
    #[error("Artifact filename must not end with the reserved signature suffix")]
    ReservedSuffix,
}

/// What actually landed in storage. Partial outcomes carry the error of the
/// failed half so the publishing pipeline can decide what to retry.
#[derive(Debug)]
pub enum PublishOutcome {
    Complete {
        artifact_key: String,
        signature_key: String,
    },
    ArtifactOnly {
        artifact_key: String,
        signature_error: StorageError,
    },
    SignatureOnly {
        signature_key: String,
        artifact_error: StorageError,
    },
    Failed {
        artifact_error: StorageError,
        signature_error: StorageError,
    },
}

impl PublishOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, PublishOutcome::Complete { .. })
    }
}

pub struct ReleasePublisher {
    store: Arc<dyn ObjectStore>,
}

impl ReleasePublisher {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Upload one release: the artifact and its detached signature.
    ///
    /// Object names follow `{product}-{version}{ext}` where `ext` is taken
    /// from the uploaded filename; the signature object always ends with
    /// `.sig` so the completeness rule can tell the two apart. Re-publishing
    /// the same channel + version overwrites the prior objects.
    ///
    /// Both uploads are attempted even if the first fails, so the caller
    /// learns exactly which half landed.
    pub async fn publish(
        &self,
        key: &ReleaseKey,
        version: &Version,
        artifact: Bytes,
        artifact_name: &str,
        signature: Bytes,
        signature_name: &str,
    ) -> Result<PublishOutcome, PublishError> {
        if artifact.is_empty() {
            return Err(PublishError::MissingInput("artifact"));
        }
        if signature.is_empty() {
            return Err(PublishError::MissingInput("signature"));
        }

        let artifact_ext = extension_of(artifact_name);
        if is_signature_key(&artifact_ext) {
            return Err(PublishError::ReservedSuffix);
        }
        let mut signature_ext = extension_of(signature_name);
        if !signature_ext.ends_with(SIGNATURE_SUFFIX) {
            signature_ext.push_str(SIGNATURE_SUFFIX);
        }

        let artifact_key = key.object_key(version, &artifact_ext);
        let signature_key = key.object_key(version, &signature_ext);

        let artifact_result = self.store.put_object(&artifact_key, artifact).await;
        let signature_result = self.store.put_object(&signature_key, signature).await;

        Ok(match (artifact_result, signature_result) {
            (Ok(()), Ok(())) => {
                info!(%artifact_key, %signature_key, "release published");
                PublishOutcome::Complete {
                    artifact_key,
                    signature_key,
                }
            }
            (Ok(()), Err(signature_error)) => {
                warn!(%artifact_key, error = %signature_error, "signature upload failed, release left incomplete");
                PublishOutcome::ArtifactOnly {
                    artifact_key,
                    signature_error,
                }
            }
            (Err(artifact_error), Ok(())) => {
                warn!(%signature_key, error = %artifact_error, "artifact upload failed, release left incomplete");
                PublishOutcome::SignatureOnly {
                    signature_key,
                    artifact_error,
                }
            }
            (Err(artifact_error), Err(signature_error)) => {
                warn!(error = %artifact_error, "both uploads failed");
                PublishOutcome::Failed {
                    artifact_error,
                    signature_error,
                }
            }
        })
    }
}

/// Extension of an uploaded filename, from its first dot: `app.tar.gz`
/// yields `.tar.gz`. Empty when the name has no dot.
fn extension_of(filename: &str) -> String {
    let name = filename.rsplit('/').next().unwrap_or(filename);
    match name.find('.') {
        Some(index) => name[index..].to_string(),
        None => String::new(),
    }
}
