//! Updock HTTP API
//! Axum router exposing the update query and release publish endpoints.
//!
//! Query callers see a manifest (200), an empty "no update" answer (204), or
//! a 400 for an unparsable current version. Publish callers see success or a
//! rejection naming the missing part or the failed upload. Storage failures
//! surface as 502; the server never retries on the caller's behalf.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use semver::Version;
use serde::Serialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use super::publisher::{PublishOutcome, ReleasePublisher};
use super::release::ReleaseKey;
use super::resolver::{ReleaseResolver, ResolveOutcome};
use super::storage::ObjectStore;

/// Artifacts can run to hundreds of MB; raise axum's 2 MB default.
const MAX_UPLOAD_BYTES: usize = 1024 * 1024 * 1024;

#[derive(Clone)]
pub struct ApiState {
    pub resolver: Arc<ReleaseResolver>,
    pub publisher: Arc<ReleasePublisher>,
}

impl ApiState {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            resolver: Arc::new(ReleaseResolver::new(store.clone())),
            publisher: Arc::new(ReleasePublisher::new(store)),
        }
    }
}

pub fn create_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/{product}/{platform}/{arch}/{version}",
            get(get_update).post(post_release),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn get_update(
    State(state): State<ApiState>,
    Path((product, platform, arch, current_version)): Path<(String, String, String, String)>,
) -> Response {
    let key = ReleaseKey::new(product, platform, arch);
    match state.resolver.resolve(&key, &current_version).await {
        Ok(ResolveOutcome::UpdateAvailable(manifest)) => {
            (StatusCode::OK, Json(manifest)).into_response()
        }
        Ok(ResolveOutcome::NoUpdate) => StatusCode::NO_CONTENT.into_response(),
        Ok(ResolveOutcome::InvalidVersion) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": format!("invalid current version: {}", current_version)
            })),
        )
            .into_response(),
        Err(e) => {
            error!(channel = %key.prefix(), error = %e, "resolve failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// One part of the multipart publish form: the raw bytes plus the uploaded
/// filename, whose extension drives the stored object name.
struct UploadPart {
    bytes: Bytes,
    filename: String,
}

async fn post_release(
    State(state): State<ApiState>,
    Path((product, platform, arch, version)): Path<(String, String, String, String)>,
    mut multipart: Multipart,
) -> Response {
    let version = match Version::parse(&version) {
        Ok(v) => v,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("invalid release version: {}", version) })),
            )
                .into_response();
        }
    };

    let mut artifact: Option<UploadPart> = None;
    let mut signature: Option<UploadPart> = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": format!("malformed multipart body: {}", e) })),
                )
                    .into_response();
            }
        };

        let slot = match field.name() {
            Some("artifact") => &mut artifact,
            Some("signature") => &mut signature,
            _ => continue,
        };
        let filename = field.file_name().unwrap_or_default().to_string();
        match field.bytes().await {
            Ok(bytes) => *slot = Some(UploadPart { bytes, filename }),
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": format!("failed to read upload: {}", e) })),
                )
                    .into_response();
            }
        }
    }

    let (Some(artifact), Some(signature)) = (artifact, signature) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "both 'artifact' and 'signature' parts are required" })),
        )
            .into_response();
    };

    let key = ReleaseKey::new(product, platform, arch);
    let outcome = match state
        .publisher
        .publish(
            &key,
            &version,
            artifact.bytes,
            &artifact.filename,
            signature.bytes,
            &signature.filename,
        )
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    match outcome {
        PublishOutcome::Complete {
            artifact_key,
            signature_key,
        } => (
            StatusCode::OK,
            Json(json!({
                "status": "published",
                "version": version.to_string(),
                "artifact_key": artifact_key,
                "signature_key": signature_key,
            })),
        )
            .into_response(),
        PublishOutcome::ArtifactOnly {
            signature_error, ..
        } => (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "error": format!("signature upload failed: {}", signature_error),
                "state": "incomplete",
            })),
        )
            .into_response(),
        PublishOutcome::SignatureOnly { artifact_error, .. } => (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "error": format!("artifact upload failed: {}", artifact_error),
                "state": "incomplete",
            })),
        )
            .into_response(),
        PublishOutcome::Failed {
            artifact_error,
            signature_error,
        } => (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "error": format!(
                    "both uploads failed: artifact: {}; signature: {}",
                    artifact_error, signature_error
                ),
                "state": "missing",
            })),
        )
            .into_response(),
    }
}
