use std::{io::Cursor, sync::Arc};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use beagle_core::BuildSubmission;
use beagle_model::{ImageSpec, RequestId, parse_ports};

use crate::{error::ApiError, handler::ApiHandler};

/// Upload limit applied when none is configured (1 GiB).
pub const DEFAULT_BODY_LIMIT: usize = 1 << 30;

const FIELD_ARCHIVE: &str = "dockerImage";
const FIELD_NAME: &str = "name";
const FIELD_TAG: &str = "tag";
const FIELD_PORTS: &str = "ports";

/// HTTP API service builder.
pub struct HttpApi<H> {
    handler: Arc<H>,
    body_limit: usize,
}

impl<H> HttpApi<H>
where
    H: ApiHandler,
{
    /// Create new HTTP API with the given handler.
    pub fn new(handler: Arc<H>) -> Self {
        Self {
            handler,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Largest accepted request body, archive included.
    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    /// Build axum router with mounted endpoints.
    ///
    /// Routes:
    /// - POST / - Upload an image archive (form)
    /// - POST /api/v1/builds - Same as above
    /// - GET /status/:id - Get request status
    /// - GET /api/v1/builds/:id - Same as above
    pub fn router(self) -> Router {
        Router::new()
            .route("/", post(submit_build::<H>))
            .route("/api/v1/builds", post(submit_build::<H>))
            .route("/status/{id}", get(get_status::<H>))
            .route("/api/v1/builds/{id}", get(get_status::<H>))
            .layer(DefaultBodyLimit::max(self.body_limit))
            .with_state(self.handler)
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct SubmitBuildResponse {
    id: String,
}

/// Fields of the upload form as they arrive.
#[derive(Default)]
struct UploadForm {
    archive: Option<Bytes>,
    name: String,
    tag: String,
    ports: String,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let key = field.name().unwrap_or_default().to_string();
            match key.as_str() {
                FIELD_ARCHIVE => form.archive = Some(field.bytes().await.map_err(multipart_error)?),
                FIELD_NAME => form.name = field.text().await.map_err(multipart_error)?,
                FIELD_TAG => form.tag = field.text().await.map_err(multipart_error)?,
                FIELD_PORTS => form.ports = field.text().await.map_err(multipart_error)?,
                _ => debug!(field = %key, "ignoring unknown form field"),
            }
        }
        Ok(form)
    }

    fn into_submission(self) -> Result<BuildSubmission, ApiError> {
        let archive = self
            .archive
            .ok_or_else(|| ApiError::InvalidRequest(format!("missing '{FIELD_ARCHIVE}' file")))?;
        if archive.is_empty() {
            return Err(ApiError::InvalidRequest(format!(
                "'{FIELD_ARCHIVE}' file is empty"
            )));
        }

        let ports = parse_ports(&self.ports)?;
        let image = ImageSpec::new(self.name, self.tag, ports)?;
        Ok(BuildSubmission::new(image, Cursor::new(archive)))
    }
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::InvalidRequest(err.body_text())
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST / and POST /api/v1/builds
async fn submit_build<H>(
    State(handler): State<Arc<H>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let submission = UploadForm::read(multipart).await?.into_submission()?;
    debug!(image = %submission.image().reference(), "submitting build");

    let id = handler.submit_build(submission).await?;
    let location = format!("/status/{id}");

    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, location)],
        Json(SubmitBuildResponse { id: id.to_string() }),
    ))
}

/// GET /status/:id and GET /api/v1/builds/:id
async fn get_status<H>(
    State(handler): State<Arc<H>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let request_id = RequestId::from(id);
    debug!(%request_id, "getting build status");
    // Issued ids are always alphanumeric.
    if !request_id.is_alphanumeric() {
        return Err(ApiError::NotFound(request_id.to_string()));
    }

    match handler.get_status(&request_id).await? {
        Some(info) => Ok(Json(info)),
        None => Err(ApiError::NotFound(request_id.to_string())),
    }
}
