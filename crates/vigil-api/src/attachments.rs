//! Handlers for attachment upload and download.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/occurrences/{id}/attachments` | Metadata only |
//! | `POST` | `/occurrences/{id}/attachments?file_name=` | Raw body; `Content-Type` must be `image/*` or a document type |
//! | `GET`  | `/attachments/{id}` | Streams the stored bytes back |
//!
//! Bytes are written to `{attachment_dir}/{tenant}/{occurrence}/{attachment}`
//! before the metadata row is inserted.

use std::path::PathBuf;

use axum::{
  Extension, Json,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode, header},
  response::IntoResponse,
};
use bytes::Bytes;
use serde::Deserialize;
use sha2::{Digest as _, Sha256};
use uuid::Uuid;
use vigil_core::{
  attachment::{Attachment, NewAttachment, sanitize_file_name},
  store::OccurrenceStore,
  tenant::Principal,
};

use crate::{ApiState, error::ApiError};

/// `GET /occurrences/{id}/attachments`
pub async fn list<S: OccurrenceStore>(
  State(state): State<ApiState<S>>,
  Extension(principal): Extension<Principal>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Attachment>>, ApiError> {
  let attachments = state
    .store
    .list_attachments(principal.tenant_id, id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(attachments))
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
  pub file_name: String,
}

/// `POST /occurrences/{id}/attachments?file_name=<name>`
pub async fn upload<S: OccurrenceStore>(
  State(state): State<ApiState<S>>,
  Extension(principal): Extension<Principal>,
  Path(id): Path<Uuid>,
  Query(params): Query<UploadParams>,
  headers: HeaderMap,
  body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
  let limit = state.settings.max_attachment_bytes;
  if body.len() > limit {
    return Err(ApiError::PayloadTooLarge { limit });
  }
  if body.is_empty() {
    return Err(ApiError::BadRequest("attachment body is empty".into()));
  }

  let mime_type = headers
    .get(header::CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .unwrap_or("application/octet-stream")
    .to_owned();

  let attachment_id = Uuid::new_v4();
  let storage_path = format!("{}/{id}/{attachment_id}", principal.tenant_id);
  let input = NewAttachment {
    attachment_id,
    occurrence_id: id,
    file_name: sanitize_file_name(&params.file_name),
    mime_type,
    size_bytes: body.len() as u64,
    storage_path: storage_path.clone(),
    content_hash: hex::encode(Sha256::digest(&body)),
    uploaded_by: principal.username.clone(),
  };
  input.validate()?;

  state
    .store
    .get_occurrence(principal.tenant_id, id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("occurrence {id} not found")))?;

  let path = state.settings.attachment_dir.join(&storage_path);
  if let Some(parent) = path.parent() {
    tokio::fs::create_dir_all(parent).await?;
  }
  tokio::fs::write(&path, &body).await?;

  let attachment = match state.store.add_attachment(principal.tenant_id, input).await {
    Ok(a) => a,
    Err(e) => {
      if let Err(io) = tokio::fs::remove_file(&path).await {
        tracing::warn!(path = %path.display(), error = %io, "orphaned attachment file");
      }
      return Err(ApiError::store(e));
    }
  };

  tracing::info!(
    attachment = %attachment.attachment_id,
    occurrence = %id,
    bytes = attachment.size_bytes,
    "attachment stored"
  );
  Ok((StatusCode::CREATED, Json(attachment)))
}

/// `GET /attachments/{id}`
pub async fn download<S: OccurrenceStore>(
  State(state): State<ApiState<S>>,
  Extension(principal): Extension<Principal>,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
  let attachment = state
    .store
    .get_attachment(principal.tenant_id, id)
    .await
    .map_err(ApiError::store)?
    .ok_or(vigil_core::Error::AttachmentNotFound(id))?;

  let path: PathBuf = state.settings.attachment_dir.join(&attachment.storage_path);
  let bytes = tokio::fs::read(&path).await?;

  Ok((
    [
      (header::CONTENT_TYPE, attachment.mime_type),
      (
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{}\"", attachment.file_name),
      ),
    ],
    bytes,
  ))
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use vigil_core::tenant::Role;

  use crate::test_support::*;

  fn upload_request(id: &str, name: &str, mime: &str, bytes: Vec<u8>) -> Request<Body> {
    Request::builder()
      .method("POST")
      .uri(format!("/occurrences/{id}/attachments?file_name={name}"))
      .header("content-type", mime)
      .body(Body::from(bytes))
      .unwrap()
  }

  #[tokio::test]
  async fn upload_then_download_round_trips_bytes() {
    let h = Harness::new().await;
    let id = create(&h, "tecnica").await;

    let resp = send(
      h.api(Role::Staff),
      upload_request(&id, "foto.png", "image/png", b"\x89PNG fake".to_vec()),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let meta = body_json(resp).await;
    assert_eq!(meta["mime_type"], "image/png");
    assert_eq!(meta["size_bytes"], 9);

    let resp = send(
      h.api(Role::Staff),
      empty_request("GET", &format!("/attachments/{}", meta["attachment_id"].as_str().unwrap())),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "image/png");
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"\x89PNG fake");
  }

  #[tokio::test]
  async fn unsupported_type_is_unprocessable() {
    let h = Harness::new().await;
    let id = create(&h, "tecnica").await;
    let resp = send(
      h.api(Role::Staff),
      upload_request(&id, "run.exe", "application/x-msdownload", vec![1, 2, 3]),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
  }

  #[tokio::test]
  async fn oversized_upload_is_rejected() {
    let h = Harness::new().await;
    let id = create(&h, "tecnica").await;
    let resp = send(
      h.api(Role::Staff),
      upload_request(&id, "big.pdf", "application/pdf", vec![0; 4096]),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
  }
}
