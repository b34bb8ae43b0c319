//! File attachments. Bytes live on disk; only metadata lives in the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Mime types accepted besides `image/*`.
pub const DOCUMENT_MIME_TYPES: &[&str] = &[
  "application/pdf",
  "application/msword",
  "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
  "application/vnd.ms-excel",
  "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
  "text/plain",
  "text/csv",
];

pub fn is_accepted_mime(mime: &str) -> bool {
  let essence = mime.split(';').next().unwrap_or_default().trim();
  essence.starts_with("image/") || DOCUMENT_MIME_TYPES.contains(&essence)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
  pub attachment_id: Uuid,
  pub occurrence_id: Uuid,
  pub tenant_id:     Uuid,
  pub file_name:     String,
  pub mime_type:     String,
  pub size_bytes:    u64,
  /// Path relative to the configured attachment directory.
  pub storage_path:  String,
  /// SHA-256 hex digest of the stored bytes.
  pub content_hash:  String,
  pub uploaded_by:   String,
  pub created_at:    DateTime<Utc>,
}

/// Input to [`crate::store::OccurrenceStore::add_attachment`]. The caller has
/// already written the bytes to `storage_path`.
#[derive(Debug, Clone)]
pub struct NewAttachment {
  pub attachment_id: Uuid,
  pub occurrence_id: Uuid,
  pub file_name:     String,
  pub mime_type:     String,
  pub size_bytes:    u64,
  pub storage_path:  String,
  pub content_hash:  String,
  pub uploaded_by:   String,
}

impl NewAttachment {
  pub fn validate(&self) -> Result<()> {
    if self.file_name.trim().is_empty() {
      return Err(Error::Validation("file name must not be empty".into()));
    }
    if !is_accepted_mime(&self.mime_type) {
      return Err(Error::Validation(format!(
        "unsupported attachment type: {}",
        self.mime_type
      )));
    }
    Ok(())
  }
}

/// Reduce a client-supplied file name to its final path component, keeping
/// only characters that are safe on every filesystem.
pub fn sanitize_file_name(raw: &str) -> String {
  let last = raw.rsplit(['/', '\\']).next().unwrap_or_default();
  last
    .chars()
    .map(|c| {
      if c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ') {
        c
      } else {
        '_'
      }
    })
    .collect::<String>()
    .trim_matches(['.', ' '])
    .to_owned()
}
