//! `POST /occurrences/{id}/notification`: record the external notification.
//!
//! Admin only. Body: `{"agency":..,"notified_on":"YYYY-MM-DD","responsible":..,
//! "attachment_id":null}`. 409 when one is already recorded.

use axum::{
  Extension, Json,
  extract::{Path, State},
};
use uuid::Uuid;
use vigil_core::{
  occurrence::{NewExternalNotification, Occurrence},
  store::OccurrenceStore,
  tenant::Principal,
};

use crate::{ApiState, error::ApiError, require_admin};

pub async fn record<S: OccurrenceStore>(
  State(state): State<ApiState<S>>,
  Extension(principal): Extension<Principal>,
  Path(id): Path<Uuid>,
  Json(body): Json<NewExternalNotification>,
) -> Result<Json<Occurrence>, ApiError> {
  require_admin(&principal)?;

  if let Some(attachment_id) = body.attachment_id {
    let attachment = state
      .store
      .get_attachment(principal.tenant_id, attachment_id)
      .await
      .map_err(ApiError::store)?
      .filter(|a| a.occurrence_id == id);
    if attachment.is_none() {
      return Err(vigil_core::Error::AttachmentNotFound(attachment_id).into());
    }
  }

  let occurrence = state
    .store
    .record_notification(principal.tenant_id, id, body)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(occurrence))
}

#[cfg(test)]
mod tests {
  use axum::http::StatusCode;
  use serde_json::json;
  use vigil_core::tenant::Role;

  use crate::test_support::*;

  #[tokio::test]
  async fn notification_is_recorded_once() {
    let h = Harness::new().await;
    let id = create(&h, "assistencial").await;
    let uri = format!("/occurrences/{id}/notification");
    let body = json!({
      "agency": "Vigilância Sanitária Municipal",
      "notified_on": "2026-05-04",
      "responsible": "NSP",
    });

    let first = send(h.api(Role::Admin), json_request("POST", &uri, body.clone())).await;
    assert_eq!(first.status(), StatusCode::OK);
    let json = body_json(first).await;
    assert_eq!(json["external_notification"]["notified_on"], "2026-05-04");

    let second = send(h.api(Role::Admin), json_request("POST", &uri, body)).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn unknown_attachment_is_404() {
    let h = Harness::new().await;
    let id = create(&h, "assistencial").await;
    let resp = send(
      h.api(Role::Admin),
      json_request("POST", &format!("/occurrences/{id}/notification"), json!({
        "agency": "ANVISA",
        "notified_on": "2026-05-04",
        "responsible": "NSP",
        "attachment_id": uuid::Uuid::new_v4(),
      })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }
}
