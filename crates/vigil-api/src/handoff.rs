//! Doctor hand-off for exam-review occurrences.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/occurrences/{id}/handoff` | Admin. Body: `{"doctor":{"name":..,"email":..}}` |
//! | `GET`  | `/public/handoffs/{token}` | No account. 404 unknown, 410 expired |
//! | `POST` | `/public/handoffs/{token}/review` | Body: `{"doctor_name":..,"opinion":..}`; single use |
//!
//! The token is 32 random bytes, hex-encoded. Only its SHA-256 digest is
//! stored.

use axum::{
  Extension, Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use uuid::Uuid;
use vigil_core::{
  event::OccurrenceEvent,
  occurrence::{DoctorContact, DoctorReview, OccurrenceKind, PublicHandoff},
  store::OccurrenceStore,
  tenant::Principal,
};

use crate::{ApiState, error::ApiError, require_admin};

fn new_token() -> String {
  let mut bytes = [0u8; 32];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

fn token_hash(token: &str) -> String { hex::encode(Sha256::digest(token.as_bytes())) }

// ─── Issue ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct IssueBody {
  pub doctor: DoctorContact,
}

#[derive(Debug, Serialize)]
pub struct IssuedHandoff {
  pub token:      String,
  pub link:       String,
  pub expires_at: DateTime<Utc>,
}

/// `POST /occurrences/{id}/handoff`
pub async fn issue<S: OccurrenceStore>(
  State(state): State<ApiState<S>>,
  Extension(principal): Extension<Principal>,
  Path(id): Path<Uuid>,
  Json(body): Json<IssueBody>,
) -> Result<impl IntoResponse, ApiError> {
  require_admin(&principal)?;
  if body.doctor.name.trim().is_empty() {
    return Err(vigil_core::Error::Validation("doctor name must not be empty".into()).into());
  }

  let token = new_token();
  let now = Utc::now();
  let handoff = PublicHandoff {
    doctor:     body.doctor.clone(),
    token_hash: token_hash(&token),
    issued_at:  now,
    expires_at: now + state.settings.handoff_ttl,
  };
  let expires_at = handoff.expires_at;

  let occurrence = state
    .store
    .issue_handoff(principal.tenant_id, id, handoff)
    .await
    .map_err(ApiError::store)?;

  let link = format!(
    "{}/public/handoffs/{token}",
    state.settings.public_base_url.trim_end_matches('/')
  );
  tracing::info!(protocol = %occurrence.protocol, doctor = %body.doctor.name, "exam review requested");
  state.events.publish(OccurrenceEvent::ReviewRequested {
    tenant_id:     occurrence.tenant_id,
    occurrence_id: occurrence.occurrence_id,
    protocol:      occurrence.protocol,
    doctor:        body.doctor,
    link:          link.clone(),
  });

  Ok((StatusCode::CREATED, Json(IssuedHandoff { token, link, expires_at })))
}

// ─── Public view ─────────────────────────────────────────────────────────────

/// What a doctor may see without an account.
#[derive(Debug, Serialize)]
pub struct PublicCase {
  pub protocol:    String,
  pub kind:        OccurrenceKind,
  pub subtype:     String,
  pub description: String,
  pub occurred_at: Option<DateTime<Utc>>,
  pub doctor:      DoctorContact,
  pub expires_at:  DateTime<Utc>,
}

/// `GET /public/handoffs/{token}`
pub async fn public_view<S: OccurrenceStore>(
  State(state): State<ApiState<S>>,
  Path(token): Path<String>,
) -> Result<Json<PublicCase>, ApiError> {
  let occurrence = state
    .store
    .find_by_handoff(token_hash(&token))
    .await
    .map_err(ApiError::store)?
    .ok_or(vigil_core::Error::HandoffNotFound)?;

  let handoff = occurrence.active_handoff(Utc::now())?.clone();
  Ok(Json(PublicCase {
    protocol:    occurrence.protocol,
    kind:        occurrence.kind,
    subtype:     occurrence.subtype,
    description: occurrence.details.description,
    occurred_at: occurrence.details.occurred_at,
    doctor:      handoff.doctor,
    expires_at:  handoff.expires_at,
  }))
}

// ─── Public review ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReviewBody {
  pub doctor_name: String,
  pub opinion:     String,
}

#[derive(Debug, Serialize)]
pub struct ReviewReceipt {
  pub protocol:     String,
  pub submitted_at: DateTime<Utc>,
}

/// `POST /public/handoffs/{token}/review`
pub async fn public_review<S: OccurrenceStore>(
  State(state): State<ApiState<S>>,
  Path(token): Path<String>,
  Json(body): Json<ReviewBody>,
) -> Result<Json<ReviewReceipt>, ApiError> {
  if body.doctor_name.trim().is_empty() || body.opinion.trim().is_empty() {
    return Err(
      vigil_core::Error::Validation("doctor name and opinion are required".into()).into(),
    );
  }

  let review = DoctorReview {
    doctor_name:  body.doctor_name,
    opinion:      body.opinion,
    submitted_at: Utc::now(),
  };
  let submitted_at = review.submitted_at;
  let doctor_name = review.doctor_name.clone();

  let occurrence = state
    .store
    .submit_review(token_hash(&token), review)
    .await
    .map_err(ApiError::store)?;

  tracing::info!(protocol = %occurrence.protocol, "exam review answered");
  state.events.publish(OccurrenceEvent::ReviewAnswered {
    tenant_id: occurrence.tenant_id,
    occurrence_id: occurrence.occurrence_id,
    protocol: occurrence.protocol.clone(),
    doctor_name,
  });

  Ok(Json(ReviewReceipt { protocol: occurrence.protocol, submitted_at }))
}

#[cfg(test)]
mod tests {
  use axum::http::StatusCode;
  use serde_json::json;
  use vigil_core::tenant::Role;

  use super::*;
  use crate::test_support::*;

  #[test]
  fn tokens_are_random_and_hashed() {
    let a = new_token();
    assert_eq!(a.len(), 64);
    assert_ne!(a, new_token());
    assert_ne!(token_hash(&a), a);
    assert_eq!(token_hash(&a), token_hash(&a));
  }

  async fn issue_for(h: &Harness, id: &str) -> serde_json::Value {
    let resp = send(
      h.api(Role::Admin),
      json_request("POST", &format!("/occurrences/{id}/handoff"), json!({
        "doctor": { "name": "Dr. Paulo", "email": "paulo@example.org" },
      })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    body_json(resp).await
  }

  #[tokio::test]
  async fn handoff_link_is_single_use() {
    let h = Harness::new().await;
    let id = create(&h, "revisao_exame").await;
    let issued = issue_for(&h, &id).await;
    let token = issued["token"].as_str().unwrap();
    assert_eq!(
      issued["link"],
      format!("https://vigil.example/public/handoffs/{token}")
    );

    let view = send(h.public(), empty_request("GET", &format!("/handoffs/{token}"))).await;
    assert_eq!(view.status(), StatusCode::OK);
    let view = body_json(view).await;
    assert_eq!(view["kind"], "revisao_exame");
    assert_eq!(view["doctor"]["name"], "Dr. Paulo");
    assert!(view.get("token_hash").is_none());

    let review = json!({ "doctor_name": "Dr. Paulo", "opinion": "Sem alterações" });
    let uri = format!("/handoffs/{token}/review");
    let first = send(h.public(), json_request("POST", &uri, review.clone())).await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = send(h.public(), json_request("POST", &uri, review)).await;
    assert_eq!(second.status(), StatusCode::NOT_FOUND);

    assert_eq!(h.events.names(), vec![
      "occurrence.created",
      "exam_review.requested",
      "exam_review.answered",
    ]);
  }

  #[tokio::test]
  async fn unknown_token_is_404() {
    let h = Harness::new().await;
    let resp = send(h.public(), empty_request("GET", "/handoffs/deadbeef")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn expired_token_is_gone() {
    let mut h = Harness::new().await;
    let mut settings = (*h.state.settings).clone();
    settings.handoff_ttl = chrono::Duration::seconds(-1);
    h.state.settings = std::sync::Arc::new(settings);

    let id = create(&h, "revisao_exame").await;
    let issued = issue_for(&h, &id).await;
    let token = issued["token"].as_str().unwrap();

    let resp = send(h.public(), empty_request("GET", &format!("/handoffs/{token}"))).await;
    assert_eq!(resp.status(), StatusCode::GONE);
  }

  #[tokio::test]
  async fn handoff_needs_an_exam_review() {
    let h = Harness::new().await;
    let id = create(&h, "assistencial").await;
    let resp = send(
      h.api(Role::Admin),
      json_request("POST", &format!("/occurrences/{id}/handoff"), json!({
        "doctor": { "name": "Dr. Paulo" },
      })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
  }
}
