//! Handlers that drive an occurrence through its lifecycle.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/occurrences/{id}/triage` | Admin. Body: `{"level":"near_miss"}`; 409 if already set |
//! | `POST` | `/occurrences/{id}/status` | Admin. Body: `{"to":"em_analise","reason":null}` |
//! | `PUT`  | `/occurrences/{id}/outcomes` | Admin. Body: `{"outcomes":["treinamento"]}` |
//! | `GET`  | `/occurrences/{id}/follow-ups` | Required follow-ups and what still blocks closing |
//! | `GET`  | `/occurrences/{id}/history` | Oldest first |

use axum::{
  Extension, Json,
  extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vigil_core::{
  event::OccurrenceEvent,
  lifecycle::{ClosingBlocker, FollowUps, StatusChange, TransitionRequest},
  occurrence::{Occurrence, OccurrenceStatus, TriageLevel},
  outcome::{OutcomeSelection, OutcomeType},
  store::OccurrenceStore,
  tenant::Principal,
};

use crate::{ApiState, error::ApiError, require_admin};

// ─── Triage ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TriageBody {
  pub level: TriageLevel,
}

/// `POST /occurrences/{id}/triage`
pub async fn triage<S: OccurrenceStore>(
  State(state): State<ApiState<S>>,
  Extension(principal): Extension<Principal>,
  Path(id): Path<Uuid>,
  Json(body): Json<TriageBody>,
) -> Result<Json<Occurrence>, ApiError> {
  require_admin(&principal)?;
  let occurrence = state
    .store
    .set_triage(principal.tenant_id, id, body.level)
    .await
    .map_err(ApiError::store)?;

  tracing::info!(protocol = %occurrence.protocol, level = %body.level, "occurrence triaged");
  state.events.publish(OccurrenceEvent::Triaged {
    tenant_id:     occurrence.tenant_id,
    occurrence_id: occurrence.occurrence_id,
    protocol:      occurrence.protocol.clone(),
    level:         body.level,
  });
  Ok(Json(occurrence))
}

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub to:     OccurrenceStatus,
  pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
  pub occurrence: Occurrence,
  pub change:     StatusChange,
}

/// `POST /occurrences/{id}/status`
pub async fn change_status<S: OccurrenceStore>(
  State(state): State<ApiState<S>>,
  Extension(principal): Extension<Principal>,
  Path(id): Path<Uuid>,
  Json(body): Json<StatusBody>,
) -> Result<Json<StatusResponse>, ApiError> {
  require_admin(&principal)?;
  let request = TransitionRequest {
    to:     body.to,
    actor:  principal.username.clone(),
    reason: body.reason,
  };
  let (occurrence, change) = state
    .store
    .transition(principal.tenant_id, id, request)
    .await
    .map_err(ApiError::store)?;

  if let Some(from) = change.from {
    tracing::info!(
      protocol = %occurrence.protocol,
      %from,
      to = %change.to,
      actor = %change.actor,
      "occurrence status changed"
    );
    state.events.publish(OccurrenceEvent::StatusChanged {
      tenant_id: occurrence.tenant_id,
      occurrence_id: occurrence.occurrence_id,
      protocol: occurrence.protocol.clone(),
      from,
      to: change.to,
    });
  }
  Ok(Json(StatusResponse { occurrence, change }))
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OutcomesBody {
  pub outcomes: Vec<OutcomeType>,
}

/// `PUT /occurrences/{id}/outcomes`
pub async fn set_outcomes<S: OccurrenceStore>(
  State(state): State<ApiState<S>>,
  Extension(principal): Extension<Principal>,
  Path(id): Path<Uuid>,
  Json(body): Json<OutcomesBody>,
) -> Result<Json<Occurrence>, ApiError> {
  require_admin(&principal)?;
  let selection = OutcomeSelection::try_from_iter(body.outcomes)?;
  let occurrence = state
    .store
    .set_outcomes(principal.tenant_id, id, selection)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(occurrence))
}

// ─── Follow-ups ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct FollowUpsResponse {
  pub follow_ups:       FollowUps,
  pub closing_blockers: Vec<ClosingBlocker>,
  pub can_conclude:     bool,
}

/// `GET /occurrences/{id}/follow-ups`
pub async fn follow_ups<S: OccurrenceStore>(
  State(state): State<ApiState<S>>,
  Extension(principal): Extension<Principal>,
  Path(id): Path<Uuid>,
) -> Result<Json<FollowUpsResponse>, ApiError> {
  let view = state
    .store
    .materialize(principal.tenant_id, id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("occurrence {id} not found")))?;

  let can_conclude = view.occurrence.status.reachable().contains(&OccurrenceStatus::Concluded)
    && view.closing_blockers.is_empty();
  Ok(Json(FollowUpsResponse {
    follow_ups: view.follow_ups,
    closing_blockers: view.closing_blockers,
    can_conclude,
  }))
}

// ─── History ─────────────────────────────────────────────────────────────────

/// `GET /occurrences/{id}/history`
pub async fn history<S: OccurrenceStore>(
  State(state): State<ApiState<S>>,
  Extension(principal): Extension<Principal>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<StatusChange>>, ApiError> {
  let history = state
    .store
    .history(principal.tenant_id, id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(history))
}

#[cfg(test)]
mod tests {
  use axum::http::StatusCode;
  use serde_json::json;
  use vigil_core::tenant::Role;

  use crate::test_support::*;

  async fn move_to(h: &Harness, id: &str, to: &str) -> axum::http::Response<axum::body::Body> {
    send(
      h.api(Role::Admin),
      json_request("POST", &format!("/occurrences/{id}/status"), json!({ "to": to })),
    )
    .await
  }

  #[tokio::test]
  async fn staff_cannot_triage() {
    let h = Harness::new().await;
    let id = create(&h, "assistencial").await;

    let resp = send(
      h.api(Role::Staff),
      json_request("POST", &format!("/occurrences/{id}/triage"), json!({
        "level": "near_miss",
      })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
  }

  #[tokio::test]
  async fn second_triage_conflicts() {
    let h = Harness::new().await;
    let id = create(&h, "assistencial").await;
    let uri = format!("/occurrences/{id}/triage");

    let first = send(
      h.api(Role::Admin),
      json_request("POST", &uri, json!({ "level": "evento_adverso" })),
    )
    .await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = send(
      h.api(Role::Admin),
      json_request("POST", &uri, json!({ "level": "near_miss" })),
    )
    .await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(h.events.names(), vec!["occurrence.created", "occurrence.triaged"]);
  }

  #[tokio::test]
  async fn illegal_transition_conflicts() {
    let h = Harness::new().await;
    let id = create(&h, "assistencial").await;
    let resp = move_to(&h, &id, "concluida").await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn closing_reports_blockers_then_succeeds() {
    let h = Harness::new().await;
    let id = create(&h, "assistencial").await;
    assert_eq!(move_to(&h, &id, "em_triagem").await.status(), StatusCode::OK);
    assert_eq!(move_to(&h, &id, "em_analise").await.status(), StatusCode::OK);

    let blocked = move_to(&h, &id, "concluida").await;
    assert_eq!(blocked.status(), StatusCode::CONFLICT);
    let body = body_json(blocked).await;
    assert_eq!(body["blockers"][0]["kind"], "no_outcome");

    let resp = send(
      h.api(Role::Admin),
      json_request("PUT", &format!("/occurrences/{id}/outcomes"), json!({
        "outcomes": ["orientacao"],
      })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let follow = send(
      h.api(Role::Staff),
      empty_request("GET", &format!("/occurrences/{id}/follow-ups")),
    )
    .await;
    assert_eq!(body_json(follow).await["can_conclude"], true);

    let done = move_to(&h, &id, "concluida").await;
    assert_eq!(done.status(), StatusCode::OK);
    let body = body_json(done).await;
    assert_eq!(body["change"]["from"], "em_analise");
    assert!(body["occurrence"]["closed_at"].is_string());

    let history = send(
      h.api(Role::Staff),
      empty_request("GET", &format!("/occurrences/{id}/history")),
    )
    .await;
    assert_eq!(body_json(history).await.as_array().unwrap().len(), 4);
  }

  #[tokio::test]
  async fn exclusive_outcome_is_unprocessable() {
    let h = Harness::new().await;
    let id = create(&h, "assistencial").await;
    move_to(&h, &id, "em_triagem").await;
    move_to(&h, &id, "em_analise").await;

    let resp = send(
      h.api(Role::Admin),
      json_request("PUT", &format!("/occurrences/{id}/outcomes"), json!({
        "outcomes": ["improcedente", "treinamento"],
      })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
  }
}
