//! Handlers for `/occurrences` endpoints.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/occurrences` | `?status=&kind=&triage=&q=&created_after=&created_before=&limit=&offset=` |
//! | `POST`  | `/occurrences` | Any role. Reporter is the caller |
//! | `GET`   | `/occurrences/{id}` | Full view: follow-ups, blockers, CAPAs, attachments, history |
//! | `PATCH` | `/occurrences/{id}` | Free-text details only; `null` clears an optional field; 409 once terminal |

use axum::{
  Extension, Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use uuid::Uuid;
use vigil_core::{
  event::OccurrenceEvent,
  lifecycle::OccurrenceView,
  occurrence::{
    NewOccurrence, Occurrence, OccurrenceDetails, OccurrenceKind,
    OccurrenceStatus, TriageLevel,
  },
  store::{OccurrenceQuery, OccurrenceStore},
  tenant::Principal,
};

use crate::{ApiState, error::ApiError};

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub status:         Option<OccurrenceStatus>,
  pub kind:           Option<OccurrenceKind>,
  pub triage:         Option<TriageLevel>,
  pub q:              Option<String>,
  pub created_after:  Option<DateTime<Utc>>,
  pub created_before: Option<DateTime<Utc>>,
  pub limit:          Option<usize>,
  pub offset:         Option<usize>,
}

/// `GET /occurrences`
pub async fn list<S: OccurrenceStore>(
  State(state): State<ApiState<S>>,
  Extension(principal): Extension<Principal>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Occurrence>>, ApiError> {
  let query = OccurrenceQuery {
    status:         params.status,
    kind:           params.kind,
    triage:         params.triage,
    text:           params.q,
    created_after:  params.created_after,
    created_before: params.created_before,
    limit:          params.limit,
    offset:         params.offset,
  };
  let occurrences = state
    .store
    .list_occurrences(principal.tenant_id, &query)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(occurrences))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub kind:             OccurrenceKind,
  pub subtype:          String,
  pub description:      String,
  pub location:         Option<String>,
  pub immediate_action: Option<String>,
  pub occurred_at:      Option<DateTime<Utc>>,
}

/// `POST /occurrences`
pub async fn create<S: OccurrenceStore>(
  State(state): State<ApiState<S>>,
  Extension(principal): Extension<Principal>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let input = NewOccurrence {
    kind:        body.kind,
    subtype:     body.subtype,
    details:     OccurrenceDetails {
      description:      body.description,
      location:         body.location,
      immediate_action: body.immediate_action,
      occurred_at:      body.occurred_at,
    },
    reported_by: principal.username.clone(),
  };

  let occurrence = state
    .store
    .create_occurrence(principal.tenant_id, input)
    .await
    .map_err(ApiError::store)?;

  tracing::info!(
    protocol = %occurrence.protocol,
    tenant = %principal.tenant_id,
    reporter = %principal.username,
    "occurrence registered"
  );
  state.events.publish(OccurrenceEvent::Created {
    tenant_id:     occurrence.tenant_id,
    occurrence_id: occurrence.occurrence_id,
    protocol:      occurrence.protocol.clone(),
    kind:          occurrence.kind,
  });

  Ok((StatusCode::CREATED, Json(occurrence)))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /occurrences/{id}`
pub async fn get_one<S: OccurrenceStore>(
  State(state): State<ApiState<S>>,
  Extension(principal): Extension<Principal>,
  Path(id): Path<Uuid>,
) -> Result<Json<OccurrenceView>, ApiError> {
  let view = state
    .store
    .materialize(principal.tenant_id, id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("occurrence {id} not found")))?;
  Ok(Json(view))
}

// ─── Update details ──────────────────────────────────────────────────────────

/// Fields left out keep their current value; an explicit `null` clears an
/// optional one.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateBody {
  pub description:      Option<String>,
  #[serde(default, deserialize_with = "present")]
  pub location:         Option<Option<String>>,
  #[serde(default, deserialize_with = "present")]
  pub immediate_action: Option<Option<String>>,
  #[serde(default, deserialize_with = "present")]
  pub occurred_at:      Option<Option<DateTime<Utc>>>,
}

/// Maps a present key to `Some`, so `null` becomes `Some(None)` while a
/// missing key stays `None` through `#[serde(default)]`.
fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
  T: Deserialize<'de>,
  D: Deserializer<'de>,
{
  Option::<T>::deserialize(deserializer).map(Some)
}

impl UpdateBody {
  fn apply(self, mut details: OccurrenceDetails) -> OccurrenceDetails {
    if let Some(d) = self.description {
      details.description = d;
    }
    if let Some(location) = self.location {
      details.location = location;
    }
    if let Some(action) = self.immediate_action {
      details.immediate_action = action;
    }
    if let Some(at) = self.occurred_at {
      details.occurred_at = at;
    }
    details
  }
}

/// `PATCH /occurrences/{id}`
pub async fn update<S: OccurrenceStore>(
  State(state): State<ApiState<S>>,
  Extension(principal): Extension<Principal>,
  Path(id): Path<Uuid>,
  Json(body): Json<UpdateBody>,
) -> Result<Json<Occurrence>, ApiError> {
  let current = state
    .store
    .get_occurrence(principal.tenant_id, id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("occurrence {id} not found")))?;

  let occurrence = state
    .store
    .update_details(principal.tenant_id, id, body.apply(current.details))
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
  async fn create_assigns_protocol_and_emits_event() {
    let h = Harness::new().await;
    let resp = send(
      h.api(Role::Staff),
      json_request("POST", "/occurrences", json!({
        "kind": "tecnica",
        "subtype": "equipamento",
        "description": "Bomba de infusão alarmando",
      })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body = body_json(resp).await;
    assert_eq!(body["status"], "registrada");
    assert_eq!(body["reported_by"], "enf.maria");
    assert!(body["protocol"].as_str().unwrap().starts_with("OC-"));
    assert_eq!(h.events.names(), vec!["occurrence.created"]);
  }

  #[tokio::test]
  async fn unknown_kind_is_rejected() {
    let h = Harness::new().await;
    let resp = send(
      h.api(Role::Staff),
      json_request("POST", "/occurrences", json!({
        "kind": "financeira",
        "subtype": "x",
        "description": "x",
      })),
    )
    .await;
    assert!(resp.status().is_client_error());
  }

  #[tokio::test]
  async fn get_returns_the_full_view() {
    let h = Harness::new().await;
    let id = create(&h, "assistencial").await;

    let resp = send(
      h.api(Role::Staff),
      empty_request("GET", &format!("/occurrences/{id}")),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["occurrence"]["occurrence_id"], id.as_str());
    assert_eq!(body["history"].as_array().unwrap().len(), 1);
    assert_eq!(body["closing_blockers"][0]["kind"], "no_outcome");
  }

  #[tokio::test]
  async fn missing_occurrence_is_404() {
    let h = Harness::new().await;
    let resp = send(
      h.api(Role::Admin),
      empty_request("GET", &format!("/occurrences/{}", uuid::Uuid::new_v4())),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn patch_merges_details() {
    let h = Harness::new().await;
    let id = create(&h, "assistencial").await;

    let resp = send(
      h.api(Role::Staff),
      json_request("PATCH", &format!("/occurrences/{id}"), json!({
        "immediate_action": "Paciente avaliado pelo plantonista",
      })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["details"]["location"], "Ala B");
    assert_eq!(
      body["details"]["immediate_action"],
      "Paciente avaliado pelo plantonista"
    );
  }

  #[tokio::test]
  async fn patch_null_clears_an_optional_field() {
    let h = Harness::new().await;
    let id = create(&h, "assistencial").await;
    let uri = format!("/occurrences/{id}");

    let resp = send(
      h.api(Role::Staff),
      json_request("PATCH", &uri, json!({
        "location": null,
        "occurred_at": "2026-05-02T08:30:00Z",
      })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert!(body["details"]["location"].is_null());
    assert!(body["details"]["occurred_at"].is_string());

    let resp = send(
      h.api(Role::Staff),
      json_request("PATCH", &uri, json!({ "occurred_at": null })),
    )
    .await;
    let body = body_json(resp).await;
    assert!(body["details"]["occurred_at"].is_null());
    assert!(body["details"]["location"].is_null());
  }

  #[tokio::test]
  async fn list_filters_by_kind() {
    let h = Harness::new().await;
    create(&h, "assistencial").await;
    create(&h, "tecnica").await;

    let resp = send(
      h.api(Role::Staff),
      empty_request("GET", "/occurrences?kind=tecnica"),
    )
    .await;
    let body = body_json(resp).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["kind"], "tecnica");
  }
}
