//! `GET /dashboard[?created_after=&created_before=]`: tenant-wide counts.

use axum::{
  Extension, Json,
  extract::{Query, State},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use vigil_core::{
  dashboard::{Dashboard, DashboardQuery},
  store::OccurrenceStore,
  tenant::Principal,
};

use crate::{ApiState, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct DashboardParams {
  pub created_after:  Option<DateTime<Utc>>,
  pub created_before: Option<DateTime<Utc>>,
}

pub async fn handler<S: OccurrenceStore>(
  State(state): State<ApiState<S>>,
  Extension(principal): Extension<Principal>,
  Query(params): Query<DashboardParams>,
) -> Result<Json<Dashboard>, ApiError> {
  if let (Some(after), Some(before)) = (params.created_after, params.created_before) {
    if after >= before {
      return Err(ApiError::BadRequest(
        "created_after must be earlier than created_before".into(),
      ));
    }
  }

  let query = DashboardQuery {
    created_after:  params.created_after,
    created_before: params.created_before,
  };
  let dashboard = state
    .store
    .dashboard(principal.tenant_id, &query)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(dashboard))
}

#[cfg(test)]
mod tests {
  use axum::http::StatusCode;
  use vigil_core::tenant::Role;

  use crate::test_support::*;

  #[tokio::test]
  async fn counts_by_status_and_kind() {
    let h = Harness::new().await;
    create(&h, "assistencial").await;
    create(&h, "tecnica").await;

    let resp = send(h.api(Role::Admin), empty_request("GET", "/dashboard")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["by_status"]["registrada"], 2);
    assert_eq!(body["by_kind"]["tecnica"], 1);
    assert_eq!(body["untriaged"], 2);
  }

  #[tokio::test]
  async fn inverted_range_is_bad_request() {
    let h = Harness::new().await;
    let resp = send(
      h.api(Role::Admin),
      empty_request(
        "GET",
        "/dashboard?created_after=2026-02-01T00:00:00Z&created_before=2026-01-01T00:00:00Z",
      ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }
}
