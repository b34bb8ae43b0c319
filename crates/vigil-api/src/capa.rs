//! Handlers for corrective and preventive actions.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/occurrences/{id}/corrective-actions` | |
//! | `POST` | `/occurrences/{id}/corrective-actions` | Admin. 409 once the occurrence is terminal |
//! | `POST` | `/corrective-actions/{id}/advance` | Admin. Forward-only; `verificada` needs a note |

use axum::{
  Extension, Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use uuid::Uuid;
use vigil_core::{
  capa::{CapaUpdate, CorrectiveAction, NewCorrectiveAction},
  store::OccurrenceStore,
  tenant::Principal,
};

use crate::{ApiState, error::ApiError, require_admin};

/// `GET /occurrences/{id}/corrective-actions`
pub async fn list<S: OccurrenceStore>(
  State(state): State<ApiState<S>>,
  Extension(principal): Extension<Principal>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<CorrectiveAction>>, ApiError> {
  let actions = state
    .store
    .list_corrective_actions(principal.tenant_id, id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(actions))
}

/// `POST /occurrences/{id}/corrective-actions`
pub async fn create<S: OccurrenceStore>(
  State(state): State<ApiState<S>>,
  Extension(principal): Extension<Principal>,
  Path(id): Path<Uuid>,
  Json(body): Json<NewCorrectiveAction>,
) -> Result<impl IntoResponse, ApiError> {
  require_admin(&principal)?;
  let action = state
    .store
    .add_corrective_action(principal.tenant_id, id, body)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(action)))
}

/// `POST /corrective-actions/{id}/advance`
pub async fn advance<S: OccurrenceStore>(
  State(state): State<ApiState<S>>,
  Extension(principal): Extension<Principal>,
  Path(id): Path<Uuid>,
  Json(body): Json<CapaUpdate>,
) -> Result<Json<CorrectiveAction>, ApiError> {
  require_admin(&principal)?;
  let action = state
    .store
    .advance_corrective_action(principal.tenant_id, id, body)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(capa = %action.capa_id, status = %action.status, "corrective action advanced");
  Ok(Json(action))
}
