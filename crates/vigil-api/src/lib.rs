//! JSON REST API for Vigil.
//!
//! Exposes axum [`Router`]s backed by any
//! [`vigil_core::store::OccurrenceStore`]. Handlers read the caller from a
//! [`Principal`] request extension; resolving it (auth, tenancy) and TLS are
//! the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! Router::new()
//!   .nest("/api", vigil_api::api_router(state.clone()).layer(auth))
//!   .nest("/public", vigil_api::public_router(state))
//! ```

pub mod attachments;
pub mod capa;
pub mod catalog;
pub mod dashboard;
pub mod error;
pub mod handoff;
pub mod lifecycle;
pub mod notification;
pub mod occurrences;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{get, post, put},
};
use vigil_core::{event::EventSink, store::OccurrenceStore, tenant::Principal};

pub use error::ApiError;

// ─── State ───────────────────────────────────────────────────────────────────

/// Knobs the handlers need from the server configuration.
#[derive(Debug, Clone)]
pub struct ApiSettings {
  /// Public base URL, used to build hand-off links.
  pub public_base_url:      String,
  /// Root directory for attachment bytes.
  pub attachment_dir:       PathBuf,
  pub max_attachment_bytes: usize,
  pub handoff_ttl:          chrono::Duration,
}

/// Shared state threaded through all API handlers.
#[derive(Clone)]
pub struct ApiState<S: OccurrenceStore> {
  pub store:    Arc<S>,
  pub events:   Arc<dyn EventSink>,
  pub settings: Arc<ApiSettings>,
}

/// Fails with 403 unless the caller is a tenant administrator.
pub(crate) fn require_admin(principal: &Principal) -> Result<(), ApiError> {
  if principal.is_admin() {
    Ok(())
  } else {
    Err(ApiError::Forbidden(format!(
      "{} is not an administrator",
      principal.username
    )))
  }
}

// ─── Routers ─────────────────────────────────────────────────────────────────

/// The authenticated API. Every request must carry a [`Principal`]
/// extension.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: OccurrenceStore + Clone + 'static,
{
  let upload_limit = state.settings.max_attachment_bytes;

  Router::new()
    // Occurrences
    .route(
      "/occurrences",
      get(occurrences::list::<S>).post(occurrences::create::<S>),
    )
    .route(
      "/occurrences/{id}",
      get(occurrences::get_one::<S>).patch(occurrences::update::<S>),
    )
    // Lifecycle
    .route("/occurrences/{id}/triage", post(lifecycle::triage::<S>))
    .route("/occurrences/{id}/status", post(lifecycle::change_status::<S>))
    .route("/occurrences/{id}/outcomes", put(lifecycle::set_outcomes::<S>))
    .route("/occurrences/{id}/follow-ups", get(lifecycle::follow_ups::<S>))
    .route("/occurrences/{id}/history", get(lifecycle::history::<S>))
    // Follow-up records
    .route("/occurrences/{id}/notification", post(notification::record::<S>))
    .route(
      "/occurrences/{id}/corrective-actions",
      get(capa::list::<S>).post(capa::create::<S>),
    )
    .route("/corrective-actions/{id}/advance", post(capa::advance::<S>))
    // Attachments
    .route(
      "/occurrences/{id}/attachments",
      get(attachments::list::<S>)
        .post(attachments::upload::<S>)
        .layer(DefaultBodyLimit::max(upload_limit)),
    )
    .route("/attachments/{id}", get(attachments::download::<S>))
    // Doctor hand-off
    .route("/occurrences/{id}/handoff", post(handoff::issue::<S>))
    // Reads
    .route("/dashboard", get(dashboard::handler::<S>))
    .route("/statuses", get(catalog::statuses))
    .route("/outcomes", get(catalog::outcomes))
    .route("/triage-levels", get(catalog::triage_levels))
    .with_state(state)
}

/// The unauthenticated hand-off endpoints; the token in the path is the
/// credential.
pub fn public_router<S>(state: ApiState<S>) -> Router<()>
where
  S: OccurrenceStore + Clone + 'static,
{
  Router::new()
    .route("/handoffs/{token}", get(handoff::public_view::<S>))
    .route("/handoffs/{token}/review", post(handoff::public_review::<S>))
    .with_state(state)
}
