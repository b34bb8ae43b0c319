//! HTTP server for Vigil.
//!
//! Wires the [`vigil_api`] routers behind Basic authentication, adds the
//! unauthenticated hand-off and health endpoints, and delivers domain events
//! through a [`webhook::WebhookSink`].

pub mod auth;
pub mod error;
pub mod webhook;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{Json, Router, middleware, routing::get};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use vigil_api::{ApiSettings, ApiState};
use vigil_core::store::OccurrenceStore;

use auth::{AccountConfig, Accounts};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `VIGIL_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                 String,
  #[serde(default = "default_port")]
  pub port:                 u16,
  /// Public URL the server is reachable at; prefixes hand-off links.
  pub base_url:             String,
  pub store_path:           PathBuf,
  pub attachment_dir:       PathBuf,
  #[serde(default = "default_max_attachment_bytes")]
  pub max_attachment_bytes: usize,
  #[serde(default = "default_handoff_ttl_hours")]
  pub handoff_ttl_hours:    u32,
  #[serde(default)]
  pub webhook_url:          Option<String>,
  #[serde(default)]
  pub accounts:             Vec<AccountConfig>,
}

fn default_host() -> String { "127.0.0.1".into() }

fn default_port() -> u16 { 8080 }

fn default_max_attachment_bytes() -> usize { 20 * 1024 * 1024 }

fn default_handoff_ttl_hours() -> u32 { 168 }

impl ServerConfig {
  pub fn api_settings(&self) -> ApiSettings {
    ApiSettings {
      public_base_url:      self.base_url.clone(),
      attachment_dir:       self.attachment_dir.clone(),
      max_attachment_bytes: self.max_attachment_bytes,
      handoff_ttl:          chrono::Duration::hours(i64::from(self.handoff_ttl_hours)),
    }
  }
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state for the whole server.
#[derive(Clone)]
pub struct AppState<S: OccurrenceStore> {
  pub api:      ApiState<S>,
  pub accounts: Arc<Accounts>,
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full application router.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: OccurrenceStore + Clone + 'static,
{
  let api = vigil_api::api_router(state.api.clone()).layer(
    middleware::from_fn_with_state(state.accounts.clone(), auth::require_auth),
  );

  Router::new()
    .route("/health", get(health))
    .nest("/api", api)
    .nest("/public", vigil_api::public_router(state.api))
    .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> {
  Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use tower::ServiceExt as _;
  use uuid::Uuid;
  use vigil_core::{event::NoopSink, tenant::Role};
  use vigil_store_sqlite::SqliteStore;

  use super::*;
  use crate::auth::tests::{basic, hash};

  struct Fixture {
    state:    AppState<SqliteStore>,
    tenant_a: Uuid,
  }

  async fn fixture() -> Fixture {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let tenant_a = Uuid::new_v4();
    let tenant_b = Uuid::new_v4();
    let password = hash("secret");
    let account = |username: &str, tenant_id, role| AccountConfig {
      username: username.into(),
      password_hash: password.clone(),
      tenant_id,
      role,
    };

    let config = ServerConfig {
      host:                 default_host(),
      port:                 default_port(),
      base_url:             "http://localhost:8080".into(),
      store_path:           PathBuf::from(":memory:"),
      attachment_dir:       std::env::temp_dir().join(format!("vigil-server-{}", Uuid::new_v4())),
      max_attachment_bytes: default_max_attachment_bytes(),
      handoff_ttl_hours:    default_handoff_ttl_hours(),
      webhook_url:          None,
      accounts:             vec![
        account("gestor", tenant_a, Role::Admin),
        account("enf.maria", tenant_a, Role::Staff),
        account("outro", tenant_b, Role::Admin),
      ],
    };

    let state = AppState {
      api:      ApiState {
        store:    Arc::new(store),
        events:   Arc::new(NoopSink),
        settings: Arc::new(config.api_settings()),
      },
      accounts: Arc::new(Accounts::new(config.accounts.clone())),
    };
    Fixture { state, tenant_a }
  }

  async fn call(
    state: &AppState<SqliteStore>,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
  ) -> axum::response::Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
      builder = builder.header(header::AUTHORIZATION, basic(user, "secret"));
    }
    let req = match body {
      Some(json) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };
    router(state.clone()).oneshot(req).await.unwrap()
  }

  async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  fn new_occurrence() -> Value {
    json!({
      "kind": "assistencial",
      "subtype": "medicação",
      "description": "Dose dobrada administrada",
    })
  }

  #[tokio::test]
  async fn health_needs_no_credentials() {
    let f = fixture().await;
    let resp = call(&f.state, "GET", "/health", None, None).await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn api_requires_basic_auth() {
    let f = fixture().await;
    let resp = call(&f.state, "GET", "/api/occurrences", None, None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
      resp.headers()[header::WWW_AUTHENTICATE],
      "Basic realm=\"vigil\""
    );
  }

  #[tokio::test]
  async fn principal_comes_from_the_account() {
    let f = fixture().await;
    let resp = call(&f.state, "POST", "/api/occurrences", Some("enf.maria"), Some(new_occurrence())).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["reported_by"], "enf.maria");
    assert_eq!(body["tenant_id"], f.tenant_a.to_string());
  }

  #[tokio::test]
  async fn staff_gets_403_on_admin_routes() {
    let f = fixture().await;
    let created = call(&f.state, "POST", "/api/occurrences", Some("enf.maria"), Some(new_occurrence())).await;
    let id = body_json(created).await["occurrence_id"].as_str().unwrap().to_owned();

    let resp = call(
      &f.state,
      "POST",
      &format!("/api/occurrences/{id}/status"),
      Some("enf.maria"),
      Some(json!({ "to": "em_triagem" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = call(
      &f.state,
      "POST",
      &format!("/api/occurrences/{id}/status"),
      Some("gestor"),
      Some(json!({ "to": "em_triagem" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn tenants_are_isolated() {
    let f = fixture().await;
    let created = call(&f.state, "POST", "/api/occurrences", Some("gestor"), Some(new_occurrence())).await;
    let id = body_json(created).await["occurrence_id"].as_str().unwrap().to_owned();

    let resp = call(&f.state, "GET", &format!("/api/occurrences/{id}"), Some("outro"), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = call(&f.state, "GET", "/api/occurrences", Some("outro"), None).await;
    assert_eq!(body_json(resp).await, json!([]));
  }

  #[tokio::test]
  async fn public_routes_skip_auth() {
    let f = fixture().await;
    let resp = call(&f.state, "GET", "/public/handoffs/abc", None, None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }
}
