//! HTTP Basic authentication against the configured accounts.
//!
//! A successful check resolves the caller to a [`Principal`], which the
//! middleware stores as a request extension for the API handlers.

use std::{collections::HashMap, sync::Arc};

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::{Request, State},
  http::{HeaderMap, header},
  middleware::Next,
  response::Response,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use serde::Deserialize;
use uuid::Uuid;
use vigil_core::tenant::{Principal, Role};

use crate::error::Error;

/// One login, as written in `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  pub tenant_id:     Uuid,
  pub role:          Role,
}

/// Accounts indexed by username.
#[derive(Debug, Clone, Default)]
pub struct Accounts(HashMap<String, AccountConfig>);

impl Accounts {
  pub fn new(accounts: impl IntoIterator<Item = AccountConfig>) -> Self {
    Self(
      accounts
        .into_iter()
        .map(|a| (a.username.clone(), a))
        .collect(),
    )
  }
}

/// Verify Basic credentials from `headers` and resolve the caller.
pub fn verify_auth(headers: &HeaderMap, accounts: &Accounts) -> Result<Principal, Error> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(Error::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| Error::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;
  let account = accounts.0.get(username).ok_or(Error::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&account.password_hash)
    .map_err(|_| Error::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)?;

  Ok(Principal {
    username:  account.username.clone(),
    tenant_id: account.tenant_id,
    role:      account.role,
  })
}

/// Middleware: reject with 401 or attach the [`Principal`] and continue.
pub async fn require_auth(
  State(accounts): State<Arc<Accounts>>,
  mut req: Request,
  next: Next,
) -> Result<Response, Error> {
  let principal = verify_auth(req.headers(), &accounts).inspect_err(|_| {
    tracing::debug!(path = %req.uri().path(), "rejected credentials");
  })?;
  req.extensions_mut().insert(principal);
  Ok(next.run(req).await)
}
