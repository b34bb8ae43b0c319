//! Tenancy and the authenticated principal.
//!
//! Every record carries a tenant id and every store call is scoped by one.
//! Resolving *which* tenant a request belongs to is the server's concern;
//! handlers only ever see a [`Principal`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  /// Triages, decides outcomes, manages follow-ups.
  Admin,
  /// Reports occurrences and uploads attachments.
  Staff,
}

/// The caller of an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
  pub username:  String,
  pub tenant_id: Uuid,
  pub role:      Role,
}

impl Principal {
  pub fn is_admin(&self) -> bool { self.role == Role::Admin }
}
