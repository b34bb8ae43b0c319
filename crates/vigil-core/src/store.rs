//! The `OccurrenceStore` trait and supporting query types.
//!
//! Implemented by storage backends (e.g. `vigil-store-sqlite`). The API layer
//! depends on this abstraction only. Every method except the two public
//! hand-off lookups is scoped by a tenant id; a record belonging to another
//! tenant behaves exactly like a missing one.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  attachment::{Attachment, NewAttachment},
  capa::{CapaUpdate, CorrectiveAction, NewCorrectiveAction},
  dashboard::{Dashboard, DashboardQuery},
  lifecycle::{OccurrenceView, StatusChange, TransitionRequest},
  occurrence::{
    DoctorReview, NewExternalNotification, NewOccurrence, Occurrence,
    OccurrenceDetails, OccurrenceKind, OccurrenceStatus, PublicHandoff,
    TriageLevel,
  },
  outcome::OutcomeSelection,
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`OccurrenceStore::list_occurrences`].
#[derive(Debug, Clone, Default)]
pub struct OccurrenceQuery {
  pub status:         Option<OccurrenceStatus>,
  pub kind:           Option<OccurrenceKind>,
  pub triage:         Option<TriageLevel>,
  /// Free-text filter over protocol, subtype and description.
  pub text:           Option<String>,
  pub created_after:  Option<DateTime<Utc>>,
  pub created_before: Option<DateTime<Utc>>,
  pub limit:          Option<usize>,
  pub offset:         Option<usize>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over an occurrence store backend.
///
/// Write methods enforce the lifecycle rules from [`crate::lifecycle`] and
/// surface violations as [`crate::Error`] values wrapped in `Self::Error`.
///
/// All methods return `Send` futures so the trait can be used from axum
/// handlers on a multi-threaded runtime.
pub trait OccurrenceStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Occurrences ───────────────────────────────────────────────────────

  /// Persist a new occurrence in `registrada`, assigning the next protocol
  /// code for the tenant and appending the creation history entry.
  fn create_occurrence(
    &self,
    tenant_id: Uuid,
    input: NewOccurrence,
  ) -> impl Future<Output = Result<Occurrence, Self::Error>> + Send + '_;

  fn get_occurrence(
    &self,
    tenant_id: Uuid,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Occurrence>, Self::Error>> + Send + '_;

  /// Newest first.
  fn list_occurrences<'a>(
    &'a self,
    tenant_id: Uuid,
    query: &'a OccurrenceQuery,
  ) -> impl Future<Output = Result<Vec<Occurrence>, Self::Error>> + Send + 'a;

  /// Replace the free-text details of a non-terminal occurrence.
  fn update_details(
    &self,
    tenant_id: Uuid,
    id: Uuid,
    details: OccurrenceDetails,
  ) -> impl Future<Output = Result<Occurrence, Self::Error>> + Send + '_;

  // ── Lifecycle ─────────────────────────────────────────────────────────

  /// Set the triage level. Fails if triage was already set.
  fn set_triage(
    &self,
    tenant_id: Uuid,
    id: Uuid,
    level: TriageLevel,
  ) -> impl Future<Output = Result<Occurrence, Self::Error>> + Send + '_;

  /// Move to a new status and append the history entry atomically.
  fn transition(
    &self,
    tenant_id: Uuid,
    id: Uuid,
    request: TransitionRequest,
  ) -> impl Future<Output = Result<(Occurrence, StatusChange), Self::Error>>
  + Send
  + '_;

  fn set_outcomes(
    &self,
    tenant_id: Uuid,
    id: Uuid,
    outcomes: OutcomeSelection,
  ) -> impl Future<Output = Result<Occurrence, Self::Error>> + Send + '_;

  /// Record the external notification. At most once per occurrence.
  fn record_notification(
    &self,
    tenant_id: Uuid,
    id: Uuid,
    input: NewExternalNotification,
  ) -> impl Future<Output = Result<Occurrence, Self::Error>> + Send + '_;

  /// Append-only status history, oldest first.
  fn history(
    &self,
    tenant_id: Uuid,
    id: Uuid,
  ) -> impl Future<Output = Result<Vec<StatusChange>, Self::Error>> + Send + '_;

  // ── Corrective actions ────────────────────────────────────────────────

  fn add_corrective_action(
    &self,
    tenant_id: Uuid,
    occurrence_id: Uuid,
    input: NewCorrectiveAction,
  ) -> impl Future<Output = Result<CorrectiveAction, Self::Error>> + Send + '_;

  fn advance_corrective_action(
    &self,
    tenant_id: Uuid,
    capa_id: Uuid,
    update: CapaUpdate,
  ) -> impl Future<Output = Result<CorrectiveAction, Self::Error>> + Send + '_;

  fn list_corrective_actions(
    &self,
    tenant_id: Uuid,
    occurrence_id: Uuid,
  ) -> impl Future<Output = Result<Vec<CorrectiveAction>, Self::Error>> + Send + '_;

  // ── Attachments ───────────────────────────────────────────────────────

  fn add_attachment(
    &self,
    tenant_id: Uuid,
    input: NewAttachment,
  ) -> impl Future<Output = Result<Attachment, Self::Error>> + Send + '_;

  fn get_attachment(
    &self,
    tenant_id: Uuid,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Attachment>, Self::Error>> + Send + '_;

  fn list_attachments(
    &self,
    tenant_id: Uuid,
    occurrence_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Attachment>, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Assemble the full [`OccurrenceView`]. `None` if the occurrence does not
  /// exist for this tenant.
  fn materialize(
    &self,
    tenant_id: Uuid,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<OccurrenceView>, Self::Error>> + Send + '_;

  fn dashboard<'a>(
    &'a self,
    tenant_id: Uuid,
    query: &'a DashboardQuery,
  ) -> impl Future<Output = Result<Dashboard, Self::Error>> + Send + 'a;

  // ── Doctor hand-off ───────────────────────────────────────────────────

  /// Attach a fresh hand-off to an exam-review occurrence, replacing any
  /// earlier unanswered one.
  fn issue_handoff(
    &self,
    tenant_id: Uuid,
    id: Uuid,
    handoff: PublicHandoff,
  ) -> impl Future<Output = Result<Occurrence, Self::Error>> + Send + '_;

  /// Look up an occurrence by the digest of its public token. Not
  /// tenant-scoped: the token is the credential.
  fn find_by_handoff(
    &self,
    token_hash: String,
  ) -> impl Future<Output = Result<Option<Occurrence>, Self::Error>> + Send + '_;

  /// Store the doctor's review and revoke the token.
  fn submit_review(
    &self,
    token_hash: String,
    review: DoctorReview,
  ) -> impl Future<Output = Result<Occurrence, Self::Error>> + Send + '_;
}
