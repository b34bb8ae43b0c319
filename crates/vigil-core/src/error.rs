//! Error types for `vigil-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::{
  capa::CapaStatus,
  lifecycle::ClosingBlocker,
  occurrence::OccurrenceStatus,
};

#[derive(Debug, Error)]
pub enum Error {
  #[error("occurrence not found: {0}")]
  OccurrenceNotFound(Uuid),

  #[error("corrective action not found: {0}")]
  CorrectiveActionNotFound(Uuid),

  #[error("attachment not found: {0}")]
  AttachmentNotFound(Uuid),

  #[error("cannot move occurrence from {from} to {to}")]
  IllegalTransition {
    from: OccurrenceStatus,
    to:   OccurrenceStatus,
  },

  #[error("occurrence {0} has already been triaged")]
  TriageAlreadySet(Uuid),

  #[error("triage is not accepted while the occurrence is {0}")]
  TriageNotAllowed(OccurrenceStatus),

  #[error("occurrence cannot be concluded: {}", describe_blockers(.0))]
  ClosingBlocked(Vec<ClosingBlocker>),

  #[error("\"improcedente\" cannot be combined with other outcomes")]
  ExclusiveOutcome,

  #[error("outcomes cannot be set while the occurrence is {0}")]
  OutcomeNotAllowed(OccurrenceStatus),

  #[error("occurrence {0} already has an external notification")]
  NotificationAlreadyRecorded(Uuid),

  #[error("corrective action cannot move from {from} to {to}")]
  IllegalCapaAdvance { from: CapaStatus, to: CapaStatus },

  #[error("occurrence is {0} and can no longer be edited")]
  Terminal(OccurrenceStatus),

  #[error("exam-review hand-off link not found")]
  HandoffNotFound,

  #[error("exam-review hand-off link has expired")]
  HandoffExpired,

  #[error("validation failed: {0}")]
  Validation(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

fn describe_blockers(blockers: &[ClosingBlocker]) -> String {
  blockers
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join("; ")
}
