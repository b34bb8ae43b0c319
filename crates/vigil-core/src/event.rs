//! Domain events and the sink they are published to.
//!
//! Publishing happens after the write has committed and never fails from the
//! caller's point of view; a sink that delivers over the network does so in
//! the background.

use serde::Serialize;
use uuid::Uuid;

use crate::occurrence::{
  DoctorContact, OccurrenceKind, OccurrenceStatus, TriageLevel,
};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum OccurrenceEvent {
  #[serde(rename = "occurrence.created")]
  Created {
    tenant_id:     Uuid,
    occurrence_id: Uuid,
    protocol:      String,
    kind:          OccurrenceKind,
  },
  #[serde(rename = "occurrence.triaged")]
  Triaged {
    tenant_id:     Uuid,
    occurrence_id: Uuid,
    protocol:      String,
    level:         TriageLevel,
  },
  #[serde(rename = "occurrence.status_changed")]
  StatusChanged {
    tenant_id:     Uuid,
    occurrence_id: Uuid,
    protocol:      String,
    from:          OccurrenceStatus,
    to:            OccurrenceStatus,
  },
  #[serde(rename = "exam_review.requested")]
  ReviewRequested {
    tenant_id:     Uuid,
    occurrence_id: Uuid,
    protocol:      String,
    doctor:        DoctorContact,
    link:          String,
  },
  #[serde(rename = "exam_review.answered")]
  ReviewAnswered {
    tenant_id:     Uuid,
    occurrence_id: Uuid,
    protocol:      String,
    doctor_name:   String,
  },
}

impl OccurrenceEvent {
  /// The wire name, also sent as a webhook header.
  pub fn name(&self) -> &'static str {
    match self {
      Self::Created { .. } => "occurrence.created",
      Self::Triaged { .. } => "occurrence.triaged",
      Self::StatusChanged { .. } => "occurrence.status_changed",
      Self::ReviewRequested { .. } => "exam_review.requested",
      Self::ReviewAnswered { .. } => "exam_review.answered",
    }
  }

  pub fn occurrence_id(&self) -> Uuid {
    match self {
      Self::Created { occurrence_id, .. }
      | Self::Triaged { occurrence_id, .. }
      | Self::StatusChanged { occurrence_id, .. }
      | Self::ReviewRequested { occurrence_id, .. }
      | Self::ReviewAnswered { occurrence_id, .. } => *occurrence_id,
    }
  }
}

/// Receives events after successful writes.
pub trait EventSink: Send + Sync {
  fn publish(&self, event: OccurrenceEvent);
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
  fn publish(&self, _event: OccurrenceEvent) {}
}
