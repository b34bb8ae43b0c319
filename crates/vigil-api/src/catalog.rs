//! Static lookup tables clients use to gate their own actions.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/statuses` | Status table with reachable next states |
//! | `GET`  | `/outcomes` | Outcome table with the follow-ups each requires |
//! | `GET`  | `/triage-levels` | Severity levels, lowest priority first |

use axum::Json;
use serde::Serialize;
use strum::IntoEnumIterator as _;
use vigil_core::{
  lifecycle::StatusInfo,
  occurrence::{OccurrenceStatus, TriageLevel},
  outcome::OutcomeType,
};

/// `GET /statuses`
pub async fn statuses() -> Json<Vec<StatusInfo>> {
  Json(OccurrenceStatus::iter().map(StatusInfo::from).collect())
}

#[derive(Debug, Serialize)]
pub struct OutcomeInfo {
  pub outcome:                        OutcomeType,
  pub label:                          &'static str,
  pub requires_capa:                  bool,
  pub requires_external_notification: bool,
  pub exclusive:                      bool,
}

/// `GET /outcomes`
pub async fn outcomes() -> Json<Vec<OutcomeInfo>> {
  Json(
    OutcomeType::iter()
      .map(|outcome| OutcomeInfo {
        outcome,
        label: outcome.label(),
        requires_capa: outcome.requires_capa(),
        requires_external_notification: outcome.requires_external_notification(),
        exclusive: outcome.is_exclusive(),
      })
      .collect(),
  )
}

#[derive(Debug, Serialize)]
pub struct TriageInfo {
  pub level:    TriageLevel,
  pub label:    &'static str,
  pub priority: u8,
}

/// `GET /triage-levels`
pub async fn triage_levels() -> Json<Vec<TriageInfo>> {
  let mut levels: Vec<_> = TriageLevel::iter()
    .map(|level| TriageInfo {
      level,
      label: level.label(),
      priority: level.priority(),
    })
    .collect();
  levels.sort_by_key(|l| l.priority);
  Json(levels)
}
