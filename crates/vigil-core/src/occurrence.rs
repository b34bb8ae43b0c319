//! Occurrence types: the reported incident and everything hanging off it.
//!
//! An occurrence is mutable only through the operations the lifecycle allows:
//! triage once, outcome selection, status changes that satisfy the transition
//! table, and follow-up records. Every status change is mirrored into the
//! append-only history (see [`crate::lifecycle::StatusChange`]).

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::{
  Error, Result,
  lifecycle::{FollowUps, required_follow_ups},
  outcome::OutcomeSelection,
};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Where an occurrence sits in its lifecycle. The transition table lives in
/// [`crate::lifecycle`].
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  IntoStaticStr,
)]
pub enum OccurrenceStatus {
  #[serde(rename = "registrada")]
  #[strum(serialize = "registrada")]
  Registered,
  #[serde(rename = "em_triagem")]
  #[strum(serialize = "em_triagem")]
  InTriage,
  #[serde(rename = "em_analise")]
  #[strum(serialize = "em_analise")]
  InAnalysis,
  #[serde(rename = "acao_em_andamento")]
  #[strum(serialize = "acao_em_andamento")]
  ActionInProgress,
  #[serde(rename = "concluida")]
  #[strum(serialize = "concluida")]
  Concluded,
  #[serde(rename = "improcedente")]
  #[strum(serialize = "improcedente")]
  NotApplicable,
}

// ─── Kind ────────────────────────────────────────────────────────────────────

/// The broad category chosen by the reporter.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  IntoStaticStr,
)]
pub enum OccurrenceKind {
  /// Patient-safety event.
  #[serde(rename = "assistencial")]
  #[strum(serialize = "assistencial")]
  Clinical,
  #[serde(rename = "administrativa")]
  #[strum(serialize = "administrativa")]
  Administrative,
  /// Equipment or infrastructure fault.
  #[serde(rename = "tecnica")]
  #[strum(serialize = "tecnica")]
  Technical,
  /// A case routed to a doctor through the public hand-off link.
  #[serde(rename = "revisao_exame")]
  #[strum(serialize = "revisao_exame")]
  ExamReview,
}

// ─── Triage ──────────────────────────────────────────────────────────────────

/// Severity classification assigned once by an administrator. Variants are
/// declared in ascending priority, so the derived `Ord` ranks by severity.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  IntoStaticStr,
)]
pub enum TriageLevel {
  #[serde(rename = "circunstancia_risco")]
  #[strum(serialize = "circunstancia_risco")]
  RiskCircumstance,
  #[serde(rename = "near_miss")]
  #[strum(serialize = "near_miss")]
  NearMiss,
  #[serde(rename = "incidente_sem_dano")]
  #[strum(serialize = "incidente_sem_dano")]
  NoHarmIncident,
  #[serde(rename = "evento_adverso")]
  #[strum(serialize = "evento_adverso")]
  AdverseEvent,
  #[serde(rename = "evento_sentinela")]
  #[strum(serialize = "evento_sentinela")]
  SentinelEvent,
}

impl TriageLevel {
  /// 1 (lowest) to 5 (highest).
  pub fn priority(self) -> u8 {
    match self {
      Self::RiskCircumstance => 1,
      Self::NearMiss => 2,
      Self::NoHarmIncident => 3,
      Self::AdverseEvent => 4,
      Self::SentinelEvent => 5,
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      Self::RiskCircumstance => "Circunstância de risco",
      Self::NearMiss => "Near miss",
      Self::NoHarmIncident => "Incidente sem dano",
      Self::AdverseEvent => "Evento adverso",
      Self::SentinelEvent => "Evento sentinela",
    }
  }
}

// ─── Free-text details ───────────────────────────────────────────────────────

/// The reporter-supplied narrative of an occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccurrenceDetails {
  pub description:      String,
  /// Sector, room or unit where it happened.
  pub location:         Option<String>,
  /// What was done on the spot, before any triage.
  pub immediate_action: Option<String>,
  pub occurred_at:      Option<DateTime<Utc>>,
}

impl OccurrenceDetails {
  pub fn validate(&self) -> Result<()> {
    if self.description.trim().is_empty() {
      return Err(Error::Validation("description must not be empty".into()));
    }
    Ok(())
  }
}

// ─── External notification ───────────────────────────────────────────────────

/// A record of notifying an outside regulatory body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalNotification {
  pub agency:        String,
  pub notified_on:   NaiveDate,
  pub responsible:   String,
  pub attachment_id: Option<Uuid>,
  pub recorded_at:   DateTime<Utc>,
}

impl ExternalNotification {
  pub fn is_complete(&self) -> bool {
    !self.agency.trim().is_empty() && !self.responsible.trim().is_empty()
  }
}

/// Input to [`crate::store::OccurrenceStore::record_notification`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExternalNotification {
  pub agency:        String,
  pub notified_on:   NaiveDate,
  pub responsible:   String,
  pub attachment_id: Option<Uuid>,
}

impl NewExternalNotification {
  pub fn validate(&self) -> Result<()> {
    if self.agency.trim().is_empty() {
      return Err(Error::Validation("agency must not be empty".into()));
    }
    if self.responsible.trim().is_empty() {
      return Err(Error::Validation("responsible must not be empty".into()));
    }
    Ok(())
  }

  pub fn into_record(self, recorded_at: DateTime<Utc>) -> ExternalNotification {
    ExternalNotification {
      agency: self.agency,
      notified_on: self.notified_on,
      responsible: self.responsible,
      attachment_id: self.attachment_id,
      recorded_at,
    }
  }
}

// ─── Doctor hand-off ─────────────────────────────────────────────────────────

/// Who receives the public exam-review link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorContact {
  pub name:  String,
  pub email: Option<String>,
  pub phone: Option<String>,
}

/// An outstanding public link. Only the SHA-256 digest of the token is kept;
/// it is never serialised back out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicHandoff {
  pub doctor:     DoctorContact,
  #[serde(skip_serializing, default)]
  pub token_hash: String,
  pub issued_at:  DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
}

impl PublicHandoff {
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool { now >= self.expires_at }
}

/// The doctor's answer, submitted through the public link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorReview {
  pub doctor_name:  String,
  pub opinion:      String,
  pub submitted_at: DateTime<Utc>,
}

// ─── Occurrence ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Occurrence {
  pub occurrence_id:         Uuid,
  pub tenant_id:             Uuid,
  /// Human-readable sequential code, e.g. `OC-2026-00042`.
  pub protocol:              String,
  pub kind:                  OccurrenceKind,
  pub subtype:               String,
  pub details:               OccurrenceDetails,
  pub reported_by:           String,
  pub status:                OccurrenceStatus,
  pub triage:                Option<TriageLevel>,
  pub outcomes:              OutcomeSelection,
  pub external_notification: Option<ExternalNotification>,
  pub handoff:               Option<PublicHandoff>,
  pub doctor_review:         Option<DoctorReview>,
  pub created_at:            DateTime<Utc>,
  pub updated_at:            DateTime<Utc>,
  pub triaged_at:            Option<DateTime<Utc>>,
  pub outcome_at:            Option<DateTime<Utc>>,
  pub closed_at:             Option<DateTime<Utc>>,
}

impl Occurrence {
  pub fn is_terminal(&self) -> bool { self.status.is_terminal() }

  /// Fails with [`Error::Terminal`] once the occurrence is closed.
  pub fn ensure_editable(&self) -> Result<()> {
    if self.is_terminal() {
      return Err(Error::Terminal(self.status));
    }
    Ok(())
  }

  /// Triage is settable exactly once, before analysis starts.
  pub fn check_triage(&self) -> Result<()> {
    if self.triage.is_some() {
      return Err(Error::TriageAlreadySet(self.occurrence_id));
    }
    match self.status {
      OccurrenceStatus::Registered | OccurrenceStatus::InTriage => Ok(()),
      other => Err(Error::TriageNotAllowed(other)),
    }
  }

  pub fn check_outcomes(&self) -> Result<()> {
    match self.status {
      OccurrenceStatus::InAnalysis | OccurrenceStatus::ActionInProgress => {
        Ok(())
      }
      other => Err(Error::OutcomeNotAllowed(other)),
    }
  }

  pub fn check_notification(&self) -> Result<()> {
    self.ensure_editable()?;
    if self.external_notification.is_some() {
      return Err(Error::NotificationAlreadyRecorded(self.occurrence_id));
    }
    Ok(())
  }

  pub fn follow_ups(&self) -> FollowUps {
    required_follow_ups(self.outcomes.iter())
  }

  /// Whether a doctor hand-off may be issued for this occurrence.
  pub fn check_handoff(&self) -> Result<()> {
    self.ensure_editable()?;
    if self.kind != OccurrenceKind::ExamReview {
      return Err(Error::Validation(
        "hand-off is only available for exam-review occurrences".into(),
      ));
    }
    if self.doctor_review.is_some() {
      return Err(Error::Validation("the doctor has already answered".into()));
    }
    Ok(())
  }

  /// The outstanding hand-off, if its link can still be used at `now`.
  pub fn active_handoff(&self, now: DateTime<Utc>) -> Result<&PublicHandoff> {
    self.ensure_editable()?;
    let handoff = self
      .handoff
      .as_ref()
      .filter(|h| !h.token_hash.is_empty())
      .ok_or(Error::HandoffNotFound)?;
    if handoff.is_expired(now) {
      return Err(Error::HandoffExpired);
    }
    Ok(handoff)
  }
}

/// Input to [`crate::store::OccurrenceStore::create_occurrence`]. Protocol,
/// status and timestamps are assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOccurrence {
  pub kind:        OccurrenceKind,
  pub subtype:     String,
  pub details:     OccurrenceDetails,
  pub reported_by: String,
}

impl NewOccurrence {
  pub fn validate(&self) -> Result<()> {
    if self.subtype.trim().is_empty() {
      return Err(Error::Validation("subtype must not be empty".into()));
    }
    self.details.validate()
  }
}

// ─── Protocol codes ──────────────────────────────────────────────────────────

/// Format the protocol code for the `sequence`-th occurrence of `year`.
pub fn protocol_code(year: i32, sequence: u32) -> String {
  format!("OC-{year}-{sequence:05}")
}

/// The year a protocol sequence is counted under.
pub fn protocol_year(at: DateTime<Utc>) -> i32 { at.year() }

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use strum::IntoEnumIterator;

  use super::*;

  #[test]
  fn protocol_code_is_zero_padded() {
    assert_eq!(protocol_code(2026, 7), "OC-2026-00007");
    assert_eq!(protocol_code(2026, 123_456), "OC-2026-123456");
  }

  #[test]
  fn wire_tags_round_trip_through_strum_and_serde() {
    for status in OccurrenceStatus::iter() {
      let tag: &'static str = status.into();
      assert_eq!(OccurrenceStatus::from_str(tag).unwrap(), status);
      assert_eq!(serde_json::to_value(status).unwrap(), tag);
    }
    assert_eq!(OccurrenceKind::ExamReview.to_string(), "revisao_exame");
  }

  #[test]
  fn triage_order_follows_priority() {
    let levels: Vec<_> = TriageLevel::iter().collect();
    for pair in levels.windows(2) {
      assert!(pair[0] < pair[1]);
      assert!(pair[0].priority() < pair[1].priority());
    }
  }

  #[test]
  fn blank_description_is_rejected() {
    let details = OccurrenceDetails {
      description:      "   ".into(),
      location:         None,
      immediate_action: None,
      occurred_at:      None,
    };
    assert!(matches!(details.validate(), Err(Error::Validation(_))));
  }
}
