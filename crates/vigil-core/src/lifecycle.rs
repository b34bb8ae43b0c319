//! The occurrence lifecycle: status table, transition checks, and the
//! follow-up records that outcomes make mandatory.
//!
//! Everything here is a pure lookup over closed enumerations. Stores call
//! into it before writing; the API exposes the tables so clients can gate
//! their own actions.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  attachment::Attachment,
  capa::CorrectiveAction,
  occurrence::{Occurrence, OccurrenceStatus},
  outcome::OutcomeType,
};

// ─── Status table ────────────────────────────────────────────────────────────

impl OccurrenceStatus {
  pub fn label(self) -> &'static str {
    match self {
      Self::Registered => "Registrada",
      Self::InTriage => "Em triagem",
      Self::InAnalysis => "Em análise",
      Self::ActionInProgress => "Ação em andamento",
      Self::Concluded => "Concluída",
      Self::NotApplicable => "Improcedente",
    }
  }

  pub fn description(self) -> &'static str {
    match self {
      Self::Registered => "Reported and waiting for an administrator",
      Self::InTriage => "Being classified by severity",
      Self::InAnalysis => "Causes and outcomes under analysis",
      Self::ActionInProgress => "Corrective actions are being carried out",
      Self::Concluded => "Closed with all required follow-ups recorded",
      Self::NotApplicable => "Closed as unfounded",
    }
  }

  /// The states directly reachable from `self`.
  pub fn reachable(self) -> &'static [OccurrenceStatus] {
    use OccurrenceStatus::*;
    match self {
      Registered => &[InTriage, NotApplicable],
      InTriage => &[InAnalysis, NotApplicable],
      InAnalysis => &[ActionInProgress, Concluded, NotApplicable],
      ActionInProgress => &[Concluded, NotApplicable],
      Concluded | NotApplicable => &[],
    }
  }

  pub fn is_terminal(self) -> bool { self.reachable().is_empty() }
}

/// `true` iff `next` is in the reachable set of `current`.
pub fn can_transition(current: OccurrenceStatus, next: OccurrenceStatus) -> bool {
  current.reachable().contains(&next)
}

/// One row of the status table, as exposed to clients.
#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
  pub status:      OccurrenceStatus,
  pub label:       &'static str,
  pub description: &'static str,
  pub reachable:   &'static [OccurrenceStatus],
  pub terminal:    bool,
}

impl From<OccurrenceStatus> for StatusInfo {
  fn from(status: OccurrenceStatus) -> Self {
    Self {
      status,
      label: status.label(),
      description: status.description(),
      reachable: status.reachable(),
      terminal: status.is_terminal(),
    }
  }
}

// ─── Follow-ups ──────────────────────────────────────────────────────────────

/// Which follow-up records the selected outcomes make mandatory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUps {
  pub needs_capa:                  bool,
  pub needs_external_notification: bool,
}

/// OR each outcome's flags across the selection. An empty selection needs
/// nothing.
pub fn required_follow_ups(
  outcomes: impl IntoIterator<Item = OutcomeType>,
) -> FollowUps {
  outcomes
    .into_iter()
    .fold(FollowUps::default(), |acc, o| FollowUps {
      needs_capa:                  acc.needs_capa || o.requires_capa(),
      needs_external_notification: acc.needs_external_notification
        || o.requires_external_notification(),
    })
}

// ─── Closing ─────────────────────────────────────────────────────────────────

/// Something that still keeps an occurrence from reaching `concluida`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClosingBlocker {
  NoOutcome,
  MissingExternalNotification,
  MissingCorrectiveAction,
  OpenCorrectiveActions { count: usize },
}

impl fmt::Display for ClosingBlocker {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::NoOutcome => f.write_str("no outcome selected"),
      Self::MissingExternalNotification => {
        f.write_str("external notification is required")
      }
      Self::MissingCorrectiveAction => {
        f.write_str("a corrective action is required")
      }
      Self::OpenCorrectiveActions { count } => {
        write!(f, "{count} corrective action(s) still open")
      }
    }
  }
}

/// Everything still missing before `occurrence` may be concluded.
pub fn closing_blockers(
  occurrence: &Occurrence,
  corrective_actions: &[CorrectiveAction],
) -> Vec<ClosingBlocker> {
  let mut blockers = Vec::new();
  if occurrence.outcomes.is_empty() {
    blockers.push(ClosingBlocker::NoOutcome);
  }

  let follow_ups = occurrence.follow_ups();
  if follow_ups.needs_external_notification
    && !occurrence
      .external_notification
      .as_ref()
      .is_some_and(|n| n.is_complete())
  {
    blockers.push(ClosingBlocker::MissingExternalNotification);
  }

  if follow_ups.needs_capa {
    if corrective_actions.is_empty() {
      blockers.push(ClosingBlocker::MissingCorrectiveAction);
    } else {
      let open = corrective_actions
        .iter()
        .filter(|c| !c.status.is_finished())
        .count();
      if open > 0 {
        blockers.push(ClosingBlocker::OpenCorrectiveActions { count: open });
      }
    }
  }
  blockers
}

// ─── History ─────────────────────────────────────────────────────────────────

/// One entry of the append-only status history. `from` is `None` for the
/// entry written when the occurrence is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
  pub change_id:     Uuid,
  pub occurrence_id: Uuid,
  pub from:          Option<OccurrenceStatus>,
  pub to:            OccurrenceStatus,
  pub actor:         String,
  pub reason:        Option<String>,
  pub recorded_at:   DateTime<Utc>,
}

/// A requested status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
  pub to:     OccurrenceStatus,
  pub actor:  String,
  pub reason: Option<String>,
}

/// Validate `request` against `occurrence` and, on success, apply it in place
/// and return the history entry to append.
pub fn apply_transition(
  occurrence: &mut Occurrence,
  corrective_actions: &[CorrectiveAction],
  request: TransitionRequest,
  now: DateTime<Utc>,
) -> Result<StatusChange> {
  let from = occurrence.status;
  if !can_transition(from, request.to) {
    return Err(Error::IllegalTransition { from, to: request.to });
  }
  if request.to == OccurrenceStatus::Concluded {
    let blockers = closing_blockers(occurrence, corrective_actions);
    if !blockers.is_empty() {
      return Err(Error::ClosingBlocked(blockers));
    }
  }

  occurrence.status = request.to;
  occurrence.updated_at = now;
  if request.to.is_terminal() {
    occurrence.closed_at = Some(now);
  }

  Ok(StatusChange {
    change_id: Uuid::new_v4(),
    occurrence_id: occurrence.occurrence_id,
    from: Some(from),
    to: request.to,
    actor: request.actor,
    reason: request.reason,
    recorded_at: now,
  })
}

// ─── Materialised view ───────────────────────────────────────────────────────

/// An occurrence together with its follow-up records and history; the read
/// model behind the detail screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccurrenceView {
  pub occurrence:         Occurrence,
  pub follow_ups:         FollowUps,
  pub closing_blockers:   Vec<ClosingBlocker>,
  pub corrective_actions: Vec<CorrectiveAction>,
  pub attachments:        Vec<Attachment>,
  pub history:            Vec<StatusChange>,
}

impl OccurrenceView {
  pub fn assemble(
    occurrence: Occurrence,
    corrective_actions: Vec<CorrectiveAction>,
    attachments: Vec<Attachment>,
    history: Vec<StatusChange>,
  ) -> Self {
    let follow_ups = occurrence.follow_ups();
    let closing_blockers = closing_blockers(&occurrence, &corrective_actions);
    Self {
      occurrence,
      follow_ups,
      closing_blockers,
      corrective_actions,
      attachments,
      history,
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;
  use strum::IntoEnumIterator;

  use super::*;
  use crate::{
    capa::CapaStatus,
    occurrence::{
      ExternalNotification, OccurrenceDetails, OccurrenceKind,
    },
    outcome::OutcomeSelection,
  };

  fn occurrence(status: OccurrenceStatus, outcomes: &[OutcomeType]) -> Occurrence {
    let now = Utc::now();
    Occurrence {
      occurrence_id: Uuid::new_v4(),
      tenant_id: Uuid::new_v4(),
      protocol: "OC-2026-00001".into(),
      kind: OccurrenceKind::Clinical,
      subtype: "queda".into(),
      details: OccurrenceDetails {
        description:      "Paciente caiu ao levantar do leito".into(),
        location:         Some("Enfermaria 3".into()),
        immediate_action: None,
        occurred_at:      None,
      },
      reported_by: "enf.maria".into(),
      status,
      triage: None,
      outcomes: OutcomeSelection::try_from_iter(outcomes.iter().copied())
        .unwrap(),
      external_notification: None,
      handoff: None,
      doctor_review: None,
      created_at: now,
      updated_at: now,
      triaged_at: None,
      outcome_at: None,
      closed_at: None,
    }
  }

  fn capa(occurrence: &Occurrence, status: CapaStatus) -> CorrectiveAction {
    let now = Utc::now();
    CorrectiveAction {
      capa_id: Uuid::new_v4(),
      occurrence_id: occurrence.occurrence_id,
      tenant_id: occurrence.tenant_id,
      root_cause: "Grade do leito abaixada".into(),
      action: "Revisar protocolo de quedas".into(),
      responsible: "Coordenação de enfermagem".into(),
      deadline: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
      status,
      evidence: None,
      verification_note: None,
      created_at: now,
      updated_at: now,
    }
  }

  fn to(status: OccurrenceStatus) -> TransitionRequest {
    TransitionRequest { to: status, actor: "admin".into(), reason: None }
  }

  #[test]
  fn no_status_reaches_itself() {
    for s in OccurrenceStatus::iter() {
      assert!(!can_transition(s, s), "{s} reaches itself");
    }
  }

  #[test]
  fn registered_goes_to_triage_and_concluded_goes_nowhere() {
    use OccurrenceStatus::*;
    assert!(can_transition(Registered, InTriage));
    assert!(!can_transition(Concluded, Registered));
    for s in OccurrenceStatus::iter() {
      assert!(!can_transition(Concluded, s));
      assert!(!can_transition(NotApplicable, s));
    }
  }

  #[test]
  fn not_applicable_reachable_from_every_open_state() {
    for s in OccurrenceStatus::iter().filter(|s| !s.is_terminal()) {
      assert!(can_transition(s, OccurrenceStatus::NotApplicable));
    }
  }

  #[test]
  fn concluded_only_from_analysis_or_action() {
    let sources: Vec<_> = OccurrenceStatus::iter()
      .filter(|s| can_transition(*s, OccurrenceStatus::Concluded))
      .collect();
    assert_eq!(sources, vec![
      OccurrenceStatus::InAnalysis,
      OccurrenceStatus::ActionInProgress
    ]);
  }

  #[test]
  fn follow_ups_or_across_outcomes() {
    let n = required_follow_ups([OutcomeType::ExternalNotification]);
    assert!(n.needs_external_notification);
    assert!(!n.needs_capa);

    assert!(required_follow_ups([OutcomeType::ImmediateCorrection]).needs_capa);
    assert_eq!(required_follow_ups([]), FollowUps::default());

    let both = required_follow_ups([
      OutcomeType::Training,
      OutcomeType::ProcessImprovement,
      OutcomeType::ExternalNotification,
    ]);
    assert!(both.needs_capa && both.needs_external_notification);
  }

  #[test]
  fn concluding_without_outcome_is_blocked() {
    let mut occ = occurrence(OccurrenceStatus::InAnalysis, &[]);
    let err = apply_transition(&mut occ, &[], to(OccurrenceStatus::Concluded), Utc::now())
      .unwrap_err();
    assert!(matches!(err, Error::ClosingBlocked(ref b) if b == &[ClosingBlocker::NoOutcome]));
    assert_eq!(occ.status, OccurrenceStatus::InAnalysis);
  }

  #[test]
  fn concluding_lists_every_missing_follow_up() {
    let occ = occurrence(OccurrenceStatus::ActionInProgress, &[
      OutcomeType::ImmediateCorrection,
      OutcomeType::ExternalNotification,
    ]);
    let blockers = closing_blockers(&occ, &[]);
    assert_eq!(blockers, vec![
      ClosingBlocker::MissingExternalNotification,
      ClosingBlocker::MissingCorrectiveAction,
    ]);

    let open = capa(&occ, CapaStatus::InProgress);
    let blockers = closing_blockers(&occ, &[open]);
    assert!(blockers.contains(&ClosingBlocker::OpenCorrectiveActions { count: 1 }));
  }

  #[test]
  fn concluding_succeeds_once_follow_ups_are_complete() {
    let mut occ = occurrence(OccurrenceStatus::ActionInProgress, &[
      OutcomeType::ImmediateCorrection,
      OutcomeType::ExternalNotification,
    ]);
    occ.external_notification = Some(ExternalNotification {
      agency:        "ANVISA".into(),
      notified_on:   NaiveDate::from_ymd_opt(2026, 5, 2).unwrap(),
      responsible:   "Núcleo de Segurança do Paciente".into(),
      attachment_id: None,
      recorded_at:   Utc::now(),
    });
    let done = capa(&occ, CapaStatus::Verified);

    let change =
      apply_transition(&mut occ, &[done], to(OccurrenceStatus::Concluded), Utc::now())
        .unwrap();
    assert_eq!(change.from, Some(OccurrenceStatus::ActionInProgress));
    assert_eq!(occ.status, OccurrenceStatus::Concluded);
    assert!(occ.closed_at.is_some());
  }

  #[test]
  fn illegal_transition_is_rejected() {
    let mut occ = occurrence(OccurrenceStatus::Registered, &[]);
    let err =
      apply_transition(&mut occ, &[], to(OccurrenceStatus::InAnalysis), Utc::now())
        .unwrap_err();
    assert!(matches!(err, Error::IllegalTransition { .. }));
  }

  #[test]
  fn discarding_needs_no_follow_ups() {
    let mut occ = occurrence(OccurrenceStatus::InTriage, &[]);
    apply_transition(&mut occ, &[], to(OccurrenceStatus::NotApplicable), Utc::now())
      .unwrap();
    assert!(occ.is_terminal());
  }
}
