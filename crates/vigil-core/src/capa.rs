//! Corrective and preventive actions (CAPA).
//!
//! A CAPA is never deleted. Its status only moves forward:
//! `pendente → em_andamento → concluida → verificada` (steps may be skipped,
//! never reversed).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::{Error, Result};

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
pub enum CapaStatus {
  #[serde(rename = "pendente")]
  #[strum(serialize = "pendente")]
  Pending,
  #[serde(rename = "em_andamento")]
  #[strum(serialize = "em_andamento")]
  InProgress,
  #[serde(rename = "concluida")]
  #[strum(serialize = "concluida")]
  Done,
  #[serde(rename = "verificada")]
  #[strum(serialize = "verificada")]
  Verified,
}

impl CapaStatus {
  /// Work on the action is finished (whether or not it was verified).
  pub fn is_finished(self) -> bool { matches!(self, Self::Done | Self::Verified) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectiveAction {
  pub capa_id:           Uuid,
  pub occurrence_id:     Uuid,
  pub tenant_id:         Uuid,
  pub root_cause:        String,
  pub action:            String,
  pub responsible:       String,
  pub deadline:          NaiveDate,
  pub status:            CapaStatus,
  pub evidence:          Option<String>,
  pub verification_note: Option<String>,
  pub created_at:        DateTime<Utc>,
  pub updated_at:        DateTime<Utc>,
}

impl CorrectiveAction {
  pub fn is_overdue(&self, today: NaiveDate) -> bool {
    !self.status.is_finished() && self.deadline < today
  }

  /// Apply `update` in place, enforcing forward-only movement.
  pub fn advance(&mut self, update: CapaUpdate, now: DateTime<Utc>) -> Result<()> {
    if update.status <= self.status {
      return Err(Error::IllegalCapaAdvance {
        from: self.status,
        to:   update.status,
      });
    }

    let note = update.verification_note.or_else(|| self.verification_note.clone());
    if update.status == CapaStatus::Verified
      && note.as_deref().is_none_or(|n| n.trim().is_empty())
    {
      return Err(Error::Validation(
        "verifying a corrective action requires a verification note".into(),
      ));
    }

    self.status = update.status;
    if update.evidence.is_some() {
      self.evidence = update.evidence;
    }
    self.verification_note = note;
    self.updated_at = now;
    Ok(())
  }
}

/// Input to [`crate::store::OccurrenceStore::add_corrective_action`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCorrectiveAction {
  pub root_cause:  String,
  pub action:      String,
  pub responsible: String,
  pub deadline:    NaiveDate,
}

impl NewCorrectiveAction {
  pub fn validate(&self) -> Result<()> {
    for (field, value) in [
      ("root_cause", &self.root_cause),
      ("action", &self.action),
      ("responsible", &self.responsible),
    ] {
      if value.trim().is_empty() {
        return Err(Error::Validation(format!("{field} must not be empty")));
      }
    }
    Ok(())
  }
}

/// A forward status move, optionally carrying evidence or a verification
/// note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapaUpdate {
  pub status:            CapaStatus,
  pub evidence:          Option<String>,
  pub verification_note: Option<String>,
}
