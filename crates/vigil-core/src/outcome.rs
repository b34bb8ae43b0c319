//! Outcome categories and the selection rules around them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{Error, Result};

/// How an occurrence was resolved. Each category carries two flags that decide
/// which follow-up records become mandatory before closing.
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
pub enum OutcomeType {
  #[serde(rename = "imediato_correcao")]
  #[strum(serialize = "imediato_correcao")]
  ImmediateCorrection,
  #[serde(rename = "orientacao")]
  #[strum(serialize = "orientacao")]
  StaffGuidance,
  #[serde(rename = "treinamento")]
  #[strum(serialize = "treinamento")]
  Training,
  #[serde(rename = "melhoria_processo")]
  #[strum(serialize = "melhoria_processo")]
  ProcessImprovement,
  #[serde(rename = "notificacao_externa")]
  #[strum(serialize = "notificacao_externa")]
  ExternalNotification,
  /// The report did not hold up. Excludes every other outcome.
  #[serde(rename = "improcedente")]
  #[strum(serialize = "improcedente")]
  NotApplicable,
}

impl OutcomeType {
  pub fn label(self) -> &'static str {
    match self {
      Self::ImmediateCorrection => "Correção imediata",
      Self::StaffGuidance => "Orientação da equipe",
      Self::Training => "Treinamento",
      Self::ProcessImprovement => "Melhoria de processo",
      Self::ExternalNotification => "Notificação externa",
      Self::NotApplicable => "Improcedente",
    }
  }

  pub fn requires_capa(self) -> bool {
    matches!(self, Self::ImmediateCorrection | Self::ProcessImprovement)
  }

  pub fn requires_external_notification(self) -> bool {
    matches!(self, Self::ExternalNotification)
  }

  pub fn is_exclusive(self) -> bool { matches!(self, Self::NotApplicable) }
}

// ─── Selection ───────────────────────────────────────────────────────────────

/// A set of outcomes that never mixes an exclusive outcome with others.
///
/// Serialised as a plain JSON array; deserialisation rejects mixed sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<OutcomeType>", into = "Vec<OutcomeType>")]
pub struct OutcomeSelection(BTreeSet<OutcomeType>);

impl OutcomeSelection {
  pub fn new() -> Self { Self::default() }

  /// Build a selection, failing with [`Error::ExclusiveOutcome`] if an
  /// exclusive outcome is combined with anything else.
  pub fn try_from_iter(
    outcomes: impl IntoIterator<Item = OutcomeType>,
  ) -> Result<Self> {
    let set: BTreeSet<_> = outcomes.into_iter().collect();
    if set.len() > 1 && set.iter().any(|o| o.is_exclusive()) {
      return Err(Error::ExclusiveOutcome);
    }
    Ok(Self(set))
  }

  /// Flip `outcome` the way the outcome checklist does: picking an exclusive
  /// outcome clears the rest, picking anything else drops an active exclusive
  /// outcome, and picking a selected outcome deselects it.
  pub fn toggle(&mut self, outcome: OutcomeType) {
    if self.0.remove(&outcome) {
      return;
    }
    if outcome.is_exclusive() {
      self.0.clear();
    } else {
      self.0.retain(|o| !o.is_exclusive());
    }
    self.0.insert(outcome);
  }

  pub fn contains(&self, outcome: OutcomeType) -> bool { self.0.contains(&outcome) }

  pub fn iter(&self) -> impl Iterator<Item = OutcomeType> + '_ {
    self.0.iter().copied()
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn len(&self) -> usize { self.0.len() }
}

impl TryFrom<Vec<OutcomeType>> for OutcomeSelection {
  type Error = Error;

  fn try_from(v: Vec<OutcomeType>) -> Result<Self> { Self::try_from_iter(v) }
}

impl From<OutcomeSelection> for Vec<OutcomeType> {
  fn from(s: OutcomeSelection) -> Self { s.0.into_iter().collect() }
}
