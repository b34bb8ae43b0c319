//! Aggregate counts behind the dashboard screen.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  capa::CorrectiveAction,
  occurrence::{OccurrenceKind, OccurrenceStatus, TriageLevel},
  outcome::{OutcomeSelection, OutcomeType},
};

/// Optional creation-time window for [`Dashboard`] counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardQuery {
  pub created_after:  Option<DateTime<Utc>>,
  pub created_before: Option<DateTime<Utc>>,
}

/// The slice of an occurrence the dashboard needs.
#[derive(Debug, Clone)]
pub struct DashboardRow {
  pub status:   OccurrenceStatus,
  pub kind:     OccurrenceKind,
  pub triage:   Option<TriageLevel>,
  pub outcomes: OutcomeSelection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dashboard {
  pub total:                      u64,
  pub by_status:                  BTreeMap<OccurrenceStatus, u64>,
  pub by_kind:                    BTreeMap<OccurrenceKind, u64>,
  pub by_triage:                  BTreeMap<TriageLevel, u64>,
  pub untriaged:                  u64,
  pub by_outcome:                 BTreeMap<OutcomeType, u64>,
  pub open_corrective_actions:    u64,
  pub overdue_corrective_actions: u64,
}

impl Dashboard {
  /// Count `rows` and the tenant's corrective actions as of `today`.
  pub fn tally<'a>(
    rows: impl IntoIterator<Item = DashboardRow>,
    corrective_actions: impl IntoIterator<Item = &'a CorrectiveAction>,
    today: NaiveDate,
  ) -> Self {
    let mut d = Self::default();
    for row in rows {
      d.total += 1;
      *d.by_status.entry(row.status).or_default() += 1;
      *d.by_kind.entry(row.kind).or_default() += 1;
      match row.triage {
        Some(level) => *d.by_triage.entry(level).or_default() += 1,
        None => d.untriaged += 1,
      }
      for outcome in row.outcomes.iter() {
        *d.by_outcome.entry(outcome).or_default() += 1;
      }
    }
    for capa in corrective_actions {
      if !capa.status.is_finished() {
        d.open_corrective_actions += 1;
      }
      if capa.is_overdue(today) {
        d.overdue_corrective_actions += 1;
      }
    }
    d
  }
}
