//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so that string comparison orders them correctly. Calendar dates are
//! `YYYY-MM-DD`. Enumerations are stored by their wire tag. Structured values
//! (outcome sets, doctor contact and review) are compact JSON. UUIDs are
//! hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use uuid::Uuid;
use vigil_core::{
  attachment::Attachment,
  capa::CorrectiveAction,
  lifecycle::StatusChange,
  occurrence::{
    ExternalNotification, Occurrence, OccurrenceDetails, PublicHandoff,
  },
  outcome::OutcomeSelection,
};

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// The wire tag of a closed enumeration.
pub fn encode_tag<T: Into<&'static str>>(value: T) -> String {
  value.into().to_owned()
}

pub fn decode_tag<T: FromStr>(column: &'static str, s: &str) -> Result<T> {
  T::from_str(s).map_err(|_| Error::UnknownValue {
    column,
    value: s.to_owned(),
  })
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Occurrence rows ─────────────────────────────────────────────────────────

/// Column list matching [`OccurrenceRow::read`]; joins the external
/// notification so one query yields the whole record.
pub const OCCURRENCE_SELECT: &str = "
  SELECT
    o.occurrence_id, o.tenant_id, o.protocol, o.kind, o.subtype,
    o.description, o.location, o.immediate_action, o.occurred_at,
    o.reported_by, o.status, o.triage, o.outcomes,
    o.handoff_doctor, o.handoff_token_hash, o.handoff_issued_at,
    o.handoff_expires_at, o.doctor_review,
    o.created_at, o.updated_at, o.triaged_at, o.outcome_at, o.closed_at,
    n.agency, n.notified_on, n.responsible, n.attachment_id, n.recorded_at
  FROM occurrences o
  LEFT JOIN external_notifications n ON n.occurrence_id = o.occurrence_id";

/// Raw strings for one `occurrences` row (plus its joined notification).
#[derive(Debug, Clone)]
pub struct OccurrenceRow {
  pub occurrence_id:      String,
  pub tenant_id:          String,
  pub protocol:           String,
  pub kind:               String,
  pub subtype:            String,
  pub description:        String,
  pub location:           Option<String>,
  pub immediate_action:   Option<String>,
  pub occurred_at:        Option<String>,
  pub reported_by:        String,
  pub status:             String,
  pub triage:             Option<String>,
  pub outcomes:           String,
  pub handoff_doctor:     Option<String>,
  pub handoff_token_hash: Option<String>,
  pub handoff_issued_at:  Option<String>,
  pub handoff_expires_at: Option<String>,
  pub doctor_review:      Option<String>,
  pub created_at:         String,
  pub updated_at:         String,
  pub triaged_at:         Option<String>,
  pub outcome_at:         Option<String>,
  pub closed_at:          Option<String>,
  // external_notifications join
  pub agency:             Option<String>,
  pub notified_on:        Option<String>,
  pub responsible:        Option<String>,
  pub attachment_id:      Option<String>,
  pub notified_at:        Option<String>,
}

impl OccurrenceRow {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      occurrence_id:      row.get(0)?,
      tenant_id:          row.get(1)?,
      protocol:           row.get(2)?,
      kind:               row.get(3)?,
      subtype:            row.get(4)?,
      description:        row.get(5)?,
      location:           row.get(6)?,
      immediate_action:   row.get(7)?,
      occurred_at:        row.get(8)?,
      reported_by:        row.get(9)?,
      status:             row.get(10)?,
      triage:             row.get(11)?,
      outcomes:           row.get(12)?,
      handoff_doctor:     row.get(13)?,
      handoff_token_hash: row.get(14)?,
      handoff_issued_at:  row.get(15)?,
      handoff_expires_at: row.get(16)?,
      doctor_review:      row.get(17)?,
      created_at:         row.get(18)?,
      updated_at:         row.get(19)?,
      triaged_at:         row.get(20)?,
      outcome_at:         row.get(21)?,
      closed_at:          row.get(22)?,
      agency:             row.get(23)?,
      notified_on:        row.get(24)?,
      responsible:        row.get(25)?,
      attachment_id:      row.get(26)?,
      notified_at:        row.get(27)?,
    })
  }

  /// Encode the `occurrences` columns of `o`. The notification columns are
  /// left empty; they live in their own table.
  pub fn encode(o: &Occurrence) -> Result<Self> {
    let (handoff_doctor, handoff_token_hash, handoff_issued_at, handoff_expires_at) =
      match &o.handoff {
        Some(h) => (
          Some(serde_json::to_string(&h.doctor)?),
          (!h.token_hash.is_empty()).then(|| h.token_hash.clone()),
          Some(encode_dt(h.issued_at)),
          Some(encode_dt(h.expires_at)),
        ),
        None => (None, None, None, None),
      };

    Ok(Self {
      occurrence_id: encode_uuid(o.occurrence_id),
      tenant_id: encode_uuid(o.tenant_id),
      protocol: o.protocol.clone(),
      kind: encode_tag(o.kind),
      subtype: o.subtype.clone(),
      description: o.details.description.clone(),
      location: o.details.location.clone(),
      immediate_action: o.details.immediate_action.clone(),
      occurred_at: o.details.occurred_at.map(encode_dt),
      reported_by: o.reported_by.clone(),
      status: encode_tag(o.status),
      triage: o.triage.map(encode_tag),
      outcomes: serde_json::to_string(&o.outcomes)?,
      handoff_doctor,
      handoff_token_hash,
      handoff_issued_at,
      handoff_expires_at,
      doctor_review: o
        .doctor_review
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?,
      created_at: encode_dt(o.created_at),
      updated_at: encode_dt(o.updated_at),
      triaged_at: o.triaged_at.map(encode_dt),
      outcome_at: o.outcome_at.map(encode_dt),
      closed_at: o.closed_at.map(encode_dt),
      agency: None,
      notified_on: None,
      responsible: None,
      attachment_id: None,
      notified_at: None,
    })
  }

  pub fn into_occurrence(self) -> Result<Occurrence> {
    let outcomes: OutcomeSelection = serde_json::from_str(&self.outcomes)?;

    let handoff = match (
      self.handoff_doctor,
      self.handoff_issued_at,
      self.handoff_expires_at,
    ) {
      (Some(doctor), Some(issued), Some(expires)) => Some(PublicHandoff {
        doctor:     serde_json::from_str(&doctor)?,
        token_hash: self.handoff_token_hash.unwrap_or_default(),
        issued_at:  decode_dt(&issued)?,
        expires_at: decode_dt(&expires)?,
      }),
      _ => None,
    };

    let external_notification = match (
      self.agency,
      self.notified_on,
      self.responsible,
      self.notified_at,
    ) {
      (Some(agency), Some(on), Some(responsible), Some(at)) => {
        Some(ExternalNotification {
          agency,
          notified_on: decode_date(&on)?,
          responsible,
          attachment_id: self.attachment_id.as_deref().map(decode_uuid).transpose()?,
          recorded_at: decode_dt(&at)?,
        })
      }
      _ => None,
    };

    Ok(Occurrence {
      occurrence_id: decode_uuid(&self.occurrence_id)?,
      tenant_id: decode_uuid(&self.tenant_id)?,
      protocol: self.protocol,
      kind: decode_tag("kind", &self.kind)?,
      subtype: self.subtype,
      details: OccurrenceDetails {
        description:      self.description,
        location:         self.location,
        immediate_action: self.immediate_action,
        occurred_at:      decode_opt_dt(self.occurred_at)?,
      },
      reported_by: self.reported_by,
      status: decode_tag("status", &self.status)?,
      triage: self
        .triage
        .as_deref()
        .map(|t| decode_tag("triage", t))
        .transpose()?,
      outcomes,
      external_notification,
      handoff,
      doctor_review: self
        .doctor_review
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
      triaged_at: decode_opt_dt(self.triaged_at)?,
      outcome_at: decode_opt_dt(self.outcome_at)?,
      closed_at: decode_opt_dt(self.closed_at)?,
    })
  }
}

// ─── Corrective actions ──────────────────────────────────────────────────────

pub const CAPA_SELECT: &str = "
  SELECT capa_id, occurrence_id, tenant_id, root_cause, action, responsible,
         deadline, status, evidence, verification_note, created_at, updated_at
  FROM corrective_actions";

#[derive(Debug, Clone)]
pub struct CapaRow {
  pub capa_id:           String,
  pub occurrence_id:     String,
  pub tenant_id:         String,
  pub root_cause:        String,
  pub action:            String,
  pub responsible:       String,
  pub deadline:          String,
  pub status:            String,
  pub evidence:          Option<String>,
  pub verification_note: Option<String>,
  pub created_at:        String,
  pub updated_at:        String,
}

impl CapaRow {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      capa_id:           row.get(0)?,
      occurrence_id:     row.get(1)?,
      tenant_id:         row.get(2)?,
      root_cause:        row.get(3)?,
      action:            row.get(4)?,
      responsible:       row.get(5)?,
      deadline:          row.get(6)?,
      status:            row.get(7)?,
      evidence:          row.get(8)?,
      verification_note: row.get(9)?,
      created_at:        row.get(10)?,
      updated_at:        row.get(11)?,
    })
  }

  pub fn encode(c: &CorrectiveAction) -> Self {
    Self {
      capa_id:           encode_uuid(c.capa_id),
      occurrence_id:     encode_uuid(c.occurrence_id),
      tenant_id:         encode_uuid(c.tenant_id),
      root_cause:        c.root_cause.clone(),
      action:            c.action.clone(),
      responsible:       c.responsible.clone(),
      deadline:          encode_date(c.deadline),
      status:            encode_tag(c.status),
      evidence:          c.evidence.clone(),
      verification_note: c.verification_note.clone(),
      created_at:        encode_dt(c.created_at),
      updated_at:        encode_dt(c.updated_at),
    }
  }

  pub fn into_capa(self) -> Result<CorrectiveAction> {
    Ok(CorrectiveAction {
      capa_id:           decode_uuid(&self.capa_id)?,
      occurrence_id:     decode_uuid(&self.occurrence_id)?,
      tenant_id:         decode_uuid(&self.tenant_id)?,
      root_cause:        self.root_cause,
      action:            self.action,
      responsible:       self.responsible,
      deadline:          decode_date(&self.deadline)?,
      status:            decode_tag("capa status", &self.status)?,
      evidence:          self.evidence,
      verification_note: self.verification_note,
      created_at:        decode_dt(&self.created_at)?,
      updated_at:        decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Attachments ─────────────────────────────────────────────────────────────

pub const ATTACHMENT_SELECT: &str = "
  SELECT attachment_id, occurrence_id, tenant_id, file_name, mime_type,
         size_bytes, storage_path, content_hash, uploaded_by, created_at
  FROM attachments";

#[derive(Debug, Clone)]
pub struct AttachmentRow {
  pub attachment_id: String,
  pub occurrence_id: String,
  pub tenant_id:     String,
  pub file_name:     String,
  pub mime_type:     String,
  pub size_bytes:    i64,
  pub storage_path:  String,
  pub content_hash:  String,
  pub uploaded_by:   String,
  pub created_at:    String,
}

impl AttachmentRow {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      attachment_id: row.get(0)?,
      occurrence_id: row.get(1)?,
      tenant_id:     row.get(2)?,
      file_name:     row.get(3)?,
      mime_type:     row.get(4)?,
      size_bytes:    row.get(5)?,
      storage_path:  row.get(6)?,
      content_hash:  row.get(7)?,
      uploaded_by:   row.get(8)?,
      created_at:    row.get(9)?,
    })
  }

  pub fn encode(a: &Attachment) -> Self {
    Self {
      attachment_id: encode_uuid(a.attachment_id),
      occurrence_id: encode_uuid(a.occurrence_id),
      tenant_id:     encode_uuid(a.tenant_id),
      file_name:     a.file_name.clone(),
      mime_type:     a.mime_type.clone(),
      size_bytes:    i64::try_from(a.size_bytes).unwrap_or(i64::MAX),
      storage_path:  a.storage_path.clone(),
      content_hash:  a.content_hash.clone(),
      uploaded_by:   a.uploaded_by.clone(),
      created_at:    encode_dt(a.created_at),
    }
  }

  pub fn into_attachment(self) -> Result<Attachment> {
    Ok(Attachment {
      attachment_id: decode_uuid(&self.attachment_id)?,
      occurrence_id: decode_uuid(&self.occurrence_id)?,
      tenant_id:     decode_uuid(&self.tenant_id)?,
      file_name:     self.file_name,
      mime_type:     self.mime_type,
      size_bytes:    u64::try_from(self.size_bytes).unwrap_or_default(),
      storage_path:  self.storage_path,
      content_hash:  self.content_hash,
      uploaded_by:   self.uploaded_by,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

// ─── Status history ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct HistoryRow {
  pub change_id:     String,
  pub occurrence_id: String,
  pub from_status:   Option<String>,
  pub to_status:     String,
  pub actor:         String,
  pub reason:        Option<String>,
  pub recorded_at:   String,
}

impl HistoryRow {
  pub fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      change_id:     row.get(0)?,
      occurrence_id: row.get(1)?,
      from_status:   row.get(2)?,
      to_status:     row.get(3)?,
      actor:         row.get(4)?,
      reason:        row.get(5)?,
      recorded_at:   row.get(6)?,
    })
  }

  pub fn encode(c: &StatusChange) -> Self {
    Self {
      change_id:     encode_uuid(c.change_id),
      occurrence_id: encode_uuid(c.occurrence_id),
      from_status:   c.from.map(encode_tag),
      to_status:     encode_tag(c.to),
      actor:         c.actor.clone(),
      reason:        c.reason.clone(),
      recorded_at:   encode_dt(c.recorded_at),
    }
  }

  pub fn into_change(self) -> Result<StatusChange> {
    Ok(StatusChange {
      change_id:     decode_uuid(&self.change_id)?,
      occurrence_id: decode_uuid(&self.occurrence_id)?,
      from:          self
        .from_status
        .as_deref()
        .map(|s| decode_tag("from_status", s))
        .transpose()?,
      to:            decode_tag("to_status", &self.to_status)?,
      actor:         self.actor,
      reason:        self.reason,
      recorded_at:   decode_dt(&self.recorded_at)?,
    })
  }

  /// Append this entry. Only ever an `INSERT`.
  pub fn insert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute(
      "INSERT INTO status_history
         (change_id, occurrence_id, from_status, to_status, actor, reason, recorded_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
      rusqlite::params![
        self.change_id,
        self.occurrence_id,
        self.from_status,
        self.to_status,
        self.actor,
        self.reason,
        self.recorded_at,
      ],
    )?;
    Ok(())
  }
}
