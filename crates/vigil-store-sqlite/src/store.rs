//! [`SqliteStore`]: the SQLite implementation of [`OccurrenceStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, params};
use uuid::Uuid;

use vigil_core::{
  attachment::{Attachment, NewAttachment},
  capa::{CapaStatus, CapaUpdate, CorrectiveAction, NewCorrectiveAction},
  dashboard::{Dashboard, DashboardQuery, DashboardRow},
  lifecycle::{OccurrenceView, StatusChange, TransitionRequest, apply_transition},
  occurrence::{
    DoctorReview, NewExternalNotification, NewOccurrence, Occurrence,
    OccurrenceDetails, OccurrenceStatus, PublicHandoff, TriageLevel,
    protocol_code, protocol_year,
  },
  outcome::OutcomeSelection,
  store::{OccurrenceQuery, OccurrenceStore},
};

use crate::{
  Error, Result,
  encode::{
    ATTACHMENT_SELECT, AttachmentRow, CAPA_SELECT, CapaRow, HistoryRow,
    OCCURRENCE_SELECT, OccurrenceRow, decode_tag, encode_date, encode_dt,
    encode_tag, encode_uuid,
  },
  schema::SCHEMA,
};

const DEFAULT_LIMIT: usize = 100;

// ─── Store ───────────────────────────────────────────────────────────────────

/// An occurrence store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Every
/// operation runs as one closure on the connection thread, so a
/// load-check-write sequence is never interleaved with another write.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` on the connection thread, carrying domain errors back intact.
  async fn run<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
  {
    self
      .conn
      .call(move |conn| {
        f(conn).map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))
      })
      .await
      .map_err(Error::from_call)
  }
}

// ─── Row helpers (connection thread) ─────────────────────────────────────────

fn load_occurrence(
  conn: &Connection,
  tenant_id: Uuid,
  id: Uuid,
) -> Result<Option<Occurrence>> {
  let sql =
    format!("{OCCURRENCE_SELECT} WHERE o.tenant_id = ?1 AND o.occurrence_id = ?2");
  conn
    .query_row(
      &sql,
      params![encode_uuid(tenant_id), encode_uuid(id)],
      OccurrenceRow::read,
    )
    .optional()?
    .map(OccurrenceRow::into_occurrence)
    .transpose()
}

fn require_occurrence(
  conn: &Connection,
  tenant_id: Uuid,
  id: Uuid,
) -> Result<Occurrence> {
  load_occurrence(conn, tenant_id, id)?
    .ok_or(Error::Core(vigil_core::Error::OccurrenceNotFound(id)))
}

fn insert_occurrence(conn: &Connection, o: &Occurrence) -> Result<()> {
  let r = OccurrenceRow::encode(o)?;
  conn.execute(
    "INSERT INTO occurrences (
       occurrence_id, tenant_id, protocol, kind, subtype,
       description, location, immediate_action, occurred_at,
       reported_by, status, triage, outcomes,
       created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
    params![
      r.occurrence_id,
      r.tenant_id,
      r.protocol,
      r.kind,
      r.subtype,
      r.description,
      r.location,
      r.immediate_action,
      r.occurred_at,
      r.reported_by,
      r.status,
      r.triage,
      r.outcomes,
      r.created_at,
      r.updated_at,
    ],
  )?;
  Ok(())
}

/// Write back every mutable column of `o`. Identity, protocol, kind and
/// reporter never change after creation.
fn save_occurrence(conn: &Connection, o: &Occurrence) -> Result<()> {
  let r = OccurrenceRow::encode(o)?;
  conn.execute(
    "UPDATE occurrences SET
       description        = ?3,
       location           = ?4,
       immediate_action   = ?5,
       occurred_at        = ?6,
       status             = ?7,
       triage             = ?8,
       outcomes           = ?9,
       handoff_doctor     = ?10,
       handoff_token_hash = ?11,
       handoff_issued_at  = ?12,
       handoff_expires_at = ?13,
       doctor_review      = ?14,
       updated_at         = ?15,
       triaged_at         = ?16,
       outcome_at         = ?17,
       closed_at          = ?18
     WHERE tenant_id = ?1 AND occurrence_id = ?2",
    params![
      r.tenant_id,
      r.occurrence_id,
      r.description,
      r.location,
      r.immediate_action,
      r.occurred_at,
      r.status,
      r.triage,
      r.outcomes,
      r.handoff_doctor,
      r.handoff_token_hash,
      r.handoff_issued_at,
      r.handoff_expires_at,
      r.doctor_review,
      r.updated_at,
      r.triaged_at,
      r.outcome_at,
      r.closed_at,
    ],
  )?;
  Ok(())
}

fn load_capas(
  conn: &Connection,
  tenant_id: Uuid,
  occurrence_id: Uuid,
) -> Result<Vec<CorrectiveAction>> {
  let sql = format!(
    "{CAPA_SELECT} WHERE tenant_id = ?1 AND occurrence_id = ?2
     ORDER BY created_at, rowid"
  );
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt
    .query_map(
      params![encode_uuid(tenant_id), encode_uuid(occurrence_id)],
      CapaRow::read,
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  rows.into_iter().map(CapaRow::into_capa).collect()
}

fn load_attachments(
  conn: &Connection,
  tenant_id: Uuid,
  occurrence_id: Uuid,
) -> Result<Vec<Attachment>> {
  let sql = format!(
    "{ATTACHMENT_SELECT} WHERE tenant_id = ?1 AND occurrence_id = ?2
     ORDER BY created_at, rowid"
  );
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt
    .query_map(
      params![encode_uuid(tenant_id), encode_uuid(occurrence_id)],
      AttachmentRow::read,
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  rows.into_iter().map(AttachmentRow::into_attachment).collect()
}

/// History in insertion order. Callers have already checked tenant access.
fn load_history(conn: &Connection, occurrence_id: Uuid) -> Result<Vec<StatusChange>> {
  let mut stmt = conn.prepare(
    "SELECT change_id, occurrence_id, from_status, to_status, actor, reason,
            recorded_at
     FROM status_history
     WHERE occurrence_id = ?1
     ORDER BY rowid",
  )?;
  let rows = stmt
    .query_map(params![encode_uuid(occurrence_id)], HistoryRow::read)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  rows.into_iter().map(HistoryRow::into_change).collect()
}

fn insert_capa(conn: &Connection, c: &CorrectiveAction) -> Result<()> {
  let r = CapaRow::encode(c);
  conn.execute(
    "INSERT INTO corrective_actions (
       capa_id, occurrence_id, tenant_id, root_cause, action, responsible,
       deadline, status, evidence, verification_note, created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    params![
      r.capa_id,
      r.occurrence_id,
      r.tenant_id,
      r.root_cause,
      r.action,
      r.responsible,
      r.deadline,
      r.status,
      r.evidence,
      r.verification_note,
      r.created_at,
      r.updated_at,
    ],
  )?;
  Ok(())
}

fn find_by_token(conn: &Connection, token_hash: &str) -> Result<Option<Occurrence>> {
  let sql = format!("{OCCURRENCE_SELECT} WHERE o.handoff_token_hash = ?1");
  conn
    .query_row(&sql, params![token_hash], OccurrenceRow::read)
    .optional()?
    .map(OccurrenceRow::into_occurrence)
    .transpose()
}

fn opt_dt(dt: Option<DateTime<Utc>>) -> Option<String> { dt.map(encode_dt) }

/// `%text%` for a `LIKE ... ESCAPE '\'` clause, with the user's own `%`, `_`
/// and `\` matched literally.
fn contains_pattern(text: &str) -> String {
  let mut pattern = String::with_capacity(text.len() + 2);
  pattern.push('%');
  for c in text.chars() {
    if matches!(c, '%' | '_' | '\\') {
      pattern.push('\\');
    }
    pattern.push(c);
  }
  pattern.push('%');
  pattern
}

// ─── OccurrenceStore impl ────────────────────────────────────────────────────

impl OccurrenceStore for SqliteStore {
  type Error = Error;

  // ── Occurrences ───────────────────────────────────────────────────────

  async fn create_occurrence(
    &self,
    tenant_id: Uuid,
    input: NewOccurrence,
  ) -> Result<Occurrence> {
    input.validate()?;
    let now = Utc::now();
    let year = protocol_year(now);

    self
      .run(move |conn| {
        let tx = conn.transaction()?;

        let sequence: u32 = tx.query_row(
          "INSERT INTO protocol_counters (tenant_id, year, last_seq)
           VALUES (?1, ?2, 1)
           ON CONFLICT (tenant_id, year) DO UPDATE SET last_seq = last_seq + 1
           RETURNING last_seq",
          params![encode_uuid(tenant_id), year],
          |r| r.get(0),
        )?;

        let occurrence = Occurrence {
          occurrence_id: Uuid::new_v4(),
          tenant_id,
          protocol: protocol_code(year, sequence),
          kind: input.kind,
          subtype: input.subtype,
          details: input.details,
          reported_by: input.reported_by,
          status: OccurrenceStatus::Registered,
          triage: None,
          outcomes: OutcomeSelection::new(),
          external_notification: None,
          handoff: None,
          doctor_review: None,
          created_at: now,
          updated_at: now,
          triaged_at: None,
          outcome_at: None,
          closed_at: None,
        };
        insert_occurrence(&tx, &occurrence)?;

        HistoryRow::encode(&StatusChange {
          change_id:     Uuid::new_v4(),
          occurrence_id: occurrence.occurrence_id,
          from:          None,
          to:            OccurrenceStatus::Registered,
          actor:         occurrence.reported_by.clone(),
          reason:        None,
          recorded_at:   now,
        })
        .insert(&tx)?;

        tx.commit()?;
        Ok(occurrence)
      })
      .await
  }

  async fn get_occurrence(
    &self,
    tenant_id: Uuid,
    id: Uuid,
  ) -> Result<Option<Occurrence>> {
    self
      .run(move |conn| load_occurrence(conn, tenant_id, id))
      .await
  }

  async fn list_occurrences<'a>(
    &'a self,
    tenant_id: Uuid,
    query: &'a OccurrenceQuery,
  ) -> Result<Vec<Occurrence>> {
    let status = query.status.map(encode_tag);
    let kind = query.kind.map(encode_tag);
    let triage = query.triage.map(encode_tag);
    let text = query
      .text
      .as_deref()
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .map(contains_pattern);
    let after = opt_dt(query.created_after);
    let before = opt_dt(query.created_before);
    let limit = i64::try_from(query.limit.unwrap_or(DEFAULT_LIMIT)).unwrap_or(i64::MAX);
    let offset = i64::try_from(query.offset.unwrap_or(0)).unwrap_or(0);

    self
      .run(move |conn| {
        let sql = format!(
          "{OCCURRENCE_SELECT}
           WHERE o.tenant_id = ?1
             AND (?2 IS NULL OR o.status = ?2)
             AND (?3 IS NULL OR o.kind = ?3)
             AND (?4 IS NULL OR o.triage = ?4)
             AND (?5 IS NULL OR o.protocol LIKE ?5 ESCAPE '\\'
                             OR o.subtype LIKE ?5 ESCAPE '\\'
                             OR o.description LIKE ?5 ESCAPE '\\')
             AND (?6 IS NULL OR o.created_at >= ?6)
             AND (?7 IS NULL OR o.created_at < ?7)
           ORDER BY o.created_at DESC, o.rowid DESC
           LIMIT ?8 OFFSET ?9"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            params![
              encode_uuid(tenant_id),
              status,
              kind,
              triage,
              text,
              after,
              before,
              limit,
              offset,
            ],
            OccurrenceRow::read,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(OccurrenceRow::into_occurrence).collect()
      })
      .await
  }

  async fn update_details(
    &self,
    tenant_id: Uuid,
    id: Uuid,
    details: OccurrenceDetails,
  ) -> Result<Occurrence> {
    details.validate()?;
    self
      .run(move |conn| {
        let mut occurrence = require_occurrence(conn, tenant_id, id)?;
        occurrence.ensure_editable()?;
        occurrence.details = details;
        occurrence.updated_at = Utc::now();
        save_occurrence(conn, &occurrence)?;
        Ok(occurrence)
      })
      .await
  }

  // ── Lifecycle ─────────────────────────────────────────────────────────

  async fn set_triage(
    &self,
    tenant_id: Uuid,
    id: Uuid,
    level: TriageLevel,
  ) -> Result<Occurrence> {
    self
      .run(move |conn| {
        let mut occurrence = require_occurrence(conn, tenant_id, id)?;
        occurrence.check_triage()?;
        let now = Utc::now();
        occurrence.triage = Some(level);
        occurrence.triaged_at = Some(now);
        occurrence.updated_at = now;
        save_occurrence(conn, &occurrence)?;
        Ok(occurrence)
      })
      .await
  }

  async fn transition(
    &self,
    tenant_id: Uuid,
    id: Uuid,
    request: TransitionRequest,
  ) -> Result<(Occurrence, StatusChange)> {
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        let mut occurrence = require_occurrence(&tx, tenant_id, id)?;
        let capas = load_capas(&tx, tenant_id, id)?;

        let change = apply_transition(&mut occurrence, &capas, request, Utc::now())?;
        save_occurrence(&tx, &occurrence)?;
        HistoryRow::encode(&change).insert(&tx)?;

        tx.commit()?;
        Ok((occurrence, change))
      })
      .await
  }

  async fn set_outcomes(
    &self,
    tenant_id: Uuid,
    id: Uuid,
    outcomes: OutcomeSelection,
  ) -> Result<Occurrence> {
    self
      .run(move |conn| {
        let mut occurrence = require_occurrence(conn, tenant_id, id)?;
        occurrence.check_outcomes()?;
        let now = Utc::now();
        occurrence.outcomes = outcomes;
        occurrence.outcome_at = Some(now);
        occurrence.updated_at = now;
        save_occurrence(conn, &occurrence)?;
        Ok(occurrence)
      })
      .await
  }

  async fn record_notification(
    &self,
    tenant_id: Uuid,
    id: Uuid,
    input: NewExternalNotification,
  ) -> Result<Occurrence> {
    input.validate()?;
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        let mut occurrence = require_occurrence(&tx, tenant_id, id)?;
        occurrence.check_notification()?;

        let now = Utc::now();
        let record = input.into_record(now);
        tx.execute(
          "INSERT INTO external_notifications
             (occurrence_id, agency, notified_on, responsible, attachment_id, recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          params![
            encode_uuid(id),
            record.agency,
            encode_date(record.notified_on),
            record.responsible,
            record.attachment_id.map(encode_uuid),
            encode_dt(record.recorded_at),
          ],
        )?;

        occurrence.external_notification = Some(record);
        occurrence.updated_at = now;
        save_occurrence(&tx, &occurrence)?;

        tx.commit()?;
        Ok(occurrence)
      })
      .await
  }

  async fn history(&self, tenant_id: Uuid, id: Uuid) -> Result<Vec<StatusChange>> {
    self
      .run(move |conn| {
        require_occurrence(conn, tenant_id, id)?;
        load_history(conn, id)
      })
      .await
  }

  // ── Corrective actions ────────────────────────────────────────────────

  async fn add_corrective_action(
    &self,
    tenant_id: Uuid,
    occurrence_id: Uuid,
    input: NewCorrectiveAction,
  ) -> Result<CorrectiveAction> {
    input.validate()?;
    self
      .run(move |conn| {
        let occurrence = require_occurrence(conn, tenant_id, occurrence_id)?;
        occurrence.ensure_editable()?;

        let now = Utc::now();
        let capa = CorrectiveAction {
          capa_id: Uuid::new_v4(),
          occurrence_id,
          tenant_id,
          root_cause: input.root_cause,
          action: input.action,
          responsible: input.responsible,
          deadline: input.deadline,
          status: CapaStatus::Pending,
          evidence: None,
          verification_note: None,
          created_at: now,
          updated_at: now,
        };
        insert_capa(conn, &capa)?;
        Ok(capa)
      })
      .await
  }

  async fn advance_corrective_action(
    &self,
    tenant_id: Uuid,
    capa_id: Uuid,
    update: CapaUpdate,
  ) -> Result<CorrectiveAction> {
    self
      .run(move |conn| {
        let sql = format!("{CAPA_SELECT} WHERE tenant_id = ?1 AND capa_id = ?2");
        let mut capa = conn
          .query_row(
            &sql,
            params![encode_uuid(tenant_id), encode_uuid(capa_id)],
            CapaRow::read,
          )
          .optional()?
          .ok_or(vigil_core::Error::CorrectiveActionNotFound(capa_id))?
          .into_capa()?;

        capa.advance(update, Utc::now())?;

        let r = CapaRow::encode(&capa);
        conn.execute(
          "UPDATE corrective_actions
           SET status = ?3, evidence = ?4, verification_note = ?5, updated_at = ?6
           WHERE tenant_id = ?1 AND capa_id = ?2",
          params![
            r.tenant_id,
            r.capa_id,
            r.status,
            r.evidence,
            r.verification_note,
            r.updated_at,
          ],
        )?;
        Ok(capa)
      })
      .await
  }

  async fn list_corrective_actions(
    &self,
    tenant_id: Uuid,
    occurrence_id: Uuid,
  ) -> Result<Vec<CorrectiveAction>> {
    self
      .run(move |conn| {
        require_occurrence(conn, tenant_id, occurrence_id)?;
        load_capas(conn, tenant_id, occurrence_id)
      })
      .await
  }

  // ── Attachments ───────────────────────────────────────────────────────

  async fn add_attachment(
    &self,
    tenant_id: Uuid,
    input: NewAttachment,
  ) -> Result<Attachment> {
    input.validate()?;
    self
      .run(move |conn| {
        require_occurrence(conn, tenant_id, input.occurrence_id)?;

        let attachment = Attachment {
          attachment_id: input.attachment_id,
          occurrence_id: input.occurrence_id,
          tenant_id,
          file_name: input.file_name,
          mime_type: input.mime_type,
          size_bytes: input.size_bytes,
          storage_path: input.storage_path,
          content_hash: input.content_hash,
          uploaded_by: input.uploaded_by,
          created_at: Utc::now(),
        };
        let r = AttachmentRow::encode(&attachment);
        conn.execute(
          "INSERT INTO attachments (
             attachment_id, occurrence_id, tenant_id, file_name, mime_type,
             size_bytes, storage_path, content_hash, uploaded_by, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          params![
            r.attachment_id,
            r.occurrence_id,
            r.tenant_id,
            r.file_name,
            r.mime_type,
            r.size_bytes,
            r.storage_path,
            r.content_hash,
            r.uploaded_by,
            r.created_at,
          ],
        )?;
        Ok(attachment)
      })
      .await
  }

  async fn get_attachment(
    &self,
    tenant_id: Uuid,
    id: Uuid,
  ) -> Result<Option<Attachment>> {
    self
      .run(move |conn| {
        let sql =
          format!("{ATTACHMENT_SELECT} WHERE tenant_id = ?1 AND attachment_id = ?2");
        conn
          .query_row(
            &sql,
            params![encode_uuid(tenant_id), encode_uuid(id)],
            AttachmentRow::read,
          )
          .optional()?
          .map(AttachmentRow::into_attachment)
          .transpose()
      })
      .await
  }

  async fn list_attachments(
    &self,
    tenant_id: Uuid,
    occurrence_id: Uuid,
  ) -> Result<Vec<Attachment>> {
    self
      .run(move |conn| {
        require_occurrence(conn, tenant_id, occurrence_id)?;
        load_attachments(conn, tenant_id, occurrence_id)
      })
      .await
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  async fn materialize(
    &self,
    tenant_id: Uuid,
    id: Uuid,
  ) -> Result<Option<OccurrenceView>> {
    self
      .run(move |conn| {
        let Some(occurrence) = load_occurrence(conn, tenant_id, id)? else {
          return Ok(None);
        };
        let capas = load_capas(conn, tenant_id, id)?;
        let attachments = load_attachments(conn, tenant_id, id)?;
        let history = load_history(conn, id)?;
        Ok(Some(OccurrenceView::assemble(occurrence, capas, attachments, history)))
      })
      .await
  }

  async fn dashboard<'a>(
    &'a self,
    tenant_id: Uuid,
    query: &'a DashboardQuery,
  ) -> Result<Dashboard> {
    let after = opt_dt(query.created_after);
    let before = opt_dt(query.created_before);

    self
      .run(move |conn| {
        let tenant = encode_uuid(tenant_id);

        let mut stmt = conn.prepare(
          "SELECT status, kind, triage, outcomes
           FROM occurrences
           WHERE tenant_id = ?1
             AND (?2 IS NULL OR created_at >= ?2)
             AND (?3 IS NULL OR created_at < ?3)",
        )?;
        let raw = stmt
          .query_map(params![tenant, after, before], |r| {
            Ok((
              r.get::<_, String>(0)?,
              r.get::<_, String>(1)?,
              r.get::<_, Option<String>>(2)?,
              r.get::<_, String>(3)?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let rows = raw
          .into_iter()
          .map(|(status, kind, triage, outcomes)| -> Result<DashboardRow> {
            Ok(DashboardRow {
              status:   decode_tag("status", &status)?,
              kind:     decode_tag("kind", &kind)?,
              triage:   triage
                .as_deref()
                .map(|t| decode_tag("triage", t))
                .transpose()?,
              outcomes: serde_json::from_str(&outcomes)?,
            })
          })
          .collect::<Result<Vec<_>>>()?;

        // Dismissed occurrences contribute no open actions.
        let sql = format!(
          "{CAPA_SELECT} WHERE tenant_id = ?1
             AND occurrence_id IN (
               SELECT occurrence_id FROM occurrences
               WHERE tenant_id = ?1
                 AND status <> ?4
                 AND (?2 IS NULL OR created_at >= ?2)
                 AND (?3 IS NULL OR created_at < ?3))"
        );
        let dismissed = encode_tag(OccurrenceStatus::NotApplicable);
        let mut stmt = conn.prepare(&sql)?;
        let capas = stmt
          .query_map(params![tenant, after, before, dismissed], CapaRow::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?
          .into_iter()
          .map(CapaRow::into_capa)
          .collect::<Result<Vec<_>>>()?;

        Ok(Dashboard::tally(rows, &capas, Utc::now().date_naive()))
      })
      .await
  }

  // ── Doctor hand-off ───────────────────────────────────────────────────

  async fn issue_handoff(
    &self,
    tenant_id: Uuid,
    id: Uuid,
    handoff: PublicHandoff,
  ) -> Result<Occurrence> {
    if handoff.token_hash.is_empty() {
      return Err(vigil_core::Error::Validation("hand-off token hash is empty".into()).into());
    }
    self
      .run(move |conn| {
        let mut occurrence = require_occurrence(conn, tenant_id, id)?;
        occurrence.check_handoff()?;
        occurrence.updated_at = handoff.issued_at;
        occurrence.handoff = Some(handoff);
        save_occurrence(conn, &occurrence)?;
        Ok(occurrence)
      })
      .await
  }

  async fn find_by_handoff(&self, token_hash: String) -> Result<Option<Occurrence>> {
    self
      .run(move |conn| find_by_token(conn, &token_hash))
      .await
  }

  async fn submit_review(
    &self,
    token_hash: String,
    review: DoctorReview,
  ) -> Result<Occurrence> {
    self
      .run(move |conn| {
        let mut occurrence =
          find_by_token(conn, &token_hash)?.ok_or(vigil_core::Error::HandoffNotFound)?;
        occurrence.active_handoff(review.submitted_at)?;

        if let Some(handoff) = occurrence.handoff.as_mut() {
          // Revoked: the row keeps who was asked and when, not the token.
          handoff.token_hash.clear();
        }
        occurrence.updated_at = review.submitted_at;
        occurrence.doctor_review = Some(review);
        save_occurrence(conn, &occurrence)?;
        Ok(occurrence)
      })
      .await
  }
}
