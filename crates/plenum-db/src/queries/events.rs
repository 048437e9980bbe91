use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use plenum_types::models::{CalendarEvent, EventParticipant};

use crate::Database;
use crate::models::{EventRow, ParticipantRow};
use crate::queries::audit;

/// Result of a create: either the inserted event or a recent identical
/// one that was reused instead.
pub struct CreatedEvent {
    pub event: CalendarEvent,
    pub reused: bool,
}

/// Window inside which an identical submission is treated as a double-click
/// or retried request rather than a new event.
const DUPLICATE_WINDOW: Duration = Duration::seconds(5);

impl Database {
    /// Insert a calendar event with the duplicate-submission guard: an
    /// event with the same title and creator created within the last 5
    /// seconds is reused. A unique-constraint violation during insert
    /// (two racing submissions) falls back to fetching the newest matching
    /// row instead of surfacing the raw error.
    pub fn create_event(&self, event: &CalendarEvent, now: DateTime<Utc>) -> Result<CreatedEvent> {
        self.with_conn(|conn| {
            let window_start = (now - DUPLICATE_WINDOW).to_rfc3339();
            if let Some(existing) =
                query_latest_matching(conn, &event.title, event.created_by, Some(&window_start))?
            {
                return Ok(CreatedEvent {
                    event: existing,
                    reused: true,
                });
            }

            let inserted = conn.execute(
                "INSERT INTO events
                    (id, title, description, location, start_time, end_time, is_meeting, created_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    event.id.to_string(),
                    event.title,
                    event.description,
                    event.location,
                    event.start_time.to_rfc3339(),
                    event.end_time.to_rfc3339(),
                    event.is_meeting,
                    event.created_by.to_string(),
                    event.created_at.to_rfc3339(),
                    event.updated_at.to_rfc3339(),
                ],
            );

            match inserted {
                Ok(_) => Ok(CreatedEvent {
                    event: event.clone(),
                    reused: false,
                }),
                Err(rusqlite::Error::SqliteFailure(err, msg))
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    match query_latest_matching(conn, &event.title, event.created_by, None)? {
                        Some(existing) => Ok(CreatedEvent {
                            event: existing,
                            reused: true,
                        }),
                        None => Err(rusqlite::Error::SqliteFailure(err, msg).into()),
                    }
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn update_event(&self, event: &CalendarEvent) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE events SET title = ?1, description = ?2, location = ?3,
                    start_time = ?4, end_time = ?5, is_meeting = ?6, updated_at = ?7
                 WHERE id = ?8",
                rusqlite::params![
                    event.title,
                    event.description,
                    event.location,
                    event.start_time.to_rfc3339(),
                    event.end_time.to_rfc3339(),
                    event.is_meeting,
                    event.updated_at.to_rfc3339(),
                    event.id.to_string(),
                ],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn get_event(&self, id: Uuid) -> Result<Option<CalendarEvent>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"
            ))?;
            Ok(stmt
                .query_row([id.to_string()], map_event_row)
                .optional()?
                .map(EventRow::into_event))
        })
    }

    pub fn list_events(&self) -> Result<Vec<CalendarEvent>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM events ORDER BY start_time ASC"
            ))?;
            let rows = stmt
                .query_map([], map_event_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows.into_iter().map(EventRow::into_event).collect())
        })
    }

    pub fn delete_event_logged(
        &self,
        id: Uuid,
        deleted_by: Uuid,
        deleted_by_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CalendarEvent>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"
            ))?;
            let found = stmt
                .query_row([id.to_string()], map_event_row)
                .optional()?
                .map(EventRow::into_event);
            drop(stmt);
            let Some(event) = found else {
                return Ok(None);
            };

            let tx = conn.unchecked_transaction()?;
            audit::insert_log(
                &tx,
                "events",
                id,
                deleted_by,
                deleted_by_name,
                &serde_json::to_value(&event)?,
                now,
            )?;
            tx.execute("DELETE FROM events WHERE id = ?1", [id.to_string()])?;
            tx.commit()?;
            Ok(Some(event))
        })
    }

    /// Replace an event's participant list wholesale: old rows deleted,
    /// one fresh `pending` row per selected user.
    pub fn replace_participants(&self, event_id: Uuid, user_ids: &[Uuid]) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "DELETE FROM event_participants WHERE event_id = ?1",
                [event_id.to_string()],
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO event_participants (id, event_id, user_id, response)
                     VALUES (?1, ?2, ?3, 'pending')",
                )?;
                for user_id in user_ids {
                    stmt.execute(rusqlite::params![
                        Uuid::new_v4().to_string(),
                        event_id.to_string(),
                        user_id.to_string(),
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn list_participants(&self, event_id: Uuid) -> Result<Vec<EventParticipant>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, event_id, user_id, response FROM event_participants
                 WHERE event_id = ?1",
            )?;
            let rows = stmt
                .query_map([event_id.to_string()], |row| {
                    Ok(ParticipantRow {
                        id: row.get(0)?,
                        event_id: row.get(1)?,
                        user_id: row.get(2)?,
                        response: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows
                .into_iter()
                .map(ParticipantRow::into_participant)
                .collect())
        })
    }
}

const EVENT_COLUMNS: &str =
    "id, title, description, location, start_time, end_time, is_meeting, created_by, created_at, updated_at";

fn map_event_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventRow> {
    Ok(EventRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        location: row.get(3)?,
        start_time: row.get(4)?,
        end_time: row.get(5)?,
        is_meeting: row.get(6)?,
        created_by: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Newest event with this title and creator, optionally restricted to
/// rows created after `since`.
fn query_latest_matching(
    conn: &Connection,
    title: &str,
    created_by: Uuid,
    since: Option<&str>,
) -> Result<Option<CalendarEvent>> {
    let mut sql = format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE title = ?1 AND created_by = ?2"
    );
    if since.is_some() {
        sql.push_str(" AND created_at > ?3");
    }
    sql.push_str(" ORDER BY created_at DESC LIMIT 1");

    let mut stmt = conn.prepare(&sql)?;
    let row = match since {
        Some(since) => stmt
            .query_row(
                rusqlite::params![title, created_by.to_string(), since],
                map_event_row,
            )
            .optional()?,
        None => stmt
            .query_row(rusqlite::params![title, created_by.to_string()], map_event_row)
            .optional()?,
    };
    Ok(row.map(EventRow::into_event))
}
