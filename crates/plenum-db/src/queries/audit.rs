use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use plenum_types::models::DeletionLog;

use crate::Database;
use crate::models::DeletionLogRow;

/// Append one audit row. Runs on the caller's connection so logged
/// deletes can include it in their transaction.
pub(crate) fn insert_log(
    conn: &Connection,
    table_name: &str,
    record_id: Uuid,
    deleted_by: Uuid,
    deleted_by_name: &str,
    details: &serde_json::Value,
    created_at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO deletion_logs
            (id, table_name, record_id, deleted_by, deleted_by_name, details, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            Uuid::new_v4().to_string(),
            table_name,
            record_id.to_string(),
            deleted_by.to_string(),
            deleted_by_name,
            serde_json::to_string(details)?,
            created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

impl Database {
    /// Full audit trail, newest first. Admin surface only.
    pub fn list_deletion_logs(&self) -> Result<Vec<DeletionLog>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, table_name, record_id, deleted_by, deleted_by_name, details, created_at
                 FROM deletion_logs ORDER BY created_at DESC",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(DeletionLogRow {
                        id: row.get(0)?,
                        table_name: row.get(1)?,
                        record_id: row.get(2)?,
                        deleted_by: row.get(3)?,
                        deleted_by_name: row.get(4)?,
                        details: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows.into_iter().map(DeletionLogRow::into_log).collect())
        })
    }
}
