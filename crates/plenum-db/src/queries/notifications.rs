use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use plenum_types::models::Notification;

use crate::Database;
use crate::models::NotificationRow;

impl Database {
    pub fn insert_notification(&self, n: &Notification) -> Result<()> {
        self.insert_notifications(std::slice::from_ref(n))
    }

    /// Insert a batch of notification rows in one transaction.
    pub fn insert_notifications(&self, batch: &[Notification]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO notifications (id, user_id, type, content, link, is_read, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )?;
                for n in batch {
                    stmt.execute(rusqlite::params![
                        n.id.to_string(),
                        n.user_id.to_string(),
                        n.kind,
                        n.content,
                        n.link,
                        n.is_read,
                        n.created_at.to_rfc3339(),
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// A user's notification view, newest first. Read rows older than
    /// `read_cutoff` have aged out of the view; the rows themselves are
    /// kept.
    pub fn list_notifications(
        &self,
        user_id: Uuid,
        read_cutoff: DateTime<Utc>,
    ) -> Result<Vec<Notification>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, type, content, link, is_read, created_at
                 FROM notifications
                 WHERE user_id = ?1 AND (is_read = 0 OR created_at > ?2)
                 ORDER BY created_at DESC",
            )?;
            let rows = stmt
                .query_map(
                    rusqlite::params![user_id.to_string(), read_cutoff.to_rfc3339()],
                    map_notification_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows
                .into_iter()
                .map(NotificationRow::into_notification)
                .collect())
        })
    }

    /// Marking read is the only mutation notifications ever see.
    /// Returns false when the row is missing or owned by someone else.
    pub fn mark_notification_read(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![id.to_string(), user_id.to_string()],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
                [user_id.to_string()],
            )?;
            Ok(changed)
        })
    }
}

fn map_notification_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: row.get(2)?,
        content: row.get(3)?,
        link: row.get(4)?,
        is_read: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use plenum_types::roles::Role;

    use super::*;
    use crate::queries::profiles::tests::seed_profile;

    fn notification(id: u128, user: Uuid, created_at: DateTime<Utc>) -> Notification {
        Notification {
            id: Uuid::from_u128(id),
            user_id: user,
            kind: "post_created".to_string(),
            content: "Ana created a new post: Launch plan".to_string(),
            link: Some("/forum".to_string()),
            is_read: false,
            created_at,
        }
    }

    #[test]
    fn read_rows_age_out_of_the_view_but_stay_stored() {
        let db = Database::open_in_memory().unwrap();
        let ana = seed_profile(&db, 1, "Ana", Role::Special);
        let now = Utc::now();

        let fresh = notification(1, ana, now - Duration::hours(1));
        let stale = notification(2, ana, now - Duration::hours(30));
        db.insert_notifications(&[fresh.clone(), stale.clone()])
            .unwrap();

        let cutoff = now - Duration::hours(24);

        // Unread rows are always visible, however old.
        assert_eq!(db.list_notifications(ana, cutoff).unwrap().len(), 2);

        db.mark_notification_read(stale.id, ana).unwrap();
        let view = db.list_notifications(ana, cutoff).unwrap();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].id, fresh.id);

        // A freshly read recent row stays visible until it ages past the cutoff.
        db.mark_notification_read(fresh.id, ana).unwrap();
        assert_eq!(db.list_notifications(ana, cutoff).unwrap().len(), 1);
    }

    #[test]
    fn view_is_newest_first_and_scoped_to_the_recipient() {
        let db = Database::open_in_memory().unwrap();
        let ana = seed_profile(&db, 1, "Ana", Role::Special);
        let ben = seed_profile(&db, 2, "Ben", Role::Special);
        let now = Utc::now();

        db.insert_notifications(&[
            notification(1, ana, now - Duration::minutes(10)),
            notification(2, ana, now - Duration::minutes(1)),
            notification(3, ben, now),
        ])
        .unwrap();

        let view = db
            .list_notifications(ana, now - Duration::hours(24))
            .unwrap();
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].id, Uuid::from_u128(2));
        assert_eq!(view[1].id, Uuid::from_u128(1));
    }

    #[test]
    fn marking_read_is_owner_scoped() {
        let db = Database::open_in_memory().unwrap();
        let ana = seed_profile(&db, 1, "Ana", Role::Special);
        let ben = seed_profile(&db, 2, "Ben", Role::Special);
        let n = notification(1, ana, Utc::now());
        db.insert_notification(&n).unwrap();

        assert!(!db.mark_notification_read(n.id, ben).unwrap());
        assert!(db.mark_notification_read(n.id, ana).unwrap());
        assert!(!db.mark_notification_read(Uuid::from_u128(9), ana).unwrap());
    }

    #[test]
    fn mark_all_touches_only_unread_rows() {
        let db = Database::open_in_memory().unwrap();
        let ana = seed_profile(&db, 1, "Ana", Role::Special);
        let now = Utc::now();
        let a = notification(1, ana, now);
        let b = notification(2, ana, now);
        db.insert_notifications(&[a.clone(), b]).unwrap();
        db.mark_notification_read(a.id, ana).unwrap();

        assert_eq!(db.mark_all_notifications_read(ana).unwrap(), 1);
        assert_eq!(db.mark_all_notifications_read(ana).unwrap(), 0);
    }
}
