use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use plenum_types::models::{ForumComment, ForumPost};
use plenum_types::reactions::ReactionOutcome;

use crate::Database;
use crate::models::{CommentRow, PostRow};
use crate::queries::audit;

impl Database {
    // -- Posts --

    pub fn insert_post(&self, post: &ForumPost) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO forum_posts (id, title, content, author_id, likes, created_at, updated_at, is_edited)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    post.id.to_string(),
                    post.title,
                    post.content,
                    post.author_id.to_string(),
                    post.likes.to_column(),
                    post.created_at.to_rfc3339(),
                    post.updated_at.to_rfc3339(),
                    post.is_edited,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_post(&self, id: Uuid) -> Result<Option<ForumPost>> {
        self.with_conn(|conn| Ok(query_post(conn, id)?.map(PostRow::into_post)))
    }

    /// All posts, newest first (the "recent" ordering; "popular" is
    /// recomputed from reaction scores by the caller).
    pub fn list_posts(&self) -> Result<Vec<ForumPost>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {POST_COLUMNS} FROM forum_posts ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map([], map_post_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows.into_iter().map(PostRow::into_post).collect())
        })
    }

    /// Author edit: replaces title/content and marks the post edited.
    /// `is_edited` is never reset once set.
    pub fn update_post_content(
        &self,
        id: Uuid,
        title: &str,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE forum_posts SET title = ?1, content = ?2, updated_at = ?3, is_edited = 1
                 WHERE id = ?4",
                rusqlite::params![title, content, updated_at.to_rfc3339(), id.to_string()],
            )?;
            Ok(changed > 0)
        })
    }

    /// Deletes a post with its audit trail: the DeletionLog snapshot and
    /// the delete commit together. Comments cascade. Returns the deleted
    /// post, or None when it did not exist.
    pub fn delete_post_logged(
        &self,
        id: Uuid,
        deleted_by: Uuid,
        deleted_by_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ForumPost>> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let Some(post) = query_post(&tx, id)?.map(PostRow::into_post) else {
                return Ok(None);
            };
            audit::insert_log(
                &tx,
                "forum_posts",
                id,
                deleted_by,
                deleted_by_name,
                &serde_json::to_value(&post)?,
                now,
            )?;
            tx.execute(
                "DELETE FROM forum_posts WHERE id = ?1",
                [id.to_string()],
            )?;
            tx.commit()?;
            Ok(Some(post))
        })
    }

    /// Reaction ledger write for a post: authoritative re-read, toggle,
    /// and write-back inside a single transaction, so concurrent reactors
    /// cannot clobber each other's entries. Returns the outcome and the
    /// post as it now stands, or None for an unknown post.
    pub fn react_to_post(
        &self,
        id: Uuid,
        user_id: Uuid,
        is_like: bool,
        display_name: &str,
    ) -> Result<Option<(ReactionOutcome, ForumPost)>> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let Some(mut post) = query_post(&tx, id)?.map(PostRow::into_post) else {
                return Ok(None);
            };
            let outcome = post.likes.toggle(user_id, is_like, display_name);
            tx.execute(
                "UPDATE forum_posts SET likes = ?1 WHERE id = ?2",
                rusqlite::params![post.likes.to_column(), id.to_string()],
            )?;
            tx.commit()?;
            Ok(Some((outcome, post)))
        })
    }

    // -- Comments --

    pub fn insert_comment(&self, comment: &ForumComment) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO forum_comments
                    (id, post_id, parent_comment_id, content, author_id, likes, created_at, updated_at, is_edited)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    comment.id.to_string(),
                    comment.post_id.to_string(),
                    comment.parent_comment_id.map(|p| p.to_string()),
                    comment.content,
                    comment.author_id.to_string(),
                    comment.likes.to_column(),
                    comment.created_at.to_rfc3339(),
                    comment.updated_at.to_rfc3339(),
                    comment.is_edited,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_comment(&self, id: Uuid) -> Result<Option<ForumComment>> {
        self.with_conn(|conn| Ok(query_comment(conn, id)?.map(CommentRow::into_comment)))
    }

    /// A post's comments, chronological ascending: the order the
    /// threading transform expects.
    pub fn list_comments(&self, post_id: Uuid) -> Result<Vec<ForumComment>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COMMENT_COLUMNS} FROM forum_comments
                 WHERE post_id = ?1 ORDER BY created_at ASC"
            ))?;
            let rows = stmt
                .query_map([post_id.to_string()], map_comment_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows.into_iter().map(CommentRow::into_comment).collect())
        })
    }

    pub fn count_comments(&self, post_id: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM forum_comments WHERE post_id = ?1",
                [post_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }

    /// Comment totals per post, for the list view.
    pub fn comment_counts(&self) -> Result<HashMap<Uuid, usize>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT post_id, COUNT(*) FROM forum_comments GROUP BY post_id")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows
                .into_iter()
                .filter_map(|(id, n)| id.parse().ok().map(|id| (id, n as usize)))
                .collect())
        })
    }

    pub fn update_comment_content(
        &self,
        id: Uuid,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE forum_comments SET content = ?1, updated_at = ?2, is_edited = 1
                 WHERE id = ?3",
                rusqlite::params![content, updated_at.to_rfc3339(), id.to_string()],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_comment_logged(
        &self,
        id: Uuid,
        deleted_by: Uuid,
        deleted_by_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ForumComment>> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let Some(comment) = query_comment(&tx, id)?.map(CommentRow::into_comment) else {
                return Ok(None);
            };
            audit::insert_log(
                &tx,
                "forum_comments",
                id,
                deleted_by,
                deleted_by_name,
                &serde_json::to_value(&comment)?,
                now,
            )?;
            tx.execute(
                "DELETE FROM forum_comments WHERE id = ?1 OR parent_comment_id = ?1",
                [id.to_string()],
            )?;
            tx.commit()?;
            Ok(Some(comment))
        })
    }

    pub fn react_to_comment(
        &self,
        id: Uuid,
        user_id: Uuid,
        is_like: bool,
        display_name: &str,
    ) -> Result<Option<(ReactionOutcome, ForumComment)>> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let Some(mut comment) = query_comment(&tx, id)?.map(CommentRow::into_comment) else {
                return Ok(None);
            };
            let outcome = comment.likes.toggle(user_id, is_like, display_name);
            tx.execute(
                "UPDATE forum_comments SET likes = ?1 WHERE id = ?2",
                rusqlite::params![comment.likes.to_column(), id.to_string()],
            )?;
            tx.commit()?;
            Ok(Some((outcome, comment)))
        })
    }
}

const POST_COLUMNS: &str =
    "id, title, content, author_id, likes, created_at, updated_at, is_edited";

const COMMENT_COLUMNS: &str =
    "id, post_id, parent_comment_id, content, author_id, likes, created_at, updated_at, is_edited";

fn map_post_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        author_id: row.get(3)?,
        likes: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        is_edited: row.get(7)?,
    })
}

fn map_comment_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        post_id: row.get(1)?,
        parent_comment_id: row.get(2)?,
        content: row.get(3)?,
        author_id: row.get(4)?,
        likes: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        is_edited: row.get(8)?,
    })
}

fn query_post(conn: &Connection, id: Uuid) -> Result<Option<PostRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {POST_COLUMNS} FROM forum_posts WHERE id = ?1"
    ))?;
    Ok(stmt
        .query_row([id.to_string()], map_post_row)
        .optional()?)
}

fn query_comment(conn: &Connection, id: Uuid) -> Result<Option<CommentRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COMMENT_COLUMNS} FROM forum_comments WHERE id = ?1"
    ))?;
    Ok(stmt
        .query_row([id.to_string()], map_comment_row)
        .optional()?)
}

#[cfg(test)]
mod tests {
    use plenum_types::reactions::ReactionSet;
    use plenum_types::roles::Role;

    use super::*;
    use crate::queries::profiles::tests::seed_profile;

    fn post(id: u128, author: Uuid, title: &str) -> ForumPost {
        let now = Utc::now();
        ForumPost {
            id: Uuid::from_u128(id),
            title: title.to_string(),
            content: "body".to_string(),
            author_id: author,
            likes: ReactionSet::new(),
            created_at: now,
            updated_at: now,
            is_edited: false,
        }
    }

    fn comment(id: u128, post_id: Uuid, author: Uuid, parent: Option<Uuid>) -> ForumComment {
        let now = Utc::now();
        ForumComment {
            id: Uuid::from_u128(id),
            post_id,
            parent_comment_id: parent,
            content: "a comment".to_string(),
            author_id: author,
            likes: ReactionSet::new(),
            created_at: now,
            updated_at: now,
            is_edited: false,
        }
    }

    #[test]
    fn is_edited_starts_false_and_sticks_after_edit() {
        let db = Database::open_in_memory().unwrap();
        let ana = seed_profile(&db, 1, "Ana", Role::Special);
        let p = post(10, ana, "Launch plan");
        db.insert_post(&p).unwrap();

        assert!(!db.get_post(p.id).unwrap().unwrap().is_edited);

        assert!(db
            .update_post_content(p.id, "Launch plan", "We ship Friday", Utc::now())
            .unwrap());
        let edited = db.get_post(p.id).unwrap().unwrap();
        assert!(edited.is_edited);
        assert_eq!(edited.content, "We ship Friday");

        // Further edits keep the flag set.
        db.update_post_content(p.id, "Launch plan v2", "body", Utc::now())
            .unwrap();
        assert!(db.get_post(p.id).unwrap().unwrap().is_edited);
    }

    #[test]
    fn deleting_a_post_writes_a_matching_snapshot_log() {
        let db = Database::open_in_memory().unwrap();
        let ana = seed_profile(&db, 1, "Ana", Role::Special);
        let p = post(10, ana, "Launch plan");
        db.insert_post(&p).unwrap();

        let deleted = db
            .delete_post_logged(p.id, ana, "Ana Member", Utc::now())
            .unwrap()
            .expect("post existed");

        assert!(db.get_post(p.id).unwrap().is_none());

        let logs = db.list_deletion_logs().unwrap();
        assert_eq!(logs.len(), 1);
        let log = &logs[0];
        assert_eq!(log.table_name, "forum_posts");
        assert_eq!(log.record_id, p.id);
        assert_eq!(log.deleted_by, ana);
        assert_eq!(log.details, serde_json::to_value(&deleted).unwrap());
    }

    #[test]
    fn deleting_a_missing_post_logs_nothing() {
        let db = Database::open_in_memory().unwrap();
        let ana = seed_profile(&db, 1, "Ana", Role::Special);
        let gone = db
            .delete_post_logged(Uuid::from_u128(99), ana, "Ana", Utc::now())
            .unwrap();
        assert!(gone.is_none());
        assert!(db.list_deletion_logs().unwrap().is_empty());
    }

    #[test]
    fn comments_cascade_when_their_post_is_deleted() {
        let db = Database::open_in_memory().unwrap();
        let ana = seed_profile(&db, 1, "Ana", Role::Special);
        let p = post(10, ana, "Launch plan");
        db.insert_post(&p).unwrap();
        db.insert_comment(&comment(20, p.id, ana, None)).unwrap();

        db.delete_post_logged(p.id, ana, "Ana", Utc::now()).unwrap();
        assert!(db.list_comments(p.id).unwrap().is_empty());
    }

    #[test]
    fn reaction_toggle_persists_through_the_ledger() {
        let db = Database::open_in_memory().unwrap();
        let ana = seed_profile(&db, 1, "Ana", Role::Special);
        let ben = seed_profile(&db, 2, "Ben", Role::Special);
        let p = post(10, ana, "Launch plan");
        db.insert_post(&p).unwrap();

        let (outcome, updated) = db
            .react_to_post(p.id, ben, true, "Ben Member")
            .unwrap()
            .unwrap();
        assert_eq!(outcome, ReactionOutcome::Added);
        assert_eq!(updated.likes.count(true), 1);

        // Switch to dislike: replaced in place, still one entry.
        let (outcome, updated) = db
            .react_to_post(p.id, ben, false, "Ben Member")
            .unwrap()
            .unwrap();
        assert_eq!(outcome, ReactionOutcome::Replaced);
        assert_eq!(updated.likes.len(), 1);
        assert_eq!(updated.likes.status_for(ben), Some(false));

        // Same reaction again: removed, and the stored set agrees.
        let (outcome, _) = db
            .react_to_post(p.id, ben, false, "Ben Member")
            .unwrap()
            .unwrap();
        assert_eq!(outcome, ReactionOutcome::Removed);
        assert!(db.get_post(p.id).unwrap().unwrap().likes.is_empty());
    }

    #[test]
    fn reacting_to_a_missing_comment_is_none() {
        let db = Database::open_in_memory().unwrap();
        let ana = seed_profile(&db, 1, "Ana", Role::Special);
        assert!(db
            .react_to_comment(Uuid::from_u128(5), ana, true, "Ana")
            .unwrap()
            .is_none());
    }

    #[test]
    fn comment_counts_group_by_post() {
        let db = Database::open_in_memory().unwrap();
        let ana = seed_profile(&db, 1, "Ana", Role::Special);
        let p1 = post(10, ana, "One");
        let p2 = post(11, ana, "Two");
        db.insert_post(&p1).unwrap();
        db.insert_post(&p2).unwrap();
        db.insert_comment(&comment(20, p1.id, ana, None)).unwrap();
        db.insert_comment(&comment(21, p1.id, ana, Some(Uuid::from_u128(20))))
            .unwrap();

        let counts = db.comment_counts().unwrap();
        assert_eq!(counts.get(&p1.id), Some(&2));
        assert_eq!(counts.get(&p2.id), None);
    }

    #[test]
    fn deleting_a_comment_takes_its_replies_and_logs_once() {
        let db = Database::open_in_memory().unwrap();
        let ana = seed_profile(&db, 1, "Ana", Role::Special);
        let p = post(10, ana, "One");
        db.insert_post(&p).unwrap();
        let parent = comment(20, p.id, ana, None);
        db.insert_comment(&parent).unwrap();
        db.insert_comment(&comment(21, p.id, ana, Some(parent.id)))
            .unwrap();

        db.delete_comment_logged(parent.id, ana, "Ana", Utc::now())
            .unwrap()
            .expect("comment existed");

        assert!(db.list_comments(p.id).unwrap().is_empty());
        assert_eq!(db.list_deletion_logs().unwrap().len(), 1);
    }
}
