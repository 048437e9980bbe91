use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS profiles (
            id          TEXT PRIMARY KEY,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            first_name  TEXT NOT NULL DEFAULT '',
            last_name   TEXT NOT NULL DEFAULT '',
            role        TEXT NOT NULL DEFAULT 'viewer',
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS forum_posts (
            id          TEXT PRIMARY KEY,
            title       TEXT NOT NULL,
            content     TEXT NOT NULL,
            author_id   TEXT NOT NULL REFERENCES profiles(id),
            likes       TEXT NOT NULL DEFAULT '[]',
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at  TEXT NOT NULL DEFAULT (datetime('now')),
            is_edited   INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_forum_posts_created
            ON forum_posts(created_at);

        CREATE TABLE IF NOT EXISTS forum_comments (
            id                  TEXT PRIMARY KEY,
            post_id             TEXT NOT NULL REFERENCES forum_posts(id) ON DELETE CASCADE,
            parent_comment_id   TEXT,
            content             TEXT NOT NULL,
            author_id           TEXT NOT NULL REFERENCES profiles(id),
            likes               TEXT NOT NULL DEFAULT '[]',
            created_at          TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at          TEXT NOT NULL DEFAULT (datetime('now')),
            is_edited           INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_forum_comments_post
            ON forum_comments(post_id, created_at);

        CREATE TABLE IF NOT EXISTS notifications (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES profiles(id),
            type        TEXT NOT NULL,
            content     TEXT NOT NULL,
            link        TEXT,
            is_read     INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_user
            ON notifications(user_id, created_at);

        CREATE TABLE IF NOT EXISTS deletion_logs (
            id              TEXT PRIMARY KEY,
            table_name      TEXT NOT NULL,
            record_id       TEXT NOT NULL,
            deleted_by      TEXT NOT NULL,
            deleted_by_name TEXT NOT NULL,
            details         TEXT NOT NULL,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS events (
            id          TEXT PRIMARY KEY,
            title       TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            location    TEXT NOT NULL DEFAULT '',
            start_time  TEXT NOT NULL,
            end_time    TEXT NOT NULL,
            is_meeting  INTEGER NOT NULL DEFAULT 0,
            created_by  TEXT NOT NULL REFERENCES profiles(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(title, created_by, start_time)
        );

        CREATE TABLE IF NOT EXISTS event_participants (
            id          TEXT PRIMARY KEY,
            event_id    TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL REFERENCES profiles(id),
            response    TEXT NOT NULL DEFAULT 'pending',
            UNIQUE(event_id, user_id)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
