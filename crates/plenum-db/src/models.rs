//! Database row types. These map directly to SQLite rows and convert to
//! the plenum-types domain models at the boundary. Corrupt cells are
//! logged and defaulted rather than failing whole queries.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use plenum_types::models::{
    CalendarEvent, DeletionLog, EventParticipant, ForumComment, ForumPost, Notification,
    ParticipantResponse, Profile,
};
use plenum_types::reactions::ReactionSet;
use plenum_types::roles::Role;

pub(crate) fn parse_uuid(raw: &str, context: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt uuid '{}' in {}: {}", raw, context, e);
        Uuid::nil()
    })
}

pub(crate) fn parse_ts(raw: &str, context: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') default stores "YYYY-MM-DD HH:MM:SS"
            // without a timezone. Parse as naive UTC and convert.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' in {}: {}", raw, context, e);
            DateTime::default()
        })
}

pub struct ProfileRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub created_at: String,
}

impl ProfileRow {
    pub fn into_profile(self) -> Profile {
        let role = Role::parse(&self.role).unwrap_or_else(|| {
            warn!("Unknown role '{}' on profile '{}'", self.role, self.id);
            Role::Viewer
        });
        Profile {
            id: parse_uuid(&self.id, "profiles.id"),
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            role,
            created_at: parse_ts(&self.created_at, "profiles.created_at"),
        }
    }
}

pub struct PostRow {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author_id: String,
    pub likes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub is_edited: bool,
}

impl PostRow {
    pub fn into_post(self) -> ForumPost {
        ForumPost {
            id: parse_uuid(&self.id, "forum_posts.id"),
            title: self.title,
            content: self.content,
            author_id: parse_uuid(&self.author_id, "forum_posts.author_id"),
            likes: ReactionSet::from_column(self.likes.as_deref()),
            created_at: parse_ts(&self.created_at, "forum_posts.created_at"),
            updated_at: parse_ts(&self.updated_at, "forum_posts.updated_at"),
            is_edited: self.is_edited,
        }
    }
}

pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub parent_comment_id: Option<String>,
    pub content: String,
    pub author_id: String,
    pub likes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub is_edited: bool,
}

impl CommentRow {
    pub fn into_comment(self) -> ForumComment {
        ForumComment {
            id: parse_uuid(&self.id, "forum_comments.id"),
            post_id: parse_uuid(&self.post_id, "forum_comments.post_id"),
            parent_comment_id: self
                .parent_comment_id
                .as_deref()
                .map(|raw| parse_uuid(raw, "forum_comments.parent_comment_id")),
            content: self.content,
            author_id: parse_uuid(&self.author_id, "forum_comments.author_id"),
            likes: ReactionSet::from_column(self.likes.as_deref()),
            created_at: parse_ts(&self.created_at, "forum_comments.created_at"),
            updated_at: parse_ts(&self.updated_at, "forum_comments.updated_at"),
            is_edited: self.is_edited,
        }
    }
}

pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub content: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: String,
}

impl NotificationRow {
    pub fn into_notification(self) -> Notification {
        Notification {
            id: parse_uuid(&self.id, "notifications.id"),
            user_id: parse_uuid(&self.user_id, "notifications.user_id"),
            kind: self.kind,
            content: self.content,
            link: self.link,
            is_read: self.is_read,
            created_at: parse_ts(&self.created_at, "notifications.created_at"),
        }
    }
}

pub struct DeletionLogRow {
    pub id: String,
    pub table_name: String,
    pub record_id: String,
    pub deleted_by: String,
    pub deleted_by_name: String,
    pub details: String,
    pub created_at: String,
}

impl DeletionLogRow {
    pub fn into_log(self) -> DeletionLog {
        let details = serde_json::from_str(&self.details).unwrap_or_else(|e| {
            warn!("Corrupt deletion snapshot on log '{}': {}", self.id, e);
            serde_json::Value::Null
        });
        DeletionLog {
            id: parse_uuid(&self.id, "deletion_logs.id"),
            table_name: self.table_name,
            record_id: parse_uuid(&self.record_id, "deletion_logs.record_id"),
            deleted_by: parse_uuid(&self.deleted_by, "deletion_logs.deleted_by"),
            deleted_by_name: self.deleted_by_name,
            details,
            created_at: parse_ts(&self.created_at, "deletion_logs.created_at"),
        }
    }
}

pub struct EventRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_time: String,
    pub end_time: String,
    pub is_meeting: bool,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

impl EventRow {
    pub fn into_event(self) -> CalendarEvent {
        CalendarEvent {
            id: parse_uuid(&self.id, "events.id"),
            title: self.title,
            description: self.description,
            location: self.location,
            start_time: parse_ts(&self.start_time, "events.start_time"),
            end_time: parse_ts(&self.end_time, "events.end_time"),
            is_meeting: self.is_meeting,
            created_by: parse_uuid(&self.created_by, "events.created_by"),
            created_at: parse_ts(&self.created_at, "events.created_at"),
            updated_at: parse_ts(&self.updated_at, "events.updated_at"),
        }
    }
}

pub struct ParticipantRow {
    pub id: String,
    pub event_id: String,
    pub user_id: String,
    pub response: String,
}

impl ParticipantRow {
    pub fn into_participant(self) -> EventParticipant {
        let response = ParticipantResponse::parse(&self.response).unwrap_or_else(|| {
            warn!(
                "Unknown response '{}' on participant '{}'",
                self.response, self.id
            );
            ParticipantResponse::Pending
        });
        EventParticipant {
            id: parse_uuid(&self.id, "event_participants.id"),
            event_id: parse_uuid(&self.event_id, "event_participants.event_id"),
            user_id: parse_uuid(&self.user_id, "event_participants.user_id"),
            response,
        }
    }
}
