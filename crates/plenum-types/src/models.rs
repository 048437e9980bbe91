use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::reactions::ReactionSet;
use crate::roles::Role;

/// A registered user as exposed over the API (never carries the
/// password hash; that stays in the db layer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// "First Last", trimmed; empty when neither name is set.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForumPost {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author_id: Uuid,
    pub likes: ReactionSet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_edited: bool,
}

/// A comment with no `parent_comment_id` is top-level; otherwise it is a
/// reply to the referenced top-level comment (one level of nesting).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForumComment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub parent_comment_id: Option<Uuid>,
    pub content: String,
    pub author_id: Uuid,
    pub likes: ReactionSet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_edited: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    /// Recipient.
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit record written before (or atomically with) a delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionLog {
    pub id: Uuid,
    pub table_name: String,
    pub record_id: Uuid,
    pub deleted_by: Uuid,
    pub deleted_by_name: String,
    /// Full snapshot of the deleted record.
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_meeting: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantResponse {
    Pending,
    Accepted,
    Declined,
}

impl ParticipantResponse {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantResponse::Pending => "pending",
            ParticipantResponse::Accepted => "accepted",
            ParticipantResponse::Declined => "declined",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ParticipantResponse::Pending),
            "accepted" => Some(ParticipantResponse::Accepted),
            "declined" => Some(ParticipantResponse::Declined),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventParticipant {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub response: ParticipantResponse,
}
