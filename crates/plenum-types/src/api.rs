use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CalendarEvent, EventParticipant, Profile};
use crate::reactions::{ReactionOutcome, ReactionSet};
use crate::roles::Role;

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the WebSocket gateway.
/// Canonical definition lives here in plenum-types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    /// Display name, pre-rendered at login.
    pub name: String,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub name: String,
    pub role: Role,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub profile: Profile,
    /// Pages this user's role may view, in sidebar order.
    pub pages: Vec<&'static str>,
}

// -- Forum --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePostRequest {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCommentRequest {
    pub content: String,
    /// Present when replying to an existing comment.
    pub parent_comment_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCommentRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReactRequest {
    pub is_like: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostSort {
    #[default]
    Recent,
    Popular,
}

#[derive(Debug, Default, Deserialize)]
pub struct PostQuery {
    #[serde(default)]
    pub sort: PostSort,
}

/// Required acknowledgement for destructive deletes.
#[derive(Debug, Default, Deserialize)]
pub struct ConfirmQuery {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Serialize)]
pub struct PostView {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author_id: Uuid,
    pub author_name: String,
    pub likes: ReactionSet,
    pub like_count: usize,
    pub dislike_count: usize,
    pub comment_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_edited: bool,
}

#[derive(Debug, Serialize)]
pub struct CommentView {
    pub id: Uuid,
    pub post_id: Uuid,
    pub parent_comment_id: Option<Uuid>,
    pub content: String,
    pub author_id: Uuid,
    pub author_name: String,
    pub likes: ReactionSet,
    pub like_count: usize,
    pub dislike_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_edited: bool,
}

#[derive(Debug, Serialize)]
pub struct CommentThreadView {
    pub parent: CommentView,
    pub replies: Vec<CommentView>,
}

#[derive(Debug, Serialize)]
pub struct ReactResponse {
    pub outcome: ReactionOutcome,
    pub likes: ReactionSet,
}

// -- Calendar --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventUpsertRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub start_date: NaiveDate,
    /// "HH:MM" as the time picker produces.
    pub start_time: String,
    pub end_date: NaiveDate,
    pub end_time: String,
    #[serde(default)]
    pub is_meeting: bool,
    #[serde(default)]
    pub participants: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct EventView {
    #[serde(flatten)]
    pub event: CalendarEvent,
    pub participants: Vec<EventParticipant>,
}
