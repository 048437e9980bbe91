use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CalendarEvent, ForumComment, ForumPost, Notification};
use crate::reactions::ReactionSet;

/// Which table a reaction update belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionTarget {
    Post,
    Comment,
}

/// Events sent over the WebSocket gateway. Each mutation publishes the
/// changed row so clients can patch their state incrementally instead of
/// refetching whole tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication.
    Ready { user_id: Uuid, name: String },

    PostCreated { post: ForumPost },
    PostUpdated { post: ForumPost },
    PostDeleted { id: Uuid },

    CommentCreated { comment: ForumComment },
    CommentUpdated { comment: ForumComment },
    CommentDeleted { id: Uuid, post_id: Uuid },

    /// The reaction set of a post or comment changed.
    ReactionUpdated {
        target: ReactionTarget,
        id: Uuid,
        likes: ReactionSet,
    },

    EventUpserted { event: CalendarEvent },
    EventDeleted { id: Uuid },

    /// Delivered only to the recipient's connection, never broadcast.
    NotificationCreated { notification: Notification },
}

/// Commands sent from client to server over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection.
    Identify { token: String },
}
