use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Entity families the fan-out service understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Task,
    Meeting,
    Budget,
    Risk,
    Repository,
    Contact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityAction {
    Created,
    Updated,
    /// Tasks only.
    Completed,
    Deleted,
}

/// Forum-specific notification type tags.
pub mod forum {
    pub const POST_CREATED: &str = "post_created";
    pub const POST_EDITED: &str = "post_edited";
    pub const POST_DELETED: &str = "forum_post_deleted";
    pub const POST_LIKED: &str = "post_liked";
    pub const POST_DISLIKED: &str = "post_disliked";
    pub const COMMENT_CREATED: &str = "comment_created";
    pub const COMMENT_REPLY: &str = "comment_reply";
    pub const COMMENT_REPLY_CREATED: &str = "comment_reply_created";
    pub const COMMENT_LIKED: &str = "comment_liked";
    pub const COMMENT_DISLIKED: &str = "comment_disliked";
}

/// A domain event headed for the fan-out service, before recipient
/// resolution. Rendering is pure so templates stay testable.
#[derive(Debug, Clone)]
pub struct EntityEvent {
    pub kind: EntityKind,
    pub action: EntityAction,
    pub id: Uuid,
    pub title: String,
}

impl EntityEvent {
    /// The stored `type` tag, e.g. `task_created`. None for combinations
    /// that do not exist (completed is a task-only action).
    pub fn type_tag(&self) -> Option<String> {
        if self.action == EntityAction::Completed && self.kind != EntityKind::Task {
            return None;
        }
        let action = match self.action {
            EntityAction::Created => "created",
            EntityAction::Updated => "updated",
            EntityAction::Completed => "completed",
            EntityAction::Deleted => "deleted",
        };
        Some(format!("{}_{}", kind_str(self.kind), action))
    }

    /// The rendered notification line, embedding the actor's display name.
    pub fn content(&self, actor_name: &str) -> Option<String> {
        let verb = match (self.kind, self.action) {
            (EntityKind::Task, EntityAction::Created) => "created a new task",
            (EntityKind::Task, EntityAction::Updated) => "updated task",
            (EntityKind::Task, EntityAction::Completed) => "marked task as complete",
            (EntityKind::Task, EntityAction::Deleted) => "deleted task",
            (EntityKind::Meeting, EntityAction::Created) => "scheduled a new meeting",
            (EntityKind::Meeting, EntityAction::Updated) => "updated meeting",
            (EntityKind::Meeting, EntityAction::Deleted) => "cancelled meeting",
            (EntityKind::Budget, EntityAction::Created) => "added a new budget record",
            (EntityKind::Budget, EntityAction::Updated) => "updated budget record",
            (EntityKind::Budget, EntityAction::Deleted) => "deleted budget record",
            (EntityKind::Risk, EntityAction::Created) => "added a new risk",
            (EntityKind::Risk, EntityAction::Updated) => "updated risk",
            (EntityKind::Risk, EntityAction::Deleted) => "deleted risk",
            (EntityKind::Repository, EntityAction::Created) => "added a new document repository",
            (EntityKind::Repository, EntityAction::Updated) => "updated document repository",
            (EntityKind::Repository, EntityAction::Deleted) => "deleted document repository",
            (EntityKind::Contact, EntityAction::Created) => "added a new contact",
            (EntityKind::Contact, EntityAction::Updated) => "updated contact",
            (EntityKind::Contact, EntityAction::Deleted) => "deleted contact",
            (_, EntityAction::Completed) => return None,
        };
        Some(format!("{} {}: {}", actor_name, verb, self.title))
    }

    /// Where the notification should take the reader. Deleted records link
    /// to the bare page; repositories and contacts always do.
    pub fn link(&self) -> String {
        match self.kind {
            EntityKind::Task => self.record_link("/tasks", "task"),
            EntityKind::Meeting => self.record_link("/calendar", "event"),
            EntityKind::Budget => self.record_link("/budget", "record"),
            EntityKind::Risk => self.record_link("/risks", "risk"),
            EntityKind::Repository => "/document-repository".to_string(),
            EntityKind::Contact => "/contacts".to_string(),
        }
    }

    fn record_link(&self, page: &str, param: &str) -> String {
        if self.action == EntityAction::Deleted {
            page.to_string()
        } else {
            format!("{}?{}={}", page, param, self.id)
        }
    }
}

fn kind_str(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Task => "task",
        EntityKind::Meeting => "meeting",
        EntityKind::Budget => "budget",
        EntityKind::Risk => "risk",
        EntityKind::Repository => "repository",
        EntityKind::Contact => "contact",
    }
}

/// A supplied actor name that is absent or looks like a raw email address
/// should be replaced by the profile's full name.
pub fn needs_name_lookup(name: &str) -> bool {
    name.trim().is_empty() || name.contains('@')
}

/// Fallback display name when no profile name can be resolved.
pub const ANONYMOUS_ACTOR: &str = "A user";

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: EntityKind, action: EntityAction) -> EntityEvent {
        EntityEvent {
            kind,
            action,
            id: Uuid::from_u128(5),
            title: "Q3 review".to_string(),
        }
    }

    #[test]
    fn tags_are_kind_underscore_action() {
        assert_eq!(
            event(EntityKind::Task, EntityAction::Created).type_tag(),
            Some("task_created".to_string())
        );
        assert_eq!(
            event(EntityKind::Meeting, EntityAction::Deleted).type_tag(),
            Some("meeting_deleted".to_string())
        );
        assert_eq!(
            event(EntityKind::Task, EntityAction::Completed).type_tag(),
            Some("task_completed".to_string())
        );
    }

    #[test]
    fn completed_is_task_only() {
        assert_eq!(event(EntityKind::Budget, EntityAction::Completed).type_tag(), None);
        assert_eq!(
            event(EntityKind::Risk, EntityAction::Completed).content("Ana"),
            None
        );
    }

    #[test]
    fn content_embeds_actor_and_title() {
        assert_eq!(
            event(EntityKind::Meeting, EntityAction::Created)
                .content("Ana Pretorius")
                .unwrap(),
            "Ana Pretorius scheduled a new meeting: Q3 review"
        );
        assert_eq!(
            event(EntityKind::Budget, EntityAction::Deleted)
                .content("Ben")
                .unwrap(),
            "Ben deleted budget record: Q3 review"
        );
    }

    #[test]
    fn links_drop_the_record_param_on_delete() {
        let id = Uuid::from_u128(5);
        assert_eq!(
            event(EntityKind::Task, EntityAction::Updated).link(),
            format!("/tasks?task={id}")
        );
        assert_eq!(event(EntityKind::Task, EntityAction::Deleted).link(), "/tasks");
        assert_eq!(
            event(EntityKind::Contact, EntityAction::Created).link(),
            "/contacts"
        );
    }

    #[test]
    fn email_like_names_need_lookup() {
        assert!(needs_name_lookup(""));
        assert!(needs_name_lookup("  "));
        assert!(needs_name_lookup("ana@example.org"));
        assert!(!needs_name_lookup("Ana Pretorius"));
    }
}
