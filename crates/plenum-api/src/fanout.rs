//! Notification fan-out: resolves a recipient audience for a domain event
//! and writes one notification row per recipient, pushing each to its
//! recipient's gateway connection.
//!
//! Delivery is best-effort and at-most-once. Every entry point catches,
//! logs, and swallows failures: fan-out must never block or roll back the
//! primary mutation that triggered it, and callers run it off the request
//! path via `tokio::spawn`.

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use plenum_types::events::GatewayEvent;
use plenum_types::models::Notification;
use plenum_types::notify::{ANONYMOUS_ACTOR, EntityEvent, needs_name_lookup};
use plenum_types::roles::Role;

use crate::auth::AppState;

/// Recipients per insert batch for whole-committee broadcasts.
const BATCH_SIZE: usize = 5;

/// Courtesy pause between batches; a rate-limit nicety, not a
/// correctness mechanism.
const BATCH_PAUSE: Duration = Duration::from_millis(300);

/// Every role above viewer; the audience for role-gated broadcasts.
pub const STAFF_ROLES: &[Role] = &[Role::Admin, Role::Special, Role::Superadmin];

#[derive(Clone)]
pub struct Notifier {
    state: AppState,
}

impl Notifier {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// The actor name to embed in rendered content. A missing or
    /// email-shaped name is re-resolved from the profile store.
    pub async fn display_name(&self, supplied: &str, actor: Uuid) -> String {
        if !needs_name_lookup(supplied) {
            return supplied.trim().to_string();
        }
        match self.state.db.full_name(actor) {
            Ok(Some(name)) => name,
            Ok(None) => ANONYMOUS_ACTOR.to_string(),
            Err(e) => {
                warn!("Actor name lookup failed for {}: {}", actor, e);
                ANONYMOUS_ACTOR.to_string()
            }
        }
    }

    /// Exactly one recipient. Skipped entirely when the target is the
    /// actor, so nobody is notified about their own action.
    pub async fn notify_user(
        &self,
        target: Uuid,
        actor: Uuid,
        kind: &str,
        content: String,
        link: Option<String>,
    ) {
        if target == actor {
            return;
        }
        let row = build(target, kind, content, link);
        if let Err(e) = self.deliver(&[row]).await {
            warn!("Notification delivery to {} failed: {:#}", target, e);
        }
    }

    /// One row per user whose role is in `roles`, minus the actor.
    pub async fn broadcast_to_roles(
        &self,
        roles: &[Role],
        exclude: Uuid,
        kind: &str,
        content: String,
        link: Option<String>,
    ) {
        let run = async {
            let audience = self.state.db.profiles_with_roles(roles)?;
            let rows: Vec<Notification> = audience
                .into_iter()
                .filter(|p| p.id != exclude)
                .map(|p| build(p.id, kind, content.clone(), link.clone()))
                .collect();
            self.deliver(&rows).await
        };
        if let Err(e) = run.await {
            warn!("Role broadcast '{}' failed: {:#}", kind, e);
        }
    }

    /// Whole-committee broadcast: every non-viewer minus the exclusion
    /// list, written in batches of five with a short pause between
    /// batches to respect write-rate limits.
    pub async fn broadcast_to_non_viewers(
        &self,
        excludes: &[Uuid],
        kind: &str,
        content: String,
        link: Option<String>,
    ) {
        let run = async {
            let audience = self.state.db.profiles_with_roles(STAFF_ROLES)?;
            let rows: Vec<Notification> = audience
                .into_iter()
                .filter(|p| !excludes.contains(&p.id))
                .map(|p| build(p.id, kind, content.clone(), link.clone()))
                .collect();

            let mut batches = rows.chunks(BATCH_SIZE).peekable();
            while let Some(batch) = batches.next() {
                self.deliver(batch).await?;
                if batches.peek().is_some() {
                    tokio::time::sleep(BATCH_PAUSE).await;
                }
            }
            Ok::<(), anyhow::Error>(())
        };
        if let Err(e) = run.await {
            warn!("Committee broadcast '{}' failed: {:#}", kind, e);
        }
    }

    /// Render and broadcast an entity event (task/meeting/budget/risk/
    /// repository/contact × created/updated/completed/deleted) to the
    /// staff roles, excluding the actor.
    pub async fn entity_event(&self, event: EntityEvent, actor: Uuid, actor_name: &str) {
        let Some(kind) = event.type_tag() else {
            warn!("Dropping invalid entity event {:?}", event);
            return;
        };
        let name = self.display_name(actor_name, actor).await;
        let Some(content) = event.content(&name) else {
            return;
        };
        self.broadcast_to_roles(STAFF_ROLES, actor, &kind, content, Some(event.link()))
            .await;
    }

    /// Insert the rows, then push each to its recipient's connection.
    async fn deliver(&self, rows: &[Notification]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        self.state.db.insert_notifications(rows)?;
        for row in rows {
            self.state
                .dispatcher
                .send_to_user(
                    row.user_id,
                    GatewayEvent::NotificationCreated {
                        notification: row.clone(),
                    },
                )
                .await;
        }
        Ok(())
    }
}

fn build(target: Uuid, kind: &str, content: String, link: Option<String>) -> Notification {
    Notification {
        id: Uuid::new_v4(),
        user_id: target,
        kind: kind.to_string(),
        content,
        link,
        is_read: false,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration as ChronoDuration;
    use plenum_db::Database;
    use plenum_gateway::dispatcher::Dispatcher;
    use plenum_types::notify::{EntityAction, EntityKind, forum};

    use super::*;
    use crate::auth::AppStateInner;

    fn state() -> AppState {
        Arc::new(AppStateInner {
            db: Database::open_in_memory().expect("in-memory db"),
            jwt_secret: "test-secret".to_string(),
            dispatcher: Dispatcher::new(),
        })
    }

    fn seed(state: &AppState, id: u128, name: &str, role: Role) -> Uuid {
        let uid = Uuid::from_u128(id);
        state
            .db
            .create_profile(
                uid,
                &format!("{}@example.org", name.to_lowercase()),
                "hash",
                name,
                "Member",
                role,
                Utc::now(),
            )
            .expect("seed profile");
        uid
    }

    fn visible(state: &AppState, user: Uuid) -> Vec<Notification> {
        state
            .db
            .list_notifications(user, Utc::now() - ChronoDuration::hours(24))
            .expect("list notifications")
    }

    #[tokio::test]
    async fn post_broadcast_reaches_non_viewers_but_never_the_actor() {
        let state = state();
        let ana = seed(&state, 1, "Ana", Role::Special);
        let ben = seed(&state, 2, "Ben", Role::Special);
        let cy = seed(&state, 3, "Cy", Role::Viewer);

        let notifier = Notifier::new(state.clone());
        notifier
            .broadcast_to_non_viewers(
                &[ana],
                forum::POST_CREATED,
                "Ana Member created a new post: Launch plan".to_string(),
                Some("/forum".to_string()),
            )
            .await;

        let for_ben = visible(&state, ben);
        assert_eq!(for_ben.len(), 1);
        assert_eq!(for_ben[0].kind, "post_created");
        assert!(for_ben[0].content.contains("Launch plan"));

        assert!(visible(&state, ana).is_empty());
        assert!(visible(&state, cy).is_empty());
    }

    #[tokio::test]
    async fn batched_broadcast_delivers_to_every_recipient() {
        let state = state();
        let actor = seed(&state, 1, "Ana", Role::Special);
        let others: Vec<Uuid> = (2..=13)
            .map(|i| seed(&state, i, &format!("U{i}"), Role::Special))
            .collect();

        let notifier = Notifier::new(state.clone());
        notifier
            .broadcast_to_non_viewers(
                &[actor],
                forum::COMMENT_CREATED,
                "Ana commented on a post: Launch plan".to_string(),
                Some("/forum".to_string()),
            )
            .await;

        for user in others {
            assert_eq!(visible(&state, user).len(), 1, "user {user} missed out");
        }
    }

    #[tokio::test]
    async fn self_notification_is_skipped_and_others_get_exactly_one() {
        let state = state();
        let ana = seed(&state, 1, "Ana", Role::Special);
        let ben = seed(&state, 2, "Ben", Role::Special);

        let notifier = Notifier::new(state.clone());
        notifier
            .notify_user(
                ana,
                ana,
                forum::COMMENT_LIKED,
                "Ana Member liked your comment".to_string(),
                Some("/forum".to_string()),
            )
            .await;
        assert!(visible(&state, ana).is_empty());

        notifier
            .notify_user(
                ben,
                ana,
                forum::COMMENT_LIKED,
                "Ana Member liked your comment".to_string(),
                Some("/forum".to_string()),
            )
            .await;
        assert_eq!(visible(&state, ben).len(), 1);
    }

    #[tokio::test]
    async fn entity_event_renders_templates_and_excludes_the_actor() {
        let state = state();
        let ana = seed(&state, 1, "Ana", Role::Admin);
        let ben = seed(&state, 2, "Ben", Role::Special);

        let notifier = Notifier::new(state.clone());
        let meeting_id = Uuid::from_u128(50);
        notifier
            .entity_event(
                EntityEvent {
                    kind: EntityKind::Meeting,
                    action: EntityAction::Created,
                    id: meeting_id,
                    title: "Board Sync".to_string(),
                },
                ana,
                // Email-shaped actor names are re-resolved from profiles.
                "ana@example.org",
            )
            .await;

        let for_ben = visible(&state, ben);
        assert_eq!(for_ben.len(), 1);
        assert_eq!(for_ben[0].kind, "meeting_created");
        assert_eq!(
            for_ben[0].content,
            "Ana Member scheduled a new meeting: Board Sync"
        );
        assert_eq!(
            for_ben[0].link.as_deref(),
            Some(format!("/calendar?event={meeting_id}").as_str())
        );
        assert!(visible(&state, ana).is_empty());
    }

    #[tokio::test]
    async fn unknown_actor_falls_back_to_the_anonymous_label() {
        let state = state();
        let notifier = Notifier::new(state.clone());
        let name = notifier.display_name("", Uuid::from_u128(99)).await;
        assert_eq!(name, ANONYMOUS_ACTOR);
    }

    #[tokio::test]
    async fn delivery_pushes_to_the_recipient_gateway_channel() {
        let state = state();
        let ana = seed(&state, 1, "Ana", Role::Special);
        let ben = seed(&state, 2, "Ben", Role::Special);
        let (_, mut rx) = state.dispatcher.register_user_channel(ben).await;

        let notifier = Notifier::new(state.clone());
        notifier
            .notify_user(
                ben,
                ana,
                forum::POST_LIKED,
                "Ana Member liked your post: Launch plan".to_string(),
                Some("/forum".to_string()),
            )
            .await;

        match rx.recv().await {
            Some(GatewayEvent::NotificationCreated { notification }) => {
                assert_eq!(notification.user_id, ben);
                assert_eq!(notification.kind, "post_liked");
            }
            other => panic!("expected NotificationCreated, got {:?}", other),
        }
    }
}
