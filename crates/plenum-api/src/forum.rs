use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::error;
use uuid::Uuid;

use plenum_types::api::{
    Claims, CommentThreadView, CommentView, ConfirmQuery, CreateCommentRequest, CreatePostRequest,
    PostQuery, PostSort, PostView, ReactRequest, ReactResponse, UpdateCommentRequest,
    UpdatePostRequest,
};
use plenum_types::events::{GatewayEvent, ReactionTarget};
use plenum_types::models::{ForumComment, ForumPost, Profile};
use plenum_types::notify::forum as kinds;
use plenum_types::reactions::{ReactionOutcome, ReactionSet};
use plenum_types::roles::Role;
use plenum_types::threading::thread_comments;

use crate::auth::AppState;
use crate::fanout::Notifier;

fn internal<E: std::fmt::Display>(e: E) -> StatusCode {
    error!("forum operation failed: {}", e);
    StatusCode::INTERNAL_SERVER_ERROR
}

/// "First Last", or the email when no name is set.
fn profile_label(profile: &Profile) -> String {
    let name = profile.full_name();
    if name.is_empty() {
        profile.email.clone()
    } else {
        name
    }
}

fn post_view(post: ForumPost, author_name: String, comment_count: usize) -> PostView {
    PostView {
        id: post.id,
        title: post.title,
        content: post.content,
        author_id: post.author_id,
        author_name,
        like_count: post.likes.count(true),
        dislike_count: post.likes.count(false),
        comment_count,
        likes: post.likes,
        created_at: post.created_at,
        updated_at: post.updated_at,
        is_edited: post.is_edited,
    }
}

fn comment_view(comment: ForumComment, author_name: String) -> CommentView {
    CommentView {
        id: comment.id,
        post_id: comment.post_id,
        parent_comment_id: comment.parent_comment_id,
        content: comment.content,
        author_id: comment.author_id,
        author_name,
        like_count: comment.likes.count(true),
        dislike_count: comment.likes.count(false),
        likes: comment.likes,
        created_at: comment.created_at,
        updated_at: comment.updated_at,
        is_edited: comment.is_edited,
    }
}

// -- Posts --

pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PostQuery>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    // Run blocking DB reads off the async runtime
    let db = state.clone();
    let (posts, counts, profiles) = tokio::task::spawn_blocking(move || {
        let posts = db.db.list_posts()?;
        let counts = db.db.comment_counts()?;
        let profiles = db.db.list_profiles()?;
        Ok::<_, anyhow::Error>((posts, counts, profiles))
    })
    .await
    .map_err(internal)?
    .map_err(internal)?;

    let names: HashMap<Uuid, String> = profiles
        .iter()
        .map(|p| (p.id, profile_label(p)))
        .collect();

    let mut views: Vec<PostView> = posts
        .into_iter()
        .map(|post| {
            let author_name = names
                .get(&post.author_id)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string());
            let count = counts.get(&post.id).copied().unwrap_or(0);
            post_view(post, author_name, count)
        })
        .collect();

    // "recent" is the fetch order (created_at descending); "popular" is
    // likes minus dislikes, recomputed per request, ties broken by recency.
    if query.sort == PostSort::Popular {
        views.sort_by_key(|v| -v.likes.score());
    }

    Ok(Json(views))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let title = req.title.trim().to_string();
    let content = req.content.trim().to_string();
    if title.is_empty() || content.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let now = Utc::now();
    let post = ForumPost {
        id: Uuid::new_v4(),
        title,
        content,
        author_id: claims.sub,
        likes: ReactionSet::new(),
        created_at: now,
        updated_at: now,
        is_edited: false,
    };

    let db = state.clone();
    let record = post.clone();
    tokio::task::spawn_blocking(move || db.db.insert_post(&record))
        .await
        .map_err(internal)?
        .map_err(internal)?;

    state
        .dispatcher
        .broadcast(GatewayEvent::PostCreated { post: post.clone() });

    // Fan out to the whole committee off the request path; a failed
    // notification never unwinds the created post.
    let notifier = Notifier::new(state);
    let actor = claims.sub;
    let actor_name = claims.name.clone();
    let title_for_fanout = post.title.clone();
    tokio::spawn(async move {
        let name = notifier.display_name(&actor_name, actor).await;
        notifier
            .broadcast_to_non_viewers(
                &[actor],
                kinds::POST_CREATED,
                format!("{} created a new post: {}", name, title_for_fanout),
                Some("/forum".to_string()),
            )
            .await;
    });

    Ok((
        StatusCode::CREATED,
        Json(post_view(post, claims.name, 0)),
    ))
}

pub async fn update_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let title = req.title.trim().to_string();
    let content = req.content.trim().to_string();
    if title.is_empty() || content.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let mut post = state
        .db
        .get_post(post_id)
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;
    if post.author_id != claims.sub {
        return Err(StatusCode::FORBIDDEN);
    }

    let now = Utc::now();
    state
        .db
        .update_post_content(post_id, &title, &content, now)
        .map_err(internal)?;

    post.title = title;
    post.content = content;
    post.updated_at = now;
    post.is_edited = true;

    let comment_count = state.db.count_comments(post_id).map_err(internal)?;

    state
        .dispatcher
        .broadcast(GatewayEvent::PostUpdated { post: post.clone() });

    let notifier = Notifier::new(state);
    let actor = claims.sub;
    let actor_name = claims.name.clone();
    let title_for_fanout = post.title.clone();
    tokio::spawn(async move {
        let name = notifier.display_name(&actor_name, actor).await;
        notifier
            .broadcast_to_roles(
                crate::fanout::STAFF_ROLES,
                actor,
                kinds::POST_EDITED,
                format!("{} edited a post: {}", name, title_for_fanout),
                Some("/forum".to_string()),
            )
            .await;
    });

    Ok(Json(post_view(post, claims.name, comment_count)))
}

/// Destructive and irreversible: the client must assert the user
/// confirmed (`?confirm=true`). The audit snapshot and the delete commit
/// together; comments cascade.
pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Query(query): Query<ConfirmQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    if !query.confirm {
        return Err(StatusCode::BAD_REQUEST);
    }

    let post = state
        .db
        .get_post(post_id)
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;
    if post.author_id != claims.sub {
        return Err(StatusCode::FORBIDDEN);
    }

    let deleted = state
        .db
        .delete_post_logged(post_id, claims.sub, &claims.name, Utc::now())
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;

    state
        .dispatcher
        .broadcast(GatewayEvent::PostDeleted { id: post_id });

    let notifier = Notifier::new(state);
    let actor = claims.sub;
    let actor_name = claims.name.clone();
    tokio::spawn(async move {
        let name = notifier.display_name(&actor_name, actor).await;
        notifier
            .broadcast_to_roles(
                &[Role::Admin, Role::Superadmin],
                actor,
                kinds::POST_DELETED,
                format!("{} deleted forum post: {}", name, deleted.title),
                Some("/forum".to_string()),
            )
            .await;
    });

    Ok(StatusCode::NO_CONTENT)
}

// -- Comments --

pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.clone();
    let (post, comments, profiles) = tokio::task::spawn_blocking(move || {
        let post = db.db.get_post(post_id)?;
        let comments = db.db.list_comments(post_id)?;
        let profiles = db.db.list_profiles()?;
        Ok::<_, anyhow::Error>((post, comments, profiles))
    })
    .await
    .map_err(internal)?
    .map_err(internal)?;

    if post.is_none() {
        return Err(StatusCode::NOT_FOUND);
    }

    let names: HashMap<Uuid, String> = profiles
        .iter()
        .map(|p| (p.id, profile_label(p)))
        .collect();
    let label = |author_id: Uuid| {
        names
            .get(&author_id)
            .cloned()
            .unwrap_or_else(|| "Unknown".to_string())
    };

    let threads: Vec<CommentThreadView> = thread_comments(comments)
        .into_iter()
        .map(|thread| CommentThreadView {
            parent: comment_view(thread.parent.clone(), label(thread.parent.author_id)),
            replies: thread
                .replies
                .into_iter()
                .map(|reply| {
                    let name = label(reply.author_id);
                    comment_view(reply, name)
                })
                .collect(),
        })
        .collect();

    Ok(Json(threads))
}

pub async fn create_comment(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let post = state
        .db
        .get_post(post_id)
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;

    // The comment being replied to, if any. Its author gets the reply
    // notification even when the stored parent is re-pointed below.
    let reply_target = match req.parent_comment_id {
        Some(parent_id) => {
            let parent = state
                .db
                .get_comment(parent_id)
                .map_err(internal)?
                .ok_or(StatusCode::BAD_REQUEST)?;
            if parent.post_id != post_id {
                return Err(StatusCode::BAD_REQUEST);
            }
            Some(parent)
        }
        None => None,
    };

    // One level of nesting: a reply to a reply attaches to the top-level
    // ancestor, so storage always matches the two-level display.
    let stored_parent = reply_target
        .as_ref()
        .map(|parent| parent.parent_comment_id.unwrap_or(parent.id));

    let now = Utc::now();
    let comment = ForumComment {
        id: Uuid::new_v4(),
        post_id,
        parent_comment_id: stored_parent,
        content,
        author_id: claims.sub,
        likes: ReactionSet::new(),
        created_at: now,
        updated_at: now,
        is_edited: false,
    };

    state.db.insert_comment(&comment).map_err(internal)?;

    state.dispatcher.broadcast(GatewayEvent::CommentCreated {
        comment: comment.clone(),
    });

    let notifier = Notifier::new(state);
    let actor = claims.sub;
    let actor_name = claims.name.clone();
    let reply_author = reply_target.as_ref().map(|c| c.author_id);
    let post_author = post.author_id;
    let post_title = post.title.clone();
    tokio::spawn(async move {
        fan_out_comment(
            &notifier,
            actor,
            &actor_name,
            post_author,
            &post_title,
            reply_author,
        )
        .await;
    });

    Ok((
        StatusCode::CREATED,
        Json(comment_view(comment, claims.name)),
    ))
}

/// The three comment audiences, most specific first: the replied-to
/// comment's author, the post's author, then the whole committee. Self
/// notifications and duplicates are skipped, and the broadcast excludes
/// everyone already covered.
async fn fan_out_comment(
    notifier: &Notifier,
    actor: Uuid,
    actor_name: &str,
    post_author: Uuid,
    post_title: &str,
    reply_author: Option<Uuid>,
) {
    let name = notifier.display_name(actor_name, actor).await;

    if let Some(parent_author) = reply_author {
        notifier
            .notify_user(
                parent_author,
                actor,
                kinds::COMMENT_REPLY,
                format!("{} replied to your comment", name),
                Some("/forum".to_string()),
            )
            .await;
    }

    // The post's author, unless they were just notified as the parent
    // author.
    if reply_author != Some(post_author) {
        notifier
            .notify_user(
                post_author,
                actor,
                kinds::COMMENT_CREATED,
                format!("{} commented on your post: {}", name, post_title),
                Some("/forum".to_string()),
            )
            .await;
    }

    let mut excludes = vec![actor, post_author];
    if let Some(parent_author) = reply_author {
        excludes.push(parent_author);
    }
    let (kind, content) = if reply_author.is_some() {
        (
            kinds::COMMENT_REPLY_CREATED,
            format!("{} replied to a comment on a post: {}", name, post_title),
        )
    } else {
        (
            kinds::COMMENT_CREATED,
            format!("{} commented on a post: {}", name, post_title),
        )
    };
    notifier
        .broadcast_to_non_viewers(&excludes, kind, content, Some("/forum".to_string()))
        .await;
}

pub async fn update_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateCommentRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let mut comment = state
        .db
        .get_comment(comment_id)
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;
    if comment.author_id != claims.sub {
        return Err(StatusCode::FORBIDDEN);
    }

    let now = Utc::now();
    state
        .db
        .update_comment_content(comment_id, &content, now)
        .map_err(internal)?;

    comment.content = content;
    comment.updated_at = now;
    comment.is_edited = true;

    state.dispatcher.broadcast(GatewayEvent::CommentUpdated {
        comment: comment.clone(),
    });

    Ok(Json(comment_view(comment, claims.name)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let comment = state
        .db
        .get_comment(comment_id)
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;
    if comment.author_id != claims.sub {
        return Err(StatusCode::FORBIDDEN);
    }

    state
        .db
        .delete_comment_logged(comment_id, claims.sub, &claims.name, Utc::now())
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;

    state.dispatcher.broadcast(GatewayEvent::CommentDeleted {
        id: comment_id,
        post_id: comment.post_id,
    });

    Ok(StatusCode::NO_CONTENT)
}

// -- Reactions --

pub async fn react_to_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReactRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let (outcome, post) = state
        .db
        .react_to_post(post_id, claims.sub, req.is_like, &claims.name)
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;

    state.dispatcher.broadcast(GatewayEvent::ReactionUpdated {
        target: ReactionTarget::Post,
        id: post_id,
        likes: post.likes.clone(),
    });

    // Only net-new reactions notify; un-reacting stays silent, and
    // notify_user drops self-reactions.
    if outcome != ReactionOutcome::Removed {
        let notifier = Notifier::new(state);
        let actor = claims.sub;
        let actor_name = claims.name.clone();
        let author = post.author_id;
        let title = post.title.clone();
        let is_like = req.is_like;
        tokio::spawn(async move {
            let name = notifier.display_name(&actor_name, actor).await;
            let (kind, verb) = if is_like {
                (kinds::POST_LIKED, "liked")
            } else {
                (kinds::POST_DISLIKED, "disliked")
            };
            notifier
                .notify_user(
                    author,
                    actor,
                    kind,
                    format!("{} {} your post: {}", name, verb, title),
                    Some("/forum".to_string()),
                )
                .await;
        });
    }

    Ok(Json(ReactResponse {
        outcome,
        likes: post.likes,
    }))
}

pub async fn react_to_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReactRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let (outcome, comment) = state
        .db
        .react_to_comment(comment_id, claims.sub, req.is_like, &claims.name)
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;

    state.dispatcher.broadcast(GatewayEvent::ReactionUpdated {
        target: ReactionTarget::Comment,
        id: comment_id,
        likes: comment.likes.clone(),
    });

    if outcome != ReactionOutcome::Removed {
        let notifier = Notifier::new(state);
        let actor = claims.sub;
        let actor_name = claims.name.clone();
        let author = comment.author_id;
        let is_like = req.is_like;
        tokio::spawn(async move {
            let name = notifier.display_name(&actor_name, actor).await;
            let (kind, verb) = if is_like {
                (kinds::COMMENT_LIKED, "liked")
            } else {
                (kinds::COMMENT_DISLIKED, "disliked")
            };
            notifier
                .notify_user(
                    author,
                    actor,
                    kind,
                    format!("{} {} your comment", name, verb),
                    Some("/forum".to_string()),
                )
                .await;
        });
    }

    Ok(Json(ReactResponse {
        outcome,
        likes: comment.likes,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use plenum_db::Database;
    use plenum_gateway::dispatcher::Dispatcher;
    use plenum_types::models::Notification;

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
            .list_notifications(user, Utc::now() - Duration::hours(24))
            .expect("list notifications")
    }

    #[tokio::test]
    async fn top_level_comment_notifies_author_once_and_committee_rest() {
        let state = state();
        let actor = seed(&state, 1, "Ana", Role::Special);
        let author = seed(&state, 2, "Ben", Role::Special);
        let other = seed(&state, 3, "Cy", Role::Special);

        let notifier = Notifier::new(state.clone());
        fan_out_comment(&notifier, actor, "Ana Member", author, "Launch plan", None).await;

        let for_author = visible(&state, author);
        assert_eq!(for_author.len(), 1);
        assert_eq!(for_author[0].kind, "comment_created");
        assert_eq!(
            for_author[0].content,
            "Ana Member commented on your post: Launch plan"
        );

        let for_other = visible(&state, other);
        assert_eq!(for_other.len(), 1);
        assert_eq!(
            for_other[0].content,
            "Ana Member commented on a post: Launch plan"
        );

        assert!(visible(&state, actor).is_empty());
    }

    #[tokio::test]
    async fn reply_to_the_post_author_does_not_double_notify() {
        let state = state();
        let actor = seed(&state, 1, "Ana", Role::Special);
        // Ben authored the post AND the comment being replied to.
        let ben = seed(&state, 2, "Ben", Role::Special);
        let other = seed(&state, 3, "Cy", Role::Special);

        let notifier = Notifier::new(state.clone());
        fan_out_comment(&notifier, actor, "Ana Member", ben, "Launch plan", Some(ben)).await;

        let for_ben = visible(&state, ben);
        assert_eq!(for_ben.len(), 1);
        assert_eq!(for_ben[0].kind, "comment_reply");

        let for_other = visible(&state, other);
        assert_eq!(for_other.len(), 1);
        assert_eq!(for_other[0].kind, "comment_reply_created");
    }

    #[tokio::test]
    async fn replying_to_your_own_comment_still_notifies_the_post_author() {
        let state = state();
        let actor = seed(&state, 1, "Ana", Role::Special);
        let post_author = seed(&state, 2, "Ben", Role::Special);

        let notifier = Notifier::new(state.clone());
        // Ana replies to her own comment on Ben's post.
        fan_out_comment(
            &notifier,
            actor,
            "Ana Member",
            post_author,
            "Launch plan",
            Some(actor),
        )
        .await;

        assert!(visible(&state, actor).is_empty());
        let for_ben = visible(&state, post_author);
        assert_eq!(for_ben.len(), 1);
        assert_eq!(for_ben[0].kind, "comment_created");
    }

    #[tokio::test]
    async fn viewers_never_receive_committee_broadcasts() {
        let state = state();
        let actor = seed(&state, 1, "Ana", Role::Special);
        let author = seed(&state, 2, "Ben", Role::Special);
        let viewer = seed(&state, 3, "Cy", Role::Viewer);

        let notifier = Notifier::new(state.clone());
        fan_out_comment(&notifier, actor, "Ana Member", author, "Launch plan", None).await;

        assert!(visible(&state, viewer).is_empty());
    }
}
