use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use tracing::error;
use uuid::Uuid;

use plenum_types::api::Claims;

use crate::auth::AppState;

/// How long a read notification stays in the list view. Rows are never
/// deleted; they just age out of the response.
const READ_RETENTION: Duration = Duration::hours(24);

fn internal<E: std::fmt::Display>(e: E) -> StatusCode {
    error!("notification operation failed: {}", e);
    StatusCode::INTERNAL_SERVER_ERROR
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let cutoff = Utc::now() - READ_RETENTION;
    let db = state.clone();
    let user_id = claims.sub;
    let notifications =
        tokio::task::spawn_blocking(move || db.db.list_notifications(user_id, cutoff))
            .await
            .map_err(internal)?
            .map_err(internal)?;

    Ok(Json(notifications))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let changed = state
        .db
        .mark_notification_read(notification_id, claims.sub)
        .map_err(internal)?;
    if !changed {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let marked = state
        .db
        .mark_all_notifications_read(claims.sub)
        .map_err(internal)?;
    Ok(Json(serde_json::json!({ "marked": marked })))
}
