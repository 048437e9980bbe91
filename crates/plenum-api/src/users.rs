use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;

use plenum_types::api::{Claims, MeResponse};

use crate::auth::AppState;

fn internal<E: std::fmt::Display>(e: E) -> StatusCode {
    error!("user operation failed: {}", e);
    StatusCode::INTERNAL_SERVER_ERROR
}

/// The caller's profile plus the pages their role may view, for the
/// sidebar and route guards.
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let profile = state
        .db
        .get_profile(claims.sub)
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let pages = profile.role.visible_pages();
    Ok(Json(MeResponse { profile, pages }))
}

/// Directory of all members, for participant pickers and avatars.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.clone();
    let profiles = tokio::task::spawn_blocking(move || db.db.list_profiles())
        .await
        .map_err(internal)?
        .map_err(internal)?;
    Ok(Json(profiles))
}
