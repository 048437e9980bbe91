use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;

use plenum_types::api::Claims;

use crate::auth::AppState;

/// The deletion audit trail, newest first. Admin and superadmin only.
pub async fn list_deletion_logs(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    if !claims.role.is_admin() {
        return Err(StatusCode::FORBIDDEN);
    }

    let db = state.clone();
    let logs = tokio::task::spawn_blocking(move || db.db.list_deletion_logs())
        .await
        .map_err(|e| {
            error!("deletion log listing failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("deletion log listing failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(logs))
}
