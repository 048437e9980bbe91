use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use plenum_db::Database;
use plenum_gateway::dispatcher::Dispatcher;
use plenum_types::api::{
    Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
};
use plenum_types::roles::Role;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub dispatcher: Dispatcher,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    // Validate input
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') || email.len() > 254 {
        return Err(StatusCode::BAD_REQUEST);
    }
    if req.password.len() < 8 {
        return Err(StatusCode::BAD_REQUEST);
    }

    // Check if the email is taken
    if state
        .db
        .get_profile_auth(&email)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .is_some()
    {
        return Err(StatusCode::CONFLICT);
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .to_string();

    let user_id = Uuid::new_v4();

    // New accounts start as viewers; an admin promotes them later.
    state
        .db
        .create_profile(
            user_id,
            &email,
            &password_hash,
            req.first_name.trim(),
            req.last_name.trim(),
            Role::Viewer,
            chrono::Utc::now(),
        )
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let name = display_name(req.first_name.trim(), req.last_name.trim(), &email);
    let token = create_token(&state.jwt_secret, user_id, &name, Role::Viewer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let email = req.email.trim().to_lowercase();
    let row = state
        .db
        .get_profile_auth(&email)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // Verify password
    let parsed_hash =
        PasswordHash::new(&row.password).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let profile = row.into_profile();
    let name = display_name(&profile.first_name, &profile.last_name, &profile.email);
    let token = create_token(&state.jwt_secret, profile.id, &name, profile.role)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(LoginResponse {
        user_id: profile.id,
        name,
        role: profile.role,
        token,
    }))
}

/// The name carried in claims and embedded in notification content.
/// Falls back to the email when no profile name is set; the fan-out
/// service re-resolves email-shaped names against the profile store.
fn display_name(first_name: &str, last_name: &str, email: &str) -> String {
    let full = format!("{} {}", first_name, last_name).trim().to_string();
    if full.is_empty() { email.to_string() } else { full }
}

fn create_token(secret: &str, user_id: Uuid, name: &str, role: Role) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        name: name.to_string(),
        role,
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
