use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use plenum_api::auth::{self, AppState, AppStateInner};
use plenum_api::middleware::require_auth;
use plenum_api::{audit, events, forum, notifications, users};
use plenum_gateway::connection;
use plenum_gateway::dispatcher::Dispatcher;

#[derive(Clone)]
struct ServerState {
    dispatcher: Dispatcher,
    jwt_secret: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plenum=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("PLENUM_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("PLENUM_DB_PATH").unwrap_or_else(|_| "plenum.db".into());
    let host = std::env::var("PLENUM_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("PLENUM_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = plenum_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let dispatcher = Dispatcher::new();
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: jwt_secret.clone(),
        dispatcher: dispatcher.clone(),
    });

    let ws_state = ServerState {
        dispatcher,
        jwt_secret,
    };

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/me", get(users::me))
        .route("/users", get(users::list_users))
        .route("/forum/posts", get(forum::list_posts))
        .route("/forum/posts", post(forum::create_post))
        .route("/forum/posts/{post_id}", put(forum::update_post))
        .route("/forum/posts/{post_id}", delete(forum::delete_post))
        .route("/forum/posts/{post_id}/comments", get(forum::list_comments))
        .route("/forum/posts/{post_id}/comments", post(forum::create_comment))
        .route("/forum/posts/{post_id}/reactions", post(forum::react_to_post))
        .route("/forum/comments/{comment_id}", put(forum::update_comment))
        .route("/forum/comments/{comment_id}", delete(forum::delete_comment))
        .route(
            "/forum/comments/{comment_id}/reactions",
            post(forum::react_to_comment),
        )
        .route("/events", get(events::list_events))
        .route("/events", post(events::create_event))
        .route("/events/{event_id}", put(events::update_event))
        .route("/events/{event_id}", delete(events::delete_event))
        .route("/notifications", get(notifications::list_notifications))
        .route(
            "/notifications/{notification_id}/read",
            post(notifications::mark_read),
        )
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/deletion-logs", get(audit::list_deletion_logs))
        .layer(middleware::from_fn(require_auth))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(ws_state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Plenum server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(state): State<ServerState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.dispatcher, state.jwt_secret)
    })
}
