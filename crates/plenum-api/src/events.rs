use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::error;
use uuid::Uuid;

use plenum_types::api::{Claims, EventUpsertRequest, EventView};
use plenum_types::events::GatewayEvent;
use plenum_types::models::CalendarEvent;
use plenum_types::notify::{EntityAction, EntityEvent, EntityKind};
use plenum_types::schedule::MeetingWindow;

use crate::auth::AppState;
use crate::fanout::Notifier;

fn internal<E: std::fmt::Display>(e: E) -> StatusCode {
    error!("calendar operation failed: {}", e);
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Recombine the form's split date/time fields and validate the range.
fn validated_range(
    req: &EventUpsertRequest,
) -> Result<(chrono::DateTime<Utc>, chrono::DateTime<Utc>), StatusCode> {
    let window = MeetingWindow::from_parts(
        req.start_date,
        &req.start_time,
        req.end_date,
        &req.end_time,
    )
    .ok_or(StatusCode::BAD_REQUEST)?;
    window.combine().map_err(|_| StatusCode::BAD_REQUEST)
}

pub async fn list_events(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.clone();
    let views = tokio::task::spawn_blocking(move || {
        let events = db.db.list_events()?;
        let mut views = Vec::with_capacity(events.len());
        for event in events {
            let participants = db.db.list_participants(event.id)?;
            views.push(EventView {
                event,
                participants,
            });
        }
        Ok::<_, anyhow::Error>(views)
    })
    .await
    .map_err(internal)?
    .map_err(internal)?;

    Ok(Json(views))
}

pub async fn create_event(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<EventUpsertRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let title = req.title.trim().to_string();
    if title.len() < 2 {
        return Err(StatusCode::BAD_REQUEST);
    }
    let (start_time, end_time) = validated_range(&req)?;

    let now = Utc::now();
    let event = CalendarEvent {
        id: Uuid::new_v4(),
        title,
        description: req.description.clone().unwrap_or_default(),
        location: req.location.clone().unwrap_or_default(),
        start_time,
        end_time,
        is_meeting: req.is_meeting,
        created_by: claims.sub,
        created_at: now,
        updated_at: now,
    };

    let db = state.clone();
    let record = event.clone();
    let participants = req.participants.clone();
    let created = tokio::task::spawn_blocking(move || {
        let created = db.db.create_event(&record, now)?;
        // Meetings carry a participant list, replaced wholesale so a
        // reused (double-submitted) event ends up in the same state.
        if created.event.is_meeting {
            db.db.replace_participants(created.event.id, &participants)?;
        }
        Ok::<_, anyhow::Error>(created)
    })
    .await
    .map_err(internal)?
    .map_err(internal)?;

    let event = created.event;
    let participants = state
        .db
        .list_participants(event.id)
        .map_err(internal)?;

    state.dispatcher.broadcast(GatewayEvent::EventUpserted {
        event: event.clone(),
    });

    // A reused duplicate submission already produced its fan-out.
    if !created.reused {
        let notifier = Notifier::new(state);
        let actor = claims.sub;
        let actor_name = claims.name.clone();
        let entity = EntityEvent {
            kind: EntityKind::Meeting,
            action: EntityAction::Created,
            id: event.id,
            title: event.title.clone(),
        };
        tokio::spawn(async move {
            notifier.entity_event(entity, actor, &actor_name).await;
        });
    }

    Ok((
        StatusCode::CREATED,
        Json(EventView {
            event,
            participants,
        }),
    ))
}

pub async fn update_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<EventUpsertRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let title = req.title.trim().to_string();
    if title.len() < 2 {
        return Err(StatusCode::BAD_REQUEST);
    }
    let (start_time, end_time) = validated_range(&req)?;

    let existing = state
        .db
        .get_event(event_id)
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let event = CalendarEvent {
        id: event_id,
        title,
        description: req.description.clone().unwrap_or_default(),
        location: req.location.clone().unwrap_or_default(),
        start_time,
        end_time,
        is_meeting: req.is_meeting,
        created_by: existing.created_by,
        created_at: existing.created_at,
        updated_at: Utc::now(),
    };

    let db = state.clone();
    let record = event.clone();
    let participants = req.participants.clone();
    tokio::task::spawn_blocking(move || {
        db.db.update_event(&record)?;
        if record.is_meeting {
            db.db.replace_participants(record.id, &participants)?;
        }
        Ok::<_, anyhow::Error>(())
    })
    .await
    .map_err(internal)?
    .map_err(internal)?;

    let participants = state
        .db
        .list_participants(event.id)
        .map_err(internal)?;

    state.dispatcher.broadcast(GatewayEvent::EventUpserted {
        event: event.clone(),
    });

    let notifier = Notifier::new(state);
    let actor = claims.sub;
    let actor_name = claims.name.clone();
    let entity = EntityEvent {
        kind: EntityKind::Meeting,
        action: EntityAction::Updated,
        id: event.id,
        title: event.title.clone(),
    };
    tokio::spawn(async move {
        notifier.entity_event(entity, actor, &actor_name).await;
    });

    Ok(Json(EventView {
        event,
        participants,
    }))
}

pub async fn delete_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let deleted = state
        .db
        .delete_event_logged(event_id, claims.sub, &claims.name, Utc::now())
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;

    state
        .dispatcher
        .broadcast(GatewayEvent::EventDeleted { id: event_id });

    let notifier = Notifier::new(state);
    let actor = claims.sub;
    let actor_name = claims.name.clone();
    let entity = EntityEvent {
        kind: EntityKind::Meeting,
        action: EntityAction::Deleted,
        id: deleted.id,
        title: deleted.title,
    };
    tokio::spawn(async move {
        notifier.entity_event(entity, actor, &actor_name).await;
    });

    Ok(StatusCode::NO_CONTENT)
}
