use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;

use crate::auth::RequireAdmin;
use crate::models::{CreateEventRequest, EventId};
use crate::routes::AppState;
use crate::utils::error::AppResult;
use crate::utils::response::{event_created, message, success};

type EventPath = Result<Path<EventId>, PathRejection>;

pub async fn create_event(
    State(state): State<AppState>,
    payload: Result<Json<CreateEventRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(request) = payload?;
    let event = state.events.create_event(request.validate()?).await?;

    Ok(event_created(event.id, "Event created successfully"))
}

pub async fn list_events(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> AppResult<Response> {
    let events = state.events.list_events().await?;
    Ok(success(events))
}

pub async fn get_event(State(state): State<AppState>, path: EventPath) -> AppResult<Response> {
    let Path(event_id) = path?;
    let event = state.events.get_event(event_id).await?;
    Ok(success(event))
}

pub async fn list_participants(
    State(state): State<AppState>,
    path: EventPath,
) -> AppResult<Response> {
    let Path(event_id) = path?;
    let participants = state.events.list_participants(event_id).await?;
    Ok(success(participants))
}

/// Body is the username as a bare JSON string.
pub async fn enroll(
    State(state): State<AppState>,
    path: EventPath,
    payload: Result<Json<String>, JsonRejection>,
) -> AppResult<Response> {
    let Path(event_id) = path?;
    let Json(username) = payload?;
    state.events.enroll(event_id, &username).await?;

    Ok(message("User enrolled in event successfully"))
}

pub async fn withdraw(
    State(state): State<AppState>,
    path: EventPath,
    payload: Result<Json<String>, JsonRejection>,
) -> AppResult<Response> {
    let Path(event_id) = path?;
    let Json(username) = payload?;
    state.events.withdraw(event_id, &username).await?;

    Ok(message("User withdrawn from event successfully"))
}

pub async fn delete_event(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    path: EventPath,
) -> AppResult<Response> {
    let Path(event_id) = path?;
    state.events.delete_event(event_id).await?;

    Ok(message("Event deleted successfully"))
}
