use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::models::{EventCreated, EventId};

#[derive(Serialize)]
pub struct MessageBody {
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

pub fn success<T>(data: T) -> Response
where
    T: Serialize,
{
    (StatusCode::OK, Json(data)).into_response()
}

pub fn message(message: impl Into<String>) -> Response {
    let body = MessageBody {
        message: message.into(),
    };
    (StatusCode::OK, Json(body)).into_response()
}

/// `201 Created` pointing at the new event.
pub fn event_created(event_id: EventId, message: impl Into<String>) -> Response {
    let body = EventCreated {
        message: message.into(),
        event_id,
    };
    let mut response = (StatusCode::CREATED, Json(body)).into_response();

    if let Ok(location) = HeaderValue::from_str(&format!("/events/{}", event_id)) {
        response.headers_mut().insert(header::LOCATION, location);
    }

    response
}

pub fn error(code: &str, message: impl Into<String>, status: StatusCode) -> Response {
    let body = ApiErrorBody {
        code: code.to_string(),
        message: message.into(),
    };

    (status, Json(body)).into_response()
}
