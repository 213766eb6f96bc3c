use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use crate::config::{apply_security_headers, create_cors_layer, Config};
use crate::handlers::{events, health_check};
use crate::service::EventService;
use crate::store::{PgEventStore, PgIdentityProvider};

#[derive(Clone)]
pub struct AppState {
    pub events: EventService,
}

impl AppState {
    pub fn new(events: EventService) -> Self {
        Self { events }
    }

    /// Wires the service to the Postgres-backed store and identity lookup.
    pub fn from_pool(pool: PgPool) -> Self {
        let store = Arc::new(PgEventStore::new(pool.clone()));
        let identity = Arc::new(PgIdentityProvider::new(pool));
        Self::new(EventService::new(store, identity))
    }
}

pub fn create_routes(state: AppState, config: &Config) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/events", get(events::list_events).post(events::create_event))
        .route(
            "/events/:id",
            get(events::get_event).delete(events::delete_event),
        )
        .route("/events/:id/participants", get(events::list_participants))
        .route("/events/:id/enroll", post(events::enroll))
        .route("/events/:id/withdraw", post(events::withdraw))
        .with_state(state);

    apply_security_headers(router, config.production)
        .layer(create_cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
}
