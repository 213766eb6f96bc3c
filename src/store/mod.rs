//! Persistence seams.
//!
//! `EventStore` mediates reads and writes of events and enrollments;
//! `IdentityProvider` resolves usernames to user records owned by the
//! identity subsystem. Both are injected into the service as trait objects.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Event, EventId, EventParticipation, EventSummary, NewEvent, User, UserId};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::{PgEventStore, PgIdentityProvider};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique or composite-key constraint rejected the write.
    #[error("record already exists")]
    Duplicate,

    /// A foreign-key constraint rejected the write.
    #[error("referenced record does not exist")]
    MissingReference,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn insert_event(&self, event: NewEvent) -> StoreResult<Event>;

    async fn find_event(&self, event_id: EventId) -> StoreResult<Option<Event>>;

    async fn find_event_summary(&self, event_id: EventId) -> StoreResult<Option<EventSummary>>;

    /// All events with their participants, ordered by id.
    async fn list_event_summaries(&self) -> StoreResult<Vec<EventSummary>>;

    /// Usernames enrolled in the event, alphabetically.
    async fn participant_usernames(&self, event_id: EventId) -> StoreResult<Vec<String>>;

    async fn participation_exists(&self, event_id: EventId, user_id: &UserId) -> StoreResult<bool>;

    /// Fails with `Duplicate` when the pair is already enrolled and with
    /// `MissingReference` when either side does not exist.
    async fn insert_participation(&self, participation: &EventParticipation) -> StoreResult<()>;

    /// Returns false when no such enrollment existed.
    async fn delete_participation(&self, event_id: EventId, user_id: &UserId) -> StoreResult<bool>;

    /// Deletes the event and all of its enrollments atomically. Returns false
    /// when the event did not exist.
    async fn delete_event(&self, event_id: EventId) -> StoreResult<bool>;
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
}
