//! Event registration operations.
//!
//! Each operation is one logical unit against the store. Enrollment checks run
//! in a fixed order: user resolution, event existence, event date, duplicate.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::models::{Event, EventId, EventParticipation, EventSummary, NewEvent, User};
use crate::store::{EventStore, IdentityProvider, StoreError};
use crate::utils::error::{AppError, AppResult};

pub const USER_NOT_FOUND: &str = "user not found";
pub const EVENT_NOT_FOUND: &str = "event not found";
pub const NO_PARTICIPANTS: &str = "no participants for this event or event not found";
pub const EVENT_IN_PAST: &str = "cannot create an event in the past";
pub const EVENT_ALREADY_HAPPENED: &str = "cannot enroll in an event that has already taken place";
pub const ALREADY_ENROLLED: &str = "user is already enrolled in this event";
pub const NOT_ENROLLED: &str = "user is not enrolled in this event";

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Clone)]
pub struct EventService {
    events: Arc<dyn EventStore>,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
}

impl EventService {
    pub fn new(events: Arc<dyn EventStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self::with_clock(events, identity, Arc::new(SystemClock))
    }

    pub fn with_clock(
        events: Arc<dyn EventStore>,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            events,
            identity,
            clock,
        }
    }

    pub async fn create_event(&self, new_event: NewEvent) -> AppResult<Event> {
        let today = self.clock.now().date_naive();
        if new_event.date.date_naive() < today {
            return Err(AppError::ValidationError(EVENT_IN_PAST.to_string()));
        }

        let event = self.events.insert_event(new_event).await?;
        info!(event_id = event.id, title = %event.title, "Event created");
        Ok(event)
    }

    pub async fn get_event(&self, event_id: EventId) -> AppResult<EventSummary> {
        self.events
            .find_event_summary(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(EVENT_NOT_FOUND.to_string()))
    }

    /// Caller must already hold the admin role.
    pub async fn list_events(&self) -> AppResult<Vec<EventSummary>> {
        Ok(self.events.list_event_summaries().await?)
    }

    /// A missing event and an event without participants both yield
    /// `NotFound`.
    pub async fn list_participants(&self, event_id: EventId) -> AppResult<Vec<String>> {
        let usernames = self.events.participant_usernames(event_id).await?;
        if usernames.is_empty() {
            return Err(AppError::NotFound(NO_PARTICIPANTS.to_string()));
        }
        Ok(usernames)
    }

    pub async fn enroll(&self, event_id: EventId, username: &str) -> AppResult<()> {
        let user = self.resolve_user(username).await?;

        let event = self
            .events
            .find_event(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(EVENT_NOT_FOUND.to_string()))?;

        if event.date < self.clock.now() {
            return Err(AppError::ValidationError(EVENT_ALREADY_HAPPENED.to_string()));
        }

        if self.events.participation_exists(event_id, &user.id).await? {
            return Err(AppError::ValidationError(ALREADY_ENROLLED.to_string()));
        }

        let participation = EventParticipation::new(event_id, user.id);
        match self.events.insert_participation(&participation).await {
            Ok(()) => {}
            // Lost a race with a concurrent enrollment for the same pair.
            Err(StoreError::Duplicate) => {
                return Err(AppError::ValidationError(ALREADY_ENROLLED.to_string()));
            }
            // Event deleted between the existence check and the insert.
            Err(StoreError::MissingReference) => {
                return Err(AppError::NotFound(EVENT_NOT_FOUND.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        info!(event_id, username = %user.username, "User enrolled");
        Ok(())
    }

    pub async fn withdraw(&self, event_id: EventId, username: &str) -> AppResult<()> {
        let user = self.resolve_user(username).await?;

        if !self.events.delete_participation(event_id, &user.id).await? {
            return Err(AppError::ValidationError(NOT_ENROLLED.to_string()));
        }

        info!(event_id, username = %user.username, "User withdrawn");
        Ok(())
    }

    /// Caller must already hold the admin role.
    pub async fn delete_event(&self, event_id: EventId) -> AppResult<()> {
        if !self.events.delete_event(event_id).await? {
            return Err(AppError::NotFound(EVENT_NOT_FOUND.to_string()));
        }

        info!(event_id, "Event deleted");
        Ok(())
    }

    async fn resolve_user(&self, username: &str) -> AppResult<User> {
        self.identity
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserId;
    use crate::store::{InMemoryStore, StoreResult};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 6, 15, 12, 0, 0).unwrap()
    }

    fn setup() -> (Arc<InMemoryStore>, EventService) {
        let store = Arc::new(InMemoryStore::new());
        let service = EventService::with_clock(
            store.clone(),
            store.clone(),
            Arc::new(FixedClock(noon())),
        );
        (store, service)
    }

    fn new_event(date: DateTime<Utc>) -> NewEvent {
        NewEvent {
            title: "Launch".to_string(),
            description: "Product launch".to_string(),
            date,
        }
    }

    fn assert_validation(result: AppResult<impl std::fmt::Debug>, expected: &str) {
        match result {
            Err(AppError::ValidationError(msg)) => assert_eq!(msg, expected),
            other => panic!("expected validation error '{}', got {:?}", expected, other),
        }
    }

    fn assert_not_found(result: AppResult<impl std::fmt::Debug>, expected: &str) {
        match result {
            Err(AppError::NotFound(msg)) => assert_eq!(msg, expected),
            other => panic!("expected not found '{}', got {:?}", expected, other),
        }
    }

    #[tokio::test]
    async fn created_event_has_no_participants() {
        let (_, service) = setup();
        let event = service
            .create_event(new_event(noon() + Duration::days(7)))
            .await
            .unwrap();

        let summary = service.get_event(event.id).await.unwrap();
        assert_eq!(summary.title, "Launch");
        assert!(summary.participants.is_empty());
    }

    #[tokio::test]
    async fn earlier_today_is_still_creatable() {
        let (_, service) = setup();
        let this_morning = Utc.with_ymd_and_hms(2030, 6, 15, 1, 0, 0).unwrap();

        assert!(service.create_event(new_event(this_morning)).await.is_ok());
    }

    #[tokio::test]
    async fn yesterday_is_rejected_and_not_persisted() {
        let (store, service) = setup();

        assert_validation(
            service.create_event(new_event(noon() - Duration::days(1))).await,
            EVENT_IN_PAST,
        );
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn get_missing_event_is_not_found() {
        let (_, service) = setup();
        assert_not_found(service.get_event(404).await, EVENT_NOT_FOUND);
    }

    #[tokio::test]
    async fn double_enroll_is_rejected() {
        let (store, service) = setup();
        store.add_user("alice").await;
        let event = service
            .create_event(new_event(noon() + Duration::days(1)))
            .await
            .unwrap();

        service.enroll(event.id, "alice").await.unwrap();
        assert_validation(service.enroll(event.id, "alice").await, ALREADY_ENROLLED);
        assert_eq!(store.participation_count().await, 1);
    }

    #[tokio::test]
    async fn enroll_checks_user_before_event() {
        let (_, service) = setup();
        assert_not_found(service.enroll(1, "nobody").await, USER_NOT_FOUND);
    }

    #[tokio::test]
    async fn enroll_on_missing_event_is_not_found() {
        let (store, service) = setup();
        store.add_user("alice").await;

        assert_not_found(service.enroll(12, "alice").await, EVENT_NOT_FOUND);
    }

    #[tokio::test]
    async fn enroll_in_past_event_is_rejected() {
        let (store, service) = setup();
        store.add_user("alice").await;
        // Same calendar day, but the start time has already passed.
        let event = service
            .create_event(new_event(noon() - Duration::hours(1)))
            .await
            .unwrap();

        assert_validation(
            service.enroll(event.id, "alice").await,
            EVENT_ALREADY_HAPPENED,
        );
    }

    #[tokio::test]
    async fn past_check_precedes_duplicate_check() {
        let (store, service) = setup();
        let alice = store.add_user("alice").await;
        let event = store
            .insert_event_unchecked(new_event(noon() - Duration::days(3)))
            .await;
        store
            .insert_participation(&EventParticipation::new(event.id, alice.id))
            .await
            .unwrap();

        assert_validation(
            service.enroll(event.id, "alice").await,
            EVENT_ALREADY_HAPPENED,
        );
    }

    #[tokio::test]
    async fn enroll_withdraw_round_trip() {
        let (store, service) = setup();
        store.add_user("alice").await;
        store.add_user("bob").await;
        let event = service
            .create_event(new_event(noon() + Duration::days(7)))
            .await
            .unwrap();

        service.enroll(event.id, "alice").await.unwrap();
        service.enroll(event.id, "bob").await.unwrap();
        assert_eq!(
            service.list_participants(event.id).await.unwrap(),
            vec!["alice", "bob"]
        );

        service.withdraw(event.id, "alice").await.unwrap();
        assert_eq!(
            service.list_participants(event.id).await.unwrap(),
            vec!["bob"]
        );
    }

    #[tokio::test]
    async fn empty_and_missing_events_both_have_no_participants() {
        let (_, service) = setup();
        let event = service
            .create_event(new_event(noon() + Duration::days(1)))
            .await
            .unwrap();

        assert_not_found(service.list_participants(event.id).await, NO_PARTICIPANTS);
        assert_not_found(service.list_participants(999).await, NO_PARTICIPANTS);
    }

    #[tokio::test]
    async fn withdraw_requires_enrollment() {
        let (store, service) = setup();
        store.add_user("alice").await;
        let event = service
            .create_event(new_event(noon() + Duration::days(1)))
            .await
            .unwrap();

        assert_not_found(service.withdraw(event.id, "ghost").await, USER_NOT_FOUND);
        assert_validation(service.withdraw(event.id, "alice").await, NOT_ENROLLED);
        assert_validation(service.withdraw(777, "alice").await, NOT_ENROLLED);
    }

    #[tokio::test]
    async fn delete_event_cascades_participants() {
        let (store, service) = setup();
        let event = service
            .create_event(new_event(noon() + Duration::days(2)))
            .await
            .unwrap();
        for name in ["a", "b", "c"] {
            store.add_user(name).await;
            service.enroll(event.id, name).await.unwrap();
        }
        assert_eq!(store.participation_count().await, 3);

        service.delete_event(event.id).await.unwrap();

        assert_eq!(store.participation_count().await, 0);
        assert_not_found(service.get_event(event.id).await, EVENT_NOT_FOUND);
        assert_not_found(service.delete_event(event.id).await, EVENT_NOT_FOUND);
    }

    #[tokio::test]
    async fn list_events_projects_participants() {
        let (store, service) = setup();
        store.add_user("alice").await;
        let first = service
            .create_event(new_event(noon() + Duration::days(1)))
            .await
            .unwrap();
        service
            .create_event(new_event(noon() + Duration::days(2)))
            .await
            .unwrap();
        service.enroll(first.id, "alice").await.unwrap();

        let events = service.list_events().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].participants, vec!["alice"]);
        assert!(events[1].participants.is_empty());
    }

    /// What happens between the pre-flight duplicate check and the insert.
    #[derive(Clone, Copy)]
    enum Interleaving {
        /// Another request enrolled the same pair first.
        ConcurrentEnroll,
        /// An admin deleted the event.
        ConcurrentDelete,
    }

    /// Delegates to the in-memory store but replays a concurrent request
    /// after the service's existence check has passed.
    struct InterleavedStore {
        inner: Arc<InMemoryStore>,
        interleaving: Interleaving,
    }

    #[async_trait]
    impl EventStore for InterleavedStore {
        async fn insert_event(&self, event: NewEvent) -> StoreResult<Event> {
            self.inner.insert_event(event).await
        }

        async fn find_event(&self, event_id: EventId) -> StoreResult<Option<Event>> {
            self.inner.find_event(event_id).await
        }

        async fn find_event_summary(&self, event_id: EventId) -> StoreResult<Option<EventSummary>> {
            self.inner.find_event_summary(event_id).await
        }

        async fn list_event_summaries(&self) -> StoreResult<Vec<EventSummary>> {
            self.inner.list_event_summaries().await
        }

        async fn participant_usernames(&self, event_id: EventId) -> StoreResult<Vec<String>> {
            self.inner.participant_usernames(event_id).await
        }

        async fn participation_exists(&self, _event_id: EventId, _user_id: &UserId) -> StoreResult<bool> {
            Ok(false)
        }

        async fn insert_participation(&self, participation: &EventParticipation) -> StoreResult<()> {
            match self.interleaving {
                Interleaving::ConcurrentEnroll => {
                    // Ignore the outcome; the pair may already be present.
                    let _ = self.inner.insert_participation(participation).await;
                }
                Interleaving::ConcurrentDelete => {
                    self.inner.delete_event(participation.event_id).await?;
                }
            }
            self.inner.insert_participation(participation).await
        }

        async fn delete_participation(&self, event_id: EventId, user_id: &UserId) -> StoreResult<bool> {
            self.inner.delete_participation(event_id, user_id).await
        }

        async fn delete_event(&self, event_id: EventId) -> StoreResult<bool> {
            self.inner.delete_event(event_id).await
        }
    }

    fn interleaved(interleaving: Interleaving) -> (Arc<InMemoryStore>, EventService) {
        let inner = Arc::new(InMemoryStore::new());
        let store = Arc::new(InterleavedStore {
            inner: inner.clone(),
            interleaving,
        });
        let service = EventService::with_clock(store, inner.clone(), Arc::new(FixedClock(noon())));
        (inner, service)
    }

    #[tokio::test]
    async fn duplicate_on_insert_reports_already_enrolled() {
        let (inner, service) = interleaved(Interleaving::ConcurrentEnroll);
        inner.add_user("alice").await;
        let event = service
            .create_event(new_event(noon() + Duration::days(1)))
            .await
            .unwrap();

        assert_validation(service.enroll(event.id, "alice").await, ALREADY_ENROLLED);
        assert_eq!(inner.participation_count().await, 1);
    }

    #[tokio::test]
    async fn missing_reference_on_insert_reports_event_not_found() {
        let (inner, service) = interleaved(Interleaving::ConcurrentDelete);
        inner.add_user("alice").await;
        let event = service
            .create_event(new_event(noon() + Duration::days(1)))
            .await
            .unwrap();

        assert_not_found(service.enroll(event.id, "alice").await, EVENT_NOT_FOUND);
        assert_eq!(inner.participation_count().await, 0);
        assert_eq!(inner.event_count().await, 0);
    }

    #[tokio::test]
    async fn usernames_are_matched_verbatim() {
        let (store, service) = setup();
        store.add_user("alice").await;
        let event = service
            .create_event(new_event(noon() + Duration::days(1)))
            .await
            .unwrap();

        assert_not_found(service.enroll(event.id, "  alice ").await, USER_NOT_FOUND);
        assert_not_found(service.withdraw(event.id, "alice ").await, USER_NOT_FOUND);
        assert_eq!(store.participation_count().await, 0);
    }
}
