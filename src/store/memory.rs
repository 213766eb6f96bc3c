//! In-process store holding events, users and enrollments behind one lock.
//!
//! Enforces the same constraints as the Postgres schema: one enrollment per
//! `(event, user)` pair, enrollments only for existing events and users, and
//! cascading removal of enrollments when their event is deleted.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{EventStore, IdentityProvider, StoreError, StoreResult};
use crate::models::{Event, EventId, EventParticipation, EventSummary, NewEvent, User, UserId};

#[derive(Default)]
struct State {
    next_event_id: EventId,
    events: BTreeMap<EventId, Event>,
    users: HashMap<UserId, User>,
    participations: HashSet<EventParticipation>,
}

impl State {
    fn usernames_for(&self, event_id: EventId) -> Vec<String> {
        let mut usernames: Vec<String> = self
            .participations
            .iter()
            .filter(|p| p.event_id == event_id)
            .filter_map(|p| self.users.get(&p.user_id))
            .map(|u| u.username.clone())
            .collect();
        usernames.sort();
        usernames
    }

    fn summary(&self, event: &Event) -> EventSummary {
        EventSummary::new(event.clone(), self.usernames_for(event.id))
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user the way the identity subsystem would. Returns the
    /// existing record if the username is already taken.
    pub async fn add_user(&self, username: &str) -> User {
        let mut state = self.state.write().await;

        if let Some(existing) = state.users.values().find(|u| u.username == username) {
            return existing.clone();
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
        };
        state.users.insert(user.id.clone(), user.clone());
        user
    }

    /// Inserts an event verbatim, bypassing service-level date checks.
    pub async fn insert_event_unchecked(&self, event: NewEvent) -> Event {
        let mut state = self.state.write().await;
        Self::push_event(&mut state, event)
    }

    pub async fn participation_count(&self) -> usize {
        self.state.read().await.participations.len()
    }

    pub async fn event_count(&self) -> usize {
        self.state.read().await.events.len()
    }

    fn push_event(state: &mut State, event: NewEvent) -> Event {
        state.next_event_id += 1;
        let event = Event {
            id: state.next_event_id,
            title: event.title,
            description: event.description,
            date: event.date,
        };
        state.events.insert(event.id, event.clone());
        event
    }
}

#[async_trait]
impl EventStore for InMemoryStore {
    async fn insert_event(&self, event: NewEvent) -> StoreResult<Event> {
        let mut state = self.state.write().await;
        Ok(Self::push_event(&mut state, event))
    }

    async fn find_event(&self, event_id: EventId) -> StoreResult<Option<Event>> {
        Ok(self.state.read().await.events.get(&event_id).cloned())
    }

    async fn find_event_summary(&self, event_id: EventId) -> StoreResult<Option<EventSummary>> {
        let state = self.state.read().await;
        Ok(state.events.get(&event_id).map(|e| state.summary(e)))
    }

    async fn list_event_summaries(&self) -> StoreResult<Vec<EventSummary>> {
        let state = self.state.read().await;
        Ok(state.events.values().map(|e| state.summary(e)).collect())
    }

    async fn participant_usernames(&self, event_id: EventId) -> StoreResult<Vec<String>> {
        Ok(self.state.read().await.usernames_for(event_id))
    }

    async fn participation_exists(&self, event_id: EventId, user_id: &UserId) -> StoreResult<bool> {
        let key = EventParticipation::new(event_id, user_id.clone());
        Ok(self.state.read().await.participations.contains(&key))
    }

    async fn insert_participation(&self, participation: &EventParticipation) -> StoreResult<()> {
        let mut state = self.state.write().await;

        if !state.events.contains_key(&participation.event_id)
            || !state.users.contains_key(&participation.user_id)
        {
            return Err(StoreError::MissingReference);
        }

        if !state.participations.insert(participation.clone()) {
            return Err(StoreError::Duplicate);
        }

        Ok(())
    }

    async fn delete_participation(&self, event_id: EventId, user_id: &UserId) -> StoreResult<bool> {
        let key = EventParticipation::new(event_id, user_id.clone());
        Ok(self.state.write().await.participations.remove(&key))
    }

    async fn delete_event(&self, event_id: EventId) -> StoreResult<bool> {
        let mut state = self.state.write().await;

        if state.events.remove(&event_id).is_none() {
            return Ok(false);
        }

        state.participations.retain(|p| p.event_id != event_id);
        Ok(true)
    }
}

#[async_trait]
impl IdentityProvider for InMemoryStore {
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.username == username).cloned())
    }
}
