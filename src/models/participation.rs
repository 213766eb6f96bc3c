use super::event::EventId;
use super::user::UserId;

/// Enrollment of one user in one event, keyed on `(event_id, user_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventParticipation {
    pub event_id: EventId,
    pub user_id: UserId,
}

impl EventParticipation {
    pub fn new(event_id: EventId, user_id: impl Into<UserId>) -> Self {
        Self {
            event_id,
            user_id: user_id.into(),
        }
    }
}
