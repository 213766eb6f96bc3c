pub mod event;
pub mod participation;
pub mod user;

pub use event::{CreateEventRequest, Event, EventCreated, EventId, EventSummary, NewEvent};
pub use participation::EventParticipation;
pub use user::{User, UserId};
