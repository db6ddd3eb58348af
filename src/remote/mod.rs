pub mod events_api;
pub mod identity;
pub mod service;

pub use events_api::{ApiError, EventDraft, EventsApi, HttpEventsClient};
pub use identity::{IdentityClient, IdentityError, TokenInfo};
pub use service::{Scheduler, SchedulerError};
