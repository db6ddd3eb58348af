pub mod agenda;
pub mod event;
pub mod recurrence;

pub use agenda::{DayGroup, group_by_day};
pub use event::Event;
pub use recurrence::{Frequency, RecurrenceRule, Termination, Weekday};
