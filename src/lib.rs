pub mod calendar;
pub mod remote;
pub mod storage;

pub use calendar::{DayGroup, Event, RecurrenceRule, group_by_day};
pub use remote::{Scheduler, SchedulerError};
