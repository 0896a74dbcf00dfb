pub mod schedule;

pub use schedule::{build_schedule, EmiSchedule};
