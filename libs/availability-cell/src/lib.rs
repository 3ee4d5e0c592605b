pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod time;

pub use models::*;
pub use services::*;
pub use time::{Clock, DateRange, DayOfWeek, FixedClock, LocalTime, SystemClock};
