pub mod booking;
pub mod store;

pub use booking::BookingService;
pub use store::{AppointmentStore, InMemoryAppointmentStore, SupabaseAppointmentStore};
