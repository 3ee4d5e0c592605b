pub mod availability;
pub mod filters;
pub mod slots;
pub mod store;

pub use availability::AvailabilityService;
pub use filters::{filter_booked, filter_future, ConflictMatch};
pub use slots::{generate_slots, generate_slots_for_date};
pub use store::{
    AvailabilityStore, BookedSlotSource, InMemoryAvailabilityStore, SupabaseAvailabilityStore,
};
