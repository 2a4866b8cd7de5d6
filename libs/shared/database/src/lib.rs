pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod state;
pub mod store;

pub use error::StoreError;
pub use memory::InMemoryStore;
pub use postgres::PgStore;
pub use query::{AppointmentQuery, ScheduleQuery, SlotQuery};
pub use state::AppState;
pub use store::{connect, ClinicStore, StoreResult, StoreTransaction};
