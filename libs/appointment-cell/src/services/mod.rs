pub mod booking;
pub mod lifecycle;
pub mod prescription;
pub mod reclaimer;

pub use booking::BookingCoordinator;
pub use lifecycle::AppointmentLifecycleService;
pub use prescription::PrescriptionService;
pub use reclaimer::{ReclaimerHandle, UnpaidReclaimer};
