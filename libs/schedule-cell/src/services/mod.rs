pub mod catalog;
pub mod generator;

pub use catalog::SlotCatalog;
pub use generator::SlotGenerator;
