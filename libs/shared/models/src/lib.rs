pub mod auth;
pub mod error;
pub mod pagination;
pub mod people;
pub mod schedule;
pub mod appointment;
