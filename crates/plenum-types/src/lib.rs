pub mod api;
pub mod events;
pub mod models;
pub mod notify;
pub mod reactions;
pub mod roles;
pub mod schedule;
pub mod threading;
