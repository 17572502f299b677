//! SeaORM entities for the messenger tables.

pub mod message;
pub mod profile;
pub mod thread;
pub mod thread_message;
pub mod thread_participant;
pub mod user;
