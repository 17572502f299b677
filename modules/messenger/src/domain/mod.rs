pub mod avatar;
pub mod error;
pub mod events;
pub mod pair;
pub mod ports;
pub mod repo;
pub mod service;
