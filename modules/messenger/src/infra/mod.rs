pub mod assets;
pub mod events;
pub mod storage;
