pub mod client;
pub mod error;
pub mod model;

pub use client::MessengerApi;
pub use error::MessengerError;
pub use model::{
    AttachOutcome, AvatarUpload, Message, Profile, ProfilePatch, Thread, ThreadState, User,
};
