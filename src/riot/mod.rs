pub mod client;
pub mod flatten;
pub mod types;

pub use client::{PlayerHandle, RiotClient, RiotConfig, RiotError};
pub use flatten::{FieldPresence, ParticipantRow};
pub use types::MatchPayload;
