// Identifiers, identities and input rules shared by the store and client crates.

pub mod constants;
pub mod error;
pub mod identity;
pub mod types;
pub mod validate;

pub use error::ValidationError;
pub use identity::Identity;
pub use types::{ChannelId, MessageId, UserId};
