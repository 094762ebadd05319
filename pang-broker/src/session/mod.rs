//! Connection lifecycle and chat history state.

pub mod connection;
pub mod expiry;
pub mod history;
pub mod id;
pub mod message;
pub mod store;

pub use connection::{ChatGuard, Connection, ConnectionState};
pub use expiry::{ExpiryHandle, ExpiryScheduler};
pub use history::{ChatHistories, ImportMode};
pub use id::{IdGenerator, UuidGenerator};
pub use message::{ContentPart, ImageUrl, Message, MessageContent, Role};
pub use store::ConnectionStore;
