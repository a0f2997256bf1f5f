//! Session domain types.
//!
//! A session is one ongoing exchange with a single counterparty, keyed by
//! an opaque externally-supplied identifier. The modules here hold the pure
//! domain model and the persistence contract the engagement engine relies on.

pub mod message;
pub mod model;
pub mod store;

pub use message::{ConversationMessage, MessageSender, engagement_duration_seconds};
pub use model::Session;
pub use store::SessionStore;
