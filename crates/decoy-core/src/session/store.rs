//! Session store trait.
//!
//! Defines the interface for session persistence operations.

use super::message::ConversationMessage;
use super::model::Session;
use crate::error::Result;
use crate::report::FinalResult;
use async_trait::async_trait;

/// An abstract store for session state.
///
/// This trait defines the contract the engagement engine relies on for
/// durability of messages and flags, decoupling the decision logic from the
/// specific storage mechanism (in-memory map, database, remote API).
///
/// # Implementation Notes
///
/// Implementations must uphold the session invariants:
/// - messages are append-only and keep insertion order
/// - `scam_detected` and `finalized` are monotonic (never cleared)
/// - `try_finalize` is an atomic check-and-set: under concurrent callers,
///   exactly one succeeds for a given session
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Finds a session by its id.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Session))`: session found
    /// - `Ok(None)`: no session recorded under this id
    /// - `Err(_)`: storage failure
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>>;

    /// Appends a message to the session, creating the session if this is the
    /// first message for an unseen id.
    async fn append_message(&self, session_id: &str, message: ConversationMessage) -> Result<()>;

    /// Returns the full ordered message history (empty for unseen ids).
    async fn history(&self, session_id: &str) -> Result<Vec<ConversationMessage>>;

    /// Returns the total number of messages exchanged (0 for unseen ids).
    async fn message_count(&self, session_id: &str) -> Result<usize>;

    /// Whether the session has been flagged as a scam.
    async fn scam_detected(&self, session_id: &str) -> Result<bool>;

    /// Flags the session as a scam. Idempotent; the flag is never cleared.
    async fn mark_scam_detected(&self, session_id: &str) -> Result<()>;

    /// Whether the session has reached the terminal finalized state.
    async fn is_finalized(&self, session_id: &str) -> Result<bool>;

    /// Atomically finalizes the session, recording `result`.
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: this call performed the finalization
    /// - `Ok(false)`: the session was already finalized; `result` discarded
    /// - `Err(_)`: unknown session or storage failure
    async fn try_finalize(&self, session_id: &str, result: FinalResult) -> Result<bool>;
}
