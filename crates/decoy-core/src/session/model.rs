//! Session domain model.

use super::message::ConversationMessage;
use crate::report::FinalResult;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Represents one engagement with a single counterparty.
///
/// A session is created implicitly on the first message for an unseen id and
/// is never explicitly destroyed by the engine (retention is an external
/// concern). Two flags drive the state machine and both are monotonic:
///
/// - `scam_detected`: once set, no later classifier verdict can clear it.
/// - `finalized`: terminal; a finalized session accepts no further
///   engagement mutation and `final_result` is immutable once set.
///
/// The message sequence is append-only and never reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque externally-supplied session identifier.
    pub id: String,
    /// Ordered conversation history (insertion order is significant).
    pub messages: Vec<ConversationMessage>,
    /// Whether any processed message classified the session as a scam.
    pub scam_detected: bool,
    /// Whether the engagement has been compiled and reported.
    pub finalized: bool,
    /// The reported payload, set exactly once at finalization.
    pub final_result: Option<FinalResult>,
    /// Timestamp when the session was created (RFC 3339 format).
    pub created_at: String,
    /// Timestamp when the session was last updated (RFC 3339 format).
    pub updated_at: String,
}

impl Session {
    /// Creates an empty session for a newly-seen identifier.
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: id.into(),
            messages: Vec::new(),
            scam_detected: false,
            finalized: false,
            final_result: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Total messages exchanged so far.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}
