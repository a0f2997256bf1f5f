//! Conversation message types.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// Represents the originator of a message in an engagement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSender {
    /// Inbound counterparty (the suspected scammer).
    Scammer,
    /// The honeypot's generated reply.
    Agent,
    /// A human operator message.
    User,
}

/// A single message in a conversation history.
///
/// Messages are immutable once appended and their insertion order is
/// significant: recency windows and engagement duration are computed from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// The originator of the message.
    pub sender: MessageSender,
    /// The message text.
    pub text: String,
    /// Timestamp when the message was recorded (RFC 3339 format).
    pub timestamp: String,
}

impl ConversationMessage {
    /// Creates a message stamped with the current time.
    pub fn now(sender: MessageSender, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    /// Parses the stored timestamp, returning `None` for malformed values.
    pub fn parsed_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.timestamp).ok()
    }
}

/// Engagement duration between the earliest and latest parsable message
/// timestamps, in whole seconds, clamped to >= 0.
///
/// Messages with missing or malformed timestamps are skipped; fewer than two
/// parsable timestamps yields 0.
pub fn engagement_duration_seconds(history: &[ConversationMessage]) -> i64 {
    let parsed: Vec<_> = history
        .iter()
        .filter_map(ConversationMessage::parsed_timestamp)
        .collect();

    if parsed.len() < 2 {
        return 0;
    }

    let earliest = parsed.iter().min().copied();
    let latest = parsed.iter().max().copied();
    match (earliest, latest) {
        (Some(a), Some(b)) => (b - a).num_seconds().max(0),
        _ => 0,
    }
}
