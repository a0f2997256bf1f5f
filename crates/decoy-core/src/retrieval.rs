//! Knowledge retrieval contract.

use crate::session::ConversationMessage;
use async_trait::async_trait;

/// Supplies contextual knowledge-base snippets for reply generation.
///
/// Retrieval is an optional collaborator: implementations return an empty
/// string when disabled, unavailable or failing, so the engagement flow is
/// unchanged when nothing useful is retrieved.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    /// Returns retrieved context for the conversation, or "" when none.
    async fn retrieve(&self, history: &[ConversationMessage], latest_message: &str) -> String;
}

/// Retriever used when retrieval is disabled or no backend is configured.
pub struct NoRetrieval;

#[async_trait]
impl ContextRetriever for NoRetrieval {
    async fn retrieve(&self, _history: &[ConversationMessage], _latest_message: &str) -> String {
        String::new()
    }
}
