//! Agent-notes generation for the final report.

use crate::agent::{AgentError, TextModel};
use crate::engager::render_history;
use decoy_core::session::ConversationMessage;
use std::sync::Arc;

/// Writes the short free-text summary attached to a final result.
pub struct NotesWriter {
    model: Arc<dyn TextModel>,
}

impl NotesWriter {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }

    /// Summarizes the scammer's tactics across the conversation.
    pub async fn write(&self, history: &[ConversationMessage]) -> Result<String, AgentError> {
        let prompt = format!(
            "Summarize the scammer's tactics in the conversation below for a fraud\n\
             analyst. Two sentences at most: name the scheme type and the pressure\n\
             techniques used. Plain text only.\n\n\
             Conversation:\n{}",
            render_history(history)
        );
        self.model.generate(&prompt).await
    }
}
