//! In-memory SessionStore implementation.
//!
//! Sessions live in a process-wide map guarded by an async `RwLock`.
//! Durable storage is out of scope; anything that needs to survive a restart
//! would implement `SessionStore` against a database instead.

use async_trait::async_trait;
use chrono::Utc;
use decoy_core::error::{DecoyError, Result};
use decoy_core::report::FinalResult;
use decoy_core::session::{ConversationMessage, Session, SessionStore};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local session store.
///
/// Sessions are created implicitly on first touch. The write lock makes
/// every mutation atomic, which is what `try_finalize` relies on for its
/// check-and-set guarantee.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` on the session, inserting an empty one for unseen ids.
    async fn with_session_mut<T>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut Session) -> T,
    ) -> T {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(session_id));
        f(session)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned())
    }

    async fn append_message(&self, session_id: &str, message: ConversationMessage) -> Result<()> {
        self.with_session_mut(session_id, |session| {
            session.updated_at = message.timestamp.clone();
            session.messages.push(message);
        })
        .await;
        Ok(())
    }

    async fn history(&self, session_id: &str) -> Result<Vec<ConversationMessage>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(session_id)
            .map(|s| s.messages.clone())
            .unwrap_or_default())
    }

    async fn message_count(&self, session_id: &str) -> Result<usize> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).map_or(0, Session::message_count))
    }

    async fn scam_detected(&self, session_id: &str) -> Result<bool> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).is_some_and(|s| s.scam_detected))
    }

    async fn mark_scam_detected(&self, session_id: &str) -> Result<()> {
        self.with_session_mut(session_id, |session| {
            session.scam_detected = true;
        })
        .await;
        Ok(())
    }

    async fn is_finalized(&self, session_id: &str) -> Result<bool> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).is_some_and(|s| s.finalized))
    }

    async fn try_finalize(&self, session_id: &str, result: FinalResult) -> Result<bool> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| DecoyError::not_found("session", session_id))?;

        if session.finalized {
            return Ok(false);
        }

        session.finalized = true;
        session.final_result = Some(result);
        session.updated_at = Utc::now().to_rfc3339();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use decoy_core::intel::ExtractedIntelligence;
    use decoy_core::session::MessageSender;
    use std::sync::Arc;

    fn result_for(session_id: &str) -> FinalResult {
        FinalResult {
            session_id: session_id.to_string(),
            scam_detected: true,
            total_messages_exchanged: 2,
            engagement_duration_seconds: 0,
            extracted_intelligence: ExtractedIntelligence::default(),
            agent_notes: "notes".to_string(),
        }
    }

    #[tokio::test]
    async fn sessions_are_created_on_first_append() {
        let store = InMemorySessionStore::new();
        assert_eq!(store.message_count("s1").await.unwrap(), 0);
        assert!(store.find_by_id("s1").await.unwrap().is_none());

        store
            .append_message("s1", ConversationMessage::now(MessageSender::Scammer, "hi"))
            .await
            .unwrap();

        let session = store.find_by_id("s1").await.unwrap().unwrap();
        assert_eq!(session.message_count(), 1);
        assert!(!session.scam_detected);
    }

    #[tokio::test]
    async fn history_preserves_insertion_order() {
        let store = InMemorySessionStore::new();
        for text in ["one", "two", "three"] {
            store
                .append_message("s1", ConversationMessage::now(MessageSender::Scammer, text))
                .await
                .unwrap();
        }
        let history = store.history("s1").await.unwrap();
        let texts: Vec<_> = history.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn scam_flag_is_monotonic() {
        let store = InMemorySessionStore::new();
        store.mark_scam_detected("s1").await.unwrap();
        assert!(store.scam_detected("s1").await.unwrap());
        // marking again is a no-op, and there is no API to clear the flag
        store.mark_scam_detected("s1").await.unwrap();
        assert!(store.scam_detected("s1").await.unwrap());
    }

    #[tokio::test]
    async fn try_finalize_succeeds_exactly_once() {
        let store = InMemorySessionStore::new();
        store
            .append_message("s1", ConversationMessage::now(MessageSender::Scammer, "hi"))
            .await
            .unwrap();

        assert!(store.try_finalize("s1", result_for("s1")).await.unwrap());
        assert!(!store.try_finalize("s1", result_for("s1")).await.unwrap());
        assert!(store.is_finalized("s1").await.unwrap());
    }

    #[tokio::test]
    async fn try_finalize_on_unknown_session_is_an_error() {
        let store = InMemorySessionStore::new();
        let err = store
            .try_finalize("ghost", result_for("ghost"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn concurrent_finalization_yields_one_winner() {
        let store = Arc::new(InMemorySessionStore::new());
        store
            .append_message("s1", ConversationMessage::now(MessageSender::Scammer, "hi"))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.try_finalize("s1", result_for("s1")).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
