//! Engagement controller: the per-session state machine.
//!
//! A session moves `NEW -> ENGAGING` when a message classifies as a scam and
//! `ENGAGING -> FINALIZED` when the completion predicate holds. `FINALIZED`
//! is terminal. All handling for one session runs under a per-session lock,
//! so the monotonic-flag and finalize-once invariants hold under concurrent
//! requests.

use crate::gate::ScamGate;
use crate::locks::SessionLocks;
use decoy_core::config::DecoyConfig;
use decoy_core::error::Result;
use decoy_core::intel::IntelExtractor;
use decoy_core::report::{CaseReporter, FinalResult};
use decoy_core::retrieval::ContextRetriever;
use decoy_core::session::{
    ConversationMessage, MessageSender, SessionStore, engagement_duration_seconds,
};
use decoy_interaction::{NotesWriter, ReplyEngager, ScamDetector, TextModel};
use std::sync::Arc;
use tokio::sync::Semaphore;

// Fallback texts differ by failure mode so an operator can tell from the
// transcript which path produced them. They must never be empty.
const REPLY_FALLBACK_EMPTY: &str =
    "Please share your official helpline number and payment details again.";
const REPLY_FALLBACK_TIMEOUT: &str =
    "I am checking this. Please share official number and where to verify.";
const REPLY_FALLBACK_FAILURE: &str =
    "Please share your official helpline number and where to verify this.";
const NOTES_FALLBACK: &str = "Scammer used social-engineering and payment redirection tactics.";
const STILL_WORKING_REPLY: &str = "I am working on it.";
const FINALIZING_REPLY: &str = "I am working on it. Please wait...!";

/// What the transport layer needs to build a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngagementOutcome {
    /// Reply text for the counterparty ("" when the session is not flagged).
    pub reply: String,
    /// Session-level scam flag after this message.
    pub scam_detected: bool,
    /// Whether this request observed the engagement as complete.
    pub engagement_complete: bool,
}

/// Orchestrates classification, reply generation, intelligence extraction,
/// completion scoring and finalization for inbound messages.
///
/// All collaborators are injected so tests can substitute fakes: the store,
/// the text model, the reporter and the retriever are trait objects.
pub struct EngagementService {
    store: Arc<dyn SessionStore>,
    gate: ScamGate,
    engager: ReplyEngager,
    notes: NotesWriter,
    reporter: Arc<dyn CaseReporter>,
    retriever: Arc<dyn ContextRetriever>,
    extractor: IntelExtractor,
    config: DecoyConfig,
    permits: Arc<Semaphore>,
    locks: SessionLocks,
}

impl EngagementService {
    /// Wires the engine from its collaborators and configuration.
    ///
    /// `model` is shared by the classifier, the reply engager and the notes
    /// writer; every invocation draws a permit from one pool sized by
    /// `config.external_workers` so total outstanding external calls stay
    /// bounded regardless of request concurrency.
    pub fn new(
        store: Arc<dyn SessionStore>,
        model: Arc<dyn TextModel>,
        reporter: Arc<dyn CaseReporter>,
        retriever: Arc<dyn ContextRetriever>,
        config: DecoyConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.external_workers));
        Self {
            gate: ScamGate::new(
                config.scam_hints.clone(),
                ScamDetector::new(model.clone()),
                config.detect_timeout,
                permits.clone(),
            ),
            engager: ReplyEngager::new(model.clone()),
            notes: NotesWriter::new(model),
            extractor: IntelExtractor::new(config.suspicious_keywords.clone()),
            store,
            reporter,
            retriever,
            config,
            permits,
            locks: SessionLocks::default(),
        }
    }

    /// Handles one inbound message for `session_id`.
    ///
    /// Storage failures are the only errors surfaced; every external
    /// capability failure is absorbed into a deterministic fallback.
    pub async fn handle_message(&self, session_id: &str, message: &str) -> Result<EngagementOutcome> {
        let _guard = self.locks.acquire(session_id).await;

        // Finalization is terminal: no history mutation, no external calls.
        if self.store.is_finalized(session_id).await? {
            tracing::debug!("[EngagementService] Session {session_id} already finalized");
            return Ok(EngagementOutcome {
                reply: STILL_WORKING_REPLY.to_string(),
                scam_detected: true,
                engagement_complete: true,
            });
        }

        self.store
            .append_message(
                session_id,
                ConversationMessage::now(MessageSender::Scammer, message),
            )
            .await?;

        if !self.store.scam_detected(session_id).await? && self.gate.evaluate(message).await {
            self.store.mark_scam_detected(session_id).await?;
            tracing::info!("[EngagementService] Session {session_id} flagged as scam");
        }

        if !self.store.scam_detected(session_id).await? {
            return Ok(EngagementOutcome {
                reply: String::new(),
                scam_detected: false,
                engagement_complete: false,
            });
        }

        let history = self.store.history(session_id).await?;
        let context = if self.config.use_retrieval {
            self.retriever.retrieve(&history, message).await
        } else {
            String::new()
        };

        let reply = self.generate_reply(&history, &context).await;
        self.store
            .append_message(
                session_id,
                ConversationMessage::now(MessageSender::Agent, reply.clone()),
            )
            .await?;

        let history = self.store.history(session_id).await?;
        let intel = self.extractor.extract(&history);
        let score = intel.intel_score();
        let turns = self.store.message_count(session_id).await?;

        // The score threshold rewards fast extraction of high-value
        // evidence; the turn-count fallback guarantees termination against
        // a counterparty who never discloses financial details.
        let complete = intel.has_hard_evidence()
            && (score >= self.config.min_intel_score || turns >= self.config.fallback_min_turns);

        if !complete {
            return Ok(EngagementOutcome {
                reply,
                scam_detected: true,
                engagement_complete: false,
            });
        }

        let agent_notes = self.generate_notes(&history).await;
        let result = FinalResult {
            session_id: session_id.to_string(),
            scam_detected: true,
            total_messages_exchanged: turns,
            engagement_duration_seconds: engagement_duration_seconds(&history),
            extracted_intelligence: intel,
            agent_notes,
        };

        if self.store.try_finalize(session_id, result.clone()).await? {
            tracing::info!(
                "[EngagementService] Session {session_id} finalized (score {score}, {turns} messages)"
            );
            // Fire-and-forget: delivery latency must not block the response,
            // and delivery failure does not unwind finalization.
            let reporter = self.reporter.clone();
            tokio::spawn(async move {
                if let Err(e) = reporter.deliver(&result).await {
                    tracing::warn!("[EngagementService] Final result delivery failed: {e}");
                }
            });
            return Ok(EngagementOutcome {
                reply: FINALIZING_REPLY.to_string(),
                scam_detected: true,
                engagement_complete: true,
            });
        }

        Ok(EngagementOutcome {
            reply,
            scam_detected: true,
            engagement_complete: false,
        })
    }

    async fn generate_reply(&self, history: &[ConversationMessage], context: &str) -> String {
        let call = async {
            match self.permits.clone().acquire_owned().await {
                Ok(_permit) => self.engager.reply(history, context).await,
                Err(_) => Ok(String::new()),
            }
        };

        match tokio::time::timeout(self.config.reply_timeout, call).await {
            Ok(Ok(reply)) if !reply.trim().is_empty() => reply.trim().to_string(),
            Ok(Ok(_)) => REPLY_FALLBACK_EMPTY.to_string(),
            Ok(Err(err)) => {
                tracing::warn!("[EngagementService] Reply generation failed: {err}");
                REPLY_FALLBACK_FAILURE.to_string()
            }
            Err(_) => {
                tracing::warn!(
                    "[EngagementService] Reply generation exceeded {:?}",
                    self.config.reply_timeout
                );
                REPLY_FALLBACK_TIMEOUT.to_string()
            }
        }
    }

    async fn generate_notes(&self, history: &[ConversationMessage]) -> String {
        let call = async {
            match self.permits.clone().acquire_owned().await {
                Ok(_permit) => self.notes.write(history).await,
                Err(_) => Ok(String::new()),
            }
        };

        match tokio::time::timeout(self.config.notes_timeout, call).await {
            Ok(Ok(notes)) if !notes.trim().is_empty() => notes.trim().to_string(),
            _ => NOTES_FALLBACK.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use decoy_core::retrieval::NoRetrieval;
    use decoy_infrastructure::InMemorySessionStore;
    use decoy_interaction::AgentError;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    const NEGATIVE_VERDICT: &str =
        r#"{"scamDetected": false, "confidence": 0.9, "reason": "normal chat"}"#;

    /// Scripted model: answers are routed by the prompt kind the service
    /// built (classification, reply, notes). `None` simulates a transport
    /// failure for that kind.
    struct ScriptedModel {
        delay: Duration,
        detect: Option<String>,
        reply: Option<String>,
        notes: Option<String>,
        calls: StdMutex<Vec<&'static str>>,
        prompts: StdMutex<Vec<String>>,
    }

    impl Default for ScriptedModel {
        fn default() -> Self {
            Self {
                delay: Duration::ZERO,
                detect: Some(NEGATIVE_VERDICT.to_string()),
                reply: Some("Oh no. Which account number should I use again?".to_string()),
                notes: Some("Impersonation scam applying OTP pressure.".to_string()),
                calls: StdMutex::new(Vec::new()),
                prompts: StdMutex::new(Vec::new()),
            }
        }
    }

    impl ScriptedModel {
        fn calls_of(&self, kind: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|k| **k == kind).count()
        }
    }

    #[async_trait]
    impl TextModel for ScriptedModel {
        async fn generate(&self, prompt: &str) -> std::result::Result<String, AgentError> {
            let (kind, scripted) = if prompt.contains("scam detection classifier") {
                ("detect", &self.detect)
            } else if prompt.contains("posing as") {
                ("reply", &self.reply)
            } else {
                ("notes", &self.notes)
            };
            self.calls.lock().unwrap().push(kind);
            self.prompts.lock().unwrap().push(prompt.to_string());

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            scripted
                .clone()
                .ok_or_else(|| AgentError::Request("connection refused".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingReporter {
        delivered: StdMutex<Vec<FinalResult>>,
    }

    #[async_trait]
    impl CaseReporter for RecordingReporter {
        async fn deliver(&self, result: &FinalResult) -> Result<()> {
            self.delivered.lock().unwrap().push(result.clone());
            Ok(())
        }
    }

    struct Harness {
        service: Arc<EngagementService>,
        store: Arc<InMemorySessionStore>,
        reporter: Arc<RecordingReporter>,
        model: Arc<ScriptedModel>,
    }

    fn harness(model: ScriptedModel, config: DecoyConfig) -> Harness {
        harness_with_retriever(model, config, Arc::new(NoRetrieval))
    }

    fn harness_with_retriever(
        model: ScriptedModel,
        config: DecoyConfig,
        retriever: Arc<dyn ContextRetriever>,
    ) -> Harness {
        let store = Arc::new(InMemorySessionStore::new());
        let reporter = Arc::new(RecordingReporter::default());
        let model = Arc::new(model);
        let service = Arc::new(EngagementService::new(
            store.clone(),
            model.clone(),
            reporter.clone(),
            retriever,
            config,
        ));
        Harness {
            service,
            store,
            reporter,
            model,
        }
    }

    async fn deliveries(h: &Harness) -> usize {
        // the reporter runs on a spawned task; give it a moment to land
        for _ in 0..50 {
            let n = h.reporter.delivered.lock().unwrap().len();
            if n > 0 {
                return n;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        h.reporter.delivered.lock().unwrap().len()
    }

    #[tokio::test]
    async fn obvious_scam_takes_the_fast_path() {
        let h = harness(ScriptedModel::default(), DecoyConfig::default());
        let outcome = h
            .service
            .handle_message(
                "s1",
                "Your account is blocked, share OTP to verify, pay to account number 123456789012 or UPI id scammer@upi",
            )
            .await
            .unwrap();

        assert!(outcome.scam_detected);
        assert!(!outcome.engagement_complete);
        // keyword hit: the external classifier is never invoked
        assert_eq!(h.model.calls_of("detect"), 0);
        assert_eq!(h.model.calls_of("reply"), 1);

        let session = h.store.find_by_id("s1").await.unwrap().unwrap();
        assert!(session.scam_detected);
        assert_eq!(session.message_count(), 2);
        assert_eq!(session.messages[1].sender, MessageSender::Agent);
    }

    #[tokio::test]
    async fn benign_message_is_not_engaged() {
        let h = harness(ScriptedModel::default(), DecoyConfig::default());
        let outcome = h
            .service
            .handle_message("s1", "see you at the restaurant tomorrow")
            .await
            .unwrap();

        assert!(!outcome.scam_detected);
        assert_eq!(outcome.reply, "");
        assert_eq!(h.model.calls_of("detect"), 1);
        assert_eq!(h.model.calls_of("reply"), 0);
        // only the inbound message is stored
        assert_eq!(h.store.message_count("s1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn scam_flag_is_monotonic_across_messages() {
        let h = harness(ScriptedModel::default(), DecoyConfig::default());
        let first = h
            .service
            .handle_message("s1", "share your OTP right away")
            .await
            .unwrap();
        assert!(first.scam_detected);

        // the classifier would answer "not a scam" for this one, but the
        // session-level flag never resets
        let second = h
            .service
            .handle_message("s1", "see you at the restaurant tomorrow")
            .await
            .unwrap();
        assert!(second.scam_detected);
        assert!(!second.reply.is_empty());
    }

    #[tokio::test]
    async fn low_confidence_verdict_does_not_flag() {
        let model = ScriptedModel {
            detect: Some(
                r#"{"scamDetected": true, "confidence": 0.4, "reason": "vague"}"#.to_string(),
            ),
            ..Default::default()
        };
        let h = harness(model, DecoyConfig::default());
        let outcome = h
            .service
            .handle_message("s1", "hello friend how are you")
            .await
            .unwrap();
        assert!(!outcome.scam_detected);
    }

    #[tokio::test]
    async fn classifier_timeout_degrades_to_not_scam() {
        let model = ScriptedModel {
            delay: Duration::from_millis(200),
            detect: Some(
                r#"{"scamDetected": true, "confidence": 0.95, "reason": "late"}"#.to_string(),
            ),
            ..Default::default()
        };
        let config = DecoyConfig {
            detect_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let h = harness(model, config);

        let outcome = h
            .service
            .handle_message("s1", "hello friend how are you")
            .await
            .unwrap();
        assert!(!outcome.scam_detected);
    }

    #[tokio::test]
    async fn reply_timeout_substitutes_the_timeout_fallback() {
        let model = ScriptedModel {
            delay: Duration::from_millis(200),
            ..Default::default()
        };
        let config = DecoyConfig {
            reply_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let h = harness(model, config);

        let outcome = h
            .service
            .handle_message("s1", "your upi payment failed")
            .await
            .unwrap();
        assert_eq!(outcome.reply, REPLY_FALLBACK_TIMEOUT);

        let history = h.store.history("s1").await.unwrap();
        assert_eq!(history[1].text, REPLY_FALLBACK_TIMEOUT);
    }

    #[tokio::test]
    async fn reply_failure_substitutes_the_failure_fallback() {
        let model = ScriptedModel {
            reply: None,
            ..Default::default()
        };
        let h = harness(model, DecoyConfig::default());

        let outcome = h
            .service
            .handle_message("s1", "your upi payment failed")
            .await
            .unwrap();
        assert_eq!(outcome.reply, REPLY_FALLBACK_FAILURE);
    }

    #[tokio::test]
    async fn blank_reply_substitutes_the_empty_fallback() {
        let model = ScriptedModel {
            reply: Some("   \n".to_string()),
            ..Default::default()
        };
        let h = harness(model, DecoyConfig::default());

        let outcome = h
            .service
            .handle_message("s1", "your upi payment failed")
            .await
            .unwrap();
        assert_eq!(outcome.reply, REPLY_FALLBACK_EMPTY);
    }

    #[tokio::test]
    async fn score_below_threshold_does_not_complete() {
        let h = harness(ScriptedModel::default(), DecoyConfig::default());
        // 1 account (3) + 1 upi (3) + 1 link (3) + 2 phones (4) = 13 < 14
        let outcome = h
            .service
            .handle_message(
                "s1",
                "pay to account number 123456789012 or scammer@upi via http://evil.test/pay, call 9876543210 or 9123456789",
            )
            .await
            .unwrap();

        assert!(outcome.scam_detected);
        assert!(!outcome.engagement_complete);
        assert!(h.reporter.delivered.lock().unwrap().is_empty());
        assert!(!h.store.is_finalized("s1").await.unwrap());
    }

    #[tokio::test]
    async fn score_at_threshold_finalizes_and_reports_once() {
        let h = harness(ScriptedModel::default(), DecoyConfig::default());
        // 2 accounts (6) + 1 upi (3) + 1 link (3) + 1 phone (2) = 14
        let outcome = h
            .service
            .handle_message(
                "s1",
                "use account number 123456789012 or account 554433221100, UPI scammer@upi, link http://evil.test, call 9876543210",
            )
            .await
            .unwrap();

        assert!(outcome.engagement_complete);
        assert_eq!(outcome.reply, FINALIZING_REPLY);
        assert_eq!(deliveries(&h).await, 1);

        let session = h.store.find_by_id("s1").await.unwrap().unwrap();
        assert!(session.finalized);
        let result = session.final_result.unwrap();
        assert!(result.scam_detected);
        assert_eq!(result.total_messages_exchanged, 2);
        assert_eq!(
            result.extracted_intelligence.bank_accounts,
            vec!["123456789012", "554433221100"]
        );
        assert_eq!(result.agent_notes, "Impersonation scam applying OTP pressure.");
    }

    #[tokio::test]
    async fn turn_count_fallback_completes_low_score_sessions() {
        let h = harness(ScriptedModel::default(), DecoyConfig::default());
        // seed 15 prior turns so this request reaches the fallback at 17
        for i in 0..15 {
            h.store
                .append_message(
                    "s1",
                    ConversationMessage::now(MessageSender::Scammer, format!("filler {i}")),
                )
                .await
                .unwrap();
        }

        let outcome = h
            .service
            .handle_message("s1", "fine, use account number 123456789012")
            .await
            .unwrap();

        // score is only 3, but 17 accumulated messages trip the fallback
        assert!(outcome.engagement_complete);
        assert_eq!(deliveries(&h).await, 1);
        let result = h
            .store
            .find_by_id("s1")
            .await
            .unwrap()
            .unwrap()
            .final_result
            .unwrap();
        assert_eq!(result.total_messages_exchanged, 17);
    }

    #[tokio::test]
    async fn keywords_alone_never_complete_a_session() {
        let h = harness(ScriptedModel::default(), DecoyConfig::default());
        for i in 0..20 {
            h.store
                .append_message(
                    "s1",
                    ConversationMessage::now(MessageSender::Scammer, format!("urgent kyc {i}")),
                )
                .await
                .unwrap();
        }

        let outcome = h
            .service
            .handle_message("s1", "urgent: verify your kyc immediately")
            .await
            .unwrap();

        // plenty of turns, but no hard evidence
        assert!(outcome.scam_detected);
        assert!(!outcome.engagement_complete);
        assert!(!h.store.is_finalized("s1").await.unwrap());
    }

    #[tokio::test]
    async fn finalized_sessions_short_circuit() {
        let h = harness(ScriptedModel::default(), DecoyConfig::default());
        h.service
            .handle_message(
                "s1",
                "use account number 123456789012 or account 554433221100, UPI scammer@upi, link http://evil.test, call 9876543210",
            )
            .await
            .unwrap();
        assert!(h.store.is_finalized("s1").await.unwrap());

        let count_before = h.store.message_count("s1").await.unwrap();
        let reply_calls_before = h.model.calls_of("reply");

        let outcome = h
            .service
            .handle_message("s1", "hello? are you sending the money?")
            .await
            .unwrap();

        assert_eq!(outcome.reply, STILL_WORKING_REPLY);
        assert!(outcome.engagement_complete);
        // terminal state: no history growth, no model traffic
        assert_eq!(h.store.message_count("s1").await.unwrap(), count_before);
        assert_eq!(h.model.calls_of("reply"), reply_calls_before);
    }

    #[tokio::test]
    async fn concurrent_completion_reports_exactly_once() {
        let h = harness(ScriptedModel::default(), DecoyConfig::default());
        let finalizing = "use account number 123456789012 or account 554433221100, UPI scammer@upi, link http://evil.test, call 9876543210";

        let mut handles = Vec::new();
        for _ in 0..4 {
            let service = h.service.clone();
            handles.push(tokio::spawn(async move {
                service.handle_message("s1", finalizing).await.unwrap()
            }));
        }

        let mut completed = 0;
        for handle in handles {
            if handle.await.unwrap().engagement_complete {
                completed += 1;
            }
        }
        // every request observes completion (finalizer or short-circuit)...
        assert_eq!(completed, 4);

        // ...but exactly one delivery happened
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(h.reporter.delivered.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn retrieval_context_reaches_the_reply_prompt() {
        struct StaticRetriever;

        #[async_trait]
        impl ContextRetriever for StaticRetriever {
            async fn retrieve(
                &self,
                _history: &[ConversationMessage],
                _latest_message: &str,
            ) -> String {
                "[Context 1] advance-fee playbook".to_string()
            }
        }

        let config = DecoyConfig {
            use_retrieval: true,
            ..Default::default()
        };
        let h = harness_with_retriever(ScriptedModel::default(), config, Arc::new(StaticRetriever));

        h.service
            .handle_message("s1", "your upi payment failed")
            .await
            .unwrap();

        let prompts = h.model.prompts.lock().unwrap();
        assert!(
            prompts
                .iter()
                .any(|p| p.contains("posing as") && p.contains("advance-fee playbook"))
        );
    }

    #[tokio::test]
    async fn notes_failure_uses_the_generic_note() {
        let model = ScriptedModel {
            notes: None,
            ..Default::default()
        };
        let h = harness(model, DecoyConfig::default());
        h.service
            .handle_message(
                "s1",
                "use account number 123456789012 or account 554433221100, UPI scammer@upi, link http://evil.test, call 9876543210",
            )
            .await
            .unwrap();

        let result = h
            .store
            .find_by_id("s1")
            .await
            .unwrap()
            .unwrap()
            .final_result
            .unwrap();
        assert_eq!(result.agent_notes, NOTES_FALLBACK);
    }
}
