//! Scam classifier gate.

use decoy_interaction::ScamDetector;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Decides, per inbound message, whether the session should be flagged.
///
/// Two routes:
/// - fast path: a case-insensitive substring hit against a small set of
///   high-signal hints classifies immediately, with no model call;
/// - slow path: a bounded call to the external classifier, drawn from the
///   shared external-call pool.
///
/// Timeouts and classifier failures degrade to "not a scam" for the message
/// at hand; a later message can still flag the session.
pub struct ScamGate {
    hints: Vec<String>,
    detector: ScamDetector,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl ScamGate {
    pub fn new(
        hints: Vec<String>,
        detector: ScamDetector,
        timeout: Duration,
        permits: Arc<Semaphore>,
    ) -> Self {
        let hints = hints.into_iter().map(|h| h.to_lowercase()).collect();
        Self {
            hints,
            detector,
            timeout,
            permits,
        }
    }

    /// Classifies one message. Never fails and never blocks past the
    /// configured budget.
    pub async fn evaluate(&self, message: &str) -> bool {
        if self.matches_fast_path(message) {
            tracing::debug!("[ScamGate] Fast-path hint matched; skipping model call");
            return true;
        }

        let call = async {
            match self.permits.clone().acquire_owned().await {
                Ok(_permit) => self.detector.detect(message).await.scam_detected,
                // pool closed during shutdown
                Err(_) => false,
            }
        };

        match tokio::time::timeout(self.timeout, call).await {
            Ok(decision) => decision,
            Err(_) => {
                tracing::warn!(
                    "[ScamGate] Classification exceeded {:?}; treating message as clean",
                    self.timeout
                );
                false
            }
        }
    }

    fn matches_fast_path(&self, message: &str) -> bool {
        let lowered = message.to_lowercase();
        self.hints.iter().any(|hint| lowered.contains(hint))
    }
}
