//! Scam classification via the external model.
//!
//! The model is asked for a strict JSON verdict. Output is only ever parsed
//! as data; anything unparsable degrades to a "not a scam" verdict so a
//! misbehaving model can never fault the request path.

use crate::agent::TextModel;
use serde::Deserialize;
use std::sync::Arc;

/// Verdicts with a `true` detection below this confidence are downgraded to
/// `false` (conservative bias against false positives).
const CONFIDENCE_FLOOR: f64 = 0.6;

/// The effective classification outcome for one message.
#[derive(Debug, Clone, PartialEq)]
pub struct ScamVerdict {
    pub scam_detected: bool,
    pub confidence: f64,
    pub reason: String,
}

impl ScamVerdict {
    fn negative(reason: &str) -> Self {
        Self {
            scam_detected: false,
            confidence: 0.0,
            reason: reason.to_string(),
        }
    }
}

/// Classifies a single inbound message with the external model.
pub struct ScamDetector {
    model: Arc<dyn TextModel>,
}

impl ScamDetector {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }

    /// Classifies `text`. Never fails: model or parse errors yield a
    /// negative verdict with a diagnostic reason.
    pub async fn detect(&self, text: &str) -> ScamVerdict {
        let prompt = detection_prompt(text);
        let raw = match self.model.generate(&prompt).await {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!("[ScamDetector] Model request failed: {err}");
                return ScamVerdict::negative("Model request failed");
            }
        };

        let Some(mut verdict) = parse_verdict(&raw) else {
            return ScamVerdict::negative("Unable to parse model response");
        };

        if verdict.scam_detected && verdict.confidence < CONFIDENCE_FLOOR {
            verdict.scam_detected = false;
        }
        verdict
    }
}

fn detection_prompt(text: &str) -> String {
    format!(
        "You are a scam detection classifier. Be conservative: only mark true when the\n\
         message has explicit scam indicators. Examples include urgency or threats,\n\
         credential/OTP requests, payment instructions (UPI IDs or account details),\n\
         phishing links/URLs, impersonation of banks/government/brands, or fake rewards.\n\
         If the message is normal or you are unsure, return false.\n\
         \n\
         Message:\n\
         {text}\n\
         \n\
         Respond ONLY in JSON:\n\
         {{\n\
           \"scamDetected\": true or false,\n\
           \"confidence\": 0.0-1.0,\n\
           \"reason\": \"short explanation\"\n\
         }}"
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVerdict {
    #[serde(default)]
    scam_detected: bool,
    #[serde(default)]
    confidence: serde_json::Value,
    reason: Option<String>,
}

/// Parses the first `{...}` block out of free model text.
///
/// Models wrap answers in prose or code fences often enough that a strict
/// whole-string parse is not viable; slicing from the first `{` to the last
/// `}` recovers the JSON object in those cases.
fn parse_verdict(raw: &str) -> Option<ScamVerdict> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }

    let parsed: RawVerdict = serde_json::from_str(&raw[start..=end]).ok()?;
    Some(ScamVerdict {
        scam_detected: parsed.scam_detected,
        confidence: coerce_confidence(&parsed.confidence),
        reason: parsed
            .reason
            .unwrap_or_else(|| "No reason provided".to_string()),
    })
}

fn coerce_confidence(value: &serde_json::Value) -> f64 {
    match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentError;
    use async_trait::async_trait;

    struct ScriptedModel {
        response: Result<String, ()>,
    }

    #[async_trait]
    impl TextModel for ScriptedModel {
        async fn generate(&self, _prompt: &str) -> Result<String, AgentError> {
            self.response
                .clone()
                .map_err(|_| AgentError::Request("connection refused".to_string()))
        }
    }

    async fn detect_with(response: Result<String, ()>) -> ScamVerdict {
        let detector = ScamDetector::new(Arc::new(ScriptedModel { response }));
        detector.detect("some message").await
    }

    #[tokio::test]
    async fn parses_a_clean_json_verdict() {
        let verdict = detect_with(Ok(
            r#"{"scamDetected": true, "confidence": 0.9, "reason": "OTP request"}"#.to_string(),
        ))
        .await;
        assert!(verdict.scam_detected);
        assert_eq!(verdict.reason, "OTP request");
    }

    #[tokio::test]
    async fn parses_a_fenced_verdict() {
        let verdict = detect_with(Ok(
            "Here is my analysis:\n```json\n{\"scamDetected\": true, \"confidence\": 0.8, \"reason\": \"phishing link\"}\n```\n"
                .to_string(),
        ))
        .await;
        assert!(verdict.scam_detected);
    }

    #[tokio::test]
    async fn low_confidence_downgrades_to_negative() {
        let verdict = detect_with(Ok(
            r#"{"scamDetected": true, "confidence": 0.4, "reason": "maybe"}"#.to_string(),
        ))
        .await;
        assert!(!verdict.scam_detected);
        assert_eq!(verdict.reason, "maybe");
    }

    #[tokio::test]
    async fn unparsable_output_is_a_negative_verdict() {
        let verdict = detect_with(Ok("I think this looks suspicious!".to_string())).await;
        assert!(!verdict.scam_detected);
        assert_eq!(verdict.reason, "Unable to parse model response");
    }

    #[tokio::test]
    async fn transport_failure_is_a_negative_verdict() {
        let verdict = detect_with(Err(())).await;
        assert!(!verdict.scam_detected);
        assert_eq!(verdict.reason, "Model request failed");
    }

    #[tokio::test]
    async fn missing_fields_fall_back_to_defaults() {
        let verdict = detect_with(Ok(r#"{"scamDetected": true}"#.to_string())).await;
        // true with default confidence 0.0 is below the floor
        assert!(!verdict.scam_detected);
        assert_eq!(verdict.reason, "No reason provided");
    }

    #[tokio::test]
    async fn string_confidence_is_coerced() {
        let verdict = detect_with(Ok(
            r#"{"scamDetected": true, "confidence": "0.75", "reason": "r"}"#.to_string(),
        ))
        .await;
        assert!(verdict.scam_detected);
        assert!((verdict.confidence - 0.75).abs() < f64::EPSILON);
    }
}
