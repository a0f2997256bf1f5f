//! Runtime configuration.
//!
//! All knobs load from environment variables with fixed defaults; the
//! keyword vocabulary and fast-path hint set are tuning data and can
//! additionally be replaced through an optional TOML file (`DECOY_CONFIG`)
//! without recompiling. The default lists are behavioral contract and
//! should only change with a product decision.

use crate::error::{DecoyError, Result};
use serde::Deserialize;
use std::time::Duration;

/// Configuration for the engagement decision engine.
#[derive(Debug, Clone)]
pub struct DecoyConfig {
    /// Shared secret expected in the `x-api-key` header.
    pub api_key: Option<String>,
    /// Completion score threshold.
    pub min_intel_score: u32,
    /// Turn-count completion fallback.
    pub fallback_min_turns: usize,
    /// Budget for the external classification call.
    pub detect_timeout: Duration,
    /// Budget for the external reply-generation call.
    pub reply_timeout: Duration,
    /// Budget for the agent-notes call. Much tighter than the reply budget:
    /// notes are secondary and must not add visible latency.
    pub notes_timeout: Duration,
    /// Budget for the final-result POST.
    pub report_timeout: Duration,
    /// Permits for the shared external-call pool.
    pub external_workers: usize,
    /// Case-management endpoint for final results.
    pub report_url: String,
    /// Whether to ask the retriever for context during reply generation.
    pub use_retrieval: bool,
    /// Retrieval depth when enabled.
    pub retrieval_top_k: usize,
    /// High-signal substrings that classify a message without a model call.
    pub scam_hints: Vec<String>,
    /// Vocabulary for the display-only suspicious-keyword sweep.
    pub suspicious_keywords: Vec<String>,
}

impl Default for DecoyConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            min_intel_score: 14,
            fallback_min_turns: 17,
            detect_timeout: Duration::from_secs(28),
            reply_timeout: Duration::from_secs(28),
            notes_timeout: Duration::from_secs(4),
            report_timeout: Duration::from_secs(5),
            external_workers: 8,
            report_url: "https://hackathon.guvi.in/api/updateHoneyPotFinalResult".to_string(),
            use_retrieval: false,
            retrieval_top_k: 3,
            scam_hints: default_scam_hints(),
            suspicious_keywords: default_suspicious_keywords(),
        }
    }
}

impl DecoyConfig {
    /// Loads configuration from the environment, falling back to defaults
    /// for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let mut config = Self {
            api_key: std::env::var("API_KEY").ok().filter(|k| !k.is_empty()),
            min_intel_score: env_parse("MIN_INTEL_SCORE", defaults.min_intel_score),
            fallback_min_turns: env_parse("FALLBACK_MIN_TURNS", defaults.fallback_min_turns),
            detect_timeout: env_seconds("DETECT_TIMEOUT_SECONDS", defaults.detect_timeout),
            reply_timeout: env_seconds("REPLY_TIMEOUT_SECONDS", defaults.reply_timeout),
            notes_timeout: env_seconds("NOTES_TIMEOUT_SECONDS", defaults.notes_timeout),
            report_timeout: env_seconds("REPORT_TIMEOUT_SECONDS", defaults.report_timeout),
            external_workers: env_parse("EXTERNAL_WORKERS", defaults.external_workers).max(1),
            report_url: std::env::var("REPORT_URL").unwrap_or(defaults.report_url),
            use_retrieval: std::env::var("USE_RETRIEVAL")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.use_retrieval),
            retrieval_top_k: env_parse("RETRIEVAL_TOP_K", defaults.retrieval_top_k).max(1),
            scam_hints: defaults.scam_hints,
            suspicious_keywords: defaults.suspicious_keywords,
        };

        if let Ok(path) = std::env::var("DECOY_CONFIG") {
            match config.apply_vocab_file(&path) {
                Ok(()) => tracing::info!("[DecoyConfig] Loaded vocabulary overrides from {path}"),
                Err(e) => {
                    tracing::warn!("[DecoyConfig] Ignoring vocabulary file {path}: {e}");
                }
            }
        }

        config
    }

    fn apply_vocab_file(&mut self, path: &str) -> Result<()> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| DecoyError::config(format!("cannot read {path}: {e}")))?;
        let file: VocabFile = toml::from_str(&raw)?;
        if let Some(hints) = file.scam_hints {
            self.scam_hints = hints;
        }
        if let Some(keywords) = file.suspicious_keywords {
            self.suspicious_keywords = keywords;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct VocabFile {
    scam_hints: Option<Vec<String>>,
    suspicious_keywords: Option<Vec<String>>,
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_seconds(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|secs| *secs >= 0.0)
        .map(Duration::from_secs_f64)
        .unwrap_or(default)
}

/// High-signal substrings that short-circuit classification on the fast
/// path, bounding latency and model cost for obvious cases.
pub fn default_scam_hints() -> Vec<String> {
    [
        "otp",
        "blocked",
        "suspended",
        "verify",
        "urgent",
        "immediately",
        "upi",
        "bank",
        "account",
        "link",
        "http://",
        "https://",
        "pin",
        "kyc",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

/// The fixed scam-indicator vocabulary: urgency phrasing, OTP/verification
/// language, payment/refund bait, phishing calls-to-action, impersonation
/// and lottery/investment-fraud phrasing.
pub fn default_suspicious_keywords() -> Vec<String> {
    [
        "update",
        "upi",
        "phone",
        "account",
        "blocked",
        "urgent",
        "immediately",
        "password",
        "pin",
        "refund",
        "reward",
        "prize",
        "lottery",
        "kyc",
        "payment",
        "qr code",
        "download",
        "otp",
        "transaction",
        "transfer",
        "act fast",
        "immediate action required",
        "limited time",
        "last warning",
        "final notice",
        "account compromised",
        "compromised",
        "account blocked",
        "suspended",
        "deactivated",
        "verify",
        "verification",
        "verification code",
        "verify your account",
        "confirm your identity",
        "kyc update",
        "update kyc",
        "share otp",
        "one time password",
        "do not share this otp",
        "cashback scam",
        "lottery winner",
        "you have won",
        "claim reward",
        "claim prize",
        "processing fee",
        "service charge",
        "fees",
        "click here",
        "click the link",
        "download attachment",
        "reset password",
        "security alert",
        "unauthorized transaction",
        "unknown transaction",
        "refund initiated",
        "refund pending",
        "loan approval",
        "pre-approved loan",
        "investment opportunity",
        "guaranteed returns",
        "risk free",
        "crypto investment",
        "reference id",
        "policy number",
        "order number",
        "government scheme",
        "job",
        "parcel",
        "investment",
        "stock",
        "insurance",
        "electricity bill",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}
