//! Intelligence extraction over conversation history.
//!
//! Pure pattern matching, no external calls: the extractor is re-run over the
//! full history on every evaluation and must be deterministic and idempotent.

use crate::session::ConversationMessage;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// Labelled digit runs only; unlabeled runs are deliberately not captured so
// phone numbers and order numbers do not leak into bank accounts.
static ACCOUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:account(?: number)?|acct|acc(?:ount)?|a/c)\s*[:\-]?\s*([0-9]{6,18})\b")
        .expect("valid account regex")
});
static UPI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[\w.-]+@[\w.-]+\b").expect("valid upi regex"));
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.com\b").expect("valid email regex")
});
static EMAIL_FULL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.com$").expect("valid email regex")
});
// Indian mobile numbers; the no-trailing-digit rule is enforced in
// find_phone_numbers because the regex crate has no lookahead.
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\+91|91|0)?[-\s.]?[6-9][0-9]{9}").expect("valid phone regex"));
static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("valid url regex"));
static IFSC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z]{4}0[A-Z0-9]{6}\b").expect("valid ifsc regex"));
static PAN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z]{5}[0-9]{4}[A-Z]\b").expect("valid pan regex"));

/// Structured indicators extracted from a conversation.
///
/// A snapshot, not persisted state: recomputed from the full message history
/// on each evaluation. Identifier-like fields are sorted for determinism;
/// free-form matches (phone numbers, URLs) keep first-seen order after
/// deduplication since their use is existence-only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedIntelligence {
    pub bank_accounts: Vec<String>,
    pub upi_ids: Vec<String>,
    pub phishing_links: Vec<String>,
    pub phone_numbers: Vec<String>,
    pub email_addresses: Vec<String>,
    pub ifsc_codes: Vec<String>,
    pub pan_numbers: Vec<String>,
    pub suspicious_keywords: Vec<String>,
}

impl ExtractedIntelligence {
    /// Whether any evidence-grade category is non-empty.
    ///
    /// Keyword matches alone never count: they signal intent, not actionable
    /// intelligence.
    pub fn has_hard_evidence(&self) -> bool {
        !self.bank_accounts.is_empty()
            || !self.upi_ids.is_empty()
            || !self.phishing_links.is_empty()
            || !self.phone_numbers.is_empty()
            || !self.email_addresses.is_empty()
            || !self.ifsc_codes.is_empty()
            || !self.pan_numbers.is_empty()
    }

    /// Weighted evidence-sufficiency score.
    ///
    /// Financial identifiers and phishing links weigh 3, phone numbers 2,
    /// the remaining identifier categories 1. Suspicious keywords are a
    /// display-only signal and never score.
    pub fn intel_score(&self) -> u32 {
        3 * self.bank_accounts.len() as u32
            + 3 * self.upi_ids.len() as u32
            + 3 * self.phishing_links.len() as u32
            + 2 * self.phone_numbers.len() as u32
            + self.email_addresses.len() as u32
            + self.ifsc_codes.len() as u32
            + self.pan_numbers.len() as u32
    }
}

/// Scans accumulated conversation text for structured scam indicators.
pub struct IntelExtractor {
    keywords: Vec<String>,
}

impl IntelExtractor {
    /// Creates an extractor with the given suspicious-keyword vocabulary.
    /// Keywords are matched as case-insensitive substrings.
    pub fn new(keywords: Vec<String>) -> Self {
        let keywords = keywords.into_iter().map(|k| k.to_lowercase()).collect();
        Self { keywords }
    }

    /// Extracts intelligence from the concatenation of all message texts.
    pub fn extract(&self, history: &[ConversationMessage]) -> ExtractedIntelligence {
        let text = history
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let lowered = text.to_lowercase();

        let bank_accounts = sorted_unique(
            ACCOUNT_RE
                .captures_iter(&text)
                .map(|c| c[1].to_string())
                .collect(),
        );

        let upi_ids = sorted_unique(
            UPI_RE
                .find_iter(&text)
                .map(|m| m.as_str().to_string())
                .filter(|candidate| !EMAIL_FULL_RE.is_match(candidate))
                .collect(),
        );

        let email_addresses = sorted_unique(
            EMAIL_RE
                .find_iter(&text)
                .map(|m| m.as_str().to_string())
                .collect(),
        );

        let phishing_links = insertion_unique(
            URL_RE
                .find_iter(&text)
                .map(|m| m.as_str().to_string())
                .collect(),
        );

        let phone_numbers = insertion_unique(find_phone_numbers(&text));

        let ifsc_codes = sorted_unique(
            IFSC_RE
                .find_iter(&text)
                .map(|m| m.as_str().to_string())
                .collect(),
        );

        let pan_numbers = sorted_unique(
            PAN_RE
                .find_iter(&text)
                .map(|m| m.as_str().to_string())
                .collect(),
        );

        let suspicious_keywords = self
            .keywords
            .iter()
            .filter(|kw| lowered.contains(kw.as_str()))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        ExtractedIntelligence {
            bank_accounts,
            upi_ids,
            phishing_links,
            phone_numbers,
            email_addresses,
            ifsc_codes,
            pan_numbers,
            suspicious_keywords,
        }
    }
}

/// Finds mobile-number candidates, rejecting any match that is immediately
/// followed by another digit (a run longer than one number). A rejected
/// position resumes scanning one character later, so the tail of a longer
/// run can still match.
fn find_phone_numbers(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut matches = Vec::new();
    let mut at = 0;
    while at < text.len() {
        let Some(m) = PHONE_RE.find_at(text, at) else {
            break;
        };
        if bytes.get(m.end()).is_some_and(u8::is_ascii_digit) {
            at = m.start() + 1;
            continue;
        }
        let cleaned = m
            .as_str()
            .trim_start_matches(|c: char| c.is_whitespace() || c == '-' || c == '.');
        matches.push(cleaned.to_string());
        at = m.end();
    }
    matches
}

fn sorted_unique(values: Vec<String>) -> Vec<String> {
    values.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

fn insertion_unique(values: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    values.into_iter().filter(|v| seen.insert(v.clone())).collect()
}
