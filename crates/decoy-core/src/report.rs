//! Final result payload and the reporter contract.

use crate::error::Result;
use crate::intel::ExtractedIntelligence;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The payload compiled exactly once per session when an engagement
/// completes, delivered to the external case-management endpoint.
///
/// Field names follow the endpoint's wire contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalResult {
    pub session_id: String,
    pub scam_detected: bool,
    pub total_messages_exchanged: usize,
    pub engagement_duration_seconds: i64,
    pub extracted_intelligence: ExtractedIntelligence,
    pub agent_notes: String,
}

/// Delivers final results to the external case-management endpoint.
///
/// Delivery is decoupled from finalization: the engine finalizes a session
/// regardless of whether delivery succeeds, and a failed delivery is logged,
/// never retried and never surfaced to the inbound caller.
#[async_trait]
pub trait CaseReporter: Send + Sync {
    /// Posts the result. A non-2xx response or transport failure is an `Err`
    /// the caller is expected to log and drop.
    async fn deliver(&self, result: &FinalResult) -> Result<()>;
}
