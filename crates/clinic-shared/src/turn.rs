//! Turn results returned to callers.

use crate::{RouteDecision, Stage, TurnTrace};
use serde::{Deserialize, Serialize};

/// Message shown when an upstream capability is unavailable
pub const TECHNICAL_DIFFICULTY: &str = "I'm sorry, I'm having technical difficulties right now. \
Please try again later or contact the hospital directly.\n\n\
أعتذر، أواجه صعوبات تقنية. يرجى المحاولة لاحقاً أو الاتصال بالمستشفى مباشرة.";

/// Outcome of one successful orchestrator turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResult {
    /// Turn id used in logs
    pub request_id: String,
    /// Final answer text (never blank)
    pub answer: String,
    /// Generation attempts made on the evidence lane
    pub retry_count: u32,
    /// Whether the answer came from the fallback lane
    pub used_fallback: bool,
    /// Router decision, absent only if the turn never routed
    pub route: Option<RouteDecision>,
    /// The question actually processed (after any follow-up rewrite)
    pub question: String,
    pub trace: TurnTrace,
    /// RFC 3339 start time
    pub started_at: String,
    pub duration_ms: u64,
}

impl TurnResult {
    /// Stage that produced the answer
    pub fn answered_by(&self) -> Stage {
        if self.used_fallback {
            Stage::Fallback
        } else {
            Stage::Generate
        }
    }
}

/// Reply that is always displayable, even when the turn failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnReply {
    pub answer: String,
    /// True when the answer is the technical-difficulty message
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TurnResult>,
}

impl TurnReply {
    pub fn from_result(result: TurnResult) -> Self {
        Self {
            answer: result.answer.clone(),
            degraded: false,
            error_code: None,
            result: Some(result),
        }
    }

    pub fn technical_difficulty(error_code: i32) -> Self {
        Self {
            answer: TECHNICAL_DIFFICULTY.to_string(),
            degraded: true,
            error_code: Some(error_code),
            result: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_technical_difficulty_reply_is_not_blank() {
        let reply = TurnReply::technical_difficulty(-32002);
        assert!(reply.degraded);
        assert!(!reply.answer.trim().is_empty());
        assert_eq!(reply.error_code, Some(-32002));
    }

    #[test]
    fn test_answered_by() {
        let result = TurnResult {
            request_id: "r1".into(),
            answer: "ok".into(),
            retry_count: 0,
            used_fallback: true,
            route: Some(RouteDecision::Fallback),
            question: "q".into(),
            trace: TurnTrace::new(),
            started_at: "2025-01-01T00:00:00Z".into(),
            duration_ms: 1,
        };
        assert_eq!(result.answered_by(), Stage::Fallback);
    }
}
