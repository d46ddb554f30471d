//! Error types for the clinic service desk.

use crate::Stage;
use thiserror::Error;

/// Fatal turn error surfaced to the caller.
///
/// Retry-bound exhaustion is not an error: it is a transition to the
/// fallback lane and never shows up here.
#[derive(Error, Debug)]
pub enum DeskError {
    #[error("Question is empty")]
    EmptyQuestion,

    #[error("Upstream capability failed during {stage}: {source}")]
    Upstream {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },

    #[error("Capability call timed out during {stage} after {secs}s")]
    CallTimeout { stage: Stage, secs: u64 },

    #[error("Turn exceeded its {secs}s deadline")]
    TurnTimeout { secs: u64 },

    #[error("Turn cancelled during {stage}")]
    Cancelled { stage: Stage },

    #[error("Generator returned an empty answer during {stage}")]
    EmptyAnswer { stage: Stage },
}

impl DeskError {
    pub fn upstream(stage: Stage, source: anyhow::Error) -> Self {
        Self::Upstream { stage, source }
    }

    pub fn code(&self) -> i32 {
        match self {
            DeskError::EmptyQuestion => -32602,
            DeskError::Upstream { .. } => -32002,
            DeskError::CallTimeout { .. } => -32003,
            DeskError::TurnTimeout { .. } => -32004,
            DeskError::Cancelled { .. } => -32005,
            DeskError::EmptyAnswer { .. } => -32006,
        }
    }

    /// Stage the error happened in, when it is tied to one
    pub fn stage(&self) -> Option<Stage> {
        match self {
            DeskError::Upstream { stage, .. }
            | DeskError::CallTimeout { stage, .. }
            | DeskError::Cancelled { stage }
            | DeskError::EmptyAnswer { stage } => Some(*stage),
            _ => None,
        }
    }

    /// True when the caller asked the turn to stop
    pub fn is_cancellation(&self) -> bool {
        matches!(self, DeskError::Cancelled { .. } | DeskError::TurnTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_distinct() {
        let errors = vec![
            DeskError::EmptyQuestion,
            DeskError::upstream(Stage::Retrieve, anyhow::anyhow!("connection refused")),
            DeskError::CallTimeout {
                stage: Stage::Generate,
                secs: 60,
            },
            DeskError::TurnTimeout { secs: 180 },
            DeskError::Cancelled {
                stage: Stage::Filter,
            },
            DeskError::EmptyAnswer {
                stage: Stage::Fallback,
            },
        ];
        let mut codes: Vec<i32> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_upstream_display_names_stage() {
        let err = DeskError::upstream(Stage::Retrieve, anyhow::anyhow!("connection refused"));
        assert_eq!(
            err.to_string(),
            "Upstream capability failed during retrieve: connection refused"
        );
        assert_eq!(err.stage(), Some(Stage::Retrieve));
        assert!(!err.is_cancellation());
    }
}
