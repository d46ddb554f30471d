//! Per-turn stage trace.
//!
//! Records which orchestrator stages ran, in order, and how each ended.
//! Callers use it for debugging; tests use it to assert the state path.

use serde::{Deserialize, Serialize};

/// Orchestrator stage (state machine node)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Route,
    Retrieve,
    Filter,
    Generate,
    Verify,
    Fallback,
    Done,
}

impl Stage {
    /// Log tag used in tracing output
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Route => "[ROUTE]",
            Self::Retrieve => "[RETRIEVE]",
            Self::Filter => "[FILTER]",
            Self::Generate => "[GENERATE]",
            Self::Verify => "[VERIFY]",
            Self::Fallback => "[FALLBACK]",
            Self::Done => "[DONE]",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Route => "route",
            Self::Retrieve => "retrieve",
            Self::Filter => "filter",
            Self::Generate => "generate",
            Self::Verify => "verify",
            Self::Fallback => "fallback",
            Self::Done => "done",
        };
        write!(f, "{}", s)
    }
}

/// How a stage ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageOutcome {
    Ok,
    /// Router chose a lane
    Routed { decision: crate::RouteDecision },
    /// Retriever returned `count` documents
    Retrieved { count: usize },
    /// Evidence filter kept `kept` of `total`
    Relevant { kept: usize, total: usize },
    /// Generation attempt number `attempt`
    Generated { attempt: u32 },
    Verified { outcome: crate::VerificationOutcome },
}

impl std::fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Routed { decision } => write!(f, "routed({})", decision),
            Self::Retrieved { count } => write!(f, "retrieved({})", count),
            Self::Relevant { kept, total } => write!(f, "relevant({}/{})", kept, total),
            Self::Generated { attempt } => write!(f, "generated(attempt {})", attempt),
            Self::Verified { outcome } => write!(f, "verified({})", outcome),
        }
    }
}

/// A single trace entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Elapsed time since the turn started (ms)
    pub elapsed_ms: u64,
    pub stage: Stage,
    pub outcome: StageOutcome,
}

/// Ordered trace for one turn
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnTrace {
    events: Vec<TraceEvent>,
}

impl TurnTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, elapsed_ms: u64, stage: Stage, outcome: StageOutcome) {
        self.events.push(TraceEvent {
            elapsed_ms,
            stage,
            outcome,
        });
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Stages in execution order
    pub fn stages(&self) -> Vec<Stage> {
        self.events.iter().map(|e| e.stage).collect()
    }

    pub fn ran(&self, stage: Stage) -> bool {
        self.events.iter().any(|e| e.stage == stage)
    }

    pub fn count(&self, stage: Stage) -> usize {
        self.events.iter().filter(|e| e.stage == stage).count()
    }

    /// Compact one-line rendering, e.g. `route -> retrieve -> filter -> done`
    pub fn summary(&self) -> String {
        self.events
            .iter()
            .map(|e| e.stage.to_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RouteDecision;

    #[test]
    fn test_trace_counts_and_summary() {
        let mut trace = TurnTrace::new();
        trace.record(
            0,
            Stage::Route,
            StageOutcome::Routed {
                decision: RouteDecision::Fallback,
            },
        );
        trace.record(3, Stage::Fallback, StageOutcome::Ok);
        trace.record(4, Stage::Done, StageOutcome::Ok);

        assert!(trace.ran(Stage::Fallback));
        assert!(!trace.ran(Stage::Retrieve));
        assert_eq!(trace.count(Stage::Generate), 0);
        assert_eq!(trace.summary(), "route -> fallback -> done");
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json = serde_json::to_string(&StageOutcome::Relevant { kept: 1, total: 3 }).unwrap();
        assert_eq!(json, r#"{"type":"relevant","kept":1,"total":3}"#);
    }
}
