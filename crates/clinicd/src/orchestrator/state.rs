//! Per-turn request state and the transition function.
//!
//! Transitions are pure: given the stage that just finished and what it
//! produced, they return the next stage. The engine performs the side
//! effects; this module decides where to go.
//!
//! Bound: each generation increments `retry_count`, and a retry is only
//! taken while `retry_count < max_retries`, so a turn makes at most
//! `max(max_retries, 1)` generation attempts.

use clinic_shared::{Document, RouteDecision, Stage, VerificationOutcome};

/// Default retry bound for a turn
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Mutable record owned by exactly one turn
#[derive(Debug, Clone, PartialEq)]
pub struct RequestState {
    /// Question for the whole turn (after any follow-up rewrite)
    pub question: String,
    /// Current evidence; replaced by the filter, never appended
    pub documents: Vec<Document>,
    pub use_fallback: bool,
    /// Latest generation candidate
    pub answer: String,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl RequestState {
    pub fn new(question: impl Into<String>, max_retries: u32) -> Self {
        Self {
            question: question.into(),
            documents: Vec::new(),
            use_fallback: false,
            answer: String::new(),
            retry_count: 0,
            max_retries,
        }
    }

    /// Count one generation attempt; returns the attempt number
    pub fn begin_generation(&mut self) -> u32 {
        self.retry_count += 1;
        self.retry_count
    }

    pub fn replace_documents(&mut self, documents: Vec<Document>) {
        self.documents = documents;
    }

    /// True while another generation may still be attempted
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

/// ROUTE -> RETRIEVE | FALLBACK
pub fn after_route(decision: RouteDecision) -> Stage {
    match decision {
        RouteDecision::EvidenceLookup => Stage::Retrieve,
        RouteDecision::Fallback => Stage::Fallback,
    }
}

/// RETRIEVE -> FILTER, always
pub fn after_retrieve() -> Stage {
    Stage::Filter
}

/// FILTER -> FALLBACK when nothing survived, else GENERATE
pub fn after_filter(all_irrelevant: bool) -> Stage {
    if all_irrelevant {
        Stage::Fallback
    } else {
        Stage::Generate
    }
}

/// GENERATE -> VERIFY, always
pub fn after_generate() -> Stage {
    Stage::Verify
}

/// VERIFY -> DONE | GENERATE | FALLBACK
///
/// Usefulness failures never retry; only an ungrounded answer does.
pub fn after_verify(outcome: VerificationOutcome, state: &RequestState) -> Stage {
    match outcome {
        VerificationOutcome::GroundedUseful => Stage::Done,
        VerificationOutcome::GroundedNotUseful => Stage::Fallback,
        VerificationOutcome::NotGrounded if state.can_retry() => Stage::Generate,
        VerificationOutcome::NotGrounded => Stage::Fallback,
    }
}

/// FALLBACK -> DONE, always
pub fn after_fallback() -> Stage {
    Stage::Done
}
