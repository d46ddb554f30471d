//! Routing and verification decisions, plus the raw classifier labels
//! they are derived from.
//!
//! Classifiers are external and may answer with anything. Raw labels keep
//! the unrecognised text around (`Unparsed`) so the orchestrator can log it
//! and pick the conservative branch:
//!
//! - route: `Unparsed` => `Fallback`
//! - relevance / grounding / usefulness: `Unparsed` => negative

use serde::{Deserialize, Serialize};

/// Lane chosen for a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDecision {
    /// Retrieve evidence, filter it, generate a verified answer
    EvidenceLookup,
    /// Answer directly through the capability-simulation lane
    Fallback,
}

impl std::fmt::Display for RouteDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EvidenceLookup => write!(f, "evidence_lookup"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Result of checking a generated answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    GroundedUseful,
    GroundedNotUseful,
    NotGrounded,
}

impl VerificationOutcome {
    pub fn is_grounded(&self) -> bool {
        !matches!(self, Self::NotGrounded)
    }
}

impl std::fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GroundedUseful => write!(f, "grounded+useful"),
            Self::GroundedNotUseful => write!(f, "grounded+not_useful"),
            Self::NotGrounded => write!(f, "not_grounded"),
        }
    }
}

/// Raw output of a binary classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Yes,
    No,
    /// Neither expected label; carries the raw text for logging
    Unparsed(String),
}

impl Grade {
    /// Parse a label such as `yes`, `"No"`, `true` or `no.`
    pub fn from_label(raw: &str) -> Self {
        match normalize_label(raw).as_str() {
            "yes" | "true" => Self::Yes,
            "no" | "false" => Self::No,
            _ => Self::Unparsed(raw.to_string()),
        }
    }

    pub fn from_bool(value: bool) -> Self {
        if value {
            Self::Yes
        } else {
            Self::No
        }
    }

    /// Conservative reading: only an explicit `Yes` counts
    pub fn is_affirmative(&self) -> bool {
        matches!(self, Self::Yes)
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Yes => write!(f, "yes"),
            Self::No => write!(f, "no"),
            Self::Unparsed(raw) => write!(f, "unparsed({})", raw),
        }
    }
}

/// Raw output of the route classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteLabel {
    Vectorstore,
    SimulatedGeneration,
    Unparsed(String),
}

impl RouteLabel {
    pub fn from_label(raw: &str) -> Self {
        match normalize_label(raw).replace([' ', '-'], "_").as_str() {
            "vectorstore" | "vector_store" => Self::Vectorstore,
            "simulated_generation" | "simulated" => Self::SimulatedGeneration,
            _ => Self::Unparsed(raw.to_string()),
        }
    }

    /// Map to a decision; anything unrecognised takes the fallback lane
    pub fn decision(&self) -> RouteDecision {
        match self {
            Self::Vectorstore => RouteDecision::EvidenceLookup,
            Self::SimulatedGeneration | Self::Unparsed(_) => RouteDecision::Fallback,
        }
    }

    pub fn is_unparsed(&self) -> bool {
        matches!(self, Self::Unparsed(_))
    }
}

impl From<RouteDecision> for RouteLabel {
    fn from(decision: RouteDecision) -> Self {
        match decision {
            RouteDecision::EvidenceLookup => Self::Vectorstore,
            RouteDecision::Fallback => Self::SimulatedGeneration,
        }
    }
}

fn normalize_label(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.')
        .trim()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_labels() {
        assert_eq!(Grade::from_label("yes"), Grade::Yes);
        assert_eq!(Grade::from_label(" \"No\" "), Grade::No);
        assert_eq!(Grade::from_label("TRUE"), Grade::Yes);
        assert_eq!(Grade::from_label("no."), Grade::No);
        assert_eq!(
            Grade::from_label("maybe"),
            Grade::Unparsed("maybe".to_string())
        );
    }

    #[test]
    fn test_unparsed_grade_is_negative() {
        assert!(Grade::Yes.is_affirmative());
        assert!(!Grade::No.is_affirmative());
        assert!(!Grade::Unparsed("probably".into()).is_affirmative());
    }

    #[test]
    fn test_route_labels() {
        assert_eq!(RouteLabel::from_label("vectorstore"), RouteLabel::Vectorstore);
        assert_eq!(
            RouteLabel::from_label("Simulated Generation"),
            RouteLabel::SimulatedGeneration
        );
        assert!(RouteLabel::from_label("web_search").is_unparsed());
    }

    #[test]
    fn test_unparsed_route_falls_back() {
        assert_eq!(
            RouteLabel::Vectorstore.decision(),
            RouteDecision::EvidenceLookup
        );
        assert_eq!(
            RouteLabel::SimulatedGeneration.decision(),
            RouteDecision::Fallback
        );
        assert_eq!(
            RouteLabel::Unparsed("???".into()).decision(),
            RouteDecision::Fallback
        );
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(VerificationOutcome::GroundedUseful.to_string(), "grounded+useful");
        assert!(!VerificationOutcome::NotGrounded.is_grounded());
    }
}
