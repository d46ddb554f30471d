//! clinicd - service desk orchestrator.
//!
//! Routes each question to the evidence lane (retrieve, filter, generate,
//! verify) or the fallback lane, with a bounded retry policy between the
//! generator and the grounding verifier.

pub mod capabilities;
pub mod config;
pub mod evidence_filter;
pub mod fakes;
pub mod followup;
pub mod generator;
pub mod guard;
pub mod knowledge;
pub mod ollama;
pub mod orchestrator;
pub mod prompts;
pub mod router;
pub mod verifier;

pub use capabilities::{
    Capabilities, GroundingGrader, RelevanceGrader, Retriever, RouteClassifier, TextGenerator,
    UsefulnessGrader,
};
pub use config::Config;
pub use evidence_filter::{EvidenceFilter, FilterResult};
pub use fakes::{FakeCall, FakeCapabilities, FakeCapabilitiesBuilder, FakeGrade, FakeWriter};
pub use followup::{FaqContext, FollowUpDetector};
pub use generator::{AnswerGenerator, FallbackGenerator};
pub use guard::{CallGuard, TurnCancel};
pub use knowledge::KnowledgeBase;
pub use ollama::{OllamaClient, OllamaGenerator};
pub use orchestrator::{Orchestrator, OrchestratorConfig, RequestState, DEFAULT_MAX_RETRIES};
pub use router::Router;
pub use verifier::GroundingVerifier;
