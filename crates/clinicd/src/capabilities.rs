//! External capability traits.
//!
//! The orchestrator never talks to a model or a vector store directly. It
//! goes through these traits so production code can plug in `OllamaClient`
//! and `KnowledgeBase` while tests plug in `FakeCapabilities`.
//!
//! Implementations must be safe to call from many turns at once; the core
//! treats them as stateless, reentrant services.

use anyhow::Result;
use async_trait::async_trait;
use clinic_shared::{Document, Grade, RouteLabel};
use std::sync::Arc;

/// Classifies a question (plus rendered history window) into a lane
#[async_trait]
pub trait RouteClassifier: Send + Sync {
    async fn classify_route(&self, question: &str, history: &str) -> Result<RouteLabel>;
}

/// Top-k evidence retrieval. `k` belongs to the implementation.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, question: &str) -> Result<Vec<Document>>;
}

/// Is this document relevant to the question?
#[async_trait]
pub trait RelevanceGrader: Send + Sync {
    async fn grade_relevance(&self, question: &str, document: &str) -> Result<Grade>;
}

/// Is this answer supported by these documents?
#[async_trait]
pub trait GroundingGrader: Send + Sync {
    async fn grade_grounding(&self, documents: &[Document], answer: &str) -> Result<Grade>;
}

/// Does this answer address the question?
#[async_trait]
pub trait UsefulnessGrader: Send + Sync {
    async fn grade_usefulness(&self, question: &str, answer: &str) -> Result<Grade>;
}

/// Produces natural-language text from a prompt
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// The full set of capabilities one orchestrator needs.
///
/// Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct Capabilities {
    pub router: Arc<dyn RouteClassifier>,
    pub retriever: Arc<dyn Retriever>,
    pub relevance: Arc<dyn RelevanceGrader>,
    pub grounding: Arc<dyn GroundingGrader>,
    pub usefulness: Arc<dyn UsefulnessGrader>,
    /// Generator for the evidence lane
    pub answer_writer: Arc<dyn TextGenerator>,
    /// Generator for the fallback lane
    pub fallback_writer: Arc<dyn TextGenerator>,
}

impl Capabilities {
    /// Build from one classifier backend that implements all four
    /// classifier traits, plus a retriever and the two generators.
    pub fn new<C>(
        classifiers: Arc<C>,
        retriever: Arc<dyn Retriever>,
        answer_writer: Arc<dyn TextGenerator>,
        fallback_writer: Arc<dyn TextGenerator>,
    ) -> Self
    where
        C: RouteClassifier + RelevanceGrader + GroundingGrader + UsefulnessGrader + 'static,
    {
        Self {
            router: classifiers.clone(),
            retriever,
            relevance: classifiers.clone(),
            grounding: classifiers.clone(),
            usefulness: classifiers,
            answer_writer,
            fallback_writer,
        }
    }
}
