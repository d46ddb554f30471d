//! Fake capabilities for deterministic testing.
//!
//! No network, no model. Every classifier answer is scripted up front and
//! every call is counted, so tests can assert both the final result and
//! which stages actually ran.
//!
//! ## Example
//!
//! ```rust,ignore
//! let fake = FakeCapabilitiesBuilder::new()
//!     .route(RouteLabel::Vectorstore)
//!     .documents(vec![Document::new("X-ray: 350 EGP")])
//!     .relevant("X-ray: 350 EGP")
//!     .grounding(vec![FakeGrade::Yes])
//!     .build();
//!
//! let orchestrator = Orchestrator::new(fake.capabilities(), OrchestratorConfig::default());
//! ```

use crate::capabilities::{
    Capabilities, GroundingGrader, RelevanceGrader, Retriever, RouteClassifier, TextGenerator,
    UsefulnessGrader,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use clinic_shared::{Document, Grade, RouteLabel};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Capability call kinds tracked by the fake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeCall {
    Route,
    Retrieve,
    Relevance,
    Grounding,
    Usefulness,
    Answer,
    Fallback,
}

/// Scripted classifier answer
#[derive(Debug, Clone, PartialEq)]
pub enum FakeGrade {
    Yes,
    No,
    /// Classifier answered with something that is neither label
    Unparsed(String),
    /// Classifier call itself fails
    Fail(String),
}

impl FakeGrade {
    fn resolve(&self) -> Result<Grade> {
        match self {
            Self::Yes => Ok(Grade::Yes),
            Self::No => Ok(Grade::No),
            Self::Unparsed(raw) => Ok(Grade::Unparsed(raw.clone())),
            Self::Fail(msg) => Err(anyhow!("{}", msg)),
        }
    }
}

/// Scripted text generator
pub struct FakeWriter {
    kind: FakeCall,
    responses: Mutex<VecDeque<Result<String, String>>>,
    default_response: String,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl FakeWriter {
    pub fn new(kind: FakeCall, default_response: &str) -> Self {
        Self {
            kind,
            responses: Mutex::new(VecDeque::new()),
            default_response: default_response.to_string(),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every prompt received, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for FakeWriter {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(msg)) => Err(anyhow!("{:?} generator failed: {}", self.kind, msg)),
            None => {
                let n = self.call_count();
                Ok(format!("{} #{}", self.default_response, n))
            }
        }
    }
}

/// Fake implementation of every capability the orchestrator uses
pub struct FakeCapabilities {
    route: Result<RouteLabel, String>,
    documents: Result<Vec<Document>, String>,
    relevance: HashMap<String, FakeGrade>,
    default_relevance: FakeGrade,
    grounding: Mutex<VecDeque<FakeGrade>>,
    default_grounding: FakeGrade,
    usefulness: Mutex<VecDeque<FakeGrade>>,
    default_usefulness: FakeGrade,
    delays: HashMap<FakeCall, Duration>,
    calls: Mutex<HashMap<FakeCall, usize>>,
    route_histories: Mutex<Vec<String>>,
    answer_writer: Arc<FakeWriter>,
    fallback_writer: Arc<FakeWriter>,
}

impl FakeCapabilities {
    /// Capability bundle backed by this fake
    pub fn capabilities(self: &Arc<Self>) -> Capabilities {
        let retriever: Arc<dyn Retriever> = self.clone();
        Capabilities::new(
            self.clone(),
            retriever,
            self.answer_writer.clone(),
            self.fallback_writer.clone(),
        )
    }

    /// Number of calls of one kind
    pub fn call_count(&self, call: FakeCall) -> usize {
        match call {
            FakeCall::Answer => self.answer_writer.call_count(),
            FakeCall::Fallback => self.fallback_writer.call_count(),
            _ => self.calls.lock().unwrap().get(&call).copied().unwrap_or(0),
        }
    }

    /// Total calls across every capability
    pub fn total_calls(&self) -> usize {
        let classifier_calls: usize = self.calls.lock().unwrap().values().sum();
        classifier_calls + self.answer_writer.call_count() + self.fallback_writer.call_count()
    }

    pub fn answer_writer(&self) -> &FakeWriter {
        &self.answer_writer
    }

    pub fn fallback_writer(&self) -> &FakeWriter {
        &self.fallback_writer
    }

    /// History blocks the router received, in call order
    pub fn route_histories(&self) -> Vec<String> {
        self.route_histories.lock().unwrap().clone()
    }

    async fn enter(&self, call: FakeCall) {
        {
            let mut calls = self.calls.lock().unwrap();
            *calls.entry(call).or_insert(0) += 1;
        }
        if let Some(delay) = self.delays.get(&call) {
            tokio::time::sleep(*delay).await;
        }
    }

    fn next_grade(queue: &Mutex<VecDeque<FakeGrade>>, default: &FakeGrade) -> Result<Grade> {
        let next = queue.lock().unwrap().pop_front();
        next.unwrap_or_else(|| default.clone()).resolve()
    }
}

#[async_trait]
impl RouteClassifier for FakeCapabilities {
    async fn classify_route(&self, _question: &str, history: &str) -> Result<RouteLabel> {
        self.route_histories.lock().unwrap().push(history.to_string());
        self.enter(FakeCall::Route).await;
        self.route.clone().map_err(|msg| anyhow!("{}", msg))
    }
}

#[async_trait]
impl Retriever for FakeCapabilities {
    async fn retrieve(&self, _question: &str) -> Result<Vec<Document>> {
        self.enter(FakeCall::Retrieve).await;
        self.documents.clone().map_err(|msg| anyhow!("{}", msg))
    }
}

#[async_trait]
impl RelevanceGrader for FakeCapabilities {
    async fn grade_relevance(&self, _question: &str, document: &str) -> Result<Grade> {
        self.enter(FakeCall::Relevance).await;
        self.relevance
            .get(document)
            .unwrap_or(&self.default_relevance)
            .resolve()
    }
}

#[async_trait]
impl GroundingGrader for FakeCapabilities {
    async fn grade_grounding(&self, _documents: &[Document], _answer: &str) -> Result<Grade> {
        self.enter(FakeCall::Grounding).await;
        Self::next_grade(&self.grounding, &self.default_grounding)
    }
}

#[async_trait]
impl UsefulnessGrader for FakeCapabilities {
    async fn grade_usefulness(&self, _question: &str, _answer: &str) -> Result<Grade> {
        self.enter(FakeCall::Usefulness).await;
        Self::next_grade(&self.usefulness, &self.default_usefulness)
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for `FakeCapabilities`.
///
/// Defaults: route to the evidence lane, no documents, every document
/// irrelevant, every answer grounded and useful.
pub struct FakeCapabilitiesBuilder {
    route: Result<RouteLabel, String>,
    documents: Result<Vec<Document>, String>,
    relevance: HashMap<String, FakeGrade>,
    default_relevance: FakeGrade,
    grounding: VecDeque<FakeGrade>,
    default_grounding: FakeGrade,
    usefulness: VecDeque<FakeGrade>,
    default_usefulness: FakeGrade,
    answers: VecDeque<Result<String, String>>,
    fallback_answers: VecDeque<Result<String, String>>,
    delays: HashMap<FakeCall, Duration>,
}

impl FakeCapabilitiesBuilder {
    pub fn new() -> Self {
        Self {
            route: Ok(RouteLabel::Vectorstore),
            documents: Ok(vec![]),
            relevance: HashMap::new(),
            default_relevance: FakeGrade::No,
            grounding: VecDeque::new(),
            default_grounding: FakeGrade::Yes,
            usefulness: VecDeque::new(),
            default_usefulness: FakeGrade::Yes,
            answers: VecDeque::new(),
            fallback_answers: VecDeque::new(),
            delays: HashMap::new(),
        }
    }

    pub fn route(mut self, label: RouteLabel) -> Self {
        self.route = Ok(label);
        self
    }

    pub fn route_fails(mut self, msg: &str) -> Self {
        self.route = Err(msg.to_string());
        self
    }

    pub fn documents(mut self, documents: Vec<Document>) -> Self {
        self.documents = Ok(documents);
        self
    }

    pub fn retrieval_fails(mut self, msg: &str) -> Self {
        self.documents = Err(msg.to_string());
        self
    }

    /// Grade for a document, keyed by its content
    pub fn relevance(mut self, content: &str, grade: FakeGrade) -> Self {
        self.relevance.insert(content.to_string(), grade);
        self
    }

    pub fn relevant(self, content: &str) -> Self {
        self.relevance(content, FakeGrade::Yes)
    }

    pub fn default_relevance(mut self, grade: FakeGrade) -> Self {
        self.default_relevance = grade;
        self
    }

    /// Grounding grades consumed in order, then `default_grounding`
    pub fn grounding(mut self, grades: Vec<FakeGrade>) -> Self {
        self.grounding = grades.into();
        self
    }

    pub fn default_grounding(mut self, grade: FakeGrade) -> Self {
        self.default_grounding = grade;
        self
    }

    /// Usefulness grades consumed in order, then `default_usefulness`
    pub fn usefulness(mut self, grades: Vec<FakeGrade>) -> Self {
        self.usefulness = grades.into();
        self
    }

    pub fn default_usefulness(mut self, grade: FakeGrade) -> Self {
        self.default_usefulness = grade;
        self
    }

    pub fn answer(mut self, text: &str) -> Self {
        self.answers.push_back(Ok(text.to_string()));
        self
    }

    pub fn answer_fails(mut self, msg: &str) -> Self {
        self.answers.push_back(Err(msg.to_string()));
        self
    }

    pub fn fallback_answer(mut self, text: &str) -> Self {
        self.fallback_answers.push_back(Ok(text.to_string()));
        self
    }

    pub fn fallback_fails(mut self, msg: &str) -> Self {
        self.fallback_answers.push_back(Err(msg.to_string()));
        self
    }

    /// Sleep before answering calls of this kind
    pub fn delay(mut self, call: FakeCall, delay: Duration) -> Self {
        self.delays.insert(call, delay);
        self
    }

    pub fn build(self) -> Arc<FakeCapabilities> {
        let mut answer_writer = FakeWriter::new(FakeCall::Answer, "Generated answer");
        answer_writer.responses = Mutex::new(self.answers);
        answer_writer.delay = self.delays.get(&FakeCall::Answer).copied();

        let mut fallback_writer = FakeWriter::new(FakeCall::Fallback, "Simulated answer");
        fallback_writer.responses = Mutex::new(self.fallback_answers);
        fallback_writer.delay = self.delays.get(&FakeCall::Fallback).copied();

        Arc::new(FakeCapabilities {
            route: self.route,
            documents: self.documents,
            relevance: self.relevance,
            default_relevance: self.default_relevance,
            grounding: Mutex::new(self.grounding),
            default_grounding: self.default_grounding,
            usefulness: Mutex::new(self.usefulness),
            default_usefulness: self.default_usefulness,
            delays: self.delays,
            calls: Mutex::new(HashMap::new()),
            route_histories: Mutex::new(Vec::new()),
            answer_writer: Arc::new(answer_writer),
            fallback_writer: Arc::new(fallback_writer),
        })
    }
}

impl Default for FakeCapabilitiesBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Helper constructors for common scenarios
// ============================================================================

impl FakeCapabilities {
    /// Router always picks the fallback lane
    pub fn fallback_only() -> Arc<Self> {
        FakeCapabilitiesBuilder::new()
            .route(RouteLabel::SimulatedGeneration)
            .build()
    }

    /// Evidence lane where every document is relevant and every answer passes
    pub fn happy_path(documents: Vec<Document>) -> Arc<Self> {
        FakeCapabilitiesBuilder::new()
            .route(RouteLabel::Vectorstore)
            .documents(documents)
            .default_relevance(FakeGrade::Yes)
            .build()
    }
}
