//! Turn engine.
//!
//! Drives one turn through the state machine:
//! ROUTE -> RETRIEVE -> FILTER -> GENERATE <-> VERIFY -> FALLBACK -> DONE
//!
//! Stages run strictly one after another. Every capability call goes
//! through the turn's `CallGuard`; the first error ends the turn.

use super::state::{
    after_fallback, after_filter, after_generate, after_retrieve, after_route, after_verify,
    RequestState, DEFAULT_MAX_RETRIES,
};
use crate::capabilities::{Capabilities, Retriever};
use crate::evidence_filter::EvidenceFilter;
use crate::followup::FollowUpDetector;
use crate::generator::{AnswerGenerator, FallbackGenerator};
use crate::guard::{CallGuard, TurnCancel};
use crate::router::Router;
use crate::verifier::GroundingVerifier;
use clinic_shared::{
    ConversationHistory, DeskError, RouteDecision, Stage, StageOutcome, TurnReply, TurnResult,
    TurnTrace,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Orchestrator settings fixed for its lifetime
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Retry bound used by `respond`; `handle_turn` takes its own
    pub max_retries: u32,
    /// Limit for a single capability call
    pub call_timeout: Duration,
    /// Limit for the whole turn
    pub turn_timeout: Duration,
    pub follow_up: FollowUpDetector,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            call_timeout: Duration::from_secs(60),
            turn_timeout: Duration::from_secs(180),
            follow_up: FollowUpDetector::default(),
        }
    }
}

/// Service desk orchestrator.
///
/// Holds no per-turn state; one instance serves any number of concurrent
/// turns.
pub struct Orchestrator {
    router: Router,
    retriever: Arc<dyn Retriever>,
    filter: EvidenceFilter,
    answer_generator: AnswerGenerator,
    verifier: GroundingVerifier,
    fallback_generator: FallbackGenerator,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(capabilities: Capabilities, config: OrchestratorConfig) -> Self {
        Self {
            router: Router::new(capabilities.router),
            retriever: capabilities.retriever,
            filter: EvidenceFilter::new(capabilities.relevance),
            answer_generator: AnswerGenerator::new(capabilities.answer_writer),
            verifier: GroundingVerifier::new(capabilities.grounding, capabilities.usefulness),
            fallback_generator: FallbackGenerator::new(capabilities.fallback_writer),
            config,
        }
    }

    /// Process one turn.
    ///
    /// Errors are turn errors: a capability failed, timed out or the turn
    /// was cancelled. Retry exhaustion is not an error; it ends in the
    /// fallback lane.
    pub async fn handle_turn(
        &self,
        question: &str,
        history: &ConversationHistory,
        max_retries: u32,
    ) -> Result<TurnResult, DeskError> {
        self.handle_turn_with_cancel(question, history, max_retries, TurnCancel::new())
            .await
    }

    /// `handle_turn` with a caller-held cancellation handle
    pub async fn handle_turn_with_cancel(
        &self,
        question: &str,
        history: &ConversationHistory,
        max_retries: u32,
        cancel: TurnCancel,
    ) -> Result<TurnResult, DeskError> {
        if question.trim().is_empty() {
            return Err(DeskError::EmptyQuestion);
        }

        let request_id = uuid::Uuid::new_v4().to_string();
        let guard = CallGuard::new(cancel.clone(), self.config.call_timeout);
        let turn = self.run(&request_id, question.trim(), history, max_retries, &guard);

        let result = match tokio::time::timeout(self.config.turn_timeout, turn).await {
            Ok(result) => result,
            Err(_) => {
                cancel.cancel();
                Err(DeskError::TurnTimeout {
                    secs: self.config.turn_timeout.as_secs(),
                })
            }
        };

        if let Err(e) = &result {
            let tag = e.stage().map(|s| s.tag()).unwrap_or("[TURN]");
            warn!("{} request={} aborted: {}", tag, request_id, e);
        }
        result
    }

    /// Process one turn and always produce something to show the user.
    ///
    /// Turn errors become the technical-difficulty message.
    pub async fn respond(&self, question: &str, history: &ConversationHistory) -> TurnReply {
        match self
            .handle_turn(question, history, self.config.max_retries)
            .await
        {
            Ok(result) => TurnReply::from_result(result),
            Err(e) => {
                error!("Turn failed (code {}): {}", e.code(), e);
                TurnReply::technical_difficulty(e.code())
            }
        }
    }

    async fn run(
        &self,
        request_id: &str,
        question: &str,
        history: &ConversationHistory,
        max_retries: u32,
        guard: &CallGuard,
    ) -> Result<TurnResult, DeskError> {
        let started = Instant::now();
        let started_at = chrono::Utc::now().to_rfc3339();

        let question = self.config.follow_up.rewrite(question, history);
        let mut state = RequestState::new(question, max_retries);
        let mut trace = TurnTrace::new();
        let mut route: Option<RouteDecision> = None;
        let mut stage = Stage::Route;

        info!(
            "[>] request={} max_retries={} history={} messages",
            request_id,
            max_retries,
            history.len()
        );

        while !stage.is_terminal() {
            guard.check(stage)?;

            stage = match stage {
                Stage::Route => {
                    let decision = self.router.route(&state.question, history, guard).await?;
                    route = Some(decision);
                    trace.record(
                        elapsed_ms(started),
                        Stage::Route,
                        StageOutcome::Routed { decision },
                    );
                    after_route(decision)
                }
                Stage::Retrieve => {
                    let documents = guard
                        .call(Stage::Retrieve, self.retriever.retrieve(&state.question))
                        .await?;
                    info!(
                        "{} request={} retrieved {} documents",
                        Stage::Retrieve.tag(),
                        request_id,
                        documents.len()
                    );
                    trace.record(
                        elapsed_ms(started),
                        Stage::Retrieve,
                        StageOutcome::Retrieved {
                            count: documents.len(),
                        },
                    );
                    state.replace_documents(documents);
                    after_retrieve()
                }
                Stage::Filter => {
                    let candidates = std::mem::take(&mut state.documents);
                    let filtered = self.filter.filter(&state.question, candidates, guard).await?;
                    trace.record(
                        elapsed_ms(started),
                        Stage::Filter,
                        StageOutcome::Relevant {
                            kept: filtered.kept.len(),
                            total: filtered.total,
                        },
                    );
                    let next = after_filter(filtered.all_irrelevant());
                    state.replace_documents(filtered.kept);
                    next
                }
                Stage::Generate => {
                    let attempt = state.begin_generation();
                    state.answer = self
                        .answer_generator
                        .generate(&state.question, &state.documents, history, guard)
                        .await?;
                    trace.record(
                        elapsed_ms(started),
                        Stage::Generate,
                        StageOutcome::Generated { attempt },
                    );
                    after_generate()
                }
                Stage::Verify => {
                    let outcome = self
                        .verifier
                        .verify(&state.question, &state.documents, &state.answer, guard)
                        .await?;
                    trace.record(
                        elapsed_ms(started),
                        Stage::Verify,
                        StageOutcome::Verified { outcome },
                    );
                    let next = after_verify(outcome, &state);
                    match next {
                        Stage::Generate => info!(
                            "{} request={} not grounded, retry {}/{}",
                            Stage::Verify.tag(),
                            request_id,
                            state.retry_count + 1,
                            state.max_retries
                        ),
                        Stage::Fallback => info!(
                            "{} request={} {} after {} attempts, using fallback lane",
                            Stage::Verify.tag(),
                            request_id,
                            outcome,
                            state.retry_count
                        ),
                        _ => {}
                    }
                    next
                }
                Stage::Fallback => {
                    state.use_fallback = true;
                    state.answer = self
                        .fallback_generator
                        .generate_fallback(&state.question, &state.documents, history, guard)
                        .await?;
                    trace.record(elapsed_ms(started), Stage::Fallback, StageOutcome::Ok);
                    after_fallback()
                }
                Stage::Done => Stage::Done,
            };
        }

        trace.record(elapsed_ms(started), Stage::Done, StageOutcome::Ok);
        let duration_ms = elapsed_ms(started);
        info!(
            "{} request={} {} (retry_count={}, fallback={}, {}ms)",
            Stage::Done.tag(),
            request_id,
            trace.summary(),
            state.retry_count,
            state.use_fallback,
            duration_ms
        );

        Ok(TurnResult {
            request_id: request_id.to_string(),
            answer: state.answer,
            retry_count: state.retry_count,
            used_fallback: state.use_fallback,
            route,
            question: state.question,
            trace,
            started_at,
            duration_ms,
        })
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeCall, FakeCapabilities, FakeCapabilitiesBuilder, FakeGrade};
    use clinic_shared::{Document, RouteLabel};

    fn orchestrator(fake: &Arc<FakeCapabilities>) -> Orchestrator {
        Orchestrator::new(fake.capabilities(), OrchestratorConfig::default())
    }

    #[tokio::test]
    async fn test_happy_path_stage_order() {
        let fake = FakeCapabilities::happy_path(vec![Document::new("MRI: 2500 EGP")]);
        let result = orchestrator(&fake)
            .handle_turn("MRI price?", &ConversationHistory::new(), 3)
            .await
            .unwrap();

        assert_eq!(
            result.trace.summary(),
            "route -> retrieve -> filter -> generate -> verify -> done"
        );
        assert_eq!(result.answer, "Generated answer #1");
        assert_eq!(result.route, Some(RouteDecision::EvidenceLookup));
        assert!(!result.used_fallback);
    }

    #[tokio::test]
    async fn test_not_useful_falls_back_with_kept_documents() {
        let fake = FakeCapabilitiesBuilder::new()
            .documents(vec![
                Document::new("Cardiology: Sunday to Thursday"),
                Document::new("MRI: 2500 EGP"),
            ])
            .relevant("MRI: 2500 EGP")
            .usefulness(vec![FakeGrade::No])
            .build();
        let result = orchestrator(&fake)
            .handle_turn("q", &ConversationHistory::new(), 3)
            .await
            .unwrap();

        assert!(result.used_fallback);
        assert_eq!(result.retry_count, 1);
        assert_eq!(fake.call_count(FakeCall::Answer), 1);
        let prompt = &fake.fallback_writer().prompts()[0];
        assert!(prompt.contains("[1] MRI: 2500 EGP"));
        assert!(!prompt.contains("Cardiology"));
    }

    #[tokio::test]
    async fn test_empty_question_rejected_before_routing() {
        let fake = FakeCapabilitiesBuilder::new().build();
        let err = orchestrator(&fake)
            .handle_turn("   ", &ConversationHistory::new(), 3)
            .await
            .unwrap_err();

        assert!(matches!(err, DeskError::EmptyQuestion));
        assert_eq!(fake.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_respond_degrades_on_error() {
        let fake = FakeCapabilitiesBuilder::new()
            .route_fails("router offline")
            .build();
        let reply = orchestrator(&fake)
            .respond("q", &ConversationHistory::new())
            .await;

        assert!(reply.degraded);
        assert_eq!(reply.error_code, Some(-32002));
        assert!(reply.result.is_none());
    }

    #[tokio::test]
    async fn test_respond_passes_result_through() {
        let fake = FakeCapabilitiesBuilder::new()
            .route(RouteLabel::SimulatedGeneration)
            .fallback_answer("Your appointment request has been noted (simulated).")
            .build();
        let reply = orchestrator(&fake)
            .respond("Book me with Dr. X", &ConversationHistory::new())
            .await;

        assert!(!reply.degraded);
        assert_eq!(
            reply.answer,
            "Your appointment request has been noted (simulated)."
        );
    }
}
