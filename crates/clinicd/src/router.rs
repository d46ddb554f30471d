//! Question router: evidence lane or fallback lane.
//!
//! Only the trailing history window reaches the classifier, so the decision
//! depends on recent context and the prompt size stays bounded.

use crate::capabilities::RouteClassifier;
use crate::guard::CallGuard;
use clinic_shared::{ConversationHistory, DeskError, RouteDecision, RouteLabel, Stage};
use std::sync::Arc;
use tracing::{info, warn};

pub struct Router {
    classifier: Arc<dyn RouteClassifier>,
}

impl Router {
    pub fn new(classifier: Arc<dyn RouteClassifier>) -> Self {
        Self { classifier }
    }

    /// Classify `question` given the caller's history.
    ///
    /// Always one of the two decisions. An unrecognised label routes to
    /// `Fallback`; a failed classifier call is a turn error.
    pub async fn route(
        &self,
        question: &str,
        history: &ConversationHistory,
        guard: &CallGuard,
    ) -> Result<RouteDecision, DeskError> {
        let rendered = history.render_window();

        let label = guard
            .call(
                Stage::Route,
                self.classifier.classify_route(question, &rendered),
            )
            .await?;

        if let RouteLabel::Unparsed(raw) = &label {
            warn!(
                "{} Unrecognised route label {:?}, using fallback lane",
                Stage::Route.tag(),
                raw
            );
        }

        let decision = label.decision();
        info!(
            "{} decision={} (history window: {} messages)",
            Stage::Route.tag(),
            decision,
            history.window().len()
        );
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeCapabilitiesBuilder;
    use crate::guard::TurnCancel;
    use clinic_shared::{Message, NO_PREVIOUS_CONVERSATION};
    use std::time::Duration;

    fn guard() -> CallGuard {
        CallGuard::new(TurnCancel::new(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_route_vectorstore() {
        let fake = FakeCapabilitiesBuilder::new()
            .route(RouteLabel::Vectorstore)
            .build();
        let router = Router::new(fake.capabilities().router);

        let decision = router
            .route("What is the price of an X-ray?", &ConversationHistory::new(), &guard())
            .await
            .unwrap();
        assert_eq!(decision, RouteDecision::EvidenceLookup);
    }

    #[tokio::test]
    async fn test_unparsed_label_routes_to_fallback() {
        let fake = FakeCapabilitiesBuilder::new()
            .route(RouteLabel::Unparsed("web_search".into()))
            .build();
        let router = Router::new(fake.capabilities().router);

        let decision = router
            .route("Anything", &ConversationHistory::new(), &guard())
            .await
            .unwrap();
        assert_eq!(decision, RouteDecision::Fallback);
    }

    #[tokio::test]
    async fn test_classifier_failure_is_error() {
        let fake = FakeCapabilitiesBuilder::new()
            .route_fails("connection refused")
            .build();
        let router = Router::new(fake.capabilities().router);

        let err = router
            .route("Anything", &ConversationHistory::new(), &guard())
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::Upstream { stage: Stage::Route, .. }));
    }

    #[tokio::test]
    async fn test_router_sees_only_window() {
        let fake = FakeCapabilitiesBuilder::new().build();
        let router = Router::new(fake.capabilities().router);

        let mut history = ConversationHistory::new();
        for i in 0..8 {
            history.push(Message::user(format!("message {}", i)));
        }

        router.route("q", &ConversationHistory::new(), &guard()).await.unwrap();
        router.route("q", &history, &guard()).await.unwrap();

        let seen = fake.route_histories();
        assert_eq!(seen[0], NO_PREVIOUS_CONVERSATION);
        assert!(!seen[1].contains("message 1\n"));
        assert!(seen[1].starts_with("User: message 2\n"));
        assert_eq!(seen[1].lines().count(), 6);
    }
}
