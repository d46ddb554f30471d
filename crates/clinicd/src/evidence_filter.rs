//! Evidence filter: keep only documents the relevance grader accepts.
//!
//! Documents are graded one at a time in input order and the kept sequence
//! preserves that order. A grader failure on one document excludes that
//! document and filtering continues; only cancellation stops the filter.

use crate::capabilities::RelevanceGrader;
use crate::guard::CallGuard;
use clinic_shared::{DeskError, Document, Grade, Stage};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Filter output
#[derive(Debug, Clone, PartialEq)]
pub struct FilterResult {
    pub kept: Vec<Document>,
    /// Number of documents graded
    pub total: usize,
    /// Documents whose grading call failed (excluded)
    pub failed: usize,
}

impl FilterResult {
    /// True iff nothing was kept. Sole signal for the fallback lane.
    pub fn all_irrelevant(&self) -> bool {
        self.kept.is_empty()
    }
}

pub struct EvidenceFilter {
    grader: Arc<dyn RelevanceGrader>,
}

impl EvidenceFilter {
    pub fn new(grader: Arc<dyn RelevanceGrader>) -> Self {
        Self { grader }
    }

    pub async fn filter(
        &self,
        question: &str,
        documents: Vec<Document>,
        guard: &CallGuard,
    ) -> Result<FilterResult, DeskError> {
        let total = documents.len();
        let mut kept = Vec::with_capacity(total);
        let mut failed = 0;

        for (i, doc) in documents.into_iter().enumerate() {
            let grade = guard
                .call(
                    Stage::Filter,
                    self.grader.grade_relevance(question, &doc.content),
                )
                .await;

            match grade {
                Ok(Grade::Yes) => {
                    debug!("{} doc {}: relevant", Stage::Filter.tag(), i);
                    kept.push(doc);
                }
                Ok(Grade::No) => {
                    debug!("{} doc {}: not relevant", Stage::Filter.tag(), i);
                }
                Ok(Grade::Unparsed(raw)) => {
                    warn!(
                        "{} doc {}: unrecognised grade {:?}, treating as not relevant",
                        Stage::Filter.tag(),
                        i,
                        raw
                    );
                }
                Err(e) if e.is_cancellation() => return Err(e),
                Err(e) => {
                    warn!(
                        "{} doc {}: grading failed ({}), treating as not relevant",
                        Stage::Filter.tag(),
                        i,
                        e
                    );
                    failed += 1;
                }
            }
        }

        info!(
            "{} kept {}/{} documents ({} grading failures)",
            Stage::Filter.tag(),
            kept.len(),
            total,
            failed
        );

        Ok(FilterResult {
            kept,
            total,
            failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeCall, FakeCapabilitiesBuilder, FakeGrade};
    use crate::guard::TurnCancel;
    use std::time::Duration;

    fn guard() -> CallGuard {
        CallGuard::new(TurnCancel::new(), Duration::from_secs(5))
    }

    fn docs(contents: &[&str]) -> Vec<Document> {
        contents.iter().map(|c| Document::new(*c)).collect()
    }

    #[tokio::test]
    async fn test_keeps_relevant_in_order() {
        let fake = FakeCapabilitiesBuilder::new()
            .relevant("a")
            .relevant("c")
            .relevant("d")
            .build();
        let filter = EvidenceFilter::new(fake.capabilities().relevance);

        let result = filter
            .filter("q", docs(&["a", "b", "c", "d"]), &guard())
            .await
            .unwrap();

        let kept: Vec<&str> = result.kept.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(kept, vec!["a", "c", "d"]);
        assert_eq!(result.total, 4);
        assert!(!result.all_irrelevant());
    }

    #[tokio::test]
    async fn test_all_irrelevant_flag() {
        let fake = FakeCapabilitiesBuilder::new().build();
        let filter = EvidenceFilter::new(fake.capabilities().relevance);

        let result = filter.filter("q", docs(&["a", "b"]), &guard()).await.unwrap();
        assert!(result.all_irrelevant());

        let empty = filter.filter("q", vec![], &guard()).await.unwrap();
        assert!(empty.all_irrelevant());
        assert_eq!(empty.total, 0);
    }

    #[tokio::test]
    async fn test_grader_failure_excludes_document_only() {
        let fake = FakeCapabilitiesBuilder::new()
            .relevance("a", FakeGrade::Fail("grader timeout".into()))
            .relevant("b")
            .relevance("c", FakeGrade::Unparsed("relevant-ish".into()))
            .build();
        let filter = EvidenceFilter::new(fake.capabilities().relevance);

        let result = filter
            .filter("q", docs(&["a", "b", "c"]), &guard())
            .await
            .unwrap();

        assert_eq!(result.kept, docs(&["b"]));
        assert_eq!(result.failed, 1);
        assert_eq!(fake.call_count(FakeCall::Relevance), 3);
    }

    #[tokio::test]
    async fn test_filter_is_idempotent() {
        let fake = FakeCapabilitiesBuilder::new().relevant("x").relevant("z").build();
        let filter = EvidenceFilter::new(fake.capabilities().relevance);
        let input = docs(&["x", "y", "z"]);

        let first = filter.filter("q", input.clone(), &guard()).await.unwrap();
        let second = filter.filter("q", input, &guard()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_cancellation_aborts_filter() {
        let fake = FakeCapabilitiesBuilder::new().default_relevance(FakeGrade::Yes).build();
        let filter = EvidenceFilter::new(fake.capabilities().relevance);
        let cancel = TurnCancel::new();
        cancel.cancel();

        let err = filter
            .filter(
                "q",
                docs(&["a", "b"]),
                &CallGuard::new(cancel, Duration::from_secs(5)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::Cancelled { stage: Stage::Filter }));
        assert_eq!(fake.call_count(FakeCall::Relevance), 0);
    }
}
