//! Answer generators for both lanes.
//!
//! Both wrap a `TextGenerator`. The prompt is built here; the text that
//! comes back is only trimmed, and blank text is an error. Checking the
//! content is the verifier's job, and the fallback lane is never verified.

use crate::capabilities::TextGenerator;
use crate::guard::CallGuard;
use crate::prompts;
use clinic_shared::{ConversationHistory, DeskError, Document, Stage};
use std::sync::Arc;
use tracing::info;

/// Evidence-lane generator: answer strictly from the documents, never refuse
pub struct AnswerGenerator {
    writer: Arc<dyn TextGenerator>,
}

impl AnswerGenerator {
    pub fn new(writer: Arc<dyn TextGenerator>) -> Self {
        Self { writer }
    }

    /// Prompt sent for these inputs. Identical inputs give identical
    /// prompts, so a retry re-submits exactly the same request.
    pub fn prompt(
        &self,
        question: &str,
        documents: &[Document],
        history: &ConversationHistory,
    ) -> String {
        prompts::answer_prompt(question, documents, &history.render_window())
    }

    pub async fn generate(
        &self,
        question: &str,
        documents: &[Document],
        history: &ConversationHistory,
        guard: &CallGuard,
    ) -> Result<String, DeskError> {
        let prompt = self.prompt(question, documents, history);
        let text = guard
            .call(Stage::Generate, self.writer.generate(&prompt))
            .await?;

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(DeskError::EmptyAnswer {
                stage: Stage::Generate,
            });
        }

        info!(
            "{} {} chars from {} documents",
            Stage::Generate.tag(),
            text.len(),
            documents.len()
        );
        Ok(text)
    }
}

/// Fallback-lane generator: best-effort answer simulating hospital
/// capabilities, with or without evidence
pub struct FallbackGenerator {
    writer: Arc<dyn TextGenerator>,
}

impl FallbackGenerator {
    pub fn new(writer: Arc<dyn TextGenerator>) -> Self {
        Self { writer }
    }

    pub fn prompt(
        &self,
        question: &str,
        documents: &[Document],
        history: &ConversationHistory,
    ) -> String {
        prompts::fallback_prompt(question, documents, &history.render_window())
    }

    /// `documents` may be empty; the prompt then says no evidence is available
    pub async fn generate_fallback(
        &self,
        question: &str,
        documents: &[Document],
        history: &ConversationHistory,
        guard: &CallGuard,
    ) -> Result<String, DeskError> {
        let prompt = self.prompt(question, documents, history);
        let text = guard
            .call(Stage::Fallback, self.writer.generate(&prompt))
            .await?;

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(DeskError::EmptyAnswer {
                stage: Stage::Fallback,
            });
        }

        info!(
            "{} {} chars ({} documents available)",
            Stage::Fallback.tag(),
            text.len(),
            documents.len()
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeCapabilitiesBuilder;
    use crate::guard::TurnCancel;
    use clinic_shared::{Message, NO_SPECIFIC_CONTEXT};
    use std::time::Duration;

    fn guard() -> CallGuard {
        CallGuard::new(TurnCancel::new(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_answer_trimmed() {
        let fake = FakeCapabilitiesBuilder::new()
            .answer("  An X-ray costs 350 EGP.\n")
            .build();
        let generator = AnswerGenerator::new(fake.capabilities().answer_writer);

        let text = generator
            .generate(
                "What is the price of an X-ray?",
                &[Document::new("X-ray: 350 EGP")],
                &ConversationHistory::new(),
                &guard(),
            )
            .await
            .unwrap();
        assert_eq!(text, "An X-ray costs 350 EGP.");
    }

    #[tokio::test]
    async fn test_identical_inputs_identical_prompts() {
        let fake = FakeCapabilitiesBuilder::new().build();
        let generator = AnswerGenerator::new(fake.capabilities().answer_writer);
        let docs = vec![Document::new("MRI: 2500 EGP")];
        let history = ConversationHistory::from_messages(vec![Message::user("hi")]);

        generator.generate("q", &docs, &history, &guard()).await.unwrap();
        generator.generate("q", &docs, &history, &guard()).await.unwrap();

        let prompts = fake.answer_writer().prompts();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0], prompts[1]);
    }

    #[tokio::test]
    async fn test_fallback_without_documents_says_so() {
        let fake = FakeCapabilitiesBuilder::new().build();
        let generator = FallbackGenerator::new(fake.capabilities().fallback_writer);

        generator
            .generate_fallback("Book me with Dr. X", &[], &ConversationHistory::new(), &guard())
            .await
            .unwrap();

        let prompt = &fake.fallback_writer().prompts()[0];
        assert!(prompt.contains(NO_SPECIFIC_CONTEXT));
    }

    #[tokio::test]
    async fn test_blank_fallback_is_error() {
        let fake = FakeCapabilitiesBuilder::new().fallback_answer("   ").build();
        let generator = FallbackGenerator::new(fake.capabilities().fallback_writer);

        let err = generator
            .generate_fallback("q", &[], &ConversationHistory::new(), &guard())
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::EmptyAnswer { stage: Stage::Fallback }));
    }
}
