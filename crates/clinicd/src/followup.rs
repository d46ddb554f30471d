//! FAQ follow-up rewrite.
//!
//! When the user clicked a canned FAQ question and then asks something
//! about the answer ("and on Fridays?"), the bare follow-up is meaningless
//! to the router. The question is rewritten once, at turn entry, into a
//! context block carrying the FAQ question, its standard answer and the
//! follow-up.

use clinic_shared::{ConversationHistory, Role};
use tracing::debug;

/// Marker that separates the static FAQ answer from its call-to-action
const ACTION_MARKER: &str = "\n\n🔹";

/// Canned FAQ prompts offered by the front desk
pub const DEFAULT_FAQ_QUESTIONS: &[&str] = &[
    "كيف يمكنني حجز موعد؟",
    "ما هي مواعيد الزيارة؟",
    "هل لديكم صيدلية؟",
    "ما هي التأمينات التي تقبلونها؟",
    "أين يقع المستشفى؟",
    "ما هي أوقات العمل؟",
    "ما هي العيادات المتوفرة؟",
    "أريد طلب سيارة إسعاف",
];

/// A follow-up detected in the history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaqContext {
    pub faq_question: String,
    pub faq_answer: String,
    pub follow_up: String,
}

impl FaqContext {
    /// Answer text before the call-to-action marker
    pub fn static_answer(&self) -> &str {
        match self.faq_answer.split_once(ACTION_MARKER) {
            Some((head, _)) => head,
            None => &self.faq_answer,
        }
    }

    /// Question text sent through the pipeline instead of the bare follow-up
    pub fn to_question(&self) -> String {
        format!(
            "Context: The user initially asked the common question: \"{}\"\n\n\
             Standard answer to the common question: {}\n\n\
             User's follow-up request: {}\n\n\
             Please provide a detailed and helpful answer that builds on the common \
             question's answer and addresses the user's specific request. Be practical \
             and actionable in your response.",
            self.faq_question,
            self.static_answer(),
            self.follow_up
        )
    }
}

/// Detects follow-ups to recent FAQ answers
#[derive(Debug, Clone)]
pub struct FollowUpDetector {
    questions: Vec<String>,
    lookback: usize,
}

impl Default for FollowUpDetector {
    fn default() -> Self {
        Self::new(
            DEFAULT_FAQ_QUESTIONS.iter().map(|q| q.to_string()).collect(),
            3,
        )
    }
}

impl FollowUpDetector {
    pub fn new(questions: Vec<String>, lookback: usize) -> Self {
        Self {
            questions: questions.into_iter().filter(|q| !q.trim().is_empty()).collect(),
            lookback,
        }
    }

    /// Detector that never rewrites
    pub fn disabled() -> Self {
        Self::new(Vec::new(), 0)
    }

    /// Look back over the most recent `lookback` positions for a
    /// user FAQ message immediately followed by an assistant reply.
    /// The newest match wins.
    pub fn detect(&self, question: &str, history: &ConversationHistory) -> Option<FaqContext> {
        if self.questions.is_empty() {
            return None;
        }
        let messages: Vec<_> = history
            .messages()
            .iter()
            .filter(|m| !m.content.trim().is_empty())
            .collect();
        if messages.len() < 2 {
            return None;
        }

        let lowest = messages.len().saturating_sub(self.lookback).max(1);
        for i in (lowest..messages.len()).rev() {
            let (user, assistant) = (messages[i - 1], messages[i]);
            if user.role != Role::User || assistant.role != Role::Assistant {
                continue;
            }
            if self.questions.iter().any(|faq| user.content.contains(faq.as_str())) {
                return Some(FaqContext {
                    faq_question: user.content.clone(),
                    faq_answer: assistant.content.clone(),
                    follow_up: question.to_string(),
                });
            }
        }
        None
    }

    /// The question to process this turn: rewritten if it follows an FAQ
    pub fn rewrite(&self, question: &str, history: &ConversationHistory) -> String {
        match self.detect(question, history) {
            Some(ctx) => {
                debug!("[ROUTE] follow-up to FAQ {:?}, rewriting question", ctx.faq_question);
                ctx.to_question()
            }
            None => question.to_string(),
        }
    }
}
