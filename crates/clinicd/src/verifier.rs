//! Grounding verifier.
//!
//! Two checks, short-circuited: grounding first, usefulness only when the
//! answer is grounded. A fabricated answer is never graded for usefulness.

use crate::capabilities::{GroundingGrader, UsefulnessGrader};
use crate::guard::CallGuard;
use clinic_shared::{DeskError, Document, Grade, Stage, VerificationOutcome};
use std::sync::Arc;
use tracing::{info, warn};

pub struct GroundingVerifier {
    grounding: Arc<dyn GroundingGrader>,
    usefulness: Arc<dyn UsefulnessGrader>,
}

impl GroundingVerifier {
    pub fn new(grounding: Arc<dyn GroundingGrader>, usefulness: Arc<dyn UsefulnessGrader>) -> Self {
        Self {
            grounding,
            usefulness,
        }
    }

    pub async fn verify(
        &self,
        question: &str,
        documents: &[Document],
        answer: &str,
        guard: &CallGuard,
    ) -> Result<VerificationOutcome, DeskError> {
        let grounded = guard
            .call(
                Stage::Verify,
                self.grounding.grade_grounding(documents, answer),
            )
            .await?;

        if !affirmative(&grounded, "grounding") {
            info!("{} answer is NOT grounded in documents", Stage::Verify.tag());
            return Ok(VerificationOutcome::NotGrounded);
        }

        let useful = guard
            .call(
                Stage::Verify,
                self.usefulness.grade_usefulness(question, answer),
            )
            .await?;

        let outcome = if affirmative(&useful, "usefulness") {
            VerificationOutcome::GroundedUseful
        } else {
            VerificationOutcome::GroundedNotUseful
        };
        info!("{} outcome={}", Stage::Verify.tag(), outcome);
        Ok(outcome)
    }
}

fn affirmative(grade: &Grade, check: &str) -> bool {
    if let Grade::Unparsed(raw) = grade {
        warn!(
            "{} unrecognised {} grade {:?}, treating as negative",
            Stage::Verify.tag(),
            check,
            raw
        );
    }
    grade.is_affirmative()
}
