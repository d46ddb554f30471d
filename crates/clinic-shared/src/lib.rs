//! Shared types for the clinic service desk: conversation model, evidence
//! documents, routing/verification decisions, turn trace and errors.

pub mod conversation;
pub mod decision;
pub mod document;
pub mod error;
pub mod trace;
pub mod turn;

pub use conversation::{
    ConversationHistory, Message, Role, HISTORY_WINDOW, NO_PREVIOUS_CONVERSATION,
};
pub use decision::{Grade, RouteDecision, RouteLabel, VerificationOutcome};
pub use document::{render_documents, Document, NO_SPECIFIC_CONTEXT};
pub use error::DeskError;
pub use trace::{Stage, StageOutcome, TraceEvent, TurnTrace};
pub use turn::{TurnReply, TurnResult, TECHNICAL_DIFFICULTY};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
