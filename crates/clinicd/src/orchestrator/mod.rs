//! Turn orchestration.
//!
//! `state` holds the per-turn record and the pure transition function,
//! `engine` runs the stages against the capabilities.
//!
//! Invariants:
//! - One `RequestState` per turn, owned by that turn only
//! - `retry_count` only grows; at most `max(max_retries, 1)` generations
//! - The fallback lane is never verified

pub mod engine;
pub mod state;

pub use engine::{Orchestrator, OrchestratorConfig};
pub use state::{RequestState, DEFAULT_MAX_RETRIES};
