//! Guided task-creation dialogue.

pub mod engine;
pub mod state;

pub use engine::{DialogueEngine, DialogueOutcome};
pub use state::{DialogueSession, DialogueState};
