//! Error types for the onboarding engine.

use uuid::Uuid;

use crate::protocol::PromptKind;
use crate::steps::StepId;

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Dialogue-flow errors.
///
/// `InvalidTransition` and `UnmetPrerequisite` are recoverable rejections:
/// the flow controller swallows them (no state mutation, debug log) and the
/// renderer may use them to show a disabled affordance. They are never
/// surfaced as conversation turns.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("Action does not resolve the pending prompt {expected:?}")]
    InvalidTransition { expected: Option<PromptKind> },

    #[error("Step {step} cannot start: {missing} is not completed")]
    UnmetPrerequisite { step: StepId, missing: StepId },

    #[error("No app registered with id {id}")]
    UnknownApp { id: Uuid },

    #[error("No registration session is active")]
    NoActiveSession,

    #[error("No app is active")]
    NoActiveApp,
}

/// Malformed user input. Blocks only the local submit action; never
/// produces a conversation turn and never mutates flow state.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Required field is empty: {field}")]
    EmptyField { field: &'static str },

    #[error("Invalid characters in {field}: {value:?}")]
    InvalidCharacters { field: &'static str, value: String },

    #[error("Index {index} out of range for total {total}")]
    IndexOutOfRange { index: usize, total: usize },

    #[error("Selection must not be empty: {field}")]
    EmptySelection { field: &'static str },
}

/// External provider failures. The flow controller degrades these to a
/// user-facing retry prompt; retry is user-initiated.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Store search failed: {0}")]
    SearchFailed(String),

    #[error("SDK registration detection failed: {0}")]
    DetectionFailed(String),

    #[error("Clipboard write failed: {0}")]
    Clipboard(String),
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
