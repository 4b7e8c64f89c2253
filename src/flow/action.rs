//! User actions reported back by the render boundary.

use uuid::Uuid;

use crate::protocol::StoreSearchResult;
use crate::steps::{AdChannel, Environment, Framework, Platform, StepId};

/// Everything a user can do to the wizard.
///
/// Structured variants resolve the pending prompt of the active
/// app/session; `FreeText`, `Skip`, `StepClicked`, and `CopyToken` are
/// accepted at any time.
#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    SelectEnvironment(Environment),
    SelectPlatforms(Vec<Platform>),
    EnterAppName(String),
    SubmitSearch { query: String },
    SelectSearchResult(StoreSearchResult),
    EnterManualApp {
        name: String,
        store_id: Option<String>,
    },
    SelectFramework(Framework),
    SelectChannels(Vec<AdChannel>),
    VerifySdk { installed: bool },
    /// Generic acknowledgement of the current guide/confirm prompt.
    Continue,
    AddAnotherApp,
    /// Commit whatever partial answers exist and end the current flow.
    Skip,
    StepClicked { app_id: Uuid, step: StepId },
    CopyToken(String),
    FreeText(String),
}

impl UserAction {
    /// Actions that bypass the single-pending-prompt gate.
    pub fn bypasses_pending_gate(&self) -> bool {
        matches!(
            self,
            Self::FreeText(_) | Self::Skip | Self::StepClicked { .. } | Self::CopyToken(_)
        )
    }
}
