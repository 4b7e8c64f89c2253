//! Registered app entity and its tokens.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::WizardConfig;
use crate::protocol::{Conversation, PromptKind};
use crate::steps::{AdChannel, Environment, Framework, Platform, Step, StepId, StepStatus};

/// Identity fields committed at registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
    pub timezone: String,
    pub currency: String,
}

/// The three opaque tokens minted once per app at registration.
///
/// Never regenerated for the lifetime of the app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppTokens {
    pub app_token: String,
    pub sdk_key: String,
    pub signature_secret: String,
}

impl AppTokens {
    /// Mint three distinct tokens from the configured alphabet/length.
    /// Collisions at the default length are probability-negligible; the
    /// re-mint loop just makes distinctness unconditional.
    pub fn mint(config: &WizardConfig) -> Self {
        let app_token = mint_token(config);
        let mut sdk_key = mint_token(config);
        while sdk_key == app_token {
            sdk_key = mint_token(config);
        }
        let mut signature_secret = mint_token(config);
        while signature_secret == app_token || signature_secret == sdk_key {
            signature_secret = mint_token(config);
        }
        Self {
            app_token,
            sdk_key,
            signature_secret,
        }
    }
}

fn mint_token(config: &WizardConfig) -> String {
    let alphabet: Vec<char> = config.token_alphabet.chars().collect();
    let mut rng = rand::thread_rng();
    (0..config.token_length)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
        .collect()
}

/// One independently tracked app going through onboarding.
///
/// Owns its steps and conversation exclusively; no two apps share either.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredApp {
    pub id: Uuid,
    pub info: AppInfo,
    pub platforms: Vec<Platform>,
    pub environment: Environment,
    pub steps: Vec<Step>,
    pub current_phase: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<Framework>,
    pub channels: Vec<AdChannel>,
    pub tokens: AppTokens,
    pub conversation: Conversation,
    pub expanded: bool,
    /// The outstanding prompt in this app's conversation, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<PromptKind>,
}

impl RegisteredApp {
    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// First step in canonical order that is not yet completed.
    pub fn next_open_step(&self) -> Option<&Step> {
        self.steps.iter().find(|s| s.status != StepStatus::Completed)
    }

    /// First step currently marked in progress.
    pub fn in_progress_step(&self) -> Option<&Step> {
        self.steps
            .iter()
            .find(|s| s.status == StepStatus::InProgress)
    }

    /// Prerequisite check: every step strictly earlier in canonical order
    /// must be completed.
    pub fn can_start_step(&self, id: StepId) -> bool {
        for step in &self.steps {
            if step.id == id {
                return true;
            }
            if step.status != StepStatus::Completed {
                return false;
            }
        }
        // Step not in this app's graph at all.
        false
    }

    /// Set a step's status. Idempotent: re-setting the current status is a
    /// valid no-op; an id absent from this app's graph is ignored.
    pub fn set_step_status(&mut self, id: StepId, status: StepStatus) {
        match self.steps.iter_mut().find(|s| s.id == id) {
            Some(step) => {
                if step.status != status {
                    debug!(app = %self.id, step = %id, ?status, "Step status updated");
                    step.status = status;
                }
            }
            None => debug!(app = %self.id, step = %id, "Step not in graph; ignoring"),
        }
    }

    pub fn completed_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count()
    }

    pub fn all_steps_completed(&self) -> bool {
        self.completed_count() == self.steps.len()
    }
}
