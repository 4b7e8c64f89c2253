//! Registration session draft: transient answers for one new app.
//!
//! Exists only while a new app is being registered; consumed and cleared
//! exactly when the app is committed to the registry.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::protocol::{Conversation, PromptKind};
use crate::registry::AppInfo;
use crate::seed::SurveyAnswers;
use crate::steps::{AdChannel, Environment, Framework, Platform};

const DEFAULT_TIMEZONE: &str = "UTC";
const DEFAULT_CURRENCY: &str = "USD";

/// Per-platform identity collected during registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub platform: Platform,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
}

/// Draft state for the app currently being registered.
#[derive(Debug, Default)]
pub struct SessionDraft {
    pub environment: Option<Environment>,
    pub platforms: Vec<Platform>,
    pub current_platform_index: usize,
    pub platform_infos: Vec<PlatformInfo>,
    pub app_name: Option<String>,
    pub framework: Option<Framework>,
    pub channels: Vec<AdChannel>,
    pub timezone: String,
    pub currency: String,
    pub conversation: Conversation,
    pub pending: Option<PromptKind>,
}

impl SessionDraft {
    pub fn new() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            ..Self::default()
        }
    }

    /// Pre-populate from survey answers captured before the wizard started.
    pub fn from_seed(answers: &SurveyAnswers) -> Self {
        let mut draft = Self::new();
        draft.environment = answers.environment;
        draft.platforms = answers.platforms.clone();
        draft.framework = answers.framework;
        draft
    }

    /// Platform whose registration prompt is currently active.
    pub fn current_platform(&self) -> Option<Platform> {
        self.platforms.get(self.current_platform_index).copied()
    }

    /// Whether every selected platform has collected its info.
    pub fn all_platforms_registered(&self) -> bool {
        self.current_platform_index >= self.platforms.len()
    }

    /// The display name the committed app will carry: an explicit dev-flow
    /// name wins, otherwise the first registered platform's store listing.
    pub fn resolved_name(&self) -> Option<String> {
        self.app_name
            .clone()
            .or_else(|| self.platform_infos.first().map(|i| i.name.clone()))
    }

    /// Build the committed `AppInfo`. Fails when no name was collected.
    pub fn app_info(&self) -> Result<AppInfo, ValidationError> {
        let name = self
            .resolved_name()
            .ok_or(ValidationError::EmptyField { field: "app_name" })?;
        Ok(AppInfo {
            name,
            store_id: self
                .platform_infos
                .first()
                .and_then(|i| i.store_id.clone()),
            timezone: self.timezone.clone(),
            currency: self.currency.clone(),
        })
    }
}

/// Validate a user-entered app name. Blocks only the local submit.
pub fn validate_app_name(name: &str) -> Result<(), ValidationError> {
    static NAME_RE: OnceLock<Regex> = OnceLock::new();
    let re = NAME_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 ._\-]*$").expect("static pattern")
    });

    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField { field: "app_name" });
    }
    if !re.is_match(trimmed) {
        return Err(ValidationError::InvalidCharacters {
            field: "app_name",
            value: name.to_string(),
        });
    }
    Ok(())
}
