//! Seed store: the read-once key→JSON boundary consumed at wizard start.
//!
//! A hosting shell persists pre-wizard answers (`surveyAnswers`) and the
//! legal-terms acceptance flag (`termsAgreement`) as JSON strings. The
//! engine reads each key at most once to pre-populate the first
//! registration draft; it never writes back.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::steps::{Environment, Framework, Platform};

/// Keys the engine knows about.
pub mod keys {
    pub const SURVEY_ANSWERS: &str = "surveyAnswers";
    pub const TERMS_AGREEMENT: &str = "termsAgreement";
}

/// Survey answers collected before the wizard starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurveyAnswers {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    #[serde(default)]
    pub platforms: Vec<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<Framework>,
}

/// Simple key→JSON-string store.
#[derive(Debug, Clone, Default)]
pub struct SeedStore {
    entries: HashMap<String, String>,
}

impl SeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, json: impl Into<String>) {
        self.entries.insert(key.into(), json.into());
    }

    /// Consume the survey answers. Removes the entry so a second read sees
    /// nothing; malformed JSON is logged and treated as absent.
    pub fn take_survey_answers(&mut self) -> Option<SurveyAnswers> {
        let raw = self.entries.remove(keys::SURVEY_ANSWERS)?;
        match serde_json::from_str(&raw) {
            Ok(answers) => Some(answers),
            Err(e) => {
                warn!("Malformed surveyAnswers seed: {}", e);
                None
            }
        }
    }

    /// Consume the terms-agreement flag. Absent or malformed means false.
    pub fn take_terms_agreement(&mut self) -> bool {
        let Some(raw) = self.entries.remove(keys::TERMS_AGREEMENT) else {
            return false;
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Malformed termsAgreement seed: {}", e);
            false
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn survey_answers_parse_and_are_consumed() {
        let mut store = SeedStore::new();
        store.insert(
            keys::SURVEY_ANSWERS,
            r#"{"environment":"production","platforms":["ios","web"],"framework":"flutter"}"#,
        );

        let answers = store.take_survey_answers().unwrap();
        assert_eq!(answers.environment, Some(Environment::Production));
        assert_eq!(answers.platforms, vec![Platform::Ios, Platform::Web]);
        assert_eq!(answers.framework, Some(Framework::Flutter));

        // Read-once: second take sees nothing.
        assert!(store.take_survey_answers().is_none());
    }

    #[test]
    fn malformed_survey_treated_as_absent() {
        let mut store = SeedStore::new();
        store.insert(keys::SURVEY_ANSWERS, "{not json");
        assert!(store.take_survey_answers().is_none());
    }

    #[test]
    fn terms_agreement_defaults_false() {
        let mut store = SeedStore::new();
        assert!(!store.take_terms_agreement());

        store.insert(keys::TERMS_AGREEMENT, "true");
        assert!(store.take_terms_agreement());
        assert!(!store.take_terms_agreement());
    }

    #[test]
    fn partial_survey_fills_defaults() {
        let mut store = SeedStore::new();
        store.insert(keys::SURVEY_ANSWERS, r#"{"environment":"dev"}"#);
        let answers = store.take_survey_answers().unwrap();
        assert_eq!(answers.environment, Some(Environment::Dev));
        assert!(answers.platforms.is_empty());
        assert!(answers.framework.is_none());
    }
}
