//! Payload union: the typed content of every conversation turn.
//!
//! Each variant carries exactly the data its interactive widget needs and
//! nothing about rendering. The union is closed: a renderer matches it
//! exhaustively, so adding a variant is a compile-time exhaustiveness
//! failure at the render boundary rather than a runtime default case.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::steps::{AdChannel, Environment, Framework, Platform, StepId};

/// One app-store search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSearchResult {
    pub name: String,
    pub store_id: String,
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

/// Data block for the final completion summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionData {
    pub app_name: String,
    pub platforms: Vec<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<Framework>,
    pub channels: Vec<AdChannel>,
    pub completed_steps: usize,
    pub total_steps: usize,
    /// Completed/total across every registered app; 0.0 when nothing exists.
    pub overall_progress: f64,
}

/// The kind of decision a prompt payload is waiting on.
///
/// The flow controller keeps at most one of these outstanding per
/// app/session; any action that does not resolve it is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptKind {
    EnvironmentSelect,
    AppNameInput,
    PlatformMultiSelect,
    PlatformRegistration,
    AppSearchResults,
    TimezoneCurrencyConfirm,
    TokenDisplay,
    SdkInstallChoice,
    FrameworkSelect,
    SdkInstallGuide,
    SdkInitCode,
    WebSdkInstall,
    WebSdkInit,
    DeeplinkSetup,
    SdkVerify,
    TrackingLink,
    DeeplinkTest,
    EventTaxonomy,
    ChannelSelect,
    ChannelIntegration,
    CostIntegration,
    SkanIntegration,
    AttributionTest,
    DataVerify,
    AddAnotherApp,
}

/// A typed data packet attached to a chat turn.
///
/// Bot-side variants narrate state or pose a decision; user-side variants
/// record the resolving answer. Serialized with a `type` tag so a renderer
/// or transcript consumer can dispatch on the kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Payload {
    // ── Bot: registration ───────────────────────────────────────────
    Welcome,
    EnvironmentSelect,
    AppNameInput {
        environment: Environment,
    },
    PlatformMultiSelect {
        options: Vec<Platform>,
    },
    PlatformRegistration {
        platform: Platform,
        index: usize,
        total: usize,
    },
    AppSearchLoading {
        query: String,
        platform: Platform,
    },
    AppSearchResults {
        query: String,
        platform: Platform,
        results: Vec<StoreSearchResult>,
    },
    TimezoneCurrencyConfirm {
        timezone: String,
        currency: String,
        app_name: String,
    },
    TokenDisplay {
        app_name: String,
        app_token: String,
        sdk_key: String,
        signature_secret: String,
    },

    // ── Bot: SDK setup ──────────────────────────────────────────────
    SdkInstallChoice {
        platforms: Vec<Platform>,
    },
    FrameworkSelect {
        options: Vec<Framework>,
    },
    SdkInstallGuide {
        framework: Framework,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        platform: Option<Platform>,
    },
    SdkInitCode {
        app_name: String,
        app_token: String,
        framework: Framework,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        platform: Option<Platform>,
        snippet: String,
    },
    WebSdkInstallGuide {
        snippet: String,
    },
    WebSdkInitCode {
        app_token: String,
        snippet: String,
    },
    DeeplinkSetupGuide {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        platform: Option<Platform>,
        scheme: String,
    },
    SdkTestPrompt {
        app_name: String,
    },
    DetectionLoading {
        app_token: String,
    },
    DetectionResult {
        detected: bool,
    },

    // ── Bot: production tail ────────────────────────────────────────
    TrackingLinkGuide,
    TrackingLinkDisplay {
        url: String,
    },
    DeeplinkTestPrompt {
        scheme: String,
    },
    EventTaxonomyIntro,
    EventTaxonomyTable {
        events: Vec<String>,
    },
    ChannelSelect {
        options: Vec<AdChannel>,
    },
    ChannelIntegrationGuide {
        channel: AdChannel,
    },
    CostIntegrationGuide,
    SkanIntegrationGuide,
    AttributionTestPrompt,
    DataVerifyGuide,

    // ── Bot: summaries and chrome ───────────────────────────────────
    DevCompletionSummary {
        app_name: String,
        completed_steps: usize,
        total_steps: usize,
    },
    CompletionSummary {
        data: CompletionData,
    },
    Acknowledgement {
        text: String,
    },
    RetryPrompt {
        operation: String,
        reason: String,
    },
    AddAnotherApp,
    PhaseHeader {
        phase: u8,
        title: String,
    },
    Text {
        body: String,
    },

    // ── User answers ────────────────────────────────────────────────
    UserText {
        body: String,
    },
    EnvironmentChoice {
        environment: Environment,
    },
    PlatformChoices {
        platforms: Vec<Platform>,
    },
    AppNameEntry {
        name: String,
    },
    SearchQuery {
        query: String,
        platform: Platform,
    },
    AppSelected {
        result: StoreSearchResult,
    },
    ManualAppDetails {
        platform: Platform,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        store_id: Option<String>,
    },
    Confirmation {
        accepted: bool,
    },
    FrameworkChoice {
        framework: Framework,
    },
    ChannelChoices {
        channels: Vec<AdChannel>,
    },
    VerifyAnswer {
        installed: bool,
    },
    StepClicked {
        step: StepId,
    },
    SkipNotice,
    TokenCopied,
}

impl Payload {
    /// Per-platform registration prompt. The only constructor with an
    /// invalid field combination a well-typed caller could still produce.
    pub fn platform_registration(
        platform: Platform,
        index: usize,
        total: usize,
    ) -> Result<Self, ValidationError> {
        if index >= total {
            return Err(ValidationError::IndexOutOfRange { index, total });
        }
        Ok(Self::PlatformRegistration {
            platform,
            index,
            total,
        })
    }

    /// Whether this payload merely narrates (no decision required).
    pub fn is_narration(&self) -> bool {
        matches!(
            self,
            Self::Welcome
                | Self::AppSearchLoading { .. }
                | Self::DetectionLoading { .. }
                | Self::DetectionResult { .. }
                | Self::Acknowledgement { .. }
                | Self::PhaseHeader { .. }
                | Self::Text { .. }
                | Self::TrackingLinkDisplay { .. }
                | Self::EventTaxonomyIntro
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_serde_uses_type_tag() {
        let payload = Payload::EnvironmentSelect;
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "environment-select");
    }

    #[test]
    fn platform_registration_validates_index() {
        let ok = Payload::platform_registration(Platform::Ios, 0, 2);
        assert!(ok.is_ok());

        let err = Payload::platform_registration(Platform::Ios, 2, 2);
        assert!(matches!(
            err,
            Err(ValidationError::IndexOutOfRange { index: 2, total: 2 })
        ));
    }

    #[test]
    fn tagged_roundtrip_with_fields() {
        let payload = Payload::SdkInitCode {
            app_name: "Candy Crush".to_string(),
            app_token: "a1b2c3".to_string(),
            framework: Framework::Flutter,
            platform: None,
            snippet: "Sdk.init(token)".to_string(),
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"type\":\"sdk-init-code\""));
        let parsed: Payload = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, payload);
    }

    #[test]
    fn narration_classification() {
        assert!(Payload::Welcome.is_narration());
        assert!(Payload::DetectionResult { detected: true }.is_narration());
        assert!(!Payload::EnvironmentSelect.is_narration());
        assert!(
            !Payload::ChannelSelect {
                options: AdChannel::all()
            }
            .is_narration()
        );
    }

    #[test]
    fn search_result_optional_icon() {
        let json = r#"{"name":"Candy","store_id":"id123","platform":"ios"}"#;
        let parsed: StoreSearchResult = serde_json::from_str(json).unwrap();
        assert!(parsed.icon_url.is_none());
        assert_eq!(parsed.platform, Platform::Ios);
    }
}
