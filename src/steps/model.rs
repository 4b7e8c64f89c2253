//! Step and platform vocabulary for the onboarding graph.

use serde::{Deserialize, Serialize};

/// A product platform being onboarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    Web,
}

impl Platform {
    pub fn is_mobile(&self) -> bool {
        matches!(self, Self::Ios | Self::Android)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ios => "ios",
            Self::Android => "android",
            Self::Web => "web",
        };
        write!(f, "{s}")
    }
}

/// Development framework the SDK is integrated with.
///
/// `Native` means platform-native tooling (Swift/Kotlin); everything else
/// is a cross-platform framework sharing one SDK integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framework {
    Native,
    ReactNative,
    Flutter,
    Expo,
    Unity,
}

impl Framework {
    pub fn is_cross_platform(&self) -> bool {
        !matches!(self, Self::Native)
    }
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Native => "native",
            Self::ReactNative => "react-native",
            Self::Flutter => "flutter",
            Self::Expo => "expo",
            Self::Unity => "unity",
        };
        write!(f, "{s}")
    }
}

/// Target environment for the integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dev => write!(f, "dev"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// An advertising channel available for integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdChannel {
    Meta,
    GoogleAds,
    TikTok,
    AppleSearchAds,
    Snapchat,
}

impl AdChannel {
    /// Every channel the wizard can offer.
    pub fn all() -> Vec<AdChannel> {
        vec![
            Self::Meta,
            Self::GoogleAds,
            Self::TikTok,
            Self::AppleSearchAds,
            Self::Snapchat,
        ]
    }
}

impl std::fmt::Display for AdChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Meta => "meta",
            Self::GoogleAds => "google-ads",
            Self::TikTok => "tiktok",
            Self::AppleSearchAds => "apple-search-ads",
            Self::Snapchat => "snapchat",
        };
        write!(f, "{s}")
    }
}

/// Fixed vocabulary of step identifiers.
///
/// Which subset an app carries, and in what order, is decided once at
/// registration by [`build_steps`](crate::steps::build_steps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepId {
    WebSdkInstall,
    WebSdkInit,
    SdkInstall,
    SdkInit,
    DeeplinkSetup,
    IosSdkInstall,
    IosSdkInit,
    IosDeeplinkSetup,
    AndroidSdkInstall,
    AndroidSdkInit,
    AndroidDeeplinkSetup,
    SdkTest,
    TrackingLink,
    DeeplinkTest,
    EventTaxonomy,
    ChannelSelect,
    ChannelIntegration,
    CostIntegration,
    SkanIntegration,
    AttributionTest,
    DataVerify,
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::WebSdkInstall => "web-sdk-install",
            Self::WebSdkInit => "web-sdk-init",
            Self::SdkInstall => "sdk-install",
            Self::SdkInit => "sdk-init",
            Self::DeeplinkSetup => "deeplink-setup",
            Self::IosSdkInstall => "ios-sdk-install",
            Self::IosSdkInit => "ios-sdk-init",
            Self::IosDeeplinkSetup => "ios-deeplink-setup",
            Self::AndroidSdkInstall => "android-sdk-install",
            Self::AndroidSdkInit => "android-sdk-init",
            Self::AndroidDeeplinkSetup => "android-deeplink-setup",
            Self::SdkTest => "sdk-test",
            Self::TrackingLink => "tracking-link",
            Self::DeeplinkTest => "deeplink-test",
            Self::EventTaxonomy => "event-taxonomy",
            Self::ChannelSelect => "channel-select",
            Self::ChannelIntegration => "channel-integration",
            Self::CostIntegration => "cost-integration",
            Self::SkanIntegration => "skan-integration",
            Self::AttributionTest => "attribution-test",
            Self::DataVerify => "data-verify",
        };
        write!(f, "{s}")
    }
}

/// Status of a single onboarding step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
}

impl Default for StepStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Which platform bucket a step belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepCategory {
    Web,
    /// Shared across mobile platforms (cross-platform frameworks).
    Unified,
    Ios,
    Android,
    General,
}

/// One unit of onboarding work.
///
/// Steps are materialized once per app at registration and never deleted;
/// only `status` mutates afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    /// Coarse grouping: 1 registration, 2 SDK setup, 3 event design,
    /// 4 channel integration, 5 verification.
    pub phase: u8,
    pub title: String,
    pub description: String,
    pub status: StepStatus,
    pub category: StepCategory,
}

impl Step {
    pub fn new(id: StepId, phase: u8, category: StepCategory) -> Self {
        let (title, description) = copy_for(id);
        Self {
            id,
            phase,
            title: title.to_string(),
            description: description.to_string(),
            status: StepStatus::Pending,
            category,
        }
    }
}

/// Static title/description copy per step id.
fn copy_for(id: StepId) -> (&'static str, &'static str) {
    match id {
        StepId::WebSdkInstall => ("Install web SDK", "Add the web SDK snippet to your site"),
        StepId::WebSdkInit => ("Initialize web SDK", "Initialize the SDK with your app token"),
        StepId::SdkInstall => ("Install SDK", "Add the SDK package to your project"),
        StepId::SdkInit => ("Initialize SDK", "Initialize the SDK with your app token"),
        StepId::DeeplinkSetup => ("Set up deep links", "Configure deep linking for your app"),
        StepId::IosSdkInstall => ("Install iOS SDK", "Add the SDK to your Xcode project"),
        StepId::IosSdkInit => ("Initialize iOS SDK", "Initialize the SDK in your AppDelegate"),
        StepId::IosDeeplinkSetup => (
            "Set up iOS deep links",
            "Configure universal links and URL schemes",
        ),
        StepId::AndroidSdkInstall => ("Install Android SDK", "Add the SDK to your Gradle build"),
        StepId::AndroidSdkInit => (
            "Initialize Android SDK",
            "Initialize the SDK in your Application class",
        ),
        StepId::AndroidDeeplinkSetup => (
            "Set up Android deep links",
            "Configure app links and intent filters",
        ),
        StepId::SdkTest => ("Test SDK integration", "Verify the SDK reports to the dashboard"),
        StepId::TrackingLink => ("Create a tracking link", "Build your first tracking link"),
        StepId::DeeplinkTest => ("Test deep links", "Open the app through a tracking link"),
        StepId::EventTaxonomy => ("Design event taxonomy", "Decide which in-app events to measure"),
        StepId::ChannelSelect => ("Choose ad channels", "Pick the channels you advertise on"),
        StepId::ChannelIntegration => (
            "Integrate ad channels",
            "Connect each selected channel to the dashboard",
        ),
        StepId::CostIntegration => ("Enable cost data", "Import spend data from your channels"),
        StepId::SkanIntegration => (
            "Configure SKAdNetwork",
            "Set up SKAN conversion values for iOS",
        ),
        StepId::AttributionTest => ("Test attribution", "Run an end-to-end attribution check"),
        StepId::DataVerify => ("Verify your data", "Confirm dashboard numbers look right"),
    }
}
