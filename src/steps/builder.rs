//! Step graph builder: pure derivation of an app's step list.
//!
//! `build_steps` is the single place the conditional step set is decided.
//! The emission order here *is* the canonical prerequisite order: a step can
//! start only when every step emitted before it is completed. There is no
//! separate ordering structure.

use super::model::{Environment, Framework, Platform, Step, StepCategory, StepId, StepStatus};

/// Derive the ordered step list for one app.
///
/// `framework` is `None` when the user has not chosen a framework yet at
/// registration time; the SDK section is then shaped like the shared
/// cross-platform triple (the framework choice later only records the
/// selection, it never reshapes an existing step list).
pub fn build_steps(
    platforms: &[Platform],
    framework: Option<Framework>,
    environment: Environment,
) -> Vec<Step> {
    let mut steps = Vec::new();

    let has_web = platforms.contains(&Platform::Web);
    let has_ios = platforms.contains(&Platform::Ios);
    let mobile: Vec<Platform> = {
        let mut seen = Vec::new();
        for p in platforms.iter().filter(|p| p.is_mobile()) {
            if !seen.contains(p) {
                seen.push(*p);
            }
        }
        seen
    };

    if has_web {
        steps.push(Step::new(StepId::WebSdkInstall, 2, StepCategory::Web));
        steps.push(Step::new(StepId::WebSdkInit, 2, StepCategory::Web));
    }

    if !mobile.is_empty() {
        let native = framework == Some(Framework::Native);
        if native {
            for platform in &mobile {
                let (category, install, init, deeplink) = match platform {
                    Platform::Ios => (
                        StepCategory::Ios,
                        StepId::IosSdkInstall,
                        StepId::IosSdkInit,
                        StepId::IosDeeplinkSetup,
                    ),
                    Platform::Android => (
                        StepCategory::Android,
                        StepId::AndroidSdkInstall,
                        StepId::AndroidSdkInit,
                        StepId::AndroidDeeplinkSetup,
                    ),
                    Platform::Web => unreachable!("web filtered out of mobile set"),
                };
                steps.push(Step::new(install, 2, category));
                steps.push(Step::new(init, 2, category));
                steps.push(Step::new(deeplink, 2, category));
            }
        } else {
            steps.push(Step::new(StepId::SdkInstall, 2, StepCategory::Unified));
            steps.push(Step::new(StepId::SdkInit, 2, StepCategory::Unified));
            steps.push(Step::new(StepId::DeeplinkSetup, 2, StepCategory::Unified));
        }
    }

    if has_web || !mobile.is_empty() {
        steps.push(Step::new(StepId::SdkTest, 2, StepCategory::General));
    }

    if environment == Environment::Production {
        steps.push(Step::new(StepId::TrackingLink, 3, StepCategory::General));
        steps.push(Step::new(StepId::DeeplinkTest, 3, StepCategory::General));
        steps.push(Step::new(StepId::EventTaxonomy, 3, StepCategory::General));
        steps.push(Step::new(StepId::ChannelSelect, 4, StepCategory::General));
        steps.push(Step::new(StepId::ChannelIntegration, 4, StepCategory::General));
        steps.push(Step::new(StepId::CostIntegration, 4, StepCategory::General));
        if has_ios {
            steps.push(Step::new(StepId::SkanIntegration, 4, StepCategory::Ios));
        }
        steps.push(Step::new(StepId::AttributionTest, 5, StepCategory::General));
        steps.push(Step::new(StepId::DataVerify, 5, StepCategory::General));
    }

    debug_assert!(steps.iter().all(|s| s.status == StepStatus::Pending));
    steps
}
