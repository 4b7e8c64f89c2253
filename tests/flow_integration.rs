//! End-to-end wizard walks against the public API, with the instant
//! provider standing in for store/dashboard round-trips.

use std::sync::Arc;

use sdk_onboarding::WizardConfig;
use sdk_onboarding::flow::{FlowController, FlowOutcome, UserAction};
use sdk_onboarding::protocol::{Payload, PromptKind};
use sdk_onboarding::providers::InstantProvider;
use sdk_onboarding::steps::{AdChannel, Environment, Framework, Platform, StepId, StepStatus};

fn controller() -> FlowController {
    FlowController::new(
        WizardConfig::instant(),
        Arc::new(InstantProvider::default()),
    )
}

async fn act(fc: &mut FlowController, action: UserAction) -> FlowOutcome {
    fc.handle(action).await.expect("action should be accepted")
}

fn has_payload(outcome: &FlowOutcome, pred: impl Fn(&Payload) -> bool) -> bool {
    outcome.payloads.iter().any(pred)
}

/// Walk a dev web app from the first prompt to the sandbox summary. The
/// production tail must never appear.
#[tokio::test]
async fn dev_web_flow_reaches_sandbox_summary() {
    let mut fc = controller();
    fc.start().await;

    act(&mut fc, UserAction::SelectEnvironment(Environment::Dev)).await;
    act(&mut fc, UserAction::EnterAppName("My Web App".into())).await;
    act(&mut fc, UserAction::SelectPlatforms(vec![Platform::Web])).await;
    assert_eq!(fc.pending(), Some(PromptKind::TimezoneCurrencyConfirm));

    // Commit.
    let outcome = act(&mut fc, UserAction::Continue).await;
    let app_id = outcome.committed_app.expect("registration committed");
    assert!(has_payload(&outcome, |p| {
        matches!(p, Payload::TokenDisplay { .. })
    }));

    // Web install, web init, then the live test.
    let outcome = act(&mut fc, UserAction::Continue).await;
    assert!(has_payload(&outcome, |p| {
        matches!(p, Payload::PhaseHeader { phase: 2, .. })
    }));
    assert!(has_payload(&outcome, |p| {
        matches!(p, Payload::WebSdkInstallGuide { .. })
    }));

    let outcome = act(&mut fc, UserAction::Continue).await;
    assert!(has_payload(&outcome, |p| {
        matches!(p, Payload::WebSdkInitCode { .. })
    }));

    let outcome = act(&mut fc, UserAction::Continue).await;
    assert!(has_payload(&outcome, |p| {
        matches!(p, Payload::SdkTestPrompt { .. })
    }));
    assert_eq!(fc.pending(), Some(PromptKind::SdkVerify));

    let outcome = act(&mut fc, UserAction::VerifySdk { installed: true }).await;
    assert!(has_payload(&outcome, |p| {
        matches!(p, Payload::DevCompletionSummary { .. })
    }));
    assert_eq!(fc.pending(), Some(PromptKind::AddAnotherApp));

    let app = fc.registry().get(app_id).unwrap();
    assert_eq!(app.steps.len(), 3);
    assert!(app.all_steps_completed());
    // Dev apps never get the production tail.
    assert!(app.step(StepId::ChannelSelect).is_none());
    for message in app.conversation.messages() {
        assert!(
            !message
                .content
                .iter()
                .any(|p| matches!(p, Payload::ChannelSelect { .. })),
            "dev flow must never prompt for channels"
        );
    }
}

/// Full production walk: two platforms, flutter, channels, through the
/// final summary with every step completed.
#[tokio::test]
async fn production_flow_completes_all_thirteen_steps() {
    let mut fc = controller();
    fc.start().await;

    act(
        &mut fc,
        UserAction::SelectEnvironment(Environment::Production),
    )
    .await;
    let outcome = act(
        &mut fc,
        UserAction::SelectPlatforms(vec![Platform::Ios, Platform::Android]),
    )
    .await;
    assert!(has_payload(&outcome, |p| {
        matches!(
            p,
            Payload::PlatformRegistration {
                platform: Platform::Ios,
                index: 0,
                total: 2,
            }
        )
    }));

    // Manual entry for both store listings.
    let outcome = act(
        &mut fc,
        UserAction::EnterManualApp {
            name: "Candy Crush".into(),
            store_id: Some("id123456".into()),
        },
    )
    .await;
    assert!(has_payload(&outcome, |p| {
        matches!(
            p,
            Payload::PlatformRegistration {
                platform: Platform::Android,
                index: 1,
                total: 2,
            }
        )
    }));
    act(
        &mut fc,
        UserAction::EnterManualApp {
            name: "Candy Crush".into(),
            store_id: Some("com.candy.crush".into()),
        },
    )
    .await;
    assert_eq!(fc.pending(), Some(PromptKind::TimezoneCurrencyConfirm));

    let outcome = act(&mut fc, UserAction::Continue).await;
    let app_id = outcome.committed_app.expect("registration committed");
    assert_eq!(fc.registry().get(app_id).unwrap().steps.len(), 13);

    // SDK install runs through the framework choice.
    let outcome = act(&mut fc, UserAction::Continue).await;
    assert!(has_payload(&outcome, |p| {
        matches!(p, Payload::SdkInstallChoice { .. })
    }));
    let outcome = act(&mut fc, UserAction::Continue).await;
    assert!(has_payload(&outcome, |p| {
        matches!(p, Payload::FrameworkSelect { .. })
    }));
    let outcome = act(&mut fc, UserAction::SelectFramework(Framework::Flutter)).await;
    assert!(has_payload(&outcome, |p| {
        matches!(
            p,
            Payload::SdkInitCode {
                framework: Framework::Flutter,
                platform: None,
                ..
            }
        )
    }));
    {
        let app = fc.registry().get(app_id).unwrap();
        assert_eq!(
            app.step(StepId::SdkInstall).unwrap().status,
            StepStatus::Completed
        );
        assert_eq!(
            app.step(StepId::SdkInit).unwrap().status,
            StepStatus::InProgress
        );
    }

    act(&mut fc, UserAction::Continue).await; // init done -> deeplink setup
    act(&mut fc, UserAction::Continue).await; // deeplink done -> sdk test
    assert_eq!(fc.pending(), Some(PromptKind::SdkVerify));

    // Detection succeeds and opens phase 3.
    let outcome = act(&mut fc, UserAction::VerifySdk { installed: true }).await;
    assert!(has_payload(&outcome, |p| {
        matches!(p, Payload::PhaseHeader { phase: 3, .. })
    }));
    assert!(has_payload(&outcome, |p| {
        matches!(p, Payload::TrackingLinkDisplay { .. })
    }));

    act(&mut fc, UserAction::Continue).await; // tracking link -> deeplink test
    act(&mut fc, UserAction::Continue).await; // -> event taxonomy
    let outcome = act(&mut fc, UserAction::Continue).await; // -> channel select
    assert!(has_payload(&outcome, |p| {
        matches!(p, Payload::PhaseHeader { phase: 4, .. })
    }));
    assert_eq!(fc.pending(), Some(PromptKind::ChannelSelect));

    let outcome = act(
        &mut fc,
        UserAction::SelectChannels(vec![AdChannel::Meta, AdChannel::TikTok]),
    )
    .await;
    assert_eq!(
        outcome
            .payloads
            .iter()
            .filter(|p| matches!(p, Payload::ChannelIntegrationGuide { .. }))
            .count(),
        2
    );

    act(&mut fc, UserAction::Continue).await; // channels linked -> cost
    let outcome = act(&mut fc, UserAction::Continue).await; // cost -> skan (ios present)
    assert!(has_payload(&outcome, |p| {
        matches!(p, Payload::SkanIntegrationGuide)
    }));
    let outcome = act(&mut fc, UserAction::Continue).await; // skan -> attribution test
    assert!(has_payload(&outcome, |p| {
        matches!(p, Payload::PhaseHeader { phase: 5, .. })
    }));
    act(&mut fc, UserAction::Continue).await; // attribution -> data verify
    let outcome = act(&mut fc, UserAction::Continue).await; // data verify -> summary

    let summary = outcome
        .payloads
        .iter()
        .find_map(|p| match p {
            Payload::CompletionSummary { data } => Some(data.clone()),
            _ => None,
        })
        .expect("final summary emitted");
    assert_eq!(summary.app_name, "Candy Crush");
    assert_eq!(summary.completed_steps, 13);
    assert_eq!(summary.total_steps, 13);
    assert_eq!(summary.channels, vec![AdChannel::Meta, AdChannel::TikTok]);
    assert!((summary.overall_progress - 1.0).abs() < f64::EPSILON);

    let app = fc.registry().get(app_id).unwrap();
    assert!(app.all_steps_completed());
    assert_eq!(fc.pending(), Some(PromptKind::AddAnotherApp));
}

#[tokio::test]
async fn registration_commit_is_atomic() {
    let mut fc = controller();
    fc.start().await;
    act(&mut fc, UserAction::SelectEnvironment(Environment::Dev)).await;
    act(&mut fc, UserAction::EnterAppName("Atomic".into())).await;
    act(&mut fc, UserAction::SelectPlatforms(vec![Platform::Ios])).await;
    assert!(fc.registry().is_empty());

    let outcome = act(&mut fc, UserAction::Continue).await;
    let app_id = outcome.committed_app.unwrap();

    // One new app with steps, tokens, and ownership of the transcript;
    // the draft is gone.
    assert_eq!(fc.registry().len(), 1);
    assert!(fc.session().is_none());
    assert_eq!(fc.active_app(), Some(app_id));

    let app = fc.registry().get(app_id).unwrap();
    assert!(!app.steps.is_empty());
    assert!(!app.conversation.is_empty());
    assert!(!app.tokens.app_token.is_empty());
    assert_ne!(app.tokens.app_token, app.tokens.sdk_key);
    assert_ne!(app.tokens.sdk_key, app.tokens.signature_secret);
}

#[tokio::test]
async fn answers_for_other_prompts_are_rejected_without_mutation() {
    let mut fc = controller();
    fc.start().await;
    act(&mut fc, UserAction::SelectEnvironment(Environment::Dev)).await;
    act(&mut fc, UserAction::EnterAppName("Gate Test".into())).await;
    act(&mut fc, UserAction::SelectPlatforms(vec![Platform::Web])).await;

    let len_before = fc.session().unwrap().conversation.len();
    let outcome = fc
        .handle(UserAction::SelectFramework(Framework::Unity))
        .await
        .unwrap();
    assert!(outcome.ignored);
    assert_eq!(fc.pending(), Some(PromptKind::TimezoneCurrencyConfirm));
    assert_eq!(fc.session().unwrap().conversation.len(), len_before);
}

#[tokio::test]
async fn step_clicks_respect_prerequisites() {
    let mut fc = controller();
    fc.start().await;
    act(&mut fc, UserAction::SelectEnvironment(Environment::Dev)).await;
    act(&mut fc, UserAction::EnterAppName("Clicky".into())).await;
    act(&mut fc, UserAction::SelectPlatforms(vec![Platform::Web])).await;
    let outcome = act(&mut fc, UserAction::Continue).await;
    let app_id = outcome.committed_app.unwrap();

    // The live test is gated behind both web SDK steps.
    let outcome = fc
        .handle(UserAction::StepClicked {
            app_id,
            step: StepId::SdkTest,
        })
        .await
        .unwrap();
    assert!(outcome.ignored);
    assert_eq!(
        fc.registry()
            .get(app_id)
            .unwrap()
            .step(StepId::SdkTest)
            .unwrap()
            .status,
        StepStatus::Pending
    );

    // The first step is always clickable.
    let outcome = fc
        .handle(UserAction::StepClicked {
            app_id,
            step: StepId::WebSdkInstall,
        })
        .await
        .unwrap();
    assert!(has_payload(&outcome, |p| {
        matches!(p, Payload::WebSdkInstallGuide { .. })
    }));
    assert_eq!(
        fc.registry()
            .get(app_id)
            .unwrap()
            .step(StepId::WebSdkInstall)
            .unwrap()
            .status,
        StepStatus::InProgress
    );
}

#[tokio::test]
async fn failed_detection_leaves_step_open_and_offers_retry() {
    let provider = InstantProvider {
        detected: false,
        ..Default::default()
    };
    let mut fc = FlowController::new(WizardConfig::instant(), Arc::new(provider));
    fc.start().await;
    act(&mut fc, UserAction::SelectEnvironment(Environment::Dev)).await;
    act(&mut fc, UserAction::EnterAppName("Retry Me".into())).await;
    act(&mut fc, UserAction::SelectPlatforms(vec![Platform::Web])).await;
    let outcome = act(&mut fc, UserAction::Continue).await;
    let app_id = outcome.committed_app.unwrap();

    act(&mut fc, UserAction::Continue).await; // -> web install
    act(&mut fc, UserAction::Continue).await; // -> web init
    act(&mut fc, UserAction::Continue).await; // -> sdk test

    let outcome = act(&mut fc, UserAction::VerifySdk { installed: true }).await;
    assert!(has_payload(&outcome, |p| {
        matches!(p, Payload::DetectionResult { detected: false })
    }));
    assert!(has_payload(&outcome, |p| {
        matches!(p, Payload::RetryPrompt { .. })
    }));
    // One-shot detection: no background polling, the user retries.
    assert_eq!(fc.pending(), Some(PromptKind::SdkVerify));
    assert_ne!(
        fc.registry()
            .get(app_id)
            .unwrap()
            .step(StepId::SdkTest)
            .unwrap()
            .status,
        StepStatus::Completed
    );
}

#[tokio::test]
async fn search_select_flow_records_store_listing() {
    let results = vec![
        sdk_onboarding::protocol::StoreSearchResult {
            name: "Candy Crush".into(),
            store_id: "id553834731".into(),
            platform: Platform::Ios,
            icon_url: None,
        },
        sdk_onboarding::protocol::StoreSearchResult {
            name: "Candy Crush Soda".into(),
            store_id: "id850417475".into(),
            platform: Platform::Ios,
            icon_url: None,
        },
    ];
    let mut fc = FlowController::new(
        WizardConfig::instant(),
        Arc::new(InstantProvider::detecting(results.clone())),
    );
    fc.start().await;
    act(
        &mut fc,
        UserAction::SelectEnvironment(Environment::Production),
    )
    .await;
    act(&mut fc, UserAction::SelectPlatforms(vec![Platform::Ios])).await;

    let outcome = act(
        &mut fc,
        UserAction::SubmitSearch {
            query: "candy".into(),
        },
    )
    .await;
    assert!(has_payload(&outcome, |p| {
        matches!(p, Payload::AppSearchResults { .. })
    }));
    assert_eq!(fc.pending(), Some(PromptKind::AppSearchResults));

    act(&mut fc, UserAction::SelectSearchResult(results[0].clone())).await;
    assert_eq!(fc.pending(), Some(PromptKind::TimezoneCurrencyConfirm));

    let outcome = act(&mut fc, UserAction::Continue).await;
    let app_id = outcome.committed_app.unwrap();
    let app = fc.registry().get(app_id).unwrap();
    assert_eq!(app.info.name, "Candy Crush");
    assert_eq!(app.info.store_id.as_deref(), Some("id553834731"));
}

#[tokio::test]
async fn add_another_app_opens_fresh_session() {
    let mut fc = controller();
    fc.start().await;
    act(&mut fc, UserAction::SelectEnvironment(Environment::Dev)).await;
    act(&mut fc, UserAction::EnterAppName("First".into())).await;
    act(&mut fc, UserAction::SelectPlatforms(vec![Platform::Web])).await;
    let first = act(&mut fc, UserAction::Continue)
        .await
        .committed_app
        .unwrap();
    act(&mut fc, UserAction::Continue).await;
    act(&mut fc, UserAction::Continue).await;
    act(&mut fc, UserAction::Continue).await;
    act(&mut fc, UserAction::VerifySdk { installed: true }).await;
    assert_eq!(fc.pending(), Some(PromptKind::AddAnotherApp));

    let outcome = act(&mut fc, UserAction::AddAnotherApp).await;
    assert!(has_payload(&outcome, |p| {
        matches!(p, Payload::EnvironmentSelect)
    }));
    assert!(fc.session().is_some());
    assert_eq!(fc.pending(), Some(PromptKind::EnvironmentSelect));

    // The first app keeps its finished state and transcript.
    let app = fc.registry().get(first).unwrap();
    assert!(app.all_steps_completed());
    assert!(app.pending.is_none());

    // Second registration lands as a distinct app.
    act(&mut fc, UserAction::SelectEnvironment(Environment::Dev)).await;
    act(&mut fc, UserAction::EnterAppName("Second".into())).await;
    act(&mut fc, UserAction::SelectPlatforms(vec![Platform::Ios])).await;
    let second = act(&mut fc, UserAction::Continue)
        .await
        .committed_app
        .unwrap();
    assert_ne!(first, second);
    assert_eq!(fc.registry().len(), 2);
    assert_eq!(fc.registry().expanded_app().unwrap().id, second);
}

#[tokio::test]
async fn skip_commits_partial_registration() {
    let mut fc = controller();
    fc.start().await;
    act(&mut fc, UserAction::SelectEnvironment(Environment::Dev)).await;
    act(&mut fc, UserAction::EnterAppName("Half Done".into())).await;

    let outcome = act(&mut fc, UserAction::Skip).await;
    let app_id = outcome.committed_app.expect("partial state committed");
    assert!(fc.session().is_none());
    assert_eq!(fc.pending(), None);

    let app = fc.registry().get(app_id).unwrap();
    assert_eq!(app.info.name, "Half Done");
    // Remaining steps stay open for later step clicks.
    assert_eq!(app.completed_count(), 0);
}
