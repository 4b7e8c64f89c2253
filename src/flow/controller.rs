//! Flow controller: the dialogue state machine.
//!
//! Consumes user actions against the current session/app state, produces
//! the next protocol payloads, and issues mutations to the registry. State
//! is implicit in `(session-or-active-app, pending prompt kind)`; there is
//! exactly one mutation path (`handle`), so no locking is needed.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::WizardConfig;
use crate::error::{FlowError, Result, ValidationError};
use crate::protocol::{CompletionData, Payload, PromptKind, StoreSearchResult};
use crate::providers::AsyncProvider;
use crate::registry::{AppRegistry, RegisteredApp};
use crate::seed::{SeedStore, SurveyAnswers};
use crate::steps::{AdChannel, Environment, Framework, Platform, StepId, StepStatus};

use super::action::UserAction;
use super::session::{validate_app_name, PlatformInfo, SessionDraft};

/// What one `handle` call produced.
#[derive(Debug, Clone, Default)]
pub struct FlowOutcome {
    /// Bot payloads emitted (appended or swapped in) by this call.
    pub payloads: Vec<Payload>,
    /// Set when this call committed a new app to the registry.
    pub committed_app: Option<Uuid>,
    /// True when the action was rejected as out-of-order or unprepared;
    /// nothing was mutated.
    pub ignored: bool,
}

impl FlowOutcome {
    fn ignored() -> Self {
        Self {
            ignored: true,
            ..Self::default()
        }
    }

    fn emitted(payloads: Vec<Payload>) -> Self {
        Self {
            payloads,
            ..Self::default()
        }
    }
}

/// How an emitted turn affects the pending-prompt gate.
#[derive(Debug, Clone, Copy)]
enum Pending {
    Keep,
    Clear,
    Set(PromptKind),
}

/// Which conversation a turn addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Session,
    App(Uuid),
}

/// The dialogue state machine driving the whole wizard.
pub struct FlowController {
    registry: AppRegistry,
    session: Option<SessionDraft>,
    active_app: Option<Uuid>,
    provider: Arc<dyn AsyncProvider>,
    config: WizardConfig,
    seed_answers: Option<SurveyAnswers>,
    terms_accepted: bool,
}

impl FlowController {
    pub fn new(config: WizardConfig, provider: Arc<dyn AsyncProvider>) -> Self {
        Self {
            registry: AppRegistry::new(),
            session: None,
            active_app: None,
            provider,
            config,
            seed_answers: None,
            terms_accepted: false,
        }
    }

    /// Construct with the read-once seed store consumed up front.
    pub fn with_seed(
        config: WizardConfig,
        provider: Arc<dyn AsyncProvider>,
        seed: &mut SeedStore,
    ) -> Self {
        let mut controller = Self::new(config, provider);
        controller.seed_answers = seed.take_survey_answers();
        controller.terms_accepted = seed.take_terms_agreement();
        controller
    }

    pub fn registry(&self) -> &AppRegistry {
        &self.registry
    }

    pub fn session(&self) -> Option<&SessionDraft> {
        self.session.as_ref()
    }

    pub fn active_app(&self) -> Option<Uuid> {
        self.active_app
    }

    pub fn terms_accepted(&self) -> bool {
        self.terms_accepted
    }

    /// The single outstanding decision, if any, for the active
    /// conversation (session wins over app while registering).
    pub fn pending(&self) -> Option<PromptKind> {
        if let Some(session) = &self.session {
            return session.pending;
        }
        self.active_app
            .and_then(|id| self.registry.get(id))
            .and_then(|app| app.pending)
    }

    /// Begin the wizard: open a registration session (pre-populated from
    /// seeded survey answers when available) and emit the first prompt.
    pub async fn start(&mut self) -> FlowOutcome {
        if self.session.is_none() {
            self.session = Some(self.fresh_draft());
        }
        let draft = self.session.as_ref().expect("session just ensured");
        let (payloads, pending) = match (draft.environment, draft.platforms.is_empty()) {
            (None, _) => (
                vec![Payload::Welcome, Payload::EnvironmentSelect],
                PromptKind::EnvironmentSelect,
            ),
            (Some(Environment::Dev), _) => (
                vec![
                    Payload::Welcome,
                    Payload::AppNameInput {
                        environment: Environment::Dev,
                    },
                ],
                PromptKind::AppNameInput,
            ),
            (Some(Environment::Production), true) => (
                vec![
                    Payload::Welcome,
                    Payload::PlatformMultiSelect {
                        options: vec![Platform::Ios, Platform::Android, Platform::Web],
                    },
                ],
                PromptKind::PlatformMultiSelect,
            ),
            (Some(Environment::Production), false) => {
                let platform = draft.platforms[0];
                let total = draft.platforms.len();
                let registration = Payload::platform_registration(platform, 0, total)
                    .expect("index 0 of non-empty platform set");
                (
                    vec![Payload::Welcome, registration],
                    PromptKind::PlatformRegistration,
                )
            }
        };
        self.emit_bot(Target::Session, payloads, Pending::Set(pending))
            .await
    }

    /// Process one user action. Out-of-order structured answers are
    /// rejected as a no-op (`FlowOutcome::ignored`); malformed input is a
    /// `ValidationError` that blocks the submit without mutating anything.
    pub async fn handle(&mut self, action: UserAction) -> Result<FlowOutcome> {
        if action.bypasses_pending_gate() {
            return self.handle_ungated(action).await;
        }

        let Some(pending) = self.pending() else {
            debug!(?action, "No pending prompt; action ignored");
            return Ok(FlowOutcome::ignored());
        };

        match (pending, action) {
            (PromptKind::EnvironmentSelect, UserAction::SelectEnvironment(env)) => {
                self.on_environment(env).await
            }
            (PromptKind::AppNameInput, UserAction::EnterAppName(name)) => {
                self.on_app_name(name).await
            }
            (PromptKind::PlatformMultiSelect, UserAction::SelectPlatforms(platforms)) => {
                self.on_platforms(platforms).await
            }
            (
                PromptKind::PlatformRegistration | PromptKind::AppSearchResults,
                UserAction::SubmitSearch { query },
            ) => self.on_search(query).await,
            (PromptKind::PlatformRegistration, UserAction::EnterManualApp { name, store_id }) => {
                self.on_manual_app(name, store_id).await
            }
            (PromptKind::AppSearchResults, UserAction::SelectSearchResult(result)) => {
                self.on_app_selected(result).await
            }
            (PromptKind::TimezoneCurrencyConfirm, UserAction::Continue) => self.on_commit().await,
            (PromptKind::FrameworkSelect, UserAction::SelectFramework(framework)) => {
                self.on_framework(framework).await
            }
            (PromptKind::ChannelSelect, UserAction::SelectChannels(channels)) => {
                self.on_channels(channels).await
            }
            (PromptKind::SdkVerify, UserAction::VerifySdk { installed }) => {
                self.on_verify(installed).await
            }
            (
                PromptKind::AddAnotherApp,
                UserAction::AddAnotherApp | UserAction::Continue,
            ) => self.on_add_another().await,
            (kind, UserAction::Continue) => self.on_continue(kind).await,
            (expected, action) => {
                debug!(?expected, ?action, "Out-of-order action rejected");
                Ok(FlowOutcome::ignored())
            }
        }
    }

    // ── Registration sub-flow ───────────────────────────────────────

    async fn on_environment(&mut self, environment: Environment) -> Result<FlowOutcome> {
        self.append_user(Target::Session, vec![Payload::EnvironmentChoice { environment }]);
        let draft = self.session.as_mut().ok_or(FlowError::NoActiveSession)?;
        draft.environment = Some(environment);
        let platforms_seeded = !draft.platforms.is_empty();

        let (payloads, pending) = match environment {
            Environment::Dev => (
                vec![Payload::AppNameInput { environment }],
                PromptKind::AppNameInput,
            ),
            Environment::Production if platforms_seeded => {
                let platform = draft.platforms[0];
                let total = draft.platforms.len();
                (
                    vec![Payload::platform_registration(platform, 0, total)
                        .expect("index 0 of non-empty platform set")],
                    PromptKind::PlatformRegistration,
                )
            }
            Environment::Production => (
                vec![Payload::PlatformMultiSelect {
                    options: vec![Platform::Ios, Platform::Android, Platform::Web],
                }],
                PromptKind::PlatformMultiSelect,
            ),
        };
        Ok(self
            .emit_bot(Target::Session, payloads, Pending::Set(pending))
            .await)
    }

    async fn on_app_name(&mut self, name: String) -> Result<FlowOutcome> {
        validate_app_name(&name)?;
        let trimmed = name.trim().to_string();
        self.append_user(
            Target::Session,
            vec![Payload::AppNameEntry {
                name: trimmed.clone(),
            }],
        );
        let draft = self.session.as_mut().ok_or(FlowError::NoActiveSession)?;
        draft.app_name = Some(trimmed);

        if draft.platforms.is_empty() {
            return Ok(self
                .emit_bot(
                    Target::Session,
                    vec![Payload::PlatformMultiSelect {
                        options: vec![Platform::Ios, Platform::Android, Platform::Web],
                    }],
                    Pending::Set(PromptKind::PlatformMultiSelect),
                )
                .await);
        }
        // Platforms already seeded: dev flow needs no store search.
        self.prompt_confirm_or_register().await
    }

    async fn on_platforms(&mut self, platforms: Vec<Platform>) -> Result<FlowOutcome> {
        if platforms.is_empty() {
            return Err(ValidationError::EmptySelection { field: "platforms" }.into());
        }
        let mut deduped: Vec<Platform> = Vec::new();
        for p in platforms {
            if !deduped.contains(&p) {
                deduped.push(p);
            }
        }

        self.append_user(
            Target::Session,
            vec![Payload::PlatformChoices {
                platforms: deduped.clone(),
            }],
        );
        let draft = self.session.as_mut().ok_or(FlowError::NoActiveSession)?;
        draft.platforms = deduped;
        draft.current_platform_index = 0;
        self.prompt_confirm_or_register().await
    }

    /// After platforms are known: dev flows (or flows with all platform
    /// info collected) go to the timezone/currency confirmation, production
    /// flows start the per-platform registration walk.
    async fn prompt_confirm_or_register(&mut self) -> Result<FlowOutcome> {
        let draft = self.session.as_ref().ok_or(FlowError::NoActiveSession)?;
        let dev = draft.environment == Some(Environment::Dev);
        if dev || draft.all_platforms_registered() {
            let payload = Payload::TimezoneCurrencyConfirm {
                timezone: draft.timezone.clone(),
                currency: draft.currency.clone(),
                app_name: draft.resolved_name().unwrap_or_default(),
            };
            return Ok(self
                .emit_bot(
                    Target::Session,
                    vec![payload],
                    Pending::Set(PromptKind::TimezoneCurrencyConfirm),
                )
                .await);
        }

        let platform = draft
            .current_platform()
            .ok_or(FlowError::NoActiveSession)?;
        let index = draft.current_platform_index;
        let total = draft.platforms.len();
        let registration = Payload::platform_registration(platform, index, total)?;
        Ok(self
            .emit_bot(
                Target::Session,
                vec![registration],
                Pending::Set(PromptKind::PlatformRegistration),
            )
            .await)
    }

    async fn on_search(&mut self, query: String) -> Result<FlowOutcome> {
        let query = query.trim().to_string();
        if query.is_empty() {
            return Err(ValidationError::EmptyField { field: "query" }.into());
        }
        let platform = self
            .session
            .as_ref()
            .and_then(|s| s.current_platform())
            .ok_or(FlowError::NoActiveSession)?;

        self.append_user(
            Target::Session,
            vec![Payload::SearchQuery {
                query: query.clone(),
                platform,
            }],
        );
        self.emit_bot(
            Target::Session,
            vec![Payload::AppSearchLoading {
                query: query.clone(),
                platform,
            }],
            Pending::Keep,
        )
        .await;

        let epoch = self
            .session
            .as_ref()
            .map(|s| s.conversation.epoch())
            .ok_or(FlowError::NoActiveSession)?;
        let searched = self.provider.search(&query, Some(platform)).await;

        let Some(draft) = self.session.as_mut() else {
            return Ok(FlowOutcome::ignored());
        };
        if draft.conversation.epoch() != epoch {
            debug!("Session epoch changed during search; dropping results");
            return Ok(FlowOutcome::ignored());
        }

        let (replacement, pending) = match searched {
            Ok(results) if !results.is_empty() => (
                vec![Payload::AppSearchResults {
                    query,
                    platform,
                    results,
                }],
                PromptKind::AppSearchResults,
            ),
            Ok(_) => (
                vec![Payload::RetryPrompt {
                    operation: "app-search".to_string(),
                    reason: "no matching apps found".to_string(),
                }],
                PromptKind::PlatformRegistration,
            ),
            Err(e) => {
                warn!("Store search failed: {}", e);
                (
                    vec![Payload::RetryPrompt {
                        operation: "app-search".to_string(),
                        reason: e.to_string(),
                    }],
                    PromptKind::PlatformRegistration,
                )
            }
        };
        draft.conversation.replace_last_bot_turn(replacement.clone());
        draft.pending = Some(pending);
        Ok(FlowOutcome::emitted(replacement))
    }

    async fn on_app_selected(&mut self, result: StoreSearchResult) -> Result<FlowOutcome> {
        self.append_user(
            Target::Session,
            vec![Payload::AppSelected {
                result: result.clone(),
            }],
        );
        let draft = self.session.as_mut().ok_or(FlowError::NoActiveSession)?;
        draft.platform_infos.push(PlatformInfo {
            platform: result.platform,
            name: result.name,
            store_id: Some(result.store_id),
        });
        draft.current_platform_index += 1;
        self.prompt_confirm_or_register().await
    }

    async fn on_manual_app(
        &mut self,
        name: String,
        store_id: Option<String>,
    ) -> Result<FlowOutcome> {
        validate_app_name(&name)?;
        let platform = self
            .session
            .as_ref()
            .and_then(|s| s.current_platform())
            .ok_or(FlowError::NoActiveSession)?;

        self.append_user(
            Target::Session,
            vec![Payload::ManualAppDetails {
                platform,
                name: name.trim().to_string(),
                store_id: store_id.clone(),
            }],
        );
        let draft = self.session.as_mut().ok_or(FlowError::NoActiveSession)?;
        draft.platform_infos.push(PlatformInfo {
            platform,
            name: name.trim().to_string(),
            store_id,
        });
        draft.current_platform_index += 1;
        self.prompt_confirm_or_register().await
    }

    /// Atomic registration commit: exactly one new app appears, its step
    /// graph and tokens are materialized, and the draft is cleared, all
    /// before the token display is emitted.
    async fn on_commit(&mut self) -> Result<FlowOutcome> {
        let info = self
            .session
            .as_ref()
            .ok_or(FlowError::NoActiveSession)?
            .app_info()?;

        self.append_user(Target::Session, vec![Payload::Confirmation { accepted: true }]);
        let draft = self.session.take().expect("session checked above");
        let environment = draft
            .environment
            .unwrap_or(Environment::Production);
        let app_id = self.registry.register(
            info,
            draft.platforms,
            environment,
            draft.framework,
            draft.conversation,
            &self.config,
        );
        self.active_app = Some(app_id);

        let (app_name, tokens) = {
            let app = self
                .registry
                .get(app_id)
                .ok_or(FlowError::UnknownApp { id: app_id })?;
            (app.info.name.clone(), app.tokens.clone())
        };
        info!(app = %app_id, name = %app_name, "Registration committed");

        let mut outcome = self
            .emit_bot(
                Target::App(app_id),
                vec![Payload::TokenDisplay {
                    app_name,
                    app_token: tokens.app_token,
                    sdk_key: tokens.sdk_key,
                    signature_secret: tokens.signature_secret,
                }],
                Pending::Set(PromptKind::TokenDisplay),
            )
            .await;
        outcome.committed_app = Some(app_id);
        Ok(outcome)
    }

    // ── SDK setup and production tail ───────────────────────────────

    async fn on_continue(&mut self, kind: PromptKind) -> Result<FlowOutcome> {
        use PromptKind as K;
        let app_id = self.active_app.ok_or(FlowError::NoActiveApp)?;

        match kind {
            K::TokenDisplay => {
                self.append_user(
                    Target::App(app_id),
                    vec![Payload::Confirmation { accepted: true }],
                );
                self.advance_app(app_id).await
            }
            K::SdkInstallChoice => {
                self.append_user(
                    Target::App(app_id),
                    vec![Payload::Confirmation { accepted: true }],
                );
                Ok(self
                    .emit_bot(
                        Target::App(app_id),
                        vec![Payload::FrameworkSelect {
                            options: vec![
                                Framework::Native,
                                Framework::ReactNative,
                                Framework::Flutter,
                                Framework::Expo,
                                Framework::Unity,
                            ],
                        }],
                        Pending::Set(K::FrameworkSelect),
                    )
                    .await)
            }
            K::SdkInstallGuide
            | K::SdkInitCode
            | K::WebSdkInstall
            | K::WebSdkInit
            | K::DeeplinkSetup
            | K::TrackingLink
            | K::DeeplinkTest
            | K::EventTaxonomy
            | K::ChannelIntegration
            | K::CostIntegration
            | K::SkanIntegration
            | K::AttributionTest
            | K::DataVerify => {
                self.append_user(
                    Target::App(app_id),
                    vec![Payload::Confirmation { accepted: true }],
                );
                if let Some(app) = self.registry.get_mut(app_id) {
                    if let Some(step) = app.in_progress_step().map(|s| s.id) {
                        app.set_step_status(step, StepStatus::Completed);
                    }
                }
                self.advance_app(app_id).await
            }
            other => {
                debug!(?other, "Continue does not resolve this prompt; ignoring");
                Ok(FlowOutcome::ignored())
            }
        }
    }

    async fn on_framework(&mut self, framework: Framework) -> Result<FlowOutcome> {
        let app_id = self.active_app.ok_or(FlowError::NoActiveApp)?;
        self.append_user(
            Target::App(app_id),
            vec![Payload::FrameworkChoice { framework }],
        );
        self.registry.set_framework(app_id, framework);
        // The framework choice concludes the install step; init follows.
        if let Some(app) = self.registry.get_mut(app_id) {
            if let Some(step) = app.in_progress_step().map(|s| s.id) {
                app.set_step_status(step, StepStatus::Completed);
            }
        }
        self.advance_app(app_id).await
    }

    async fn on_channels(&mut self, channels: Vec<AdChannel>) -> Result<FlowOutcome> {
        if channels.is_empty() {
            return Err(ValidationError::EmptySelection { field: "channels" }.into());
        }
        let app_id = self.active_app.ok_or(FlowError::NoActiveApp)?;
        self.append_user(
            Target::App(app_id),
            vec![Payload::ChannelChoices {
                channels: channels.clone(),
            }],
        );
        self.registry.set_channels(app_id, channels);
        self.registry
            .update_step_status(app_id, StepId::ChannelSelect, StepStatus::Completed);
        self.advance_app(app_id).await
    }

    async fn on_verify(&mut self, installed: bool) -> Result<FlowOutcome> {
        let app_id = self.active_app.ok_or(FlowError::NoActiveApp)?;
        self.append_user(
            Target::App(app_id),
            vec![Payload::VerifyAnswer { installed }],
        );
        if !installed {
            return Ok(self
                .emit_bot(
                    Target::App(app_id),
                    vec![Payload::RetryPrompt {
                        operation: "sdk-test".to_string(),
                        reason: "SDK not reported as installed".to_string(),
                    }],
                    Pending::Set(PromptKind::SdkVerify),
                )
                .await);
        }

        let app_token = self
            .registry
            .get(app_id)
            .ok_or(FlowError::UnknownApp { id: app_id })?
            .tokens
            .app_token
            .clone();
        self.emit_bot(
            Target::App(app_id),
            vec![Payload::DetectionLoading {
                app_token: app_token.clone(),
            }],
            Pending::Keep,
        )
        .await;

        let epoch = self
            .registry
            .get(app_id)
            .map(|a| a.conversation.epoch())
            .ok_or(FlowError::UnknownApp { id: app_id })?;
        let detected = self.provider.detect_registration(&app_token).await;

        let Some(app) = self.registry.get_mut(app_id) else {
            return Ok(FlowOutcome::ignored());
        };
        if app.conversation.epoch() != epoch {
            debug!(app = %app_id, "App epoch changed during detection; dropping result");
            return Ok(FlowOutcome::ignored());
        }

        match detected {
            Ok(true) => {
                app.conversation
                    .replace_last_bot_turn(vec![Payload::DetectionResult { detected: true }]);
                app.set_step_status(StepId::SdkTest, StepStatus::Completed);
                self.advance_app(app_id).await
            }
            Ok(false) => {
                let replacement = vec![
                    Payload::DetectionResult { detected: false },
                    Payload::RetryPrompt {
                        operation: "detection".to_string(),
                        reason: "no SDK traffic seen yet".to_string(),
                    },
                ];
                app.conversation.replace_last_bot_turn(replacement.clone());
                app.pending = Some(PromptKind::SdkVerify);
                Ok(FlowOutcome::emitted(replacement))
            }
            Err(e) => {
                warn!("Registration detection failed: {}", e);
                let replacement = vec![Payload::RetryPrompt {
                    operation: "detection".to_string(),
                    reason: e.to_string(),
                }];
                app.conversation.replace_last_bot_turn(replacement.clone());
                app.pending = Some(PromptKind::SdkVerify);
                Ok(FlowOutcome::emitted(replacement))
            }
        }
    }

    async fn on_add_another(&mut self) -> Result<FlowOutcome> {
        if let Some(app_id) = self.active_app {
            self.append_user(
                Target::App(app_id),
                vec![Payload::Confirmation { accepted: true }],
            );
            if let Some(app) = self.registry.get_mut(app_id) {
                app.pending = None;
                // Pending timers for the finished app must not land later.
                app.conversation.bump_epoch();
            }
        }
        self.session = Some(SessionDraft::new());
        Ok(self
            .emit_bot(
                Target::Session,
                vec![Payload::EnvironmentSelect],
                Pending::Set(PromptKind::EnvironmentSelect),
            )
            .await)
    }

    /// Move the app to its next open step: bump the phase when the step
    /// starts a new one, mark it in progress, and emit its prompt. When no
    /// step remains, emit the completion summary.
    async fn advance_app(&mut self, app_id: Uuid) -> Result<FlowOutcome> {
        let overall = self.registry.overall_progress().fraction();
        let (payloads, pending) = {
            let app = self
                .registry
                .get_mut(app_id)
                .ok_or(FlowError::UnknownApp { id: app_id })?;
            plan_next_prompt(app, overall)
        };
        Ok(self.emit_bot(Target::App(app_id), payloads, pending).await)
    }

    // ── Gate-bypassing actions ──────────────────────────────────────

    async fn handle_ungated(&mut self, action: UserAction) -> Result<FlowOutcome> {
        match action {
            UserAction::FreeText(text) => self.on_free_text(text).await,
            UserAction::CopyToken(token) => self.on_copy_token(token).await,
            UserAction::Skip => self.on_skip().await,
            UserAction::StepClicked { app_id, step } => self.on_step_clicked(app_id, step).await,
            other => {
                debug!(?other, "Action does not bypass the gate");
                Ok(FlowOutcome::ignored())
            }
        }
    }

    /// Free text is always acknowledged and never mutates step state.
    async fn on_free_text(&mut self, text: String) -> Result<FlowOutcome> {
        let Some(target) = self.current_target() else {
            debug!("Free text before wizard start; ignoring");
            return Ok(FlowOutcome::ignored());
        };
        self.append_user(target, vec![Payload::UserText { body: text }]);
        let ack = acknowledgement_text(self.convo_len(target));
        Ok(self
            .emit_bot(
                target,
                vec![Payload::Acknowledgement {
                    text: ack.to_string(),
                }],
                Pending::Keep,
            )
            .await)
    }

    async fn on_copy_token(&mut self, token: String) -> Result<FlowOutcome> {
        let Some(target) = self.current_target() else {
            return Ok(FlowOutcome::ignored());
        };
        self.append_user(target, vec![Payload::TokenCopied]);
        let payloads = match self.provider.copy_to_clipboard(&token).await {
            Ok(()) => vec![Payload::Acknowledgement {
                text: "Copied to your clipboard.".to_string(),
            }],
            Err(e) => {
                warn!("Clipboard write failed: {}", e);
                vec![Payload::RetryPrompt {
                    operation: "clipboard".to_string(),
                    reason: e.to_string(),
                }]
            }
        };
        Ok(self.emit_bot(target, payloads, Pending::Keep).await)
    }

    /// Skip commits whatever partial answers exist and ends the current
    /// app's flow; remaining steps are left untouched.
    async fn on_skip(&mut self) -> Result<FlowOutcome> {
        if let Some(draft) = &self.session {
            if draft.resolved_name().is_some() {
                // Enough collected to commit the partial registration.
                let info = draft.app_info()?;
                self.append_user(Target::Session, vec![Payload::SkipNotice]);
                let draft = self.session.take().expect("session checked above");
                let environment = draft.environment.unwrap_or(Environment::Production);
                let app_id = self.registry.register(
                    info,
                    draft.platforms,
                    environment,
                    draft.framework,
                    draft.conversation,
                    &self.config,
                );
                self.active_app = Some(app_id);
                info!(app = %app_id, "Partial registration committed via skip");
                let mut outcome = self
                    .emit_bot(
                        Target::App(app_id),
                        vec![Payload::Acknowledgement {
                            text: "Saved your progress. Pick up any step from the list whenever \
                                   you're ready."
                                .to_string(),
                        }],
                        Pending::Clear,
                    )
                    .await;
                outcome.committed_app = Some(app_id);
                return Ok(outcome);
            }
            // Nothing committable yet; just end the prompt.
            self.append_user(Target::Session, vec![Payload::SkipNotice]);
            if let Some(draft) = self.session.as_mut() {
                draft.pending = None;
            }
            return Ok(self
                .emit_bot(
                    Target::Session,
                    vec![Payload::Acknowledgement {
                        text: "No problem. Come back any time.".to_string(),
                    }],
                    Pending::Clear,
                )
                .await);
        }

        if let Some(app_id) = self.active_app {
            self.append_user(Target::App(app_id), vec![Payload::SkipNotice]);
            return Ok(self
                .emit_bot(
                    Target::App(app_id),
                    vec![Payload::Acknowledgement {
                        text: "Saved your progress. Pick up any step from the list whenever \
                               you're ready."
                            .to_string(),
                    }],
                    Pending::Clear,
                )
                .await);
        }
        Ok(FlowOutcome::ignored())
    }

    /// Clicking a step in the list resumes the flow there, provided every
    /// canonically earlier step is completed. While a registration draft is
    /// open the session stays the active conversation, so clicks wait until
    /// it is committed or skipped.
    async fn on_step_clicked(&mut self, app_id: Uuid, step: StepId) -> Result<FlowOutcome> {
        if self.session.is_some() {
            debug!(app = %app_id, %step, "Step click during registration; ignoring");
            return Ok(FlowOutcome::ignored());
        }
        let startable = self.registry.can_start_step(app_id, step);
        let already_done = self
            .registry
            .get(app_id)
            .and_then(|a| a.step(step))
            .is_some_and(|s| s.status == StepStatus::Completed);
        if !startable || already_done {
            debug!(app = %app_id, %step, startable, already_done, "Step click rejected");
            return Ok(FlowOutcome::ignored());
        }

        // Switching apps: discard any deferred turn for the old context.
        if self.active_app != Some(app_id) {
            if let Some(old_target) = self.current_target() {
                self.bump_epoch(old_target);
            }
            self.active_app = Some(app_id);
        }
        self.registry.expand(app_id);

        self.append_user(Target::App(app_id), vec![Payload::StepClicked { step }]);
        self.advance_app(app_id).await
    }

    // ── Conversation plumbing ───────────────────────────────────────

    fn fresh_draft(&mut self) -> SessionDraft {
        match self.seed_answers.take() {
            Some(answers) => SessionDraft::from_seed(&answers),
            None => SessionDraft::new(),
        }
    }

    fn current_target(&self) -> Option<Target> {
        if self.session.is_some() {
            return Some(Target::Session);
        }
        self.active_app.map(Target::App)
    }

    fn convo_len(&self, target: Target) -> usize {
        match target {
            Target::Session => self.session.as_ref().map(|s| s.conversation.len()),
            Target::App(id) => self.registry.get(id).map(|a| a.conversation.len()),
        }
        .unwrap_or(0)
    }

    fn bump_epoch(&mut self, target: Target) {
        match target {
            Target::Session => {
                if let Some(s) = self.session.as_mut() {
                    s.conversation.bump_epoch();
                }
            }
            Target::App(id) => {
                if let Some(a) = self.registry.get_mut(id) {
                    a.conversation.bump_epoch();
                }
            }
        }
    }

    fn append_user(&mut self, target: Target, payloads: Vec<Payload>) {
        match target {
            Target::Session => {
                if let Some(s) = self.session.as_mut() {
                    s.conversation.append_user_turn(payloads);
                }
            }
            Target::App(id) => {
                if let Some(a) = self.registry.get_mut(id) {
                    a.conversation.append_user_turn(payloads);
                }
            }
        }
    }

    /// Compose a bot turn: hold it for the typing latency, then append it
    /// under the epoch captured at scheduling time and update the gate.
    async fn emit_bot(
        &mut self,
        target: Target,
        payloads: Vec<Payload>,
        pending: Pending,
    ) -> FlowOutcome {
        let Some(epoch) = (match target {
            Target::Session => self.session.as_ref().map(|s| s.conversation.epoch()),
            Target::App(id) => self.registry.get(id).map(|a| a.conversation.epoch()),
        }) else {
            return FlowOutcome::ignored();
        };

        if !self.config.typing_delay.is_zero() {
            tokio::time::sleep(self.config.typing_delay).await;
        }

        let applied = match target {
            Target::Session => self
                .session
                .as_mut()
                .map(|s| s.conversation.apply_bot_turn(epoch, payloads.clone())),
            Target::App(id) => self
                .registry
                .get_mut(id)
                .map(|a| a.conversation.apply_bot_turn(epoch, payloads.clone())),
        }
        .unwrap_or(false);

        if !applied {
            return FlowOutcome::ignored();
        }

        match (target, pending) {
            (_, Pending::Keep) => {}
            (Target::Session, Pending::Clear) => {
                if let Some(s) = self.session.as_mut() {
                    s.pending = None;
                }
            }
            (Target::Session, Pending::Set(kind)) => {
                if let Some(s) = self.session.as_mut() {
                    s.pending = Some(kind);
                }
            }
            (Target::App(id), Pending::Clear) => {
                if let Some(a) = self.registry.get_mut(id) {
                    a.pending = None;
                }
            }
            (Target::App(id), Pending::Set(kind)) => {
                if let Some(a) = self.registry.get_mut(id) {
                    a.pending = Some(kind);
                }
            }
        }
        FlowOutcome::emitted(payloads)
    }
}

// ── Step prompting ──────────────────────────────────────────────────

/// Decide the prompt for the app's next open step, mutating step status
/// and phase. Returns the completion summary when nothing remains open.
fn plan_next_prompt(app: &mut RegisteredApp, overall_fraction: f64) -> (Vec<Payload>, Pending) {
    let Some((step_id, step_phase)) = app.next_open_step().map(|s| (s.id, s.phase)) else {
        let payloads = match app.environment {
            Environment::Dev => vec![
                Payload::DevCompletionSummary {
                    app_name: app.info.name.clone(),
                    completed_steps: app.completed_count(),
                    total_steps: app.steps.len(),
                },
                Payload::AddAnotherApp,
            ],
            Environment::Production => vec![
                Payload::CompletionSummary {
                    data: CompletionData {
                        app_name: app.info.name.clone(),
                        platforms: app.platforms.clone(),
                        framework: app.framework,
                        channels: app.channels.clone(),
                        completed_steps: app.completed_count(),
                        total_steps: app.steps.len(),
                        overall_progress: overall_fraction,
                    },
                },
                Payload::AddAnotherApp,
            ],
        };
        return (payloads, Pending::Set(PromptKind::AddAnotherApp));
    };

    let mut payloads = Vec::new();
    if step_phase > app.current_phase {
        app.current_phase = step_phase;
        payloads.push(Payload::PhaseHeader {
            phase: step_phase,
            title: phase_title(step_phase).to_string(),
        });
    }
    app.set_step_status(step_id, StepStatus::InProgress);

    let (mut prompt, kind) = prompt_for_step(app, step_id);
    payloads.append(&mut prompt);
    (payloads, Pending::Set(kind))
}

fn prompt_for_step(app: &RegisteredApp, step_id: StepId) -> (Vec<Payload>, PromptKind) {
    use PromptKind as K;
    let tokens = &app.tokens;
    let scheme = deeplink_scheme(&app.info.name);

    match step_id {
        StepId::WebSdkInstall => (
            vec![Payload::WebSdkInstallGuide {
                snippet: web_install_snippet(),
            }],
            K::WebSdkInstall,
        ),
        StepId::WebSdkInit => (
            vec![Payload::WebSdkInitCode {
                app_token: tokens.app_token.clone(),
                snippet: web_init_snippet(&tokens.app_token),
            }],
            K::WebSdkInit,
        ),
        StepId::SdkInstall => match app.framework {
            None => (
                vec![Payload::SdkInstallChoice {
                    platforms: app.platforms.iter().copied().filter(|p| p.is_mobile()).collect(),
                }],
                K::SdkInstallChoice,
            ),
            Some(framework) => (
                vec![Payload::SdkInstallGuide {
                    framework,
                    platform: None,
                }],
                K::SdkInstallGuide,
            ),
        },
        StepId::SdkInit => {
            let framework = app.framework.unwrap_or(Framework::ReactNative);
            let payloads = if framework == Framework::Native {
                // Per-platform init snippets in one turn.
                app.platforms
                    .iter()
                    .filter(|p| p.is_mobile())
                    .map(|&platform| Payload::SdkInitCode {
                        app_name: app.info.name.clone(),
                        app_token: tokens.app_token.clone(),
                        framework,
                        platform: Some(platform),
                        snippet: init_snippet(framework, &tokens.app_token),
                    })
                    .collect()
            } else {
                vec![Payload::SdkInitCode {
                    app_name: app.info.name.clone(),
                    app_token: tokens.app_token.clone(),
                    framework,
                    platform: None,
                    snippet: init_snippet(framework, &tokens.app_token),
                }]
            };
            (payloads, K::SdkInitCode)
        }
        StepId::DeeplinkSetup => (
            vec![Payload::DeeplinkSetupGuide {
                platform: None,
                scheme,
            }],
            K::DeeplinkSetup,
        ),
        StepId::IosSdkInstall => (
            vec![Payload::SdkInstallGuide {
                framework: Framework::Native,
                platform: Some(Platform::Ios),
            }],
            K::SdkInstallGuide,
        ),
        StepId::IosSdkInit => (
            vec![Payload::SdkInitCode {
                app_name: app.info.name.clone(),
                app_token: tokens.app_token.clone(),
                framework: Framework::Native,
                platform: Some(Platform::Ios),
                snippet: init_snippet(Framework::Native, &tokens.app_token),
            }],
            K::SdkInitCode,
        ),
        StepId::IosDeeplinkSetup => (
            vec![Payload::DeeplinkSetupGuide {
                platform: Some(Platform::Ios),
                scheme,
            }],
            K::DeeplinkSetup,
        ),
        StepId::AndroidSdkInstall => (
            vec![Payload::SdkInstallGuide {
                framework: Framework::Native,
                platform: Some(Platform::Android),
            }],
            K::SdkInstallGuide,
        ),
        StepId::AndroidSdkInit => (
            vec![Payload::SdkInitCode {
                app_name: app.info.name.clone(),
                app_token: tokens.app_token.clone(),
                framework: Framework::Native,
                platform: Some(Platform::Android),
                snippet: init_snippet(Framework::Native, &tokens.app_token),
            }],
            K::SdkInitCode,
        ),
        StepId::AndroidDeeplinkSetup => (
            vec![Payload::DeeplinkSetupGuide {
                platform: Some(Platform::Android),
                scheme,
            }],
            K::DeeplinkSetup,
        ),
        StepId::SdkTest => (
            vec![Payload::SdkTestPrompt {
                app_name: app.info.name.clone(),
            }],
            K::SdkVerify,
        ),
        StepId::TrackingLink => (
            vec![
                Payload::TrackingLinkGuide,
                Payload::TrackingLinkDisplay {
                    url: format!("https://go.measure.example/{}", tokens.app_token),
                },
            ],
            K::TrackingLink,
        ),
        StepId::DeeplinkTest => (
            vec![Payload::DeeplinkTestPrompt { scheme }],
            K::DeeplinkTest,
        ),
        StepId::EventTaxonomy => (
            vec![
                Payload::EventTaxonomyIntro,
                Payload::EventTaxonomyTable {
                    events: default_events(),
                },
            ],
            K::EventTaxonomy,
        ),
        StepId::ChannelSelect => (
            vec![Payload::ChannelSelect {
                options: AdChannel::all(),
            }],
            K::ChannelSelect,
        ),
        StepId::ChannelIntegration => {
            let channels = if app.channels.is_empty() {
                AdChannel::all()
            } else {
                app.channels.clone()
            };
            (
                channels
                    .into_iter()
                    .map(|channel| Payload::ChannelIntegrationGuide { channel })
                    .collect(),
                K::ChannelIntegration,
            )
        }
        StepId::CostIntegration => (vec![Payload::CostIntegrationGuide], K::CostIntegration),
        StepId::SkanIntegration => (vec![Payload::SkanIntegrationGuide], K::SkanIntegration),
        StepId::AttributionTest => (vec![Payload::AttributionTestPrompt], K::AttributionTest),
        StepId::DataVerify => (vec![Payload::DataVerifyGuide], K::DataVerify),
    }
}

fn phase_title(phase: u8) -> &'static str {
    match phase {
        1 => "Registration",
        2 => "SDK setup",
        3 => "Event design",
        4 => "Channel integration",
        _ => "Verification",
    }
}

fn acknowledgement_text(salt: usize) -> &'static str {
    const ACKS: [&str; 4] = [
        "Got it.",
        "Noted, keep going when ready.",
        "Thanks, carrying on.",
        "Understood.",
    ];
    ACKS[salt % ACKS.len()]
}

fn default_events() -> Vec<String> {
    ["signup", "login", "purchase", "level_complete", "subscription_start"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn deeplink_scheme(app_name: &str) -> String {
    let slug: String = app_name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    if slug.is_empty() {
        "app://".to_string()
    } else {
        format!("{slug}://")
    }
}

fn web_install_snippet() -> String {
    "<script src=\"https://cdn.measure.example/sdk.min.js\"></script>".to_string()
}

fn web_init_snippet(app_token: &str) -> String {
    format!("Measure.init({{ appToken: \"{app_token}\" }});")
}

fn init_snippet(framework: Framework, app_token: &str) -> String {
    match framework {
        Framework::Native => format!("MeasureSdk.start(appToken: \"{app_token}\")"),
        Framework::ReactNative | Framework::Expo => {
            format!("Measure.create({{ appToken: '{app_token}' }});")
        }
        Framework::Flutter => format!("Measure.start(AppConfig('{app_token}'));"),
        Framework::Unity => format!("MeasureSdk.Start(\"{app_token}\");"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::InstantProvider;

    fn controller() -> FlowController {
        FlowController::new(
            WizardConfig::instant(),
            Arc::new(InstantProvider::default()),
        )
    }

    #[tokio::test]
    async fn start_prompts_environment_select() {
        let mut fc = controller();
        let outcome = fc.start().await;
        assert_eq!(
            outcome.payloads,
            vec![Payload::Welcome, Payload::EnvironmentSelect]
        );
        assert_eq!(fc.pending(), Some(PromptKind::EnvironmentSelect));
    }

    #[tokio::test]
    async fn out_of_order_answer_is_ignored() {
        let mut fc = controller();
        fc.start().await;
        let outcome = fc
            .handle(UserAction::SelectChannels(vec![AdChannel::Meta]))
            .await
            .unwrap();
        assert!(outcome.ignored);
        // Pending unchanged, no message appended for the bad action.
        assert_eq!(fc.pending(), Some(PromptKind::EnvironmentSelect));
        assert_eq!(fc.session().unwrap().conversation.len(), 1);
    }

    #[tokio::test]
    async fn dev_branch_asks_for_app_name() {
        let mut fc = controller();
        fc.start().await;
        let outcome = fc
            .handle(UserAction::SelectEnvironment(Environment::Dev))
            .await
            .unwrap();
        assert!(matches!(
            outcome.payloads[0],
            Payload::AppNameInput {
                environment: Environment::Dev
            }
        ));
        assert_eq!(fc.pending(), Some(PromptKind::AppNameInput));
    }

    #[tokio::test]
    async fn production_branch_asks_for_platforms() {
        let mut fc = controller();
        fc.start().await;
        let outcome = fc
            .handle(UserAction::SelectEnvironment(Environment::Production))
            .await
            .unwrap();
        assert!(matches!(
            outcome.payloads[0],
            Payload::PlatformMultiSelect { .. }
        ));
    }

    #[tokio::test]
    async fn empty_app_name_blocks_submit_without_mutation() {
        let mut fc = controller();
        fc.start().await;
        fc.handle(UserAction::SelectEnvironment(Environment::Dev))
            .await
            .unwrap();
        let before = fc.session().unwrap().conversation.len();

        let result = fc.handle(UserAction::EnterAppName("  ".to_string())).await;
        assert!(result.is_err());
        assert_eq!(fc.session().unwrap().conversation.len(), before);
        assert_eq!(fc.pending(), Some(PromptKind::AppNameInput));
    }

    #[tokio::test]
    async fn free_text_acknowledged_without_state_change() {
        let mut fc = controller();
        fc.start().await;
        let outcome = fc
            .handle(UserAction::FreeText("what is an SDK?".to_string()))
            .await
            .unwrap();
        assert!(matches!(
            outcome.payloads[0],
            Payload::Acknowledgement { .. }
        ));
        // The decision gate is untouched.
        assert_eq!(fc.pending(), Some(PromptKind::EnvironmentSelect));
    }

    #[tokio::test]
    async fn seeded_environment_skips_the_prompt() {
        let mut seed = SeedStore::new();
        seed.insert(
            crate::seed::keys::SURVEY_ANSWERS,
            r#"{"environment":"dev"}"#,
        );
        let mut fc = FlowController::with_seed(
            WizardConfig::instant(),
            Arc::new(InstantProvider::default()),
            &mut seed,
        );
        let outcome = fc.start().await;
        assert!(matches!(outcome.payloads[1], Payload::AppNameInput { .. }));
        assert_eq!(fc.pending(), Some(PromptKind::AppNameInput));
    }

    #[tokio::test]
    async fn search_failure_degrades_to_retry_prompt() {
        let provider = InstantProvider {
            fail_search: true,
            ..Default::default()
        };
        let mut fc = FlowController::new(WizardConfig::instant(), Arc::new(provider));
        fc.start().await;
        fc.handle(UserAction::SelectEnvironment(Environment::Production))
            .await
            .unwrap();
        fc.handle(UserAction::SelectPlatforms(vec![Platform::Ios]))
            .await
            .unwrap();

        let outcome = fc
            .handle(UserAction::SubmitSearch {
                query: "candy".to_string(),
            })
            .await
            .unwrap();
        assert!(matches!(outcome.payloads[0], Payload::RetryPrompt { .. }));
        // User can search again from the registration prompt.
        assert_eq!(fc.pending(), Some(PromptKind::PlatformRegistration));
    }
}
