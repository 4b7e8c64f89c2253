//! AppRegistry: the mutable collection of registered apps.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::WizardConfig;
use crate::protocol::Conversation;
use crate::steps::{build_steps, AdChannel, Environment, Framework, Platform, StepId, StepStatus};

use super::app::{AppInfo, AppTokens, RegisteredApp};

/// Completed/total step counts, for one app or across all apps.
///
/// An empty registry (or an app with no steps) yields the zero sentinel
/// rather than an error; `fraction` is then 0.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn none() -> Self {
        Self {
            completed: 0,
            total: 0,
        }
    }

    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Registry of every app created in this wizard session.
///
/// Apps are never deleted. Exactly one app is expanded at a time; a newly
/// registered app becomes the expanded one.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AppRegistry {
    apps: Vec<RegisteredApp>,
}

impl AppRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an app: materialize its step graph, mint its tokens, set the
    /// starting phase (dev apps start in phase 1, production in phase 2),
    /// and make it the single expanded app.
    pub fn register(
        &mut self,
        info: AppInfo,
        platforms: Vec<Platform>,
        environment: Environment,
        framework: Option<Framework>,
        conversation: Conversation,
        config: &WizardConfig,
    ) -> Uuid {
        let steps = build_steps(&platforms, framework, environment);
        let tokens = AppTokens::mint(config);
        let id = Uuid::new_v4();
        let current_phase = match environment {
            Environment::Dev => 1,
            Environment::Production => 2,
        };

        for app in &mut self.apps {
            app.expanded = false;
        }

        info!(
            app = %id,
            name = %info.name,
            %environment,
            steps = steps.len(),
            "App registered"
        );

        self.apps.push(RegisteredApp {
            id,
            info,
            platforms,
            environment,
            steps,
            current_phase,
            framework,
            channels: Vec::new(),
            tokens,
            conversation,
            expanded: true,
            pending: None,
        });

        id
    }

    pub fn get(&self, id: Uuid) -> Option<&RegisteredApp> {
        self.apps.iter().find(|a| a.id == id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut RegisteredApp> {
        self.apps.iter_mut().find(|a| a.id == id)
    }

    /// Idempotent status update; unknown app ids are ignored with a log.
    pub fn update_step_status(&mut self, id: Uuid, step: StepId, status: StepStatus) {
        match self.get_mut(id) {
            Some(app) => app.set_step_status(step, status),
            None => debug!(app = %id, %step, "update_step_status for unknown app; ignoring"),
        }
    }

    /// Last-write-wins partial update.
    pub fn set_framework(&mut self, id: Uuid, framework: Framework) {
        if let Some(app) = self.get_mut(id) {
            debug!(app = %id, %framework, "Framework set");
            app.framework = Some(framework);
        }
    }

    /// Last-write-wins partial update.
    pub fn set_channels(&mut self, id: Uuid, channels: Vec<AdChannel>) {
        if let Some(app) = self.get_mut(id) {
            debug!(app = %id, count = channels.len(), "Channels set");
            app.channels = channels;
        }
    }

    /// Expand one app, collapsing all others.
    pub fn expand(&mut self, id: Uuid) {
        for app in &mut self.apps {
            app.expanded = app.id == id;
        }
    }

    pub fn expanded_app(&self) -> Option<&RegisteredApp> {
        self.apps.iter().find(|a| a.expanded)
    }

    pub fn can_start_step(&self, id: Uuid, step: StepId) -> bool {
        self.get(id).is_some_and(|a| a.can_start_step(step))
    }

    pub fn progress(&self, id: Uuid) -> Progress {
        match self.get(id) {
            Some(app) => Progress {
                completed: app.completed_count(),
                total: app.steps.len(),
            },
            None => Progress::none(),
        }
    }

    /// Sum of completed/total across all apps.
    pub fn overall_progress(&self) -> Progress {
        let mut total = Progress::none();
        for app in &self.apps {
            total.completed += app.completed_count();
            total.total += app.steps.len();
        }
        total
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredApp> {
        self.apps.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_one_app() -> (AppRegistry, Uuid) {
        let mut registry = AppRegistry::new();
        let config = WizardConfig::instant();
        let id = registry.register(
            AppInfo {
                name: "Candy".to_string(),
                store_id: Some("id123".to_string()),
                timezone: "UTC".to_string(),
                currency: "USD".to_string(),
            },
            vec![Platform::Ios],
            Environment::Dev,
            Some(Framework::ReactNative),
            Conversation::new(),
            &config,
        );
        (registry, id)
    }

    #[test]
    fn register_materializes_steps_and_tokens() {
        let (registry, id) = registry_with_one_app();
        let app = registry.get(id).unwrap();
        assert_eq!(app.steps.len(), 4);
        assert!(!app.tokens.app_token.is_empty());
        assert_eq!(app.current_phase, 1);
        assert!(app.expanded);
    }

    #[test]
    fn production_apps_start_at_phase_two() {
        let mut registry = AppRegistry::new();
        let config = WizardConfig::instant();
        let id = registry.register(
            AppInfo {
                name: "Prod".to_string(),
                store_id: None,
                timezone: "UTC".to_string(),
                currency: "USD".to_string(),
            },
            vec![Platform::Android],
            Environment::Production,
            Some(Framework::Flutter),
            Conversation::new(),
            &config,
        );
        assert_eq!(registry.get(id).unwrap().current_phase, 2);
    }

    #[test]
    fn exactly_one_app_expanded() {
        let (mut registry, first) = registry_with_one_app();
        let config = WizardConfig::instant();
        let second = registry.register(
            AppInfo {
                name: "Second".to_string(),
                store_id: None,
                timezone: "UTC".to_string(),
                currency: "USD".to_string(),
            },
            vec![Platform::Web],
            Environment::Dev,
            None,
            Conversation::new(),
            &config,
        );

        assert!(!registry.get(first).unwrap().expanded);
        assert!(registry.get(second).unwrap().expanded);
        assert_eq!(registry.expanded_app().unwrap().id, second);

        registry.expand(first);
        assert!(registry.get(first).unwrap().expanded);
        assert!(!registry.get(second).unwrap().expanded);
    }

    #[test]
    fn update_step_status_unknown_app_is_noop() {
        let (mut registry, _) = registry_with_one_app();
        registry.update_step_status(Uuid::new_v4(), StepId::SdkInstall, StepStatus::Completed);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn progress_counts_completed_steps() {
        let (mut registry, id) = registry_with_one_app();
        assert_eq!(registry.progress(id).fraction(), 0.0);

        registry.update_step_status(id, StepId::SdkInstall, StepStatus::Completed);
        registry.update_step_status(id, StepId::SdkInit, StepStatus::Completed);

        let progress = registry.progress(id);
        assert_eq!(progress.completed, 2);
        assert_eq!(progress.total, 4);
        assert!((progress.fraction() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn overall_progress_empty_registry_is_sentinel() {
        let registry = AppRegistry::new();
        let overall = registry.overall_progress();
        assert_eq!(overall, Progress::none());
        assert_eq!(overall.fraction(), 0.0);
    }

    #[test]
    fn overall_progress_sums_across_apps() {
        let (mut registry, first) = registry_with_one_app();
        let config = WizardConfig::instant();
        registry.register(
            AppInfo {
                name: "Second".to_string(),
                store_id: None,
                timezone: "UTC".to_string(),
                currency: "USD".to_string(),
            },
            vec![Platform::Web],
            Environment::Dev,
            None,
            Conversation::new(),
            &config,
        );

        registry.update_step_status(first, StepId::SdkInstall, StepStatus::Completed);
        let overall = registry.overall_progress();
        assert_eq!(overall.completed, 1);
        assert_eq!(overall.total, 4 + 3);
    }

    #[test]
    fn set_framework_and_channels_last_write_wins() {
        let (mut registry, id) = registry_with_one_app();
        registry.set_framework(id, Framework::Flutter);
        registry.set_framework(id, Framework::Expo);
        assert_eq!(registry.get(id).unwrap().framework, Some(Framework::Expo));

        registry.set_channels(id, vec![AdChannel::Meta]);
        registry.set_channels(id, vec![AdChannel::TikTok, AdChannel::GoogleAds]);
        assert_eq!(
            registry.get(id).unwrap().channels,
            vec![AdChannel::TikTok, AdChannel::GoogleAds]
        );
    }
}
