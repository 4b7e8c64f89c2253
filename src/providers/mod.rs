//! Async provider facade: external effects behind one swappable interface.
//!
//! The flow controller never talks to a store, dashboard, or clipboard
//! directly; everything goes through [`AsyncProvider`]. The production-ish
//! implementation simulates round-trips with delays, and tests swap in
//! [`InstantProvider`].

use async_trait::async_trait;
use rand::Rng;
use tracing::debug;

use crate::config::WizardConfig;
use crate::error::ProviderError;
use crate::protocol::StoreSearchResult;
use crate::steps::Platform;

/// External-effect interface for the wizard.
#[async_trait]
pub trait AsyncProvider: Send + Sync {
    /// App-store search. Results arrive after a bounded delay.
    async fn search(
        &self,
        query: &str,
        platform: Option<Platform>,
    ) -> Result<Vec<StoreSearchResult>, ProviderError>;

    /// Dashboard-side SDK registration detection. One deferred completion;
    /// callers that want polling re-invoke on their own schedule.
    async fn detect_registration(&self, app_token: &str) -> Result<bool, ProviderError>;

    /// Copy text to the user's clipboard.
    async fn copy_to_clipboard(&self, text: &str) -> Result<(), ProviderError>;
}

/// Simulated provider: canned results delivered after configured delays.
pub struct SimulatedProvider {
    config: WizardConfig,
}

impl SimulatedProvider {
    pub fn new(config: WizardConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AsyncProvider for SimulatedProvider {
    async fn search(
        &self,
        query: &str,
        platform: Option<Platform>,
    ) -> Result<Vec<StoreSearchResult>, ProviderError> {
        let jitter_ms = self.config.search_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            std::time::Duration::ZERO
        } else {
            std::time::Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        tokio::time::sleep(self.config.search_delay + jitter).await;

        let platform = platform.unwrap_or(Platform::Ios);
        let base = query.trim();
        if base.is_empty() {
            return Ok(Vec::new());
        }
        debug!(query = base, %platform, "Simulated store search");
        Ok(vec![
            StoreSearchResult {
                name: base.to_string(),
                store_id: format!("{}.{}", platform, slug(base)),
                platform,
                icon_url: None,
            },
            StoreSearchResult {
                name: format!("{base} Pro"),
                store_id: format!("{}.{}.pro", platform, slug(base)),
                platform,
                icon_url: None,
            },
            StoreSearchResult {
                name: format!("{base} Lite"),
                store_id: format!("{}.{}.lite", platform, slug(base)),
                platform,
                icon_url: None,
            },
        ])
    }

    async fn detect_registration(&self, app_token: &str) -> Result<bool, ProviderError> {
        tokio::time::sleep(self.config.detection_delay).await;
        debug!(app_token, "Simulated registration detection");
        Ok(true)
    }

    async fn copy_to_clipboard(&self, text: &str) -> Result<(), ProviderError> {
        debug!(len = text.len(), "Simulated clipboard write");
        Ok(())
    }
}

fn slug(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Test stub: resolves synchronously with configurable outcomes.
pub struct InstantProvider {
    pub results: Vec<StoreSearchResult>,
    pub detected: bool,
    pub fail_search: bool,
}

impl InstantProvider {
    pub fn detecting(results: Vec<StoreSearchResult>) -> Self {
        Self {
            results,
            detected: true,
            fail_search: false,
        }
    }
}

impl Default for InstantProvider {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            detected: true,
            fail_search: false,
        }
    }
}

#[async_trait]
impl AsyncProvider for InstantProvider {
    async fn search(
        &self,
        _query: &str,
        _platform: Option<Platform>,
    ) -> Result<Vec<StoreSearchResult>, ProviderError> {
        if self.fail_search {
            return Err(ProviderError::SearchFailed("stubbed failure".to_string()));
        }
        Ok(self.results.clone())
    }

    async fn detect_registration(&self, _app_token: &str) -> Result<bool, ProviderError> {
        Ok(self.detected)
    }

    async fn copy_to_clipboard(&self, _text: &str) -> Result<(), ProviderError> {
        Ok(())
    }
}
