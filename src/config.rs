//! Configuration types.

use std::time::Duration;

/// Wizard configuration.
#[derive(Debug, Clone)]
pub struct WizardConfig {
    /// Simulated bot "typing" latency before a composed turn becomes visible.
    pub typing_delay: Duration,
    /// Base delay for simulated store searches.
    pub search_delay: Duration,
    /// Upper bound of the random jitter added to `search_delay`.
    pub search_jitter: Duration,
    /// Delay before SDK registration detection completes.
    pub detection_delay: Duration,
    /// Alphabet tokens are minted from.
    pub token_alphabet: String,
    /// Length of each minted token.
    pub token_length: usize,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            typing_delay: Duration::from_millis(600),
            search_delay: Duration::from_millis(900),
            search_jitter: Duration::from_millis(400),
            detection_delay: Duration::from_millis(1500),
            token_alphabet: "abcdefghijklmnopqrstuvwxyz0123456789".to_string(),
            token_length: 12,
        }
    }
}

impl WizardConfig {
    /// All delays zeroed. Used in tests so flows run deterministically.
    pub fn instant() -> Self {
        Self {
            typing_delay: Duration::ZERO,
            search_delay: Duration::ZERO,
            search_jitter: Duration::ZERO,
            detection_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_nonzero_delays() {
        let cfg = WizardConfig::default();
        assert!(cfg.typing_delay > Duration::ZERO);
        assert!(cfg.search_delay > Duration::ZERO);
        assert!(cfg.detection_delay > Duration::ZERO);
        assert_eq!(cfg.token_length, 12);
    }

    #[test]
    fn instant_config_zeroes_delays_only() {
        let cfg = WizardConfig::instant();
        assert_eq!(cfg.typing_delay, Duration::ZERO);
        assert_eq!(cfg.search_delay, Duration::ZERO);
        assert_eq!(cfg.search_jitter, Duration::ZERO);
        assert_eq!(cfg.detection_delay, Duration::ZERO);
        assert!(!cfg.token_alphabet.is_empty());
    }
}
