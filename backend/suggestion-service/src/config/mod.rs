use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Environment variable prefix for config overrides, e.g. `SUGGESTION_HAND_SIZE=16`
pub const ENV_PREFIX: &str = "SUGGESTION_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Upper bound for `novelty_window_hours` (one year)
pub const MAX_NOVELTY_WINDOW_HOURS: i64 = 24 * 365;

/// Upper bound for `cache_ttl_secs` (one day)
pub const MAX_CACHE_TTL_SECS: i64 = 24 * 60 * 60;

/// Engine configuration. Flat so that every field maps to one env variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Target hand size
    pub hand_size: usize,

    // Bucket slot counts, filled in this order
    pub keepers_slots: usize,
    pub new_slots: usize,
    pub diverse_slots: usize,
    pub forgotten_slots: usize,
    pub explore_slots: usize,
    pub wildcard_slots: usize,

    // Engagement weights
    pub use_weight: f64,
    pub view_weight: f64,
    pub favorite_bonus: f64,

    /// Recency half-life in days
    pub recency_half_life_days: f64,
    /// Days-since-view assumed for never-viewed items
    pub unseen_days: f64,
    /// Recent queries considered for scope matching
    pub max_recent_queries: usize,

    /// Imports younger than this count as new
    pub novelty_window_hours: i64,
    /// Used items unseen for longer than this count as forgotten
    pub forgotten_threshold_days: f64,
    /// Multiplier for items shown last time, in (0, 1)
    pub staleness_penalty: f64,
    /// Recent window for tag drift
    pub drift_lookback_days: f64,

    /// Below this, nothing is suggested
    pub min_library_size: usize,
    /// Below this, the whole library is returned newest first
    pub small_library_threshold: usize,
    /// Library-wide uses+views below this triggers cold start ordering
    pub cold_start_interaction_threshold: u64,

    /// Result cache time-to-live
    pub cache_ttl_secs: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hand_size: 12,

            keepers_slots: 6,
            new_slots: 2,
            diverse_slots: 1,
            forgotten_slots: 1,
            explore_slots: 1,
            wildcard_slots: 1,

            use_weight: 3.0,
            view_weight: 0.5,
            favorite_bonus: 5.0,

            recency_half_life_days: 14.0,
            unseen_days: 30.0,
            max_recent_queries: 5,

            novelty_window_hours: 48,
            forgotten_threshold_days: 14.0,
            staleness_penalty: 0.80,
            drift_lookback_days: 7.0,

            min_library_size: 5,
            small_library_threshold: 20,
            cold_start_interaction_threshold: 10,

            cache_ttl_secs: 300, // 5 minutes
        }
    }
}

impl EngineConfig {
    /// Load defaults overridden by `SUGGESTION_*` environment variables.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let config: EngineConfig = envy::prefixed(ENV_PREFIX).from_env()?;
        if let Err(err) = config.validate() {
            warn!(error = %err, "Rejected configuration overrides");
            return Err(err);
        }

        Ok(config)
    }

    /// Sum of all bucket slot counts
    pub fn total_slots(&self) -> usize {
        self.keepers_slots
            + self.new_slots
            + self.diverse_slots
            + self.forgotten_slots
            + self.explore_slots
            + self.wildcard_slots
    }

    pub fn validate(&self) -> Result<()> {
        if self.hand_size == 0 {
            return Err(ConfigError::Invalid("hand_size must be positive".into()));
        }
        if self.total_slots() > self.hand_size {
            return Err(ConfigError::Invalid(format!(
                "bucket slots ({}) exceed hand_size ({})",
                self.total_slots(),
                self.hand_size
            )));
        }
        if !(self.recency_half_life_days > 0.0) {
            return Err(ConfigError::Invalid(
                "recency_half_life_days must be positive".into(),
            ));
        }
        if !(self.staleness_penalty > 0.0 && self.staleness_penalty < 1.0) {
            return Err(ConfigError::Invalid(
                "staleness_penalty must be in (0, 1)".into(),
            ));
        }
        if self.min_library_size > self.small_library_threshold {
            return Err(ConfigError::Invalid(format!(
                "min_library_size ({}) exceeds small_library_threshold ({})",
                self.min_library_size, self.small_library_threshold
            )));
        }
        if self.use_weight < 0.0 || self.view_weight < 0.0 || self.favorite_bonus < 0.0 {
            return Err(ConfigError::Invalid(
                "engagement weights must be non-negative".into(),
            ));
        }
        if !(0..=MAX_NOVELTY_WINDOW_HOURS).contains(&self.novelty_window_hours) {
            return Err(ConfigError::Invalid(format!(
                "novelty_window_hours ({}) must be in [0, {}]",
                self.novelty_window_hours, MAX_NOVELTY_WINDOW_HOURS
            )));
        }
        if !(0..=MAX_CACHE_TTL_SECS).contains(&self.cache_ttl_secs) {
            return Err(ConfigError::Invalid(format!(
                "cache_ttl_secs ({}) must be in [0, {}]",
                self.cache_ttl_secs, MAX_CACHE_TTL_SECS
            )));
        }
        Ok(())
    }

    /// Novelty window as a duration, clamped to the accepted range
    pub fn novelty_window(&self) -> Duration {
        let hours = self.novelty_window_hours.clamp(0, MAX_NOVELTY_WINDOW_HOURS);
        Duration::try_hours(hours).unwrap_or(Duration::zero())
    }

    /// Cache time-to-live as a duration, clamped to the accepted range
    pub fn cache_ttl(&self) -> Duration {
        let secs = self.cache_ttl_secs.clamp(0, MAX_CACHE_TTL_SECS);
        Duration::try_seconds(secs).unwrap_or(Duration::zero())
    }

    /// Decay constant derived from the half-life
    pub fn recency_lambda(&self) -> f64 {
        std::f64::consts::LN_2 / self.recency_half_life_days
    }
}
