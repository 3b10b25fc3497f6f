// ============================================
// Tag Drift Detector (标签趋势检测)
// ============================================
//
// Compares where engagement landed recently against where it landed
// historically, per tag:
//
//   recent_share(t)     = recent_engagement(t) / Σ recent_engagement
//   historical_share(t) = engagement(t)        / Σ engagement
//   drift(t)            = recent_share(t) - historical_share(t)
//
// An item counts as "recent" when it was last viewed inside the lookback
// window. Drift lies in [-1, 1]; positive means the tag is rising.

use crate::config::EngineConfig;
use crate::models::Item;
use crate::utils::days_between;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Signed drift per tag id
pub type DriftMap = HashMap<String, f64>;

#[derive(Debug, Clone)]
pub struct DriftDetector {
    use_weight: f64,
    view_weight: f64,
    lookback_days: f64,
}

impl Default for DriftDetector {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct TagEngagement {
    recent: f64,
    historical: f64,
}

impl DriftDetector {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            use_weight: config.use_weight,
            view_weight: config.view_weight,
            lookback_days: config.drift_lookback_days,
        }
    }

    /// Drift for every tag present in `items`. Empty input gives an empty map.
    pub fn detect_drift(&self, items: &[Item], now: DateTime<Utc>) -> DriftMap {
        let mut per_tag: HashMap<&str, TagEngagement> = HashMap::new();
        let mut total_recent = 0.0;
        let mut total_historical = 0.0;

        for item in items {
            let engagement = self.interaction_weight(item);
            let recent = item
                .last_viewed_at
                .map(|viewed_at| days_between(viewed_at, now) <= self.lookback_days)
                .unwrap_or(false);

            for tag in &item.tags {
                let entry = per_tag.entry(tag.id.as_str()).or_default();
                entry.historical += engagement;
                total_historical += engagement;
                if recent {
                    entry.recent += engagement;
                    total_recent += engagement;
                }
            }
        }

        let share = |value: f64, total: f64| if total > 0.0 { value / total } else { 0.0 };

        let drift: DriftMap = per_tag
            .into_iter()
            .map(|(tag, e)| {
                let value = share(e.recent, total_recent) - share(e.historical, total_historical);
                (tag.to_string(), value)
            })
            .collect();

        debug!(
            tags = drift.len(),
            rising = drift.values().filter(|d| **d > 0.0).count(),
            "Tag drift computed"
        );

        drift
    }

    /// Tags with positive drift
    pub fn rising_tags(&self, items: &[Item], now: DateTime<Utc>) -> BTreeSet<String> {
        self.detect_drift(items, now)
            .into_iter()
            .filter(|(_, drift)| *drift > 0.0)
            .map(|(tag, _)| tag)
            .collect()
    }

    fn interaction_weight(&self, item: &Item) -> f64 {
        item.use_count as f64 * self.use_weight + item.view_count as f64 * self.view_weight
    }
}
