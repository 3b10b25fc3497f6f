// ============================================
// Suggestion Engine (推荐管线)
// ============================================
//
// Pipeline:
//   library size < min_library_size         → empty
//   library size < small_library_threshold  → whole library, newest first
//   total interactions < cold-start limit   → recency + tag diversity
//   otherwise                               → score → drift → buckets
//                                             → backfill → positional order
//
// Pure and synchronous: the same inputs always give the same hand.

use crate::config::{EngineConfig, Result};
use crate::models::{Branch, Context, Item, Suggestion, SuggestionStats};
use crate::services::drift::DriftDetector;
use crate::services::ordering::PositionalOrderer;
use crate::services::scoring::Scorer;
use crate::services::slots::SlotFiller;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SuggestionEngine {
    config: EngineConfig,
    scorer: Scorer,
    drift_detector: DriftDetector,
    slot_filler: SlotFiller,
    orderer: PositionalOrderer,
}

impl Default for SuggestionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SuggestionEngine {
    /// Engine with all default settings
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create with custom config, without validation
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            scorer: Scorer::new(&config),
            drift_detector: DriftDetector::new(&config),
            slot_filler: SlotFiller::new(&config),
            orderer: PositionalOrderer::new(),
            config,
        }
    }

    /// Create with custom config, rejecting inconsistent settings
    pub fn try_new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_config(config))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ordered hand for `items` in `context`
    pub fn suggest(&self, items: &[Item], context: &Context, now: DateTime<Utc>) -> Vec<Item> {
        self.suggest_with_stats(items, context, now).items
    }

    /// Identifiers of the ordered hand
    pub fn suggest_ids(&self, items: &[Item], context: &Context, now: DateTime<Utc>) -> Vec<Uuid> {
        self.suggest_with_stats(items, context, now).ids()
    }

    pub fn suggest_with_stats(
        &self,
        items: &[Item],
        context: &Context,
        now: DateTime<Utc>,
    ) -> Suggestion {
        let mut stats = SuggestionStats {
            library_size: items.len(),
            ..Default::default()
        };

        let ordered: Vec<&Item> = if items.len() < self.config.min_library_size {
            stats.branch = Branch::TooSmall;
            Vec::new()
        } else if items.len() < self.config.small_library_threshold {
            stats.branch = Branch::SmallLibrary;
            by_import_recency(items)
        } else if total_interactions(items) < self.config.cold_start_interaction_threshold {
            stats.branch = Branch::ColdStart;
            self.cold_start_order(items)
        } else {
            stats.branch = Branch::Full;
            self.run_pipeline(items, context, now, &mut stats)
        };

        stats.final_count = ordered.len();

        info!(
            branch = stats.branch.as_str(),
            surface = context.surface.as_str(),
            library_size = stats.library_size,
            result_size = stats.final_count,
            "Suggestions computed"
        );

        Suggestion {
            items: ordered.into_iter().cloned().collect(),
            stats,
        }
    }

    fn run_pipeline<'a>(
        &self,
        items: &'a [Item],
        context: &Context,
        now: DateTime<Utc>,
        stats: &mut SuggestionStats,
    ) -> Vec<&'a Item> {
        let scored = self.scorer.score_all(items, context, now);
        let drift = self.drift_detector.detect_drift(items, now);

        let hand = self.slot_filler.fill(&scored, items, context, &drift, now);
        stats.keepers_count = hand.keepers.len();
        stats.new_count = hand.new.len();
        stats.diverse_count = hand.diverse.len();
        stats.forgotten_count = hand.forgotten.len();
        stats.explore_count = hand.explore.len();
        stats.wildcard_count = hand.wildcard.len();

        let flat = self.slot_filler.backfill(&hand, &scored);
        stats.backfilled_count = flat.len().saturating_sub(hand.len());

        let score_by_item: HashMap<Uuid, f64> =
            scored.iter().map(|s| (s.item.id, s.score)).collect();
        self.orderer.order(flat, &score_by_item)
    }

    /// Newest item of each primary tag first, then the rest by recency
    pub fn cold_start_order<'a>(&self, items: &'a [Item]) -> Vec<&'a Item> {
        let by_recency = by_import_recency(items);

        let mut seen_tags: HashSet<Option<&str>> = HashSet::new();
        let (mut ordered, rest): (Vec<&'a Item>, Vec<&'a Item>) = by_recency
            .into_iter()
            .partition(|item: &&'a Item| seen_tags.insert(Item::primary_tag(*item)));

        ordered.extend(rest);
        ordered.truncate(self.config.hand_size);
        ordered
    }
}

/// All items, newest import first (ties by id)
fn by_import_recency(items: &[Item]) -> Vec<&Item> {
    let mut sorted: Vec<&Item> = items.iter().collect();
    sorted.sort_by(|a, b| {
        b.imported_at
            .cmp(&a.imported_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    sorted
}

fn total_interactions(items: &[Item]) -> u64 {
    items.iter().map(Item::interaction_count).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tag;
    use chrono::Duration;

    fn create_test_library(size: usize, now: DateTime<Utc>) -> Vec<Item> {
        (0..size)
            .map(|i| {
                let mut item = Item::new(Uuid::new_v4(), now - Duration::hours(i as i64 * 7));
                item.tags = vec![Tag::new(format!("tag{}", i % 3))];
                item
            })
            .collect()
    }

    #[test]
    fn test_too_small_library_is_empty() {
        let engine = SuggestionEngine::new();
        let now = Utc::now();
        let items = create_test_library(4, now);

        let suggestion = engine.suggest_with_stats(&items, &Context::browse(), now);
        assert!(suggestion.items.is_empty());
        assert_eq!(suggestion.stats.branch, Branch::TooSmall);
    }

    #[test]
    fn test_small_library_returned_newest_first() {
        let engine = SuggestionEngine::new();
        let now = Utc::now();
        let mut items = create_test_library(10, now);
        items.reverse();

        let result = engine.suggest(&items, &Context::browse(), now);
        assert_eq!(result.len(), 10);
        assert!(result.windows(2).all(|w| w[0].imported_at >= w[1].imported_at));
    }

    #[test]
    fn test_cold_start_interleaves_tags() {
        let engine = SuggestionEngine::new();
        let now = Utc::now();
        let items = create_test_library(30, now);

        let suggestion = engine.suggest_with_stats(&items, &Context::browse(), now);
        assert_eq!(suggestion.stats.branch, Branch::ColdStart);
        assert_eq!(suggestion.items.len(), 12);

        // Newest of each tag leads
        let leading: Vec<_> = suggestion.items[..3].iter().map(|i| i.primary_tag()).collect();
        assert_eq!(leading, vec![Some("tag0"), Some("tag1"), Some("tag2")]);
        assert_eq!(suggestion.items[0].id, items[0].id);
    }

    #[test]
    fn test_full_pipeline_stats_add_up() {
        let engine = SuggestionEngine::new();
        let now = Utc::now();
        let mut items = create_test_library(40, now);
        for (i, item) in items.iter_mut().enumerate() {
            item.use_count = (i % 5) as u32;
            item.view_count = 2;
            item.last_viewed_at = Some(now - Duration::days(i as i64));
        }

        let suggestion = engine.suggest_with_stats(&items, &Context::browse(), now);
        let stats = &suggestion.stats;
        assert_eq!(stats.branch, Branch::Full);
        assert_eq!(stats.final_count, 12);

        let bucketed = stats.keepers_count
            + stats.new_count
            + stats.diverse_count
            + stats.forgotten_count
            + stats.explore_count
            + stats.wildcard_count;
        assert_eq!(bucketed + stats.backfilled_count, stats.final_count);
    }

    #[test]
    fn test_min_library_size_is_inclusive() {
        let engine = SuggestionEngine::new();
        let now = Utc::now();
        let items = create_test_library(5, now);

        let suggestion = engine.suggest_with_stats(&items, &Context::browse(), now);
        assert_eq!(suggestion.stats.branch, Branch::SmallLibrary);
        assert_eq!(suggestion.items.len(), 5);
    }

    #[test]
    fn test_small_library_threshold_is_exclusive() {
        let engine = SuggestionEngine::new();
        let now = Utc::now();

        let items = create_test_library(19, now);
        let suggestion = engine.suggest_with_stats(&items, &Context::browse(), now);
        assert_eq!(suggestion.stats.branch, Branch::SmallLibrary);
        assert_eq!(suggestion.items.len(), 19);

        let items = create_test_library(20, now);
        let suggestion = engine.suggest_with_stats(&items, &Context::browse(), now);
        assert_eq!(suggestion.stats.branch, Branch::ColdStart);
        assert_eq!(suggestion.items.len(), 12);
    }

    #[test]
    fn test_cold_start_threshold_boundary() {
        let engine = SuggestionEngine::new();
        let now = Utc::now();
        let mut items = create_test_library(20, now);

        items[0].use_count = 5;
        items[0].view_count = 4;
        let suggestion = engine.suggest_with_stats(&items, &Context::browse(), now);
        assert_eq!(suggestion.stats.branch, Branch::ColdStart);

        items[0].view_count = 5;
        let suggestion = engine.suggest_with_stats(&items, &Context::browse(), now);
        assert_eq!(suggestion.stats.branch, Branch::Full);
        assert_eq!(suggestion.items.len(), 12);
    }

    #[test]
    fn test_out_of_range_novelty_window() {
        let config = EngineConfig {
            novelty_window_hours: i64::MAX / 2,
            ..Default::default()
        };
        assert!(SuggestionEngine::try_new(config.clone()).is_err());

        // Unvalidated construction clamps instead of panicking
        let engine = SuggestionEngine::with_config(config);
        let now = Utc::now();
        let mut items = create_test_library(30, now);
        for item in items.iter_mut() {
            item.use_count = 1;
        }
        assert_eq!(engine.suggest(&items, &Context::browse(), now).len(), 12);
    }

    #[test]
    fn test_try_new_rejects_invalid_config() {
        let config = EngineConfig {
            hand_size: 0,
            ..Default::default()
        };
        assert!(SuggestionEngine::try_new(config).is_err());
        assert!(SuggestionEngine::try_new(EngineConfig::default()).is_ok());
    }
}
