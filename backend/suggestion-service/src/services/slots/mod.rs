// ============================================
// Slot Filler (分桶选择)
// ============================================
//
// Splits the hand into six buckets, each with its own selection strategy.
// Buckets are filled in a fixed order and every bucket receives the set of
// item ids claimed by earlier buckets:
//
//   1. Keepers    top score, previous-session items penalised
//   2. New        imported inside the novelty window, newest first
//   3. Diverse    high engagement, brings a tag not yet in the hand
//   4. Forgotten  used before, not seen for a while (nostalgia)
//   5. Explore    every tag untouched library-wide
//   6. Wildcard   carries a rising tag
//
// Short buckets are topped up by `backfill` from the global ranking.

use crate::config::EngineConfig;
use crate::models::{Context, Hand, Item, ScoredItem};
use crate::services::drift::DriftMap;
use crate::services::scoring::Scorer;
use crate::utils::cmp_desc;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SlotFiller {
    scorer: Scorer,
    hand_size: usize,
    keepers_slots: usize,
    new_slots: usize,
    diverse_slots: usize,
    forgotten_slots: usize,
    explore_slots: usize,
    wildcard_slots: usize,
    staleness_penalty: f64,
    novelty_window: Duration,
    forgotten_threshold_days: f64,
}

impl Default for SlotFiller {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl SlotFiller {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            scorer: Scorer::new(config),
            hand_size: config.hand_size,
            keepers_slots: config.keepers_slots,
            new_slots: config.new_slots,
            diverse_slots: config.diverse_slots,
            forgotten_slots: config.forgotten_slots,
            explore_slots: config.explore_slots,
            wildcard_slots: config.wildcard_slots,
            staleness_penalty: config.staleness_penalty,
            novelty_window: config.novelty_window(),
            forgotten_threshold_days: config.forgotten_threshold_days,
        }
    }

    /// Fill all six buckets in order. `scored` must be sorted best first.
    pub fn fill<'a>(
        &self,
        scored: &[ScoredItem<'a>],
        all_items: &'a [Item],
        context: &Context,
        drift: &DriftMap,
        now: DateTime<Utc>,
    ) -> Hand<'a> {
        let mut claimed: HashSet<Uuid> = HashSet::new();

        let keepers = self.fill_keepers(scored, &context.previous_session, &claimed);
        claim(&mut claimed, &keepers);

        let new = self.fill_new(all_items, now, &claimed);
        claim(&mut claimed, &new);

        let covered: HashSet<&str> = keepers
            .iter()
            .chain(&new)
            .flat_map(|item| item.tags.iter().map(|t| t.id.as_str()))
            .collect();
        let diverse = self.fill_diverse(all_items, &covered, &claimed);
        claim(&mut claimed, &diverse);

        let forgotten = self.fill_forgotten(all_items, now, &claimed);
        claim(&mut claimed, &forgotten);

        let explore = self.fill_explore(all_items, &claimed);
        claim(&mut claimed, &explore);

        let wildcard = self.fill_wildcard(all_items, drift, &claimed);

        debug!(
            keepers = keepers.len(),
            new = new.len(),
            diverse = diverse.len(),
            forgotten = forgotten.len(),
            explore = explore.len(),
            wildcard = wildcard.len(),
            "Buckets filled"
        );

        Hand {
            keepers,
            new,
            diverse,
            forgotten,
            explore,
            wildcard,
        }
    }

    /// Flatten the hand and top it up from the global ranking
    pub fn backfill<'a>(&self, hand: &Hand<'a>, scored: &[ScoredItem<'a>]) -> Vec<&'a Item> {
        let mut flat = hand.flatten();
        flat.truncate(self.hand_size);
        let mut present: HashSet<Uuid> = flat.iter().map(|item| item.id).collect();

        for candidate in scored {
            if flat.len() >= self.hand_size {
                break;
            }
            if present.insert(candidate.item.id) {
                flat.push(candidate.item);
            }
        }

        flat
    }

    /// Top scored items after the staleness penalty
    pub fn fill_keepers<'a>(
        &self,
        scored: &[ScoredItem<'a>],
        previous_session: &BTreeSet<Uuid>,
        exclude: &HashSet<Uuid>,
    ) -> Vec<&'a Item> {
        let mut candidates: Vec<ScoredItem<'a>> = scored
            .iter()
            .filter(|s| !exclude.contains(&s.item.id))
            .map(|s| {
                let score = if previous_session.contains(&s.item.id) {
                    s.score * self.staleness_penalty
                } else {
                    s.score
                };
                ScoredItem { item: s.item, score }
            })
            .collect();

        candidates.sort_by(|a, b| {
            cmp_desc(a.score, b.score).then_with(|| a.item.id.cmp(&b.item.id))
        });
        candidates
            .into_iter()
            .take(self.keepers_slots)
            .map(|s| s.item)
            .collect()
    }

    /// Recently imported items, newest first
    pub fn fill_new<'a>(
        &self,
        items: &'a [Item],
        now: DateTime<Utc>,
        exclude: &HashSet<Uuid>,
    ) -> Vec<&'a Item> {
        let mut candidates: Vec<&'a Item> = items
            .iter()
            .filter(|item| !exclude.contains(&item.id))
            .filter(|item| now - item.imported_at <= self.novelty_window)
            .collect();

        candidates.sort_by(|a, b| {
            b.imported_at
                .cmp(&a.imported_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        candidates.truncate(self.new_slots);
        candidates
    }

    /// Highest engagement items that add a tag outside `covered_tags`
    pub fn fill_diverse<'a>(
        &self,
        items: &'a [Item],
        covered_tags: &HashSet<&str>,
        exclude: &HashSet<Uuid>,
    ) -> Vec<&'a Item> {
        let mut candidates: Vec<(&'a Item, f64)> = items
            .iter()
            .filter(|item| !exclude.contains(&item.id))
            .map(|item| (item, self.scorer.engagement(item)))
            .collect();
        candidates.sort_by(|a, b| cmp_desc(a.1, b.1).then_with(|| a.0.id.cmp(&b.0.id)));

        let mut covered: HashSet<&str> = covered_tags.clone();
        let mut selected = Vec::new();

        for (item, _) in candidates {
            if selected.len() >= self.diverse_slots {
                break;
            }
            let brings_new_tag = item.tags.iter().any(|t| !covered.contains(t.id.as_str()));
            if brings_new_tag {
                covered.extend(item.tags.iter().map(|t| t.id.as_str()));
                selected.push(item);
            }
        }

        selected
    }

    /// Used items not viewed for a while, by ln(1+uses) * ln(1+days)
    pub fn fill_forgotten<'a>(
        &self,
        items: &'a [Item],
        now: DateTime<Utc>,
        exclude: &HashSet<Uuid>,
    ) -> Vec<&'a Item> {
        let mut candidates: Vec<(&'a Item, f64)> = items
            .iter()
            .filter(|item| !exclude.contains(&item.id) && item.use_count > 0)
            .filter_map(|item| {
                let days = self.scorer.days_since_view(item, now);
                let forgotten =
                    item.last_viewed_at.is_none() || days > self.forgotten_threshold_days;
                forgotten.then(|| (item, nostalgia_score(item.use_count, days)))
            })
            .collect();

        candidates.sort_by(|a, b| cmp_desc(a.1, b.1).then_with(|| a.0.id.cmp(&b.0.id)));
        candidates
            .into_iter()
            .take(self.forgotten_slots)
            .map(|(item, _)| item)
            .collect()
    }

    /// Items whose every tag has no uses or views anywhere in the library
    pub fn fill_explore<'a>(&self, items: &'a [Item], exclude: &HashSet<Uuid>) -> Vec<&'a Item> {
        let mut tag_interactions: HashMap<&str, u64> = HashMap::new();
        for item in items {
            for tag in &item.tags {
                *tag_interactions.entry(tag.id.as_str()).or_default() += item.interaction_count();
            }
        }

        let mut candidates: Vec<&'a Item> = items
            .iter()
            .filter(|item| !exclude.contains(&item.id) && !item.tags.is_empty())
            .filter(|item| {
                item.tags
                    .iter()
                    .all(|t| tag_interactions.get(t.id.as_str()).copied().unwrap_or(0) == 0)
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.imported_at
                .cmp(&a.imported_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        candidates.truncate(self.explore_slots);
        candidates
    }

    /// Items carrying a rising tag, by summed drift
    pub fn fill_wildcard<'a>(
        &self,
        items: &'a [Item],
        drift: &DriftMap,
        exclude: &HashSet<Uuid>,
    ) -> Vec<&'a Item> {
        let drift_of = |tag: &str| drift.get(tag).copied().unwrap_or(0.0);

        let mut candidates: Vec<(&'a Item, f64)> = items
            .iter()
            .filter(|item| !exclude.contains(&item.id))
            .filter(|item| item.tags.iter().any(|t| drift_of(t.id.as_str()) > 0.0))
            .map(|item| {
                let summed = item.tags.iter().map(|t| drift_of(t.id.as_str())).sum::<f64>();
                (item, summed)
            })
            .collect();

        candidates.sort_by(|a, b| cmp_desc(a.1, b.1).then_with(|| a.0.id.cmp(&b.0.id)));
        candidates
            .into_iter()
            .take(self.wildcard_slots)
            .map(|(item, _)| item)
            .collect()
    }
}

/// Rewards both historical importance and absence
pub fn nostalgia_score(use_count: u32, days_since_view: f64) -> f64 {
    (use_count as f64).ln_1p() * days_since_view.max(0.0).ln_1p()
}

fn claim(claimed: &mut HashSet<Uuid>, items: &[&Item]) {
    claimed.extend(items.iter().map(|item| item.id));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tag;
    use crate::services::drift::DriftDetector;

    fn create_test_item(tag: &str, now: DateTime<Utc>) -> Item {
        let mut item = Item::new(Uuid::new_v4(), now - Duration::days(30));
        item.tags = vec![Tag::new(tag)];
        item
    }

    fn ids(items: &[&Item]) -> Vec<Uuid> {
        items.iter().map(|i| i.id).collect()
    }

    #[test]
    fn test_fill_new_respects_window_and_exclusions() {
        let filler = SlotFiller::default();
        let now = Utc::now();

        let mut newest = create_test_item("a", now);
        newest.imported_at = now - Duration::hours(1);
        let mut newer = create_test_item("a", now);
        newer.imported_at = now - Duration::hours(20);
        let mut excluded = create_test_item("a", now);
        excluded.imported_at = now - Duration::minutes(5);
        let mut old = create_test_item("a", now);
        old.imported_at = now - Duration::hours(49);

        let items = vec![old, newer, excluded, newest];
        let exclude: HashSet<Uuid> = [items[2].id].into_iter().collect();

        let selected = filler.fill_new(&items, now, &exclude);
        assert_eq!(ids(&selected), vec![items[3].id, items[1].id]);
    }

    #[test]
    fn test_fill_forgotten_skips_unused_items() {
        let filler = SlotFiller::default();
        let now = Utc::now();

        let mut never_used = create_test_item("a", now);
        never_used.view_count = 40;
        never_used.last_viewed_at = Some(now - Duration::days(200));

        let mut recently_seen = create_test_item("a", now);
        recently_seen.use_count = 9;
        recently_seen.last_viewed_at = Some(now - Duration::days(3));

        let mut forgotten = create_test_item("a", now);
        forgotten.use_count = 2;
        forgotten.last_viewed_at = Some(now - Duration::days(20));

        let items = vec![never_used, recently_seen, forgotten];
        let selected = filler.fill_forgotten(&items, now, &HashSet::new());
        assert_eq!(ids(&selected), vec![items[2].id]);
    }

    #[test]
    fn test_fill_forgotten_prefers_nostalgia() {
        let filler = SlotFiller::default();
        let now = Utc::now();

        let mut light = create_test_item("a", now);
        light.use_count = 1;
        light.last_viewed_at = Some(now - Duration::days(20));

        let mut heavy = create_test_item("a", now);
        heavy.use_count = 30;
        heavy.last_viewed_at = Some(now - Duration::days(60));

        // Used but never viewed: unseen default applies
        let mut unseen = create_test_item("a", now);
        unseen.use_count = 1;

        let items = vec![light, heavy, unseen];
        let selected = filler.fill_forgotten(&items, now, &HashSet::new());
        assert_eq!(ids(&selected), vec![items[1].id]);

        assert!(nostalgia_score(30, 60.0) > nostalgia_score(1, 20.0));
        assert_eq!(nostalgia_score(0, 100.0), 0.0);
    }

    #[test]
    fn test_fill_explore_requires_untouched_tags() {
        let filler = SlotFiller::default();
        let now = Utc::now();

        let mut touched = create_test_item("popular", now);
        touched.view_count = 1;
        // Same tag as an interacted item, so not explorable
        let sibling = create_test_item("popular", now);
        let mut older_fresh = create_test_item("fresh", now);
        older_fresh.imported_at = now - Duration::days(40);
        let newer_fresh = create_test_item("fresh", now);
        let untagged = Item::new(Uuid::new_v4(), now);

        let items = vec![touched, sibling, older_fresh, newer_fresh, untagged];
        let selected = filler.fill_explore(&items, &HashSet::new());
        assert_eq!(ids(&selected), vec![items[3].id]);
    }

    #[test]
    fn test_fill_diverse_brings_uncovered_tag() {
        let filler = SlotFiller::default();
        let now = Utc::now();

        let mut covered = create_test_item("cat", now);
        covered.use_count = 50;
        let mut fresh_tag = create_test_item("dog", now);
        fresh_tag.use_count = 5;
        let mut quiet = create_test_item("bird", now);
        quiet.use_count = 1;

        let items = vec![covered, fresh_tag, quiet];
        let covered_tags: HashSet<&str> = ["cat"].into_iter().collect();

        let selected = filler.fill_diverse(&items, &covered_tags, &HashSet::new());
        assert_eq!(ids(&selected), vec![items[1].id]);
    }

    #[test]
    fn test_fill_wildcard_uses_rising_tags() {
        let filler = SlotFiller::default();
        let now = Utc::now();
        let items = vec![
            create_test_item("up", now),
            create_test_item("down", now),
            create_test_item("flat", now),
        ];
        let drift: DriftMap = [
            ("up".to_string(), 0.4),
            ("down".to_string(), -0.4),
            ("flat".to_string(), 0.0),
        ]
        .into_iter()
        .collect();

        let selected = filler.fill_wildcard(&items, &drift, &HashSet::new());
        assert_eq!(ids(&selected), vec![items[0].id]);

        let exclude: HashSet<Uuid> = [items[0].id].into_iter().collect();
        assert!(filler.fill_wildcard(&items, &drift, &exclude).is_empty());
    }

    #[test]
    fn test_keepers_staleness_penalty_rotates() {
        let filler = SlotFiller::new(&EngineConfig {
            keepers_slots: 2,
            ..Default::default()
        });
        let now = Utc::now();
        let items: Vec<Item> = (0..4).map(|_| create_test_item("a", now)).collect();
        let scored: Vec<ScoredItem> = items
            .iter()
            .zip([1.00, 0.99, 0.98, 0.97])
            .map(|(item, score)| ScoredItem { item, score })
            .collect();

        let first = filler.fill_keepers(&scored, &BTreeSet::new(), &HashSet::new());
        assert_eq!(ids(&first), vec![items[0].id, items[1].id]);

        let previous: BTreeSet<Uuid> = ids(&first).into_iter().collect();
        let second = filler.fill_keepers(&scored, &previous, &HashSet::new());
        assert_eq!(ids(&second), vec![items[2].id, items[3].id]);
    }

    #[test]
    fn test_fill_and_backfill_unique_ids() {
        let filler = SlotFiller::default();
        let now = Utc::now();
        let items: Vec<Item> = (0..30)
            .map(|i| {
                let mut item = create_test_item(&format!("tag{}", i % 7), now);
                item.use_count = i;
                item.last_viewed_at = Some(now - Duration::days(i as i64));
                item.imported_at = now - Duration::hours(i as i64 * 10);
                item
            })
            .collect();

        let context = Context::browse();
        let scored = Scorer::default().score_all(&items, &context, now);
        let drift = DriftDetector::default().detect_drift(&items, now);

        let hand = filler.fill(&scored, &items, &context, &drift, now);
        let flat = filler.backfill(&hand, &scored);

        assert_eq!(flat.len(), 12);
        let unique: HashSet<Uuid> = ids(&flat).into_iter().collect();
        assert_eq!(unique.len(), flat.len());
    }

    #[test]
    fn test_backfill_stops_when_exhausted() {
        let filler = SlotFiller::default();
        let now = Utc::now();
        let items: Vec<Item> = (0..3).map(|_| create_test_item("a", now)).collect();
        let scored = Scorer::default().score_all(&items, &Context::browse(), now);

        let flat = filler.backfill(&Hand::default(), &scored);
        assert_eq!(flat.len(), 3);
    }
}
