// ============================================
// Base Scorer (基础打分器)
// ============================================
//
// Per-item relevance from three signals:
// - Engagement: uses, views and favorite bonus
// - Recency: exponential decay since last view
// - Scope: match against active filter or recent queries
//
// Surface weights:
//   Browse: 0.50*engagement + 0.35*recency + 0.15*scope
//   Search: 0.40*scope + 0.35*recency + 0.25*engagement

use crate::config::EngineConfig;
use crate::models::{Context, Item, ScoredItem, Surface};
use crate::utils::{cmp_desc, days_between, half_life_decay};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Item carries a tag equal to the active filter
pub const SCOPE_FILTER_MATCH: f64 = 3.0;
/// Item text matches one of the recent queries
pub const SCOPE_QUERY_MATCH: f64 = 2.0;
/// Neutral baseline, never zero
pub const SCOPE_NEUTRAL: f64 = 1.0;

/// Convex weights for one surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceWeights {
    pub engagement: f64,
    pub recency: f64,
    pub scope: f64,
}

impl SurfaceWeights {
    pub fn for_surface(surface: Surface) -> Self {
        match surface {
            Surface::Browse => Self {
                engagement: 0.50,
                recency: 0.35,
                scope: 0.15,
            },
            Surface::Search => Self {
                engagement: 0.25,
                recency: 0.35,
                scope: 0.40,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scorer {
    use_weight: f64,
    view_weight: f64,
    favorite_bonus: f64,
    half_life_days: f64,
    unseen_days: f64,
    max_recent_queries: usize,
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl Scorer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            use_weight: config.use_weight,
            view_weight: config.view_weight,
            favorite_bonus: config.favorite_bonus,
            half_life_days: config.recency_half_life_days,
            unseen_days: config.unseen_days,
            max_recent_queries: config.max_recent_queries,
        }
    }

    /// Final surface-weighted score
    pub fn score(&self, item: &Item, context: &Context, now: DateTime<Utc>) -> f64 {
        let weights = SurfaceWeights::for_surface(context.surface);
        let engagement = self.engagement(item);
        let recency = self.recency(item, now);
        let scope = self.scope(item, context);

        let score = weights.engagement * engagement
            + weights.recency * recency
            + weights.scope * scope;

        debug!(
            item_id = %item.id,
            engagement = engagement,
            recency = recency,
            scope = scope,
            score = score,
            "Item scored"
        );

        score
    }

    /// Score every item, highest first (ties by id)
    pub fn score_all<'a>(
        &self,
        items: &'a [Item],
        context: &Context,
        now: DateTime<Utc>,
    ) -> Vec<ScoredItem<'a>> {
        let mut scored: Vec<ScoredItem<'a>> = items
            .iter()
            .map(|item| ScoredItem {
                item,
                score: self.score(item, context, now),
            })
            .collect();

        scored.sort_by(|a, b| {
            cmp_desc(a.score, b.score).then_with(|| a.item.id.cmp(&b.item.id))
        });
        scored
    }

    /// Zero for a never-touched item
    pub fn engagement(&self, item: &Item) -> f64 {
        let favorite = if item.is_favorite {
            self.favorite_bonus
        } else {
            0.0
        };
        item.use_count as f64 * self.use_weight
            + item.view_count as f64 * self.view_weight
            + favorite
    }

    /// 1.0 when viewed now, 0.5 at one half-life
    pub fn recency(&self, item: &Item, now: DateTime<Utc>) -> f64 {
        half_life_decay(self.days_since_view(item, now), self.half_life_days)
    }

    /// Days since last view, or the unseen default
    pub fn days_since_view(&self, item: &Item, now: DateTime<Utc>) -> f64 {
        match item.last_viewed_at {
            Some(viewed_at) => days_between(viewed_at, now),
            None => self.unseen_days,
        }
    }

    /// One of exactly 3.0, 2.0 or 1.0
    pub fn scope(&self, item: &Item, context: &Context) -> f64 {
        if let Some(filter) = context.active_filter.as_deref() {
            if item.has_tag(filter) {
                return SCOPE_FILTER_MATCH;
            }
        }

        let matches_query = context
            .recent_queries
            .iter()
            .map(|q| q.trim())
            .filter(|q| !q.is_empty())
            .take(self.max_recent_queries)
            .any(|q| matches_text(item, q));

        if matches_query {
            SCOPE_QUERY_MATCH
        } else {
            SCOPE_NEUTRAL
        }
    }
}

/// Case-insensitive substring match over all searchable text of an item
fn matches_text(item: &Item, query: &str) -> bool {
    let needle = query.to_lowercase();
    let contains = |haystack: &str| haystack.to_lowercase().contains(&needle);

    let fields = [&item.title, &item.description, &item.text_content];
    if fields.iter().filter_map(|f| f.as_deref()).any(contains) {
        return true;
    }

    item.tags.iter().any(|tag| {
        contains(tag.name.as_str())
            || contains(tag.id.as_str())
            || tag.keywords.iter().any(|k| contains(k.as_str()))
    })
}
