use crate::models::Item;
use crate::utils::cmp_desc;
use std::collections::HashMap;
use uuid::Uuid;

/// Positional Orderer - 最終排列
///
/// Layout of a hand of n > 2 items:
/// - positions 0..2: the two highest scores ("golden triangle")
/// - position n-1: the lowest score ("curiosity anchor")
/// - middle: descending score, greedily avoiding adjacent equal primary tags,
///   starting from the primary tag at position 1
#[derive(Debug, Clone, Default)]
pub struct PositionalOrderer;

impl PositionalOrderer {
    pub fn new() -> Self {
        Self
    }

    /// Arrange the hand for presentation. Items without a score rank as 0.
    pub fn order<'a>(
        &self,
        hand: Vec<&'a Item>,
        score_by_item: &HashMap<Uuid, f64>,
    ) -> Vec<&'a Item> {
        let score_of = |item: &Item| score_by_item.get(&item.id).copied().unwrap_or(0.0);

        let mut sorted = hand;
        sorted.sort_by(|a, b| cmp_desc(score_of(*a), score_of(*b)).then_with(|| a.id.cmp(&b.id)));

        if sorted.len() <= 2 {
            return sorted;
        }

        let anchor = sorted.pop();
        let mut rest = sorted.split_off(2);
        let mut ordered = sorted;

        let previous = ordered.last().copied().and_then(Item::primary_tag);
        rest = greedy_diversify_after(rest, previous);

        ordered.extend(rest);
        ordered.extend(anchor);
        ordered
    }
}

/// Reorder a best-first pool so that adjacent items differ in primary tag
/// where possible. Local and greedy: no backtracking.
pub fn greedy_diversify(pool: Vec<&Item>) -> Vec<&Item> {
    greedy_diversify_after(pool, None)
}

fn greedy_diversify_after<'a>(
    mut pool: Vec<&'a Item>,
    mut previous: Option<&'a str>,
) -> Vec<&'a Item> {
    let mut ordered = Vec::with_capacity(pool.len());

    while !pool.is_empty() {
        let conflicts = |item: &Item| match (previous, item.primary_tag()) {
            (Some(prev), Some(tag)) => prev == tag,
            _ => false,
        };

        let idx = if conflicts(pool[0]) {
            pool.iter().position(|item| !conflicts(*item)).unwrap_or(0)
        } else {
            0
        };

        let chosen = pool.remove(idx);
        previous = chosen.primary_tag();
        ordered.push(chosen);
    }

    ordered
}
