// Utility functions for suggestion-service

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Exponential half-life decay: 1.0 at age 0, 0.5 at one half-life
pub fn half_life_decay(age: f64, half_life: f64) -> f64 {
    (-(std::f64::consts::LN_2 / half_life) * age.max(0.0)).exp()
}

/// Fractional days from `earlier` to `later`, never negative
pub fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let seconds = (later - earlier).num_milliseconds() as f64 / 1000.0;
    (seconds / SECONDS_PER_DAY).max(0.0)
}

/// Descending comparison for scores; NaN sorts last
pub fn cmp_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
}
