pub mod cache;
pub mod drift;
pub mod engine;
pub mod ordering;
pub mod scoring;
pub mod slots;

pub use cache::{CacheStats, CachedSuggestionEngine};
pub use drift::{DriftDetector, DriftMap};
pub use engine::SuggestionEngine;
pub use ordering::{greedy_diversify, PositionalOrderer};
pub use scoring::Scorer;
pub use slots::SlotFiller;
