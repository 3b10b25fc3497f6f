pub mod config;
pub mod models;
pub mod services;
pub mod utils;

pub use config::{ConfigError, EngineConfig};
pub use models::{Context, Item, Suggestion, SuggestionStats, Surface, Tag};
pub use services::{
    CachedSuggestionEngine, DriftDetector, PositionalOrderer, Scorer, SlotFiller, SuggestionEngine,
};
