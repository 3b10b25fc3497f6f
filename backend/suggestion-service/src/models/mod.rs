use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Category tag attached to a library item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Tag {
    /// Tag identity (emoji or slug), used for filters and drift
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Tag {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            keywords: Vec::new(),
        }
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }
}

/// A library item as seen by the suggestion engine. Never mutated by it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: Uuid,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// OCR text extracted from the image
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub is_favorite: bool,
    /// Explicit user actions (send, share, copy)
    #[serde(default)]
    pub use_count: u32,
    /// Passive exposures
    #[serde(default)]
    pub view_count: u32,
    #[serde(default)]
    pub last_viewed_at: Option<DateTime<Utc>>,
    pub imported_at: DateTime<Utc>,
}

impl Item {
    pub fn new(id: Uuid, imported_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: None,
            description: None,
            text_content: None,
            tags: Vec::new(),
            is_favorite: false,
            use_count: 0,
            view_count: 0,
            last_viewed_at: None,
            imported_at,
        }
    }

    /// First tag in the item's tag list
    pub fn primary_tag(&self) -> Option<&str> {
        self.tags.first().map(|t| t.id.as_str())
    }

    pub fn has_tag(&self, tag_id: &str) -> bool {
        self.tags.iter().any(|t| t.id == tag_id)
    }

    /// Uses plus views
    pub fn interaction_count(&self) -> u64 {
        self.use_count as u64 + self.view_count as u64
    }
}

/// Where suggestions are being requested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    /// Default grid / quick-access tray
    #[default]
    Browse,
    /// Filtered or search results view
    Search,
}

impl Surface {
    pub fn as_str(&self) -> &'static str {
        match self {
            Surface::Browse => "browse",
            Surface::Search => "search",
        }
    }
}

/// Why suggestions are being requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    #[serde(default)]
    pub surface: Surface,
    /// Active category filter (tag id)
    #[serde(default)]
    pub active_filter: Option<String>,
    /// Most recent first
    #[serde(default)]
    pub recent_queries: Vec<String>,
    /// Items shown by the previous invocation
    #[serde(default)]
    pub previous_session: BTreeSet<Uuid>,
}

impl Context {
    pub fn browse() -> Self {
        Self::default()
    }

    pub fn search() -> Self {
        Self {
            surface: Surface::Search,
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, tag_id: impl Into<String>) -> Self {
        self.active_filter = Some(tag_id.into());
        self
    }

    pub fn with_queries(mut self, queries: &[&str]) -> Self {
        self.recent_queries = queries.iter().map(|q| q.to_string()).collect();
        self
    }

    pub fn with_previous_session(mut self, ids: impl IntoIterator<Item = Uuid>) -> Self {
        self.previous_session = ids.into_iter().collect();
        self
    }
}

/// Item paired with its base score for one invocation.
#[derive(Debug, Clone, Copy)]
pub struct ScoredItem<'a> {
    pub item: &'a Item,
    pub score: f64,
}

/// Bucketed selection before flattening. Identifiers are unique across buckets.
#[derive(Debug, Clone, Default)]
pub struct Hand<'a> {
    pub keepers: Vec<&'a Item>,
    pub new: Vec<&'a Item>,
    pub diverse: Vec<&'a Item>,
    pub forgotten: Vec<&'a Item>,
    pub explore: Vec<&'a Item>,
    pub wildcard: Vec<&'a Item>,
}

impl<'a> Hand<'a> {
    /// Items in bucket order
    pub fn flatten(&self) -> Vec<&'a Item> {
        self.keepers
            .iter()
            .chain(&self.new)
            .chain(&self.diverse)
            .chain(&self.forgotten)
            .chain(&self.explore)
            .chain(&self.wildcard)
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.keepers.len()
            + self.new.len()
            + self.diverse.len()
            + self.forgotten.len()
            + self.explore.len()
            + self.wildcard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Which policy produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    /// Library below the minimum size, nothing suggested
    #[default]
    TooSmall,
    /// Small library returned whole, newest first
    SmallLibrary,
    /// Too few interactions to trust engagement
    ColdStart,
    Full,
}

impl Branch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::TooSmall => "too_small",
            Branch::SmallLibrary => "small_library",
            Branch::ColdStart => "cold_start",
            Branch::Full => "full",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuggestionStats {
    pub branch: Branch,
    pub library_size: usize,
    pub keepers_count: usize,
    pub new_count: usize,
    pub diverse_count: usize,
    pub forgotten_count: usize,
    pub explore_count: usize,
    pub wildcard_count: usize,
    pub backfilled_count: usize,
    pub final_count: usize,
}

/// Ordered hand plus how it was produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub items: Vec<Item>,
    pub stats: SuggestionStats,
}

impl Suggestion {
    /// Identifiers in presentation order; feed back as the next `previous_session`
    pub fn ids(&self) -> Vec<Uuid> {
        self.items.iter().map(|item| item.id).collect()
    }
}
