//! Shared domain types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Catalog identifier of a game; the stable similarity index
pub type ItemId = i64;

/// External (RAWG) identifier of a game; the key of the embedding tables
pub type ExternalId = i64;

/// User identifier as encoded in the interaction log
pub type UserId = u64;

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: ItemId,
    pub rawg_id: Option<ExternalId>,
    pub name: String,
    pub genre: String,
    /// Deduplicated, first occurrence wins
    pub tags: Vec<String>,
    /// Rating in [0, 5]; `None` when the source had no usable value
    pub rating: Option<f32>,
    /// Whole number of ratings; fractional source counts are truncated here
    pub ratings_count: u64,
    /// `ln(1 + count)` of the source count, fraction included
    pub popularity: f32,
    pub released: Option<NaiveDate>,
    pub background_image: Option<String>,
    /// Enriched description if available, short synopsis otherwise
    pub text: String,
}

impl Game {
    pub fn new(id: ItemId, name: impl Into<String>, genre: impl Into<String>) -> Self {
        Self {
            id,
            rawg_id: None,
            name: name.into(),
            genre: genre.into(),
            tags: Vec::new(),
            rating: None,
            ratings_count: 0,
            popularity: 0.0,
            released: None,
            background_image: None,
            text: String::new(),
        }
    }

    pub fn with_rating(mut self, rating: f32) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_ratings_count(mut self, ratings_count: u64) -> Self {
        self.ratings_count = ratings_count;
        self.popularity = popularity(ratings_count);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = dedup_tags(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_rawg_id(mut self, rawg_id: ExternalId) -> Self {
        self.rawg_id = Some(rawg_id);
        self
    }

    /// Rating weighted by log-damped popularity; an absent rating counts as 0
    pub fn quality_score(&self) -> f32 {
        self.rating.unwrap_or(0.0) * self.popularity
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// `ln(1 + ratings_count)`
pub fn popularity(ratings_count: u64) -> f32 {
    fractional_popularity(ratings_count as f64)
}

/// `ln(1 + count)` for counts that may carry a fraction
pub fn fractional_popularity(count: f64) -> f32 {
    count.ln_1p() as f32
}

pub(crate) fn dedup_tags(tags: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// Strategy that produced a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationType {
    TopQuality,
    TagMatch,
    Hybrid,
    TwoTower,
}

/// A ranked game with the score that produced its position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(flatten)]
    pub game: Game,
    pub score: f32,
    pub strategy: RecommendationType,
}

impl Recommendation {
    pub fn new(game: &Game, score: f32, strategy: RecommendationType) -> Self {
        Self {
            game: game.clone(),
            score,
            strategy,
        }
    }
}
