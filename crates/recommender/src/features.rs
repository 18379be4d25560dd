//! Feature matrix construction
//!
//! One row per catalog game: multi-hot tags, TF-IDF text, then min-max
//! normalized rating and popularity. The vocabularies are always fit on the
//! full catalog so two games are compared in the same space no matter which
//! view the caller is looking at.

use crate::catalog::Catalog;
use crate::tfidf::TfIdfVectorizer;
use crate::types::Game;
use ndarray::{Array1, Array2};
use std::collections::{BTreeSet, HashMap};
use tracing::{info, instrument};

/// Default cap on the text vocabulary
pub const DEFAULT_MAX_TEXT_FEATURES: usize = 800;

/// Number of trailing scalar columns (rating, popularity)
pub const SCALAR_COLUMNS: usize = 2;

/// Min-max bounds of a scalar column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMax {
    pub min: f32,
    pub max: f32,
}

impl MinMax {
    fn fit(values: impl Iterator<Item = f32>) -> Self {
        let (min, max) = values.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        if min.is_finite() && max.is_finite() {
            Self { min, max }
        } else {
            Self { min: 0.0, max: 0.0 }
        }
    }

    /// Scale to [0, 1]; a degenerate range maps everything to 0
    pub fn scale(&self, value: f32) -> f32 {
        let range = self.max - self.min;
        if range > 0.0 {
            ((value - self.min) / range).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Dense feature matrix aligned with catalog row order
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    tags: Vec<String>,
    tag_index: HashMap<String, usize>,
    text: TfIdfVectorizer,
    rating: MinMax,
    popularity: MinMax,
    matrix: Array2<f32>,
}

impl FeatureMatrix {
    /// Fit vocabularies and scalers on the whole catalog and vectorize it
    #[instrument(skip(catalog), fields(games = catalog.len()))]
    pub fn build(catalog: &Catalog, max_text_features: usize) -> Self {
        let start = std::time::Instant::now();
        let games = catalog.games();

        let tags: Vec<String> = games
            .iter()
            .flat_map(|game| game.tags.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let tag_index = tags
            .iter()
            .enumerate()
            .map(|(column, tag)| (tag.clone(), column))
            .collect();

        let documents: Vec<&str> = games.iter().map(|game| game.text.as_str()).collect();
        let text = TfIdfVectorizer::fit(&documents, max_text_features);

        // Absent ratings do not move the bounds
        let rating = MinMax::fit(games.iter().filter_map(|game| game.rating));
        let popularity = MinMax::fit(games.iter().map(|game| game.popularity));

        let mut features = Self {
            tags,
            tag_index,
            text,
            rating,
            popularity,
            matrix: Array2::zeros((0, 0)),
        };

        let mut matrix = Array2::<f32>::zeros((games.len(), features.width()));
        for (row, game) in games.iter().enumerate() {
            matrix.row_mut(row).assign(&features.vectorize(game));
        }
        features.matrix = matrix;

        info!(
            tag_columns = features.tags.len(),
            text_columns = features.text.dimensions(),
            width = features.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Feature matrix built"
        );
        features
    }

    /// Project a game into the fitted feature space
    pub fn vectorize(&self, game: &Game) -> Array1<f32> {
        let mut row = Array1::<f32>::zeros(self.width());
        for tag in &game.tags {
            if let Some(&column) = self.tag_index.get(tag) {
                row[column] = 1.0;
            }
        }

        let offset = self.tags.len();
        for (i, value) in self.text.transform(&game.text).into_iter().enumerate() {
            row[offset + i] = value;
        }

        let scalars = offset + self.text.dimensions();
        row[scalars] = game.rating.map(|r| self.rating.scale(r)).unwrap_or(0.0);
        row[scalars + 1] = self.popularity.scale(game.popularity);
        row
    }

    /// tags + text terms + 2
    pub fn width(&self) -> usize {
        self.tags.len() + self.text.dimensions() + SCALAR_COLUMNS
    }

    pub fn tag_vocabulary(&self) -> &[String] {
        &self.tags
    }

    pub fn text_vocabulary(&self) -> &[String] {
        self.text.terms()
    }

    pub fn matrix(&self) -> &Array2<f32> {
        &self.matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::from_games(vec![
            Game::new(1, "A", "RPG")
                .with_rating(5.0)
                .with_ratings_count(100)
                .with_tags(["rpg", "action"])
                .with_text("dragon hunting adventure"),
            Game::new(2, "B", "Action")
                .with_rating(3.0)
                .with_ratings_count(10)
                .with_tags(["action"])
                .with_text("arena fighting"),
            Game::new(3, "C", "RPG")
                .with_ratings_count(0)
                .with_tags(["rpg"])
                .with_text("dragon taming"),
        ])
        .unwrap()
    }

    #[test]
    fn test_matrix_shape_and_blocks() {
        let catalog = catalog();
        let features = FeatureMatrix::build(&catalog, DEFAULT_MAX_TEXT_FEATURES);

        assert_eq!(features.tag_vocabulary(), &["action", "rpg"]);
        assert_eq!(
            features.width(),
            2 + features.text_vocabulary().len() + SCALAR_COLUMNS
        );
        assert_eq!(features.matrix().nrows(), 3);
        assert_eq!(features.matrix().ncols(), features.width());

        let a = features.matrix().row(0);
        assert_eq!(a[0], 1.0);
        assert_eq!(a[1], 1.0);
        let last = features.width() - 1;
        assert_eq!(a[last - 1], 1.0); // highest rating
        assert_eq!(a[last], 1.0); // highest popularity

        let c = features.matrix().row(2);
        assert_eq!(c[last - 1], 0.0); // absent rating
        assert_eq!(c[last], 0.0);
    }

    #[test]
    fn test_degenerate_scalar_range_is_zero() {
        let catalog = Catalog::from_games(vec![
            Game::new(1, "A", "RPG").with_rating(4.0).with_ratings_count(7),
            Game::new(2, "B", "RPG").with_rating(4.0).with_ratings_count(7),
        ])
        .unwrap();
        let features = FeatureMatrix::build(&catalog, DEFAULT_MAX_TEXT_FEATURES);
        assert!(features.matrix().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_minmax_scale() {
        let scaler = MinMax { min: 2.0, max: 4.0 };
        assert_eq!(scaler.scale(2.0), 0.0);
        assert_eq!(scaler.scale(3.0), 0.5);
        assert_eq!(scaler.scale(4.0), 1.0);
        assert_eq!(MinMax { min: 1.0, max: 1.0 }.scale(1.0), 0.0);
    }
}
