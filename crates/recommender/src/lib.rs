//! Switch game recommendation engine
//!
//! Builds a content feature space over the game catalog and ranks games by
//! quality, tag overlap, a similarity/quality blend, or learned two-tower
//! embeddings.

pub mod catalog;
pub mod config;
pub mod error;
pub mod features;
pub mod interactions;
pub mod scoring;
pub mod server;
pub mod similarity;
pub mod telemetry;
pub mod tfidf;
pub mod tower;
pub mod types;

// Re-export key types
pub use catalog::{Catalog, CatalogStats, CatalogView, ViewFilter};
pub use config::EngineConfig;
pub use error::{RecommendError, Result};
pub use features::FeatureMatrix;
pub use interactions::IdEncoding;
pub use similarity::SimilarityMatrix;
pub use tower::{AssetSource, FileAssetSource, TowerAssets, TowerCheckpoint, TowerRecall};
pub use types::*;

use tracing::info;

/// Catalog plus every structure derived from it, built once and shared
/// read-only across callers
pub struct RecommenderEngine {
    catalog: Catalog,
    features: FeatureMatrix,
    similarity: SimilarityMatrix,
    tower: TowerRecall,
}

impl RecommenderEngine {
    /// Build the feature and similarity matrices over the full catalog.
    ///
    /// The tower tables are not touched here; they load on first recall.
    pub fn build(catalog: Catalog, max_text_features: usize, tower: TowerRecall) -> Self {
        let features = FeatureMatrix::build(&catalog, max_text_features);
        let similarity = SimilarityMatrix::compute(&catalog, &features);
        info!(
            games = catalog.len(),
            feature_width = features.width(),
            "Recommender engine built"
        );
        Self {
            catalog,
            features,
            similarity,
            tower,
        }
    }

    /// Load the catalog named by `config` and build the engine
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let catalog = Catalog::load(&config.data.catalog_path)?;
        let tower = TowerRecall::new(config.tower_source());
        Ok(Self::build(
            catalog,
            config.features.max_text_features,
            tower,
        ))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn features(&self) -> &FeatureMatrix {
        &self.features
    }

    pub fn similarity(&self) -> &SimilarityMatrix {
        &self.similarity
    }

    pub fn tower(&self) -> &TowerRecall {
        &self.tower
    }

    pub fn view(&self, filter: &ViewFilter) -> CatalogView<'_> {
        self.catalog.filter(filter)
    }

    pub fn top_quality(&self, view: &CatalogView<'_>, n: usize) -> Vec<Recommendation> {
        scoring::top_quality(view, n)
    }

    pub fn by_tags<S: AsRef<str>>(
        &self,
        view: &CatalogView<'_>,
        tags: &[S],
        n: usize,
    ) -> Result<Vec<Recommendation>> {
        scoring::by_tags(view, tags, n)
    }

    /// Hybrid ranking of `view` against the full-catalog similarity matrix.
    ///
    /// Similarities are read by id, so no per-view sub-block is copied.
    pub fn hybrid(
        &self,
        view: &CatalogView<'_>,
        reference: &str,
        n: usize,
        alpha: f32,
    ) -> Result<Vec<Recommendation>> {
        scoring::hybrid(view, &self.similarity, reference, n, alpha)
    }

    pub fn tower_recall(
        &self,
        view: &CatalogView<'_>,
        user_id: UserId,
        n: usize,
    ) -> Result<Vec<Recommendation>> {
        self.tower.recommend(view, user_id, n)
    }

    pub fn list_known_users(&self) -> Result<Vec<UserId>> {
        self.tower.list_known_users()
    }
}

#[cfg(test)]
mod tests;
