//! Item-item cosine similarity
//!
//! Computed once over the full feature matrix. Filtered views select a
//! sub-block by id; no similarity is ever recomputed for a subset.

use crate::catalog::{Catalog, CatalogView};
use crate::error::{RecommendError, Result};
use crate::features::FeatureMatrix;
use crate::types::ItemId;
use ndarray::{Array2, Axis};
use std::collections::HashMap;
use tracing::{info, instrument};

/// Square similarity matrix addressable by catalog id on both axes
#[derive(Debug, Clone)]
pub struct SimilarityMatrix {
    ids: Vec<ItemId>,
    index: HashMap<ItemId, usize>,
    values: Array2<f32>,
}

impl SimilarityMatrix {
    /// Pairwise cosine similarity of every catalog row
    #[instrument(skip_all, fields(games = catalog.len()))]
    pub fn compute(catalog: &Catalog, features: &FeatureMatrix) -> Self {
        let start = std::time::Instant::now();
        let values = cosine_similarity(features.matrix());
        let ids: Vec<ItemId> = catalog.games().iter().map(|game| game.id).collect();
        let index = ids
            .iter()
            .enumerate()
            .map(|(position, id)| (*id, position))
            .collect();

        info!(
            size = ids.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Similarity matrix computed"
        );
        Self { ids, index, values }
    }

    pub fn ids(&self) -> &[ItemId] {
        &self.ids
    }

    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn get(&self, a: ItemId, b: ItemId) -> Option<f32> {
        let i = *self.index.get(&a)?;
        let j = *self.index.get(&b)?;
        Some(self.values[[i, j]])
    }

    /// Sub-block over `ids` on both axes, in the given order
    pub fn select(&self, ids: &[ItemId]) -> Result<SimilarityMatrix> {
        let positions = ids
            .iter()
            .map(|id| {
                self.index
                    .get(id)
                    .copied()
                    .ok_or_else(|| RecommendError::not_found(format!("game id {id}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let values = self
            .values
            .select(Axis(0), &positions)
            .select(Axis(1), &positions);
        let index = ids
            .iter()
            .enumerate()
            .map(|(position, id)| (*id, position))
            .collect();

        Ok(Self {
            ids: ids.to_vec(),
            index,
            values,
        })
    }

    /// Sub-block matching a catalog view
    pub fn for_view(&self, view: &CatalogView<'_>) -> Result<SimilarityMatrix> {
        self.select(&view.ids())
    }
}

/// Cosine similarity between rows; zero rows are orthogonal to everything,
/// the diagonal is always 1
pub fn cosine_similarity(features: &Array2<f32>) -> Array2<f32> {
    let norms = features.map_axis(Axis(1), |row| row.dot(&row).sqrt());
    let mut normalized = features.clone();
    for (mut row, &norm) in normalized.axis_iter_mut(Axis(0)).zip(norms.iter()) {
        if norm > 0.0 {
            row /= norm;
        }
    }

    let mut similarity = normalized.dot(&normalized.t());
    similarity.mapv_inplace(|v| v.clamp(-1.0, 1.0));
    for i in 0..similarity.nrows() {
        similarity[[i, i]] = 1.0;
        for j in (i + 1)..similarity.ncols() {
            similarity[[j, i]] = similarity[[i, j]];
        }
    }
    similarity
}
