//! Two-tower embedding recall
//!
//! Serving-side half of the two-tower model: user vectors come straight from
//! the trained user table, item vectors are `id_embedding + W * text + b`,
//! precomputed once. Scoring is an inner product against every cached item.
//!
//! [`TowerRecall`] has two states. It starts uninitialized and becomes ready
//! on the first call that needs the tables ([`TowerRecall::ensure_ready`]).
//! The transition happens at most once per instance, even with concurrent
//! callers, and there is no way back.

use crate::catalog::CatalogView;
use crate::error::{RecommendError, Result};
use crate::interactions::IdEncoding;
use crate::types::{ExternalId, Recommendation, RecommendationType, UserId};
use ndarray::{Array1, Array2, ArrayView1};
use once_cell::sync::OnceCell;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_EMBEDDING_DIM: usize = 64;
pub const DEFAULT_TEXT_DIM: usize = 384;

/// Precomputed sentence embeddings keyed by external item id
pub type TextEmbeddings = HashMap<ExternalId, Vec<f32>>;

/// Expected widths of the trained tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TowerDims {
    pub embedding_dim: usize,
    pub text_dim: usize,
}

impl Default for TowerDims {
    fn default() -> Self {
        Self {
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            text_dim: DEFAULT_TEXT_DIM,
        }
    }
}

/// Weights exported by the training job, rows indexed by [`IdEncoding`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TowerCheckpoint {
    pub embedding_dim: usize,
    pub text_dim: usize,
    /// `num_users x embedding_dim`
    pub user_embeddings: Vec<Vec<f32>>,
    /// `num_items x embedding_dim`
    pub item_id_embeddings: Vec<Vec<f32>>,
    /// `embedding_dim x text_dim`
    pub text_projection_weight: Vec<Vec<f32>>,
    /// `embedding_dim`
    pub text_projection_bias: Vec<f32>,
}

impl TowerCheckpoint {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(&bytes)
    }
}

pub fn load_text_embeddings(path: impl AsRef<Path>) -> Result<TextEmbeddings> {
    let bytes = std::fs::read(path.as_ref())?;
    Ok(bincode::deserialize(&bytes)?)
}

fn table(rows: &[Vec<f32>], width: usize, name: &str) -> Result<Array2<f32>> {
    let mut flat = Vec::with_capacity(rows.len() * width);
    for (i, row) in rows.iter().enumerate() {
        if row.len() != width {
            return Err(RecommendError::ModelLoad(format!(
                "{name} row {i} has {} values, expected {width}",
                row.len()
            )));
        }
        flat.extend_from_slice(row);
    }
    Array2::from_shape_vec((rows.len(), width), flat)
        .map_err(|e| RecommendError::ModelLoad(format!("{name}: {e}")))
}

/// Loaded embedding tables plus the precomputed item vectors
#[derive(Debug, Clone)]
pub struct TowerAssets {
    encoding: IdEncoding,
    user_vectors: Array2<f32>,
    item_vectors: Array2<f32>,
}

impl TowerAssets {
    /// Validate the checkpoint against the encoding and precompute every
    /// item vector
    pub fn from_parts(
        encoding: IdEncoding,
        checkpoint: &TowerCheckpoint,
        text_embeddings: &TextEmbeddings,
        dims: TowerDims,
    ) -> Result<Self> {
        if checkpoint.embedding_dim != dims.embedding_dim || checkpoint.text_dim != dims.text_dim
        {
            return Err(RecommendError::ModelLoad(format!(
                "checkpoint dims {}x{} do not match configured {}x{}",
                checkpoint.embedding_dim, checkpoint.text_dim, dims.embedding_dim, dims.text_dim
            )));
        }
        if checkpoint.user_embeddings.len() != encoding.num_users() {
            return Err(RecommendError::ModelLoad(format!(
                "checkpoint has {} user rows, interaction log has {} users",
                checkpoint.user_embeddings.len(),
                encoding.num_users()
            )));
        }
        if checkpoint.item_id_embeddings.len() != encoding.num_items() {
            return Err(RecommendError::ModelLoad(format!(
                "checkpoint has {} item rows, interaction log has {} items",
                checkpoint.item_id_embeddings.len(),
                encoding.num_items()
            )));
        }
        if checkpoint.text_projection_bias.len() != dims.embedding_dim {
            return Err(RecommendError::ModelLoad(format!(
                "projection bias has {} values, expected {}",
                checkpoint.text_projection_bias.len(),
                dims.embedding_dim
            )));
        }

        let user_vectors = table(&checkpoint.user_embeddings, dims.embedding_dim, "user table")?;
        let id_embeddings =
            table(&checkpoint.item_id_embeddings, dims.embedding_dim, "item table")?;
        let weight = table(
            &checkpoint.text_projection_weight,
            dims.text_dim,
            "projection weight",
        )?;
        if weight.nrows() != dims.embedding_dim {
            return Err(RecommendError::ModelLoad(format!(
                "projection weight has {} rows, expected {}",
                weight.nrows(),
                dims.embedding_dim
            )));
        }
        let bias = Array1::from_vec(checkpoint.text_projection_bias.clone());

        let mut item_vectors = id_embeddings;
        let mut missing_text = 0usize;
        for (enc, item_id) in encoding.items().iter().enumerate() {
            // An item without a text embedding keeps its learned id row
            let text = match text_embeddings.get(item_id) {
                Some(text) if text.len() == dims.text_dim => Array1::from_vec(text.clone()),
                Some(text) => {
                    return Err(RecommendError::ModelLoad(format!(
                        "text embedding of item {item_id} has {} values, expected {}",
                        text.len(),
                        dims.text_dim
                    )))
                }
                None => {
                    missing_text += 1;
                    Array1::zeros(dims.text_dim)
                }
            };
            let projected = weight.dot(&text) + &bias;
            let mut row = item_vectors.row_mut(enc);
            row += &projected;
        }
        if missing_text > 0 {
            warn!(missing_text, "Items without text embeddings use a zero text vector");
        }

        Ok(Self {
            encoding,
            user_vectors,
            item_vectors,
        })
    }

    pub fn encoding(&self) -> &IdEncoding {
        &self.encoding
    }

    pub fn user_vector(&self, user_id: UserId) -> Result<ArrayView1<'_, f32>> {
        let index = self
            .encoding
            .user_index(user_id)
            .ok_or(RecommendError::UnknownUser { user_id })?;
        Ok(self.user_vectors.row(index))
    }

    pub fn item_vector(&self, item_id: ExternalId) -> Result<ArrayView1<'_, f32>> {
        let index = self
            .encoding
            .item_index(item_id)
            .ok_or(RecommendError::UnknownItem { item_id })?;
        Ok(self.item_vectors.row(index))
    }

    /// Top `top_k` items by inner product with the user's vector, ties in
    /// table order
    pub fn top_items(&self, user_id: UserId, top_k: usize) -> Result<Vec<(ExternalId, f32)>> {
        let user = self.user_vector(user_id)?;
        let scores = self.item_vectors.dot(&user);

        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
        Ok(order
            .into_iter()
            .take(top_k)
            .map(|enc| (self.encoding.items()[enc], scores[enc]))
            .collect())
    }
}

/// Where the recall engine gets its tables from
pub trait AssetSource: Send + Sync {
    /// Known user ids, without loading the model
    fn user_ids(&self) -> Result<Vec<UserId>>;

    /// Full tables; only called once per [`TowerRecall`]
    fn load(&self) -> Result<TowerAssets>;
}

/// Interaction log CSV, bincode text embeddings and bincode checkpoint on disk
#[derive(Debug, Clone)]
pub struct FileAssetSource {
    pub interactions_path: PathBuf,
    pub text_embeddings_path: PathBuf,
    pub checkpoint_path: PathBuf,
    pub dims: TowerDims,
}

impl AssetSource for FileAssetSource {
    fn user_ids(&self) -> Result<Vec<UserId>> {
        Ok(IdEncoding::load(&self.interactions_path)?.users().to_vec())
    }

    #[instrument(skip(self), fields(checkpoint = %self.checkpoint_path.display()))]
    fn load(&self) -> Result<TowerAssets> {
        let encoding = IdEncoding::load(&self.interactions_path)?;
        let text_embeddings = load_text_embeddings(&self.text_embeddings_path)?;
        let checkpoint = TowerCheckpoint::load(&self.checkpoint_path)?;
        TowerAssets::from_parts(encoding, &checkpoint, &text_embeddings, self.dims)
    }
}

/// Lazily initialized two-tower recall cache
pub struct TowerRecall {
    source: Box<dyn AssetSource>,
    assets: OnceCell<TowerAssets>,
}

impl TowerRecall {
    pub fn new(source: impl AssetSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            assets: OnceCell::new(),
        }
    }

    /// Already initialized with loaded tables
    pub fn from_assets(assets: TowerAssets, source: impl AssetSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            assets: OnceCell::with_value(assets),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.assets.get().is_some()
    }

    /// Load the tables on first use; later calls return the cached tables.
    ///
    /// A failed load leaves the cache uninitialized so a later call retries.
    pub fn ensure_ready(&self) -> Result<&TowerAssets> {
        self.assets.get_or_try_init(|| {
            let start = std::time::Instant::now();
            let assets = self.source.load()?;
            info!(
                users = assets.encoding.num_users(),
                items = assets.encoding.num_items(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Two-tower recall ready"
            );
            Ok(assets)
        })
    }

    /// Rank the view's games for `user_id` by embedding affinity.
    ///
    /// The top `top_k` items are chosen over the whole embedding table, then
    /// joined to the view by external id; items outside the view are dropped.
    pub fn recommend(
        &self,
        view: &CatalogView<'_>,
        user_id: UserId,
        top_k: usize,
    ) -> Result<Vec<Recommendation>> {
        let assets = self.ensure_ready()?;
        let top = assets.top_items(user_id, top_k)?;
        let rank: HashMap<ExternalId, (usize, f32)> = top
            .iter()
            .enumerate()
            .map(|(position, &(item_id, score))| (item_id, (position, score)))
            .collect();

        let mut joined: Vec<(usize, Recommendation)> = view
            .iter()
            .filter_map(|game| {
                let &(position, score) = rank.get(&game.rawg_id?)?;
                Some((
                    position,
                    Recommendation::new(game, score, RecommendationType::TwoTower),
                ))
            })
            .collect();
        joined.sort_by_key(|(position, _)| *position);

        debug!(
            user_id,
            top_k,
            returned = joined.len(),
            "Two-tower recall joined to view"
        );
        Ok(joined.into_iter().map(|(_, rec)| rec).collect())
    }

    /// Every user id of the trained table. Does not load the model when the
    /// cache is still uninitialized.
    pub fn list_known_users(&self) -> Result<Vec<UserId>> {
        match self.assets.get() {
            Some(assets) => Ok(assets.encoding.users().to_vec()),
            None => self.source.user_ids(),
        }
    }

    /// A random known user, `None` when the table is empty
    pub fn random_known_user<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Option<UserId>> {
        Ok(self.list_known_users()?.choose(rng).copied())
    }

    /// Cached item vector; unknown ids are rejected
    pub fn item_vector(&self, item_id: ExternalId) -> Result<Vec<f32>> {
        Ok(self.ensure_ready()?.item_vector(item_id)?.to_vec())
    }
}

impl std::fmt::Debug for TowerRecall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TowerRecall")
            .field("ready", &self.is_ready())
            .finish()
    }
}
