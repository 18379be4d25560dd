use crate::features::DEFAULT_MAX_TEXT_FEATURES;
use crate::tower::{FileAssetSource, TowerDims};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Recommender service configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Input file locations
    pub data: DataConfig,

    /// Feature matrix configuration
    pub features: FeatureConfig,

    /// Scoring defaults
    pub scoring: ScoringConfig,

    /// Two-tower table dimensions
    pub tower: TowerDims,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host
    pub host: String,

    /// Server port (default: 8090)
    pub port: u16,

    /// Worker threads
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8090,
            workers: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DataConfig {
    /// Enriched catalog CSV
    pub catalog_path: PathBuf,

    /// Interaction log CSV (user_id, game_id, rating)
    pub interactions_path: PathBuf,

    /// Bincode map of external id to text embedding
    pub text_embeddings_path: PathBuf,

    /// Bincode two-tower checkpoint
    pub checkpoint_path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("data/nintendo_games_enriched.csv"),
            interactions_path: PathBuf::from("data/interactions.csv"),
            text_embeddings_path: PathBuf::from("data/item_text_emb.bin"),
            checkpoint_path: PathBuf::from("data/twotower.bin"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Text vocabulary cap (default: 800)
    pub max_text_features: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            max_text_features: DEFAULT_MAX_TEXT_FEATURES,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Result count when a request omits it
    pub default_top_n: usize,

    /// Upper bound on requested result counts
    pub max_top_n: usize,

    /// Hybrid blend weight when a request omits it
    pub default_alpha: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            default_top_n: 12,
            max_top_n: 40,
            default_alpha: 0.7,
        }
    }
}

impl ScoringConfig {
    /// Requested count, defaulted and capped
    pub fn top_n(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_top_n).min(self.max_top_n)
    }
}

impl EngineConfig {
    /// Load configuration from config file and environment
    pub fn load() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/recommender").required(false))
            .add_source(
                config::Environment::with_prefix("SWITCH_RECS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.features.max_text_features == 0 {
            anyhow::bail!("features.max_text_features must be positive");
        }
        if self.tower.embedding_dim == 0 || self.tower.text_dim == 0 {
            anyhow::bail!("tower dimensions must be positive");
        }
        let alpha = self.scoring.default_alpha;
        if !(0.0..=1.0).contains(&alpha) {
            anyhow::bail!("scoring.default_alpha must be within [0, 1], got {alpha}");
        }
        if self.scoring.max_top_n == 0 || self.scoring.default_top_n > self.scoring.max_top_n {
            anyhow::bail!(
                "scoring.default_top_n ({}) must not exceed a positive max_top_n ({})",
                self.scoring.default_top_n,
                self.scoring.max_top_n
            );
        }
        Ok(())
    }

    /// File-backed two-tower source for the configured paths
    pub fn tower_source(&self) -> FileAssetSource {
        FileAssetSource {
            interactions_path: self.data.interactions_path.clone(),
            text_embeddings_path: self.data.text_embeddings_path.clone(),
            checkpoint_path: self.data.checkpoint_path.clone(),
            dims: self.tower,
        }
    }
}
