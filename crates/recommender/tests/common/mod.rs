//! Shared on-disk fixtures

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use switch_recs_engine::tower::{TowerCheckpoint, TowerDims};
use switch_recs_engine::{Catalog, EngineConfig, RecommenderEngine, TowerRecall};
use tempfile::TempDir;

pub const CATALOG_CSV: &str = "\
id,name,genre,tags,rating,ratings_count,sinopsis,enriched_sinopsis,rawg_id
1,The Legend of Zelda: Breath of the Wild,Adventure,\"['Open World', 'Exploration', 'Singleplayer']\",4.6,4200,Link wakes up,Link wakes from a long sleep to explore an open kingdom,22511
2,Xenoblade Chronicles 2,RPG,\"['Open World', 'JRPG', 'Singleplayer']\",4.1,700,Rex joins Pyra,A salvager explores an open world of titans in a grand role playing story,10243
3,Mario Kart 8 Deluxe,Racing,\"['Multiplayer', 'Racing', 'Local Co-Op']\",4.4,2100,Karts,Kart racing with friends across colourful tracks,28153
4,Splatoon 3,Shooter,\"['Multiplayer', 'Online', 'Shooter']\",4.0,900,Ink,Squid kids battle online with ink in team shooter matches,
5,Tetris 99,Puzzle,['No tags'],,abc,Falling blocks,,3498
";

pub const EMBEDDING_DIM: usize = 2;
pub const TEXT_DIM: usize = 2;

/// Catalog, interaction log and tower tables written to a temp directory
pub struct Fixture {
    pub dir: TempDir,
    pub config: EngineConfig,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let catalog_path = write(&dir, "games.csv", CATALOG_CSV.as_bytes());
        // users 11 and 12; items 22511, 10243, 28153, 3498 in first-seen order
        let interactions_path = write(
            &dir,
            "interactions.csv",
            b"user_id,game_id,rating\n11,22511,5\n11,10243,4\n12,28153,5\n12,3498,3\n",
        );

        let mut text: HashMap<i64, Vec<f32>> = HashMap::new();
        text.insert(22511, vec![1.0, 0.0]);
        text.insert(28153, vec![0.0, 1.0]);
        let text_embeddings_path = write(
            &dir,
            "item_text_emb.bin",
            &bincode::serialize(&text).unwrap(),
        );

        let checkpoint = TowerCheckpoint {
            embedding_dim: EMBEDDING_DIM,
            text_dim: TEXT_DIM,
            user_embeddings: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            item_id_embeddings: vec![
                vec![0.2, 0.0],
                vec![0.6, 0.1],
                vec![0.0, 0.2],
                vec![0.1, 0.9],
            ],
            text_projection_weight: vec![vec![0.5, 0.0], vec![0.0, 0.5]],
            text_projection_bias: vec![0.0, 0.0],
        };
        let checkpoint_path = write(&dir, "twotower.bin", &checkpoint.to_bytes().unwrap());

        let mut config = EngineConfig::default();
        config.data.catalog_path = catalog_path;
        config.data.interactions_path = interactions_path;
        config.data.text_embeddings_path = text_embeddings_path;
        config.data.checkpoint_path = checkpoint_path;
        config.tower = TowerDims {
            embedding_dim: EMBEDDING_DIM,
            text_dim: TEXT_DIM,
        };

        Self { dir, config }
    }

    /// Tower files load lazily, so keep the fixture alive as long as the engine
    pub fn engine(&self) -> RecommenderEngine {
        RecommenderEngine::from_config(&self.config).unwrap()
    }

    pub fn catalog(&self) -> Catalog {
        Catalog::load(&self.config.data.catalog_path).unwrap()
    }

    pub fn tower(&self) -> TowerRecall {
        TowerRecall::new(self.config.tower_source())
    }
}

fn write(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(bytes).unwrap();
    path
}
