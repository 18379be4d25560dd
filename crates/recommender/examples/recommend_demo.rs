//! Example: rank the catalog with every strategy from the command line
//!
//! Run with:
//! ```bash
//! export SWITCH_RECS__DATA__CATALOG_PATH=data/nintendo_games_enriched.csv
//! cargo run --example recommend_demo -- "Hollow Knight"
//! ```

use anyhow::Result;
use switch_recs_engine::{EngineConfig, RecommenderEngine, ViewFilter};

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = EngineConfig::load()?;
    let engine = RecommenderEngine::from_config(&config)?;
    let view = engine.view(&ViewFilter::default());
    println!(
        "Catalog: {} games, feature width {}",
        engine.catalog().len(),
        engine.features().width()
    );

    println!("\nTop quality:");
    for rec in engine.top_quality(&view, 5) {
        println!("  {:<40} {:.3}", rec.game.name, rec.score);
    }

    if let Some(reference) = std::env::args().nth(1) {
        println!("\nSimilar to {reference}:");
        for rec in engine.hybrid(&view, &reference, 5, config.scoring.default_alpha)? {
            println!("  {:<40} {:.3}", rec.game.name, rec.score);
        }
    }

    // Recall only runs when the trained tables are present
    let mut rng = rand::thread_rng();
    match engine.tower().random_known_user(&mut rng) {
        Ok(Some(user_id)) => {
            println!("\nTwo-tower picks for user {user_id}:");
            for rec in engine.tower_recall(&view, user_id, 5)? {
                println!("  {:<40} {:.3}", rec.game.name, rec.score);
            }
        }
        Ok(None) => println!("\nInteraction log has no users"),
        Err(e) => println!("\nTwo-tower recall unavailable: {e}"),
    }

    Ok(())
}
