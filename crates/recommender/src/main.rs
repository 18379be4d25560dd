//! Switch recommendation service
//!
//! Port: 8090
//! Serves quality, tag, hybrid and two-tower rankings over the game catalog

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use switch_recs_engine::server::{self, AppState};
use switch_recs_engine::{telemetry, EngineConfig, RecommenderEngine};
use tracing::info;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing("info")?;

    let config = EngineConfig::load().context("Failed to load configuration")?;
    let engine = RecommenderEngine::from_config(&config).with_context(|| {
        format!(
            "Failed to build engine from {}",
            config.data.catalog_path.display()
        )
    })?;
    let engine = Arc::new(engine);

    info!(
        host = %config.server.host,
        port = config.server.port,
        "Starting Switch recommendation service"
    );

    let scoring = config.scoring.clone();
    let state = web::Data::new(AppState { engine, scoring });

    let mut http = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(server::configure_routes)
    });
    if let Some(workers) = config.server.workers {
        http = http.workers(workers);
    }

    http.bind((config.server.host.as_str(), config.server.port))?
        .run()
        .await?;
    Ok(())
}
