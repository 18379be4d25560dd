//! HTTP endpoint wiring

mod common;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use common::Fixture;
use serde_json::{json, Value};
use std::sync::Arc;
use switch_recs_engine::config::ScoringConfig;
use switch_recs_engine::server::{self, AppState, RecommendationsResponse};

fn state(fixture: &Fixture) -> web::Data<AppState> {
    web::Data::new(AppState {
        engine: Arc::new(fixture.engine()),
        scoring: ScoringConfig::default(),
    })
}

#[actix_web::test]
async fn test_health_check() {
    let fixture = Fixture::new();
    let app = test::init_service(
        App::new()
            .app_data(state(&fixture))
            .configure(server::configure_routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["games"], 5);
    assert_eq!(body["tower_ready"], false);
}

#[actix_web::test]
async fn test_top_quality_with_query_filter() {
    let fixture = Fixture::new();
    let app = test::init_service(
        App::new()
            .app_data(state(&fixture))
            .configure(server::configure_routes),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/v1/recommendations/top-quality?genre=RPG,Racing&n=5")
        .to_request();
    let body: RecommendationsResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.count, 2);
    assert_eq!(body.recommendations[0].game.name, "Mario Kart 8 Deluxe");
    assert_eq!(body.recommendations[1].game.name, "Xenoblade Chronicles 2");
}

#[actix_web::test]
async fn test_catalog_stats_and_tags() {
    let fixture = Fixture::new();
    let app = test::init_service(
        App::new()
            .app_data(state(&fixture))
            .configure(server::configure_routes),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/v1/catalog/stats")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["total"], 5);
    assert_eq!(body["without_tags"], 1);

    let req = test::TestRequest::get()
        .uri("/api/v1/tags?q=multi")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["tags"], json!(["Multiplayer"]));
}

#[actix_web::test]
async fn test_by_tags_and_empty_request() {
    let fixture = Fixture::new();
    let app = test::init_service(
        App::new()
            .app_data(state(&fixture))
            .configure(server::configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/recommendations/by-tags")
        .set_json(json!({ "tags": ["Open World", "JRPG"] }))
        .to_request();
    let body: RecommendationsResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.count, 2);
    assert_eq!(body.recommendations[0].game.name, "Xenoblade Chronicles 2");
    assert_eq!(body.recommendations[0].score, 1.0);

    let req = test::TestRequest::post()
        .uri("/api/v1/recommendations/by-tags")
        .set_json(json!({ "tags": [] }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "invalid_argument");
}

#[actix_web::test]
async fn test_hybrid_unknown_reference() {
    let fixture = Fixture::new();
    let app = test::init_service(
        App::new()
            .app_data(state(&fixture))
            .configure(server::configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/recommendations/hybrid")
        .set_json(json!({ "reference": "Metroid Prime", "alpha": 0.5 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/api/v1/recommendations/hybrid")
        .set_json(json!({
            "reference": "Splatoon 3",
            "n": 2,
            "filter": { "genres": ["Shooter", "Racing", "RPG"] }
        }))
        .to_request();
    let body: RecommendationsResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.count, 2);
    assert!(body
        .recommendations
        .iter()
        .all(|r| r.game.name != "Splatoon 3"));
}

#[actix_web::test]
async fn test_two_tower_and_users() {
    let fixture = Fixture::new();
    let data = state(&fixture);
    let app = test::init_service(
        App::new()
            .app_data(data.clone())
            .configure(server::configure_routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/v1/users").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["users"], json!([11, 12]));
    assert!(!data.engine.tower().is_ready());

    let req = test::TestRequest::post()
        .uri("/api/v1/recommendations/two-tower")
        .set_json(json!({ "user_id": 11, "n": 2 }))
        .to_request();
    let body: RecommendationsResponse = test::call_and_read_body_json(&app, req).await;
    assert!(data.engine.tower().is_ready());
    assert_eq!(body.count, 2);
    assert_eq!(
        body.recommendations[0].game.name,
        "The Legend of Zelda: Breath of the Wild"
    );

    let req = test::TestRequest::post()
        .uri("/api/v1/recommendations/two-tower")
        .set_json(json!({ "user_id": 999 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "unknown_user");
}
