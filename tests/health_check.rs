use actix_web::{test, web, App};
use bingo_session_server::{configure_routes, AppState, Settings};
use chrono::DateTime;

#[actix_web::test]
async fn test_health_check() {
    let config = Settings::new_for_test().expect("Failed to load test config");
    let state = web::Data::new(AppState::in_memory(config));

    let app = test::init_service(App::new().app_data(state).configure(configure_routes)).await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;

    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "healthy");

    let timestamp = body["timestamp"].as_str().expect("timestamp should be a string");
    assert!(DateTime::parse_from_rfc3339(timestamp).is_ok());
}
