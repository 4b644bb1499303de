use axum::http::StatusCode;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;
use vendroute::api;
use vendroute::config::Config;
use vendroute::db::init_db;

struct TestApp {
    app: axum::Router,
    repo: Arc<vendroute::Repository>,
    _temp: TempDir,
}

async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(vendroute::Repository::new(pool));

    let config = Config {
        port: 0,
        database_path: db_path,
        route_slots_per_day: 2,
        route_weekday_labels: vec!["mon".to_string(), "tue".to_string()],
    };

    let app = api::create_router(api::AppState::new(repo.clone(), config));
    TestApp {
        app,
        repo,
        _temp: temp_dir,
    }
}

async fn send(
    app: axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = axum::http::Request::builder().method(method).uri(uri);
    let req = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };

    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_save_template_bumps_version() {
    let test_app = setup_test_app().await;
    let store = test_app.repo.insert_store("A", true).await.unwrap();

    let entries = serde_json::json!({
        "entries": [
            {"zone": "mon-1", "technicianId": null, "storeIds": [store]}
        ]
    });
    let (status, body) = send(
        test_app.app.clone(),
        "POST",
        "/routes/template",
        Some(entries.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], 1);

    let (_s, body) = send(test_app.app.clone(), "POST", "/routes/template", Some(entries)).await;
    assert_eq!(body["version"], 2);

    // an empty template is rejected
    let (status, _b) = send(
        test_app.app,
        "POST",
        "/routes/template",
        Some(serde_json::json!({"entries": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_generate_replays_template() {
    let test_app = setup_test_app().await;
    let tech = test_app
        .repo
        .insert_user("tech", "technician")
        .await
        .unwrap();
    let s1 = test_app.repo.insert_store("A", true).await.unwrap();
    let s2 = test_app.repo.insert_store("B", true).await.unwrap();
    let s3 = test_app.repo.insert_store("C", true).await.unwrap();

    send(
        test_app.app.clone(),
        "POST",
        "/routes/template",
        Some(serde_json::json!({
            "entries": [
                {"zone": "centro", "technicianId": tech, "storeIds": [s1, s2]},
                {"zone": "norte", "technicianId": null, "storeIds": [s3]},
                {"zone": "sul", "technicianId": null, "storeIds": []}
            ]
        })),
    )
    .await;

    let (status, body) = send(
        test_app.app.clone(),
        "POST",
        "/routes/generate",
        Some(serde_json::json!({"date": "2026-08-24", "useTemplate": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let route_ids = body["routeIds"].as_array().unwrap();
    // template replay creates one route per entry
    assert_eq!(route_ids.len(), 3);

    let (_s, body) = send(
        test_app.app.clone(),
        "GET",
        &format!("/routes/{}", route_ids[0].as_i64().unwrap()),
        None,
    )
    .await;
    assert_eq!(body["route"]["zone"], "centro");
    assert_eq!(body["route"]["date"], "2026-08-24");
    assert_eq!(body["route"]["assignedTechnicianId"], tech);
    let stores = body["stores"].as_array().unwrap();
    assert_eq!(stores.len(), 2);
    assert_eq!(stores[0]["storeId"], s1);
    assert_eq!(stores[1]["storeId"], s2);

    // with two slots per day, the third entry falls on the next day
    let (_s, body) = send(
        test_app.app,
        "GET",
        &format!("/routes/{}", route_ids[2].as_i64().unwrap()),
        None,
    )
    .await;
    assert_eq!(body["route"]["zone"], "sul");
    assert_eq!(body["route"]["date"], "2026-08-25");
}

#[tokio::test]
async fn test_template_replay_handles_store_churn() {
    let test_app = setup_test_app().await;
    let s1 = test_app.repo.insert_store("A", true).await.unwrap();
    let s2 = test_app.repo.insert_store("B", true).await.unwrap();

    send(
        test_app.app.clone(),
        "POST",
        "/routes/template",
        Some(serde_json::json!({
            "entries": [
                {"zone": "centro", "technicianId": null, "storeIds": [s1, s2]},
                {"zone": "norte", "technicianId": null, "storeIds": []}
            ]
        })),
    )
    .await;

    // s2 deactivated after the template was saved; s3 appeared
    test_app.repo.set_store_active(s2, false).await.unwrap();
    let s3 = test_app.repo.insert_store("C", true).await.unwrap();

    let (_s, body) = send(
        test_app.app.clone(),
        "POST",
        "/routes/generate",
        Some(serde_json::json!({"date": "2026-08-24", "useTemplate": true})),
    )
    .await;
    let route_ids = body["routeIds"].as_array().unwrap().clone();

    // deactivated store dropped from its entry
    let (_s, body) = send(
        test_app.app.clone(),
        "GET",
        &format!("/routes/{}", route_ids[0].as_i64().unwrap()),
        None,
    )
    .await;
    let stores = body["stores"].as_array().unwrap();
    assert_eq!(stores.len(), 1);
    assert_eq!(stores[0]["storeId"], s1);

    // new store appended to the least-loaded entry
    let (_s, body) = send(
        test_app.app,
        "GET",
        &format!("/routes/{}", route_ids[1].as_i64().unwrap()),
        None,
    )
    .await;
    let stores = body["stores"].as_array().unwrap();
    assert_eq!(stores.len(), 1);
    assert_eq!(stores[0]["storeId"], s3);
}

#[tokio::test]
async fn test_generate_without_template_flag_ignores_template() {
    let test_app = setup_test_app().await;
    let store = test_app.repo.insert_store("A", true).await.unwrap();

    send(
        test_app.app.clone(),
        "POST",
        "/routes/template",
        Some(serde_json::json!({
            "entries": [{"zone": "centro", "technicianId": null, "storeIds": [store]}]
        })),
    )
    .await;

    let (_s, body) = send(
        test_app.app,
        "POST",
        "/routes/generate",
        Some(serde_json::json!({"date": "2026-08-24"})),
    )
    .await;
    // round-robin grid, not the single template entry: 2 days x 2 slots
    assert_eq!(body["routeIds"].as_array().unwrap().len(), 4);
}
