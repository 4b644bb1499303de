use axum::http::StatusCode;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;
use vendroute::api;
use vendroute::config::Config;
use vendroute::db::init_db;
use vendroute::domain::Money;

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
        route_weekday_labels: vec!["mon".to_string()],
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
    user: Option<(i64, &str)>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);
    if let Some((user_id, role)) = user {
        builder = builder
            .header("x-user-id", user_id.to_string())
            .header("x-user-role", role);
    }
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
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn fixture(repo: &vendroute::Repository) -> (i64, i64, i64) {
    let tech = repo.insert_user("tech", "technician").await.unwrap();
    let store = repo.insert_store("Loja", true).await.unwrap();
    let machine = repo
        .insert_machine(store, "M1", Money::parse("10").unwrap(), true)
        .await
        .unwrap();
    (tech, store, machine)
}

#[tokio::test]
async fn test_create_movement_derives_total_post_and_store() {
    let test_app = setup_test_app().await;
    let (tech, store, machine) = fixture(&test_app.repo).await;

    let (status, body) = send(
        test_app.app,
        "POST",
        "/movements",
        Some((tech, "technician")),
        Some(serde_json::json!({
            "machineId": machine,
            "collectedAt": 1000,
            "totalPre": 40,
            "restockedCount": 20,
            "tokensCollected": 55
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalPost"], 60);
    assert_eq!(body["storeId"], store);
    assert_eq!(body["userId"], tech);
    assert_eq!(body["kind"], "normal");
    // no bag number: the cash was counted on the spot
    assert_eq!(body["financialStatus"], "completed");
}

#[tokio::test]
async fn test_create_stock_withdrawal_subtracts_left_count() {
    let test_app = setup_test_app().await;
    let (tech, _store, machine) = fixture(&test_app.repo).await;

    let (status, body) = send(
        test_app.app,
        "POST",
        "/movements",
        Some((tech, "technician")),
        Some(serde_json::json!({
            "machineId": machine,
            "collectedAt": 1000,
            "kind": "stock_withdrawal",
            "totalPre": 40,
            "leftCount": 15,
            "restockedCount": 5
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalPost"], 30);
    assert_eq!(body["kind"], "stock_withdrawal");
}

#[tokio::test]
async fn test_create_with_bag_number_starts_pending() {
    let test_app = setup_test_app().await;
    let (tech, _store, machine) = fixture(&test_app.repo).await;

    let (_s, body) = send(
        test_app.app,
        "POST",
        "/movements",
        Some((tech, "technician")),
        Some(serde_json::json!({
            "machineId": machine,
            "collectedAt": 1000,
            "totalPre": 10,
            "restockedCount": 0,
            "bagNumber": "BAG-7"
        })),
    )
    .await;
    assert_eq!(body["financialStatus"], "pending");
    assert_eq!(body["bagNumber"], "BAG-7");
}

#[tokio::test]
async fn test_create_movement_validation_and_identity() {
    let test_app = setup_test_app().await;
    let (tech, _store, machine) = fixture(&test_app.repo).await;

    // negative counts rejected
    let (status, _b) = send(
        test_app.app.clone(),
        "POST",
        "/movements",
        Some((tech, "technician")),
        Some(serde_json::json!({
            "machineId": machine,
            "totalPre": -1,
            "restockedCount": 0
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // unknown machine
    let (status, _b) = send(
        test_app.app.clone(),
        "POST",
        "/movements",
        Some((tech, "technician")),
        Some(serde_json::json!({
            "machineId": 9999,
            "totalPre": 1,
            "restockedCount": 0
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // identity headers required
    let (status, _b) = send(
        test_app.app,
        "POST",
        "/movements",
        None,
        Some(serde_json::json!({
            "machineId": machine,
            "totalPre": 1,
            "restockedCount": 0
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_edit_movement_author_or_admin_only() {
    let test_app = setup_test_app().await;
    let (tech, _store, machine) = fixture(&test_app.repo).await;
    let other = test_app
        .repo
        .insert_user("other", "technician")
        .await
        .unwrap();
    let admin = test_app.repo.insert_user("boss", "admin").await.unwrap();

    let (_s, body) = send(
        test_app.app.clone(),
        "POST",
        "/movements",
        Some((tech, "technician")),
        Some(serde_json::json!({
            "machineId": machine,
            "collectedAt": 1000,
            "totalPre": 10,
            "restockedCount": 0,
            "tokensCollected": 5
        })),
    )
    .await;
    let movement_id = body["id"].as_i64().unwrap();
    let uri = format!("/movements/{}", movement_id);
    let edit = serde_json::json!({"tokensCollected": 7, "notes": "recount"});

    // a different technician may not edit
    let (status, _b) = send(
        test_app.app.clone(),
        "PUT",
        &uri,
        Some((other, "technician")),
        Some(edit.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // the author may
    let (status, body) = send(
        test_app.app.clone(),
        "PUT",
        &uri,
        Some((tech, "technician")),
        Some(edit.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tokensCollected"], 7);
    assert_eq!(body["notes"], "recount");

    // and so may an admin
    let (status, _b) = send(
        test_app.app,
        "PUT",
        &uri,
        Some((admin, "admin")),
        Some(serde_json::json!({"tokensCollected": 8})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_fill_financials_is_one_way() {
    let test_app = setup_test_app().await;
    let (tech, _store, machine) = fixture(&test_app.repo).await;

    let (_s, body) = send(
        test_app.app.clone(),
        "POST",
        "/movements",
        Some((tech, "technician")),
        Some(serde_json::json!({
            "machineId": machine,
            "collectedAt": 1000,
            "totalPre": 10,
            "restockedCount": 0,
            "bagNumber": "BAG-7"
        })),
    )
    .await;
    let movement_id = body["id"].as_i64().unwrap();
    let uri = format!("/movements/{}/financial", movement_id);
    let fill = serde_json::json!({
        "entryValueTokens": 60.0,
        "entryValueBills": 40.0,
        "entryValueCard": 0.0
    });

    let (status, body) = send(
        test_app.app.clone(),
        "PUT",
        &uri,
        Some((tech, "technician")),
        Some(fill.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["financialStatus"], "completed");
    assert_eq!(body["entryValueTokens"], 60.0);

    // a second fill conflicts
    let (status, _b) = send(
        test_app.app.clone(),
        "PUT",
        &uri,
        Some((tech, "technician")),
        Some(fill),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // negative values rejected
    let (status, _b) = send(
        test_app.app,
        "PUT",
        &uri,
        Some((tech, "technician")),
        Some(serde_json::json!({
            "entryValueTokens": -1.0,
            "entryValueBills": 0.0,
            "entryValueCard": 0.0
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_movements_filters() {
    let test_app = setup_test_app().await;
    let (tech, store, machine) = fixture(&test_app.repo).await;
    let other_store = test_app.repo.insert_store("Outra", true).await.unwrap();
    let other_machine = test_app
        .repo
        .insert_machine(other_store, "M2", Money::zero(), true)
        .await
        .unwrap();

    for (m, at) in [(machine, 1000), (machine, 2000), (other_machine, 3000)] {
        send(
            test_app.app.clone(),
            "POST",
            "/movements",
            Some((tech, "technician")),
            Some(serde_json::json!({
                "machineId": m,
                "collectedAt": at,
                "totalPre": 10,
                "restockedCount": 0
            })),
        )
        .await;
    }

    let (status, body) = send(
        test_app.app.clone(),
        "GET",
        &format!("/movements?machineId={}", machine),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let movements = body["movements"].as_array().unwrap();
    assert_eq!(movements.len(), 2);
    // chronological order
    assert_eq!(movements[0]["collectedAt"], 1000);
    assert_eq!(movements[1]["collectedAt"], 2000);

    let (_s, body) = send(
        test_app.app,
        "GET",
        &format!("/movements?storeId={}", store),
        None,
        None,
    )
    .await;
    assert_eq!(body["movements"].as_array().unwrap().len(), 2);
}
