use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{FixedOffset, NaiveDate};
use dairy_core::aggregate::{Aggregator, Granularity};
use dairy_core::auth::Credentials;
use dairy_core::domain::account::LoginRequest;
use dairy_core::domain::records::{FeedEntry, HealthKind};
use dairy_core::ingest::{
    fetch_dated, DairyApiClient, DateRange, FetchError, RecordSchema, RecordSource, Resource,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const TOKEN: &str = "good-token";

#[derive(Default)]
struct Counters {
    milk: AtomicUsize,
    animals: AtomicUsize,
    feed_posts: AtomicUsize,
}

type Reply = (StatusCode, Json<Value>);

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {TOKEN}"))
        .unwrap_or(false)
}

fn unauthorized() -> Reply {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"message": "Invalid token"})),
    )
}

async fn feeds(headers: HeaderMap) -> Reply {
    if !authorized(&headers) {
        return unauthorized();
    }
    (
        StatusCode::OK,
        Json(json!([
            {"_id": "f1", "name": "Hay", "quantity": 10, "unit": "kgs", "cost": 100, "datePurchased": "2024-01-01T00:00:00.000Z"},
            {"_id": "f2", "name": "Dairy meal", "quantity": "5", "unit": "kgs", "cost": "50", "datePurchased": "2024-01-01"},
            {"_id": "f3", "name": "Salt", "quantity": "", "unit": "kgs", "cost": 20, "datePurchased": "2024-02-10"},
            {"_id": "f4", "name": "Napier", "quantity": 3, "unit": "kgs", "cost": 30, "datePurchased": "tomorrow"},
            {"_id": "f5", "name": "Silage", "quantity": 7, "unit": "kgs", "cost": 70, "datePurchased": "2024-02-11"}
        ])),
    )
}

async fn add_feed(State(counters): State<Arc<Counters>>, headers: HeaderMap) -> Reply {
    counters.feed_posts.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return unauthorized();
    }
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"message": "Failed to save feed"})),
    )
}

async fn milk(State(counters): State<Arc<Counters>>) -> Reply {
    counters.milk.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"message": "database unavailable"})),
    )
}

async fn animals(State(counters): State<Arc<Counters>>, headers: HeaderMap) -> Reply {
    if !authorized(&headers) {
        return unauthorized();
    }
    if counters.animals.fetch_add(1, Ordering::SeqCst) == 0 {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({})));
    }
    (
        StatusCode::OK,
        Json(json!([{"_id": "a1", "tagId": "KE-001", "breed": "Friesian"}])),
    )
}

async fn lab_tests() -> Reply {
    (StatusCode::OK, Json(json!({"records": []})))
}

async fn login(Json(body): Json<Value>) -> Reply {
    if body["password"] == "Secret123" {
        (
            StatusCode::OK,
            Json(json!({"token": TOKEN, "user": {"email": body["email"]}})),
        )
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Invalid credentials"})),
        )
    }
}

async fn spawn_backend() -> (String, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let app = Router::new()
        .route("/api/feed-management", get(feeds).post(add_feed))
        .route("/api/milk-production/all", get(milk))
        .route("/api/animals", get(animals))
        .route("/api/labTests", get(lab_tests))
        .route("/api/auth/login", axum::routing::post(login))
        .with_state(Arc::clone(&counters));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    (format!("http://{addr}"), counters)
}

fn client(base: &str) -> DairyApiClient {
    DairyApiClient::new(base, Duration::from_secs(5), 3)
        .unwrap()
        .with_backoff(Duration::from_millis(10))
}

fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

#[tokio::test]
async fn feed_records_flow_into_monthly_buckets() {
    let (base, _) = spawn_backend().await;
    let creds = Credentials::bearer(TOKEN);

    let records = fetch_dated(
        &client(&base),
        &creds,
        Resource::Feed,
        &RecordSchema::FEED,
        utc(),
        DateRange::all(),
    )
    .await
    .unwrap();
    assert_eq!(records.len(), 5);

    let agg = Aggregator::new(Granularity::Month).aggregate(&records);
    let labels: Vec<&str> = agg.buckets.iter().map(|b| b.period_label.as_str()).collect();
    assert_eq!(labels, ["January 2024", "February 2024"]);

    let january = agg.bucket("January 2024").unwrap();
    assert_eq!(january.total("cost"), 150.0);
    assert_eq!(january.total("quantity"), 15.0);
    assert_eq!(agg.bucket("February 2024").unwrap().total("cost"), 70.0);

    let skipped: Vec<Option<&str>> = agg.skipped.iter().map(|s| s.id.as_deref()).collect();
    assert_eq!(skipped, [Some("f3"), Some("f4")]);
}

#[tokio::test]
async fn wrong_token_is_an_auth_error() {
    let (base, _) = spawn_backend().await;
    let err = client(&base)
        .feeds(&Credentials::bearer("stale"))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Auth));
}

#[tokio::test]
async fn server_errors_are_retried_then_surfaced() {
    let (base, counters) = spawn_backend().await;
    let err = client(&base)
        .milk_records(&Credentials::bearer(TOKEN))
        .await
        .unwrap_err();

    match err {
        FetchError::Server { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message.as_deref(), Some("database unavailable"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(counters.milk.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn transient_failure_recovers_on_retry() {
    let (base, counters) = spawn_backend().await;
    let animals = client(&base)
        .animals(&Credentials::bearer(TOKEN))
        .await
        .unwrap();
    assert_eq!(animals.len(), 1);
    assert_eq!(animals[0].tag_id, "KE-001");
    assert_eq!(counters.animals.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn mutations_are_sent_once() {
    let (base, counters) = spawn_backend().await;
    let entry = FeedEntry {
        name: "Hay".into(),
        quantity: 1.0,
        unit: "kgs".into(),
        cost: 10.0,
        date_purchased: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
    };
    let err = client(&base)
        .add_feed(&Credentials::bearer(TOKEN), &entry)
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "Failed to save feed");
    assert_eq!(counters.feed_posts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn non_array_collection_is_malformed() {
    let (base, _) = spawn_backend().await;
    let err = client(&base)
        .health_records(&Credentials::bearer(TOKEN), HealthKind::LabTest)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Malformed(_)));
}

#[tokio::test]
async fn login_returns_token() {
    let (base, _) = spawn_backend().await;
    let api = client(&base);
    let res = api
        .login(&LoginRequest {
            email: "a@b.co".into(),
            password: "Secret123".into(),
        })
        .await
        .unwrap();
    assert_eq!(res.token, TOKEN);

    let err = api
        .login(&LoginRequest {
            email: "a@b.co".into(),
            password: "wrong".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "Invalid credentials");
}

#[tokio::test]
async fn unreachable_backend_is_a_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = DairyApiClient::new(&format!("http://{addr}"), Duration::from_secs(2), 1)
        .unwrap()
        .feeds(&Credentials::bearer(TOKEN))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Network(_)));
    assert!(err.user_message().starts_with("Network error"));
}

async fn slow_feeds(State(hits): State<Arc<AtomicUsize>>) -> Reply {
    hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(5)).await;
    (StatusCode::OK, Json(json!([])))
}

#[tokio::test]
async fn slow_backend_times_out_after_retries() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/api/feed-management", get(slow_feeds))
        .with_state(Arc::clone(&hits));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    let api = DairyApiClient::new(&format!("http://{addr}"), Duration::from_millis(200), 2)
        .unwrap()
        .with_backoff(Duration::from_millis(10));
    let err = api
        .fetch_rows(&Credentials::bearer(TOKEN), Resource::Feed)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Timeout), "unexpected error: {err:?}");
    assert_eq!(err.kind(), "timeout");
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}
