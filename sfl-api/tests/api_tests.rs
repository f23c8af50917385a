//! Integration tests for the sfl-api endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::NaiveDate;
use serde_json::Value;
use sfl_api::{build_router, AppState};
use sfl_common::db::init_database;
use sfl_common::store::{InMemoryStore, SqliteStore};
use sfl_common::time::LocalTime;
use sfl_common::{Granularity, PeriodLabel, SentimentCounts, TimeSeriesStore};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

/// Store seeded with a handful of buckets at every granularity
async fn seeded_store() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    let seed = [
        (Granularity::Hour, "2024-03-05:07", (1, 0, 0)),
        (Granularity::Hour, "2024-03-05:08", (2, 0, 0)),
        (Granularity::Hour, "2024-03-05:09", (0, 0, 1)),
        (Granularity::Hour, "2024-03-06:00", (0, 5, 0)),
        (Granularity::Day, "2024-03-01", (10, 1, 1)),
        (Granularity::Day, "2024-03-02", (20, 2, 2)),
        (Granularity::Day, "2024-03-05", (3, 0, 1)),
        (Granularity::Day, "2024-03-08", (4, 4, 4)),
        (Granularity::Month, "2023-02", (9, 9, 9)),
        (Granularity::Month, "2023-03", (1, 1, 1)),
        (Granularity::Month, "2024-02", (7, 8, 9)),
    ];
    for (granularity, label, (p, n, neg)) in seed {
        let period = PeriodLabel::parse(granularity, label).unwrap();
        store.put_merge(&period, &SentimentCounts::new(p, n, neg)).await.unwrap();
    }
    store
}

/// Router over the seeded store with "today" pinned to 2024-03-10
async fn setup_app() -> axum::Router {
    let local = LocalTime::from_offset_minutes(60).unwrap();
    let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
    let state = AppState::new(seeded_store().await, 2, local).with_fixed_today(today);
    build_router(state)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn dates(body: &Value) -> Vec<String> {
    body["series"]
        .as_array()
        .expect("series array")
        .iter()
        .map(|entry| entry["date"].as_str().unwrap().to_string())
        .collect()
}

// =============================================================================
// Root and health
// =============================================================================

#[tokio::test]
async fn test_root() {
    let (status, body) = get(setup_app().await, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Hello World");
}

#[tokio::test]
async fn test_health() {
    let (status, body) = get(setup_app().await, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "sfl-api");
    assert!(body["version"].is_string());
}

// =============================================================================
// Hourly
// =============================================================================

#[tokio::test]
async fn test_hourly_recent_returns_one_day() {
    let (status, body) = get(setup_app().await, "/api/v1/impressions/hourly/recent/?date=2024-03-05").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dates(&body), vec!["2024-03-05:07", "2024-03-05:08", "2024-03-05:09"]);
    assert_eq!(body["series"][1]["statistic"]["positive"], 2);
    assert_eq!(body["series"][2]["statistic"]["negative"], 1);
}

#[tokio::test]
async fn test_hourly_recent_requires_date() {
    let (status, body) = get(setup_app().await, "/api/v1/impressions/hourly/recent/").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, _) = get(setup_app().await, "/api/v1/impressions/hourly/recent/?date=05-03-2024").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_hourly_period_open_ended() {
    let (status, body) = get(setup_app().await, "/api/v1/impressions/hourly/period/?start=2024-03-05:09").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dates(&body), vec!["2024-03-05:09", "2024-03-06:00"]);
}

#[tokio::test]
async fn test_hourly_date() {
    let (status, body) = get(setup_app().await, "/api/v1/impressions/hourly/date/2024-03-05:08").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["date"], "2024-03-05:08");
    assert_eq!(body["statistic"]["positive"], 2);
    assert_eq!(body["statistic"]["neutral"], 0);
}

#[tokio::test]
async fn test_hourly_date_wrong_granularity_is_bad_request() {
    let (status, _) = get(setup_app().await, "/api/v1/impressions/hourly/date/2024-03-05").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Daily
// =============================================================================

#[tokio::test]
async fn test_daily_recent_default_window() {
    // today 2024-03-10, n=7, offset 2 -> from 2024-03-02
    let (status, body) = get(setup_app().await, "/api/v1/impressions/daily/recent/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dates(&body), vec!["2024-03-02", "2024-03-05", "2024-03-08"]);
}

#[tokio::test]
async fn test_daily_recent_n() {
    let (_, body) = get(setup_app().await, "/api/v1/impressions/daily/recent/?n=3").await;
    assert_eq!(dates(&body), vec!["2024-03-08"]);

    let (status, body) = get(setup_app().await, "/api/v1/impressions/daily/recent/?n=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, _) = get(setup_app().await, "/api/v1/impressions/daily/recent/?n=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_daily_last_week_and_month() {
    let (status, body) = get(setup_app().await, "/api/v1/impressions/daily/last_week/?date=2024-03-10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dates(&body), vec!["2024-03-02", "2024-03-05", "2024-03-08"]);

    let (status, body) = get(setup_app().await, "/api/v1/impressions/daily/last_month/?date=2024-03-10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dates(&body), vec!["2024-03-01", "2024-03-02", "2024-03-05", "2024-03-08"]);

    let (status, _) = get(setup_app().await, "/api/v1/impressions/daily/last_week/?date=2024-3-10").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recent_with_huge_n_is_bad_request() {
    let (status, body) = get(setup_app().await, "/api/v1/impressions/daily/recent/?n=100000000").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, body) = get(setup_app().await, "/api/v1/impressions/monthly/recent/?n=4000000").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_daily_period_inclusive() {
    let (status, body) = get(
        setup_app().await,
        "/api/v1/impressions/daily/period/?start=2024-03-02&end=2024-03-05",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dates(&body), vec!["2024-03-02", "2024-03-05"]);
}

#[tokio::test]
async fn test_daily_period_inverted_is_bad_request() {
    let (status, body) = get(
        setup_app().await,
        "/api/v1/impressions/daily/period/?start=2024-03-05&end=2024-03-01",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_daily_period_requires_start() {
    let (status, _) = get(setup_app().await, "/api/v1/impressions/daily/period/?end=2024-03-05").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_daily_date_missing_is_not_found() {
    let (status, body) = get(setup_app().await, "/api/v1/impressions/daily/date/2024-03-03").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

// =============================================================================
// Monthly
// =============================================================================

#[tokio::test]
async fn test_monthly_recent_default_window() {
    // today 2024-03-10, n=12, offset 2 -> from 2023-03
    let (status, body) = get(setup_app().await, "/api/v1/impressions/monthly/recent/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dates(&body), vec!["2023-03", "2024-02"]);
}

#[tokio::test]
async fn test_monthly_last_year() {
    let (status, body) = get(setup_app().await, "/api/v1/impressions/monthly/last_year/?date=2024-03").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dates(&body), vec!["2023-03", "2024-02"]);

    let (status, _) = get(setup_app().await, "/api/v1/impressions/monthly/last_year/?date=2024-03-01").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_monthly_period_and_date() {
    let (_, body) = get(setup_app().await, "/api/v1/impressions/monthly/period/?start=2023-01&end=2023-12").await;
    assert_eq!(dates(&body), vec!["2023-02", "2023-03"]);

    let (status, body) = get(setup_app().await, "/api/v1/impressions/monthly/date/2024-02").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["statistic"]["negative"], 9);

    let (status, _) = get(setup_app().await, "/api/v1/impressions/monthly/date/2024-13").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// SQLite-backed
// =============================================================================

#[tokio::test]
async fn test_sqlite_store_behind_router() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("sfl.db")).await.unwrap();
    let store = Arc::new(SqliteStore::new(pool));
    let day = PeriodLabel::parse(Granularity::Day, "2024-03-05").unwrap();
    store.put_merge(&day, &SentimentCounts::new(1, 2, 3)).await.unwrap();
    store.put_merge(&day, &SentimentCounts::new(1, 0, 0)).await.unwrap();

    let state = AppState::new(store, 2, LocalTime::from_offset_minutes(60).unwrap());
    let (status, body) = get(build_router(state), "/api/v1/impressions/daily/date/2024-03-05").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["statistic"]["positive"], 2);
    assert_eq!(body["statistic"]["neutral"], 2);
    assert_eq!(body["statistic"]["negative"], 3);
}
