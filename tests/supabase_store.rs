// tests/supabase_store.rs
//
// SupabaseStore against a local axum stand-in for PostgREST.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};

use krux_news_ingest::ingest::types::RawEvent;
use krux_news_ingest::record::{NewNewsRecord, RecordContext};
use krux_news_ingest::store::{InsertOutcome, NewsStore, StorageError, SupabaseStore};

#[derive(Default)]
struct Fake {
    rows: Vec<Value>,
    seen_prefer: Vec<String>,
    seen_queries: Vec<HashMap<String, String>>,
}

type Shared = Arc<Mutex<Fake>>;

fn authorized(h: &HeaderMap) -> bool {
    h.get("apikey").and_then(|v| v.to_str().ok()) == Some("svc-key")
        && h.get("authorization").and_then(|v| v.to_str().ok()) == Some("Bearer svc-key")
}

async fn insert(
    State(fake): State<Shared>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> axum::response::Response {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "no").into_response();
    }
    let mut f = fake.lock().unwrap();
    f.seen_prefer.push(
        headers
            .get("prefer")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
    );
    f.seen_queries.push(q);

    let key = body["dedup_key"].clone();
    if f.rows.iter().any(|r| r["dedup_key"] == key) {
        return (StatusCode::CREATED, Json(json!([]))).into_response();
    }
    let id = f.rows.len() as i64 + 1;
    let mut row = body;
    row["id"] = json!(id);
    row["created_at"] = json!(format!("2026-01-24T10:00:0{id}.000000+00:00"));
    f.rows.push(row);
    (StatusCode::CREATED, Json(json!([{ "id": id }]))).into_response()
}

async fn select(
    State(fake): State<Shared>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> axum::response::Response {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "no").into_response();
    }
    let mut f = fake.lock().unwrap();
    f.seen_queries.push(q.clone());
    let mut rows = f.rows.clone();
    if let Some(id) = q.get("id").and_then(|v| v.strip_prefix("eq.")) {
        rows.retain(|r| r["id"].to_string() == id);
    }
    if q.get("order").map(String::as_str) == Some("created_at.desc,id.desc") {
        rows.reverse();
    }
    Json(Value::Array(rows)).into_response()
}

async fn spawn(fake: Shared) -> String {
    let app = Router::new()
        .route("/rest/v1/webhooks", get(select).post(insert))
        .route(
            "/rest/v1/broken",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "db down") })
                .post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "db down") }),
        )
        .with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn record(output: &str) -> NewNewsRecord {
    let full = json!({ "type": "monitor.event.detected" });
    let ctx = RecordContext {
        received_at: Utc::now(),
        event_type: "monitor.event.detected",
        monitor_id: "m1",
        event_group_id: "g1",
        monitor_type: "funding_models",
        full_data: &full,
    };
    NewNewsRecord::from_event(
        &ctx,
        &RawEvent {
            output: output.into(),
            event_date: Some("2026-01-24".into()),
            source_urls: vec!["https://a.com".into()],
        },
    )
}

fn store(base: &str, table: &str) -> SupabaseStore {
    SupabaseStore::new(base, "svc-key", table, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn insert_is_insert_or_ignore_on_dedup_key() {
    let fake: Shared = Arc::default();
    let base = spawn(fake.clone()).await;
    let s = store(&base, "webhooks");

    assert_eq!(s.insert(&record("a")).await.unwrap(), InsertOutcome::Inserted(1));
    assert_eq!(s.insert(&record("a")).await.unwrap(), InsertOutcome::Duplicate);
    assert_eq!(s.insert(&record("b")).await.unwrap(), InsertOutcome::Inserted(2));

    let f = fake.lock().unwrap();
    assert_eq!(f.rows.len(), 2);
    assert!(f
        .seen_prefer
        .iter()
        .all(|p| p.contains("resolution=ignore-duplicates") && p.contains("return=representation")));
    assert_eq!(
        f.seen_queries[0].get("on_conflict").map(String::as_str),
        Some("dedup_key")
    );
}

#[tokio::test]
async fn select_all_is_newest_first_and_select_by_id_filters() {
    let fake: Shared = Arc::default();
    let base = spawn(fake.clone()).await;
    let s = store(&base, "webhooks");

    for t in ["a", "b", "c"] {
        s.insert(&record(t)).await.unwrap();
    }

    let rows = s.select_all().await.unwrap();
    let outs: Vec<_> = rows.iter().map(|r| r.news_output.as_str()).collect();
    assert_eq!(outs, vec!["c", "b", "a"]);
    assert_eq!(rows[0].monitor_type, "funding_models");
    assert!(rows[0].created_at.is_some());

    let one = s.select_by_id(2).await.unwrap().unwrap();
    assert_eq!(one.news_output, "b");
    assert!(s.select_by_id(42).await.unwrap().is_none());
}

#[tokio::test]
async fn server_errors_surface_as_status() {
    let fake: Shared = Arc::default();
    let base = spawn(fake).await;
    let s = store(&base, "broken");

    match s.insert(&record("a")).await.unwrap_err() {
        StorageError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "db down");
        }
        other => panic!("expected Status, got {other:?}"),
    }
    assert!(matches!(
        s.select_all().await.unwrap_err(),
        StorageError::Status { status: 500, .. }
    ));
}
