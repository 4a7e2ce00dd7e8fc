//! REST transport against a local server speaking the command protocol.
#![allow(clippy::tests_outside_test_module)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use gate_store::{KeyScan, KvStore, RestStore, StoreError};
use serde_json::{Value, json};

const TOKEN: &str = "test-token";

#[derive(Clone, Default)]
struct FakeKv {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

async fn handle_get(
    State(kv): State<FakeKv>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> Response {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"}))).into_response();
    }
    match key.as_str() {
        "nested" => Json(json!({"result": {"usedCount": 4, "monthKey": "2024-01"}})).into_response(),
        "boom" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        "garbled" => "definitely not json".into_response(),
        "wrongtype" => Json(json!({"error": "WRONGTYPE Operation against a key"})).into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(json!({"result": null})).into_response()
        }
        _ => {
            let value = kv.entries.lock().unwrap().get(&key).cloned();
            Json(json!({ "result": value })).into_response()
        }
    }
}

async fn handle_command(
    State(kv): State<FakeKv>,
    headers: HeaderMap,
    Json(args): Json<Vec<String>>,
) -> Response {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"}))).into_response();
    }
    match args.first().map(String::as_str) {
        Some("SET") if args.len() == 3 => {
            kv.entries
                .lock()
                .unwrap()
                .insert(args[1].clone(), args[2].clone());
            Json(json!({"result": "OK"})).into_response()
        }
        Some("SCAN") => {
            // Two pages: cursor "0" returns half and cursor "1", cursor "1" returns the rest.
            let pattern = args.get(3).cloned().unwrap_or_default();
            let prefix = pattern.trim_end_matches('*');
            let mut keys: Vec<String> = kv
                .entries
                .lock()
                .unwrap()
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect();
            keys.sort();
            let split = keys.len() / 2;
            let result: Value = if args[1] == "0" {
                json!(["1", &keys[..split]])
            } else {
                json!(["0", &keys[split..]])
            };
            Json(json!({ "result": result })).into_response()
        }
        _ => Json(json!({"error": "ERR unknown command"})).into_response(),
    }
}

async fn spawn_fake() -> (SocketAddr, FakeKv) {
    let kv = FakeKv::default();
    let app = Router::new()
        .route("/", post(handle_command))
        .route("/get/{key}", get(handle_get))
        .with_state(kv.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, kv)
}

fn store(addr: SocketAddr, token: &str) -> RestStore {
    RestStore::new(&format!("http://{addr}"), token, Duration::from_millis(500)).unwrap()
}

#[tokio::test]
async fn test_set_then_get_round_trip() {
    let (addr, kv) = spawn_fake().await;
    let store = store(addr, TOKEN);

    assert_eq!(store.get("user:1").await.unwrap(), None);
    store
        .set("user:1", r#"{"id":"1","username":"ann"}"#)
        .await
        .unwrap();
    assert_eq!(
        kv.entries.lock().unwrap().get("user:1").map(String::as_str),
        Some(r#"{"id":"1","username":"ann"}"#)
    );
    assert_eq!(
        store.get("user:1").await.unwrap().as_deref(),
        Some(r#"{"id":"1","username":"ann"}"#)
    );
}

#[tokio::test]
async fn test_structured_result_is_reserialized() {
    let (addr, _) = spawn_fake().await;
    let value = store(addr, TOKEN).get("nested").await.unwrap().unwrap();
    let parsed: Value = serde_json::from_str(&value).unwrap();
    assert_eq!(parsed["usedCount"], 4);
    assert_eq!(parsed["monthKey"], "2024-01");
}

#[tokio::test]
async fn test_failures_are_never_silent() {
    let (addr, _) = spawn_fake().await;
    let store = store(addr, TOKEN);

    assert!(matches!(store.get("boom").await, Err(StoreError::Status(500))));
    assert!(matches!(
        store.get("garbled").await,
        Err(StoreError::Envelope(_))
    ));
    assert!(matches!(
        store.get("wrongtype").await,
        Err(StoreError::Remote(_))
    ));
}

#[tokio::test]
async fn test_wrong_token_is_a_status_failure() {
    let (addr, _) = spawn_fake().await;
    let store = store(addr, "nope");
    assert!(matches!(store.get("user:1").await, Err(StoreError::Status(401))));
    assert!(matches!(
        store.set("user:1", "{}").await,
        Err(StoreError::Status(401))
    ));
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let (addr, _) = spawn_fake().await;
    let err = store(addr, TOKEN).get("slow").await.unwrap_err();
    assert!(matches!(err, StoreError::Timeout(_)), "got {err:?}");
    assert_eq!(err.kind(), "timeout");
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transport_failure() {
    let store = RestStore::new("http://127.0.0.1:1", TOKEN, Duration::from_millis(500)).unwrap();
    assert!(matches!(
        store.get("user:1").await,
        Err(StoreError::Transport(_) | StoreError::Timeout(_))
    ));
}

#[tokio::test]
async fn test_scan_follows_cursor() {
    let (addr, kv) = spawn_fake().await;
    {
        let mut entries = kv.entries.lock().unwrap();
        for id in ["a", "b", "c", "d", "e"] {
            entries.insert(format!("user:{id}"), "{}".into());
        }
        entries.insert("quota:a".into(), "{}".into());
    }
    let mut keys = store(addr, TOKEN).scan_prefix("user:").await.unwrap();
    keys.sort();
    assert_eq!(keys, vec!["user:a", "user:b", "user:c", "user:d", "user:e"]);
}
