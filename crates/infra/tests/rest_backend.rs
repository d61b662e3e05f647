//! Drives `RestBackend` against a throwaway PostgREST look-alike.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query as QueryParams};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value as JsonValue, json};

use proventory_core::TenantId;
use proventory_infra::{Backend, BackendError, ChangeFeed, ChangeOp, Query, RestBackend};

type Seen = Arc<Mutex<Vec<(String, Vec<(String, String)>, Option<String>)>>>;

async fn spawn(seen: Seen) -> SocketAddr {
    let record = {
        let seen = seen.clone();
        move |name: &str, params: Vec<(String, String)>, headers: &HeaderMap| {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            seen.lock().unwrap().push((name.to_string(), params, auth));
        }
    };

    let r1 = record.clone();
    let r2 = record.clone();
    let r3 = record.clone();
    let app = Router::new()
        .route(
            "/rest/v1/items",
            get(move |headers: HeaderMap, QueryParams(params): QueryParams<Vec<(String, String)>>| async move {
                r1("select", params, &headers);
                Json(json!([{"id": "1", "sku": "A"}]))
            })
            .post(move |headers: HeaderMap, Json(body): Json<JsonValue>| async move {
                if headers.get("apikey").is_none() {
                    return (StatusCode::UNAUTHORIZED, Json(json!([])));
                }
                r2("insert", Vec::new(), &headers);
                (StatusCode::CREATED, Json(json!([body])))
            })
            .patch(move |headers: HeaderMap, QueryParams(params): QueryParams<Vec<(String, String)>>| async move {
                r3("update", params, &headers);
                Json(json!([]))
            }),
        )
        .route(
            "/rest/v1/rpc/:function",
            post(|Path(function): Path<String>, Json(args): Json<JsonValue>| async move {
                if function == "change_password" {
                    (StatusCode::OK, Json(json!({"changed": true, "args": args})))
                } else {
                    (StatusCode::CONFLICT, Json(json!({"message": "nope"})))
                }
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn speaks_the_table_protocol() {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let addr = spawn(seen.clone()).await;
    let feed = ChangeFeed::new(8);
    let mut changes = feed.subscribe();
    let backend = RestBackend::new(format!("http://{addr}/"), "service-key", feed);
    let tenant = TenantId::new();

    let rows = backend
        .select(tenant, "items", &Query::new().eq("sku", "A").order_asc("sku"))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);

    let stored = backend.insert(tenant, "items", json!({"id": "2", "sku": "B"})).await.unwrap();
    assert_eq!(stored["tenant_id"], tenant.to_string());
    let change = changes.recv().await.unwrap();
    assert_eq!((change.record_id.as_str(), change.op), ("2", ChangeOp::Insert));

    let missing = backend.update(tenant, "items", "9", json!({"sku": "C"})).await.unwrap_err();
    assert!(matches!(missing, BackendError::NotFound { .. }));

    let seen = seen.lock().unwrap();
    let (_, select_params, auth) = &seen[0];
    assert!(select_params.contains(&("tenant_id".to_string(), format!("eq.{tenant}"))));
    assert!(select_params.contains(&("sku".to_string(), "eq.A".to_string())));
    assert!(select_params.contains(&("order".to_string(), "sku.asc".to_string())));
    assert_eq!(auth.as_deref(), Some("Bearer service-key"));
    let (_, update_params, _) = &seen[2];
    assert!(update_params.contains(&("id".to_string(), "eq.9".to_string())));
}

#[tokio::test]
async fn rpc_calls_and_status_mapping() {
    let addr = spawn(Arc::new(Mutex::new(Vec::new()))).await;
    let backend = RestBackend::new(format!("http://{addr}"), "k", ChangeFeed::default());
    let tenant = TenantId::new();

    let out = backend
        .rpc(tenant, "change_password", json!({"new_password": "s3cretpass"}))
        .await
        .unwrap();
    assert_eq!(out["changed"], true);

    let err = backend.rpc(tenant, "other", json!({})).await.unwrap_err();
    assert!(matches!(err, BackendError::Conflict(_)));
}
