use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use proventory_auth::{JwtClaims, PrincipalId, Role};
use proventory_core::TenantId;
use reqwest::StatusCode;
use serde_json::{json, Value};

const SECRET: &str = "black-box-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, over the in-memory backend, on an ephemeral port.
        let services = Arc::new(proventory_api::app::services::build_in_memory());
        let app = proventory_api::app::build_router(services, SECRET);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A signed-in user of one tenant.
struct User {
    principal: PrincipalId,
    token: String,
}

fn mint_jwt(tenant_id: TenantId, principal: PrincipalId, roles: &[&'static str]) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: principal,
        tenant_id,
        roles: roles.iter().map(|r| Role::new(*r)).collect(),
        email: Some("someone@example.com".to_string()),
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn user(tenant_id: TenantId, roles: &[&'static str]) -> User {
    let principal = PrincipalId::new();
    User { principal, token: mint_jwt(tenant_id, principal, roles) }
}

async fn send(req: reqwest::RequestBuilder, user: &User) -> (StatusCode, Value) {
    let res = req.bearer_auth(&user.token).send().await.unwrap();
    let status = res.status();
    let text = res.text().await.unwrap();
    let body = if text.is_empty() { Value::Null } else { serde_json::from_str(&text).unwrap_or(Value::String(text)) };
    (status, body)
}

async fn create_item(server: &TestServer, client: &reqwest::Client, admin: &User, sku: &str, qty: i64, reorder: i64) -> Value {
    let (status, body) = send(
        client.post(server.url("/inventory/items")).json(&json!({
            "sku": sku,
            "name": format!("Item {sku}"),
            "quantity": qty,
            "reorder_level": reorder,
            "unit_cost": 250,
        })),
        admin,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

async fn create_supplier(server: &TestServer, client: &reqwest::Client, admin: &User) -> Value {
    let (status, body) = send(
        client.post(server.url("/suppliers")).json(&json!({
            "name": "Acme Supply",
            "contact": { "email": "orders@acme.test" },
        })),
        admin,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

#[tokio::test]
async fn health_is_public_and_everything_else_needs_a_token() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(server.url("/inventory/items")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(server.url("/whoami"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn whoami_reports_resolved_permissions() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let tenant_id = TenantId::new();
    let admin = user(tenant_id, &["admin"]);

    let (status, body) = send(client.get(server.url("/whoami")), &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tenant_id"], tenant_id.to_string());
    assert_eq!(body["email"], "someone@example.com");
    assert_eq!(body["permissions"], json!(["*"]));
}

#[tokio::test]
async fn inventory_lifecycle_with_validation_and_low_stock() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let tenant_id = TenantId::new();
    let admin = user(tenant_id, &["admin"]);

    let (status, body) = send(
        client.post(server.url("/inventory/items")).json(&json!({ "sku": "bad sku!", "name": "" })),
        &admin,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert!(body["fields"]["sku"].is_array(), "{body}");
    assert!(body["fields"]["name"].is_array(), "{body}");

    let item = create_item(&server, &client, &admin, "BOLT-1", 10, 5).await;
    let id = item["id"].as_str().unwrap().to_string();
    assert_eq!(item["stock_status"], "in_stock");
    assert_eq!(item["stock_value"], 2500);

    // Duplicate SKU.
    let (status, _) = send(
        client.post(server.url("/inventory/items")).json(&json!({ "sku": "BOLT-1", "name": "Again" })),
        &admin,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        client
            .post(server.url(&format!("/inventory/items/{id}/adjust")))
            .json(&json!({ "delta": -7, "reason": "damaged" })),
        &admin,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["quantity"], 3);
    assert_eq!(body["stock_status"], "low");

    let (status, body) = send(
        client
            .post(server.url(&format!("/inventory/items/{id}/adjust")))
            .json(&json!({ "delta": -100 })),
        &admin,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");

    let (_, body) = send(client.get(server.url("/inventory/low-stock")), &admin).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    // Dropping under the reorder level notifies the person who did it.
    let (_, body) = send(client.get(server.url("/notifications/unread-count")), &admin).await;
    assert_eq!(body["unread"], 1);

    let (status, _) = send(client.delete(server.url(&format!("/inventory/items/{id}"))), &admin).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(client.get(server.url(&format!("/inventory/items/{id}"))), &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn tenants_do_not_see_each_other() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let a = user(TenantId::new(), &["admin"]);
    let b = user(TenantId::new(), &["admin"]);

    let item = create_item(&server, &client, &a, "ONLY-A", 1, 0).await;
    let id = item["id"].as_str().unwrap();

    let (status, _) = send(client.get(server.url(&format!("/inventory/items/{id}"))), &b).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = send(client.get(server.url("/inventory/items")), &b).await;
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn purchase_order_runs_through_two_level_approval_and_receipt() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let tenant_id = TenantId::new();
    let admin = user(tenant_id, &["admin"]);
    let manager = user(tenant_id, &["manager"]);

    let (status, body) = send(
        client.put(server.url("/purchases/workflows/purchase_order")).json(&json!({
            "levels": [
                { "level": 1, "approver_role": "manager" },
                { "level": 2, "approver_role": "director" },
            ]
        })),
        &admin,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    // Managers may read purchases and decide at their own level.
    let (status, _) = send(
        client.post(server.url("/admin/roles")).json(&json!({
            "name": "manager",
            "permissions": ["purchases.read"],
        })),
        &admin,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let item = create_item(&server, &client, &admin, "NUT-9", 2, 0).await;
    let item_id = item["id"].as_str().unwrap().to_string();
    let supplier = create_supplier(&server, &client, &admin).await;

    let (status, po) = send(
        client.post(server.url("/purchases/orders")).json(&json!({
            "supplier_id": supplier["id"],
            "lines": [
                { "item_id": item_id, "quantity": 5, "unit_cost": 100 },
                { "item_id": item_id, "quantity": 3, "unit_cost": 100 },
            ],
        })),
        &admin,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{po}");
    assert_eq!(po["status"], "draft");
    assert_eq!(po["total"], 800);
    let po_id = po["id"].as_str().unwrap().to_string();

    let (status, po) = send(client.post(server.url(&format!("/purchases/orders/{po_id}/submit"))), &admin).await;
    assert_eq!(status, StatusCode::OK, "{po}");
    assert_eq!(po["next_level"], 1);

    // Level 2 is not reachable before level 1.
    let (status, _) = send(
        client
            .post(server.url(&format!("/purchases/orders/{po_id}/decision")))
            .json(&json!({ "level": 2, "decision": "approve" })),
        &admin,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, po) = send(
        client
            .post(server.url(&format!("/purchases/orders/{po_id}/decision")))
            .json(&json!({ "decision": "approve" })),
        &manager,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{po}");
    assert_eq!(po["outcome"], json!({ "state": "pending", "level": 2 }));

    // The manager does not hold the director role.
    let (status, _) = send(
        client
            .post(server.url(&format!("/purchases/orders/{po_id}/decision")))
            .json(&json!({ "decision": "approve" })),
        &manager,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, po) = send(
        client
            .post(server.url(&format!("/purchases/orders/{po_id}/decision")))
            .json(&json!({ "decision": "approve" })),
        &admin,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{po}");
    assert_eq!(po["status"], "approved");
    assert_eq!(po["outcome"]["state"], "approved");

    let (_, approvals) = send(client.get(server.url(&format!("/purchases/orders/{po_id}/approvals"))), &admin).await;
    let levels: Vec<_> = approvals["items"].as_array().unwrap().iter().map(|s| s["status"].clone()).collect();
    assert_eq!(levels, vec![json!("Approved at Level 1"), json!("Approved at Level 2")]);

    let (status, _) = send(client.post(server.url(&format!("/purchases/orders/{po_id}/issue"))), &admin).await;
    assert_eq!(status, StatusCode::OK);
    let (status, po) = send(client.post(server.url(&format!("/purchases/orders/{po_id}/receive"))), &admin).await;
    assert_eq!(status, StatusCode::OK, "{po}");
    assert_eq!(po["status"], "received");
    let milestones: Vec<_> = po["milestones"].as_array().unwrap().iter().map(|s| s["status"].clone()).collect();
    assert_eq!(milestones, vec![json!("Created"), json!("Issued"), json!("Received")]);

    let (_, item) = send(client.get(server.url(&format!("/inventory/items/{item_id}"))), &admin).await;
    assert_eq!(item["quantity"], 10);

    // The creator hears about the final decision.
    let (_, notes) = send(client.get(server.url("/notifications?unread_only=true")), &admin).await;
    assert!(
        notes["items"].as_array().unwrap().iter().any(|n| n["kind"] == "approval_decided"),
        "{notes}"
    );
}

#[tokio::test]
async fn rejection_requires_a_comment_and_ends_approval() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = user(TenantId::new(), &["admin"]);

    let item = create_item(&server, &client, &admin, "WASHER", 0, 0).await;
    let supplier = create_supplier(&server, &client, &admin).await;
    let (_, po) = send(
        client.post(server.url("/purchases/orders")).json(&json!({
            "supplier_id": supplier["id"],
            "lines": [{ "item_id": item["id"], "quantity": 1, "unit_cost": 10 }],
        })),
        &admin,
    )
    .await;
    let po_id = po["id"].as_str().unwrap().to_string();
    send(client.post(server.url(&format!("/purchases/orders/{po_id}/submit"))), &admin).await;

    let decide = |body: Value| client.post(server.url(&format!("/purchases/orders/{po_id}/decision"))).json(&body);

    let (status, body) = send(decide(json!({ "decision": "reject" })), &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["comment"].is_array(), "{body}");

    let (status, po) = send(decide(json!({ "decision": "reject", "comment": "wrong supplier" })), &admin).await;
    assert_eq!(status, StatusCode::OK, "{po}");
    assert_eq!(po["status"], "rejected");
    assert_eq!(po["outcome"], json!({ "state": "rejected", "level": 1 }));
    assert_eq!(po["next_level"], Value::Null);
    assert_eq!(po["approvals"][0]["trail"], "Rejected");

    let (status, _) = send(decide(json!({ "decision": "approve" })), &admin).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn roles_gate_access() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let tenant_id = TenantId::new();
    let admin = user(tenant_id, &["admin"]);
    let clerk = user(tenant_id, &["clerk"]);

    // No record for the role yet: it grants nothing.
    let (status, body) = send(client.get(server.url("/inventory/items")), &clerk).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");

    let (status, role) = send(
        client.post(server.url("/admin/roles")).json(&json!({
            "name": "clerk",
            "description": "Front desk",
            "permissions": ["inventory.read"],
        })),
        &admin,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{role}");

    let (status, _) = send(client.get(server.url("/inventory/items")), &clerk).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        client.post(server.url("/inventory/items")).json(&json!({ "sku": "X", "name": "X" })),
        &clerk,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(client.get(server.url("/admin/roles")), &clerk).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Widening the role takes effect on the next request.
    let role_id = role["id"].as_str().unwrap();
    let (status, _) = send(
        client.put(server.url(&format!("/admin/roles/{role_id}"))).json(&json!({
            "name": "clerk",
            "permissions": ["inventory.read", "inventory.write"],
        })),
        &admin,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        client.post(server.url("/inventory/items")).json(&json!({ "sku": "X", "name": "X" })),
        &clerk,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        client.post(server.url("/admin/roles")).json(&json!({ "name": "admin", "permissions": [] })),
        &admin,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn notifications_are_private_and_can_be_marked_read() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let tenant_id = TenantId::new();
    let admin = user(tenant_id, &["admin"]);
    let other = user(tenant_id, &["viewer"]);

    for title in ["First", "Second"] {
        let (status, body) = send(
            client.post(server.url("/notifications")).json(&json!({
                "recipient": other.principal.user_id(),
                "title": title,
                "message": "hello",
            })),
            &admin,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["relative_time"], "just now");
    }

    let (_, body) = send(client.get(server.url("/notifications")), &other).await;
    let list = body["items"].as_array().unwrap().clone();
    assert_eq!(list.len(), 2);
    let (_, body) = send(client.get(server.url("/notifications/unread-count")), &other).await;
    assert_eq!(body["unread"], 2);

    let first_id = list[0]["id"].as_str().unwrap().to_string();
    let (status, _) = send(client.post(server.url(&format!("/notifications/{first_id}/read"))), &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = send(client.post(server.url(&format!("/notifications/{first_id}/read"))), &other).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["read"], true);

    let (_, body) = send(client.post(server.url("/notifications/read-all")), &other).await;
    assert_eq!(body["updated"], 1);
    let (_, body) = send(client.get(server.url("/notifications/unread-count")), &other).await;
    assert_eq!(body["unread"], 0);
}

#[tokio::test]
async fn csv_export_and_print_staging() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = user(TenantId::new(), &["admin"]);

    create_item(&server, &client, &admin, "A-1", 4, 1).await;
    create_item(&server, &client, &admin, "B-2", 0, 1).await;

    let res = client
        .get(server.url("/reports/items.csv"))
        .bearer_auth(&admin.token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers()["content-type"].to_str().unwrap().starts_with("text/csv"));
    let csv = res.text().await.unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("SKU,"), "{csv}");

    let (status, _) = send(client.get(server.url("/reports/nonsense.csv")), &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(client.get(server.url("/reports/staged")), &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, staged) = send(
        client.post(server.url("/reports/stage")).json(&json!({ "view": "items", "title": "Stock <check>" })),
        &admin,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{staged}");
    assert_eq!(staged["rows"].as_array().unwrap().len(), 2);

    let res = client
        .get(server.url("/reports/staged/print"))
        .bearer_auth(&admin.token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let html = res.text().await.unwrap();
    assert!(html.contains("Stock &lt;check&gt;"));
    assert!(html.contains("A-1"));

    let (_, body) = send(client.delete(server.url("/reports/staged")), &admin).await;
    assert_eq!(body["cleared"], true);
    let (status, _) = send(client.get(server.url("/reports/staged/print")), &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn audit_log_records_writes_and_filters() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = user(TenantId::new(), &["admin"]);

    let item = create_item(&server, &client, &admin, "AUD-1", 1, 0).await;
    let id = item["id"].as_str().unwrap();
    send(
        client.patch(server.url(&format!("/inventory/items/{id}"))).json(&json!({ "name": "Renamed" })),
        &admin,
    )
    .await;
    create_supplier(&server, &client, &admin).await;

    let (status, body) = send(client.get(server.url("/audit?table=items")), &admin).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let entries = body["items"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["action"], "update");
    assert!(entries[0]["changed_fields"].as_array().unwrap().contains(&json!("name")));

    let (_, body) = send(client.get(server.url("/audit?action=insert")), &admin).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn password_change_is_validated_before_forwarding() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let someone = user(TenantId::new(), &["viewer"]);

    let (status, body) = send(
        client.post(server.url("/account/password")).json(&json!({
            "current_password": "old-pass-1",
            "new_password": "short",
            "confirm_password": "short",
        })),
        &someone,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["new_password"].is_array(), "{body}");

    let (status, body) = send(
        client.post(server.url("/account/password")).json(&json!({
            "current_password": "old-pass-1",
            "new_password": "better-pass-2",
            "confirm_password": "better-pass-2",
        })),
        &someone,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["changed"], true);
}

/// Draft, approve (default single admin level), issue and receive an order for `quantity` of `item_id`.
async fn received_order(server: &TestServer, client: &reqwest::Client, admin: &User, item_id: &str, quantity: i64) -> String {
    let supplier = create_supplier(server, client, admin).await;
    let (status, po) = send(
        client.post(server.url("/purchases/orders")).json(&json!({
            "supplier_id": supplier["id"],
            "lines": [{ "item_id": item_id, "quantity": quantity, "unit_cost": 40 }],
        })),
        admin,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{po}");
    let po_id = po["id"].as_str().unwrap().to_string();

    for step in ["submit", "decision", "issue", "receive"] {
        let mut req = client.post(server.url(&format!("/purchases/orders/{po_id}/{step}")));
        if step == "decision" {
            req = req.json(&json!({ "decision": "approve" }));
        }
        let (status, body) = send(req, admin).await;
        assert_eq!(status, StatusCode::OK, "{step}: {body}");
    }
    po_id
}

#[tokio::test]
async fn purchase_return_is_approved_per_level_and_takes_goods_out_of_stock() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = user(TenantId::new(), &["admin"]);

    let item = create_item(&server, &client, &admin, "BOLT-R", 0, 0).await;
    let item_id = item["id"].as_str().unwrap().to_string();
    let po_id = received_order(&server, &client, &admin, &item_id, 6).await;

    let (status, body) = send(
        client.put(server.url("/purchases/workflows/purchase_return")).json(&json!({
            "levels": [
                { "level": 1, "approver_role": "admin" },
                { "level": 2, "approver_role": "admin" },
            ]
        })),
        &admin,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let open_return = |quantity: i64| {
        client.post(server.url("/purchases/returns")).json(&json!({
            "order_id": po_id,
            "lines": [{ "item_id": item_id, "quantity": quantity, "reason": "damaged in transit" }],
        }))
    };

    // First return is turned down at level 1.
    let (status, ret) = send(open_return(2), &admin).await;
    assert_eq!(status, StatusCode::CREATED, "{ret}");
    assert_eq!(ret["status"], "pending_approval");
    assert_eq!(ret["next_level"], 1);
    assert!(ret["return_number"].as_str().unwrap().starts_with("PR-"), "{ret}");
    let rejected_id = ret["id"].as_str().unwrap().to_string();

    let (status, ret) = send(
        client
            .post(server.url(&format!("/purchases/returns/{rejected_id}/decision")))
            .json(&json!({ "decision": "reject", "comment": "no damage on photos" })),
        &admin,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{ret}");
    assert_eq!(ret["status"], "rejected");
    assert_eq!(ret["outcome"], json!({ "state": "rejected", "level": 1 }));

    let (status, approvals) =
        send(client.get(server.url(&format!("/purchases/returns/{rejected_id}/approvals"))), &admin).await;
    assert_eq!(status, StatusCode::OK);
    let steps = approvals["items"].as_array().unwrap();
    assert_eq!(steps.len(), 1, "{approvals}");
    assert_eq!(steps[0]["status"], "Rejected at Level 1");
    assert_eq!(steps[0]["trail"], "Rejected");
    assert_eq!(steps[0]["comment"], "no damage on photos");

    let (_, stocked) = send(client.get(server.url(&format!("/inventory/items/{item_id}"))), &admin).await;
    assert_eq!(stocked["quantity"], 6);

    // A rejected return frees its quantity; the next one goes through both levels.
    let (status, ret) = send(open_return(4), &admin).await;
    assert_eq!(status, StatusCode::CREATED, "{ret}");
    let ret_id = ret["id"].as_str().unwrap().to_string();
    let decide = || {
        client
            .post(server.url(&format!("/purchases/returns/{ret_id}/decision")))
            .json(&json!({ "decision": "approve" }))
    };

    let (status, ret) = send(decide(), &admin).await;
    assert_eq!(status, StatusCode::OK, "{ret}");
    assert_eq!(ret["outcome"], json!({ "state": "pending", "level": 2 }));
    let (_, approvals) = send(client.get(server.url(&format!("/purchases/returns/{ret_id}/approvals"))), &admin).await;
    let levels: Vec<_> = approvals["items"].as_array().unwrap().iter().map(|s| s["status"].clone()).collect();
    assert_eq!(levels, vec![json!("Approved at Level 1")]);

    let (status, ret) = send(decide(), &admin).await;
    assert_eq!(status, StatusCode::OK, "{ret}");
    assert_eq!(ret["status"], "approved");
    let (_, approvals) = send(client.get(server.url(&format!("/purchases/returns/{ret_id}/approvals"))), &admin).await;
    let levels: Vec<_> = approvals["items"].as_array().unwrap().iter().map(|s| s["status"].clone()).collect();
    assert_eq!(levels, vec![json!("Approved at Level 1"), json!("Approved at Level 2")]);

    let (_, stocked) = send(client.get(server.url(&format!("/inventory/items/{item_id}"))), &admin).await;
    assert_eq!(stocked["quantity"], 2);

    // Nothing is left to return beyond what was received.
    let (status, body) = send(open_return(3), &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[tokio::test]
async fn dropping_a_level_lets_the_next_decision_complete_a_waiting_order() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = user(TenantId::new(), &["admin"]);

    let workflow = |levels: Value| client.put(server.url("/purchases/workflows/purchase_order")).json(&json!({ "levels": levels }));
    let (status, _) = send(
        workflow(json!([
            { "level": 1, "approver_role": "admin" },
            { "level": 2, "approver_role": "admin" },
        ])),
        &admin,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let item = create_item(&server, &client, &admin, "SHIM", 0, 0).await;
    let supplier = create_supplier(&server, &client, &admin).await;
    let (_, po) = send(
        client.post(server.url("/purchases/orders")).json(&json!({
            "supplier_id": supplier["id"],
            "lines": [{ "item_id": item["id"], "quantity": 2, "unit_cost": 10 }],
        })),
        &admin,
    )
    .await;
    let po_id = po["id"].as_str().unwrap().to_string();
    send(client.post(server.url(&format!("/purchases/orders/{po_id}/submit"))), &admin).await;
    let decide = || {
        client
            .post(server.url(&format!("/purchases/orders/{po_id}/decision")))
            .json(&json!({ "decision": "approve" }))
    };
    let (status, po) = send(decide(), &admin).await;
    assert_eq!(status, StatusCode::OK, "{po}");
    assert_eq!(po["outcome"], json!({ "state": "pending", "level": 2 }));

    let (status, _) = send(workflow(json!([{ "level": 1, "approver_role": "admin" }])), &admin).await;
    assert_eq!(status, StatusCode::OK);

    let (_, po) = send(client.get(server.url(&format!("/purchases/orders/{po_id}"))), &admin).await;
    assert_eq!(po["status"], "pending_approval");
    assert_eq!(po["next_level"], Value::Null);

    let (status, po) = send(decide(), &admin).await;
    assert_eq!(status, StatusCode::OK, "{po}");
    assert_eq!(po["status"], "approved");
    assert_eq!(po["outcome"]["state"], "approved");
    assert_eq!(po["approvals"].as_array().unwrap().len(), 1, "{po}");

    let (status, po) = send(client.post(server.url(&format!("/purchases/orders/{po_id}/issue"))), &admin).await;
    assert_eq!(status, StatusCode::OK, "{po}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_get_distinct_po_numbers() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = user(TenantId::new(), &["admin"]);

    let item = create_item(&server, &client, &admin, "RIVET", 0, 0).await;
    let supplier = create_supplier(&server, &client, &admin).await;
    let create = || {
        send(
            client.post(server.url("/purchases/orders")).json(&json!({
                "supplier_id": supplier["id"],
                "lines": [{ "item_id": item["id"], "quantity": 1, "unit_cost": 5 }],
            })),
            &admin,
        )
    };

    let (a, b, c) = tokio::join!(create(), create(), create());
    let mut numbers = Vec::new();
    for (status, po) in [a, b, c] {
        assert_eq!(status, StatusCode::CREATED, "{po}");
        numbers.push(po["po_number"].as_str().unwrap().to_string());
    }
    numbers.sort();
    numbers.dedup();
    assert_eq!(numbers.len(), 3, "{numbers:?}");
}

#[tokio::test]
async fn stream_pushes_changes_of_the_callers_tenant_only() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let tenant_id = TenantId::new();
    let admin = user(tenant_id, &["admin"]);
    let outsider = user(TenantId::new(), &["admin"]);

    let mut res = client.get(server.url("/stream")).bearer_auth(&admin.token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let content_type = res.headers()[reqwest::header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/event-stream"), "{content_type}");

    // Another tenant's writes never reach this subscriber.
    create_item(&server, &client, &outsider, "ELSEWHERE", 1, 0).await;
    let quiet = tokio::time::timeout(Duration::from_millis(300), res.chunk()).await;
    assert!(quiet.is_err(), "unexpected event: {quiet:?}");

    let item = create_item(&server, &client, &admin, "HERE", 1, 0).await;
    let item_id = item["id"].as_str().unwrap();

    let mut received = String::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !received.contains(item_id) {
        let chunk = tokio::time::timeout_at(deadline, res.chunk())
            .await
            .expect("no event for the tenant's own write")
            .unwrap()
            .expect("stream ended");
        received.push_str(&String::from_utf8_lossy(&chunk));
    }
    assert!(received.contains("event: items"), "{received}");
    assert!(received.contains(r#""op":"insert""#), "{received}");
    assert!(received.contains(&format!(r#""tenant_id":"{tenant_id}""#)), "{received}");
}

#[tokio::test]
async fn receipt_books_stock_before_the_order_turns_received() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = user(TenantId::new(), &["admin"]);

    let item = create_item(&server, &client, &admin, "GASKET", 0, 0).await;
    let supplier = create_supplier(&server, &client, &admin).await;
    let (_, po) = send(
        client.post(server.url("/purchases/orders")).json(&json!({
            "supplier_id": supplier["id"],
            "lines": [{ "item_id": item["id"], "quantity": 3, "unit_cost": 10 }],
        })),
        &admin,
    )
    .await;
    let po_id = po["id"].as_str().unwrap().to_string();
    send(client.post(server.url(&format!("/purchases/orders/{po_id}/submit"))), &admin).await;
    send(
        client
            .post(server.url(&format!("/purchases/orders/{po_id}/decision")))
            .json(&json!({ "decision": "approve" })),
        &admin,
    )
    .await;
    send(client.post(server.url(&format!("/purchases/orders/{po_id}/issue"))), &admin).await;

    let mut res = client.get(server.url("/stream")).bearer_auth(&admin.token).send().await.unwrap();
    let (status, _) = send(client.post(server.url(&format!("/purchases/orders/{po_id}/receive"))), &admin).await;
    assert_eq!(status, StatusCode::OK);

    let mut received = String::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !received.contains("event: purchase_orders") {
        let chunk = tokio::time::timeout_at(deadline, res.chunk())
            .await
            .expect("order update never streamed")
            .unwrap()
            .expect("stream ended");
        received.push_str(&String::from_utf8_lossy(&chunk));
    }
    let stock = received.find("event: items").expect("stock update missing");
    let order = received.find("event: purchase_orders").unwrap_or(usize::MAX);
    assert!(stock < order, "{received}");
}
