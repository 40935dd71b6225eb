//! End-to-end tests for the MoveOut service
//!
//! These tests drive a running instance over HTTP and read verification
//! tokens straight from the database, so they need the full stack up
//! (service + PostgreSQL). Run them explicitly:
//!
//! ```text
//! MOVEOUT_BASE_URL=http://localhost:3000 DATABASE_URL=... \
//!     cargo test -p moveout --test e2e -- --ignored
//! ```

use serde_json::{Value, json};
use sqlx::{PgPool, Row};
use std::time::{SystemTime, UNIX_EPOCH};

fn base_url() -> String {
    std::env::var("MOVEOUT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

fn unique_email(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{prefix}+{nanos}@example.com")
}

async fn db() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for e2e tests");
    PgPool::connect(&url).await.expect("database reachable")
}

async fn verification_token_for(pool: &PgPool, email: &str) -> String {
    let row = sqlx::query(
        "SELECT token FROM verification_tokens WHERE email = $1 ORDER BY created_at DESC LIMIT 1",
    )
    .bind(email)
    .fetch_one(pool)
    .await
    .expect("token row present");
    row.get("token")
}

async fn register_and_login(
    client: &reqwest::Client,
    pool: &PgPool,
    email: &str,
) -> (String, i64) {
    let resp = client
        .post(format!("{}/api/register", base_url()))
        .json(&json!({"mail": email, "password": "Passw0rd1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let token = verification_token_for(pool, email).await;
    let resp = client
        .get(format!("{}/api/verify", base_url()))
        .query(&[("token", token.as_str()), ("email", email)])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .post(format!("{}/api/login", base_url()))
        .json(&json!({"mail": email, "password": "Passw0rd1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    let session = body["token"].as_str().unwrap().to_string();
    let customer_id = body["customerId"].as_i64().unwrap();
    (session, customer_id)
}

#[tokio::test]
#[ignore = "needs a running service and database"]
async fn registration_verification_and_login_flow() {
    let client = reqwest::Client::new();
    let pool = db().await;
    let email = unique_email("flow");

    // Weak password is rejected with 400 and no row is created
    let resp = client
        .post(format!("{}/api/register", base_url()))
        .json(&json!({"mail": email, "password": "weak"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(format!("{}/api/register", base_url()))
        .json(&json!({"mail": email, "password": "Passw0rd1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    // Duplicate registration is a 400
    let resp = client
        .post(format!("{}/api/register", base_url()))
        .json(&json!({"mail": email, "password": "Passw0rd1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Login before verification always fails
    let resp = client
        .post(format!("{}/api/login", base_url()))
        .json(&json!({"mail": email, "password": "Passw0rd1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // A wrong token does not verify
    let resp = client
        .get(format!("{}/api/verify", base_url()))
        .query(&[("token", "deadbeef"), ("email", email.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let token = verification_token_for(&pool, &email).await;
    let resp = client
        .get(format!("{}/api/verify", base_url()))
        .query(&[("token", token.as_str()), ("email", email.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // A consumed token cannot be redeemed again
    let resp = client
        .get(format!("{}/api/verify", base_url()))
        .query(&[("token", token.as_str()), ("email", email.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(format!("{}/api/login", base_url()))
        .json(&json!({"mail": email, "password": "Passw0rd1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body["token"].is_string());
    assert_eq!(body["role"], "user");
}

#[tokio::test]
#[ignore = "needs a running service and database"]
async fn label_pin_and_description_gating() {
    let client = reqwest::Client::new();
    let pool = db().await;

    let (owner_session, owner_id) =
        register_and_login(&client, &pool, &unique_email("owner")).await;
    let (_other_session, other_id) =
        register_and_login(&client, &pool, &unique_email("other")).await;

    // Public label: no PIN
    let form = reqwest::multipart::Form::new()
        .text("labelName", "Box1")
        .text("type", "fragile")
        .text("textDescription", "fragile stuff")
        .text("isPrivate", "public");
    let resp = client
        .post(format!("{}/api/labels", base_url()))
        .bearer_auth(&owner_session)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    let public_label_id = body["labelId"].as_i64().unwrap();
    assert!(body["pin"].is_null());

    let resp = client
        .get(format!(
            "{}/api/description/{}",
            base_url(),
            public_label_id
        ))
        .query(&[("customerId", owner_id)])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["pinVerified"], true);

    // Private label: 6-digit PIN, disclosed even to non-owners
    let form = reqwest::multipart::Form::new()
        .text("labelName", "Box2")
        .text("type", "heavy")
        .text("textDescription", "secret stuff")
        .text("isPrivate", "private");
    let resp = client
        .post(format!("{}/api/labels", base_url()))
        .bearer_auth(&owner_session)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    let private_label_id = body["labelId"].as_i64().unwrap();
    let pin = body["pin"].as_str().unwrap();
    assert_eq!(pin.len(), 6);
    assert!(pin.chars().all(|c| c.is_ascii_digit()));

    let resp = client
        .get(format!(
            "{}/api/description/{}",
            base_url(),
            private_label_id
        ))
        .query(&[("customerId", other_id)])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["pinVerified"], false);
    assert_eq!(body["pin"], pin);
}

#[tokio::test]
#[ignore = "needs a running service and database"]
async fn soft_delete_and_restore() {
    let client = reqwest::Client::new();
    let pool = db().await;

    let (session, customer_id) = register_and_login(&client, &pool, &unique_email("del")).await;

    let form = reqwest::multipart::Form::new()
        .text("labelName", "Box3")
        .text("type", "standard")
        .text("textDescription", "stuff")
        .text("isPrivate", "public");
    let resp = client
        .post(format!("{}/api/labels", base_url()))
        .bearer_auth(&session)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    let label_id = body["labelId"].as_i64().unwrap();

    let resp = client
        .post(format!("{}/api/label/{}/action", base_url(), label_id))
        .bearer_auth(&session)
        .json(&json!({"action": "softDelete"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // A deleted label never shows up in the customer listing
    let resp = client
        .get(format!(
            "{}/api/customers/{}/labels",
            base_url(),
            customer_id
        ))
        .bearer_auth(&session)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let labels: Vec<Value> = resp.json().await.unwrap();
    assert!(labels.iter().all(|l| l["label_id"] != label_id));

    // The description page is gone for deleted labels
    let resp = client
        .get(format!("{}/api/description/{}", base_url(), label_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // Direct id fetch still returns the row
    let resp = client
        .get(format!("{}/api/labels/{}", base_url(), label_id))
        .bearer_auth(&session)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // An unknown action is rejected
    let resp = client
        .post(format!("{}/api/label/{}/action", base_url(), label_id))
        .bearer_auth(&session)
        .json(&json!({"action": "obliterate"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(format!("{}/api/label/{}/action", base_url(), label_id))
        .bearer_auth(&session)
        .json(&json!({"action": "restore"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!(
            "{}/api/customers/{}/labels",
            base_url(),
            customer_id
        ))
        .bearer_auth(&session)
        .send()
        .await
        .unwrap();
    let labels: Vec<Value> = resp.json().await.unwrap();
    assert!(labels.iter().any(|l| l["label_id"] == label_id));
}

#[tokio::test]
#[ignore = "needs a running service and database"]
async fn missing_token_is_forbidden() {
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/api/labels/1", base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = client
        .get(format!("{}/api/labels/1", base_url()))
        .bearer_auth("not-a-real-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
}
