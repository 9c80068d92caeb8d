//! Authentication and authorization integration tests.
//!
//! Tests token verification against a mocked JWKS endpoint and admin
//! resolution on the admin routes.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use aerofren_test_utils::{TestApiServer, TestKeypair, TestTokenBuilder, JWKS_PATH};
use anyhow::Result;
use chrono::Utc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

async fn admin_check(server: &TestApiServer, token: Option<&str>) -> Result<reqwest::Response> {
    let mut request = reqwest::Client::new().get(format!("{}/api/admin/check", server.url()));
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    Ok(request.send().await?)
}

/// Missing credential: 401 with a bearer challenge.
#[tokio::test]
async fn test_admin_check_requires_auth() -> Result<()> {
    let server = TestApiServer::builder().spawn().await?;

    let response = admin_check(&server, None).await?;

    assert_eq!(response.status(), 401);
    let www_auth = response
        .headers()
        .get("www-authenticate")
        .and_then(|v| v.to_str().ok())
        .expect("Should include WWW-Authenticate header");
    assert!(www_auth.starts_with("Bearer"));
    assert!(!www_auth.contains("invalid_token"));

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "AUTHENTICATION_REQUIRED");

    Ok(())
}

/// A non-Bearer scheme is treated as a missing credential.
#[tokio::test]
async fn test_admin_check_rejects_non_bearer_scheme() -> Result<()> {
    let server = TestApiServer::builder().spawn().await?;

    let response = reqwest::Client::new()
        .get(format!("{}/api/admin/check", server.url()))
        .header("Authorization", "Basic abc123")
        .send()
        .await?;

    assert_eq!(response.status(), 401);

    Ok(())
}

/// Garbage tokens are invalid credentials, not server errors.
#[tokio::test]
async fn test_admin_check_rejects_malformed_token() -> Result<()> {
    let server = TestApiServer::builder().spawn().await?;

    let response = admin_check(&server, Some("not-a-jwt")).await?;

    assert_eq!(response.status(), 401);
    let www_auth = response
        .headers()
        .get("www-authenticate")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(www_auth.contains("invalid_token"));

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "INVALID_CREDENTIAL");

    Ok(())
}

#[tokio::test]
async fn test_expired_token_rejected() -> Result<()> {
    let server = TestApiServer::builder().spawn().await?;
    let token = server.sign(
        TestTokenBuilder::new()
            .admin(true)
            .expires_in(-3600)
            .issued_at(Utc::now().timestamp() - 7200),
    );

    let response = admin_check(&server, Some(&token)).await?;

    assert_eq!(response.status(), 401);

    Ok(())
}

#[tokio::test]
async fn test_future_iat_token_rejected() -> Result<()> {
    let server = TestApiServer::builder().spawn().await?;
    let token = server.sign(
        TestTokenBuilder::new()
            .admin(true)
            .expires_in(7200)
            .issued_at(Utc::now().timestamp() + 3600),
    );

    let response = admin_check(&server, Some(&token)).await?;

    assert_eq!(response.status(), 401);

    Ok(())
}

/// A token signed by a key the authority does not publish is rejected.
#[tokio::test]
async fn test_token_signed_by_unknown_key_rejected() -> Result<()> {
    let server = TestApiServer::builder().spawn().await?;
    let rogue = TestKeypair::new(9, "rogue-key")?;
    let token = rogue.sign(&TestTokenBuilder::new().admin(true).build());

    let response = admin_check(&server, Some(&token)).await?;

    assert_eq!(response.status(), 401);

    Ok(())
}

/// Right `kid`, wrong key: the signature check fails.
#[tokio::test]
async fn test_token_with_forged_signature_rejected() -> Result<()> {
    let server = TestApiServer::builder().spawn().await?;
    let rogue = TestKeypair::new(9, "rogue-key")?;
    let token = rogue.sign_with_kid(
        &TestTokenBuilder::new().admin(true).build(),
        server.keypair().kid(),
    );

    let response = admin_check(&server, Some(&token)).await?;

    assert_eq!(response.status(), 401);

    Ok(())
}

/// Verified but not an admin: 403.
#[tokio::test]
async fn test_non_admin_forbidden() -> Result<()> {
    let server = TestApiServer::builder()
        .admin_emails("ops@aerofren.example")
        .spawn()
        .await?;
    let token = server.sign(
        TestTokenBuilder::new()
            .for_user("user-1")
            .with_email("customer@example.com"),
    );

    let response = admin_check(&server, Some(&token)).await?;

    assert_eq!(response.status(), 403);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    Ok(())
}

/// The `admin` claim grants admin without an allow-list entry.
#[tokio::test]
async fn test_admin_claim_grants_access() -> Result<()> {
    let server = TestApiServer::builder().spawn().await?;
    let token = server.sign(TestTokenBuilder::new().for_user("admin-1").admin(true));

    let response = admin_check(&server, Some(&token)).await?;

    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-ratelimit-remaining"));
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["isAdmin"], true);
    assert_eq!(body["sub"], "admin-1");

    Ok(())
}

/// Allow-list membership is case-insensitive.
#[tokio::test]
async fn test_allow_listed_email_grants_access() -> Result<()> {
    let server = TestApiServer::builder()
        .admin_emails("Ops@Aerofren.Example, sales@aerofren.example")
        .spawn()
        .await?;
    let token = server.sign(
        TestTokenBuilder::new()
            .for_user("ops-1")
            .with_email("OPS@aerofren.example"),
    );

    let response = admin_check(&server, Some(&token)).await?;

    assert_eq!(response.status(), 200);

    Ok(())
}

/// An explicit `admin: false` claim does not override the allow-list.
#[tokio::test]
async fn test_admin_false_claim_falls_back_to_allow_list() -> Result<()> {
    let server = TestApiServer::builder()
        .admin_emails("ops@aerofren.example")
        .spawn()
        .await?;
    let token = server.sign(
        TestTokenBuilder::new()
            .admin(false)
            .with_email("ops@aerofren.example"),
    );

    let response = admin_check(&server, Some(&token)).await?;

    assert_eq!(response.status(), 200);

    Ok(())
}

/// No identity authority configured: 503, never 401.
#[tokio::test]
async fn test_unconfigured_authority_is_unavailable() -> Result<()> {
    let server = TestApiServer::builder().without_auth().spawn().await?;

    let response = admin_check(&server, Some("any.token.value")).await?;

    assert_eq!(response.status(), 503);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
    assert_eq!(body["error"]["message"], "Server configuration error");

    Ok(())
}

/// Authority unreachable: 503 rather than blaming the caller's token.
#[tokio::test]
async fn test_jwks_failure_is_unavailable() -> Result<()> {
    let server = TestApiServer::builder().spawn().await?;
    let mock_server = server.mock_server().expect("auth configured");
    mock_server.reset().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(mock_server)
        .await;

    let token = server.sign(TestTokenBuilder::new().admin(true));
    let response = admin_check(&server, Some(&token)).await?;

    assert_eq!(response.status(), 503);

    Ok(())
}

/// Chat routes need a verified identity but not admin privilege.
#[tokio::test]
async fn test_chat_accepts_non_admin() -> Result<()> {
    let server = TestApiServer::builder().spawn().await?;
    let token = server.sign(TestTokenBuilder::new().for_user("customer-1"));

    let response = reqwest::Client::new()
        .post(format!("{}/api/chat/messages", server.url()))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "text": "Do you ship to Lyon?" }))
        .send()
        .await?;

    assert_eq!(response.status(), 201);

    Ok(())
}
