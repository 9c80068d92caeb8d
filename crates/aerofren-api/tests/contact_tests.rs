//! Contact form integration tests.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use aerofren_api::repositories::{Collection, DocumentStore};
use aerofren_test_utils::TestApiServer;
use anyhow::Result;
use serde_json::{json, Value};

async fn submit(server: &TestApiServer, body: &Value) -> Result<reqwest::Response> {
    Ok(reqwest::Client::new()
        .post(format!("{}/api/contact", server.url()))
        .json(body)
        .send()
        .await?)
}

/// The contact form is public and stores a normalized inquiry.
#[tokio::test]
async fn test_submit_inquiry_stores_document() -> Result<()> {
    let server = TestApiServer::builder().spawn().await?;

    let response = submit(
        &server,
        &json!({
            "name": "  Grace Hopper ",
            "email": "grace@example.com",
            "company": "   ",
            "message": "Do you stock M12 push-in fittings?"
        }),
    )
    .await?;

    assert_eq!(response.status(), 201);
    assert_eq!(
        response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok()),
        Some("4")
    );
    let body: Value = response.json().await?;
    let id = body["id"].as_str().unwrap();

    let stored = server
        .store()
        .get(Collection::Inquiries, id)
        .await?
        .expect("inquiry stored");
    assert_eq!(stored.payload["name"], "Grace Hopper");
    assert!(stored.payload.get("company").is_none());

    Ok(())
}

#[tokio::test]
async fn test_submit_inquiry_validation() -> Result<()> {
    let server = TestApiServer::builder()
        .var("RATE_LIMIT_CONTACT_MAX", "10")
        .spawn()
        .await?;

    let cases = [
        json!({ "name": "", "email": "a@example.com", "message": "hi" }),
        json!({ "name": "A", "email": "not-an-email", "message": "hi" }),
        json!({ "name": "A", "email": "a@example.com", "message": "   " }),
        json!({ "name": "A", "email": "a@example.com", "message": "x".repeat(5001) }),
        json!({ "name": "A", "email": "a@example.com" }),
    ];

    for case in &cases {
        let response = submit(&server, case).await?;
        assert_eq!(response.status(), 400, "case {}", case);
        let body: Value = response.json().await?;
        assert_eq!(body["error"]["code"], "VALIDATION_FAILED");
    }

    assert!(server.store().is_empty().await);

    Ok(())
}

/// The contact form works without any identity authority.
#[tokio::test]
async fn test_submit_inquiry_without_auth_configured() -> Result<()> {
    let server = TestApiServer::builder().without_auth().spawn().await?;

    let response = submit(
        &server,
        &json!({ "name": "A", "email": "a@example.com", "message": "hello" }),
    )
    .await?;

    assert_eq!(response.status(), 201);

    Ok(())
}

/// Store outage: 503 with a generic message.
#[tokio::test]
async fn test_submit_inquiry_store_unavailable() -> Result<()> {
    let server = TestApiServer::builder().spawn().await?;
    server.store().set_available(false);

    let response = submit(
        &server,
        &json!({ "name": "A", "email": "a@example.com", "message": "hello" }),
    )
    .await?;

    assert_eq!(response.status(), 503);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["message"], "Server configuration error");

    Ok(())
}
