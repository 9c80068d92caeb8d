//! Support chat integration tests.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use aerofren_api::repositories::{Collection, DocumentStore};
use aerofren_test_utils::{TestApiServer, TestTokenBuilder};
use anyhow::Result;
use serde_json::{json, Value};
use tokio::task::JoinSet;

struct ChatClient<'a> {
    server: &'a TestApiServer,
    client: reqwest::Client,
    token: String,
}

impl<'a> ChatClient<'a> {
    fn new(server: &'a TestApiServer, builder: TestTokenBuilder) -> Self {
        Self {
            server,
            client: reqwest::Client::new(),
            token: server.sign(builder),
        }
    }

    async fn post(&self, body: Value) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}/api/chat/messages", self.server.url()))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?)
    }

    async fn messages(&self, conversation_id: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!(
                "{}/api/chat/conversations/{}/messages",
                self.server.url(),
                conversation_id
            ))
            .bearer_auth(&self.token)
            .send()
            .await?)
    }

    async fn escalate(&self, conversation_id: &str, body: Option<Value>) -> Result<reqwest::Response> {
        let mut request = self
            .client
            .post(format!(
                "{}/api/chat/conversations/{}/escalate",
                self.server.url(),
                conversation_id
            ))
            .bearer_auth(&self.token);
        if let Some(body) = body {
            request = request.json(&body);
        }
        Ok(request.send().await?)
    }

    /// Open a conversation and return its id.
    async fn open(&self, text: &str) -> Result<String> {
        let response = self.post(json!({ "text": text })).await?;
        assert_eq!(response.status(), 201);
        let body: Value = response.json().await?;
        Ok(body["conversationId"].as_str().unwrap().to_string())
    }
}

/// Posting without a conversation id opens one owned by the caller.
#[tokio::test]
async fn test_first_message_opens_conversation() -> Result<()> {
    let server = TestApiServer::builder().spawn().await?;
    let alice = ChatClient::new(&server, TestTokenBuilder::new().for_user("alice"));

    let response = alice.post(json!({ "text": "  Hello, is the catalog current?  " })).await?;

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await?;
    let conversation_id = body["conversationId"].as_str().unwrap();
    assert!(!conversation_id.is_empty());
    assert_eq!(body["message"]["conversationId"], conversation_id);
    assert_eq!(body["message"]["text"], "Hello, is the catalog current?");
    assert_eq!(body["message"]["authorRole"], "customer");

    Ok(())
}

/// Follow-up messages land in the same conversation, newest first.
#[tokio::test]
async fn test_messages_listed_newest_first() -> Result<()> {
    let server = TestApiServer::builder().spawn().await?;
    let alice = ChatClient::new(&server, TestTokenBuilder::new().for_user("alice"));

    let conversation_id = alice.open("one").await?;
    for text in ["two", "three"] {
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let response = alice
            .post(json!({ "conversationId": conversation_id, "text": text }))
            .await?;
        assert_eq!(response.status(), 201);
    }

    let response = alice.messages(&conversation_id).await?;
    assert_eq!(response.status(), 200);
    let page: Value = response.json().await?;
    let texts: Vec<&str> = page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["three", "two", "one"]);

    Ok(())
}

/// Other customers cannot read or post into someone else's conversation.
#[tokio::test]
async fn test_conversation_forbidden_to_other_users() -> Result<()> {
    let server = TestApiServer::builder().spawn().await?;
    let alice = ChatClient::new(&server, TestTokenBuilder::new().for_user("alice"));
    let mallory = ChatClient::new(&server, TestTokenBuilder::new().for_user("mallory"));

    let conversation_id = alice.open("private").await?;

    let response = mallory.messages(&conversation_id).await?;
    assert_eq!(response.status(), 403);

    let response = mallory
        .post(json!({ "conversationId": conversation_id, "text": "hi" }))
        .await?;
    assert_eq!(response.status(), 403);

    let response = mallory.escalate(&conversation_id, None).await?;
    assert_eq!(response.status(), 403);

    Ok(())
}

/// Admins may reply in any conversation; their messages are staff messages.
#[tokio::test]
async fn test_admin_reply_is_staff_message() -> Result<()> {
    let server = TestApiServer::builder().spawn().await?;
    let alice = ChatClient::new(&server, TestTokenBuilder::new().for_user("alice"));
    let support = ChatClient::new(&server, TestTokenBuilder::new().for_user("agent-7").admin(true));

    let conversation_id = alice.open("Where is my order?").await?;

    let response = support
        .post(json!({ "conversationId": conversation_id, "text": "Checking now." }))
        .await?;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await?;
    assert_eq!(body["message"]["authorRole"], "staff");

    let response = support.messages(&conversation_id).await?;
    assert_eq!(response.status(), 200);

    Ok(())
}

#[tokio::test]
async fn test_unknown_conversation_not_found() -> Result<()> {
    let server = TestApiServer::builder().spawn().await?;
    let alice = ChatClient::new(&server, TestTokenBuilder::new().for_user("alice"));

    let response = alice.messages("does-not-exist").await?;
    assert_eq!(response.status(), 404);

    let response = alice
        .post(json!({ "conversationId": "does-not-exist", "text": "hi" }))
        .await?;
    assert_eq!(response.status(), 404);

    let response = alice.escalate("does-not-exist", None).await?;
    assert_eq!(response.status(), 404);

    Ok(())
}

/// Escalation records the reason once; repeating it changes nothing.
#[tokio::test]
async fn test_escalation_is_idempotent() -> Result<()> {
    let server = TestApiServer::builder().spawn().await?;
    let alice = ChatClient::new(&server, TestTokenBuilder::new().for_user("alice"));
    let conversation_id = alice.open("The valve leaks").await?;

    let response = alice
        .escalate(&conversation_id, Some(json!({ "reason": "Needs an engineer" })))
        .await?;
    assert_eq!(response.status(), 200);
    let first: Value = response.json().await?;
    assert_eq!(first["status"], "escalated");
    assert_eq!(first["escalationReason"], "Needs an engineer");
    let escalated_at = first["escalatedAtMs"].as_i64().unwrap();

    let response = alice
        .escalate(&conversation_id, Some(json!({ "reason": "Still leaking" })))
        .await?;
    assert_eq!(response.status(), 200);
    let second: Value = response.json().await?;
    assert_eq!(second["escalationReason"], "Needs an engineer");
    assert_eq!(second["escalatedAtMs"].as_i64().unwrap(), escalated_at);

    Ok(())
}

/// The escalation body is optional.
#[tokio::test]
async fn test_escalation_without_body() -> Result<()> {
    let server = TestApiServer::builder().spawn().await?;
    let alice = ChatClient::new(&server, TestTokenBuilder::new().for_user("alice"));
    let conversation_id = alice.open("Call me please").await?;

    let response = alice.escalate(&conversation_id, None).await?;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body["status"], "escalated");
    assert!(body.get("escalationReason").is_none());

    Ok(())
}

/// Concurrent posts and an escalation all land on the conversation record.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_are_not_lost() -> Result<()> {
    const POSTS: usize = 64;

    let server = TestApiServer::builder()
        .var("RATE_LIMIT_CHAT_MAX", "10000")
        .spawn()
        .await?;
    let alice = ChatClient::new(&server, TestTokenBuilder::new().for_user("alice"));
    let conversation_id = alice.open("Opening message").await?;

    let mut requests = JoinSet::new();
    for n in 0..POSTS {
        let client = alice.client.clone();
        let url = format!("{}/api/chat/messages", server.url());
        let token = alice.token.clone();
        let body = json!({ "conversationId": conversation_id, "text": format!("Follow-up {n}") });
        requests.spawn(async move {
            client
                .post(url)
                .bearer_auth(token)
                .json(&body)
                .send()
                .await
                .map(|r| r.status().as_u16())
        });
    }
    {
        let client = alice.client.clone();
        let url = format!(
            "{}/api/chat/conversations/{}/escalate",
            server.url(),
            conversation_id
        );
        let token = alice.token.clone();
        requests.spawn(async move {
            client
                .post(url)
                .bearer_auth(token)
                .send()
                .await
                .map(|r| r.status().as_u16())
        });
    }

    while let Some(status) = requests.join_next().await {
        let status = status??;
        assert!(status == 200 || status == 201, "unexpected status {status}");
    }

    let stored = server
        .store()
        .get(Collection::Conversations, &conversation_id)
        .await?
        .expect("conversation exists");
    assert_eq!(stored.payload["messageCount"], json!(POSTS + 1));
    assert_eq!(stored.payload["status"], "escalated");

    Ok(())
}

#[tokio::test]
async fn test_message_validation() -> Result<()> {
    let server = TestApiServer::builder().spawn().await?;
    let alice = ChatClient::new(&server, TestTokenBuilder::new().for_user("alice"));

    let response = alice.post(json!({ "text": "   " })).await?;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "VALIDATION_FAILED");

    let response = alice.post(json!({ "text": "x".repeat(2001) })).await?;
    assert_eq!(response.status(), 400);

    let response = alice.post(json!({ "message": "wrong field" })).await?;
    assert_eq!(response.status(), 400);

    let response = alice
        .escalate("anything", Some(json!({ "reason": "r".repeat(501) })))
        .await?;
    assert_eq!(response.status(), 400);

    Ok(())
}

/// Chat requires a verified identity.
#[tokio::test]
async fn test_chat_requires_auth() -> Result<()> {
    let server = TestApiServer::builder().spawn().await?;

    let response = reqwest::Client::new()
        .post(format!("{}/api/chat/messages", server.url()))
        .json(&json!({ "text": "hello" }))
        .send()
        .await?;

    assert_eq!(response.status(), 401);

    Ok(())
}
