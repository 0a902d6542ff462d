//! Shared helpers for integration tests against a mock backend.

#![allow(dead_code)]

use std::sync::Arc;

use blinket_core::credentials::{Credential, CredentialStore, MemoryCredentialStore};
use blinket_core::{HttpClient, SessionController};
use serde_json::{Value, json};
use wiremock::{MockServer, ResponseTemplate};

pub fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

/// 200 response wrapping `data` in the backend's `{code, data}` envelope.
pub fn envelope(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "code": 200, "data": data }))
}

/// Error response with a server-provided message.
pub fn error_response(status: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({ "code": status, "message": message }))
}

pub fn profile_json(id: &str, user_name: &str) -> Value {
    json!({
        "_id": id,
        "fullName": format!("{user_name} full"),
        "userName": user_name,
        "email": format!("{user_name}@example.com"),
        "avatarUrl": format!("https://cdn.example.com/{user_name}.png"),
    })
}

/// Client backed by an in-memory store, optionally pre-loaded with `token`.
pub fn client(
    server: &MockServer,
    token: Option<&str>,
) -> (HttpClient, Arc<MemoryCredentialStore>) {
    let store = Arc::new(match token {
        Some(token) => MemoryCredentialStore::with_credential(Credential::new(token)),
        None => MemoryCredentialStore::new(),
    });
    let credentials: Arc<dyn CredentialStore> = Arc::<MemoryCredentialStore>::clone(&store);
    (HttpClient::new(server.uri(), credentials), store)
}

pub fn controller(
    server: &MockServer,
    token: Option<&str>,
) -> (SessionController, Arc<MemoryCredentialStore>) {
    let (http, store) = client(server, token);
    (SessionController::new(http), store)
}
