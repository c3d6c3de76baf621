use archive_chat::auth::TokenStore;
use archive_chat::backend::BackendClient;
use archive_chat::chat::ChatService;
use archive_chat::config::{AuthConfig, BackendConfig};
use archive_chat::llm::{MessageRole, MockLlm};
use archive_chat::search::{ResultRow, SearchParams};
use archive_chat::session::{SessionBackend, SessionHook, SessionManager};
use archive_chat::view::ResultsState;
use archive_chat::ArchiveError;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const TOKEN: &str = "tok-1";

#[derive(Default)]
struct Store {
    sessions: Vec<Value>,
    messages: HashMap<String, Vec<Value>>,
    next_id: u64,
}

/// In-memory stand-in for the backend service
#[derive(Clone)]
struct FakeBackend {
    store: Arc<Mutex<Store>>,
    revoked: Arc<AtomicBool>,
    messages_enabled: bool,
}

impl FakeBackend {
    fn new() -> Self {
        Self {
            store: Arc::new(Mutex::new(Store::default())),
            revoked: Arc::new(AtomicBool::new(false)),
            messages_enabled: true,
        }
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), StatusCode> {
        let expected = format!("Bearer {}", TOKEN);
        let given = headers.get("authorization").and_then(|v| v.to_str().ok());
        if self.revoked.load(Ordering::SeqCst) || given != Some(expected.as_str()) {
            return Err(StatusCode::UNAUTHORIZED);
        }
        Ok(())
    }

    fn session_count(&self) -> usize {
        self.store.lock().unwrap().sessions.len()
    }
}

fn token_body() -> Json<Value> {
    Json(json!({ "access_token": TOKEN, "token_type": "bearer" }))
}

async fn login(Json(body): Json<Value>) -> Result<Json<Value>, StatusCode> {
    if body["password"] == "secret" {
        Ok(token_body())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

async fn register(Json(body): Json<Value>) -> Result<Json<Value>, StatusCode> {
    if body["email"] == "taken@example.com" {
        Err(StatusCode::CONFLICT)
    } else {
        Ok(token_body())
    }
}

async fn me(State(backend): State<FakeBackend>, headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
    backend.authorize(&headers)?;
    Ok(Json(json!({ "email": "Admin@Example.com" })))
}

async fn list_sessions(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    backend.authorize(&headers)?;
    let store = backend.store.lock().unwrap();
    Ok(Json(Value::Array(store.sessions.iter().rev().cloned().collect())))
}

async fn create_session(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    backend.authorize(&headers)?;
    let mut store = backend.store.lock().unwrap();
    store.next_id += 1;
    let session = json!({
        "id": store.next_id,
        "title": body["title"],
        "created_at": "2024-05-01T12:00:00Z"
    });
    store.sessions.push(session.clone());
    Ok(Json(session))
}

async fn rename_session(
    State(backend): State<FakeBackend>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    backend.authorize(&headers)?;
    let mut store = backend.store.lock().unwrap();
    let session = store
        .sessions
        .iter_mut()
        .find(|s| s["id"].to_string() == id)
        .ok_or(StatusCode::NOT_FOUND)?;
    session["title"] = body["title"].clone();
    Ok(Json(session.clone()))
}

async fn delete_session(
    State(backend): State<FakeBackend>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> StatusCode {
    if let Err(status) = backend.authorize(&headers) {
        return status;
    }
    let mut store = backend.store.lock().unwrap();
    let before = store.sessions.len();
    store.sessions.retain(|s| s["id"].to_string() != id);
    if store.sessions.len() == before {
        return StatusCode::NOT_FOUND;
    }
    store.messages.remove(&id);
    StatusCode::NO_CONTENT
}

async fn list_messages(
    State(backend): State<FakeBackend>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    backend.authorize(&headers)?;
    if !backend.messages_enabled {
        return Err(StatusCode::NOT_FOUND);
    }
    let store = backend.store.lock().unwrap();
    let mut messages = store.messages.get(&id).cloned().unwrap_or_default();
    if let Some(limit) = query.get("limit").and_then(|l| l.parse::<usize>().ok()) {
        messages.truncate(limit);
    }
    Ok(Json(Value::Array(messages)))
}

async fn save_message(
    State(backend): State<FakeBackend>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    backend.authorize(&headers)?;
    if !backend.messages_enabled {
        return Err(StatusCode::NOT_FOUND);
    }
    let mut store = backend.store.lock().unwrap();
    let messages = store.messages.entry(id).or_default();
    let message = json!({
        "id": messages.len() + 1,
        "role": body["role"],
        "content": body["content"],
        "created_at": "2024-05-01T12:01:00Z"
    });
    messages.push(message.clone());
    Ok(Json(message))
}

async fn spawn(backend: FakeBackend) -> String {
    let router = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/me", get(me))
        .route("/sessions", get(list_sessions).post(create_session))
        .route("/sessions/:id", patch(rename_session).delete(delete_session))
        .route("/sessions/:id/messages", get(list_messages).post(save_message))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://{}", addr)
}

fn client(url: &str, dir: &TempDir) -> BackendClient {
    let config = BackendConfig {
        url: url.to_string(),
        admin_email: Some("admin@example.com".to_string()),
    };
    let store = TokenStore::new(&AuthConfig {
        token_path: dir.path().join("auth.json"),
        ttl_hours: 24,
    });
    BackendClient::new(&config, store)
}

/// Logged-in client against a fresh fake backend
async fn logged_in(backend: FakeBackend) -> (Arc<BackendClient>, TempDir) {
    let url = spawn(backend).await;
    let dir = tempfile::tempdir().unwrap();
    let client = client(&url, &dir);
    client.login("admin@example.com", "secret").await.unwrap();
    (Arc::new(client), dir)
}

#[tokio::test]
async fn test_login_persists_token() {
    let url = spawn(FakeBackend::new()).await;
    let dir = tempfile::tempdir().unwrap();

    let first = client(&url, &dir);
    assert!(!first.is_logged_in().await);

    let token = first.login("admin@example.com", "secret").await.unwrap();
    assert_eq!(token.authorization_header(), "Bearer tok-1");
    assert!(dir.path().join("auth.json").exists());

    // A new client picks the stored token up
    let second = client(&url, &dir);
    assert!(second.is_logged_in().await);

    let user = second.current_user().await.unwrap();
    assert_eq!(user.email, "admin@example.com");
    assert!(user.is_admin);

    second.logout().await.unwrap();
    assert!(!second.is_logged_in().await);
    assert!(!dir.path().join("auth.json").exists());
}

#[tokio::test]
async fn test_rejected_credentials() {
    let url = spawn(FakeBackend::new()).await;
    let dir = tempfile::tempdir().unwrap();
    let client = client(&url, &dir);

    let err = client.login("admin@example.com", "wrong").await.unwrap_err();
    assert!(matches!(err, ArchiveError::Unauthorized(_)));
    assert!(!client.is_logged_in().await);

    let err = client.register("taken@example.com", "secret").await.unwrap_err();
    assert!(matches!(err, ArchiveError::InvalidInput(_)));

    client.register("new@example.com", "secret").await.unwrap();
    assert!(client.is_logged_in().await);
}

#[tokio::test]
async fn test_session_lifecycle() {
    let (client, _dir) = logged_in(FakeBackend::new()).await;
    let manager = SessionManager::new(client.clone());

    assert!(manager.refresh().await.unwrap().is_empty());

    let first = manager.create("  Budget review ").await.unwrap();
    assert_eq!(first.id, "1");
    assert_eq!(first.title.as_deref(), Some("Budget review"));
    assert_eq!(manager.current().await.unwrap().id, "1");

    manager.create("Hiring").await.unwrap();
    let sessions = manager.sessions().await;
    assert_eq!(sessions.len(), 2);
    assert_eq!(manager.resolve("1").await.unwrap().display_title(), "Hiring");

    let renamed = manager.rename("1", "Budget 2024").await.unwrap();
    assert_eq!(renamed.display_title(), "Budget 2024");

    manager
        .record_message("2", MessageRole::User, "hello")
        .await
        .unwrap();
    let stored = client.list_messages("2").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id.as_deref(), Some("1"));

    manager.delete("1").await.unwrap();
    assert_eq!(manager.sessions().await.len(), 1);

    let err = client.delete_session("1").await.unwrap_err();
    assert!(matches!(err, ArchiveError::NotFound(_)));
    assert!(err.to_string().contains("already deleted"));
}

#[tokio::test]
async fn test_revoked_token_logs_out() {
    let backend = FakeBackend::new();
    let revoked = backend.revoked.clone();
    let (client, dir) = logged_in(backend).await;

    revoked.store(true, Ordering::SeqCst);
    let err = client.list_sessions().await.unwrap_err();

    assert!(matches!(err, ArchiveError::Unauthorized(_)));
    assert!(!client.is_logged_in().await);
    assert!(!dir.path().join("auth.json").exists());
}

#[tokio::test]
async fn test_missing_messages_endpoint() {
    let mut backend = FakeBackend::new();
    backend.messages_enabled = false;
    let (client, _dir) = logged_in(backend).await;

    let session = client.create_session("No history").await.unwrap();
    assert!(client.list_messages(&session.id).await.unwrap().is_empty());
    assert!(matches!(
        client.has_messages(&session.id).await,
        Err(ArchiveError::NotFound(_))
    ));

    let manager = SessionManager::new(client.clone());
    manager.refresh().await.unwrap();
    let message = manager
        .record_message(&session.id, MessageRole::User, "kept locally")
        .await
        .unwrap();

    assert!(message.id.is_none());
    assert_eq!(manager.messages(&session.id).await.len(), 1);
}

#[tokio::test]
async fn test_cleanup_removes_only_empty_sessions() {
    let backend = FakeBackend::new();
    let (client, _dir) = logged_in(backend.clone()).await;
    let manager = SessionManager::new(client.clone());

    let used = manager.create("Used").await.unwrap();
    manager.create("Unused").await.unwrap();
    manager
        .record_message(&used.id, MessageRole::User, "question")
        .await
        .unwrap();

    // A fresh manager knows no cached messages and has to ask the backend
    let fresh = SessionManager::new(client.clone());
    fresh.refresh().await.unwrap();
    assert_eq!(fresh.cleanup_empty_sessions().await, 1);

    assert_eq!(backend.session_count(), 1);
    assert_eq!(fresh.sessions().await[0].id, used.id);
}

#[tokio::test]
async fn test_cleanup_keeps_sessions_without_messages_endpoint() {
    let mut backend = FakeBackend::new();
    backend.messages_enabled = false;
    let (client, _dir) = logged_in(backend.clone()).await;

    for title in ["First", "Second", "Third"] {
        client.create_session(title).await.unwrap();
    }

    let manager = SessionManager::new(client.clone());
    manager.refresh().await.unwrap();
    assert_eq!(manager.cleanup_empty_sessions().await, 0);

    assert_eq!(backend.session_count(), 3);
    assert_eq!(manager.sessions().await.len(), 3);
}

#[tokio::test]
async fn test_search_session_and_grounded_chat() {
    let backend = FakeBackend::new();
    let (client, _dir) = logged_in(backend.clone()).await;
    let sessions = Arc::new(SessionManager::new(client.clone()));

    let session = sessions.create_and_select_session("invoice").await.unwrap();
    assert_eq!(sessions.current().await.unwrap().id, session.id);

    let mut results = ResultsState::new(50);
    results.set_params(SearchParams::new("invoice"));
    results.load_page(
        &[ResultRow {
            id: "m1".to_string(),
            subject: "Invoice for March".to_string(),
            sender: "billing@example.com".to_string(),
            ..Default::default()
        }],
        1,
        1,
    );

    let chat = ChatService::new(Arc::new(MockLlm::new()), sessions.clone(), 50);
    let reply = chat.ask("Which invoice arrived?", &results).await.unwrap();
    assert!(reply.content.contains("Invoice for March"));

    let stored = client.list_messages(&session.id).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].role, MessageRole::User);
    assert_eq!(stored[1].role, MessageRole::Assistant);
    assert_eq!(stored[1].content, reply.content);
}
