//! End-to-end handler tests over the assembled router.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use super::*;
use crate::auth::jwt::JwtKeys;
use gavel_core::answer::{AnswerPayload, NO_PRECEDENT_ANSWER};
use gavel_core::caselaw::sqlite::SqliteCaseStore;
use gavel_core::caselaw::{CaseRecord, CaseStore};
use gavel_core::query::{DEFAULT_TOP_K, QueryEngine};
use gavel_core::testutil::{FailingEmbedder, MockEmbedder, WrongDimensionEmbedder};
use gavel_core::users::UserStore;

const DIMS: usize = 8;
const SECRET: &str = "integration-test-secret-0123456789abcdef";

fn state_with_embedder(embedder: Arc<dyn Embedder>) -> (Arc<AppState>, Arc<SqliteCaseStore>) {
    let cases = Arc::new(SqliteCaseStore::open_in_memory("mock-embedder", DIMS).unwrap());
    let engine = QueryEngine::new(
        Arc::clone(&embedder),
        cases.clone() as Arc<dyn CaseStore>,
        DEFAULT_TOP_K,
    );
    let users = UserStore::open_in_memory().unwrap();
    let jwt = JwtKeys::new(SECRET, 30).unwrap();
    let state = Arc::new(AppState {
        embedder,
        engine,
        users,
        jwt,
        initial_points: 10,
    });
    (state, cases)
}

fn test_state() -> (Arc<AppState>, Arc<SqliteCaseStore>) {
    state_with_embedder(Arc::new(MockEmbedder::new(DIMS)))
}

fn app(state: &Arc<AppState>) -> Router {
    router(state.clone())
}

async fn post_json(
    app: Router,
    uri: &str,
    token: Option<&str>,
    body: Value,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let response = app
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// Register an account through the API and log in, returning the token.
async fn register_and_login(state: &Arc<AppState>, email: &str) -> String {
    let (status, _) = post_json(
        app(state),
        "/api/auth/register",
        None,
        json!({ "email": email, "password": "pw-123456" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = post_json(
        app(state),
        "/api/auth/login",
        None,
        json!({ "email": email, "password": "pw-123456" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["access_token"].as_str().unwrap().to_string()
}

/// Seed a case whose embedding matches the mock embedding of `text`.
fn seed_case(state: &Arc<AppState>, cases: &SqliteCaseStore, case_id: &str, principles: &str, source_file: &str, text: &str) {
    let embedding = state.embedder.embed(&[text]).unwrap().remove(0);
    cases
        .insert(&CaseRecord {
            case_id: case_id.to_string(),
            legal_principles: principles.to_string(),
            verdict: "V1".to_string(),
            embedding,
            source_file: source_file.to_string(),
        })
        .unwrap();
}

// ── Accounts ────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_creates_account_with_starting_balance() {
    let (state, _cases) = test_state();
    let (status, body) = post_json(
        app(&state),
        "/api/auth/register",
        None,
        json!({ "email": "a@example.com", "password": "pw-123456" }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "a@example.com");
    assert_eq!(body["points"], 10);
}

#[tokio::test]
async fn register_duplicate_email_rejected() {
    let (state, _cases) = test_state();
    register_and_login(&state, "a@example.com").await;

    let (status, body) = post_json(
        app(&state),
        "/api/auth/register",
        None,
        json!({ "email": "a@example.com", "password": "another-pw" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "email_taken");
}

#[tokio::test]
async fn register_empty_password_rejected() {
    let (state, _cases) = test_state();
    let (status, body) = post_json(
        app(&state),
        "/api/auth/register",
        None,
        json!({ "email": "a@example.com", "password": "" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");
}

#[tokio::test]
async fn login_issues_bearer_token() {
    let (state, _cases) = test_state();
    let token = register_and_login(&state, "a@example.com").await;

    assert!(!token.is_empty());
    let claims = state.jwt.verify(&token).unwrap();
    assert_eq!(claims.sub, "a@example.com");
}

#[tokio::test]
async fn login_wrong_password_rejected() {
    let (state, _cases) = test_state();
    register_and_login(&state, "a@example.com").await;

    let (status, body) = post_json(
        app(&state),
        "/api/auth/login",
        None,
        json!({ "email": "a@example.com", "password": "wrong" }),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "invalid_credentials");
}

#[tokio::test]
async fn login_unknown_email_gets_same_rejection() {
    let (state, _cases) = test_state();
    let (status, body) = post_json(
        app(&state),
        "/api/auth/login",
        None,
        json!({ "email": "ghost@example.com", "password": "pw" }),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "invalid_credentials");
}

// ── Query endpoint ──────────────────────────────────────────────────────

#[tokio::test]
async fn query_without_token_unauthorized() {
    let (state, _cases) = test_state();
    let (status, body) = post_json(
        app(&state),
        "/api/v1/query",
        None,
        json!({ "query": "anything" }),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn query_with_garbage_token_unauthorized() {
    let (state, _cases) = test_state();
    let (status, _body) = post_json(
        app(&state),
        "/api/v1/query",
        Some("not-a-real-token"),
        json!({ "query": "anything" }),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn query_on_empty_corpus_returns_fallback() {
    let (state, _cases) = test_state();
    let token = register_and_login(&state, "a@example.com").await;

    let (status, body) = post_json(
        app(&state),
        "/api/v1/query",
        Some(&token),
        json!({ "query": "is a verbal lease enforceable" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let payload: AnswerPayload = serde_json::from_value(body).unwrap();
    assert_eq!(payload.answer, NO_PRECEDENT_ANSWER);
    assert!(payload.context.is_empty());
    assert!(payload.source_files.is_empty());
}

#[tokio::test]
async fn query_retrieves_seeded_precedent() {
    let (state, cases) = test_state();
    seed_case(&state, &cases, "C1", "Principle A", "f1.txt", "test query");
    let token = register_and_login(&state, "a@example.com").await;

    let (status, body) = post_json(
        app(&state),
        "/api/v1/query",
        Some(&token),
        json!({ "query": "test query" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let payload: AnswerPayload = serde_json::from_value(body).unwrap();
    assert!(payload.answer.contains("test query"));
    assert!(payload.answer.contains("Principle A"));
    assert_eq!(payload.context, vec!["Principle A"]);
    assert_eq!(payload.source_files, vec!["f1.txt"]);
}

#[tokio::test]
async fn query_debits_exactly_one_point() {
    let (state, _cases) = test_state();
    let token = register_and_login(&state, "a@example.com").await;

    let (status, _) = post_json(
        app(&state),
        "/api/v1/query",
        Some(&token),
        json!({ "query": "some question" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let user = state.users.find_by_email("a@example.com").unwrap().unwrap();
    assert_eq!(user.points, 9);
}

#[tokio::test]
async fn query_with_empty_balance_is_payment_required() {
    let (state, _cases) = test_state();
    let hash = crate::auth::password::hash_password("pw-123456").unwrap();
    state.users.create("broke@example.com", &hash, 0).unwrap();
    let token = state.jwt.issue("broke@example.com").unwrap();

    let (status, body) = post_json(
        app(&state),
        "/api/v1/query",
        Some(&token),
        json!({ "query": "anything" }),
    )
    .await;

    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["code"], "insufficient_points");
}

#[tokio::test]
async fn query_empty_text_rejected_without_debit() {
    let (state, _cases) = test_state();
    let token = register_and_login(&state, "a@example.com").await;

    let (status, body) = post_json(
        app(&state),
        "/api/v1/query",
        Some(&token),
        json!({ "query": "   " }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");

    let user = state.users.find_by_email("a@example.com").unwrap().unwrap();
    assert_eq!(user.points, 10, "a rejected query must not cost a point");
}

#[tokio::test]
async fn embedding_failure_is_a_service_error_and_free() {
    let (state, _cases) = state_with_embedder(Arc::new(FailingEmbedder::new(DIMS)));
    let token = register_and_login(&state, "a@example.com").await;

    let (status, body) = post_json(
        app(&state),
        "/api/v1/query",
        Some(&token),
        json!({ "query": "anything" }),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "embedding_unavailable");

    let user = state.users.find_by_email("a@example.com").unwrap().unwrap();
    assert_eq!(user.points, 10, "a failed query must not cost a point");
}

// ── Admin endpoint ──────────────────────────────────────────────────────

#[tokio::test]
async fn add_points_requires_admin() {
    let (state, _cases) = test_state();
    let token = register_and_login(&state, "plain@example.com").await;

    let (status, body) = post_json(
        app(&state),
        "/api/admin/add-points",
        Some(&token),
        json!({ "email": "plain@example.com", "points": 5 }),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "admin_required");
}

#[tokio::test]
async fn admin_credits_another_account() {
    let (state, _cases) = test_state();
    register_and_login(&state, "member@example.com").await;
    let admin_token = register_and_login(&state, "admin@example.com").await;
    state.users.set_admin("admin@example.com", true).unwrap();

    let (status, body) = post_json(
        app(&state),
        "/api/admin/add-points",
        Some(&admin_token),
        json!({ "email": "member@example.com", "points": 5 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "member@example.com");
    assert_eq!(body["points"], 15);

    let user = state.users.find_by_email("member@example.com").unwrap().unwrap();
    assert_eq!(user.points, 15);
}

#[tokio::test]
async fn add_points_unknown_account_not_found() {
    let (state, _cases) = test_state();
    let admin_token = register_and_login(&state, "admin@example.com").await;
    state.users.set_admin("admin@example.com", true).unwrap();

    let (status, body) = post_json(
        app(&state),
        "/api/admin/add-points",
        Some(&admin_token),
        json!({ "email": "ghost@example.com", "points": 5 }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn add_points_rejects_non_positive_amount() {
    let (state, _cases) = test_state();
    let admin_token = register_and_login(&state, "admin@example.com").await;
    state.users.set_admin("admin@example.com", true).unwrap();

    let (status, body) = post_json(
        app(&state),
        "/api/admin/add-points",
        Some(&admin_token),
        json!({ "email": "admin@example.com", "points": 0 }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");
}

// ── Health endpoint ─────────────────────────────────────────────────────

#[tokio::test]
async fn embedder_health_reports_healthy() {
    let (state, _cases) = test_state();
    let (status, body) = get_json(app(&state), "/api/embedder/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_name"], "mock-embedder");
    assert_eq!(body["dimensions"], DIMS);
    assert_eq!(body["message"], Value::Null);
}

#[tokio::test]
async fn embedder_health_reports_failure() {
    let (state, _cases) = state_with_embedder(Arc::new(FailingEmbedder::new(DIMS)));
    let (status, body) = get_json(app(&state), "/api/embedder/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "unhealthy");
    assert!(
        body["message"].as_str().unwrap().contains("mock embedder failure"),
        "message: {}",
        body["message"]
    );
}

#[tokio::test]
async fn embedder_health_catches_dimension_drift() {
    let (state, _cases) = state_with_embedder(Arc::new(WrongDimensionEmbedder::new(DIMS, 4)));
    let (status, body) = get_json(app(&state), "/api/embedder/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "unhealthy");
    assert!(
        body["message"].as_str().unwrap().contains("dimension"),
        "message: {}",
        body["message"]
    );
}
