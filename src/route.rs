use std::sync::Arc;

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{handler::*, middleware::mw_require_auth, AppState};

pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/todos", get(get_todos).post(create_todo))
        .route("/todos/:id", put(update_todo).delete(delete_todo))
        .route_layer(from_fn_with_state(app_state.clone(), mw_require_auth))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/", get(health_checker_handler))
        .with_state(app_state)
}

/// Credentialed CORS for the listed origins. Origins that are not valid
/// header values are skipped.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_credentials(true)
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{header::WWW_AUTHENTICATE, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::{
        password::PasswordHasher,
        store::{
            tests::{memory_pool, TIMEOUT},
            TodoStore, UserStore,
        },
        token::TokenIssuer,
    };

    const SECRET: &[u8] = b"route-test-secret";

    async fn test_state() -> Arc<AppState> {
        let pool = memory_pool().await;
        Arc::new(AppState {
            users: UserStore::new(pool.clone(), TIMEOUT),
            todos: TodoStore::new(pool, TIMEOUT),
            tokens: TokenIssuer::new(SECRET),
            hasher: PasswordHasher::new(4),
        })
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn register_and_login(app: &Router, username: &str, password: &str) -> String {
        let creds = json!({ "username": username, "password": password });
        let (status, _) = send(app, Method::POST, "/register", None, Some(creds.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(app, Method::POST, "/login", None, Some(creds)).await;
        assert_eq!(status, StatusCode::OK);
        body["access_token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn full_todo_lifecycle() {
        let app = create_router(test_state().await);

        let (status, body) = send(
            &app,
            Method::POST,
            "/register",
            None,
            Some(json!({ "username": "alice", "password": "pw1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "id": 1, "username": "alice" }));

        let (status, body) = send(
            &app,
            Method::POST,
            "/login",
            None,
            Some(json!({ "username": "alice", "password": "pw1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["token_type"], "bearer");
        let token = body["access_token"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            Method::POST,
            "/login",
            None,
            Some(json!({ "username": "alice", "password": "wrong" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["detail"], "Invalid credentials");

        let (status, body) = send(
            &app,
            Method::POST,
            "/todos",
            Some(&token),
            Some(json!({ "title": "buy milk" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "id": 1, "title": "buy milk", "completed": false }));

        let (status, body) = send(&app, Method::GET, "/todos", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([{ "id": 1, "title": "buy milk", "completed": false }]));

        let (status, body) = send(
            &app,
            Method::PUT,
            "/todos/1",
            Some(&token),
            Some(json!({ "title": "buy bread", "completed": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "id": 1, "title": "buy bread", "completed": true }));

        let (status, body) = send(&app, Method::DELETE, "/todos/1", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "detail": "Todo deleted" }));

        let (status, body) = send(&app, Method::GET, "/todos", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn duplicate_registration_is_bad_request() {
        let app = create_router(test_state().await);
        let creds = json!({ "username": "alice", "password": "pw1" });

        let (status, _) = send(&app, Method::POST, "/register", None, Some(creds.clone())).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, Method::POST, "/register", None, Some(creds)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "detail": "Username already exists" }));
    }

    #[tokio::test]
    async fn unknown_user_login_matches_wrong_password() {
        let app = create_router(test_state().await);
        register_and_login(&app, "alice", "pw1").await;

        let (unknown_status, unknown_body) = send(
            &app,
            Method::POST,
            "/login",
            None,
            Some(json!({ "username": "mallory", "password": "pw1" })),
        )
        .await;
        let (wrong_status, wrong_body) = send(
            &app,
            Method::POST,
            "/login",
            None,
            Some(json!({ "username": "alice", "password": "nope" })),
        )
        .await;

        assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
        assert_eq!(unknown_status, wrong_status);
        assert_eq!(unknown_body, wrong_body);
    }

    #[tokio::test]
    async fn other_users_todos_are_not_found() {
        let app = create_router(test_state().await);
        let alice = register_and_login(&app, "alice", "pw1").await;
        let bob = register_and_login(&app, "bob", "pw2").await;

        let (_, created) = send(
            &app,
            Method::POST,
            "/todos",
            Some(&alice),
            Some(json!({ "title": "alice only", "completed": true })),
        )
        .await;
        let id = created["id"].as_i64().unwrap();
        let uri = format!("/todos/{id}");

        let (status, body) = send(&app, Method::GET, "/todos", Some(&bob), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));

        let (status, body) = send(
            &app,
            Method::PUT,
            &uri,
            Some(&bob),
            Some(json!({ "title": "hijacked", "completed": false })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "detail": "Not found" }));

        let (status, _) = send(&app, Method::DELETE, &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Same answer as for an id that never existed.
        let (status, body) = send(&app, Method::DELETE, "/todos/999", Some(&bob), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "detail": "Not found" }));

        let (_, body) = send(&app, Method::GET, "/todos", Some(&alice), None).await;
        assert_eq!(body, json!([{ "id": id, "title": "alice only", "completed": true }]));
    }

    #[tokio::test]
    async fn bad_tokens_are_rejected_uniformly() {
        let state = test_state().await;
        let app = create_router(state.clone());
        register_and_login(&app, "alice", "pw1").await;

        let expired = state.tokens.issue("alice", Duration::ZERO).unwrap();
        let forged = TokenIssuer::new(b"some-other-secret")
            .issue("alice", Duration::from_secs(600))
            .unwrap();
        let ghost = state.tokens.issue("ghost", Duration::from_secs(600)).unwrap();

        let candidates = [
            Some(expired.as_str()),
            Some(forged.as_str()),
            Some(ghost.as_str()),
            Some("garbage"),
            None,
        ];
        for token in candidates {
            let (status, body) = send(&app, Method::GET, "/todos", token, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body, json!({ "detail": "Invalid auth" }));
        }
    }

    #[tokio::test]
    async fn auth_failure_sets_challenge_header() {
        let app = create_router(test_state().await);
        let request = Request::builder().uri("/todos").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[WWW_AUTHENTICATE], "Bearer");
    }

    #[tokio::test]
    async fn blank_title_is_rejected() {
        let app = create_router(test_state().await);
        let token = register_and_login(&app, "alice", "pw1").await;

        let (status, _) = send(
            &app,
            Method::POST,
            "/todos",
            Some(&token),
            Some(json!({ "title": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send(&app, Method::GET, "/todos", Some(&token), None).await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn malformed_requests_get_json_detail() {
        let app = create_router(test_state().await);

        let (status, body) = send(
            &app,
            Method::POST,
            "/register",
            None,
            Some(json!({ "username": "a" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "detail": "Invalid request body" }));

        let token = register_and_login(&app, "alice", "pw1").await;
        let (status, body) = send(
            &app,
            Method::PUT,
            "/todos/abc",
            Some(&token),
            Some(json!({ "title": "x", "completed": false })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "detail": "Invalid path parameter" }));

        let (status, body) = send(
            &app,
            Method::PUT,
            "/todos/1",
            Some(&token),
            Some(json!({ "title": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "detail": "Invalid request body" }));
    }

    #[tokio::test]
    async fn overlong_password_is_rejected_at_register() {
        let app = create_router(test_state().await);
        let password = "a".repeat(73);

        let (status, body) = send(
            &app,
            Method::POST,
            "/register",
            None,
            Some(json!({ "username": "alice", "password": password })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "detail": "Password must be at most 72 bytes" }));

        let (status, _) = send(
            &app,
            Method::POST,
            "/login",
            None,
            Some(json!({ "username": "alice", "password": password })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn health_check_is_public() {
        let app = create_router(test_state().await);
        let (status, body) = send(&app, Method::GET, "/", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
    }

    #[tokio::test]
    async fn cors_allows_configured_origin() {
        let origins = vec![
            "http://localhost:3000".to_string(),
            "https://todos.example.com".to_string(),
        ];
        let app = create_router(test_state().await).layer(cors_layer(&origins));

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/todos")
            .header("origin", "https://todos.example.com")
            .header("access-control-request-method", "GET")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "https://todos.example.com"
        );

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/todos")
            .header("origin", "https://evil.example.com")
            .header("access-control-request-method", "GET")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert!(response
            .headers()
            .get("access-control-allow-origin")
            .is_none());
    }
}
