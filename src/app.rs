use std::{net::SocketAddr, time::Duration};

use axum::{
    http::{HeaderName, StatusCode},
    routing::get,
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{Level, Span};

use crate::auth::extractors::AUTH_HEADER;
use crate::state::AppState;
use crate::{auth, todos};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(todos::router())
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers([HeaderName::from_static(AUTH_HEADER)]),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    // Only the path: the query string never reaches the logs.
                    tracing::info_span!(
                        "request",
                        method = %req.method(),
                        path = %req.uri().path(),
                        status = tracing::field::Empty,
                    )
                })
                .on_response(|res: &axum::http::Response<_>, latency: Duration, span: &Span| {
                    log_response(res.status(), latency, span)
                }),
        )
}

/// 4xx logs at warn, 5xx at error.
fn response_level(status: StatusCode) -> Level {
    if status.is_server_error() {
        Level::ERROR
    } else if status.is_client_error() {
        Level::WARN
    } else {
        Level::INFO
    }
}

fn log_response(status: StatusCode, latency: Duration, span: &Span) {
    span.record("status", status.as_u16());
    let latency_ms = latency.as_millis() as u64;
    match response_level(status) {
        Level::ERROR => tracing::error!(status = status.as_u16(), latency_ms, "request failed"),
        Level::WARN => tracing::warn!(status = status.as_u16(), latency_ms, "request rejected"),
        _ => tracing::info!(status = status.as_u16(), latency_ms, "request served"),
    }
}

pub async fn serve(app: Router, state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "3000".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down; closing store");
    state.store.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    #[test]
    fn response_level_follows_status_class() {
        assert_eq!(response_level(StatusCode::OK), Level::INFO);
        assert_eq!(response_level(StatusCode::NO_CONTENT), Level::INFO);
        assert_eq!(response_level(StatusCode::UNAUTHORIZED), Level::WARN);
        assert_eq!(response_level(StatusCode::NOT_FOUND), Level::WARN);
        assert_eq!(response_level(StatusCode::INTERNAL_SERVER_ERROR), Level::ERROR);
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(AUTH_HEADER, t);
        }
        let req = match body {
            Some(b) => req
                .header("content-type", "application/json")
                .body(Body::from(b.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();
        app.clone().oneshot(req).await.unwrap()
    }

    async fn body_bytes(res: Response) -> Vec<u8> {
        axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn body_json(res: Response) -> Value {
        serde_json::from_slice(&body_bytes(res).await).unwrap()
    }

    fn header(res: &Response) -> String {
        res.headers()
            .get(AUTH_HEADER)
            .expect("x-auth header")
            .to_str()
            .unwrap()
            .to_string()
    }

    async fn signup(app: &Router, email: &str, password: &str) -> (String, Value) {
        let res = send(
            app,
            Method::POST,
            "/users",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let token = header(&res);
        (token, body_json(res).await)
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = build_app(AppState::fake());
        let res = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn signup_me_logout_flow() {
        let state = AppState::fake();
        let app = build_app(state.clone());

        let (token, body) = signup(&app, "a@example.com", "secret1").await;
        assert_eq!(body["email"], "a@example.com");
        assert!(body["id"].is_string());
        assert!(body.get("password").is_none());
        assert!(body.get("tokens").is_none());

        let stored = state
            .store
            .find_user_by_email("a@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(stored.password_hash, "secret1");

        let res = send(&app, Method::GET, "/me", Some(token.as_str()), None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await, body);

        let res = send(&app, Method::GET, "/users/me", None, None).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(body_bytes(res).await.is_empty());

        let res = send(&app, Method::DELETE, "/users/me/token", Some(token.as_str()), None).await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = send(&app, Method::GET, "/me", Some(token.as_str()), None).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(body_bytes(res).await.is_empty());
    }

    #[tokio::test]
    async fn bad_tokens_get_uniform_401() {
        let app = build_app(AppState::fake());
        for token in ["", "garbage", "a.b.c"] {
            let res = send(&app, Method::GET, "/users/me", Some(token), None).await;
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
            assert!(body_bytes(res).await.is_empty());
        }
    }

    #[tokio::test]
    async fn signup_rejects_invalid_and_duplicate() {
        let app = build_app(AppState::fake());
        let res = send(
            &app,
            Method::POST,
            "/users",
            None,
            Some(json!({ "email": "newUser", "password": "newp" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        signup(&app, "jen@example.com", "userTwoPass").await;
        let res = send(
            &app,
            Method::POST,
            "/users",
            None,
            Some(json!({ "email": "jen@example.com", "password": "newpwd12" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(res.headers().get(AUTH_HEADER).is_none());
    }

    #[tokio::test]
    async fn login_appends_tokens_and_wrong_password_does_not() {
        let state = AppState::fake();
        let app = build_app(state.clone());
        let (first, body) = signup(&app, "a@example.com", "secret1").await;

        let res = send(
            &app,
            Method::POST,
            "/users/login",
            None,
            Some(json!({ "email": "a@example.com", "password": "secret1" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let second = header(&res);
        assert_ne!(first, second);
        assert_eq!(body_json(res).await, body);

        let user = state
            .store
            .find_user_by_email("a@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.tokens.len(), 2);
        assert_eq!(user.tokens.last().unwrap().token, second);

        let res = send(
            &app,
            Method::POST,
            "/users/login",
            None,
            Some(json!({ "email": "a@example.com", "password": "wrong-one" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(res.headers().get(AUTH_HEADER).is_none());

        let user = state.store.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.tokens.len(), 2);

        // Both sessions stay usable.
        for token in [first.as_str(), second.as_str()] {
            let res = send(&app, Method::GET, "/me", Some(token), None).await;
            assert_eq!(res.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn patch_me_changes_email_only() {
        let state = AppState::fake();
        let app = build_app(state.clone());
        let (token, body) = signup(&app, "a@example.com", "secret1").await;
        let before = state
            .store
            .find_user_by_email("a@example.com")
            .await
            .unwrap()
            .unwrap();

        let res = send(
            &app,
            Method::PATCH,
            "/users/me",
            Some(token.as_str()),
            Some(json!({ "email": "b@example.com" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let updated = body_json(res).await;
        assert_eq!(updated["id"], body["id"]);
        assert_eq!(updated["email"], "b@example.com");

        let after = state.store.find_user_by_id(before.id).await.unwrap().unwrap();
        assert_eq!(after.password_hash, before.password_hash);
    }

    #[tokio::test]
    async fn todo_crud_is_owner_scoped() {
        let app = build_app(AppState::fake());
        let (alice, alice_body) = signup(&app, "andrew@example.com", "userOnePass").await;
        let (bob, _) = signup(&app, "jen@example.com", "userTwoPass").await;

        let res = send(&app, Method::POST, "/todos", None, Some(json!({ "text": "dinner" }))).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = send(
            &app,
            Method::POST,
            "/todos",
            Some(alice.as_str()),
            Some(json!({ "text": "dinner", "creator": "someone-else", "completedAt": 3333 })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let todo = body_json(res).await;
        assert_eq!(todo["text"], "dinner");
        assert_eq!(todo["creator"], alice_body["id"]);
        assert_eq!(todo["completed"], false);
        assert!(todo["completedAt"].is_null());
        let id = todo["id"].as_str().unwrap().to_string();
        let path = format!("/todos/{id}");

        let res = send(&app, Method::GET, "/todos", Some(bob.as_str()), None).await;
        assert_eq!(body_json(res).await["todos"], json!([]));
        let res = send(&app, Method::GET, &path, Some(bob.as_str()), None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let res = send(
            &app,
            Method::PATCH,
            &path,
            Some(bob.as_str()),
            Some(json!({ "completed": true })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let res = send(&app, Method::DELETE, &path, Some(bob.as_str()), None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = send(&app, Method::GET, "/todos", Some(alice.as_str()), None).await;
        assert_eq!(body_json(res).await["todos"].as_array().unwrap().len(), 1);
        let res = send(&app, Method::GET, &path, Some(alice.as_str()), None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["todo"]["text"], "dinner");

        let res = send(
            &app,
            Method::PATCH,
            &path,
            Some(alice.as_str()),
            Some(json!({ "text": "Dinner now", "completed": true })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let updated = body_json(res).await;
        assert_eq!(updated["todo"]["text"], "Dinner now");
        assert_eq!(updated["todo"]["completed"], true);
        assert!(updated["todo"]["completedAt"].is_i64());

        let res = send(
            &app,
            Method::PATCH,
            &path,
            Some(alice.as_str()),
            Some(json!({ "completed": false, "completedAt": 3333 })),
        )
        .await;
        let updated = body_json(res).await;
        assert_eq!(updated["todo"]["completed"], false);
        assert!(updated["todo"]["completedAt"].is_null());

        let res = send(&app, Method::DELETE, &path, Some(alice.as_str()), None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["todo"]["id"], id.as_str());
        let res = send(&app, Method::GET, &path, Some(alice.as_str()), None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn todo_input_errors() {
        let app = build_app(AppState::fake());
        let (token, _) = signup(&app, "a@example.com", "secret1").await;

        let res = send(&app, Method::POST, "/todos", Some(token.as_str()), Some(json!({}))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = send(&app, Method::GET, "/todos/1113", Some(token.as_str()), None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let res = send(&app, Method::DELETE, "/todos/1113", Some(token.as_str()), None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = send(
            &app,
            Method::POST,
            "/todos",
            Some(token.as_str()),
            Some(json!({ "text": "x" })),
        )
        .await;
        let id = body_json(res).await["id"].as_str().unwrap().to_string();
        let res = send(
            &app,
            Method::PATCH,
            &format!("/todos/{id}"),
            Some(token.as_str()),
            Some(json!({ "completed": "yes" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
