//! Axum server setup and router configuration.

use crate::api::{slack, webhook};
use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use axum::{
    Json, Router,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        // Intra scale-team hooks, one secret per endpoint
        .route("/create", post(webhook::on_create))
        .route("/delete", post(webhook::on_delete))
        .route("/update", post(webhook::on_update))
        // Slack slash commands
        .route("/slack/commands", post(slack::on_command))
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Simple health check - returns OK if the server is running.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Run the server with graceful shutdown support.
pub async fn run_server(router: Router, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use peerpp_core::chat::SlackChat;
    use peerpp_core::config::{
        PlatformConfig, PolicyConfig, ServerConfig, SharedConfig, WatchedProject, WebhookSecrets,
    };
    use peerpp_core::platform::IntraPlatform;
    use peerpp_core::processors::{CommandDesk, Coordinator};
    use peerpp_core::registry::MemoryLockRegistry;
    use peerpp_sdk::client::{IntraClient, IntraCredentials, SlackClient};
    use peerpp_sdk::signature::sign_slack_request;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::RwLock;
    use tower::ServiceExt;

    const SIGNING_SECRET: &str = "slack-signing";

    /// Remote clients point at a closed port; none of the cases below reach them
    /// except the spawned slash-command reply.
    fn test_state() -> AppState {
        let platform_config = PlatformConfig {
            bot_user_id: 1,
            campus_id: 14,
            cursus_id: 21,
            evaluator_group_id: 77,
        };
        let config = SharedConfig {
            platform: platform_config,
            server: Arc::new(RwLock::new(ServerConfig {
                listen: "127.0.0.1:0".parse().unwrap(),
                handler_timeout: Duration::from_secs(5),
            })),
            policy: Arc::new(RwLock::new(PolicyConfig {
                projects: vec![WatchedProject {
                    id: 1314,
                    slug: "libft".into(),
                }],
                random_booking_chance: 100,
                lock_expiration_days: 14,
            })),
            webhooks: Arc::new(RwLock::new(WebhookSecrets {
                create: "create-secret".into(),
                delete: "delete-secret".into(),
                update: "update-secret".into(),
            })),
        };

        let intra = IntraClient::new(
            "http://127.0.0.1:9/".parse().unwrap(),
            IntraCredentials {
                uid: "uid".into(),
                secret: "secret".into(),
                scopes: "public".into(),
            },
            2,
            Duration::from_millis(10),
        )
        .unwrap();
        let slack = Arc::new(
            SlackClient::new("xoxb-test")
                .unwrap()
                .with_base_url("http://127.0.0.1:9/".parse().unwrap()),
        );
        let registry = Arc::new(MemoryLockRegistry::new());
        let coordinator = Arc::new(Coordinator::new(
            Arc::new(IntraPlatform::new(
                Arc::new(intra),
                platform_config,
                config.policy.clone(),
            )),
            Arc::new(SlackChat::new(slack.as_ref().clone())),
            registry.clone(),
            platform_config,
            config.policy.clone(),
        ));

        AppState {
            config,
            registry,
            desk: Arc::new(CommandDesk::new(coordinator.clone())),
            coordinator,
            slack,
            slack_signing_secret: Arc::from(SIGNING_SECRET),
        }
    }

    fn hook_body(user: &str) -> String {
        format!(
            r#"{{
                "id": 500,
                "team": {{ "id": 9, "name": "jdoe's group", "project_id": 1314 }},
                "scale": {{ "id": 3, "correction_number": 3 }},
                "project": {{ "id": 1314, "name": "Libft", "slug": "libft" }},
                "truant": {{}},
                "final_mark": null,
                "user": {user}
            }}"#
        )
    }

    fn hook_request(path: &str, delivery: &str, secret: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .header("x-delivery", delivery)
            .header("x-secret", secret)
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_version() {
        let response = build_router(test_state())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("healthy"));
        assert!(body.contains(env!("CARGO_PKG_VERSION")));
    }

    #[tokio::test]
    async fn webhook_rejections() {
        let router = build_router(test_state());

        let wrong_secret = hook_request("/create", "d-1", "delete-secret", hook_body("null"));
        let response = router.clone().oneshot(wrong_secret).await.unwrap();
        assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);

        let mut not_json = hook_request("/create", "d-2", "create-secret", hook_body("null"));
        not_json
            .headers_mut()
            .insert("content-type", "text/plain".parse().unwrap());
        let response = router.clone().oneshot(not_json).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let no_delivery = Request::builder()
            .method("POST")
            .uri("/update")
            .header("content-type", "application/json")
            .header("x-secret", "update-secret")
            .body(Body::from(hook_body("null")))
            .unwrap();
        let response = router.clone().oneshot(no_delivery).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let garbage = hook_request("/delete", "d-3", "delete-secret", "{}".into());
        let response = router.oneshot(garbage).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_without_evaluator_then_duplicate() {
        let router = build_router(test_state());

        let first = hook_request("/create", "d-1", "create-secret", hook_body("null"));
        let response = router.clone().oneshot(first).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let again = hook_request("/create", "d-1", "create-secret", hook_body("null"));
        let response = router.oneshot(again).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "duplicate");
    }

    #[tokio::test]
    async fn delete_by_real_evaluator_is_ignored() {
        let router = build_router(test_state());
        let body = hook_body(r#"{ "id": 42, "login": "jdoe" }"#);
        let response = router
            .oneshot(hook_request("/delete", "d-9", "delete-secret", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    fn slack_request(body: &str, signature: String, timestamp: i64) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/slack/commands")
            .header("content-type", "application/x-www-form-urlencoded")
            .header("x-slack-signature", signature)
            .header("x-slack-request-timestamp", timestamp.to_string())
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    const COMMAND_FORM: &str = "command=%2Fprojects&text=&user_id=U1&user_name=jdoe\
                                &response_url=http%3A%2F%2F127.0.0.1%3A9%2Freply";

    #[tokio::test]
    async fn slack_command_signature() {
        let router = build_router(test_state());
        let now = time::OffsetDateTime::now_utc().unix_timestamp();

        let forged = sign_slack_request(now, COMMAND_FORM, b"other-secret");
        let response = router
            .clone()
            .oneshot(slack_request(COMMAND_FORM, forged, now))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let stale = now - 10 * 60;
        let old = sign_slack_request(stale, COMMAND_FORM, SIGNING_SECRET.as_bytes());
        let response = router
            .clone()
            .oneshot(slack_request(COMMAND_FORM, old, stale))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let signed = sign_slack_request(now, COMMAND_FORM, SIGNING_SECRET.as_bytes());
        let response = router
            .oneshot(slack_request(COMMAND_FORM, signed, now))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("ephemeral"));
    }
}
