//! Axum router assembly.

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use housectl_app::ports::MessagePublisher;

use crate::api;
use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// Includes a [`TraceLayer`] that logs each HTTP request/response at the
/// `DEBUG` level using the `tracing` ecosystem.
pub fn build<P>(state: AppState<P>) -> Router
where
    P: MessagePublisher + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .route("/send", post(api::publish::send::<P>))
        .route("/api/status", get(api::status::get::<P>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use housectl_app::ports::OutboundMessage;
    use housectl_domain::error::TransportError;
    use housectl_domain::state::DeviceState;
    use housectl_domain::status::{Presence, SystemStatus};
    use housectl_domain::time::now;
    use tokio::sync::watch;
    use tower::ServiceExt;

    #[derive(Default)]
    struct StubPublisher {
        sent: Mutex<Vec<OutboundMessage>>,
        offline: bool,
    }

    impl MessagePublisher for StubPublisher {
        async fn publish(&self, message: OutboundMessage) -> Result<(), TransportError> {
            if self.offline {
                return Err(TransportError::NotConnected);
            }
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    fn snapshot() -> SystemStatus {
        SystemStatus {
            timestamp: now(),
            devices: BTreeMap::from([("light".to_string(), DeviceState::Switch(true))]),
            controller: Presence::Online,
        }
    }

    fn app(publisher: Arc<StubPublisher>) -> (Router, watch::Sender<SystemStatus>) {
        let (feed, status) = watch::channel(snapshot());
        (build(AppState::new(publisher, status)), feed)
    }

    fn send(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/send")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_check_should_return_ok() {
        let (app, _feed) = app(Arc::default());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn should_publish_message_non_retained() {
        let publisher = Arc::new(StubPublisher::default());
        let (app, _feed) = app(Arc::clone(&publisher));

        let response = app
            .oneshot(send(r#"{"topic":"home/light","message":"ON"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({"status": "Message published"})
        );
        let sent = publisher.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].topic, "home/light");
        assert_eq!(sent[0].payload, "ON");
        assert!(!sent[0].retain);
    }

    #[tokio::test]
    async fn should_publish_non_string_message_as_json_text() {
        let publisher = Arc::new(StubPublisher::default());
        let (app, _feed) = app(Arc::clone(&publisher));

        let response = app
            .oneshot(send(r#"{"topic":"home/fan","message":{"speed":40}}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(publisher.sent.lock().unwrap()[0].payload, r#"{"speed":40}"#);
    }

    #[tokio::test]
    async fn should_reject_missing_topic_or_message() {
        for body in [
            r#"{"message":"ON"}"#,
            r#"{"topic":"home/light"}"#,
            r#"{"topic":"","message":"ON"}"#,
            r#"{"topic":"home/light","message":""}"#,
        ] {
            let publisher = Arc::new(StubPublisher::default());
            let (app, _feed) = app(Arc::clone(&publisher));
            let response = app.oneshot(send(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(
                json_body(response).await,
                serde_json::json!({"error": "Missing topic or message"})
            );
            assert!(publisher.sent.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn should_reject_invalid_json() {
        let (app, _feed) = app(Arc::default());
        let response = app.oneshot(send("not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({"error": "Invalid JSON payload"})
        );
    }

    #[tokio::test]
    async fn should_report_publish_failure_as_server_error() {
        let publisher = Arc::new(StubPublisher {
            offline: true,
            ..StubPublisher::default()
        });
        let (app, _feed) = app(publisher);
        let response = app
            .oneshot(send(r#"{"topic":"home/light","message":"ON"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert!(
            body["error"]
                .as_str()
                .unwrap()
                .contains("transport not connected")
        );
    }

    #[tokio::test]
    async fn should_serve_latest_status_snapshot() {
        let (app, feed) = app(Arc::default());
        let mut next = snapshot();
        next.devices
            .insert("light".to_string(), DeviceState::Switch(false));
        next.controller = Presence::Offline;
        feed.send_replace(next);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["devices"]["light"], false);
        assert_eq!(body["controller"], "offline");
    }
}
