use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use axum::Router;
use tower::ServiceExt;

use greenhouse_hub::config::ServerConfig;
use greenhouse_hub::server::router;
use greenhouse_hub::server::state::AppState;
use greenhouse_hub::store::Broadcaster;

pub struct MockApp {
    pub router: Router,
    pub broadcaster: Arc<Broadcaster>,
}

impl MockApp {
    pub fn new() -> Self {
        let config = ServerConfig::default();
        let broadcaster = Arc::new(Broadcaster::with_queue_capacity(config.queue_capacity));
        let state = Arc::new(AppState::with_broadcaster(Arc::clone(&broadcaster), &config));

        Self {
            router: router(state),
            broadcaster,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn push(&self, body: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri("/api/sensor/push")
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn latest(&self) -> Response<Body> {
        self.send(
            Request::builder()
                .uri("/api/sensor/latest")
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
