mod http;
mod ws;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use tokio_util::sync::CancellationToken;

use queue_engine::Store;

#[derive(Clone)]
pub(crate) struct AppState {
    store: Arc<Store>,
    /// Как часто WS consumer перепроверяет пустую очередь.
    poll_interval: Duration,
}

/// Router с REST и WebSocket маршрутами.
pub fn router(store: Arc<Store>, poll_interval: Duration) -> Router {
    let state = AppState { store, poll_interval };

    Router::new()
        .route("/api/topics", get(http::handle_list_topics))
        .route(
            "/api/topics/{topic}",
            get(http::handle_topic_stats).post(http::handle_publish),
        )
        .route("/api/topics/{topic}/next", post(http::handle_next))
        .route("/api/topics/{topic}/ack/{offset}", post(http::handle_ack))
        .route("/api/topics/{topic}/nack/{offset}", post(http::handle_nack))
        .route("/api/topics/{topic}/back/{offset}", post(http::handle_back))
        .route("/ws/{topic}", get(ws::handle_ws))
        .with_state(state)
}

/// HTTP + WebSocket API сервер очереди.
pub async fn run(
    port: u16,
    store: Arc<Store>,
    poll_interval: Duration,
    shutdown: CancellationToken,
) -> Result<(), String> {
    let app = router(store, poll_interval);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .map_err(|e| format!("bind api :{port}: {e}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| format!("axum serve: {e}"))?;

    Ok(())
}
