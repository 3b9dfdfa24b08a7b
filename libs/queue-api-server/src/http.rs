use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use queue_api::Offset;
use queue_engine::QueueError;

use super::AppState;

// ═══════════════════════════════════════════════════════════════
//  Error mapping
// ═══════════════════════════════════════════════════════════════

#[derive(Debug)]
pub(crate) struct ApiError(pub(crate) QueueError);

impl From<QueueError> for ApiError {
    fn from(e: QueueError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            // 204 без тела: очередь пуста, клиент повторит позже
            QueueError::NoMessageAvailable => return StatusCode::NO_CONTENT.into_response(),
            QueueError::TopicNotExist => StatusCode::NOT_FOUND,
            QueueError::NackMsgNotExist => StatusCode::CONFLICT,
            QueueError::Storage(e) => {
                tracing::error!(error = %e, "storage failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, axum::Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[derive(Serialize)]
struct OffsetBody {
    offset: Offset,
}

// ═══════════════════════════════════════════════════════════════
//  REST: GET /api/topics
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_list_topics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let mut stats = Vec::new();
    for name in state.store.topics().await? {
        stats.push(state.store.stats(&name).await?);
    }
    Ok(axum::Json(stats).into_response())
}

// ═══════════════════════════════════════════════════════════════
//  REST: GET /api/topics/{topic}
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_topic_stats(
    State(state): State<AppState>,
    Path(topic): Path<String>,
) -> Result<Response, ApiError> {
    let stats = state.store.stats(&topic).await?;
    Ok(axum::Json(stats).into_response())
}

// ═══════════════════════════════════════════════════════════════
//  REST: POST /api/topics/{topic}  (body = payload)
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_publish(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let offset = state.store.insert(&topic, &body).await?;
    Ok((StatusCode::CREATED, axum::Json(OffsetBody { offset })).into_response())
}

// ═══════════════════════════════════════════════════════════════
//  REST: POST /api/topics/{topic}/next
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_next(
    State(state): State<AppState>,
    Path(topic): Path<String>,
) -> Result<Response, ApiError> {
    let delivery = state.store.get_next(&topic).await?;
    Ok(axum::Json(delivery).into_response())
}

// ═══════════════════════════════════════════════════════════════
//  REST: POST /api/topics/{topic}/{ack|nack|back}/{offset}
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_ack(
    State(state): State<AppState>,
    Path((topic, offset)): Path<(String, Offset)>,
) -> Result<Response, ApiError> {
    state.store.ack(&topic, offset).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn handle_nack(
    State(state): State<AppState>,
    Path((topic, offset)): Path<(String, Offset)>,
) -> Result<Response, ApiError> {
    if let Err(e) = state.store.nack(&topic, offset).await {
        tracing::warn!(topic = %topic, offset, error = %e, "nack rejected");
        return Err(e.into());
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn handle_back(
    State(state): State<AppState>,
    Path((topic, offset)): Path<(String, Offset)>,
) -> Result<Response, ApiError> {
    match state.store.back(&topic, offset).await? {
        Some(offset) => Ok(axum::Json(OffsetBody { offset }).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use queue_api::{Delivery, TopicStats};
    use queue_engine::Store;
    use storage_memory::MemoryStorage;

    use super::*;

    fn state() -> AppState {
        AppState {
            store: Arc::new(Store::new(Arc::new(MemoryStorage::default()))),
            poll_interval: Duration::from_millis(10),
        }
    }

    async fn json<T: serde::de::DeserializeOwned>(resp: Response) -> T {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn topic(name: &str) -> Path<String> {
        Path(name.to_string())
    }

    #[tokio::test]
    async fn publish_then_consume() {
        let st = state();
        let resp = handle_publish(State(st.clone()), topic("jobs"), Bytes::from_static(b"hello"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(json::<serde_json::Value>(resp).await["offset"], 0);

        let resp = handle_next(State(st.clone()), topic("jobs")).await.unwrap();
        let delivery: Delivery = json(resp).await;
        assert_eq!(delivery, Delivery { offset: 0, payload: b"hello".to_vec() });

        let resp = handle_ack(State(st.clone()), Path(("jobs".to_string(), 0))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn queue_errors_map_to_statuses() {
        let st = state();
        let unknown = handle_next(State(st.clone()), topic("nope")).await.unwrap_err();
        assert_eq!(unknown.into_response().status(), StatusCode::NOT_FOUND);

        handle_publish(State(st.clone()), topic("jobs"), Bytes::from_static(b"x")).await.unwrap();
        handle_next(State(st.clone()), topic("jobs")).await.unwrap();
        let empty = handle_next(State(st.clone()), topic("jobs")).await.unwrap_err();
        assert_eq!(empty.into_response().status(), StatusCode::NO_CONTENT);

        handle_nack(State(st.clone()), Path(("jobs".to_string(), 0))).await.unwrap();
        let twice = handle_nack(State(st.clone()), Path(("jobs".to_string(), 0))).await.unwrap_err();
        assert_eq!(twice.into_response().status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn back_reports_new_offset() {
        let st = state();
        handle_publish(State(st.clone()), topic("jobs"), Bytes::from_static(b"x")).await.unwrap();
        handle_next(State(st.clone()), topic("jobs")).await.unwrap();

        let resp = handle_back(State(st.clone()), Path(("jobs".to_string(), 0))).await.unwrap();
        assert_eq!(json::<serde_json::Value>(resp).await["offset"], 1);

        let resp = handle_back(State(st.clone()), Path(("jobs".to_string(), 0))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn list_topics_reports_stats() {
        let st = state();
        handle_publish(State(st.clone()), topic("b"), Bytes::from_static(b"1")).await.unwrap();
        handle_publish(State(st.clone()), topic("a"), Bytes::from_static(b"1")).await.unwrap();
        handle_publish(State(st.clone()), topic("a"), Bytes::from_static(b"2")).await.unwrap();

        let stats: Vec<TopicStats> = json(handle_list_topics(State(st.clone())).await.unwrap()).await;
        let names: Vec<&str> = stats.iter().map(|s| s.topic.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(stats[0].write_offset, 2);

        let resp = handle_topic_stats(State(st), topic("a")).await.unwrap();
        let a: TopicStats = json(resp).await;
        assert_eq!(a.pending(), 2);
    }
}
