use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;

use queue_api::{Delivery, Offset};
use queue_engine::QueueError;

use super::AppState;

// ═══════════════════════════════════════════════════════════════
//  WebSocket: /ws/{topic}
// ═══════════════════════════════════════════════════════════════
//
// Один consumer на соединение:
//   client: INIT              server: <binary payload>
//   client: ACK|NACK|BACK     server: <binary payload следующего сообщения>
//
// Пока очередь пуста, сервер опрашивает её раз в poll_interval.
// Закрытие соединения с неподтверждённым сообщением оставляет его in-flight.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Init,
    Ack,
    Nack,
    Back,
}

impl Command {
    fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_uppercase().as_str() {
            "INIT" => Some(Command::Init),
            "ACK" => Some(Command::Ack),
            "NACK" => Some(Command::Nack),
            "BACK" => Some(Command::Back),
            _ => None,
        }
    }
}

pub(crate) async fn handle_ws(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_consumer(socket, state, topic))
}

async fn send_error(socket: &mut WebSocket, msg: impl std::fmt::Display) -> bool {
    let json = serde_json::json!({ "error": msg.to_string() }).to_string();
    socket.send(Message::Text(json.into())).await.is_ok()
}

async fn ws_consumer(mut socket: WebSocket, state: AppState, topic: String) {
    tracing::debug!(topic = %topic, "ws consumer connected");
    let mut pending: Option<Offset> = None;

    loop {
        let text = match socket.recv().await {
            Some(Ok(Message::Text(t))) => t,
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
            Some(Ok(_)) => continue,
        };

        let Some(command) = Command::parse(text.as_str()) else {
            if !send_error(&mut socket, format!("unknown command '{}'", text.as_str())).await {
                break;
            }
            continue;
        };

        match (command, pending) {
            (Command::Init, None) => {}
            (Command::Init, Some(offset)) => {
                if !send_error(&mut socket, format!("offset {offset} is not settled")).await {
                    break;
                }
                continue;
            }
            (_, None) => {
                if !send_error(&mut socket, "nothing to settle, send INIT first").await {
                    break;
                }
                continue;
            }
            (settle, Some(offset)) => {
                if let Err(e) = settle_offset(&state, &topic, offset, settle).await {
                    tracing::warn!(topic = %topic, offset, error = %e, "ws settle failed");
                    if !send_error(&mut socket, e).await {
                        break;
                    }
                    continue;
                }
                pending = None;
            }
        }

        let Some(delivery) = next_delivery(&mut socket, &state, &topic).await else {
            break;
        };
        pending = Some(delivery.offset);
        if socket.send(Message::Binary(delivery.payload.into())).await.is_err() {
            break;
        }
    }

    if let Some(offset) = pending {
        tracing::info!(topic = %topic, offset, "ws consumer left with message in flight");
    }
    tracing::debug!(topic = %topic, "ws consumer disconnected");
}

async fn settle_offset(
    state: &AppState,
    topic: &str,
    offset: Offset,
    command: Command,
) -> Result<(), QueueError> {
    match command {
        Command::Ack => state.store.ack(topic, offset).await,
        Command::Nack => state.store.nack(topic, offset).await,
        Command::Back => state.store.back(topic, offset).await.map(|_| ()),
        Command::Init => Ok(()),
    }
}

/// Дождаться следующего сообщения. `None` — соединение закрыто
/// или storage вернул ошибку (клиенту уже отправлено сообщение об ошибке).
async fn next_delivery(socket: &mut WebSocket, state: &AppState, topic: &str) -> Option<Delivery> {
    loop {
        match state.store.get_next(topic).await {
            Ok(delivery) => return Some(delivery),
            Err(e) if e.is_transient() => {}
            Err(e) => {
                tracing::error!(topic, error = %e, "ws delivery failed");
                send_error(socket, e).await;
                return None;
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(state.poll_interval) => {}
            msg = socket.recv() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
                Some(Ok(Message::Text(_))) => {
                    if !send_error(socket, "waiting for the next message").await {
                        return None;
                    }
                }
                Some(Ok(_)) => {}
            },
        }
    }
}
