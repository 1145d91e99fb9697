use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use jobdeck_events::{parse_message, HubMessage};

use crate::state::AppState;
use crate::ws::hub::{dispatch, text_frame};

/// HTTP handler that upgrades the connection to the hub WebSocket.
///
/// After the upgrade the connection is registered with `WsManager`, sent
/// the current job listing, and then serves invocations until it closes.
pub async fn hub_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Manage a single hub connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with `WsManager`, queueing a
///      `jobs_updated` snapshot as its first frame.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Answers inbound invocations on the current task.
///   4. Cleans up on disconnect.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "Hub client connected");

    // The snapshot is read under the registry lock so no broadcast for a
    // later mutation can overtake it.
    let mut rx = state
        .ws_manager
        .add_with_first(conn_id.clone(), async {
            match text_frame(&HubMessage::JobsUpdated(state.jobs.list().await)) {
                Ok(frame) => Some(frame),
                Err(e) => {
                    tracing::error!(conn_id = %conn_id, error = %e, "Failed to encode snapshot");
                    None
                }
            }
        })
        .await;

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "Hub sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    // Receiver loop: answer invocations.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => match parse_message(text.as_str()) {
                Ok(HubMessage::Invocation(invocation)) => {
                    let completion = dispatch(&state.jobs, invocation).await;
                    match text_frame(&HubMessage::Completion(completion)) {
                        Ok(frame) => {
                            state.ws_manager.send_to(&conn_id, frame).await;
                        }
                        Err(e) => {
                            tracing::error!(conn_id = %conn_id, error = %e, "Failed to encode completion");
                        }
                    }
                }
                Ok(other) => {
                    tracing::debug!(conn_id = %conn_id, frame = ?other, "Ignoring client push frame");
                }
                Err(e) => {
                    tracing::warn!(conn_id = %conn_id, error = %e, "Unparseable hub frame");
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "Hub receive error");
                break;
            }
        }
    }

    // Clean up: remove connection and abort sender task.
    state.ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "Hub client disconnected");
}
