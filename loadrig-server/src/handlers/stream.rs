//! Live observer stream over WebSocket

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use loadrig_core::ExecutionId;
use loadrig_execution::Subscription;
use tracing::{debug, warn};

use crate::{context::AppContext, errors::RestResult, handlers::parse_execution_id};

/// Upgrade to a WebSocket carrying the execution's `ObserverEvent`s as JSON text frames
///
/// Unknown executions are rejected before the upgrade.
pub async fn execution_stream(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> RestResult<Response> {
    let id = parse_execution_id(&id)?;
    let subscription = ctx.manager.subscribe(id).await?;
    Ok(ws.on_upgrade(move |socket| forward_events(socket, subscription, id)))
}

async fn forward_events(mut socket: WebSocket, mut subscription: Subscription, id: ExecutionId) {
    debug!("Observer attached to execution {}", id);
    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else { break };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to serialize event for execution {}: {}", id, e);
                        continue;
                    }
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    debug!("Observer of execution {} went away", id);
                    return;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    debug!("Observer of execution {} disconnected", id);
                    return;
                }
                Some(Ok(_)) => {}
            }
        }
    }
    let _ = socket.send(Message::Close(None)).await;
    debug!("Stream for execution {} finished", id);
}
