// WebSocket stream endpoint: one task per connection driving a StreamSession

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use visionguard_core::ClientMessage;
use visionguard_eye::{FrameSource, HazardPolicy, PullSource, PushSource, StreamMode};

use crate::session::{Acquired, SessionState, StreamSession};
use crate::state::AppState;

/// Client frames waiting for the loop; the client's send rate drives push mode
const PUSH_CHANNEL_CAPACITY: usize = 1;

/// Query parameters for the stream endpoint
#[derive(Debug, Deserialize)]
pub struct StreamParams {
    pub mode: Option<StreamMode>,
}

/// WebSocket upgrade handler
pub async fn stream_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<StreamParams>,
    State(state): State<AppState>,
) -> Response {
    let mode = params.mode.unwrap_or(state.config.default_mode);
    ws.on_upgrade(move |socket| handle_socket(socket, state, mode))
}

enum TickResult {
    Emitted,
    Skipped,
    Disconnected,
    Failed,
}

/// Handle one stream connection until the client leaves or the pipeline fails
async fn handle_socket(socket: WebSocket, state: AppState, mode: StreamMode) {
    let connection_id = Uuid::new_v4();
    let accepted_at = Instant::now();
    info!(connection = %connection_id, mode = %mode, "Stream connection established");

    let policy = match HazardPolicy::from_config(&state.config.hazard) {
        Ok(policy) => policy,
        Err(e) => {
            error!(connection = %connection_id, "Failed to build hazard policy: {}", e);
            return;
        }
    };

    let source = match mode {
        StreamMode::Pull => {
            let devices = state.devices.clone();
            let device = match tokio::task::spawn_blocking(move || devices.open()).await {
                Ok(device) => device,
                Err(e) => {
                    warn!(connection = %connection_id, "Capture device open task failed: {}", e);
                    None
                }
            };
            FrameSource::Pull(PullSource::new(device, state.config.vision.resolution))
        }
        StreamMode::Push => FrameSource::Push(PushSource::new()),
    };

    let mut session = StreamSession::new(connection_id, source, policy, state.pipeline(), accepted_at);

    let (mut sender, receiver) = socket.split();
    let (frame_tx, mut frame_rx) = mpsc::channel::<String>(PUSH_CHANNEL_CAPACITY);
    let mut reader = tokio::spawn(read_client(receiver, frame_tx, mode, connection_id));

    let frame_interval = state.config.vision.frame_interval();
    session.transition(SessionState::Streaming);

    loop {
        let tick_started = tokio::time::Instant::now();
        let tick = run_tick(&mut session, &mut frame_rx, &mut sender);
        let result = tokio::select! {
            _ = &mut reader => TickResult::Disconnected,
            result = tick => result,
        };

        match result {
            TickResult::Emitted | TickResult::Skipped => {}
            TickResult::Disconnected => {
                session.transition(SessionState::Closing);
                break;
            }
            TickResult::Failed => {
                session.transition(SessionState::Failed);
                break;
            }
        }

        if mode == StreamMode::Pull {
            let pace = tokio::time::sleep_until(tick_started + frame_interval);
            tokio::select! {
                _ = &mut reader => {
                    session.transition(SessionState::Closing);
                    break;
                }
                _ = pace => {}
            }
        }
    }

    if session.state() == SessionState::Failed {
        let _ = sender.send(Message::Close(None)).await;
    }
    reader.abort();
    session.terminate();
}

/// One acquire -> process -> emit pass
async fn run_tick(
    session: &mut StreamSession,
    frame_rx: &mut mpsc::Receiver<String>,
    sender: &mut SplitSink<WebSocket, Message>,
) -> TickResult {
    let frame = match session.acquire(frame_rx).await {
        Acquired::Frame(frame) => frame,
        Acquired::Skip => return TickResult::Skipped,
        Acquired::Closed => return TickResult::Disconnected,
    };
    let index = frame.index();

    let message = match session.process(frame).await {
        Ok(message) => message,
        Err(e) => {
            error!(connection = %session.id(), frame = index, "Pipeline failed: {}", e);
            return TickResult::Failed;
        }
    };

    let json = match message.to_json() {
        Ok(json) => json,
        Err(e) => {
            error!(connection = %session.id(), "Failed to serialize frame update: {}", e);
            return TickResult::Failed;
        }
    };

    if let Err(e) = sender.send(Message::Text(json)).await {
        debug!(connection = %session.id(), "Send failed, client gone: {}", e);
        return TickResult::Disconnected;
    }

    session.record_emitted(&message);
    TickResult::Emitted
}

/// Watch the client side of the socket. In push mode, forward client frames to the loop.
/// Returns when the client disconnects.
async fn read_client(
    mut receiver: SplitStream<WebSocket>,
    frame_tx: mpsc::Sender<String>,
    mode: StreamMode,
    connection_id: Uuid,
) {
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match ClientMessage::from_json(&text) {
                Ok(ClientMessage::ClientFrame { image }) => {
                    if mode != StreamMode::Push {
                        debug!(connection = %connection_id, "Ignoring client frame in pull mode");
                        continue;
                    }
                    if frame_tx.send(image).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(connection = %connection_id, "Unrecognized client message: {}", e);
                }
            },
            Ok(Message::Binary(_)) => {
                warn!(connection = %connection_id, "Received binary message, ignoring");
            }
            Ok(Message::Close(_)) => {
                debug!(connection = %connection_id, "Stream closed by client");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                debug!(connection = %connection_id, "Stream receive error: {}", e);
                break;
            }
        }
    }
}
