// Shared helpers for the end-to-end tests

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use image::{Rgb, RgbImage};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use visionguard_eye::camera::{CaptureDeviceFactory, NoDeviceFactory};
use visionguard_eye::codec::encode_jpeg_data_url;
use visionguard_eye::{Detector, NullClassifier};
use visionguard_llm::AlertEnricher;
use visionguard_server::{create_router, AppState, ServerConfig};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Config with hazards off, so frame updates carry no alerts
pub fn quiet_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.hazard.probability = 0.0;
    config.vision.resolution = (160, 120);
    config
}

/// Config where every eligible frame fires a hazard
pub fn hazardous_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.hazard.probability = 1.0;
    config.hazard.cooldown_secs = 0.0;
    config.hazard.seed = Some(11);
    config.vision.resolution = (160, 120);
    config
}

pub fn state_with(
    config: ServerConfig,
    enricher: AlertEnricher,
    devices: Arc<dyn CaptureDeviceFactory>,
) -> AppState {
    AppState::new(
        config,
        Arc::new(Detector::new(Arc::new(NullClassifier))),
        Arc::new(enricher),
        devices,
    )
}

pub fn offline_state(config: ServerConfig) -> AppState {
    state_with(config, AlertEnricher::offline(), Arc::new(NoDeviceFactory))
}

/// Serve `state` on an ephemeral local port
pub async fn spawn_server(state: AppState) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.unwrap();
    });
    addr
}

pub async fn connect(addr: SocketAddr, mode: &str) -> Client {
    let url = format!("ws://{}/ws/stream?mode={}", addr, mode);
    let (client, _response) = connect_async(url).await.unwrap();
    client
}

pub fn client_frame(image: &RgbImage) -> Message {
    let url = encode_jpeg_data_url(image, 85).unwrap();
    Message::Text(serde_json::json!({"type": "client_frame", "image": url}).to_string())
}

pub fn gray_image() -> RgbImage {
    RgbImage::from_pixel(160, 120, Rgb([80, 80, 80]))
}

pub async fn send(client: &mut Client, message: Message) {
    client.send(message).await.unwrap();
}

/// Next text message as JSON, or `None` if nothing arrives within `wait`
pub async fn next_json(client: &mut Client, wait: Duration) -> Option<serde_json::Value> {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match tokio::time::timeout(remaining, client.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => return Some(serde_json::from_str(&text).unwrap()),
            Ok(Some(Ok(_))) => continue,
            _ => return None,
        }
    }
}
