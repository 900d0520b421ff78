//! visionguard-server: HTTP and WebSocket surface for the VisionGuard pipeline

pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod state;
pub mod websocket;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use http::create_router;
pub use session::{SessionState, SessionStats, StreamSession};
pub use state::AppState;
