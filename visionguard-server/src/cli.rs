//! Command line flags; applied on top of file and environment configuration

use clap::Parser;
use std::path::PathBuf;
use visionguard_eye::StreamMode;

use crate::config::ServerConfig;

#[derive(Debug, Parser)]
#[command(name = "visionguard-server")]
#[command(about = "Real-time hazard detection stream server", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file (JSON, TOML or YAML)
    #[arg(long, short, env = "VISIONGUARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Bind host
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port
    #[arg(long, short)]
    pub port: Option<u16>,

    /// Default stream mode when the client does not choose one
    #[arg(long, value_parser = parse_mode)]
    pub mode: Option<StreamMode>,

    /// Pull-mode frame rate
    #[arg(long)]
    pub fps: Option<u32>,

    /// Camera device index
    #[arg(long)]
    pub camera: Option<u32>,

    /// YOLOv8 ONNX model path
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Seconds between two hazards on one connection
    #[arg(long)]
    pub cooldown: Option<f64>,

    /// Per-frame hazard probability once out of cooldown
    #[arg(long)]
    pub probability: Option<f64>,

    /// Fixed hazard RNG seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Enrichment timeout in seconds
    #[arg(long)]
    pub enrich_timeout: Option<f64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

fn parse_mode(value: &str) -> Result<StreamMode, String> {
    value.parse()
}

impl Cli {
    /// Overwrite every field the user passed on the command line
    pub fn apply(&self, config: &mut ServerConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(mode) = self.mode {
            config.default_mode = mode;
        }
        if let Some(fps) = self.fps {
            config.vision.frame_rate = fps;
        }
        if let Some(camera) = self.camera {
            config.vision.camera_id = camera;
        }
        if let Some(model) = &self.model {
            config.vision.model_path = Some(model.clone());
        }
        if let Some(cooldown) = self.cooldown {
            config.hazard.cooldown_secs = cooldown;
        }
        if let Some(probability) = self.probability {
            config.hazard.probability = probability;
        }
        if let Some(seed) = self.seed {
            config.hazard.seed = Some(seed);
        }
        if let Some(timeout) = self.enrich_timeout {
            config.llm.timeout_secs = timeout;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if self.log_json {
            config.log_json = true;
        }
    }
}
