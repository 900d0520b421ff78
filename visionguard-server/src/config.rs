//! Server configuration: defaults, config file, `VISIONGUARD_*` environment

use serde::{Deserialize, Serialize};
use std::path::Path;
use visionguard_eye::{HazardConfig, StreamMode, VisionConfig};
use visionguard_llm::{LLMConfig, Provider};

use crate::error::{Result, ServerError};

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "VISIONGUARD_";

/// Provider-independent API key variable
pub const API_KEY_ENV: &str = "VISIONGUARD_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Mode used when a client does not pass `?mode=`
    pub default_mode: StreamMode,
    pub log_level: String,
    pub log_json: bool,
    pub vision: VisionConfig,
    pub hazard: HazardConfig,
    pub llm: LLMConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            default_mode: StreamMode::Pull,
            log_level: "info".to_string(),
            log_json: false,
            vision: VisionConfig::default(),
            hazard: HazardConfig::default(),
            llm: LLMConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a JSON, TOML or YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_str(&content)
    }

    /// Parse configuration, trying JSON, then TOML, then YAML
    pub fn from_str(content: &str) -> Result<Self> {
        if let Ok(config) = serde_json::from_str::<ServerConfig>(content) {
            return Ok(config);
        }

        if let Ok(config) = toml::from_str::<ServerConfig>(content) {
            return Ok(config);
        }

        if let Ok(config) = serde_yaml::from_str::<ServerConfig>(content) {
            return Ok(config);
        }

        Err(ServerError::Parse("Unknown config format (expected JSON, TOML or YAML)".to_string()))
    }

    /// Apply `VISIONGUARD_*` variables from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply `VISIONGUARD_*` overrides from an arbitrary lookup
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("HOST") {
            self.host = host;
        }
        if let Some(port) = get("PORT") {
            self.port = parse_env("PORT", &port)?;
        }
        if let Some(mode) = get("MODE") {
            self.default_mode = mode.parse().map_err(ServerError::Parse)?;
        }
        if let Some(level) = get("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(json) = get("LOG_JSON") {
            self.log_json = parse_env("LOG_JSON", &json)?;
        }
        if let Some(fps) = get("FPS") {
            self.vision.frame_rate = parse_env("FPS", &fps)?;
        }
        if let Some(camera) = get("CAMERA_ID") {
            self.vision.camera_id = parse_env("CAMERA_ID", &camera)?;
        }
        if let Some(quality) = get("JPEG_QUALITY") {
            self.vision.jpeg_quality = parse_env("JPEG_QUALITY", &quality)?;
        }
        if let Some(model) = get("MODEL_PATH") {
            self.vision.model_path = Some(model.into());
        }
        if let Some(cooldown) = get("COOLDOWN_SECS") {
            self.hazard.cooldown_secs = parse_env("COOLDOWN_SECS", &cooldown)?;
        }
        if let Some(probability) = get("HAZARD_PROBABILITY") {
            self.hazard.probability = parse_env("HAZARD_PROBABILITY", &probability)?;
        }
        if let Some(seed) = get("SEED") {
            self.hazard.seed = Some(parse_env("SEED", &seed)?);
        }
        if let Some(provider) = get("LLM_PROVIDER") {
            self.llm.provider = Provider::from_str(&provider)
                .ok_or_else(|| ServerError::Parse(format!("Unknown LLM provider '{}'", provider)))?;
        }
        if let Some(model) = get("LLM_MODEL") {
            self.llm.model = Some(model);
        }
        if let Some(url) = get("LLM_BASE_URL") {
            self.llm.base_url = Some(url);
        }
        if let Some(timeout) = get("ENRICH_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_env("ENRICH_TIMEOUT_SECS", &timeout)?;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ServerError::Validation("host cannot be empty".to_string()));
        }
        self.vision.validate().map_err(ServerError::Validation)?;
        self.hazard.validate().map_err(ServerError::Validation)?;
        self.llm.validate().map_err(ServerError::Validation)?;
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Credential for the configured provider: its own variable first, then `VISIONGUARD_API_KEY`
    pub fn resolve_api_key<F>(&self, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let usable = |key: Option<String>| key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty());
        usable(lookup(self.llm.provider.env_var_name())).or_else(|| usable(lookup(API_KEY_ENV)))
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ServerError::Parse(format!("Invalid value for {}{}: '{}'", ENV_PREFIX, name, value)))
}
