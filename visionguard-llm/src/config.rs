use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest accepted enrichment timeout
pub const MAX_TIMEOUT_SECS: f64 = 300.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMConfig {
    pub provider: Provider,
    /// Falls back to the provider's default model when unset
    pub model: Option<String>,
    /// Falls back to the provider's public endpoint when unset
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Upper bound on one enrichment call, connect to last byte
    pub timeout_secs: f64,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Groq,
            model: None,
            base_url: None,
            temperature: 0.2,
            max_tokens: Some(256),
            timeout_secs: 10.0,
        }
    }
}

impl LLMConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.timeout_secs.is_finite() || self.timeout_secs <= 0.0 || self.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(format!("Enrichment timeout must be within (0, {}] seconds", MAX_TIMEOUT_SECS));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err("Temperature must be within [0, 2]".to_string());
        }
        if let Some(url) = &self.base_url {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(format!("Base URL must be http(s): {}", url));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        let secs = if self.timeout_secs.is_finite() {
            self.timeout_secs.clamp(0.001, MAX_TIMEOUT_SECS)
        } else {
            MAX_TIMEOUT_SECS
        };
        Duration::from_secs_f64(secs)
    }

    pub fn model_name(&self) -> String {
        self.model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    pub fn endpoint(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.provider.default_base_url().to_string())
    }
}

/// OpenAI-compatible chat completion backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Groq,
    OpenAI,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Groq => "groq",
            Provider::OpenAI => "openai",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "groq" => Some(Provider::Groq),
            "openai" => Some(Provider::OpenAI),
            _ => None,
        }
    }

    pub fn env_var_name(&self) -> &'static str {
        match self {
            Provider::Groq => "GROQ_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Groq => "https://api.groq.com/openai/v1",
            Provider::OpenAI => "https://api.openai.com/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Groq => "llama3-8b-8192",
            Provider::OpenAI => "gpt-4o-mini",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// Requested shape of the completion text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    Text,
    JsonObject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub usage: Option<Usage>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}
