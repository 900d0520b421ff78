//! Chat completions against any OpenAI-compatible endpoint (Groq, OpenAI)

use async_trait::async_trait;
use crate::config::*;
use crate::error::{LLMError, Result};
use crate::providers::trait_impl::Provider as ProviderTrait;
use parking_lot::RwLock;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Key value shipped in sample env files; treated as no key at all
pub const PLACEHOLDER_API_KEY: &str = "your_groq_api_key_here";

const MAX_ERROR_BODY: usize = 500;

pub struct OpenAIProvider {
    kind: Provider,
    api_key: Arc<RwLock<Option<String>>>,
    client: Client,
    base_url: String,
    request_timeout: Duration,
}

impl OpenAIProvider {
    pub fn new(kind: Provider) -> Self {
        Self {
            kind,
            api_key: Arc::new(RwLock::new(None)),
            client: Client::new(),
            base_url: kind.default_base_url().to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_key(kind: Provider, api_key: String) -> Self {
        let provider = Self::new(kind);
        provider.set_api_key(api_key);
        provider
    }

    pub fn from_config(config: &LLMConfig, api_key: Option<String>) -> Self {
        let mut provider = Self::new(config.provider);
        provider.base_url = config.endpoint().trim_end_matches('/').to_string();
        provider.request_timeout = config.timeout();
        if let Some(key) = api_key {
            provider.set_api_key(key);
        }
        provider
    }

    pub fn set_api_key(&self, key: String) {
        *self.api_key.write() = Some(key);
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_api_key(&self) -> Result<String> {
        self.api_key
            .read()
            .as_ref()
            .filter(|key| is_usable_key(key))
            .cloned()
            .ok_or_else(|| LLMError::MissingApiKey(self.kind.as_str().to_string()))
    }

    fn build_body(&self, request: &ChatRequest) -> Value {
        let model = request
            .model
            .as_ref()
            .map(|m| {
                let sanitized: String = m
                    .chars()
                    .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_' || *c == '.')
                    .take(100)
                    .collect();
                if sanitized.is_empty() {
                    self.kind.default_model().to_string()
                } else {
                    sanitized
                }
            })
            .unwrap_or_else(|| self.kind.default_model().to_string());

        let mut body = json!({
            "model": model,
            "messages": request.messages.iter().map(|m| {
                json!({
                    "role": m.role.as_str(),
                    "content": m.content
                })
            }).collect::<Vec<_>>(),
            "temperature": request.temperature.unwrap_or(0.2).clamp(0.0, 2.0),
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens.min(4096));
        }
        if let Some(format) = request.response_format {
            body["response_format"] = json!(format);
        }
        body
    }
}

/// A key is usable when it is non-blank and not the sample placeholder
pub fn is_usable_key(key: &str) -> bool {
    let key = key.trim();
    !key.is_empty() && key != PLACEHOLDER_API_KEY
}

/// Pull the first choice out of a chat completion payload
pub fn parse_chat_response(json: &Value, requested_model: &str) -> Result<ChatResponse> {
    let choices = json.get("choices").and_then(|c| c.as_array()).ok_or_else(|| {
        LLMError::InvalidResponse("Invalid response format: no choices array".to_string())
    })?;

    let choice = choices
        .first()
        .and_then(|c| c.as_object())
        .ok_or_else(|| LLMError::InvalidResponse("No choices in response".to_string()))?;

    let content = choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| LLMError::InvalidResponse("Choice has no message content".to_string()))?
        .to_string();

    let usage = json.get("usage").and_then(|u| {
        Some(Usage {
            prompt_tokens: u["prompt_tokens"].as_u64()? as u32,
            completion_tokens: u["completion_tokens"].as_u64()? as u32,
            total_tokens: u["total_tokens"].as_u64()? as u32,
        })
    });

    Ok(ChatResponse {
        content,
        model: json["model"].as_str().unwrap_or(requested_model).to_string(),
        usage,
        finish_reason: choice
            .get("finish_reason")
            .and_then(|f| f.as_str())
            .map(|s| s.to_string()),
    })
}

#[async_trait]
impl ProviderTrait for OpenAIProvider {
    fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    fn has_api_key(&self) -> bool {
        self.api_key.read().as_deref().map(is_usable_key).unwrap_or(false)
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let api_key = self.get_api_key()?;
        let body = self.build_body(&request);
        let model = body["model"].as_str().unwrap_or_default().to_string();

        if !self.base_url.starts_with("https://") && !self.base_url.starts_with("http://") {
            return Err(LLMError::Config(format!("Invalid base URL: {}", self.base_url)));
        }

        // Never log the full key
        let api_key_prefix: String = api_key.chars().take(8).collect();
        tracing::debug!("Requesting {} completion ({}) with key {}...", self.name(), model, api_key_prefix);

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status == 429 {
            return Err(LLMError::RateLimit);
        }

        if status == 401 || status == 403 {
            return Err(LLMError::AuthenticationFailed);
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let text: String = text.chars().take(MAX_ERROR_BODY).collect();
            return Err(LLMError::InvalidResponse(format!("HTTP {}: {}", status, text)));
        }

        let json: Value = response.json().await?;
        parse_chat_response(&json, &model)
    }
}
