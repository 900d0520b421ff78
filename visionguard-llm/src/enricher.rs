//! Hazard alert enrichment
//!
//! Asks the chat backend which authority should be dispatched for a hazard
//! and for a short alert message. Every failure mode (no key, placeholder
//! key, transport error, timeout, unparseable reply) degrades to a static
//! keyword table, so `enrich` always yields a complete result.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use visionguard_core::{EnrichmentResult, Severity};

use crate::config::{ChatRequest, LLMConfig, Message, ResponseFormat};
use crate::error::{LLMError, Result};
use crate::providers::{OpenAIProvider, ProviderTrait};

/// Authority used when the backend omits one
pub const DEFAULT_AUTHORITY: &str = "General Security";

/// Authority used when no fallback keyword matches
pub const FALLBACK_AUTHORITY: &str = "Campus Security";

/// Keyword table, first substring match wins
const AUTHORITY_KEYWORDS: &[(&str, &str)] = &[
    ("fire", "Fire Department"),
    ("smoke", "Fire Department"),
    ("accident", "Police & EMT"),
    ("weapon", "Armed Police"),
    ("fall", "Medical Response"),
];

pub struct AlertEnricher {
    provider: Option<Arc<dyn ProviderTrait>>,
    config: LLMConfig,
}

impl AlertEnricher {
    pub fn new(provider: Arc<dyn ProviderTrait>, config: LLMConfig) -> Self {
        Self {
            provider: Some(provider),
            config,
        }
    }

    /// Enricher that never leaves the process
    pub fn offline() -> Self {
        Self {
            provider: None,
            config: LLMConfig::default(),
        }
    }

    /// Build the OpenAI-compatible provider named in `config`
    pub fn from_config(config: LLMConfig, api_key: Option<String>) -> Self {
        let provider = OpenAIProvider::from_config(&config, api_key);
        Self::new(Arc::new(provider), config)
    }

    /// Whether enrich calls will reach the backend
    pub fn is_online(&self) -> bool {
        self.provider.as_ref().map(|p| p.has_api_key()).unwrap_or(false)
    }

    /// Authority and message for one hazard. Never fails.
    pub async fn enrich(&self, kind: &str, severity: Severity, timestamp: DateTime<Utc>) -> EnrichmentResult {
        let provider = match &self.provider {
            Some(provider) if provider.has_api_key() => provider,
            _ => {
                debug!("No enrichment credentials, using fallback mapping for {}", kind);
                return fallback_mapping(kind, severity);
            }
        };

        match self.request(provider.as_ref(), kind, severity, timestamp).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Alert enrichment via {} failed: {}", provider.name(), e);
                fallback_mapping(kind, severity)
            }
        }
    }

    async fn request(
        &self,
        provider: &dyn ProviderTrait,
        kind: &str,
        severity: Severity,
        timestamp: DateTime<Utc>,
    ) -> Result<EnrichmentResult> {
        let request = ChatRequest {
            messages: vec![Message::user(build_prompt(kind, severity, timestamp))],
            model: Some(self.config.model_name()),
            temperature: Some(self.config.temperature),
            max_tokens: self.config.max_tokens,
            response_format: Some(ResponseFormat::JsonObject),
        };

        let timeout = self.config.timeout();
        let response = tokio::time::timeout(timeout, provider.chat(request))
            .await
            .map_err(|_| LLMError::Timeout(timeout))??;

        parse_enrichment(&response.content, kind, severity)
    }
}

pub fn build_prompt(kind: &str, severity: Severity, timestamp: DateTime<Utc>) -> String {
    format!(
        "You are an intelligent emergency response mapping system.\n\
         A hazard has been detected:\n\
         - Type: {}\n\
         - Severity: {}\n\
         - Time: {}\n\
         \n\
         Which emergency authority should be immediately notified?\n\
         Respond ONLY with a valid JSON object in this exact format:\n\
         {{\"mapped_authority\": \"authority name\", \"alert_message\": \"A concise, structured urgent alert message\"}}\n",
        kind,
        severity,
        timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

/// Read `mapped_authority` and `alert_message` from the completion text.
/// Missing or blank fields get defaults; anything but a JSON object is an error.
pub fn parse_enrichment(content: &str, kind: &str, severity: Severity) -> Result<EnrichmentResult> {
    let value: Value = serde_json::from_str(content.trim())?;
    let object = value
        .as_object()
        .ok_or_else(|| LLMError::InvalidResponse("Enrichment reply is not a JSON object".to_string()))?;

    let field = |name: &str| {
        object
            .get(name)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    Ok(EnrichmentResult {
        authority: field("mapped_authority").unwrap_or_else(|| DEFAULT_AUTHORITY.to_string()),
        message: field("alert_message")
            .unwrap_or_else(|| format!("{} Alert: {} detected.", severity.as_str().to_uppercase(), kind)),
    })
}

/// Static authority table used whenever the backend is unavailable
pub fn fallback_mapping(kind: &str, severity: Severity) -> EnrichmentResult {
    let lowered = kind.to_lowercase();
    let authority = AUTHORITY_KEYWORDS
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, authority)| *authority)
        .unwrap_or(FALLBACK_AUTHORITY);

    EnrichmentResult {
        authority: authority.to_string(),
        message: format!(
            "[{}] Automatically generated alert: {} detected. Please dispatch {}.",
            severity.as_str().to_uppercase(),
            kind,
            authority
        ),
    }
}
