#[cfg(test)]
mod enricher_tests {
    use crate::config::*;
    use crate::enricher::*;
    use crate::error::{LLMError, Result};
    use crate::providers::ProviderTrait;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use visionguard_core::Severity;

    enum Reply {
        Content(&'static str),
        Fail,
        Hang,
    }

    struct MockProvider {
        reply: Reply,
        keyed: bool,
        calls: AtomicUsize,
        last_request: Mutex<Option<ChatRequest>>,
    }

    impl MockProvider {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                keyed: true,
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            })
        }

        fn unkeyed() -> Arc<Self> {
            Arc::new(Self {
                reply: Reply::Fail,
                keyed: false,
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl ProviderTrait for MockProvider {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn has_api_key(&self) -> bool {
            self.keyed
        }

        async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock() = Some(request);
            match self.reply {
                Reply::Content(content) => Ok(ChatResponse {
                    content: content.to_string(),
                    model: "mock".to_string(),
                    usage: None,
                    finish_reason: Some("stop".to_string()),
                }),
                Reply::Fail => Err(LLMError::RateLimit),
                Reply::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(LLMError::Provider("unreachable".to_string()))
                }
            }
        }
    }

    fn enricher(provider: Arc<MockProvider>) -> AlertEnricher {
        AlertEnricher::new(provider, LLMConfig::default())
    }

    fn at() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_fallback_table() {
        assert_eq!(fallback_mapping("Weapon Threat", Severity::Critical).authority, "Armed Police");
        assert_eq!(fallback_mapping("fall", Severity::High).authority, "Medical Response");
        assert_eq!(fallback_mapping("Campus Intrusion", Severity::High).authority, "Campus Security");
        assert_eq!(fallback_mapping("Smoke", Severity::High).authority, "Fire Department");
        assert_eq!(fallback_mapping("Accident", Severity::Critical).authority, "Police & EMT");
        assert_eq!(fallback_mapping("High-Risk Fall", Severity::High).authority, "Medical Response");
    }

    #[test]
    fn test_fallback_first_match_wins() {
        // "fire" precedes "fall" in the table
        assert_eq!(fallback_mapping("Fire after fall", Severity::High).authority, "Fire Department");
    }

    #[test]
    fn test_fallback_message() {
        let result = fallback_mapping("Fire", Severity::Critical);
        assert_eq!(
            result.message,
            "[CRITICAL] Automatically generated alert: Fire detected. Please dispatch Fire Department."
        );
    }

    #[test]
    fn test_parse_enrichment_fields_and_defaults() {
        let full = parse_enrichment(
            r#"{"mapped_authority":"Fire Department","alert_message":"Evacuate building B"}"#,
            "Fire",
            Severity::Critical,
        )
        .unwrap();
        assert_eq!(full.authority, "Fire Department");
        assert_eq!(full.message, "Evacuate building B");

        let partial = parse_enrichment(r#"{"mapped_authority":"  "}"#, "Smoke", Severity::High).unwrap();
        assert_eq!(partial.authority, DEFAULT_AUTHORITY);
        assert_eq!(partial.message, "HIGH Alert: Smoke detected.");

        assert!(parse_enrichment("not json", "Smoke", Severity::High).is_err());
        assert!(parse_enrichment("[1,2]", "Smoke", Severity::High).is_err());
    }

    #[test]
    fn test_prompt_mentions_event() {
        let prompt = build_prompt("Weapon Threat", Severity::Critical, at());
        assert!(prompt.contains("- Type: Weapon Threat"));
        assert!(prompt.contains("- Severity: Critical"));
        assert!(prompt.contains("2024-05-01T12:30:00.000Z"));
        assert!(prompt.contains("\"mapped_authority\""));
    }

    #[tokio::test]
    async fn test_backend_reply_used() {
        let provider = MockProvider::new(Reply::Content(
            r#"{"mapped_authority":"Hazmat Team","alert_message":"Smoke on floor 3"}"#,
        ));
        let result = enricher(provider.clone()).enrich("Smoke", Severity::High, at()).await;
        assert_eq!(result.authority, "Hazmat Team");
        assert_eq!(result.message, "Smoke on floor 3");

        let request = provider.last_request.lock().clone().unwrap();
        assert_eq!(request.response_format, Some(ResponseFormat::JsonObject));
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.model.as_deref(), Some("llama3-8b-8192"));
    }

    #[tokio::test]
    async fn test_no_key_skips_network() {
        let provider = MockProvider::unkeyed();
        let result = enricher(provider.clone()).enrich("Fire", Severity::Critical, at()).await;
        assert_eq!(result, fallback_mapping("Fire", Severity::Critical));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_offline_enricher_uses_fallback() {
        let enricher = AlertEnricher::offline();
        assert!(!enricher.is_online());
        let result = enricher.enrich("Weapon Threat", Severity::Critical, at()).await;
        assert_eq!(result.authority, "Armed Police");
    }

    #[tokio::test]
    async fn test_placeholder_key_uses_fallback() {
        let enricher = AlertEnricher::from_config(
            LLMConfig::default(),
            Some(crate::providers::openai::PLACEHOLDER_API_KEY.to_string()),
        );
        assert!(!enricher.is_online());
        let result = enricher.enrich("Accident", Severity::Critical, at()).await;
        assert_eq!(result.authority, "Police & EMT");
    }

    #[tokio::test]
    async fn test_provider_error_uses_fallback() {
        let provider = MockProvider::new(Reply::Fail);
        let result = enricher(provider.clone()).enrich("fall", Severity::High, at()).await;
        assert_eq!(result, fallback_mapping("fall", Severity::High));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_garbage_reply_uses_fallback() {
        let provider = MockProvider::new(Reply::Content("Sure! Call the fire department."));
        let result = enricher(provider).enrich("Fire", Severity::Critical, at()).await;
        assert_eq!(result.authority, "Fire Department");
        assert!(result.message.starts_with("[CRITICAL]"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_uses_fallback() {
        let provider = MockProvider::new(Reply::Hang);
        let config = LLMConfig {
            timeout_secs: 2.0,
            ..LLMConfig::default()
        };
        let enricher = AlertEnricher::new(provider, config);
        let started = tokio::time::Instant::now();
        let result = enricher.enrich("Smoke", Severity::High, at()).await;
        assert_eq!(result, fallback_mapping("Smoke", Severity::High));
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
