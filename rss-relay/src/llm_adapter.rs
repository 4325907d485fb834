use crate::types::{RelayError, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Trait for chat-completion backends that turn a prompt into one answer
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    /// Provider name, e.g. "openrouter"
    fn adapter_name(&self) -> String;

    /// Model identifier sent to the provider
    fn model(&self) -> String;

    /// Send one user message and return the first choice's content
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Short label for logs: "openrouter/llama-3.3-70b-instruct:free"
    fn label(&self) -> String {
        let model = self.model();
        let short = model.rsplit('/').next().unwrap_or(&model).to_string();
        format!("{}/{}", self.adapter_name(), short)
    }
}

/// Hosted providers that speak the OpenAI chat-completions protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenRouter,
    Groq,
    Mistral,
    Cohere,
    Gemini,
    HuggingFace,
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::Groq => "groq",
            ProviderKind::Mistral => "mistral",
            ProviderKind::Cohere => "cohere",
            ProviderKind::Gemini => "gemini",
            ProviderKind::HuggingFace => "huggingface",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            ProviderKind::OpenRouter => "https://openrouter.ai/api/v1/chat/completions",
            ProviderKind::Groq => "https://api.groq.com/openai/v1/chat/completions",
            ProviderKind::Mistral => "https://api.mistral.ai/v1/chat/completions",
            ProviderKind::Cohere => "https://api.cohere.ai/compatibility/v1/chat/completions",
            ProviderKind::Gemini => {
                "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
            }
            ProviderKind::HuggingFace => "https://router.huggingface.co/v1/chat/completions",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

const TEMPERATURE: f32 = 0.3;

/// One (provider, model) pair reachable over an OpenAI-compatible endpoint.
pub struct ChatCompletionAdapter {
    client: Client,
    kind: ProviderKind,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ChatCompletionAdapter {
    pub fn new(client: Client, kind: ProviderKind, api_key: &str, model: &str) -> Self {
        Self {
            client,
            kind,
            endpoint: kind.default_endpoint().to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    fn provider_error(&self, status: u16, message: impl Into<String>) -> RelayError {
        RelayError::Provider {
            provider: self.label(),
            status,
            message: message.into(),
        }
    }
}

#[async_trait]
impl LlmAdapter for ChatCompletionAdapter {
    fn adapter_name(&self) -> String {
        self.kind.name().to_string()
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message: String = body.chars().take(200).collect();
            return Err(self.provider_error(status.as_u16(), message));
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| self.provider_error(status.as_u16(), "empty completion"))
    }
}

/// Ordered roster of adapters the summarizer may try
#[derive(Clone, Default)]
pub struct LlmAdapterRegistry {
    adapters: Vec<Arc<dyn LlmAdapter>>,
}

impl LlmAdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new LLM adapter at the end of the roster
    pub fn register_adapter(&mut self, adapter: Arc<dyn LlmAdapter>) {
        debug!("Registering LLM adapter: {}", adapter.label());
        self.adapters.push(adapter);
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Adapters in registration order
    pub fn ordered(&self) -> Vec<Arc<dyn LlmAdapter>> {
        self.adapters.clone()
    }

    /// Adapters in a fresh random order
    pub fn shuffled(&self) -> Vec<Arc<dyn LlmAdapter>> {
        let mut adapters = self.adapters.clone();
        adapters.shuffle(&mut rand::rng());
        adapters
    }

    /// List all registered adapters
    pub fn list_adapters(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.label()).collect()
    }
}

/// Builder for assembling the provider roster
pub struct LlmAdapterBuilder {
    client: Client,
    registry: LlmAdapterRegistry,
}

impl LlmAdapterBuilder {
    pub fn new(timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            registry: LlmAdapterRegistry::new(),
        })
    }

    /// Add one adapter per model for a provider; no key means the provider is left out.
    pub fn add_provider(mut self, kind: ProviderKind, api_key: Option<&str>, models: &[String]) -> Self {
        let Some(api_key) = api_key.filter(|k| !k.trim().is_empty()) else {
            debug!("No API key for {}, provider disabled", kind);
            return self;
        };

        for model in models.iter().filter(|m| !m.trim().is_empty()) {
            let adapter = ChatCompletionAdapter::new(self.client.clone(), kind, api_key, model.trim());
            self.registry.register_adapter(Arc::new(adapter));
        }
        self
    }

    pub fn build(self) -> LlmAdapterRegistry {
        info!("LLM roster: {:?}", self.registry.list_adapters());
        self.registry
    }
}
