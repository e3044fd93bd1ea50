//! Completion backend: the one seam between the workflows and a model.
//!
//! The editing and Q&A workflows only need "send a system and a user
//! message, get text back". [`CompletionBackend`] is that contract;
//! [`ProviderBackend`] implements it over an `edgequake_llm` provider and
//! owns everything network-shaped: provider resolution, retries and the
//! per-call timeout. Tests substitute an in-memory backend.
//!
//! ## Retry Strategy
//!
//! Provider errors and timeouts are retried with exponential backoff
//! (`retry_backoff_ms * 2^(attempt-1)`): with 500 ms base and 3 retries the
//! waits are 500 ms → 1 s → 2 s.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

use crate::config::{AssistantConfig, DEFAULT_MODEL};
use crate::error::LlmError;

/// A system message plus a user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// Provider message list: system first, then user.
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        vec![ChatMessage::system(&self.system), ChatMessage::user(&self.user)]
    }
}

/// Anything that can answer a [`Prompt`] with text.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError>;
}

#[async_trait]
impl<T: CompletionBackend + ?Sized> CompletionBackend for Arc<T> {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        (**self).complete(prompt).await
    }
}

/// [`CompletionBackend`] over an `edgequake_llm` provider.
pub struct ProviderBackend {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
    call_timeout: Option<Duration>,
}

impl std::fmt::Debug for ProviderBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderBackend")
            .field("provider", &"<dyn LLMProvider>")
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl ProviderBackend {
    /// Wrap a provider with the retry and timeout policy from `config`.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &AssistantConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            call_timeout: config.api_timeout(),
        }
    }

    /// Resolve the provider described by `config` and wrap it.
    pub fn from_config(config: &AssistantConfig) -> Result<Self, LlmError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }
}

#[async_trait]
impl CompletionBackend for ProviderBackend {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let messages = prompt.to_messages();
        let start = Instant::now();
        let mut last_err: Option<LlmError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "LLM retry {}/{} after {}ms",
                    attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            let call = self.provider.chat(&messages, Some(&self.options));
            let result = match self.call_timeout {
                Some(limit) => match timeout(limit, call).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!("LLM attempt {} timed out after {:?}", attempt + 1, limit);
                        last_err = Some(LlmError::Timeout {
                            secs: limit.as_secs(),
                        });
                        continue;
                    }
                },
                None => call.await,
            };

            match result {
                Ok(response) => {
                    debug!(
                        "LLM call: {} input tokens, {} output tokens, {:?}",
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(response.content);
                }
                Err(e) => {
                    let detail = e.to_string();
                    warn!("LLM attempt {} failed: {}", attempt + 1, detail);
                    last_err = Some(LlmError::Failed {
                        retries: self.max_retries,
                        detail,
                    });
                }
            }
        }

        Err(last_err.unwrap_or_else(|| LlmError::Failed {
            retries: self.max_retries,
            detail: "Unknown error".to_string(),
        }))
    }
}

/// Build `CompletionOptions` from the assistant config.
fn build_options(config: &AssistantConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, LlmError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        LlmError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. the pre-built `config.provider`;
/// 2. `config.provider_name` with `config.model`;
/// 3. the `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` pair;
/// 4. OpenAI when `OPENAI_API_KEY` is set;
/// 5. `ProviderFactory::from_env` auto-detection.
pub fn resolve_provider(config: &AssistantConfig) -> Result<Arc<dyn LLMProvider>, LlmError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| LlmError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {e}"
            ),
        })?;

    Ok(llm_provider)
}
