//! Configuration for the assistant workflows.
//!
//! Every ceiling and LLM knob lives in [`AssistantConfig`], built via
//! [`AssistantConfigBuilder`]. The pipeline components never read the
//! environment; they receive the numbers they need from here.
//!
//! # Ceilings
//!
//! | Field | Default | Used by |
//! |-------|---------|---------|
//! | `structural_text_limit` | 10 000 chars | template editing prompt |
//! | `qa_text_limit` | 15 000 chars | document Q&A prompt |
//! | `inline_reply_limit` | 4 096 chars | inline vs. attachment delivery |
//! | `cache_capacity` | 256 replies | oversized-reply cache |
//! | `cache_ttl_secs` | 3 600 s | oversized-reply cache |

use crate::error::DocforgeError;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Model used when neither the caller nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Configuration shared by the editing, Q&A and delivery workflows.
///
/// Built via [`AssistantConfig::builder()`] or [`AssistantConfig::default()`].
///
/// # Example
/// ```rust
/// use docforge::AssistantConfig;
///
/// let config = AssistantConfig::builder()
///     .structural_text_limit(8_000)
///     .inline_reply_limit(4_096)
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// assert_eq!(config.structural_text_limit, 8_000);
/// ```
#[derive(Clone)]
pub struct AssistantConfig {
    /// Maximum characters of structural text embedded in an edit prompt. Default: 10 000.
    ///
    /// Longer documents are cut and marked; the model still sees the start
    /// of the document, which is where template fields usually live.
    pub structural_text_limit: usize,

    /// Maximum characters of document text embedded in a Q&A prompt. Default: 15 000.
    pub qa_text_limit: usize,

    /// Longest reply sent inline; longer replies become attachments. Default: 4 096.
    pub inline_reply_limit: usize,

    /// Number of oversized replies kept for later export. Default: 256.
    pub cache_capacity: usize,

    /// Seconds an oversized reply stays exportable. Default: 3 600.
    pub cache_ttl_secs: u64,

    /// LLM model identifier. If None, uses [`DEFAULT_MODEL`] or the environment.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Replacement mappings must quote the document exactly; a low
    /// temperature keeps the model from paraphrasing the keys.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 4096.
    pub max_tokens: usize,

    /// Retry attempts on a failed LLM call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds; 0 disables it. Default: 60.
    pub api_timeout_secs: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            structural_text_limit: 10_000,
            qa_text_limit: 15_000,
            inline_reply_limit: 4_096,
            cache_capacity: 256,
            cache_ttl_secs: 3_600,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
        }
    }
}

impl fmt::Debug for AssistantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssistantConfig")
            .field("structural_text_limit", &self.structural_text_limit)
            .field("qa_text_limit", &self.qa_text_limit)
            .field("inline_reply_limit", &self.inline_reply_limit)
            .field("cache_capacity", &self.cache_capacity)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl AssistantConfig {
    /// Create a new builder for `AssistantConfig`.
    pub fn builder() -> AssistantConfigBuilder {
        AssistantConfigBuilder {
            config: Self::default(),
        }
    }

    /// Per-call timeout, if enabled.
    pub fn api_timeout(&self) -> Option<Duration> {
        (self.api_timeout_secs > 0).then(|| Duration::from_secs(self.api_timeout_secs))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Builder for [`AssistantConfig`].
#[derive(Debug)]
pub struct AssistantConfigBuilder {
    config: AssistantConfig,
}

impl AssistantConfigBuilder {
    pub fn structural_text_limit(mut self, chars: usize) -> Self {
        self.config.structural_text_limit = chars;
        self
    }

    pub fn qa_text_limit(mut self, chars: usize) -> Self {
        self.config.qa_text_limit = chars;
        self
    }

    pub fn inline_reply_limit(mut self, chars: usize) -> Self {
        self.config.inline_reply_limit = chars.max(1);
        self
    }

    pub fn cache_capacity(mut self, n: usize) -> Self {
        self.config.cache_capacity = n.max(1);
        self
    }

    pub fn cache_ttl_secs(mut self, secs: u64) -> Self {
        self.config.cache_ttl_secs = secs;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AssistantConfig, DocforgeError> {
        let c = &self.config;
        if c.structural_text_limit == 0 {
            return Err(DocforgeError::InvalidConfig(
                "structural text limit must be ≥ 1 character".into(),
            ));
        }
        if c.qa_text_limit == 0 {
            return Err(DocforgeError::InvalidConfig(
                "Q&A text limit must be ≥ 1 character".into(),
            ));
        }
        if c.cache_ttl_secs == 0 {
            return Err(DocforgeError::InvalidConfig(
                "cache TTL must be ≥ 1 second".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(DocforgeError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
