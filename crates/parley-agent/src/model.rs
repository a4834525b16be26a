//! Model gateway: one message sequence in, one assistant message out.

use std::time::Duration;

use async_trait::async_trait;
use parley_ai::{Context, Message, Model, Result, providers::OpenAIProvider};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Calculate delay for a given attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }
}

/// Interface to the completion service.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Complete the conversation with exactly one assistant message.
    async fn invoke(&self, messages: &[Message]) -> Result<Message>;
}

/// Model gateway backed by an OpenAI-compatible chat-completions provider.
///
/// Advertises the registered tool to the model and retries transient
/// failures with exponential backoff.
pub struct ProviderGateway {
    provider: OpenAIProvider,
    model: Model,
    tools: Vec<parley_ai::Tool>,
    retry_config: RetryConfig,
}

impl ProviderGateway {
    /// Create a gateway for `model`
    pub fn new(provider: OpenAIProvider, model: Model) -> Self {
        Self {
            provider,
            model,
            tools: vec![],
            retry_config: RetryConfig::default(),
        }
    }

    /// Advertise a tool to the model
    pub fn with_tool(mut self, tool: parley_ai::Tool) -> Self {
        self.tools.push(tool);
        self
    }

    /// Set retry configuration
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// The model this gateway talks to
    pub fn model(&self) -> &Model {
        &self.model
    }
}

#[async_trait]
impl ModelGateway for ProviderGateway {
    async fn invoke(&self, messages: &[Message]) -> Result<Message> {
        let context = Context {
            messages: messages.to_vec(),
            tools: self.tools.clone(),
        };
        let (provider, model, context) = (&self.provider, &self.model, &context);
        retry(&self.retry_config, move || provider.complete(model, context)).await
    }
}

/// Run `op`, retrying retryable errors according to `config`.
pub async fn retry<T, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                let delay = config.delay_for_attempt(attempt);
                tracing::warn!(
                    "Request failed (attempt {}/{}): {}. Retrying in {:?}...",
                    attempt + 1,
                    config.max_retries + 1,
                    e,
                    delay
                );
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_retries(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn test_delay_backoff_is_capped() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(8));
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = retry(&fast_retries(3), || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::Relaxed) < 2 {
                    Err(parley_ai::Error::RateLimited { retry_after: None })
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<()> = retry(&fast_retries(2), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::Relaxed);
                Err(parley_ai::Error::Sse("reset".into()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_retry_skips_non_retryable_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<()> = retry(&fast_retries(5), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::Relaxed);
                Err(parley_ai::Error::InvalidApiKey)
            }
        })
        .await;

        assert!(matches!(result, Err(parley_ai::Error::InvalidApiKey)));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }
}
