use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use pagesift_config::LlmConfig;

use crate::{Oracle, OracleError, WithRetry};

const OPENROUTER_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Provider {
    Ollama,
    OpenRouter,
}

impl Provider {
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("ollama") {
            Some(Self::Ollama)
        } else if name.eq_ignore_ascii_case("openrouter") {
            Some(Self::OpenRouter)
        } else {
            None
        }
    }
}

fn build_http(timeout: Duration) -> Result<reqwest::Client, OracleError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| OracleError::Configuration(err.to_string()))
}

/// Ollama `/api/generate` with streaming disabled.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        Ok(Self {
            client: build_http(timeout)?,
            endpoint: format!("{}/api/generate", base_url.trim_end_matches('/')),
            model: model.into(),
            timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Oracle for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        let payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false
        });

        debug!(model = %self.model, prompt_len = prompt.len(), "ollama generate");
        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|err| OracleError::from_reqwest(err, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|err| OracleError::from_reqwest(err, self.timeout))?;

        body.get("response")
            .and_then(|value| value.as_str())
            .map(ToString::to_string)
            .ok_or_else(|| OracleError::MalformedResponse(body.to_string()))
    }
}

/// OpenRouter chat completions with a single user message.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenRouterClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(OracleError::Configuration(
                "OpenRouter key missing. Set OPENROUTER_API_KEY or switch provider to ollama."
                    .to_string(),
            ));
        }
        Ok(Self {
            client: build_http(timeout)?,
            api_key,
            model: model.into(),
            timeout,
        })
    }
}

#[async_trait]
impl Oracle for OpenRouterClient {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt}
            ]
        });

        debug!(model = %self.model, prompt_len = prompt.len(), "openrouter completion");
        let response = self
            .client
            .post(OPENROUTER_ENDPOINT)
            .bearer_auth(&self.api_key)
            .header("X-Title", "pagesift")
            .json(&payload)
            .send()
            .await
            .map_err(|err| OracleError::from_reqwest(err, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|err| OracleError::from_reqwest(err, self.timeout))?;

        body.get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .map(ToString::to_string)
            .ok_or_else(|| OracleError::MalformedResponse(body.to_string()))
    }
}

#[derive(Debug, Clone)]
enum Backend {
    Ollama(OllamaClient),
    OpenRouter(OpenRouterClient),
}

/// The oracle selected by `[llm]` configuration, wrapped in the configured
/// retry policy.
#[derive(Debug, Clone)]
pub struct LlmRouter {
    provider: Provider,
    backend: WithRetry<Backend>,
}

impl LlmRouter {
    pub fn from_config(config: &LlmConfig) -> Result<Self, OracleError> {
        let provider = Provider::from_name(&config.provider).ok_or_else(|| {
            OracleError::Configuration(format!("unknown provider '{}'", config.provider))
        })?;
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let backend = match provider {
            Provider::Ollama => Backend::Ollama(OllamaClient::new(
                &config.ollama_base_url,
                &config.ollama_model,
                timeout,
            )?),
            Provider::OpenRouter => Backend::OpenRouter(OpenRouterClient::new(
                &config.openrouter_api_key,
                &config.openrouter_model,
                timeout,
            )?),
        };
        Ok(Self {
            provider,
            backend: WithRetry::new(
                backend,
                config.max_retries,
                Duration::from_millis(config.retry_backoff_ms),
            ),
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }
}

#[async_trait]
impl Oracle for Backend {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        match self {
            Self::Ollama(client) => client.complete(prompt).await,
            Self::OpenRouter(client) => client.complete(prompt).await,
        }
    }
}

#[async_trait]
impl Oracle for LlmRouter {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        self.backend.complete(prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_from_name_is_case_insensitive() {
        assert_eq!(Provider::from_name("Ollama"), Some(Provider::Ollama));
        assert_eq!(Provider::from_name("OPENROUTER"), Some(Provider::OpenRouter));
        assert_eq!(Provider::from_name("bard"), None);
    }

    #[test]
    fn provider_serde_roundtrip() {
        for provider in [Provider::Ollama, Provider::OpenRouter] {
            let json = serde_json::to_string(&provider).unwrap();
            let back: Provider = serde_json::from_str(&json).unwrap();
            assert_eq!(back, provider);
        }
    }

    #[test]
    fn ollama_endpoint_trims_trailing_slash() {
        let client =
            OllamaClient::new("http://ollama:11434/", "llama3.2:1b", Duration::from_secs(5))
                .unwrap();
        assert_eq!(client.endpoint, "http://ollama:11434/api/generate");
        assert_eq!(client.model(), "llama3.2:1b");
    }

    #[test]
    fn router_from_default_config_uses_ollama() {
        let router = LlmRouter::from_config(&LlmConfig::default()).unwrap();
        assert_eq!(router.provider(), Provider::Ollama);
    }

    #[test]
    fn router_requires_openrouter_key() {
        let config = LlmConfig {
            provider: "openrouter".to_string(),
            ..LlmConfig::default()
        };
        assert!(matches!(
            LlmRouter::from_config(&config),
            Err(OracleError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_ollama_is_a_communication_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let client =
            OllamaClient::new("http://127.0.0.1:9", "m", Duration::from_secs(2)).unwrap();
        let err = client.complete("hi").await.unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err:?}");
    }
}
