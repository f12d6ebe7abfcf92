//! The inference capability boundary.
//!
//! The pipeline never talks to a concrete LLM SDK directly — it depends on
//! the minimal [`InferenceClient`] trait (one multimodal completion method),
//! and the production implementation [`EdgequakeInference`] delegates to an
//! `edgequake_llm` provider. Tests substitute scripted clients, which is how
//! properties like "the composer never calls the model for zero zones" are
//! asserted without network access.

use crate::config::AnalysisConfig;
use crate::error::AnalyzeError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default model when neither config nor environment names one.
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// A completed inference call.
#[derive(Debug, Clone)]
pub struct InferenceReply {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Failure of a single inference call. Callers decide whether it is fatal
/// (vision) or degradable (research, proposal).
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference API error: {0}")]
    Api(String),
    #[error("inference call timed out after {0}s")]
    Timeout(u64),
}

/// The capability the pipeline requires from the external model:
/// `complete(messages with optional image) -> text`.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<InferenceReply, InferenceError>;
}

/// Production client backed by an `edgequake_llm` provider.
pub struct EdgequakeInference {
    provider: Arc<dyn LLMProvider>,
}

impl EdgequakeInference {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl InferenceClient for EdgequakeInference {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<InferenceReply, InferenceError> {
        let response = self
            .provider
            .chat(messages, Some(options))
            .await
            .map_err(|e| InferenceError::Api(e.to_string()))?;

        debug!(
            "inference call: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );

        Ok(InferenceReply {
            text: response.content,
            input_tokens: response.prompt_tokens as u64,
            output_tokens: response.completion_tokens as u64,
        })
    }
}

/// Run a completion under its own deadline.
///
/// Every inference call in the pipeline goes through here: the deadline is
/// always strictly below the platform execution ceiling so a graceful
/// timeout error can be returned before an ungraceful platform kill.
pub async fn complete_with_deadline(
    client: &Arc<dyn InferenceClient>,
    messages: &[ChatMessage],
    options: &CompletionOptions,
    deadline_secs: u64,
) -> Result<InferenceReply, InferenceError> {
    match tokio::time::timeout(
        Duration::from_secs(deadline_secs),
        client.complete(messages, options),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(InferenceError::Timeout(deadline_secs)),
    }
}

/// Resolve the inference client, from most-specific to least-specific.
///
/// 1. **Pre-built client** (`config.inference`) — used as-is; this is how
///    tests inject mocks and how callers add middleware.
/// 2. **Named provider** (`config.provider_name`) + optional model — the
///    factory reads the matching API key from the environment.
/// 3. **Environment pair** (`ADSCOPE_PROVIDER` + `ADSCOPE_MODEL`) — a
///    deployment-level choice honoured even when multiple keys are present.
/// 4. **OpenAI key, then full auto-detection** — `OPENAI_API_KEY` wins when
///    several provider keys exist; otherwise `ProviderFactory::from_env`
///    scans all known key variables.
pub fn resolve_inference(config: &AnalysisConfig) -> Result<Arc<dyn InferenceClient>, AnalyzeError> {
    if let Some(ref client) = config.inference {
        return Ok(Arc::clone(client));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_client(name, model);
    }

    if let (Ok(provider), Ok(model)) = (
        std::env::var("ADSCOPE_PROVIDER"),
        std::env::var("ADSCOPE_MODEL"),
    ) {
        if !provider.is_empty() && !model.is_empty() {
            return create_vision_client(&provider, &model);
        }
    }

    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        if !key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_client("openai", model);
        }
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| AnalyzeError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No inference provider could be auto-detected from the environment.\n\
                 Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                 Error: {e}"
            ),
        })?;

    Ok(Arc::new(EdgequakeInference::new(provider)))
}

/// Instantiate a named vision provider with the given model.
fn create_vision_client(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn InferenceClient>, AnalyzeError> {
    let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        AnalyzeError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    Ok(Arc::new(EdgequakeInference::new(provider)))
}
