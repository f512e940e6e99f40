//! Text-generation service client
//!
//! [`TextGenerator`] is the narrow contract with the external service: submit
//! a chat-style prompt, receive one completion, or a classified fault.
//! [`GenerationClient`] sits on top of it and owns the recipe prompt, the
//! per-call deadline and the retry policy.
//!
//! # API Reference
//! - Endpoint: `POST {base_url}/chat/completions` (OpenAI-compatible)

use axum::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{RecipeRequest, RecipeResult};
use crate::utils::{retry_with_backoff, RetryPolicy, Retryable};
use vinedine_common::config::GenerationConfig;

/// Persona given to the model for every call
pub const SYSTEM_PROMPT: &str = "You are a helpful chef and gourmand";

/// Fault reported by a text-generation backend for one call
#[derive(Debug, Clone, Error)]
pub enum GenerationFault {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Rate limited, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("No response within {0:?}")]
    DeadlineExceeded(Duration),
}

impl Retryable for GenerationFault {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            GenerationFault::Connection(_)
                | GenerationFault::Server { .. }
                | GenerationFault::RateLimited { .. }
                | GenerationFault::DeadlineExceeded(_)
        )
    }
}

/// Generation failure after the retry policy has run its course
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// Upstream kept failing in a recoverable way until attempts ran out
    #[error("Text generation temporarily unavailable: {0}")]
    Transient(GenerationFault),

    /// The request can never succeed as sent (bad input, bad credentials)
    #[error("Text generation failed: {0}")]
    Permanent(GenerationFault),
}

impl GenerationError {
    pub fn fault(&self) -> &GenerationFault {
        match self {
            GenerationError::Transient(fault) | GenerationError::Permanent(fault) => fault,
        }
    }
}

impl From<GenerationFault> for GenerationError {
    fn from(fault: GenerationFault) -> Self {
        if fault.is_transient() {
            GenerationError::Transient(fault)
        } else {
            GenerationError::Permanent(fault)
        }
    }
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Everything a backend needs for one completion, apart from the model
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature in [0, 1]
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Text-generation backend
///
/// Implementations are stateless and thread-safe; retry and deadlines are
/// applied by [`GenerationClient`], not here.
#[async_trait]
pub trait TextGenerator: Send + Sync + fmt::Debug {
    /// Submit a chat prompt and return the first completion's text
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationFault>;

    /// Model identifier sent with each request
    fn model_name(&self) -> &str;
}

/// OpenAI-compatible chat completions backend
#[derive(Debug)]
pub struct OpenAiGenerator {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl OpenAiGenerator {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, GenerationFault> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("vinedine/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GenerationFault::Connection(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    pub fn from_config(config: &GenerationConfig, api_key: String) -> Result<Self, GenerationFault> {
        Self::new(&config.base_url, api_key, &config.model)
    }

    fn classify_status(status: u16, body: &str) -> GenerationFault {
        let message = serde_json::from_str::<ApiErrorBody>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string());

        match status {
            401 | 403 => GenerationFault::Auth(message),
            500..=599 => GenerationFault::Server { status, message },
            _ => GenerationFault::InvalidRequest(format!("HTTP {}: {}", status, message)),
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationFault> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionBody {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!(model = %self.model, url = %url, "Requesting chat completion");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationFault::Connection(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(GenerationFault::RateLimited { retry_after_secs });
        }

        let text = response
            .text()
            .await
            .map_err(|e| GenerationFault::Connection(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(Self::classify_status(status, &text));
        }

        let parsed: ChatCompletionResponse =
            serde_json::from_str(&text).map_err(|e| GenerationFault::Malformed(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GenerationFault::Malformed("No completion content".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Build the recipe prompt
///
/// Section tokens are spelled exactly as [`crate::models::SectionLabel`]
/// expects them so extraction can key off the reply.
pub fn recipe_prompt(request: &RecipeRequest) -> String {
    format!(
        "Create a {cuisine} recipe that includes {ingredients} and follows the {diet} dietary \
         requirement. Also suggest a wine pairing, naming a South African wine by brand if \
         possible, and complimentary spices and herbs. Show the estimated calories per portion. \
         Also recommend a song to listen to while cooking this recipe, choosing from a wide range \
         of artists who match the culture of the cuisine, written as \"Song\" by Artist. Use these \
         subheadings in the results: 'Ingredients:', 'Instructions:', 'Wine pairing:', \
         'South African wine recommendation:', 'Complimentary spices and herbs:', \
         'Estimated calories per portion:', 'Song recommendation:'. Give the recipe a name and \
         use it as a title indicated by 'Title:'. Use centigrade for temperature and grams for \
         weight.",
        cuisine = request.cuisine(),
        ingredients = request.ingredient_list(),
        diet = request.dietary_requirement(),
    )
}

/// Recipe generation with deadline and bounded retry
#[derive(Debug, Clone)]
pub struct GenerationClient {
    generator: Arc<dyn TextGenerator>,
    policy: RetryPolicy,
    deadline: Duration,
    temperature: f32,
    max_tokens: u32,
}

impl GenerationClient {
    pub fn new(generator: Arc<dyn TextGenerator>, policy: RetryPolicy, deadline: Duration) -> Self {
        let defaults = GenerationConfig::default();
        Self {
            generator,
            policy,
            deadline,
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
        }
    }

    /// Override sampling parameters (temperature is clamped to [0, 1])
    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature.clamp(0.0, 1.0);
        self.max_tokens = max_tokens;
        self
    }

    /// Generate a recipe for a validated request
    pub async fn generate(&self, request: &RecipeRequest) -> Result<RecipeResult, GenerationError> {
        let text = self
            .complete("recipe generation", &recipe_prompt(request))
            .await?;
        let recipe = RecipeResult::from_text(text);

        info!(
            model = %self.generator.model_name(),
            title = recipe.title.as_deref().unwrap_or("<untitled>"),
            sections = recipe.sections.len(),
            "Recipe generated"
        );

        Ok(recipe)
    }

    /// One user prompt under the shared persona, with deadline and retry
    pub async fn complete(
        &self,
        operation_name: &str,
        prompt: &str,
    ) -> Result<String, GenerationError> {
        let request = CompletionRequest {
            messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        retry_with_backoff(operation_name, &self.policy, || async {
            match tokio::time::timeout(self.deadline, self.generator.complete(&request)).await {
                Ok(result) => result,
                Err(_) => Err(GenerationFault::DeadlineExceeded(self.deadline)),
            }
        })
        .await
        .map_err(GenerationError::from)
    }
}
