use std::env;
use std::time::Duration;

use async_trait::async_trait;
use eyre::{Result, eyre};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::business_profile::BusinessProfile;
use crate::cli::chat::context::SessionContext;
use crate::cli::chat::conversation_state::{Role, Turn};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";

/// Only this many of the most recent turns are sent with a question.
pub const MAX_HISTORY_TURNS: usize = 10;

/// Characters of a response body that make it into the logs.
const LOG_BODY_LIMIT: usize = 500;

pub const TECHNICAL_ISSUE_REPLY: &str =
    "I'm currently unable to process your request due to a technical issue. Please try again later.";
pub const CONNECTION_TROUBLE_REPLY: &str =
    "I'm having trouble connecting to the service. Please try again later.";
pub const CLARIFICATION_REPLY: &str =
    "I'm unable to generate a specific response at the moment. Could you please clarify your question?";

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 250,
        }
    }
}

/// Fixed-count, fixed-delay retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// Everything needed to reach the Gemini API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub generation: GenerationConfig,
    pub retry: RetryPolicy,
    /// Per-attempt request timeout
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            generation: GenerationConfig::default(),
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Build a config with the API key taken from `GEMINI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("GEMINI_API_KEY")
            .map_err(|_| eyre!("GEMINI_API_KEY environment variable not set"))?;
        if api_key.trim().is_empty() {
            return Err(eyre!("GEMINI_API_KEY environment variable is empty"));
        }
        Ok(Self::new(api_key))
    }
}

/// Why a single attempt did not produce a usable response.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API returned status {status}: {body}")]
    Status { status: StatusCode, body: String },
}

impl AttemptError {
    /// What the user sees when this was the last attempt.
    pub fn fallback_reply(&self) -> &'static str {
        match self {
            AttemptError::Transport(_) => TECHNICAL_ISSUE_REPLY,
            AttemptError::Status { .. } => CONNECTION_TROUBLE_REPLY,
        }
    }
}

/// Anything that can answer a question in the context of a conversation.
///
/// Implementations never fail: problems are reported to the user as reply
/// text.
#[async_trait]
pub trait AnswerService: Send + Sync {
    async fn answer(&self, question: &str, history: &[Turn], context: &SessionContext) -> String;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

impl Content {
    fn new(role: Role, text: &str) -> Self {
        Self {
            role: role.gemini_role(),
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate.
    fn into_reply(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

pub struct GeminiClient {
    endpoint: Url,
    generation: GenerationConfig,
    retry: RetryPolicy,
    profile: BusinessProfile,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: ClientConfig, profile: BusinessProfile) -> Result<Self> {
        let endpoint = endpoint_url(&config.api_base, &config.model, &config.api_key)?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;

        info!("Using Gemini model {} at {}", config.model, config.api_base);

        Ok(Self {
            endpoint,
            generation: config.generation,
            retry: config.retry,
            profile,
            client,
        })
    }

    fn build_request(
        &self,
        question: &str,
        history: &[Turn],
        context: &SessionContext,
    ) -> GenerateContentRequest {
        let window = &history[history.len().saturating_sub(MAX_HISTORY_TURNS)..];

        let mut contents = Vec::with_capacity(window.len() + 3);
        contents.push(Content::new(Role::User, &self.profile.instruction(context)));
        contents.push(Content::new(Role::Assistant, &self.profile.acknowledgement));
        for turn in window {
            contents.push(Content::new(turn.role(), turn.text()));
        }
        contents.push(Content::new(Role::User, question));

        GenerateContentRequest {
            contents,
            generation_config: self.generation.clone(),
        }
    }

    /// One POST. `Ok(None)` means the API answered but gave no usable reply.
    async fn send_once(
        &self,
        request: &GenerateContentRequest,
        attempt: u32,
        max_attempts: u32,
    ) -> Result<Option<String>, AttemptError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        info!(
            "API response status code (attempt {}/{}): {}",
            attempt,
            max_attempts,
            status.as_u16()
        );
        info!("API response content: {}...", truncate_for_log(&body, LOG_BODY_LIMIT));

        if !status.is_success() {
            let error = AttemptError::Status {
                status,
                body: truncate_for_log(&body, LOG_BODY_LIMIT).to_string(),
            };
            error!("API error: {}", error);
            return Err(error);
        }

        match serde_json::from_str::<GenerateContentResponse>(&body) {
            Ok(parsed) => Ok(parsed.into_reply()),
            Err(e) => {
                warn!("Could not parse API response: {}", e);
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl AnswerService for GeminiClient {
    async fn answer(&self, question: &str, history: &[Turn], context: &SessionContext) -> String {
        let request = self.build_request(question, history, context);

        if let Ok(pretty) = serde_json::to_string_pretty(&request) {
            debug!("Sending request to Gemini API: {}", pretty);
        }

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.send_once(&request, attempt, max_attempts).await {
                Ok(Some(reply)) => return reply,
                Ok(None) => {
                    warn!("No valid response in API result");
                    return CLARIFICATION_REPLY.to_string();
                }
                Err(e) => {
                    if let AttemptError::Transport(ref cause) = e {
                        error!("Request exception (attempt {}/{}): {}", attempt, max_attempts, cause);
                    }
                    if attempt >= max_attempts {
                        warn!("Giving up after {} attempts: {}", attempt, e);
                        return e.fallback_reply().to_string();
                    }
                    debug!("Retrying in {:?}", self.retry.delay);
                    tokio::time::sleep(self.retry.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn endpoint_url(api_base: &str, model: &str, api_key: &str) -> Result<Url> {
    let raw = format!(
        "{}/v1beta/models/{}:generateContent",
        api_base.trim_end_matches('/'),
        model
    );
    let mut url = Url::parse(&raw).map_err(|e| eyre!("Invalid API base URL '{}': {}", api_base, e))?;
    url.query_pairs_mut().append_pair("key", api_key);
    Ok(url)
}

/// Cut `body` to at most `limit` characters without splitting a character.
fn truncate_for_log(body: &str, limit: usize) -> &str {
    match body.char_indices().nth(limit) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
