// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Chat-completion transport used by the LLM judge

use async_trait::async_trait;
use ragcoach_core::JudgeSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Model name prefixes of reasoning models, which reject `temperature`.
pub const REASONING_MODEL_PREFIXES: [&str; 3] = ["o1", "o3", "gpt-5"];

/// Whether `model_name` belongs to a reasoning model family.
pub fn is_reasoning_model(model_name: &str) -> bool {
    let lower = model_name.to_lowercase();
    REASONING_MODEL_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

/// Trait for chat-completion backends used by the judge
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Send one chat request and return the raw assistant text
    async fn complete(&self, request: ChatRequest) -> Result<LLMResponse, LLMError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Body of an OpenAI-compatible `/chat/completions` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// Response from LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub usage: Option<TokenUsage>,
    pub model: String,
}

/// Token usage information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Errors from LLM clients
#[derive(Debug, Error)]
pub enum LLMError {
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LLMError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, LLMError::RateLimitExceeded)
    }
}

/// OpenAI-compatible client (OpenAI, Groq, Azure OpenAI, vLLM, ...)
pub struct OpenAIClient {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAIClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            base_url: "https://api.openai.com/v1".to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build a client for the judge endpoint described by `settings`.
    ///
    /// A missing or blank API key is allowed (local endpoints need none) but
    /// logged, since hosted endpoints will reject every call.
    pub fn from_settings(settings: &JudgeSettings) -> Result<Self, LLMError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        let api_key = settings
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            warn!(
                base_url = %settings.base_url,
                "No judge API key configured (set GROQ_API_KEY or judge.api_key); requests will be sent without authorization"
            );
        }

        Ok(Self {
            api_key,
            base_url: settings.base_url.clone(),
            client,
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn complete(&self, request: ChatRequest) -> Result<LLMResponse, LLMError> {
        let mut builder = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LLMError::RateLimitExceeded);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LLMError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let response_data: serde_json::Value = response.json().await?;
        parse_completion(&response_data, &request.model)
    }
}

fn parse_completion(response_data: &serde_json::Value, model: &str) -> Result<LLMResponse, LLMError> {
    let message = response_data["choices"]
        .get(0)
        .map(|choice| &choice["message"])
        .ok_or_else(|| LLMError::InvalidResponse("Missing choices".to_string()))?;

    // A null content is an empty answer, not a transport error
    let content = match &message["content"] {
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Null => String::new(),
        other => {
            return Err(LLMError::InvalidResponse(format!(
                "Unexpected message content: {}",
                other
            )))
        }
    };

    let usage = response_data.get("usage").map(|usage_data| TokenUsage {
        prompt_tokens: usage_data["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        completion_tokens: usage_data["completion_tokens"].as_u64().unwrap_or(0) as u32,
        total_tokens: usage_data["total_tokens"].as_u64().unwrap_or(0) as u32,
    });

    Ok(LLMResponse {
        content,
        usage,
        model: response_data["model"]
            .as_str()
            .unwrap_or(model)
            .to_string(),
    })
}
