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

//! Schema-constrained LLM judge
//!
//! Every metric asks the judge for a JSON object of a known shape. The
//! shape's JSON schema is rendered into the system prompt, the reply is
//! parsed strictly first and then by pulling the first brace-balanced
//! object out of any surrounding prose. Rate-limit failures are retried
//! with exponential backoff; everything else fails immediately.

use crate::llm_client::{is_reasoning_model, ChatMessage, ChatRequest, LLMClient, LLMError};
use crate::EvalError;
use ragcoach_core::{retry_if, RetryPolicy};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

/// Structured reply a judge call must produce.
///
/// `validate` runs after deserialization and rejects values the schema
/// alone cannot rule out, such as out-of-range ratings.
pub trait JudgeOutput: DeserializeOwned + JsonSchema {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Sends prompts to a chat model and parses its reply into a [`JudgeOutput`]
pub struct LlmJudge {
    client: Arc<dyn LLMClient>,
    model: String,
    temperature: f64,
    retry_policy: RetryPolicy,
}

impl LlmJudge {
    pub fn new(client: Arc<dyn LLMClient>, model: impl Into<String>, temperature: f64) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Assemble the chat request for a judge call returning `T`.
    pub fn build_request<T: JudgeOutput>(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<ChatRequest, EvalError> {
        let schema = render_schema::<T>()?;
        let system = format!(
            "{}\n\nReturn ONLY a valid JSON object. Do not include any extra text, \
             explanations, or markdown formatting.\n\nExpected format:\n{}",
            system_prompt, schema
        );

        Ok(ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(user_prompt)],
            temperature: if is_reasoning_model(&self.model) {
                None
            } else {
                Some(self.temperature)
            },
        })
    }

    /// Ask the judge and parse the reply into `T`.
    pub async fn evaluate<T: JudgeOutput>(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<T, EvalError> {
        if system_prompt.trim().is_empty() || user_prompt.trim().is_empty() {
            return Err(EvalError::InvalidInput(
                "judge prompts must not be empty".to_string(),
            ));
        }

        let request = self.build_request::<T>(system_prompt, user_prompt)?;
        let response = retry_if(
            &self.retry_policy,
            |err: &LLMError| err.is_rate_limit(),
            |_attempt| {
                let client = Arc::clone(&self.client);
                let request = request.clone();
                async move { client.complete(request).await }
            },
        )
        .await
        .map_err(|err| match err {
            LLMError::RateLimitExceeded => EvalError::RateLimited {
                attempts: self.retry_policy.max_attempts.max(1),
            },
            other => EvalError::LLMClientError(other.to_string()),
        })?;

        if let Some(usage) = response.usage {
            debug!(
                model = %response.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Judge call completed"
            );
        }

        parse_response(&response.content)
    }
}

fn render_schema<T: JsonSchema>() -> Result<String, EvalError> {
    let schema = schemars::schema_for!(T);
    serde_json::to_string_pretty(&schema)
        .map_err(|e| EvalError::InvalidInput(format!("unrenderable judge schema: {}", e)))
}

/// Parse judge text into `T`: strict JSON first, then the first
/// brace-balanced object embedded in the text.
pub fn parse_response<T: JudgeOutput>(content: &str) -> Result<T, EvalError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(EvalError::MalformedJudgeOutput(
            "Empty response from LLM judge".to_string(),
        ));
    }

    match parse_strict(content) {
        Ok(value) => Ok(value),
        Err(strict_err) => match extract_json_object(content) {
            Some(object) => parse_strict(object),
            None => Err(strict_err),
        },
    }
}

fn parse_strict<T: JudgeOutput>(text: &str) -> Result<T, EvalError> {
    let value: T = serde_json::from_str(text)
        .map_err(|e| EvalError::MalformedJudgeOutput(e.to_string()))?;
    value.validate().map_err(EvalError::MalformedJudgeOutput)?;
    Ok(value)
}

/// Slice from the first `{` to the brace that balances it.
///
/// Braces inside string literals are counted too.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;

    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Reply, ScriptedClient};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    struct Rating {
        reasoning: String,
        score: i64,
    }

    impl JudgeOutput for Rating {
        fn validate(&self) -> Result<(), String> {
            if (1..=5).contains(&self.score) {
                Ok(())
            } else {
                Err(format!("score {} outside 1..=5", self.score))
            }
        }
    }

    fn judge(client: Arc<ScriptedClient>, model: &str) -> LlmJudge {
        LlmJudge::new(client, model, 0.0).with_retry_policy(RetryPolicy::immediate(5))
    }

    #[test]
    fn test_extract_json_object_skips_noise() {
        let text = "noise {\"a\":1,\"b\":{\"c\":2}} trailing";
        assert_eq!(extract_json_object(text), Some("{\"a\":1,\"b\":{\"c\":2}}"));
    }

    #[test]
    fn test_extract_json_object_unbalanced() {
        assert_eq!(extract_json_object("{\"a\": {\"b\": 1}"), None);
        assert_eq!(extract_json_object("no braces at all"), None);
    }

    #[test]
    fn test_parse_response_strict_and_fallback() {
        let strict: Rating = parse_response("{\"reasoning\": \"ok\", \"score\": 4}").unwrap();
        assert_eq!(strict.score, 4);

        let wrapped: Rating =
            parse_response("Here you go:\n```json\n{\"reasoning\": \"ok\", \"score\": 2}\n```")
                .unwrap();
        assert_eq!(wrapped.score, 2);
    }

    #[test]
    fn test_parse_response_rejects_empty_and_invalid() {
        assert!(matches!(
            parse_response::<Rating>("   "),
            Err(EvalError::MalformedJudgeOutput(_))
        ));
        assert!(matches!(
            parse_response::<Rating>("I cannot rate this."),
            Err(EvalError::MalformedJudgeOutput(_))
        ));
        assert!(matches!(
            parse_response::<Rating>("{\"reasoning\": \"x\", \"score\": 9}"),
            Err(EvalError::MalformedJudgeOutput(_))
        ));
    }

    #[test]
    fn test_system_prompt_carries_schema() {
        let client = Arc::new(ScriptedClient::new(vec![]));
        let request = judge(client, "llama-3.3-70b-versatile")
            .build_request::<Rating>("You rate answers.", "Rate this.")
            .unwrap();

        let system = &request.messages[0].content;
        assert!(system.starts_with("You rate answers."));
        assert!(system.contains("Expected format:"));
        assert!(system.contains("\"score\""));
        assert_eq!(request.messages[1].content, "Rate this.");
        assert_eq!(request.temperature, Some(0.0));
    }

    #[test]
    fn test_reasoning_model_omits_temperature() {
        let client = Arc::new(ScriptedClient::new(vec![]));
        let request = judge(client, "o3-mini")
            .build_request::<Rating>("sys", "user")
            .unwrap();
        assert_eq!(request.temperature, None);
    }

    #[tokio::test]
    async fn test_rate_limit_then_success() {
        let client = Arc::new(ScriptedClient::new(vec![
            Reply::RateLimited,
            Reply::RateLimited,
            Reply::RateLimited,
            Reply::Text("{\"reasoning\": \"fine\", \"score\": 5}".to_string()),
        ]));
        let rating: Rating = judge(client.clone(), "llama-3.3-70b-versatile")
            .evaluate("sys", "user")
            .await
            .unwrap();

        assert_eq!(rating.score, 5);
        assert_eq!(client.calls(), 4);
    }

    #[tokio::test]
    async fn test_rate_limit_exhaustion() {
        let client = Arc::new(ScriptedClient::new(vec![Reply::RateLimited; 6]));
        let err = judge(client.clone(), "m")
            .evaluate::<Rating>("sys", "user")
            .await
            .unwrap_err();

        assert!(matches!(err, EvalError::RateLimited { attempts: 5 }));
        assert_eq!(client.calls(), 5);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let client = Arc::new(ScriptedClient::new(vec![
            Reply::ServerError,
            Reply::Text("{\"reasoning\": \"fine\", \"score\": 5}".to_string()),
        ]));
        let err = judge(client.clone(), "m")
            .evaluate::<Rating>("sys", "user")
            .await
            .unwrap_err();

        assert!(matches!(err, EvalError::LLMClientError(_)));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_reply_is_malformed() {
        let client = Arc::new(ScriptedClient::new(vec![Reply::Text(String::new())]));
        let err = judge(client, "m")
            .evaluate::<Rating>("sys", "user")
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::MalformedJudgeOutput(_)));
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected_without_call() {
        let client = Arc::new(ScriptedClient::new(vec![]));
        let err = judge(client.clone(), "m")
            .evaluate::<Rating>("sys", "  ")
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::InvalidInput(_)));
        assert_eq!(client.calls(), 0);
    }
}
