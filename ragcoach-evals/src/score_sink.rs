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

//! Forwarding per-example scores to an external trace store
//!
//! Scores are attached to previously recorded traces by trace id. Delivery
//! is best-effort: the evaluator logs sink failures and carries on.

use async_trait::async_trait;
use ragcoach_core::SinkSettings;
use reqwest::Client as HttpClient;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

const SINK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoreDataType {
    Numeric,
    Categorical,
    Boolean,
}

/// One score attached to one trace
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    pub trace_id: String,
    pub name: String,
    pub value: f64,
    pub data_type: ScoreDataType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ScoreRecord {
    pub fn numeric(
        trace_id: impl Into<String>,
        name: impl Into<String>,
        value: f64,
        comment: impl Into<String>,
    ) -> Self {
        let comment = comment.into();
        Self {
            trace_id: trace_id.into(),
            name: name.into(),
            value,
            data_type: ScoreDataType::Numeric,
            comment: (!comment.is_empty()).then_some(comment),
        }
    }
}

#[async_trait]
pub trait ScoreSink: Send + Sync {
    async fn create_score(&self, score: &ScoreRecord) -> Result<(), SinkError>;
}

/// Sink used when forwarding is disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScoreSink;

#[async_trait]
impl ScoreSink for NoopScoreSink {
    async fn create_score(&self, _score: &ScoreRecord) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Langfuse public scores API (`POST /api/public/scores`, basic auth)
pub struct LangfuseScoreSink {
    base_url: String,
    public_key: String,
    secret_key: String,
    http_client: HttpClient,
}

impl LangfuseScoreSink {
    pub fn new(
        base_url: impl Into<String>,
        public_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Result<Self, SinkError> {
        let http_client = HttpClient::builder().timeout(SINK_TIMEOUT).build()?;
        Ok(Self {
            base_url: base_url.into(),
            public_key: public_key.into(),
            secret_key: secret_key.into(),
            http_client,
        })
    }

    /// `None` when forwarding is disabled or either key is missing.
    pub fn from_settings(settings: &SinkSettings) -> Result<Option<Self>, SinkError> {
        if !settings.enabled {
            return Ok(None);
        }

        match (&settings.public_key, &settings.secret_key) {
            (Some(public_key), Some(secret_key)) => Ok(Some(Self::new(
                settings.base_url.clone(),
                public_key.clone(),
                secret_key.clone(),
            )?)),
            _ => {
                warn!("Score forwarding enabled but Langfuse keys are missing; scores will not be sent");
                Ok(None)
            }
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/public/scores", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ScoreSink for LangfuseScoreSink {
    async fn create_score(&self, score: &ScoreRecord) -> Result<(), SinkError> {
        let response = self
            .http_client
            .post(self.endpoint())
            .basic_auth(&self.public_key, Some(&self.secret_key))
            .json(score)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SinkError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}
