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

//! Ragcoach Evals
//!
//! LLM-as-judge scoring for retrieval-augmented answers. A [`Metric`] turns
//! one `(query, answer, contexts)` triple into a score in [0, 1] by asking
//! an [`LlmJudge`]; the [`RagEvaluator`] runs every metric over a dataset and
//! reduces the scores into an [`EvaluationReport`].

use async_trait::async_trait;
use ragcoach_core::EvaluationResult;
use thiserror::Error;

pub mod evaluator;
pub mod judge;
pub mod llm_client;
pub mod metrics;
pub mod score_sink;
pub mod statistics;

#[cfg(test)]
pub(crate) mod testing;

pub use evaluator::RagEvaluator;
pub use judge::{extract_json_object, parse_response, JudgeOutput, LlmJudge};
pub use llm_client::{
    is_reasoning_model, ChatMessage, ChatRequest, ChatRole, LLMClient, LLMError, LLMResponse,
    OpenAIClient, TokenUsage,
};
pub use metrics::{
    build_metrics, AnswerRelevanceMetric, ContextRelevanceMetric, FaithfulnessMetric, MetricKind,
};
pub use ragcoach_core::{
    EvaluationExample, EvaluationReport, MetricReport, MetricStatistics, QueryLevelResult,
};
pub use score_sink::{
    LangfuseScoreSink, NoopScoreSink, ScoreDataType, ScoreRecord, ScoreSink, SinkError,
};
pub use statistics::calculate_statistics;

/// One evaluation dimension, scored per example
#[async_trait]
pub trait Metric: Send + Sync {
    /// Stable identifier used as the report key (e.g., "faithfulness")
    fn name(&self) -> &str;

    /// Score one example. The returned score is always within [0, 1].
    async fn evaluate(
        &self,
        query: &str,
        answer: &str,
        contexts: &[String],
    ) -> Result<EvaluationResult, EvalError>;
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("LLM client error: {0}")]
    LLMClientError(String),

    #[error("Rate limit exceeded after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("Malformed judge output: {0}")]
    MalformedJudgeOutput(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Metric {metric} failed on example {index}: {source}")]
    MetricFailed {
        metric: String,
        index: usize,
        #[source]
        source: Box<EvalError>,
    },
}
