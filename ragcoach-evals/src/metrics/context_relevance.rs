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

//! Context relevance: how useful is each retrieved snippet for the question?
//!
//! The judge rates every context 1-5 in input order. The score is the mean
//! rating mapped onto [0, 1]. No contexts means nothing to rate: the score
//! is 0.0 and the judge is not called.

use super::{deserialize_ratings, format_contexts, normalize_likert, validate_likert};
use crate::judge::{JudgeOutput, LlmJudge};
use crate::{EvalError, Metric};
use async_trait::async_trait;
use ragcoach_core::EvaluationResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

const SYSTEM_PROMPT: &str = r#"You are an expert evaluator assessing whether retrieved contexts are relevant to answering a question.

Your task is to evaluate each context independently and rate how useful it would be for answering the given question.

Scoring criteria for each context:
- 5: Highly relevant - directly contains information needed to answer the question
- 4: Relevant - contains useful information related to the question
- 3: Somewhat relevant - tangentially related to the question
- 2: Barely relevant - mentions related concepts but not useful for answering
- 1: Not relevant - unrelated to the question

Evaluate each context independently."#;

/// Judge reply with one rating per context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ContextRelevanceResponse {
    /// Explanation of the evaluation
    pub reasoning: String,
    /// For each context, a score from 1 (not relevant) to 5 (highly relevant)
    #[serde(deserialize_with = "deserialize_ratings")]
    #[schemars(with = "Vec<i64>")]
    pub relevance_scores: Vec<i64>,
}

impl JudgeOutput for ContextRelevanceResponse {
    fn validate(&self) -> Result<(), String> {
        self.relevance_scores
            .iter()
            .try_for_each(|score| validate_likert(*score))
    }
}

pub struct ContextRelevanceMetric {
    judge: Arc<LlmJudge>,
}

impl ContextRelevanceMetric {
    pub fn new(judge: Arc<LlmJudge>) -> Self {
        Self { judge }
    }
}

#[async_trait]
impl Metric for ContextRelevanceMetric {
    fn name(&self) -> &str {
        "context_relevance"
    }

    async fn evaluate(
        &self,
        query: &str,
        _answer: &str,
        contexts: &[String],
    ) -> Result<EvaluationResult, EvalError> {
        if contexts.is_empty() {
            return Ok(EvaluationResult::new(
                self.name(),
                0.0,
                "No contexts were retrieved.",
            ));
        }

        let user_prompt = format!(
            "<question>\n{}\n</question>\n\n<retrieved_contexts>\n{}\n</retrieved_contexts>\n\n\
             Rate the relevance of each context to answering this question on a scale from 1 to 5.\n\
             Provide one score per context in order.\n",
            query,
            format_contexts(contexts)
        );

        let response: ContextRelevanceResponse =
            self.judge.evaluate(SYSTEM_PROMPT, &user_prompt).await?;

        let ratings = &response.relevance_scores;
        if ratings.len() != contexts.len() {
            warn!(
                expected = contexts.len(),
                received = ratings.len(),
                "Judge returned a different number of context ratings than contexts"
            );
        }

        let score = if ratings.is_empty() {
            0.0
        } else {
            let mean = ratings.iter().sum::<i64>() as f64 / ratings.len() as f64;
            normalize_likert(mean)
        };

        Ok(EvaluationResult::new(self.name(), score, response.reasoning))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedClient;

    fn metric(client: Arc<ScriptedClient>) -> ContextRelevanceMetric {
        ContextRelevanceMetric::new(Arc::new(LlmJudge::new(client, "m", 0.0)))
    }

    fn contexts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("snippet {}", i)).collect()
    }

    #[tokio::test]
    async fn test_mean_rating_normalized() {
        let client = Arc::new(ScriptedClient::text(
            r#"{"reasoning": "first is on point", "relevance_scores": [5, 3, 1]}"#,
        ));
        let result = metric(client.clone())
            .evaluate("q", "a", &contexts(3))
            .await
            .unwrap();

        assert_eq!(result.score, 0.5);
        assert_eq!(result.metric_name, "context_relevance");
        assert!(client
            .last_user_prompt()
            .unwrap()
            .contains("<context id=\"3\">\nsnippet 2\n</context>"));
    }

    #[tokio::test]
    async fn test_empty_contexts_skip_judge() {
        let client = Arc::new(ScriptedClient::new(vec![]));
        let result = metric(client.clone()).evaluate("q", "a", &[]).await.unwrap();

        assert_eq!(result.score, 0.0);
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_count_mismatch_averages_returned_ratings() {
        let client = Arc::new(ScriptedClient::text(
            r#"{"reasoning": "only rated two", "relevance_scores": [5, 5]}"#,
        ));
        let result = metric(client).evaluate("q", "a", &contexts(4)).await.unwrap();
        assert_eq!(result.score, 1.0);
    }

    #[tokio::test]
    async fn test_no_ratings_scores_zero() {
        let client = Arc::new(ScriptedClient::text(
            r#"{"reasoning": "nothing", "relevance_scores": []}"#,
        ));
        let result = metric(client).evaluate("q", "a", &contexts(2)).await.unwrap();
        assert_eq!(result.score, 0.0);
    }

    #[tokio::test]
    async fn test_integral_float_ratings_accepted() {
        let client = Arc::new(ScriptedClient::text(
            r#"{"reasoning": "mostly useful", "relevance_scores": [4.0, 4]}"#,
        ));
        let result = metric(client).evaluate("q", "a", &contexts(2)).await.unwrap();
        assert_eq!(result.score, 0.75);
    }

    #[tokio::test]
    async fn test_fractional_rating_rejected() {
        let client = Arc::new(ScriptedClient::text(
            r#"{"reasoning": "x", "relevance_scores": [4, 3.5]}"#,
        ));
        let err = metric(client)
            .evaluate("q", "a", &contexts(2))
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::MalformedJudgeOutput(_)));
    }

    #[tokio::test]
    async fn test_rating_outside_scale_rejected() {
        let client = Arc::new(ScriptedClient::text(
            r#"{"reasoning": "x", "relevance_scores": [4, 0]}"#,
        ));
        let err = metric(client)
            .evaluate("q", "a", &contexts(2))
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::MalformedJudgeOutput(_)));
    }
}
