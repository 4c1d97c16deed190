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

//! Answer relevance: does the answer address the question, whether or not it is correct?

use super::{deserialize_rating, normalize_likert, validate_likert};
use crate::judge::{JudgeOutput, LlmJudge};
use crate::{EvalError, Metric};
use async_trait::async_trait;
use ragcoach_core::EvaluationResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const SYSTEM_PROMPT: &str = r#"You are an expert evaluator assessing whether answers are relevant to the questions asked.

Your task is to evaluate how well the answer addresses the specific question, regardless of correctness.

Scoring criteria:
- 5: Answer directly and completely addresses the question
- 4: Answer addresses the question but may miss some aspects
- 3: Answer partially addresses the question
- 2: Answer is tangentially related to the question
- 1: Answer is not relevant to the question

Focus on relevance, not accuracy or completeness."#;

/// Judge reply carrying a single 1-5 rating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RelevanceResponse {
    /// Explanation of the score
    pub reasoning: String,
    /// Relevance score from 1 (not relevant) to 5 (highly relevant)
    #[serde(deserialize_with = "deserialize_rating")]
    #[schemars(with = "i64", range(min = 1, max = 5))]
    pub score: i64,
}

impl JudgeOutput for RelevanceResponse {
    fn validate(&self) -> Result<(), String> {
        validate_likert(self.score)
    }
}

pub struct AnswerRelevanceMetric {
    judge: Arc<LlmJudge>,
}

impl AnswerRelevanceMetric {
    pub fn new(judge: Arc<LlmJudge>) -> Self {
        Self { judge }
    }
}

#[async_trait]
impl Metric for AnswerRelevanceMetric {
    fn name(&self) -> &str {
        "answer_relevance"
    }

    // Contexts play no part in this rating.
    async fn evaluate(
        &self,
        query: &str,
        answer: &str,
        _contexts: &[String],
    ) -> Result<EvaluationResult, EvalError> {
        let user_prompt = format!(
            "<question>\n{}\n</question>\n\n<answer>\n{}\n</answer>\n\n\
             Rate the relevance of this answer to the question on a scale from 1 to 5.\n",
            query, answer
        );

        let response: RelevanceResponse = self.judge.evaluate(SYSTEM_PROMPT, &user_prompt).await?;

        Ok(EvaluationResult::new(
            self.name(),
            normalize_likert(response.score as f64),
            response.reasoning,
        ))
    }
}
