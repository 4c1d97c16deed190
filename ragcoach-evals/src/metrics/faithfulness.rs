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

//! Faithfulness: is every claim in the answer backed by the retrieved contexts?
//!
//! The judge decomposes the answer into atomic claims and marks each one
//! supported or not. Score = supported / total, and 0.0 when the judge
//! finds no claims at all.

use super::format_contexts;
use crate::judge::{JudgeOutput, LlmJudge};
use crate::{EvalError, Metric};
use async_trait::async_trait;
use ragcoach_core::EvaluationResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const SYSTEM_PROMPT: &str = r#"You are an expert sports performance evaluator assessing the faithfulness of answers to their source contexts.

Your task is to:
1. Extract all factual claims made in the answer.
2. For each claim, determine if it can be verified by the provided contexts.
3. Contexts may contain technical guideline text (e.g., NSCA manuals) or database records (e.g., sleep hours, RPE, dates in tuples).
4. A claim is supported if:
   - it is directly stated in, or can be directly inferred from, the contexts, or
   - it is a correct summary or calculation over numeric records in the contexts (e.g., records showing 7.0, 7.5 and 6.5 support "an average of 7h").
5. Claims that contradict the contexts or add new information are not supported.

Be strict with technical protocols but allow mathematical summaries of numerical data found in the contexts."#;

/// A claim with its verification verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClaimVerdict {
    /// The factual claim from the answer
    pub claim: String,
    /// Whether this claim is supported by the contexts
    pub is_supported: bool,
}

/// Judge reply for a faithfulness check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FaithfulnessResponse {
    /// Explanation of the evaluation
    pub reasoning: String,
    /// List of claims with their verification verdicts
    pub claims: Vec<ClaimVerdict>,
}

impl JudgeOutput for FaithfulnessResponse {}

impl FaithfulnessResponse {
    pub fn score(&self) -> f64 {
        if self.claims.is_empty() {
            return 0.0;
        }
        let supported = self.claims.iter().filter(|c| c.is_supported).count();
        supported as f64 / self.claims.len() as f64
    }
}

pub struct FaithfulnessMetric {
    judge: Arc<LlmJudge>,
}

impl FaithfulnessMetric {
    pub fn new(judge: Arc<LlmJudge>) -> Self {
        Self { judge }
    }

    fn user_prompt(query: &str, answer: &str, contexts: &[String]) -> String {
        format!(
            "<question>\n{}\n</question>\n\n<answer>\n{}\n</answer>\n\n<retrieved_contexts>\n{}\n</retrieved_contexts>\n\n\
             Extract all claims from the answer and verify each against the contexts.\n\
             For each claim, return:\n\
             - claim: the text of the claim\n\
             - is_supported: boolean indicating if the claim is supported by the contexts\n",
            query,
            answer,
            format_contexts(contexts)
        )
    }
}

#[async_trait]
impl Metric for FaithfulnessMetric {
    fn name(&self) -> &str {
        "faithfulness"
    }

    async fn evaluate(
        &self,
        query: &str,
        answer: &str,
        contexts: &[String],
    ) -> Result<EvaluationResult, EvalError> {
        let response: FaithfulnessResponse = self
            .judge
            .evaluate(SYSTEM_PROMPT, &Self::user_prompt(query, answer, contexts))
            .await?;

        Ok(EvaluationResult::new(
            self.name(),
            response.score(),
            response.reasoning,
        ))
    }
}
