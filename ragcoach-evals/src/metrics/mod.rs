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

//! Judge-backed metrics
//!
//! - [`FaithfulnessMetric`]: share of the answer's claims backed by the contexts
//! - [`AnswerRelevanceMetric`]: how directly the answer addresses the query
//! - [`ContextRelevanceMetric`]: how useful each retrieved context is

mod answer_relevance;
mod context_relevance;
mod faithfulness;

pub use answer_relevance::{AnswerRelevanceMetric, RelevanceResponse};
pub use context_relevance::{ContextRelevanceMetric, ContextRelevanceResponse};
pub use faithfulness::{ClaimVerdict, FaithfulnessMetric, FaithfulnessResponse};

use crate::judge::LlmJudge;
use crate::{EvalError, Metric};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Number;
use std::str::FromStr;
use std::sync::Arc;

const LIKERT_MIN: f64 = 1.0;
const LIKERT_MAX: f64 = 5.0;

/// Built-in metric selectable by name from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Faithfulness,
    AnswerRelevance,
    ContextRelevance,
}

impl MetricKind {
    pub const ALL: [MetricKind; 3] = [
        MetricKind::Faithfulness,
        MetricKind::AnswerRelevance,
        MetricKind::ContextRelevance,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::Faithfulness => "faithfulness",
            MetricKind::AnswerRelevance => "answer_relevance",
            MetricKind::ContextRelevance => "context_relevance",
        }
    }

    pub fn build(self, judge: Arc<LlmJudge>) -> Arc<dyn Metric> {
        match self {
            MetricKind::Faithfulness => Arc::new(FaithfulnessMetric::new(judge)),
            MetricKind::AnswerRelevance => Arc::new(AnswerRelevanceMetric::new(judge)),
            MetricKind::ContextRelevance => Arc::new(ContextRelevanceMetric::new(judge)),
        }
    }
}

impl FromStr for MetricKind {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        MetricKind::ALL
            .into_iter()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| EvalError::InvalidInput(format!("unknown metric '{}'", s)))
    }
}

/// Instantiate metrics by name, preserving the given order.
pub fn build_metrics(
    names: &[String],
    judge: Arc<LlmJudge>,
) -> Result<Vec<Arc<dyn Metric>>, EvalError> {
    names
        .iter()
        .map(|name| Ok(name.parse::<MetricKind>()?.build(Arc::clone(&judge))))
        .collect()
}

/// Render contexts as 1-based `<context id="N">` blocks separated by blank lines.
pub(crate) fn format_contexts(contexts: &[String]) -> String {
    contexts
        .iter()
        .enumerate()
        .map(|(i, ctx)| format!("<context id=\"{}\">\n{}\n</context>", i + 1, ctx))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Map a 1-5 rating onto [0, 1].
pub(crate) fn normalize_likert(raw: f64) -> f64 {
    ((raw - LIKERT_MIN) / (LIKERT_MAX - LIKERT_MIN)).clamp(0.0, 1.0)
}

/// Accept a JSON number as a rating when it is integral, so `4.0` reads as `4`
/// but `3.5` is rejected.
fn integral_rating(number: &Number) -> Result<i64, String> {
    if let Some(value) = number.as_i64() {
        return Ok(value);
    }
    match number.as_f64() {
        Some(value) if value.fract() == 0.0 && value.abs() <= i64::MAX as f64 => Ok(value as i64),
        _ => Err(format!("expected an integer rating, found {}", number)),
    }
}

pub(crate) fn deserialize_rating<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Number::deserialize(deserializer)?;
    integral_rating(&number).map_err(D::Error::custom)
}

pub(crate) fn deserialize_ratings<'de, D>(deserializer: D) -> Result<Vec<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<Number>::deserialize(deserializer)?
        .iter()
        .map(|number| integral_rating(number).map_err(D::Error::custom))
        .collect()
}

pub(crate) fn validate_likert(score: i64) -> Result<(), String> {
    if (LIKERT_MIN as i64..=LIKERT_MAX as i64).contains(&score) {
        Ok(())
    } else {
        Err(format!("score {} outside 1..=5", score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedClient;
    use proptest::prelude::*;

    #[test]
    fn test_metric_kind_from_str() {
        assert_eq!(
            "faithfulness".parse::<MetricKind>().unwrap(),
            MetricKind::Faithfulness
        );
        assert_eq!(
            "Answer-Relevance".parse::<MetricKind>().unwrap(),
            MetricKind::AnswerRelevance
        );
        assert!("bleu".parse::<MetricKind>().is_err());
    }

    #[test]
    fn test_build_metrics_preserves_order() {
        let judge = Arc::new(LlmJudge::new(
            Arc::new(ScriptedClient::new(vec![])),
            "m",
            0.0,
        ));
        let names = vec!["context_relevance".to_string(), "faithfulness".to_string()];
        let metrics = build_metrics(&names, judge).unwrap();

        let built: Vec<&str> = metrics.iter().map(|m| m.name()).collect();
        assert_eq!(built, vec!["context_relevance", "faithfulness"]);
    }

    #[test]
    fn test_integral_rating() {
        assert_eq!(integral_rating(&Number::from(4)), Ok(4));
        assert_eq!(integral_rating(&Number::from_f64(4.0).unwrap()), Ok(4));
        assert!(integral_rating(&Number::from_f64(3.5).unwrap()).is_err());
    }

    proptest! {
        #[test]
        fn prop_normalized_mean_rating_in_unit_interval(
            ratings in prop::collection::vec(1i64..=5, 1..20)
        ) {
            let mean = ratings.iter().sum::<i64>() as f64 / ratings.len() as f64;
            let score = normalize_likert(mean);
            prop_assert!((0.0..=1.0).contains(&score));
            prop_assert!((score * 4.0 + 1.0 - mean).abs() < 1e-9);
        }
    }

    #[test]
    fn test_format_contexts() {
        let rendered = format_contexts(&["a".to_string(), "b".to_string()]);
        assert_eq!(
            rendered,
            "<context id=\"1\">\na\n</context>\n\n<context id=\"2\">\nb\n</context>"
        );
        assert_eq!(format_contexts(&[]), "");
    }

    #[test]
    fn test_normalize_likert() {
        let expected = [0.0, 0.25, 0.5, 0.75, 1.0];
        for (raw, want) in (1..=5).zip(expected) {
            assert_eq!(normalize_likert(raw as f64), want, "rating {}", raw);
        }
        assert!(validate_likert(0).is_err());
        assert!(validate_likert(6).is_err());
        assert!(validate_likert(3).is_ok());
    }
}
