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

//! Drives every metric over every example and assembles the report
//!
//! Metrics run one after another in their configured order, and each metric
//! walks the examples in input order. Per-example scores therefore stay
//! index-aligned with the dataset in every [`MetricReport`].

use crate::score_sink::{NoopScoreSink, ScoreRecord, ScoreSink};
use crate::statistics::calculate_statistics;
use crate::{EvalError, Metric};
use chrono::Utc;
use ragcoach_core::{
    EvaluationExample, EvaluationReport, EvaluationResult, FailurePolicy, MetricReport,
    QueryLevelResult,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct RagEvaluator {
    metrics: Vec<Arc<dyn Metric>>,
    score_sink: Arc<dyn ScoreSink>,
    configuration: BTreeMap<String, String>,
    failure_policy: FailurePolicy,
}

impl RagEvaluator {
    pub fn new(metrics: Vec<Arc<dyn Metric>>) -> Self {
        Self {
            metrics,
            score_sink: Arc::new(NoopScoreSink),
            configuration: BTreeMap::new(),
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_score_sink(mut self, sink: Arc<dyn ScoreSink>) -> Self {
        self.score_sink = sink;
        self
    }

    /// Settings recorded verbatim in the report
    pub fn with_configuration(mut self, configuration: BTreeMap<String, String>) -> Self {
        self.configuration = configuration;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn metric_names(&self) -> Vec<&str> {
        self.metrics.iter().map(|m| m.name()).collect()
    }

    /// Score every example with every metric and build the report.
    pub async fn evaluate(
        &self,
        examples: &[EvaluationExample],
    ) -> Result<EvaluationReport, EvalError> {
        self.check_inputs(examples)?;

        let timestamp = Utc::now();
        let started = Instant::now();
        info!(
            examples = examples.len(),
            metrics = self.metrics.len(),
            failure_policy = self.failure_policy.as_str(),
            "Starting evaluation"
        );

        let mut metric_reports = Vec::with_capacity(self.metrics.len());
        for metric in &self.metrics {
            metric_reports.push(self.run_metric(metric.as_ref(), examples).await?);
        }

        let query_level_results = query_level_results(examples, &metric_reports);
        let total_duration_seconds = started.elapsed().as_secs_f64();
        info!(
            duration_seconds = total_duration_seconds,
            "Evaluation complete"
        );

        Ok(EvaluationReport {
            timestamp,
            configuration: self.configuration.clone(),
            num_examples: examples.len(),
            total_duration_seconds,
            metric_reports,
            query_level_results,
        })
    }

    fn check_inputs(&self, examples: &[EvaluationExample]) -> Result<(), EvalError> {
        if examples.is_empty() {
            return Err(EvalError::InvalidInput("no examples to evaluate".to_string()));
        }
        if self.metrics.is_empty() {
            return Err(EvalError::InvalidInput("no metrics configured".to_string()));
        }

        let mut seen = HashSet::new();
        for name in self.metric_names() {
            if !seen.insert(name) {
                return Err(EvalError::InvalidInput(format!(
                    "metric '{}' configured more than once",
                    name
                )));
            }
        }
        Ok(())
    }

    async fn run_metric(
        &self,
        metric: &dyn Metric,
        examples: &[EvaluationExample],
    ) -> Result<MetricReport, EvalError> {
        let name = metric.name().to_string();
        let started = Instant::now();
        info!(metric = %name, "Running metric");

        let mut individual_scores = Vec::with_capacity(examples.len());
        let mut individual_reasoning = Vec::with_capacity(examples.len());
        let mut failed_count = 0;

        for (index, example) in examples.iter().enumerate() {
            let outcome = metric
                .evaluate(&example.query, &example.answer, &example.contexts)
                .await;

            let result = match outcome {
                Ok(result) => {
                    debug!(metric = %name, index, score = result.score, "Scored example");
                    if let Some(trace_id) = example.trace_id() {
                        self.forward_score(trace_id, &result).await;
                    }
                    result
                }
                Err(err) => match self.failure_policy {
                    FailurePolicy::FailFast => {
                        return Err(EvalError::MetricFailed {
                            metric: name,
                            index,
                            source: Box::new(err),
                        })
                    }
                    FailurePolicy::Continue => {
                        warn!(metric = %name, index, "Metric failed, recording 0.0: {}", err);
                        failed_count += 1;
                        EvaluationResult::new(&name, 0.0, format!("evaluation failed: {}", err))
                    }
                },
            };

            individual_scores.push(result.score);
            individual_reasoning.push(result.reasoning);
        }

        let statistics = calculate_statistics(&individual_scores)
            .ok_or_else(|| EvalError::InvalidInput("no scores collected".to_string()))?;
        let duration_seconds = started.elapsed().as_secs_f64();
        info!(
            metric = %name,
            mean = statistics.mean,
            failed = failed_count,
            duration_seconds,
            "Metric complete"
        );

        Ok(MetricReport {
            metric_name: name,
            average_score: statistics.mean,
            statistics,
            individual_scores,
            individual_reasoning,
            duration_seconds,
            failed_count,
        })
    }

    async fn forward_score(&self, trace_id: &str, result: &EvaluationResult) {
        let record = ScoreRecord::numeric(
            trace_id,
            &result.metric_name,
            result.score,
            &result.reasoning,
        );
        if let Err(err) = self.score_sink.create_score(&record).await {
            warn!(
                trace_id,
                metric = %result.metric_name,
                "Failed to forward score: {}",
                err
            );
        }
    }
}

fn query_level_results(
    examples: &[EvaluationExample],
    metric_reports: &[MetricReport],
) -> Vec<QueryLevelResult> {
    examples
        .iter()
        .enumerate()
        .map(|(query_index, example)| {
            let metric_scores: BTreeMap<String, f64> = metric_reports
                .iter()
                .map(|r| (r.metric_name.clone(), r.individual_scores[query_index]))
                .collect();
            let overall_score =
                metric_scores.values().sum::<f64>() / metric_scores.len().max(1) as f64;

            QueryLevelResult {
                query_index,
                query: example.query.clone(),
                metric_scores,
                overall_score,
            }
        })
        .collect()
}
