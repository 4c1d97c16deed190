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

//! Result types produced by an evaluation run.
//!
//! Every score vector in a [`MetricReport`] is index-aligned with the input
//! example sequence, and [`EvaluationReport::query_level_results`] holds one
//! entry per example in the same order.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Output of one metric on one example.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResult {
    pub metric_name: String,
    /// Normalized to [0, 1]
    pub score: f64,
    pub reasoning: String,
}

impl EvaluationResult {
    pub fn new(metric_name: impl Into<String>, score: f64, reasoning: impl Into<String>) -> Self {
        Self {
            metric_name: metric_name.into(),
            score,
            reasoning: reasoning.into(),
        }
    }
}

/// Summary statistics over one metric's scores.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricStatistics {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    /// 25th percentile
    pub q25: f64,
    /// 75th percentile
    pub q75: f64,
    /// Scores < 0.5
    pub count_below_50: usize,
    /// Scores in [0.5, 0.7]
    pub count_50_to_70: usize,
    /// Scores > 0.7
    pub count_above_70: usize,
    pub percent_below_50: f64,
    pub percent_50_to_70: f64,
    pub percent_above_70: f64,
}

/// One metric's outcome across all examples.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricReport {
    pub metric_name: String,
    pub average_score: f64,
    pub statistics: MetricStatistics,
    pub individual_scores: Vec<f64>,
    pub individual_reasoning: Vec<String>,
    /// Wall time spent on this metric's pass
    pub duration_seconds: f64,
    /// Examples that received a placeholder score because the metric failed
    #[serde(default)]
    pub failed_count: usize,
}

/// Scores for a single example across all metrics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryLevelResult {
    pub query_index: usize,
    pub query: String,
    pub metric_scores: BTreeMap<String, f64>,
    /// Unweighted mean of `metric_scores`
    pub overall_score: f64,
}

/// Complete output document of an evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationReport {
    pub timestamp: DateTime<Utc>,
    /// Settings in effect for the run, for reproducibility
    pub configuration: BTreeMap<String, String>,
    pub num_examples: usize,
    pub total_duration_seconds: f64,
    pub metric_reports: Vec<MetricReport>,
    pub query_level_results: Vec<QueryLevelResult>,
}

impl EvaluationReport {
    pub fn metric(&self, name: &str) -> Option<&MetricReport> {
        self.metric_reports.iter().find(|r| r.metric_name == name)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// `<prefix>_<YYYYmmdd_HHMMSS>.json`, using the report's local time.
    pub fn file_name(&self, prefix: &str) -> String {
        format!("{}.json", self.file_stem(prefix))
    }

    fn file_stem(&self, prefix: &str) -> String {
        format!(
            "{}_{}",
            prefix,
            self.timestamp.with_timezone(&Local).format("%Y%m%d_%H%M%S")
        )
    }

    /// Write the report into `dir`, creating it if needed. Returns the file path.
    ///
    /// Existing reports are never overwritten: if [`file_name`](Self::file_name)
    /// is taken, `_1`, `_2`, ... is appended to the stem.
    pub fn write_to_dir(&self, dir: &Path, prefix: &str) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let json = self
            .to_json_pretty()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let stem = self.file_stem(prefix);
        let mut suffix = 0u32;
        loop {
            let path = if suffix == 0 {
                dir.join(format!("{}.json", stem))
            } else {
                dir.join(format!("{}_{}.json", stem, suffix))
            };

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(json.as_bytes())?;
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => suffix += 1,
                Err(e) => return Err(e),
            }
        }
    }
}
