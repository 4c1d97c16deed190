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

//! Ragcoach Core
//!
//! Data model, dataset loading, settings and retry policy shared by the
//! ragcoach evaluation harness.

pub mod config;
pub mod error;
pub mod eval_dataset;
pub mod eval_result;
pub mod resilience;
pub mod summary;

pub use config::{
    DatasetSettings, EvalConfig, EvaluationSettings, FailurePolicy, JudgeSettings,
    OutputSettings, RetrySettings, SinkSettings, DEFAULT_METRICS,
};
pub use error::{ConfigError, DatasetError};
pub use eval_dataset::{EvalDataset, EvaluationExample};
pub use eval_result::{
    EvaluationReport, EvaluationResult, MetricReport, MetricStatistics, QueryLevelResult,
};
pub use resilience::{retry_if, RetryPolicy};
