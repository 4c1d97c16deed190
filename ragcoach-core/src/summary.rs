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

//! Plain-text tables for an [`EvaluationReport`].

use crate::eval_result::EvaluationReport;

const QUERY_WIDTH: usize = 60;

impl EvaluationReport {
    /// One row per metric: mean, spread, score bands and duration.
    pub fn format_summary(&self) -> String {
        let name_width = self
            .metric_reports
            .iter()
            .map(|r| r.metric_name.len())
            .max()
            .unwrap_or(0)
            .max("Metric".len());

        let mut output = String::new();
        output.push_str(&format!(
            "Evaluation Summary ({} examples, {:.1}s)\n",
            self.num_examples, self.total_duration_seconds
        ));
        output.push_str(&format!(
            "{:<name_width$}  {:>6}  {:>7}  {:>6}  {:>6}  {:>6}  {:>16}  {:>16}  {:>16}  {:>8}\n",
            "Metric", "Mean", "Std Dev", "Min", "Median", "Max", "<0.5", "0.5-0.7", ">0.7", "Duration",
        ));

        for report in &self.metric_reports {
            let stats = &report.statistics;
            output.push_str(&format!(
                "{:<name_width$}  {:>6.3}  {:>7.3}  {:>6.3}  {:>6.3}  {:>6.3}  {:>16}  {:>16}  {:>16}  {:>7.1}s\n",
                report.metric_name,
                stats.mean,
                stats.std_dev,
                stats.min,
                stats.median,
                stats.max,
                band(stats.count_below_50, stats.percent_below_50),
                band(stats.count_50_to_70, stats.percent_50_to_70),
                band(stats.count_above_70, stats.percent_above_70),
                report.duration_seconds,
            ));
            if report.failed_count > 0 {
                output.push_str(&format!(
                    "  ({} examples scored 0.0 after evaluation failures)\n",
                    report.failed_count
                ));
            }
        }

        output
    }

    /// One row per example with each metric's score and the overall score.
    pub fn format_query_results(&self) -> String {
        let metric_names: Vec<&str> = self
            .metric_reports
            .iter()
            .map(|r| r.metric_name.as_str())
            .collect();

        let mut output = String::new();
        output.push_str("Query-Level Results\n");

        output.push_str(&format!("{:>4}  {:<w$}", "#", "Query", w = QUERY_WIDTH));
        for name in &metric_names {
            output.push_str(&format!("  {:>w$}", name, w = name.len().max(5)));
        }
        output.push_str(&format!("  {:>7}\n", "Overall"));

        for result in &self.query_level_results {
            output.push_str(&format!(
                "{:>4}  {:<w$}",
                result.query_index + 1,
                truncate_query(&result.query),
                w = QUERY_WIDTH
            ));
            for name in &metric_names {
                let score = result.metric_scores.get(*name).copied().unwrap_or(0.0);
                output.push_str(&format!("  {:>w$.3}", score, w = name.len().max(5)));
            }
            output.push_str(&format!("  {:>7.3}\n", result.overall_score));
        }

        output
    }
}

fn band(count: usize, percent: f64) -> String {
    format!("{} ({}%)", count, percent)
}

fn truncate_query(query: &str) -> String {
    let single_line = query.replace('\n', " ");
    if single_line.chars().count() <= QUERY_WIDTH {
        single_line
    } else {
        let head: String = single_line.chars().take(QUERY_WIDTH - 3).collect();
        format!("{}...", head)
    }
}
