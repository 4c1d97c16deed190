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

//! ragcoach command-line interface

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ragcoach_core::{EvalConfig, EvalDataset, FailurePolicy};
use ragcoach_evals::{
    build_metrics, LangfuseScoreSink, LlmJudge, NoopScoreSink, OpenAIClient, RagEvaluator,
    ScoreSink,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "ragcoach")]
#[command(about = "Ragcoach - LLM-as-judge evaluation for RAG answers", long_about = None)]
struct Cli {
    /// Verbose mode
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a dataset of answered queries and write a report
    Evaluate {
        /// TOML configuration file
        #[arg(short, long, env = "RAGCOACH_CONFIG")]
        config: Option<PathBuf>,

        /// Evaluation dataset (JSON)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Directory for the report file
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Only evaluate the first N examples
        #[arg(long)]
        limit: Option<usize>,

        /// Judge model name
        #[arg(long)]
        judge_model: Option<String>,

        /// Record 0.0 for failed examples instead of aborting
        #[arg(long)]
        continue_on_error: bool,
    },

    /// Print the effective configuration (secrets masked)
    ShowConfig {
        /// TOML configuration file
        #[arg(short, long, env = "RAGCOACH_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match cli.command {
        Commands::Evaluate {
            config,
            file,
            out,
            limit,
            judge_model,
            continue_on_error,
        } => {
            let mut config =
                EvalConfig::load(config.as_deref()).context("Failed to load configuration")?;

            // Flags take priority over env and file
            if let Some(file) = file {
                config.dataset.path = file;
            }
            if let Some(out) = out {
                config.output.dir = out;
            }
            if limit.is_some() {
                config.dataset.limit = limit;
            }
            if let Some(model) = judge_model {
                config.judge.model = model;
            }
            if continue_on_error {
                config.evaluation.failure_policy = FailurePolicy::Continue;
            }

            evaluate(config).await
        }
        Commands::ShowConfig { config } => {
            let config =
                EvalConfig::load(config.as_deref()).context("Failed to load configuration")?;
            for (key, value) in config.snapshot() {
                println!("{} = {}", key, value);
            }
            Ok(())
        }
    }
}

async fn evaluate(config: EvalConfig) -> Result<()> {
    let mut dataset = EvalDataset::from_path(&config.dataset.path).with_context(|| {
        format!(
            "Failed to load dataset from {}",
            config.dataset.path.display()
        )
    })?;
    if let Some(limit) = config.dataset.limit {
        dataset.truncate(limit);
    }
    info!("Loaded {} examples", dataset.len());

    let client = OpenAIClient::from_settings(&config.judge)
        .context("Failed to build judge HTTP client")?;
    let judge = Arc::new(
        LlmJudge::new(
            Arc::new(client),
            config.judge.model.clone(),
            config.judge.temperature,
        )
        .with_retry_policy(config.retry.policy()),
    );
    let metrics = build_metrics(&config.evaluation.metrics, judge)
        .context("Invalid metric configuration")?;

    let sink: Arc<dyn ScoreSink> = match LangfuseScoreSink::from_settings(&config.sink)
        .context("Failed to build score sink")?
    {
        Some(sink) => {
            info!("Forwarding scores to {}", config.sink.base_url);
            Arc::new(sink)
        }
        None => Arc::new(NoopScoreSink),
    };

    let evaluator = RagEvaluator::new(metrics)
        .with_score_sink(sink)
        .with_configuration(config.snapshot())
        .with_failure_policy(config.evaluation.failure_policy);

    let report = evaluator
        .evaluate(dataset.examples())
        .await
        .context("Evaluation failed")?;

    println!("{}", report.format_summary());
    println!("{}", report.format_query_results());

    let path = report
        .write_to_dir(&config.output.dir, &config.output.prefix)
        .with_context(|| {
            format!(
                "Failed to write report to {}",
                config.output.dir.display()
            )
        })?;
    println!("Report saved to {}", path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_evaluate_flags() {
        let cli = Cli::try_parse_from([
            "ragcoach",
            "evaluate",
            "--file",
            "data.json",
            "--limit",
            "3",
            "--judge-model",
            "o3-mini",
            "--continue-on-error",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Evaluate {
                file,
                limit,
                judge_model,
                continue_on_error,
                ..
            } => {
                assert_eq!(file, Some(PathBuf::from("data.json")));
                assert_eq!(limit, Some(3));
                assert_eq!(judge_model.as_deref(), Some("o3-mini"));
                assert!(continue_on_error);
            }
            Commands::ShowConfig { .. } => panic!("expected evaluate"),
        }
    }
}
