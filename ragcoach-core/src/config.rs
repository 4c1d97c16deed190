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

//! Settings for an evaluation run.
//!
//! Loaded from a TOML file, then overridden by environment variables. The
//! resulting value is passed explicitly to the judge and the evaluator;
//! nothing reads settings from global state.

use crate::error::ConfigError;
use crate::resilience::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MASK: &str = "********";
const UNSET: &str = "<unset>";

/// Metric identifiers in their default evaluation order.
pub const DEFAULT_METRICS: [&str; 3] = ["faithfulness", "answer_relevance", "context_relevance"];

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EvalConfig {
    #[serde(default)]
    pub judge: JudgeSettings,
    #[serde(default)]
    pub dataset: DatasetSettings,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub sink: SinkSettings,
    #[serde(default)]
    pub evaluation: EvaluationSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JudgeSettings {
    /// OpenAI-compatible base URL (e.g., "https://api.groq.com/openai/v1")
    #[serde(default = "default_judge_base_url")]
    pub base_url: String,

    pub api_key: Option<String>,

    #[serde(default = "default_judge_model")]
    pub model: String,

    /// Ignored for reasoning models, which reject the parameter
    #[serde(default)]
    pub temperature: f64,

    #[serde(default = "default_judge_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatasetSettings {
    #[serde(default = "default_dataset_path")]
    pub path: PathBuf,

    /// Evaluate only the first N examples
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputSettings {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Report file name prefix; the run timestamp is appended
    #[serde(default = "default_output_prefix")]
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

/// External trace store that receives per-example scores.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SinkSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_sink_base_url")]
    pub base_url: String,
    pub public_key: Option<String>,
    pub secret_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EvaluationSettings {
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Metric names, evaluated in this order
    #[serde(default = "default_metrics")]
    pub metrics: Vec<String>,
}

/// What the evaluator does when a metric fails on one example.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the whole run on the first failure
    #[default]
    FailFast,
    /// Record a 0.0 placeholder score for the failed example and keep going
    Continue,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::FailFast => "fail_fast",
            FailurePolicy::Continue => "continue",
        }
    }
}

// Default values
fn default_judge_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_judge_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_judge_timeout() -> u64 {
    120
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("Evaluations/eval_dataset.json")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("Evaluations/results")
}

fn default_output_prefix() -> String {
    "report".to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_jitter_ms() -> u64 {
    5_000
}

fn default_sink_base_url() -> String {
    "https://cloud.langfuse.com".to_string()
}

fn default_metrics() -> Vec<String> {
    DEFAULT_METRICS.iter().map(|m| m.to_string()).collect()
}

impl Default for JudgeSettings {
    fn default() -> Self {
        Self {
            base_url: default_judge_base_url(),
            api_key: None,
            model: default_judge_model(),
            temperature: 0.0,
            timeout_secs: default_judge_timeout(),
        }
    }
}

impl Default for DatasetSettings {
    fn default() -> Self {
        Self {
            path: default_dataset_path(),
            limit: None,
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            prefix: default_output_prefix(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
        }
    }
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_sink_base_url(),
            public_key: None,
            secret_key: None,
        }
    }
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            metrics: default_metrics(),
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            multiplier: 2.0,
            jitter: Duration::from_millis(self.jitter_ms),
        }
    }
}

impl EvalConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply overrides from the process environment.
    ///
    /// Supported environment variables:
    /// - GROQ_API_KEY / GROQ_BASE_URL: judge endpoint credentials
    /// - GROQ_JUDGE_MODEL_NAME: judge model (falls back to GROQ_MODEL_NAME)
    /// - JUDGE_TEMPERATURE: judge sampling temperature
    /// - LANGFUSE_PUBLIC_KEY / LANGFUSE_SECRET_KEY / LANGFUSE_BASE_URL: score sink;
    ///   setting both keys enables it
    /// - RAGCOACH_DATASET_PATH / RAGCOACH_OUTPUT_DIR: input and output locations
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Same as [`apply_env`](Self::apply_env) with an explicit variable lookup.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = lookup("GROQ_API_KEY") {
            self.judge.api_key = Some(key);
        }
        if let Some(url) = lookup("GROQ_BASE_URL") {
            self.judge.base_url = url;
        }
        if let Some(model) = lookup("GROQ_JUDGE_MODEL_NAME").or_else(|| lookup("GROQ_MODEL_NAME")) {
            self.judge.model = model;
        }
        if let Some(temperature) = lookup("JUDGE_TEMPERATURE") {
            self.judge.temperature =
                temperature
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: "JUDGE_TEMPERATURE".to_string(),
                        value: temperature.clone(),
                    })?;
        }

        if let Some(key) = lookup("LANGFUSE_PUBLIC_KEY") {
            self.sink.public_key = Some(key);
        }
        if let Some(key) = lookup("LANGFUSE_SECRET_KEY") {
            self.sink.secret_key = Some(key);
        }
        if let Some(url) = lookup("LANGFUSE_BASE_URL") {
            self.sink.base_url = url;
        }
        if self.sink.public_key.is_some() && self.sink.secret_key.is_some() {
            self.sink.enabled = true;
        }

        if let Some(path) = lookup("RAGCOACH_DATASET_PATH") {
            self.dataset.path = PathBuf::from(path);
        }
        if let Some(dir) = lookup("RAGCOACH_OUTPUT_DIR") {
            self.output.dir = PathBuf::from(dir);
        }

        Ok(())
    }

    /// Load configuration with priority: env > file > defaults
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match config_file {
            Some(path) if path.exists() => {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(path)?
            }
            Some(path) => {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env()?;
        Ok(config)
    }

    /// Flat `section.field -> value` view of every setting, with secrets masked.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        let mut put = |key: &str, value: String| {
            map.insert(key.to_string(), value);
        };

        put("judge.base_url", self.judge.base_url.clone());
        put("judge.api_key", masked(&self.judge.api_key));
        put("judge.model", self.judge.model.clone());
        put("judge.temperature", self.judge.temperature.to_string());
        put("judge.timeout_secs", self.judge.timeout_secs.to_string());

        put("dataset.path", self.dataset.path.display().to_string());
        put(
            "dataset.limit",
            self.dataset
                .limit
                .map(|l| l.to_string())
                .unwrap_or_else(|| UNSET.to_string()),
        );

        put("output.dir", self.output.dir.display().to_string());
        put("output.prefix", self.output.prefix.clone());

        put("retry.max_attempts", self.retry.max_attempts.to_string());
        put("retry.initial_delay_ms", self.retry.initial_delay_ms.to_string());
        put("retry.max_delay_ms", self.retry.max_delay_ms.to_string());
        put("retry.jitter_ms", self.retry.jitter_ms.to_string());

        put("sink.enabled", self.sink.enabled.to_string());
        put("sink.base_url", self.sink.base_url.clone());
        put(
            "sink.public_key",
            self.sink
                .public_key
                .clone()
                .unwrap_or_else(|| UNSET.to_string()),
        );
        put("sink.secret_key", masked(&self.sink.secret_key));

        put(
            "evaluation.failure_policy",
            self.evaluation.failure_policy.as_str().to_string(),
        );
        put("evaluation.metrics", self.evaluation.metrics.join(","));

        map
    }
}

fn masked(secret: &Option<String>) -> String {
    match secret {
        Some(_) => MASK.to_string(),
        None => UNSET.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EvalConfig::default();
        assert_eq!(config.judge.temperature, 0.0);
        assert_eq!(config.retry.policy(), RetryPolicy::exponential_jitter());
        assert_eq!(config.evaluation.failure_policy, FailurePolicy::FailFast);
        assert_eq!(config.evaluation.metrics, default_metrics());
        assert!(!config.sink.enabled);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: EvalConfig = toml::from_str(
            r#"
[judge]
model = "o3-mini"

[evaluation]
failure_policy = "continue"
metrics = ["answer_relevance"]
"#,
        )
        .unwrap();

        assert_eq!(config.judge.model, "o3-mini");
        assert_eq!(config.judge.base_url, default_judge_base_url());
        assert_eq!(config.evaluation.failure_policy, FailurePolicy::Continue);
        assert_eq!(config.evaluation.metrics, vec!["answer_relevance"]);
        assert_eq!(config.output.prefix, "report");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = EvalConfig::default();
        config
            .apply_env_with(env(&[
                ("GROQ_API_KEY", "gsk-test"),
                ("GROQ_MODEL_NAME", "llama-3.1-8b-instant"),
                ("JUDGE_TEMPERATURE", "0.2"),
                ("LANGFUSE_PUBLIC_KEY", "pk"),
                ("LANGFUSE_SECRET_KEY", "sk"),
            ]))
            .unwrap();

        assert_eq!(config.judge.api_key.as_deref(), Some("gsk-test"));
        assert_eq!(config.judge.model, "llama-3.1-8b-instant");
        assert_eq!(config.judge.temperature, 0.2);
        assert!(config.sink.enabled);
    }

    #[test]
    fn test_judge_model_name_takes_precedence() {
        let mut config = EvalConfig::default();
        config
            .apply_env_with(env(&[
                ("GROQ_MODEL_NAME", "generator"),
                ("GROQ_JUDGE_MODEL_NAME", "judge"),
            ]))
            .unwrap();
        assert_eq!(config.judge.model, "judge");
    }

    #[test]
    fn test_invalid_temperature() {
        let mut config = EvalConfig::default();
        let err = config
            .apply_env_with(env(&[("JUDGE_TEMPERATURE", "warm")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_snapshot_masks_secrets() {
        let mut config = EvalConfig::default();
        config.judge.api_key = Some("gsk-secret".to_string());
        config.sink.secret_key = Some("sk-secret".to_string());

        let snapshot = config.snapshot();
        assert_eq!(snapshot["judge.api_key"], MASK);
        assert_eq!(snapshot["sink.secret_key"], MASK);
        assert_eq!(snapshot["judge.model"], default_judge_model());
        assert_eq!(snapshot["dataset.limit"], UNSET);
        assert_eq!(
            snapshot["evaluation.metrics"],
            "faithfulness,answer_relevance,context_relevance"
        );
        assert!(snapshot.values().all(|v| !v.contains("secret")));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragcoach.toml");
        std::fs::write(&path, "[dataset]\nlimit = 3\n").unwrap();

        let config = EvalConfig::from_file(&path).unwrap();
        assert_eq!(config.dataset.limit, Some(3));

        std::fs::write(&path, "[dataset\n").unwrap();
        assert!(matches!(
            EvalConfig::from_file(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}
