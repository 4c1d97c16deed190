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

use crate::error::{DatasetError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// Keys under which an object-shaped dataset may hold its examples.
pub const EXAMPLE_KEYS: [&str; 2] = ["queries", "examples"];

/// One generated answer to be judged, together with the evidence it was built from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationExample {
    /// The user question
    pub query: String,

    /// The assistant's generated answer
    pub answer: String,

    /// Retrieved evidence, in the order it was given to the generator
    #[serde(default, deserialize_with = "null_as_default")]
    pub contexts: Vec<String>,

    /// Correlation key for the external trace store
    #[serde(default)]
    pub trace_id: Option<String>,
}

impl EvaluationExample {
    pub fn new(query: impl Into<String>, answer: impl Into<String>, contexts: Vec<String>) -> Self {
        Self {
            query: query.into(),
            answer: answer.into(),
            contexts,
            trace_id: None,
        }
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Trace id usable for score forwarding. Blank ids count as absent.
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// An ordered, immutable collection of evaluation examples.
#[derive(Debug, Clone, Default)]
pub struct EvalDataset {
    /// File the dataset was read from, if any
    pub source: Option<PathBuf>,
    examples: Vec<EvaluationExample>,
}

impl EvalDataset {
    pub fn new(examples: Vec<EvaluationExample>) -> Self {
        Self {
            source: None,
            examples,
        }
    }

    /// Read a dataset from a JSON file.
    ///
    /// Accepts either a bare array of examples or an object holding the
    /// array under `queries` or `examples`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DatasetError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut dataset = Self::from_json_str(&content)?;
        dataset.source = Some(path.to_path_buf());
        tracing::info!(
            "Loaded {} evaluation examples from {}",
            dataset.len(),
            path.display()
        );
        Ok(dataset)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(content)?;

        let items = match value {
            serde_json::Value::Array(items) => items,
            serde_json::Value::Object(mut map) => EXAMPLE_KEYS
                .iter()
                .find_map(|key| map.remove(*key))
                .and_then(|v| match v {
                    serde_json::Value::Array(items) => Some(items),
                    _ => None,
                })
                .ok_or_else(|| {
                    DatasetError::UnsupportedShape(format!(
                        "object has no array under any of {:?}",
                        EXAMPLE_KEYS
                    ))
                })?,
            other => {
                return Err(DatasetError::UnsupportedShape(format!(
                    "expected an array or object, found {}",
                    json_kind(&other)
                )))
            }
        };

        let examples = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                serde_json::from_value(item)
                    .map_err(|source| DatasetError::InvalidExample { index, source })
            })
            .collect::<Result<Vec<EvaluationExample>>>()?;

        Ok(Self::new(examples))
    }

    /// Keep only the first `limit` examples.
    pub fn truncate(&mut self, limit: usize) {
        self.examples.truncate(limit);
    }

    pub fn examples(&self) -> &[EvaluationExample] {
        &self.examples
    }

    pub fn into_examples(self) -> Vec<EvaluationExample> {
        self.examples
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
