//! CLI command implementations.

pub mod plan;
pub mod run;

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use txlink_core::{CoreError, QueryBatch};
use txlink_driver::Command;

/// Errors raised by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The script could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// Script path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The script is not valid JSON or has the wrong shape.
    #[error("invalid script {path}: {source}")]
    Script {
        /// Script path.
        path: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// Execution failed.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// A command script.
///
/// ```json
/// {
///   "batch_size": 10,
///   "commands": [{ "sql": "insert into t values (@id)", "params": { "id": 1 } }],
///   "affected_rows": { "insert into t values (@id)": 1 }
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Script {
    /// Batch size override.
    #[serde(default)]
    pub batch_size: Option<usize>,
    /// Commands in order.
    pub commands: Vec<Command>,
    /// Affected-row counts the in-memory driver reports per SQL text.
    #[serde(default)]
    pub affected_rows: BTreeMap<String, i64>,
}

impl Script {
    /// Loads a script from a JSON file.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| CliError::Script {
            path: path.display().to_string(),
            source,
        })
    }

    /// Builds the query batch the script describes.
    pub fn to_query_batch(&self) -> QueryBatch {
        let batch: QueryBatch = self.commands.iter().cloned().collect();
        batch.with_batch_size(self.batch_size.unwrap_or(0))
    }
}
