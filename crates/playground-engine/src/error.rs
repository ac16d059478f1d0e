//! Error types for script loading, schema derivation and sandboxed execution.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while loading or running a playground script.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The script file could not be read from disk
    #[error("failed reading script file at path '{}': {source}", path.display())]
    ScriptRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The script is not syntactically valid
    #[error("failed parsing script: {0}")]
    ScriptParse(String),

    /// The describe run failed, so no option schema could be built
    #[error("failed deriving option schema: {0}")]
    SchemaDerivation(String),

    /// The interpreter could not complete the run
    #[error("error executing program: {0}")]
    Execution(String),

    /// The run was aborted after exceeding its wall-clock budget
    #[error("script execution timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// Sandbox limits could not be loaded
    #[error("invalid sandbox configuration: {0}")]
    Config(String),
}

impl EngineError {
    /// Create a new execution error.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Create a new schema derivation error.
    pub fn schema_derivation(msg: impl Into<String>) -> Self {
        Self::SchemaDerivation(msg.into())
    }
}
