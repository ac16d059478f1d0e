//! Sandbox limits and capability switches for script runs.

use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::time::Duration;

use crate::error::{EngineError, Result};

/// Resource limits applied to every script run.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SandboxConfig {
    /// Maximum number of operations a script can perform
    #[serde(default = "default_max_operations")]
    pub max_operations: u64,

    /// Maximum function call nesting depth
    #[serde(default = "default_max_call_levels")]
    pub max_call_levels: usize,

    /// Maximum size of strings in characters
    #[serde(default = "default_max_string_size")]
    pub max_string_size: usize,

    /// Maximum number of array elements
    #[serde(default = "default_max_array_size")]
    pub max_array_size: usize,

    /// Maximum bytes captured on each of stdout and stderr
    #[serde(default = "default_max_output_size")]
    pub max_output_size: usize,

    /// Maximum execution time per run
    #[serde(
        default = "default_execution_timeout",
        deserialize_with = "deserialize_duration_from_millis"
    )]
    pub execution_timeout: Duration,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_operations: default_max_operations(),
            max_call_levels: default_max_call_levels(),
            max_string_size: default_max_string_size(),
            max_array_size: default_max_array_size(),
            max_output_size: default_max_output_size(),
            execution_timeout: default_execution_timeout(),
        }
    }
}

impl SandboxConfig {
    /// Parse limits from a YAML document. Missing keys keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Load limits from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Set the execution timeout.
    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = timeout;
        self
    }

    /// Set the per-stream output ceiling.
    pub fn with_max_output_size(mut self, size: usize) -> Self {
        self.max_output_size = size;
        self
    }

    /// Set the operation budget.
    pub fn with_max_operations(mut self, ops: u64) -> Self {
        self.max_operations = ops;
        self
    }
}

fn default_max_operations() -> u64 {
    1_000_000
}

fn default_max_call_levels() -> usize {
    32
}

fn default_max_string_size() -> usize {
    1024 * 1024
}

fn default_max_array_size() -> usize {
    100_000
}

fn default_max_output_size() -> usize {
    1024 * 1024
}

fn default_execution_timeout() -> Duration {
    Duration::from_millis(5_000)
}

/// Custom deserializer for Duration from milliseconds
fn deserialize_duration_from_millis<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(millis))
}

/// Host capabilities a script run may use.
///
/// Every switch is off by default. Callers opt in explicitly; nothing is
/// inferred from where the run was started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Allow `read_file` and module imports from disk
    pub allow_file_read: bool,
    /// Allow `write_file`
    pub allow_file_write: bool,
    /// Bind `name=value` arguments as variables and expose the host argv
    pub allow_arg_vars: bool,
}

impl Capabilities {
    /// Everything disabled.
    pub fn restricted() -> Self {
        Self::default()
    }

    /// Allow or deny file reads and module imports.
    pub fn with_file_read(mut self, allow: bool) -> Self {
        self.allow_file_read = allow;
        self
    }

    /// Allow or deny file writes.
    pub fn with_file_write(mut self, allow: bool) -> Self {
        self.allow_file_write = allow;
        self
    }

    /// Allow or deny argument variables.
    pub fn with_arg_vars(mut self, allow: bool) -> Self {
        self.allow_arg_vars = allow;
        self
    }
}
