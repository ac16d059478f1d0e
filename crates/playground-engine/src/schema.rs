//! Option schema derived from the script's own usage text.
//!
//! The script is run once with `--help` and its usage output is scanned for
//! option declarations of the form:
//!
//! ```text
//!   --name="default value"
//! ```
//!
//! That text format is the only contract with the script, and
//! [`parse_usage`] is the only place that knows it.

use serde::Serialize;

use crate::config::Capabilities;
use crate::error::{EngineError, Result};
use crate::sandbox::Sandbox;

/// Argument passed to the script to request its usage text.
pub const DESCRIBE_FLAG: &str = "--help";

const OPTION_PREFIX: &str = "  --";

/// The kind of value an option holds, as inferred from its default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Text,
    Number,
}

impl OptionKind {
    /// `Number` when the value parses as an integer.
    pub fn infer(value: &str) -> Self {
        if value.parse::<i64>().is_ok() {
            OptionKind::Number
        } else {
            OptionKind::Text
        }
    }
}

/// A single tunable exposed by the script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigOption {
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: OptionKind,
}

impl ConfigOption {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            kind: OptionKind::infer(&value),
            value,
        }
    }

    /// Command-line form, `--<name>=<value>`.
    pub fn to_arg(&self) -> String {
        format!("--{}={}", self.name, self.value)
    }
}

/// Ordered set of options. Names are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Config {
    options: Vec<ConfigOption>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an option. Returns false, leaving the config unchanged, if the
    /// name is already present.
    pub fn push(&mut self, option: ConfigOption) -> bool {
        if self.position(&option.name).is_some() {
            return false;
        }
        self.options.push(option);
        true
    }

    pub fn options(&self) -> &[ConfigOption] {
        &self.options
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConfigOption> {
        self.options.iter()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ConfigOption> {
        self.options.iter().find(|o| o.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.options.iter().position(|o| o.name == name)
    }

    /// Replace the value of an existing option. Unknown names are ignored and
    /// the kind inferred from the default is kept.
    pub fn set_value(&mut self, name: &str, value: impl Into<String>) -> bool {
        match self.options.iter_mut().find(|o| o.name == name) {
            Some(option) => {
                option.value = value.into();
                true
            }
            None => false,
        }
    }

    /// Options in command-line argument format, in schema order.
    pub fn cmdline_args(&self) -> Vec<String> {
        self.options.iter().map(ConfigOption::to_arg).collect()
    }
}

impl<'a> IntoIterator for &'a Config {
    type Item = &'a ConfigOption;
    type IntoIter = std::slice::Iter<'a, ConfigOption>;

    fn into_iter(self) -> Self::IntoIter {
        self.options.iter()
    }
}

/// Scan usage text for option declarations.
pub fn parse_usage(text: &str) -> Config {
    let mut config = Config::new();

    for line in text.lines() {
        let Some(declaration) = line.strip_prefix(OPTION_PREFIX) else {
            continue;
        };
        let Some((name, value)) = declaration.split_once('=') else {
            continue;
        };

        let value = value.trim_matches('"');
        if name.is_empty() || value.is_empty() {
            continue;
        }

        if !config.push(ConfigOption::new(name, value)) {
            log::warn!("Ignoring repeated option declaration '{}'", name);
        }
    }

    config
}

/// Run the script in describe mode and build the default configuration.
pub fn derive_schema(sandbox: &Sandbox) -> Result<Config> {
    let result = sandbox
        .execute("", &[DESCRIBE_FLAG.to_string()], Capabilities::restricted())
        .map_err(|e| EngineError::schema_derivation(e.to_string()))?;

    if !result.success() {
        log::warn!(
            "Script exited with status {} while describing its options",
            result.exit_code
        );
    }

    let usage = String::from_utf8(result.stdout)
        .map_err(|e| EngineError::schema_derivation(format!("usage text is not UTF-8: {}", e)))?;

    let config = parse_usage(&usage);
    log::info!("Derived {} configurable option(s) from script", config.len());
    Ok(config)
}
