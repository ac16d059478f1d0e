//! Script engine for the playground service
//!
//! Loads the playground script once, derives the option schema the script
//! advertises in its usage text, and runs the script against untrusted input
//! inside a capability-restricted Rhai sandbox. Runs never share mutable
//! state: each one gets its own engine, its own bounded output buffers and its
//! own deadline.

pub mod config;
pub mod engine;
pub mod error;
pub mod program;
pub mod sandbox;
pub mod schema;

pub use config::{Capabilities, SandboxConfig};
pub use error::{EngineError, Result};
pub use program::ScriptProgram;
pub use sandbox::{ExecutionResult, Sandbox};
pub use schema::{derive_schema, parse_usage, Config, ConfigOption, OptionKind};
