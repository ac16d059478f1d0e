//! Loading and compiling the playground script.

use rhai::AST;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{Capabilities, SandboxConfig};
use crate::engine::create_engine;
use crate::error::{EngineError, Result};

/// A compiled script, shared read-only by every run for the life of the process.
#[derive(Debug, Clone)]
pub struct ScriptProgram {
    ast: Arc<AST>,
    origin: PathBuf,
}

impl ScriptProgram {
    /// Read the script at `path` and compile it.
    pub fn load(path: impl AsRef<Path>, config: &SandboxConfig) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| EngineError::ScriptRead {
            path: path.to_path_buf(),
            source,
        })?;

        let mut program = Self::compile(&source, config)?;
        program.origin = path.to_path_buf();

        log::debug!("Compiled script from {}", path.display());
        Ok(program)
    }

    /// Compile a script from source text.
    pub fn compile(source: &str, config: &SandboxConfig) -> Result<Self> {
        let engine = create_engine(config, Capabilities::restricted());
        let ast = engine
            .compile(source)
            .map_err(|e| EngineError::ScriptParse(e.to_string()))?;

        Ok(Self {
            ast: Arc::new(ast),
            origin: PathBuf::from("<inline>"),
        })
    }

    pub fn ast(&self) -> &AST {
        &self.ast
    }

    /// Where the script was loaded from.
    pub fn origin(&self) -> &Path {
        &self.origin
    }
}
