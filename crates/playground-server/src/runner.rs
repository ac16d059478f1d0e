//! Script runner trait and the sandbox-backed implementation.

use async_trait::async_trait;
use playground_engine::{Capabilities, Config, EngineError, ExecutionResult, Sandbox};
use std::sync::Arc;
use std::time::Duration;

/// Extra time allowed for the blocking task beyond the interpreter's own deadline.
const EXECUTION_GRACE: Duration = Duration::from_millis(250);

/// Trait for executing the playground script on behalf of a request.
///
/// The server only ever talks to the interpreter through this trait, which
/// keeps the request pipeline testable without a real script.
#[async_trait]
pub trait ScriptRunner: Send + Sync + Clone + 'static {
    /// Run the script with `input` as its readable stream and `config`
    /// rendered as its argument list.
    ///
    /// # Errors
    ///
    /// Returns an error only when the interpreter could not complete the run.
    /// A script that exits with a non-zero status is an `Ok` result.
    async fn run(&self, input: String, config: &Config) -> playground_engine::Result<ExecutionResult>;
}

/// Runs requests through a [`Sandbox`] on the blocking thread pool.
#[derive(Clone)]
pub struct SandboxRunner {
    sandbox: Arc<Sandbox>,
    capabilities: Capabilities,
}

impl SandboxRunner {
    /// Create a runner with every capability disabled.
    pub fn new(sandbox: Sandbox) -> Self {
        Self {
            sandbox: Arc::new(sandbox),
            capabilities: Capabilities::restricted(),
        }
    }

    /// Override the capability set used for request runs.
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

#[async_trait]
impl ScriptRunner for SandboxRunner {
    async fn run(&self, input: String, config: &Config) -> playground_engine::Result<ExecutionResult> {
        let sandbox = Arc::clone(&self.sandbox);
        let args = config.cmdline_args();
        let capabilities = self.capabilities;
        let timeout = sandbox.config().execution_timeout;

        let task =
            tokio::task::spawn_blocking(move || sandbox.execute(&input, &args, capabilities));

        match tokio::time::timeout(timeout + EXECUTION_GRACE, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(EngineError::execution(format!("script task failed: {}", e))),
            Err(_) => Err(EngineError::Timeout { timeout }),
        }
    }
}
