//! Capability-restricted execution of the compiled script.
//!
//! Every call to [`Sandbox::execute`] builds a fresh engine with its own
//! bounded output buffers, so no run can observe another run's input or
//! output. The compiled AST is the only thing shared between runs.

use rhai::{Array, Dynamic, Engine, EvalAltResult, ImmutableString, Position, Scope};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crate::config::{Capabilities, SandboxConfig};
use crate::engine::create_engine;
use crate::error::{EngineError, Result};
use crate::program::ScriptProgram;

/// How often (in operations) the progress callback checks the deadline.
const DEADLINE_CHECK_INTERVAL: u64 = 256;

/// Outcome of a run that reached the script's own exit path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub exit_code: i64,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Reasons the host stops a run early.
#[derive(Debug, Clone, Copy)]
enum Halt {
    Exit(i64),
    Deadline,
    OutputLimit,
}

fn halt(reason: Halt) -> Box<EvalAltResult> {
    EvalAltResult::ErrorTerminated(Dynamic::from(reason), Position::NONE).into()
}

/// Append-only byte buffer with a hard ceiling.
#[derive(Clone)]
struct OutputBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
    limit: usize,
    overflowed: Arc<AtomicBool>,
}

impl OutputBuffer {
    fn new(limit: usize) -> Self {
        Self {
            bytes: Arc::new(Mutex::new(Vec::new())),
            limit,
            overflowed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns false once the ceiling has been hit; the excess is dropped.
    fn write(&self, text: &str) -> bool {
        let mut bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        let room = self.limit.saturating_sub(bytes.len());
        if text.len() > room {
            bytes.extend_from_slice(&text.as_bytes()[..room]);
            self.overflowed.store(true, Ordering::Relaxed);
            return false;
        }
        bytes.extend_from_slice(text.as_bytes());
        true
    }

    fn overflowed(&self) -> bool {
        self.overflowed.load(Ordering::Relaxed)
    }

    fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.bytes.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Runs a [`ScriptProgram`] under [`SandboxConfig`] limits.
#[derive(Debug, Clone)]
pub struct Sandbox {
    program: ScriptProgram,
    config: SandboxConfig,
}

impl Sandbox {
    pub fn new(program: ScriptProgram, config: SandboxConfig) -> Self {
        Self { program, config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn program(&self) -> &ScriptProgram {
        &self.program
    }

    /// Run the program with `input` as its only readable stream and `args` as
    /// its argument list.
    ///
    /// A non-zero exit status is a normal result. `Err` means the interpreter
    /// itself could not finish: an uncaught script error, an exhausted limit or
    /// the deadline.
    pub fn execute(&self, input: &str, args: &[String], caps: Capabilities) -> Result<ExecutionResult> {
        let stdout = OutputBuffer::new(self.config.max_output_size);
        let stderr = OutputBuffer::new(self.config.max_output_size);

        let mut engine = create_engine(&self.config, caps);
        register_output(&mut engine, &stdout, &stderr);
        register_input(&mut engine, input, args);
        register_host_access(&mut engine, caps);

        let deadline = Instant::now() + self.config.execution_timeout;
        let (out_guard, err_guard) = (stdout.clone(), stderr.clone());
        engine.on_progress(move |ops| {
            if out_guard.overflowed() || err_guard.overflowed() {
                return Some(Dynamic::from(Halt::OutputLimit));
            }
            if ops % DEADLINE_CHECK_INTERVAL == 0 && Instant::now() >= deadline {
                return Some(Dynamic::from(Halt::Deadline));
            }
            None
        });

        let mut scope = Scope::new();
        if caps.allow_arg_vars {
            for (name, value) in assignment_args(args) {
                scope.push(name.to_string(), value.to_string());
            }
        }

        let exit_code = match engine.run_ast_with_scope(&mut scope, self.program.ast()) {
            Ok(()) => 0,
            Err(err) => match root_cause(err) {
                EvalAltResult::ErrorTerminated(token, _) => match token.try_cast::<Halt>() {
                    Some(Halt::Exit(code)) => code,
                    Some(Halt::Deadline) => {
                        return Err(EngineError::Timeout {
                            timeout: self.config.execution_timeout,
                        })
                    }
                    Some(Halt::OutputLimit) => return Err(self.output_limit_error()),
                    None => return Err(EngineError::execution("script terminated")),
                },
                other => return Err(EngineError::execution(other.to_string())),
            },
        };

        if stdout.overflowed() || stderr.overflowed() {
            return Err(self.output_limit_error());
        }

        Ok(ExecutionResult {
            exit_code,
            stdout: stdout.take(),
            stderr: stderr.take(),
        })
    }

    fn output_limit_error(&self) -> EngineError {
        EngineError::execution(format!(
            "output exceeded {} bytes",
            self.config.max_output_size
        ))
    }
}

/// Errors raised inside script functions arrive wrapped once per call frame.
fn root_cause(err: Box<EvalAltResult>) -> EvalAltResult {
    match *err {
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => root_cause(inner),
        EvalAltResult::ErrorInModule(_, inner, _) => root_cause(inner),
        other => other,
    }
}

/// `name=value` arguments whose name is a plain identifier.
fn assignment_args(args: &[String]) -> impl Iterator<Item = (&str, &str)> {
    args.iter().filter_map(|arg| {
        let (name, value) = arg.split_once('=')?;
        let mut chars = name.chars();
        let starts_ok = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if starts_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            Some((name, value))
        } else {
            None
        }
    })
}

fn register_output(engine: &mut Engine, stdout: &OutputBuffer, stderr: &OutputBuffer) {
    let out = stdout.clone();
    engine.on_print(move |text| {
        out.write(text);
        out.write("\n");
    });

    let out = stdout.clone();
    engine.register_fn("write", move |value: Dynamic| -> std::result::Result<(), Box<EvalAltResult>> {
        if out.write(&value.to_string()) {
            Ok(())
        } else {
            Err(halt(Halt::OutputLimit))
        }
    });

    let err = stderr.clone();
    engine.register_fn("write_err", move |value: Dynamic| -> std::result::Result<(), Box<EvalAltResult>> {
        if err.write(&value.to_string()) {
            Ok(())
        } else {
            Err(halt(Halt::OutputLimit))
        }
    });

    let err = stderr.clone();
    engine.register_fn("eprint", move |value: Dynamic| -> std::result::Result<(), Box<EvalAltResult>> {
        if err.write(&value.to_string()) && err.write("\n") {
            Ok(())
        } else {
            Err(halt(Halt::OutputLimit))
        }
    });

    engine.register_fn("exit", |code: i64| -> std::result::Result<(), Box<EvalAltResult>> {
        Err(halt(Halt::Exit(code)))
    });
    engine.register_fn("exit", || -> std::result::Result<(), Box<EvalAltResult>> {
        Err(halt(Halt::Exit(0)))
    });
}

fn register_input(engine: &mut Engine, input: &str, args: &[String]) {
    let text: ImmutableString = input.into();
    let lines: Array = input.lines().map(|line| Dynamic::from(line.to_string())).collect();
    let argv: Array = args.iter().map(|arg| Dynamic::from(arg.clone())).collect();

    engine.register_fn("input", move || text.clone());
    engine.register_fn("input_lines", move || lines.clone());
    engine.register_fn("args", move || argv.clone());
}

fn register_host_access(engine: &mut Engine, caps: Capabilities) {
    engine.register_fn(
        "read_file",
        move |path: ImmutableString| -> std::result::Result<String, Box<EvalAltResult>> {
            if !caps.allow_file_read {
                return Err("file reads are disabled".into());
            }
            std::fs::read_to_string(path.as_str())
                .map_err(|e| format!("cannot read '{}': {}", path, e).into())
        },
    );

    engine.register_fn(
        "write_file",
        move |path: ImmutableString, contents: ImmutableString| -> std::result::Result<(), Box<EvalAltResult>> {
            if !caps.allow_file_write {
                return Err("file writes are disabled".into());
            }
            std::fs::write(path.as_str(), contents.as_bytes())
                .map_err(|e| format!("cannot write '{}': {}", path, e).into())
        },
    );

    engine.register_fn(
        "process_args",
        move || -> std::result::Result<Array, Box<EvalAltResult>> {
            if !caps.allow_arg_vars {
                return Err("argument variables are disabled".into());
            }
            Ok(std::env::args().map(Dynamic::from).collect())
        },
    );
}
