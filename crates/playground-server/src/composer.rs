//! Request composition for the playground page.
//!
//! A submission moves through `Validating -> Executing -> Finished`. Every
//! branch ends in an [`Outcome`]: either the index page (possibly carrying an
//! error) or a raw download of the script output.

use playground_engine::Config;

use crate::form::{merge_overrides, validate_content, Intent, Submission};
use crate::runner::ScriptRunner;
use crate::view::PageData;

/// Shown when the request body could not be decoded.
pub const ERR_READ_REQUEST: &str = "Error reading request, please try again";
/// Prefix for content validation failures.
pub const ERR_VALIDATE: &str = "Error validating content";
/// Shown when the interpreter could not complete a run.
pub const ERR_RENDER: &str = "Error rendering preview";
/// Prefix for the script's own error output.
pub const ERR_SCRIPT: &str = "Error";

/// Terminal result of handling one request.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Render the index page. An error in the data makes this a 400.
    Page(PageData),
    /// Send the script output as an attachment.
    Download(Vec<u8>),
}

impl Outcome {
    pub fn error(&self) -> Option<&str> {
        match self {
            Outcome::Page(data) if data.has_error() => Some(data.error.as_str()),
            _ => None,
        }
    }
}

enum Stage {
    Validating(Submission),
    Executing {
        content: String,
        config: Config,
        intent: Intent,
    },
    Finished(Outcome),
}

/// Page for a plain `GET /`.
pub fn index(schema: &Config) -> Outcome {
    Outcome::Page(PageData::with_defaults(schema))
}

/// Page for a submission whose body could not be read.
pub fn read_failure(schema: &Config) -> Outcome {
    Outcome::Page(PageData {
        error: ERR_READ_REQUEST.to_string(),
        ..PageData::with_defaults(schema)
    })
}

/// Drive a submission to its outcome.
pub async fn compose<T: ScriptRunner>(
    runner: &T,
    schema: &Config,
    submission: Submission,
    max_content_size: usize,
) -> Outcome {
    let mut stage = Stage::Validating(submission);

    loop {
        stage = match stage {
            Stage::Validating(submission) => validate(schema, submission, max_content_size),
            Stage::Executing {
                content,
                config,
                intent,
            } => execute(runner, content, config, intent).await,
            Stage::Finished(outcome) => return outcome,
        };
    }
}

fn validate(schema: &Config, submission: Submission, max_content_size: usize) -> Stage {
    let config = merge_overrides(schema, submission.fields());

    match validate_content(submission.content(), max_content_size) {
        Ok(content) => Stage::Executing {
            content,
            config,
            intent: submission.intent(),
        },
        Err(e) => {
            log::debug!("Rejected submission: {}", e);
            Stage::Finished(Outcome::Page(PageData {
                content: submission.content().unwrap_or_default().to_string(),
                preview: String::new(),
                config,
                error: format!("{}: {}", ERR_VALIDATE, e),
            }))
        }
    }
}

async fn execute<T: ScriptRunner>(runner: &T, content: String, config: Config, intent: Intent) -> Stage {
    let mut data = PageData {
        content,
        preview: String::new(),
        config,
        error: String::new(),
    };

    let result = match runner.run(data.content.clone(), &data.config).await {
        Ok(result) => result,
        Err(e) => {
            log::error!("error executing program: {}", e);
            data.error = ERR_RENDER.to_string();
            return Stage::Finished(Outcome::Page(data));
        }
    };

    if !result.success() {
        log::debug!("Script exited with status {}", result.exit_code);
        data.error = format!("{}: {}", ERR_SCRIPT, result.stderr_text());
        return Stage::Finished(Outcome::Page(data));
    }

    match intent {
        Intent::Generate => {
            data.preview = result.stdout_text();
            Stage::Finished(Outcome::Page(data))
        }
        Intent::Download => Stage::Finished(Outcome::Download(result.stdout)),
        Intent::Render => Stage::Finished(Outcome::Page(data)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use playground_engine::{parse_usage, EngineError, ExecutionResult};
    use std::sync::{Arc, Mutex};

    /// Replays a fixed result and records what it was asked to run.
    #[derive(Clone)]
    struct FixedRunner {
        result: Arc<dyn Fn() -> playground_engine::Result<ExecutionResult> + Send + Sync>,
        calls: Arc<Mutex<Vec<(String, Vec<String>)>>>,
    }

    impl FixedRunner {
        fn new(
            result: impl Fn() -> playground_engine::Result<ExecutionResult> + Send + Sync + 'static,
        ) -> Self {
            Self {
                result: Arc::new(result),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn exiting(code: i64, stdout: &str, stderr: &str) -> Self {
            let (stdout, stderr) = (stdout.as_bytes().to_vec(), stderr.as_bytes().to_vec());
            Self::new(move || {
                Ok(ExecutionResult {
                    exit_code: code,
                    stdout: stdout.clone(),
                    stderr: stderr.clone(),
                })
            })
        }

        fn calls(&self) -> Vec<(String, Vec<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ScriptRunner for FixedRunner {
        async fn run(&self, input: String, config: &Config) -> playground_engine::Result<ExecutionResult> {
            self.calls.lock().unwrap().push((input, config.cmdline_args()));
            (self.result)()
        }
    }

    fn schema() -> Config {
        parse_usage("  --width=\"640\"\n  --color=\"blue\"\n")
    }

    fn submission(pairs: &[(&str, &str)]) -> Submission {
        Submission::from_fields(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_missing_content_skips_execution() {
        let runner = FixedRunner::exiting(0, "X", "");
        let outcome = compose(&runner, &schema(), submission(&[("generate", "")]), 4096).await;

        assert_eq!(
            outcome.error(),
            Some("Error validating content: missing or empty content")
        );
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_content_keeps_user_input() {
        let runner = FixedRunner::exiting(0, "X", "");
        let big = "a".repeat(11);
        let outcome = compose(
            &runner,
            &schema(),
            submission(&[("content", &big), ("config-width", "9")]),
            10,
        )
        .await;

        match outcome {
            Outcome::Page(data) => {
                assert_eq!(data.error, "Error validating content: content too large");
                assert_eq!(data.content, big);
                assert_eq!(data.config.get("width").unwrap().value, "9");
            }
            other => panic!("expected page, got {:?}", other),
        }
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_generate_fills_preview() {
        let runner = FixedRunner::exiting(0, "X", "");
        let outcome = compose(
            &runner,
            &schema(),
            submission(&[("content", "a 1"), ("generate", ""), ("config-color", "red")]),
            4096,
        )
        .await;

        match outcome {
            Outcome::Page(data) => {
                assert_eq!(data.preview, "X");
                assert!(!data.has_error());
                assert_eq!(data.content, "a 1");
            }
            other => panic!("expected page, got {:?}", other),
        }
        assert_eq!(
            runner.calls(),
            vec![(
                "a 1".to_string(),
                vec!["--width=640".to_string(), "--color=red".to_string()]
            )]
        );
    }

    #[tokio::test]
    async fn test_download_returns_raw_output() {
        let runner = FixedRunner::exiting(0, "X", "");
        let outcome = compose(
            &runner,
            &schema(),
            submission(&[("content", "a 1"), ("download", "")]),
            4096,
        )
        .await;

        assert!(matches!(outcome, Outcome::Download(ref body) if body == b"X"));
    }

    #[tokio::test]
    async fn test_no_intent_renders_page_without_preview() {
        let runner = FixedRunner::exiting(0, "X", "");
        let outcome = compose(&runner, &schema(), submission(&[("content", "a 1")]), 4096).await;

        match outcome {
            Outcome::Page(data) => {
                assert!(data.preview.is_empty());
                assert!(!data.has_error());
            }
            other => panic!("expected page, got {:?}", other),
        }
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_non_zero_exit_reports_stderr() {
        let runner = FixedRunner::exiting(1, "partial", "bad input");
        let outcome = compose(
            &runner,
            &schema(),
            submission(&[("content", "a 1"), ("download", "")]),
            4096,
        )
        .await;

        assert_eq!(outcome.error(), Some("Error: bad input"));
    }

    #[tokio::test]
    async fn test_interpreter_failure_hides_details() {
        let runner = FixedRunner::new(|| Err(EngineError::execution("stack overflow at line 3")));
        let outcome = compose(
            &runner,
            &schema(),
            submission(&[("content", "a 1"), ("generate", "")]),
            4096,
        )
        .await;

        assert_eq!(outcome.error(), Some(ERR_RENDER));
    }

    #[test]
    fn test_index_and_read_failure_pages() {
        let index = index(&schema());
        assert!(index.error().is_none());

        let failure = read_failure(&schema());
        assert_eq!(failure.error(), Some(ERR_READ_REQUEST));
        match failure {
            Outcome::Page(data) => assert_eq!(data.config, schema()),
            other => panic!("expected page, got {:?}", other),
        }
    }
}
