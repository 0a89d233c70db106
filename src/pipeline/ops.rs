//! External pipeline operations
//!
//! Apply, build, and test are opaque shell commands as far as the pipeline
//! is concerned: they either succeed or fail, and everything they print
//! belongs in the run log. [`ShellOps`] is the production implementation;
//! executor tests substitute scripted doubles.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::config::CommandsConfig;

/// After the deadline kill, how long to wait for the child to die before
/// abandoning it.
const KILL_GRACE: Duration = Duration::from_secs(10);

/// Inputs a stage command may interpolate.
pub struct StageContext<'a> {
    pub ticket_id: u64,
    pub workdir: &'a Path,
    pub parallelism: u32,
}

/// How a stage went wrong. `Failed` carries everything the command printed;
/// `TimedOut` means the child was killed at the pipeline deadline.
#[derive(Debug, Clone)]
pub enum StageError {
    Failed { output: String },
    TimedOut,
}

pub type StageResult = std::result::Result<String, StageError>;

/// The three external operations of the pipeline, in order.
#[async_trait]
pub trait PipelineOps: Send + Sync {
    async fn apply(&self, ctx: &StageContext<'_>, remaining: Duration) -> StageResult;
    async fn build(&self, ctx: &StageContext<'_>, remaining: Duration) -> StageResult;
    async fn test(&self, ctx: &StageContext<'_>, remaining: Duration) -> StageResult;
}

/// Runs the configured command templates via `sh -c` in the ticket working
/// copy, with `TICKET`, `WORKDIR`, and `PARALLELISM` exported.
pub struct ShellOps {
    commands: CommandsConfig,
}

impl ShellOps {
    pub fn new(commands: CommandsConfig) -> Self {
        Self { commands }
    }

    fn render(template: &str, ctx: &StageContext<'_>) -> String {
        template
            .replace("{ticket}", &ctx.ticket_id.to_string())
            .replace("{workdir}", &ctx.workdir.display().to_string())
            .replace("{parallelism}", &ctx.parallelism.to_string())
    }

    async fn run_command(
        &self,
        template: &str,
        ctx: &StageContext<'_>,
        remaining: Duration,
    ) -> StageResult {
        let command = Self::render(template, ctx);
        log::debug!("running '{}' in {}", command, ctx.workdir.display());

        let spawned = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .current_dir(ctx.workdir)
            .env("TICKET", ctx.ticket_id.to_string())
            .env("WORKDIR", ctx.workdir)
            .env("PARALLELISM", ctx.parallelism.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                return Err(StageError::Failed {
                    output: format!("failed to spawn '{command}': {e}"),
                });
            }
        };

        // Drain the pipes concurrently; a chatty build must not block on a
        // full pipe while we wait for it to exit.
        let out_task = tokio::spawn(slurp(child.stdout.take()));
        let err_task = tokio::spawn(slurp(child.stderr.take()));

        match tokio::time::timeout(remaining, child.wait()).await {
            Ok(Ok(status)) => {
                let mut output = out_task.await.unwrap_or_default();
                let stderr = err_task.await.unwrap_or_default();
                if !stderr.is_empty() {
                    if !output.is_empty() {
                        output.push_str("\n--- stderr ---\n");
                    }
                    output.push_str(&stderr);
                }
                if status.success() {
                    Ok(output)
                } else {
                    output.push_str(&format!("\ncommand '{command}' exited with {status}"));
                    Err(StageError::Failed { output })
                }
            }
            Ok(Err(e)) => Err(StageError::Failed {
                output: format!("command '{command}' failed: {e}"),
            }),
            Err(_) => {
                let _ = child.start_kill();
                let _ = tokio::time::timeout(KILL_GRACE, child.wait()).await;
                out_task.abort();
                err_task.abort();
                Err(StageError::TimedOut)
            }
        }
    }
}

async fn slurp<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let mut text = String::new();
    if let Some(mut reader) = pipe {
        let _ = reader.read_to_string(&mut text).await;
    }
    text
}

#[async_trait]
impl PipelineOps for ShellOps {
    async fn apply(&self, ctx: &StageContext<'_>, remaining: Duration) -> StageResult {
        self.run_command(&self.commands.apply, ctx, remaining).await
    }

    async fn build(&self, ctx: &StageContext<'_>, remaining: Duration) -> StageResult {
        self.run_command(&self.commands.build, ctx, remaining).await
    }

    async fn test(&self, ctx: &StageContext<'_>, remaining: Duration) -> StageResult {
        self.run_command(&self.commands.test, ctx, remaining).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn ops_with(apply: &str, build: &str, test: &str) -> ShellOps {
        ShellOps::new(CommandsConfig {
            apply: apply.to_string(),
            build: build.to_string(),
            test: test.to_string(),
        })
    }

    fn ctx(workdir: &Path) -> StageContext<'_> {
        StageContext {
            ticket_id: 42,
            workdir,
            parallelism: 2,
        }
    }

    #[test]
    fn test_render_substitutes_placeholders() {
        let dir = Path::new("/work/tickets/42");
        let rendered = ShellOps::render("apply {ticket} in {workdir} -j{parallelism}", &ctx(dir));
        assert_eq!(rendered, "apply 42 in /work/tickets/42 -j2");
    }

    #[tokio::test]
    async fn test_success_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let ops = ops_with("echo applying {ticket}", "true", "true");
        let output = ops.apply(&ctx(dir.path()), Duration::from_secs(5)).await.unwrap();
        assert!(output.contains("applying 42"));
    }

    #[tokio::test]
    async fn test_failure_carries_output_and_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let ops = ops_with("true", "echo broken >&2; false", "true");
        let err = ops.build(&ctx(dir.path()), Duration::from_secs(5)).await.unwrap_err();
        match err {
            StageError::Failed { output } => {
                assert!(output.contains("broken"));
                assert!(output.contains("exited with"));
            }
            StageError::TimedOut => panic!("expected failure, not timeout"),
        }
    }

    #[tokio::test]
    async fn test_environment_is_exported() {
        let dir = tempfile::tempdir().unwrap();
        let ops = ops_with(
            "true",
            "true",
            "test \"$TICKET\" = \"42\" && test \"$PARALLELISM\" = \"2\" && test -n \"$WORKDIR\"",
        );
        assert!(ops.test(&ctx(dir.path()), Duration::from_secs(5)).await.is_ok());
    }

    #[tokio::test]
    async fn test_commands_run_in_the_workdir() {
        let dir = tempfile::tempdir().unwrap();
        let ops = ops_with("touch was-here", "true", "true");
        ops.apply(&ctx(dir.path()), Duration::from_secs(5)).await.unwrap();
        assert!(dir.path().join("was-here").exists());
    }

    #[tokio::test]
    async fn test_deadline_kills_the_child() {
        let dir = tempfile::tempdir().unwrap();
        let ops = ops_with("true", "sleep 30", "true");
        let started = Instant::now();
        let err = ops
            .build(&ctx(dir.path()), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::TimedOut));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
