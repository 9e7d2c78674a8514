//! External-command collaborators.
//!
//! Both backends spawn a process, write a JSON request to its stdin and
//! read a JSON document from its stdout. Children are killed when the
//! awaiting future is dropped, so a caller-side timeout cleans them up.

use std::process::{Output, Stdio};
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::backend::{AgentBackend, BaselineInvoker, BaselineOutput, BaselineRequest};
use crate::domain::composition::AgentComposition;
use crate::domain::error::{AgentError, BaselineError};
use crate::domain::trace::{AgentRun, TaskInput};

/// Spawn `command`, feed `stdin_payload`, and collect its output.
async fn run_command(command: &[String], stdin_payload: &[u8]) -> std::io::Result<Output> {
    let (exe, args) = command.split_first().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command")
    })?;

    let mut child = Command::new(exe)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(stdin_payload).await?;
        stdin.shutdown().await?;
    }

    child.wait_with_output().await
}

/// Settings for a command-backed agent system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentCommandConfig {
    /// Executable followed by its arguments.
    pub command: Vec<String>,
}

/// Runs the agent system as an external command per trial.
///
/// Request on stdin: `{composition_id, roles, task_id, repetition}`.
/// Response on stdout: an [`AgentRun`] document.
#[derive(Debug, Clone)]
pub struct CommandAgentBackend {
    config: AgentCommandConfig,
}

impl CommandAgentBackend {
    pub fn new(config: AgentCommandConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AgentBackend for CommandAgentBackend {
    async fn execute(
        &self,
        composition: &AgentComposition,
        task: &TaskInput,
    ) -> Result<AgentRun, AgentError> {
        if self.config.command.is_empty() {
            return Err(AgentError::Execution("agent command is empty".to_string()));
        }
        let payload = json!({
            "composition_id": composition.id(),
            "roles": composition.roles(),
            "task_id": task.task_id,
            "repetition": task.repetition,
        });
        let bytes =
            serde_json::to_vec(&payload).map_err(|e| AgentError::Decode(e.to_string()))?;

        let start = Instant::now();
        let output = run_command(&self.config.command, &bytes)
            .await
            .map_err(|e| AgentError::Io(e.to_string()))?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        if !output.status.success() {
            return Err(AgentError::NonZeroExit {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        let mut run: AgentRun = serde_json::from_slice(&output.stdout)
            .map_err(|e| AgentError::Decode(e.to_string()))?;
        if run.output.elapsed_ms == 0 {
            run.output.elapsed_ms = elapsed_ms;
        }
        debug!(
            composition = %composition,
            task_id = %task.task_id,
            elapsed_ms,
            "agent command finished"
        );
        Ok(run)
    }
}

/// Settings for a command-backed external baseline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BaselineCommandConfig {
    pub command: Vec<String>,
}

/// Runs the external baseline as a command, once per composition.
///
/// Stdout is decoded as [`BaselineOutput`] JSON; anything else is kept as
/// raw output text with no score.
#[derive(Debug, Clone)]
pub struct CommandBaseline {
    config: BaselineCommandConfig,
}

impl CommandBaseline {
    pub fn new(config: BaselineCommandConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BaselineInvoker for CommandBaseline {
    async fn invoke(&self, request: &BaselineRequest) -> Result<BaselineOutput, BaselineError> {
        if self.config.command.is_empty() {
            return Err(BaselineError::EmptyCommand);
        }
        let bytes = serde_json::to_vec(request).map_err(|e| BaselineError::Io(e.to_string()))?;
        let output = run_command(&self.config.command, &bytes)
            .await
            .map_err(|e| BaselineError::Io(e.to_string()))?;

        if !output.status.success() {
            return Err(BaselineError::NonZeroExit {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(
            serde_json::from_str::<BaselineOutput>(stdout.trim()).unwrap_or_else(|_| {
                BaselineOutput {
                    score: None,
                    output: stdout.trim().to_string(),
                }
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::role::AgentRole;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    fn composition() -> AgentComposition {
        AgentComposition::new([AgentRole::Manager, AgentRole::Analyst]).unwrap()
    }

    fn task() -> TaskInput {
        TaskInput {
            task_id: "paper-1".to_string(),
            repetition: 0,
        }
    }

    #[tokio::test]
    async fn test_agent_command_decodes_run() {
        let backend = CommandAgentBackend::new(AgentCommandConfig {
            command: sh(r#"cat > /dev/null; echo '{"output":{"text":"hello"},"trace":{"events":[{"from":"manager","to":"analyst","kind":"delegation"}]}}'"#),
        });
        let run = backend.execute(&composition(), &task()).await.unwrap();
        assert_eq!(run.output.text, "hello");
        assert_eq!(run.trace.events.len(), 1);
    }

    #[tokio::test]
    async fn test_agent_command_receives_request_on_stdin() {
        let backend = CommandAgentBackend::new(AgentCommandConfig {
            command: sh(r#"input=$(cat); printf '{"output":{"text":"%s"}}' "$(echo "$input" | grep -c manager+analyst)""#),
        });
        let run = backend.execute(&composition(), &task()).await.unwrap();
        assert_eq!(run.output.text, "1");
    }

    #[tokio::test]
    async fn test_agent_command_nonzero_exit() {
        let backend = CommandAgentBackend::new(AgentCommandConfig {
            command: sh("cat > /dev/null; echo broken >&2; exit 3"),
        });
        let err = backend.execute(&composition(), &task()).await.unwrap_err();
        match err {
            AgentError::NonZeroExit { code, stderr } => {
                assert_eq!(code, 3);
                assert!(stderr.contains("broken"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_agent_command_bad_json() {
        let backend = CommandAgentBackend::new(AgentCommandConfig {
            command: sh("cat > /dev/null; echo not-json"),
        });
        let err = backend.execute(&composition(), &task()).await.unwrap_err();
        assert!(matches!(err, AgentError::Decode(_)));
    }

    #[tokio::test]
    async fn test_baseline_json_and_raw_output() {
        let req = BaselineRequest::new(&composition(), &["t".to_string()]);

        let json_baseline = CommandBaseline::new(BaselineCommandConfig {
            command: sh(r#"cat > /dev/null; echo '{"score":0.7,"output":"done"}'"#),
        });
        let out = json_baseline.invoke(&req).await.unwrap();
        assert_eq!(out.score, Some(0.7));
        assert_eq!(out.output, "done");

        let raw_baseline = CommandBaseline::new(BaselineCommandConfig {
            command: sh("cat > /dev/null; echo plain text"),
        });
        let out = raw_baseline.invoke(&req).await.unwrap();
        assert_eq!(out.score, None);
        assert_eq!(out.output, "plain text");
    }

    #[tokio::test]
    async fn test_baseline_empty_command() {
        let baseline = CommandBaseline::new(BaselineCommandConfig { command: vec![] });
        let req = BaselineRequest::new(&composition(), &[]);
        assert_eq!(
            baseline.invoke(&req).await.unwrap_err(),
            BaselineError::EmptyCommand
        );
    }
}
