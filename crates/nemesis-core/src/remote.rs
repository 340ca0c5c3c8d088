//! Remote command execution.
//!
//! Faults never talk to nodes directly. They build [`Command`]s and hand them
//! to a [`RemoteExecutor`] together with the node they are meant for, and
//! fan out over many nodes with [`on_many`].

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{NemesisError, Result};
use crate::node::NodeId;

/// A shell command line to run on a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// The command line, interpreted by `sh`.
    pub line: String,
    /// Whether to run it as root.
    pub privileged: bool,
}

impl Command {
    /// Creates an unprivileged command.
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            privileged: false,
        }
    }

    /// Marks the command as requiring root.
    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    /// Renders the command as it is sent to the node.
    pub fn render(&self) -> String {
        if self.privileged {
            format!("sudo -n sh -c {}", shell_quote(&self.line))
        } else {
            self.line.clone()
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Wraps `s` in single quotes for `sh`.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Output of a command run on a node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exit status; `-1` when the process was killed by a signal.
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl ExecOutput {
    /// A successful run with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Whether the command exited with status zero.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs commands on cluster nodes.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Runs `command` on `node` and returns its output, whatever the exit code.
    async fn exec(&self, node: &NodeId, command: &Command) -> Result<ExecOutput>;

    /// Runs `command` on `node`, failing on a non-zero exit.
    ///
    /// Returns the trimmed standard output.
    async fn run(&self, node: &NodeId, command: &Command) -> Result<String> {
        debug!(node = %node, command = %command, "Executing command");
        let output = self.exec(node, command).await?;
        if !output.success() {
            let reason = if output.stderr.trim().is_empty() {
                format!("exit status {}", output.exit_code)
            } else {
                format!("exit status {}: {}", output.exit_code, output.stderr.trim())
            };
            return Err(NemesisError::command_failed(node, command.render(), reason));
        }
        Ok(output.stdout.trim().to_string())
    }
}

/// Runs `action` once per node, all in parallel, and collects the results.
///
/// Every node gets its own tokio task and is passed to `action` explicitly.
/// All tasks are spawned before any is awaited and every task is awaited,
/// so a failure on one node never cancels the others. Failures are folded
/// with [`NemesisError::from_failures`].
pub async fn on_many<T, F, Fut>(nodes: &[NodeId], action: F) -> Result<BTreeMap<NodeId, T>>
where
    F: Fn(NodeId) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let tasks: Vec<_> = nodes
        .iter()
        .map(|node| (node.clone(), tokio::spawn(action(node.clone()))))
        .collect();

    let (nodes, handles): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
    let joined = futures::future::join_all(handles).await;

    let mut results = BTreeMap::new();
    let mut failures = Vec::new();
    for (node, outcome) in nodes.into_iter().zip(joined) {
        match outcome {
            Ok(Ok(value)) => {
                results.insert(node, value);
            }
            Ok(Err(e)) => {
                warn!(node = %node, error = %e, "Node task failed");
                failures.push(e);
            }
            Err(e) => {
                warn!(node = %node, error = %e, "Node task panicked or was cancelled");
                failures.push(NemesisError::TaskFailed {
                    node,
                    reason: e.to_string(),
                });
            }
        }
    }

    NemesisError::from_failures(failures)?;
    Ok(results)
}

/// Executor that logs and records commands instead of running them.
///
/// Every command succeeds with empty output unless its node was registered
/// with [`DryRunExecutor::fail_on`], in which case it exits with status 1.
#[derive(Debug, Default)]
pub struct DryRunExecutor {
    log: Mutex<Vec<(NodeId, String)>>,
    failing: Vec<NodeId>,
}

impl DryRunExecutor {
    /// Creates a new dry-run executor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every command on `node` fail.
    pub fn fail_on(mut self, node: impl Into<NodeId>) -> Self {
        self.failing.push(node.into());
        self
    }

    /// Returns every `(node, rendered command)` seen so far, in arrival order.
    pub fn commands(&self) -> Vec<(NodeId, String)> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the rendered commands sent to `node`, in order.
    pub fn commands_for(&self, node: &NodeId) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|(n, _)| n == node)
            .map(|(_, c)| c)
            .collect()
    }
}

#[async_trait]
impl RemoteExecutor for DryRunExecutor {
    async fn exec(&self, node: &NodeId, command: &Command) -> Result<ExecOutput> {
        let rendered = command.render();
        info!(node = %node, command = %rendered, "Dry-run: would execute");
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((node.clone(), rendered));

        if self.failing.contains(node) {
            return Ok(ExecOutput {
                exit_code: 1,
                stdout: String::new(),
                stderr: "dry-run failure".to_string(),
            });
        }
        Ok(ExecOutput::default())
    }
}

/// SSH connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// Remote user.
    pub user: String,
    /// Remote port.
    pub port: u16,
    /// Private key to authenticate with; the agent is used when unset.
    pub identity_file: Option<PathBuf>,
    /// Whether to verify host keys.
    pub strict_host_key_checking: bool,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            port: 22,
            identity_file: None,
            strict_host_key_checking: false,
        }
    }
}

/// Executor shelling out to the system `ssh` client.
#[derive(Debug, Clone, Default)]
pub struct SshExecutor {
    config: SshConfig,
}

impl SshExecutor {
    /// Creates an SSH executor.
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    /// Builds the `ssh` argument list for one command.
    fn args(&self, node: &NodeId, command: &Command) -> Vec<String> {
        let strict = if self.config.strict_host_key_checking {
            "yes"
        } else {
            "no"
        };

        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("StrictHostKeyChecking={strict}"),
            "-p".to_string(),
            self.config.port.to_string(),
        ];
        if let Some(key) = &self.config.identity_file {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        args.push(format!("{}@{}", self.config.user, node));
        args.push("--".to_string());
        args.push(command.render());
        args
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn exec(&self, node: &NodeId, command: &Command) -> Result<ExecOutput> {
        let output = tokio::process::Command::new("ssh")
            .args(self.args(node, command))
            .output()
            .await?;

        Ok(ExecOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::nodes;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_command_render() {
        assert_eq!(Command::new("date").render(), "date");
        assert_eq!(
            Command::new("echo 'x' > /tmp/f").privileged().render(),
            r"sudo -n sh -c 'echo '\''x'\'' > /tmp/f'"
        );
    }

    #[test]
    fn test_ssh_args() {
        let exec = SshExecutor::new(SshConfig {
            user: "admin".to_string(),
            port: 2222,
            identity_file: Some(PathBuf::from("/keys/id")),
            strict_host_key_checking: true,
        });
        let args = exec.args(&"n1".into(), &Command::new("uptime"));

        assert!(args.contains(&"StrictHostKeyChecking=yes".to_string()));
        assert!(args.contains(&"2222".to_string()));
        assert!(args.contains(&"/keys/id".to_string()));
        assert_eq!(args[args.len() - 2], "--");
        assert_eq!(args.last().unwrap(), "uptime");
        assert!(args.contains(&"admin@n1".to_string()));
    }

    #[tokio::test]
    async fn test_run_fails_on_nonzero_exit() {
        let exec = DryRunExecutor::new().fail_on("n2");

        assert!(exec.run(&"n1".into(), &Command::new("true")).await.is_ok());
        let err = exec
            .run(&"n2".into(), &Command::new("true"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NemesisError::CommandFailed { ref node, .. } if node.as_str() == "n2"
        ));
    }

    #[tokio::test]
    async fn test_on_many_collects_every_node() {
        let cluster = nodes(["n1", "n2", "n3"]);
        let results = on_many(&cluster, |node| async move { Ok(node.to_string().len()) })
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[&NodeId::from("n2")], 2);
    }

    #[tokio::test]
    async fn test_on_many_runs_in_parallel() {
        let cluster = nodes(["n1", "n2", "n3", "n4"]);
        let started = std::time::Instant::now();
        on_many(&cluster, |_| async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await
        .unwrap();

        assert!(started.elapsed() < Duration::from_millis(700));
    }

    #[tokio::test]
    async fn test_on_many_waits_for_siblings_and_aggregates() {
        let exec = Arc::new(DryRunExecutor::new().fail_on("n1").fail_on("n3"));
        let cluster = nodes(["n1", "n2", "n3"]);

        let err = on_many(&cluster, |node| {
            let exec = Arc::clone(&exec);
            async move { exec.run(&node, &Command::new("hostname")).await }
        })
        .await
        .unwrap_err();

        match err {
            NemesisError::Multiple(errs) => assert_eq!(errs.len(), 2),
            other => panic!("expected Multiple, got {other:?}"),
        }
        // The healthy sibling still ran.
        assert_eq!(exec.commands_for(&"n2".into()).len(), 1);
    }

    #[tokio::test]
    async fn test_on_many_reports_panics() {
        let cluster = nodes(["n1"]);
        let err = on_many(&cluster, |_| async {
            if true {
                panic!("boom");
            }
            Ok(())
        })
        .await
        .unwrap_err();

        assert!(matches!(err, NemesisError::TaskFailed { .. }));
    }
}
