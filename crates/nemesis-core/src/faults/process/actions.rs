//! Node actions for process faults.

use async_trait::async_trait;
use tracing::debug;

use crate::context::TestContext;
use crate::error::Result;
use crate::node::NodeId;
use crate::operation::ActionOutcome;
use crate::remote::Command;

use super::start_stop::{NodeAction, StartStopNemesis};
use super::targeter::{NodeSelector, Targeter};
use super::{ProcessCommand, Signal};

/// Pauses a process with SIGSTOP and resumes it with SIGCONT.
///
/// Every process named exactly `process` is signalled; a node with no such
/// process fails the action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalAction {
    process: String,
}

impl SignalAction {
    /// Creates an action for processes named `process`.
    pub fn new(process: impl Into<String>) -> Self {
        Self {
            process: process.into(),
        }
    }

    /// Returns the process name.
    pub fn process(&self) -> &str {
        &self.process
    }

    async fn signal(&self, ctx: &TestContext, node: &NodeId, signal: Signal) -> Result<()> {
        let cmd = Command::new(ProcessCommand::pkill(&self.process, signal)).privileged();
        ctx.remote.run(node, &cmd).await?;
        debug!(node = %node, process = %self.process, signal = %signal, "Signal sent");
        Ok(())
    }
}

#[async_trait]
impl NodeAction for SignalAction {
    async fn start(&self, ctx: &TestContext, node: &NodeId) -> Result<ActionOutcome> {
        self.signal(ctx, node, Signal::Stop).await?;
        Ok(ActionOutcome::Paused(self.process.clone()))
    }

    async fn stop(&self, ctx: &TestContext, node: &NodeId) -> Result<ActionOutcome> {
        self.signal(ctx, node, Signal::Cont).await?;
        Ok(ActionOutcome::Resumed(self.process.clone()))
    }
}

/// Pauses `process` on the nodes `targeter` picks.
///
/// ```ignore
/// use nemesis_core::faults::process::{hammer_time, FixedTargets};
///
/// let nemesis = hammer_time(FixedTargets::single("n2"), "etcd");
/// ```
pub fn hammer_time<T: Targeter>(
    targeter: T,
    process: impl Into<String>,
) -> StartStopNemesis<T, SignalAction> {
    StartStopNemesis::new("hammer-time", targeter, SignalAction::new(process))
}

/// Pauses `process` on one random node.
pub fn hammer_time_random(
    process: impl Into<String>,
) -> StartStopNemesis<NodeSelector, SignalAction> {
    hammer_time(NodeSelector::one(), process)
}

/// Crashes a process with SIGKILL and brings it back with a restart command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillRestartAction {
    process: String,
    restart_command: String,
}

impl KillRestartAction {
    /// Creates an action killing `process` and restarting it with `restart_command`.
    pub fn new(process: impl Into<String>, restart_command: impl Into<String>) -> Self {
        Self {
            process: process.into(),
            restart_command: restart_command.into(),
        }
    }

    /// Returns the process name.
    pub fn process(&self) -> &str {
        &self.process
    }

    /// Returns the restart command.
    pub fn restart_command(&self) -> &str {
        &self.restart_command
    }
}

#[async_trait]
impl NodeAction for KillRestartAction {
    async fn start(&self, ctx: &TestContext, node: &NodeId) -> Result<ActionOutcome> {
        let cmd = Command::new(ProcessCommand::pkill(&self.process, Signal::Kill)).privileged();
        ctx.remote.run(node, &cmd).await?;
        Ok(ActionOutcome::Killed(self.process.clone()))
    }

    async fn stop(&self, ctx: &TestContext, node: &NodeId) -> Result<ActionOutcome> {
        let cmd = Command::new(self.restart_command.as_str()).privileged();
        ctx.remote.run(node, &cmd).await?;
        Ok(ActionOutcome::Restarted(self.process.clone()))
    }
}
