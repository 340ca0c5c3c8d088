//! Generic start/stop nemesis.
//!
//! Start picks targets and runs a start action on each; stop runs the
//! matching stop action on the same nodes. The targeted set is the only
//! state, and every `invoke` holds its lock from beginning to end, so a
//! stop can never interleave with a start on the same instance.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::context::TestContext;
use crate::error::Result;
use crate::node::NodeId;
use crate::operation::{ActionOutcome, FaultFunction, OpValue, Operation};
use crate::remote::on_many;
use crate::traits::Nemesis;

use super::targeter::Targeter;

/// Per-node effect a [`StartStopNemesis`] applies and reverses.
#[async_trait]
pub trait NodeAction: Send + Sync + 'static {
    /// Applies the effect on `node`.
    async fn start(&self, ctx: &TestContext, node: &NodeId) -> Result<ActionOutcome>;

    /// Reverses the effect on `node`.
    async fn stop(&self, ctx: &TestContext, node: &NodeId) -> Result<ActionOutcome>;
}

/// Start/stop nemesis over a targeter and a node action.
///
/// At most one set of nodes is disrupted at a time. A start while active
/// reports [`OpValue::AlreadyDisrupting`] and runs nothing; a stop while idle
/// reports [`OpValue::NotStarted`]. Teardown does nothing: issue a stop first.
///
/// If an action fails the error propagates and the targeted set is left as
/// it was, so a failed start can still be reversed by a stop.
pub struct StartStopNemesis<T, A> {
    name: String,
    targeter: T,
    action: Arc<A>,
    targeted: Mutex<Option<Vec<NodeId>>>,
}

impl<T, A> StartStopNemesis<T, A>
where
    T: Targeter,
    A: NodeAction,
{
    /// Creates a start/stop nemesis.
    pub fn new(name: impl Into<String>, targeter: T, action: A) -> Self {
        Self {
            name: name.into(),
            targeter,
            action: Arc::new(action),
            targeted: Mutex::new(None),
        }
    }

    /// Returns the nodes currently disrupted, if any.
    pub async fn targeted(&self) -> Option<Vec<NodeId>> {
        self.targeted.lock().await.clone()
    }

    /// Returns the action.
    pub fn action(&self) -> &A {
        &self.action
    }

    async fn run_start(
        &self,
        ctx: &TestContext,
        targets: &[NodeId],
    ) -> Result<std::collections::BTreeMap<NodeId, ActionOutcome>> {
        on_many(targets, |node| {
            let ctx = ctx.clone();
            let action = Arc::clone(&self.action);
            async move { action.start(&ctx, &node).await }
        })
        .await
    }

    async fn run_stop(
        &self,
        ctx: &TestContext,
        targets: &[NodeId],
    ) -> Result<std::collections::BTreeMap<NodeId, ActionOutcome>> {
        on_many(targets, |node| {
            let ctx = ctx.clone();
            let action = Arc::clone(&self.action);
            async move { action.stop(&ctx, &node).await }
        })
        .await
    }
}

#[async_trait]
impl<T, A> Nemesis for StartStopNemesis<T, A>
where
    T: Targeter,
    A: NodeAction,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn setup(&self, _ctx: &TestContext) -> Result<()> {
        Ok(())
    }

    async fn invoke(&self, ctx: &TestContext, op: Operation) -> Result<Operation> {
        let mut targeted = self.targeted.lock().await;

        match op.function {
            FaultFunction::Start => {
                let targets = self.targeter.target(&ctx.nodes).into_nodes();
                if targets.is_empty() {
                    info!(nemesis = %self.name, "No target selected");
                    return Ok(op.with_value(OpValue::NoTarget).informational());
                }

                if let Some(current) = targeted.as_ref() {
                    warn!(nemesis = %self.name, current = ?current, "Already disrupting");
                    return Ok(op
                        .with_value(OpValue::AlreadyDisrupting(current.clone()))
                        .informational());
                }

                *targeted = Some(targets.clone());
                let outcomes = self.run_start(ctx, &targets).await?;
                info!(nemesis = %self.name, targets = ?targets, "Fault started");
                Ok(op.with_value(OpValue::NodeOutcomes(outcomes)).informational())
            }
            FaultFunction::Stop => {
                let Some(current) = targeted.clone() else {
                    return Ok(op.with_value(OpValue::NotStarted).informational());
                };

                let outcomes = self.run_stop(ctx, &current).await?;
                *targeted = None;
                info!(nemesis = %self.name, targets = ?current, "Fault stopped");
                Ok(op.with_value(OpValue::NodeOutcomes(outcomes)).informational())
            }
        }
    }

    async fn teardown(&self, _ctx: &TestContext) -> Result<()> {
        Ok(())
    }
}
