//! Network faults.
//!
//! - [`NetworkControl`]: how packets get dropped and healed
//! - [`IptablesNet`]: `iptables`-based network control
//! - [`apply_grudge`] / [`heal`]: turn a grudge into drop directives
//! - [`Partitioner`]: the partition nemesis

mod partition;

pub use partition::{PartitionState, Partitioner};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::context::TestContext;
use crate::error::Result;
use crate::node::NodeId;
use crate::remote::{on_many, Command};
use crate::topology::Grudge;

/// Drops and restores traffic between nodes.
#[async_trait]
pub trait NetworkControl: Send + Sync {
    /// Makes `dest` reject every packet whose stated origin is `source`.
    async fn drop_packets(&self, ctx: &TestContext, source: &NodeId, dest: &NodeId) -> Result<()>;

    /// Removes every filter installed by `drop_packets`. Idempotent.
    async fn heal(&self, ctx: &TestContext) -> Result<()>;
}

/// Helper for generating iptables commands.
pub(crate) struct IptablesCommand {
    /// The iptables binary (iptables or ip6tables).
    binary: &'static str,
}

impl IptablesCommand {
    /// Creates a new iptables command builder.
    pub fn new(is_ipv6: bool) -> Self {
        Self {
            binary: if is_ipv6 { "ip6tables" } else { "iptables" },
        }
    }

    /// Appends a DROP rule for inbound traffic from `source`.
    pub fn drop_from(&self, source: &NodeId) -> String {
        format!("{} -A INPUT -s {} -j DROP -w", self.binary, source)
    }

    /// Flushes every rule.
    pub fn flush(&self) -> String {
        format!("{} -F -w", self.binary)
    }

    /// Deletes every non-builtin chain.
    pub fn delete_chains(&self) -> String {
        format!("{} -X -w", self.binary)
    }
}

/// Network control through `iptables` on each node.
///
/// Drops are appended to the destination's INPUT chain; healing flushes all
/// rules on every node, so it also removes rules this crate did not add.
#[derive(Debug, Clone, Copy, Default)]
pub struct IptablesNet {
    ipv6: bool,
}

impl IptablesNet {
    /// Creates an IPv4 iptables network control.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `ip6tables` instead of `iptables`.
    pub fn ipv6(mut self, ipv6: bool) -> Self {
        self.ipv6 = ipv6;
        self
    }
}

#[async_trait]
impl NetworkControl for IptablesNet {
    async fn drop_packets(&self, ctx: &TestContext, source: &NodeId, dest: &NodeId) -> Result<()> {
        let cmd = Command::new(IptablesCommand::new(self.ipv6).drop_from(source)).privileged();
        ctx.remote.run(dest, &cmd).await?;
        Ok(())
    }

    async fn heal(&self, ctx: &TestContext) -> Result<()> {
        let ipv6 = self.ipv6;
        on_many(&ctx.nodes, |node| {
            let remote = ctx.remote.clone();
            async move {
                let iptables = IptablesCommand::new(ipv6);
                remote
                    .run(&node, &Command::new(iptables.flush()).privileged())
                    .await?;
                remote
                    .run(&node, &Command::new(iptables.delete_chains()).privileged())
                    .await?;
                Ok(())
            }
        })
        .await?;
        Ok(())
    }
}

/// Applies `grudge` by issuing one drop directive per refused source.
///
/// One task per grudge entry, and inside it one task per refused source,
/// all joined before returning. Existing filters are left in place, so
/// applying a second grudge only adds drops.
pub async fn apply_grudge(ctx: &TestContext, grudge: &Grudge) -> Result<()> {
    let entries: Vec<(NodeId, Vec<NodeId>)> = grudge
        .iter()
        .filter(|(_, sources)| !sources.is_empty())
        .map(|(node, sources)| (node.clone(), sources.iter().cloned().collect()))
        .collect();

    debug!(
        nodes = entries.len(),
        rules = grudge.rule_count(),
        "Applying grudge"
    );

    let dests: Vec<NodeId> = entries.iter().map(|(n, _)| n.clone()).collect();
    on_many(&dests, |dest| {
        let ctx = ctx.clone();
        let sources = entries
            .iter()
            .find(|(n, _)| *n == dest)
            .map(|(_, s)| s.clone())
            .unwrap_or_default();
        async move {
            on_many(&sources, |source| {
                let ctx = ctx.clone();
                let dest = dest.clone();
                async move { ctx.net.drop_packets(&ctx, &source, &dest).await }
            })
            .await?;
            Ok(())
        }
    })
    .await?;

    Ok(())
}

/// Restores full connectivity.
pub async fn heal(ctx: &TestContext) -> Result<()> {
    info!(run_id = %ctx.run_id, "Healing network");
    ctx.net.heal(ctx).await
}
