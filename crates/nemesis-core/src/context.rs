//! Test context handed to every nemesis call.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::{NemesisError, Result};
use crate::faults::network::{IptablesNet, NetworkControl};
use crate::node::NodeId;
use crate::remote::{DryRunExecutor, RemoteExecutor};

/// What a fault needs to know about the running test.
///
/// Cloning is cheap: collaborators are shared behind `Arc`s, which is what
/// lets per-node tasks each carry their own copy.
#[derive(Clone)]
pub struct TestContext {
    /// Identifier of the test run, attached to log events.
    pub run_id: Uuid,

    /// Nodes of the cluster under test, in harness order.
    pub nodes: Vec<NodeId>,

    /// Runs commands on nodes.
    pub remote: Arc<dyn RemoteExecutor>,

    /// Drops and heals traffic between nodes.
    pub net: Arc<dyn NetworkControl>,
}

impl TestContext {
    /// Creates a context with the given nodes and collaborators.
    pub fn new(
        nodes: Vec<NodeId>,
        remote: Arc<dyn RemoteExecutor>,
        net: Arc<dyn NetworkControl>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            nodes,
            remote,
            net,
        }
    }

    /// Creates a builder for constructing a test context.
    pub fn builder() -> TestContextBuilder {
        TestContextBuilder::new()
    }
}

impl fmt::Debug for TestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestContext")
            .field("run_id", &self.run_id)
            .field("nodes", &self.nodes)
            .finish_non_exhaustive()
    }
}

/// Builder for [`TestContext`].
///
/// Defaults to a [`DryRunExecutor`] and [`IptablesNet`] when collaborators
/// are not given, so a context built without them never touches a real node.
#[derive(Default)]
pub struct TestContextBuilder {
    run_id: Option<Uuid>,
    nodes: Vec<NodeId>,
    remote: Option<Arc<dyn RemoteExecutor>>,
    net: Option<Arc<dyn NetworkControl>>,
}

impl TestContextBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the run ID.
    pub fn run_id(mut self, id: Uuid) -> Self {
        self.run_id = Some(id);
        self
    }

    /// Adds one node.
    pub fn node(mut self, node: impl Into<NodeId>) -> Self {
        self.nodes.push(node.into());
        self
    }

    /// Adds several nodes, keeping their order.
    pub fn nodes(mut self, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        self.nodes.extend(nodes);
        self
    }

    /// Sets the remote executor.
    pub fn remote(mut self, remote: Arc<dyn RemoteExecutor>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Sets the network control collaborator.
    pub fn net(mut self, net: Arc<dyn NetworkControl>) -> Self {
        self.net = Some(net);
        self
    }

    /// Builds the context.
    ///
    /// Fails when no node was given or a node appears twice.
    pub fn build(self) -> Result<TestContext> {
        if self.nodes.is_empty() {
            return Err(NemesisError::InvalidConfiguration(
                "test context needs at least one node".to_string(),
            ));
        }

        let mut seen = std::collections::BTreeSet::new();
        for node in &self.nodes {
            if !seen.insert(node) {
                return Err(NemesisError::InvalidConfiguration(format!(
                    "node {node} listed twice"
                )));
            }
        }

        Ok(TestContext {
            run_id: self.run_id.unwrap_or_else(Uuid::new_v4),
            nodes: self.nodes,
            remote: self
                .remote
                .unwrap_or_else(|| Arc::new(DryRunExecutor::new())),
            net: self.net.unwrap_or_else(|| Arc::new(IptablesNet::new())),
        })
    }
}
