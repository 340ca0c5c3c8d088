//! Node identification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a node in the cluster under test.
///
/// Opaque to this crate: usually a hostname or an address that the remote
/// executor and the network control layer both understand.
///
/// # Examples
///
/// ```
/// use nemesis_core::node::NodeId;
///
/// let node = NodeId::from("n1");
/// assert_eq!(node.as_str(), "n1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a new NodeId.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Builds a node list from anything string-like.
///
/// ```
/// use nemesis_core::node::nodes;
///
/// let cluster = nodes(["n1", "n2", "n3"]);
/// assert_eq!(cluster.len(), 3);
/// ```
pub fn nodes<I, S>(ids: I) -> Vec<NodeId>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ids.into_iter().map(NodeId::new).collect()
}
