//! The grudge: who refuses traffic from whom.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::node::NodeId;

/// A set of nodes on one side of a partition.
pub type Component = BTreeSet<NodeId>;

/// Directed refusal map.
///
/// `grudge[a]` is the set of nodes whose packets `a` drops. Nothing forces
/// the relation to be symmetric, but every scheme in this crate builds it
/// symmetrically except around a bridge node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grudge(BTreeMap<NodeId, BTreeSet<NodeId>>);

impl Grudge {
    /// Creates an empty grudge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `node` drops traffic from every node in `sources`.
    pub fn refuse(&mut self, node: NodeId, sources: impl IntoIterator<Item = NodeId>) {
        self.0.entry(node).or_default().extend(sources);
    }

    /// Returns the nodes `node` refuses, if it holds a grudge at all.
    pub fn refused_by(&self, node: &NodeId) -> Option<&BTreeSet<NodeId>> {
        self.0.get(node)
    }

    /// Whether `node` drops traffic coming from `source`.
    pub fn refuses(&self, node: &NodeId, source: &NodeId) -> bool {
        self.0.get(node).is_some_and(|s| s.contains(source))
    }

    /// Removes `node` as a key and from every refusal set.
    pub fn forgive(&mut self, node: &NodeId) {
        self.0.remove(node);
        for sources in self.0.values_mut() {
            sources.remove(node);
        }
    }

    /// Iterates over `(node, refused sources)` pairs in node order.
    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &BTreeSet<NodeId>)> {
        self.0.iter()
    }

    /// Number of nodes holding a grudge.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no node holds a grudge.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of directed drop rules this grudge implies.
    pub fn rule_count(&self) -> usize {
        self.0.values().map(BTreeSet::len).sum()
    }
}

impl FromIterator<(NodeId, BTreeSet<NodeId>)> for Grudge {
    fn from_iter<I: IntoIterator<Item = (NodeId, BTreeSet<NodeId>)>>(iter: I) -> Self {
        let mut grudge = Grudge::new();
        for (node, sources) in iter {
            grudge.refuse(node, sources);
        }
        grudge
    }
}

impl IntoIterator for Grudge {
    type Item = (NodeId, BTreeSet<NodeId>);
    type IntoIter = std::collections::btree_map::IntoIter<NodeId, BTreeSet<NodeId>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for Grudge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (node, sources)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{node} -> [")?;
            for (j, source) in sources.iter().enumerate() {
                if j > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{source}")?;
            }
            f.write_str("]")?;
        }
        f.write_str("}")
    }
}
