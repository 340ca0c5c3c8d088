//! Choosing which nodes a fault hits.

use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::node::NodeId;
use crate::topology::majority;

/// What a targeter selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Targets {
    /// Nothing to disrupt.
    None,
    /// A single node.
    One(NodeId),
    /// Several nodes.
    Many(Vec<NodeId>),
}

impl Targets {
    /// Flattens the selection into a list, empty for [`Targets::None`].
    pub fn into_nodes(self) -> Vec<NodeId> {
        match self {
            Targets::None => Vec::new(),
            Targets::One(node) => vec![node],
            Targets::Many(nodes) => nodes,
        }
    }
}

impl From<Option<NodeId>> for Targets {
    fn from(node: Option<NodeId>) -> Self {
        node.map_or(Targets::None, Targets::One)
    }
}

impl From<Vec<NodeId>> for Targets {
    fn from(nodes: Vec<NodeId>) -> Self {
        if nodes.is_empty() {
            Targets::None
        } else {
            Targets::Many(nodes)
        }
    }
}

/// Strategy picking the nodes a start/stop fault applies to.
pub trait Targeter: Send + Sync {
    /// Selects targets among `nodes`.
    fn target(&self, nodes: &[NodeId]) -> Targets;
}

impl<T: Targeter + ?Sized> Targeter for Box<T> {
    fn target(&self, nodes: &[NodeId]) -> Targets {
        (**self).target(nodes)
    }
}

/// How many nodes a [`NodeSelector`] picks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Selection {
    /// One node, uniformly at random.
    #[default]
    One,
    /// A random minority: one fewer than a majority.
    Minority,
    /// A random majority.
    Majority,
    /// Every node.
    All,
}

/// Random targeter over a [`Selection`].
#[derive(Debug)]
pub struct NodeSelector {
    selection: Selection,
    rng: Mutex<StdRng>,
}

impl NodeSelector {
    /// Creates a selector.
    pub fn new(selection: Selection) -> Self {
        Self {
            selection,
            rng: Mutex::new(StdRng::seed_from_u64(rand::thread_rng().r#gen())),
        }
    }

    /// One random node.
    pub fn one() -> Self {
        Self::new(Selection::One)
    }

    /// Reseeds the random number generator.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Returns the selection.
    pub fn selection(&self) -> Selection {
        self.selection
    }
}

impl Targeter for NodeSelector {
    fn target(&self, nodes: &[NodeId]) -> Targets {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        match self.selection {
            Selection::One => nodes.choose(&mut *rng).cloned().into(),
            Selection::Minority | Selection::Majority => {
                let count = match self.selection {
                    Selection::Minority => majority(nodes.len()).saturating_sub(1),
                    _ => majority(nodes.len()).min(nodes.len()),
                };
                nodes
                    .choose_multiple(&mut *rng, count)
                    .cloned()
                    .collect::<Vec<_>>()
                    .into()
            }
            Selection::All => nodes.to_vec().into(),
        }
    }
}

/// Targeter always returning the same nodes.
#[derive(Debug, Clone, Default)]
pub struct FixedTargets(pub Vec<NodeId>);

impl FixedTargets {
    /// Targets a single node.
    pub fn single(node: impl Into<NodeId>) -> Self {
        Self(vec![node.into()])
    }
}

impl Targeter for FixedTargets {
    fn target(&self, _nodes: &[NodeId]) -> Targets {
        match self.0.as_slice() {
            [] => Targets::None,
            [node] => Targets::One(node.clone()),
            many => Targets::Many(many.to_vec()),
        }
    }
}
