//! Partition topologies.
//!
//! Pure functions over a node list that decide who gets cut off from whom.
//! Nothing here touches the network; the results are [`Grudge`]s handed to
//! [`apply_grudge`](crate::faults::network::apply_grudge).
//!
//! Randomized functions take the RNG as an argument so callers can pass a
//! seeded `StdRng` and reproduce a run.

mod grudge;

pub use grudge::{Component, Grudge};

use std::collections::BTreeSet;
use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{NemesisError, Result};
use crate::node::NodeId;

/// Smallest number of nodes forming a majority of `n`.
pub fn majority(n: usize) -> usize {
    n / 2 + 1
}

/// Splits `nodes` at `len / 2`, preserving order.
///
/// The first half is the smaller one when the length is odd.
pub fn bisect(nodes: &[NodeId]) -> (Vec<NodeId>, Vec<NodeId>) {
    let (first, second) = nodes.split_at(nodes.len() / 2);
    (first.to_vec(), second.to_vec())
}

/// Picks one node uniformly at random and separates it from the rest.
///
/// Returns `([loner], remainder)`.
pub fn split_one<R: Rng + ?Sized>(
    nodes: &[NodeId],
    rng: &mut R,
) -> Result<(Vec<NodeId>, Vec<NodeId>)> {
    if nodes.is_empty() {
        return Err(NemesisError::InvalidConfiguration(
            "cannot single out a node from an empty cluster".to_string(),
        ));
    }

    let idx = rng.gen_range(0..nodes.len());
    let loner = nodes[idx].clone();
    let rest = nodes
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != idx)
        .map(|(_, n)| n.clone())
        .collect();

    Ok((vec![loner], rest))
}

/// Builds a grudge where every component refuses every other component.
///
/// The universe is the union of `components`, which must be pairwise
/// disjoint. Overlapping components give meaningless results.
pub fn complete_grudge<C>(components: &[C]) -> Grudge
where
    C: AsRef<[NodeId]>,
{
    let universe: BTreeSet<NodeId> = components
        .iter()
        .flat_map(|c| c.as_ref().iter().cloned())
        .collect();

    let mut grudge = Grudge::new();
    for component in components {
        let own: Component = component.as_ref().iter().cloned().collect();
        let others: Vec<NodeId> = universe.difference(&own).cloned().collect();
        for node in &own {
            grudge.refuse(node.clone(), others.iter().cloned());
        }
    }
    grudge
}

/// Cuts the cluster in half, except for one bridge node that sees both sides.
///
/// The bridge is the first node of the second half. It holds no grudge and
/// nobody refuses it. With fewer than three nodes the bridge cannot be
/// distinct from both halves and the result degenerates.
pub fn bridge(nodes: &[NodeId]) -> Grudge {
    let (first, second) = bisect(nodes);
    let Some(bridge) = second.first().cloned() else {
        return Grudge::new();
    };

    let mut grudge = complete_grudge(&[first, second]);
    grudge.forgive(&bridge);
    grudge
}

/// Gives every node a different majority, arranged along a random ring.
///
/// Nodes are shuffled into a cycle; each rotation's window of
/// `majority(n)` consecutive nodes is what the window's first node can still
/// reach. Any two windows overlap, so any two nodes share at least one
/// reachable peer, and for `n > 2` no two windows are identical.
pub fn majorities_ring<R: Rng + ?Sized>(nodes: &[NodeId], rng: &mut R) -> Result<Grudge> {
    let n = nodes.len();
    if n < 3 {
        return Err(NemesisError::InvalidConfiguration(format!(
            "majorities ring needs at least 3 nodes, got {n}"
        )));
    }

    let universe: BTreeSet<NodeId> = nodes.iter().cloned().collect();
    let mut ring = nodes.to_vec();
    ring.shuffle(rng);

    let m = majority(n);
    let mut grudge = Grudge::new();
    for start in 0..n {
        let window: Component = (0..m).map(|k| ring[(start + k) % n].clone()).collect();
        let outside = universe.difference(&window).cloned();
        grudge.refuse(ring[start].clone(), outside);
    }
    Ok(grudge)
}

/// Named partition topologies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartitionScheme {
    /// First half against second half, in cluster order.
    Halves,
    /// Two halves of a shuffled cluster.
    RandomHalves,
    /// One random node isolated from everyone else.
    RandomNode,
    /// Overlapping majorities along a random ring.
    MajoritiesRing,
    /// Two halves joined only through a bridge node.
    Bridge,
}

impl PartitionScheme {
    /// Computes the grudge for `nodes` under this scheme.
    pub fn grudge<R: Rng + ?Sized>(&self, nodes: &[NodeId], rng: &mut R) -> Result<Grudge> {
        match self {
            PartitionScheme::Halves => {
                let (a, b) = bisect(nodes);
                Ok(complete_grudge(&[a, b]))
            }
            PartitionScheme::RandomHalves => {
                let mut shuffled = nodes.to_vec();
                shuffled.shuffle(rng);
                let (a, b) = bisect(&shuffled);
                Ok(complete_grudge(&[a, b]))
            }
            PartitionScheme::RandomNode => {
                let (loner, rest) = split_one(nodes, rng)?;
                Ok(complete_grudge(&[loner, rest]))
            }
            PartitionScheme::MajoritiesRing => majorities_ring(nodes, rng),
            PartitionScheme::Bridge => Ok(bridge(nodes)),
        }
    }

    /// Returns the scheme name as used in configuration.
    pub fn name(&self) -> &'static str {
        match self {
            PartitionScheme::Halves => "halves",
            PartitionScheme::RandomHalves => "random-halves",
            PartitionScheme::RandomNode => "random-node",
            PartitionScheme::MajoritiesRing => "majorities-ring",
            PartitionScheme::Bridge => "bridge",
        }
    }
}

impl fmt::Display for PartitionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::nodes;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn cluster(n: usize) -> Vec<NodeId> {
        (1..=n).map(|i| NodeId::new(format!("n{i}"))).collect()
    }

    fn set(ids: &[&str]) -> BTreeSet<NodeId> {
        ids.iter().map(|&s| NodeId::from(s)).collect()
    }

    #[test]
    fn test_majority() {
        assert_eq!(majority(1), 1);
        assert_eq!(majority(2), 2);
        assert_eq!(majority(3), 2);
        assert_eq!(majority(4), 3);
        assert_eq!(majority(5), 3);
    }

    #[test]
    fn test_bisect_sizes_and_order() {
        for n in 0..=20 {
            let nodes = cluster(n);
            let (first, second) = bisect(&nodes);
            assert_eq!(first.len(), n / 2);
            assert_eq!(first.len() + second.len(), n);

            let rejoined: Vec<_> = first.into_iter().chain(second).collect();
            assert_eq!(rejoined, nodes);
        }
    }

    #[test]
    fn test_split_one() {
        let mut rng = StdRng::seed_from_u64(7);
        for n in 1..=20 {
            let nodes = cluster(n);
            for _ in 0..10 {
                let (loner, rest) = split_one(&nodes, &mut rng).unwrap();
                assert_eq!(loner.len(), 1);
                assert!(!rest.contains(&loner[0]));
                assert_eq!(rest.len(), n - 1);

                let all: BTreeSet<_> = loner.iter().chain(rest.iter()).cloned().collect();
                let expected: BTreeSet<_> = nodes.iter().cloned().collect();
                assert_eq!(all, expected);
            }
        }
    }

    #[test]
    fn test_split_one_empty() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(split_one(&[], &mut rng).is_err());
    }

    #[test]
    fn test_split_one_covers_every_node() {
        let mut rng = StdRng::seed_from_u64(11);
        let nodes = cluster(4);
        let mut seen = BTreeSet::new();
        for _ in 0..200 {
            let (loner, _) = split_one(&nodes, &mut rng).unwrap();
            seen.insert(loner[0].clone());
        }
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_complete_grudge_cross_refusal() {
        let components = vec![nodes(["a", "b"]), nodes(["c"]), nodes(["d", "e", "f"])];
        let grudge = complete_grudge(&components);

        for (i, ci) in components.iter().enumerate() {
            for (j, cj) in components.iter().enumerate() {
                for a in ci {
                    for b in cj {
                        if i == j {
                            assert!(!grudge.refuses(a, b), "{a} should not refuse {b}");
                        } else {
                            assert!(grudge.refuses(a, b), "{a} should refuse {b}");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_halves_scenario() {
        let mut rng = StdRng::seed_from_u64(0);
        let grudge = PartitionScheme::Halves
            .grudge(&cluster(5), &mut rng)
            .unwrap();

        for minority in ["n1", "n2"] {
            assert_eq!(
                grudge.refused_by(&minority.into()).unwrap(),
                &set(&["n3", "n4", "n5"])
            );
        }
        for majority in ["n3", "n4", "n5"] {
            assert_eq!(
                grudge.refused_by(&majority.into()).unwrap(),
                &set(&["n1", "n2"])
            );
        }
    }

    #[test]
    fn test_bridge_excluded() {
        for n in 3..=20 {
            let nodes = cluster(n);
            let grudge = bridge(&nodes);
            let bridge_node = nodes[n / 2].clone();

            assert!(grudge.refused_by(&bridge_node).is_none());
            for (_, sources) in grudge.iter() {
                assert!(!sources.contains(&bridge_node));
            }
        }
    }

    #[test]
    fn test_bridge_five_nodes() {
        let grudge = bridge(&cluster(5));

        assert_eq!(grudge.refused_by(&"n1".into()).unwrap(), &set(&["n4", "n5"]));
        assert_eq!(grudge.refused_by(&"n2".into()).unwrap(), &set(&["n4", "n5"]));
        assert_eq!(grudge.refused_by(&"n4".into()).unwrap(), &set(&["n1", "n2"]));
        assert_eq!(grudge.refused_by(&"n5".into()).unwrap(), &set(&["n1", "n2"]));
        assert_eq!(grudge.len(), 4);
    }

    /// What each node can still reach: everything outside its grudge.
    fn majorities(nodes: &[NodeId], grudge: &Grudge) -> Vec<BTreeSet<NodeId>> {
        let universe: BTreeSet<NodeId> = nodes.iter().cloned().collect();
        nodes
            .iter()
            .map(|n| {
                let refused = grudge.refused_by(n).cloned().unwrap_or_default();
                universe.difference(&refused).cloned().collect()
            })
            .collect()
    }

    #[test]
    fn test_majorities_ring_properties() {
        let mut rng = StdRng::seed_from_u64(42);
        for n in 3..=20 {
            let nodes = cluster(n);
            let grudge = majorities_ring(&nodes, &mut rng).unwrap();
            assert_eq!(grudge.len(), n);

            let views = majorities(&nodes, &grudge);
            for (node, view) in nodes.iter().zip(&views) {
                assert_eq!(view.len(), majority(n));
                assert!(view.contains(node));
            }

            for i in 0..n {
                for j in (i + 1)..n {
                    assert!(
                        views[i].intersection(&views[j]).next().is_some(),
                        "majorities of {} and {} do not overlap",
                        nodes[i],
                        nodes[j]
                    );
                    assert_ne!(views[i], views[j]);
                }
            }
        }
    }

    #[test]
    fn test_majorities_ring_five_nodes() {
        let mut rng = StdRng::seed_from_u64(3);
        let nodes = cluster(5);
        let grudge = PartitionScheme::MajoritiesRing
            .grudge(&nodes, &mut rng)
            .unwrap();

        let views = majorities(&nodes, &grudge);
        let distinct: BTreeSet<_> = views.iter().cloned().collect();
        assert_eq!(distinct.len(), 5);
        assert!(views.iter().all(|v| v.len() == 3));
    }

    #[test]
    fn test_majorities_ring_rejects_small_clusters() {
        let mut rng = StdRng::seed_from_u64(0);
        for n in 0..3 {
            let err = majorities_ring(&cluster(n), &mut rng).unwrap_err();
            assert!(err.is_configuration_error());
        }
    }

    #[test]
    fn test_random_node_isolates_one() {
        let mut rng = StdRng::seed_from_u64(9);
        let nodes = cluster(5);
        let grudge = PartitionScheme::RandomNode.grudge(&nodes, &mut rng).unwrap();

        let loners: Vec<_> = grudge
            .iter()
            .filter(|(_, sources)| sources.len() == 4)
            .collect();
        assert_eq!(loners.len(), 1);
        assert_eq!(grudge.rule_count(), 8);
    }

    #[test]
    fn test_random_halves_partitions_everyone() {
        let mut rng = StdRng::seed_from_u64(5);
        let nodes = cluster(6);
        let grudge = PartitionScheme::RandomHalves
            .grudge(&nodes, &mut rng)
            .unwrap();

        assert_eq!(grudge.len(), 6);
        assert!(grudge.iter().all(|(_, sources)| sources.len() == 3));
    }

    #[test]
    fn test_scheme_serde_names() {
        let json = serde_json::to_string(&PartitionScheme::MajoritiesRing).unwrap();
        assert_eq!(json, "\"majorities-ring\"");
        assert_eq!(PartitionScheme::RandomHalves.to_string(), "random-halves");
    }
}
