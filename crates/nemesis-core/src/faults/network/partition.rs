//! Network partition nemesis.
//!
//! Computes a grudge from a [`PartitionScheme`] on every start and applies
//! it through the context's network control; stop heals the network.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::context::TestContext;
use crate::error::Result;
use crate::operation::{FaultFunction, OpValue, Operation};
use crate::topology::{Grudge, PartitionScheme};
use crate::traits::Nemesis;

use super::{apply_grudge, heal};

/// Whether the partitioner believes the network is cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionState {
    /// Full connectivity.
    Healed,
    /// At least one grudge applied since the last heal.
    Partitioned,
}

/// Partition nemesis driven by a [`PartitionScheme`].
///
/// # Example
///
/// ```ignore
/// use nemesis_core::faults::network::Partitioner;
///
/// let nemesis = Partitioner::majorities_ring().with_seed(42);
/// let op = nemesis.invoke(&ctx, Operation::start()).await?;
/// ```
///
/// A start while already partitioned layers the new grudge on top of the
/// old one instead of healing first.
#[derive(Debug)]
pub struct Partitioner {
    scheme: PartitionScheme,
    rng: Mutex<StdRng>,
    state: Mutex<PartitionState>,
}

impl Partitioner {
    /// Creates a partitioner for the given scheme.
    pub fn new(scheme: PartitionScheme) -> Self {
        Self {
            scheme,
            rng: Mutex::new(StdRng::seed_from_u64(rand::thread_rng().r#gen())),
            state: Mutex::new(PartitionState::Healed),
        }
    }

    /// First half of the cluster against the second half.
    pub fn halves() -> Self {
        Self::new(PartitionScheme::Halves)
    }

    /// Two random halves.
    pub fn random_halves() -> Self {
        Self::new(PartitionScheme::RandomHalves)
    }

    /// One random node against the rest.
    pub fn random_node() -> Self {
        Self::new(PartitionScheme::RandomNode)
    }

    /// Overlapping majorities along a random ring.
    pub fn majorities_ring() -> Self {
        Self::new(PartitionScheme::MajoritiesRing)
    }

    /// Two halves joined through one bridge node.
    pub fn bridge() -> Self {
        Self::new(PartitionScheme::Bridge)
    }

    /// Reseeds the random number generator for reproducible grudges.
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    /// Returns the scheme in use.
    pub fn scheme(&self) -> PartitionScheme {
        self.scheme
    }

    /// Returns the current state.
    pub fn state(&self) -> PartitionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: PartitionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn next_grudge(&self, ctx: &TestContext) -> Result<Grudge> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        self.scheme.grudge(&ctx.nodes, &mut *rng)
    }
}

#[async_trait]
impl Nemesis for Partitioner {
    fn name(&self) -> &str {
        "partition"
    }

    async fn setup(&self, ctx: &TestContext) -> Result<()> {
        heal(ctx).await?;
        self.set_state(PartitionState::Healed);
        Ok(())
    }

    async fn invoke(&self, ctx: &TestContext, op: Operation) -> Result<Operation> {
        match op.function {
            FaultFunction::Start => {
                if self.state() == PartitionState::Partitioned {
                    warn!(scheme = %self.scheme, "Already partitioned; layering another grudge");
                }

                let grudge = self.next_grudge(ctx)?;
                apply_grudge(ctx, &grudge).await?;
                self.set_state(PartitionState::Partitioned);

                info!(
                    run_id = %ctx.run_id,
                    scheme = %self.scheme,
                    grudge = %grudge,
                    "Network partitioned"
                );
                Ok(op.with_value(OpValue::Grudge(grudge)))
            }
            FaultFunction::Stop => {
                heal(ctx).await?;
                self.set_state(PartitionState::Healed);
                info!(run_id = %ctx.run_id, "Network healed");
                Ok(op.with_value(OpValue::Message("fully connected".to_string())))
            }
        }
    }

    async fn teardown(&self, ctx: &TestContext) -> Result<()> {
        heal(ctx).await?;
        self.set_state(PartitionState::Healed);
        Ok(())
    }

    fn description(&self) -> &str {
        "Cuts the network into components by dropping packets between nodes"
    }
}
