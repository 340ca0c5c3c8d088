//! Clock scrambler nemesis.
//!
//! Gives every node its own random clock offset, bounded by `dt`, so the
//! cluster disagrees about the time without any node drifting unboundedly.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::context::TestContext;
use crate::error::{NemesisError, Result};
use crate::node::NodeId;
use crate::operation::{FaultFunction, OpValue, Operation};
use crate::remote::on_many;
use crate::traits::Nemesis;

use super::{set_time, DEFAULT_FAKETIME_PATH};

/// Clock skew nemesis.
///
/// On start each node gets an offset drawn uniformly from `[-dt, dt)`
/// seconds; stop and teardown put every node back at zero.
///
/// # Example
///
/// ```ignore
/// use nemesis_core::faults::clock::ClockScrambler;
///
/// // Up to five minutes either way
/// let scrambler = ClockScrambler::new(300)?.with_seed(7);
/// ```
#[derive(Debug)]
pub struct ClockScrambler {
    /// Bound on the offset, in seconds.
    dt: i64,
    /// faketime configuration file on each node.
    faketime_path: String,
    rng: Mutex<StdRng>,
}

impl ClockScrambler {
    /// Creates a scrambler with offsets bounded by `dt_secs`.
    pub fn new(dt_secs: u32) -> Result<Self> {
        if dt_secs == 0 {
            return Err(NemesisError::InvalidConfiguration(
                "clock skew bound must be at least one second".to_string(),
            ));
        }

        Ok(Self {
            dt: i64::from(dt_secs),
            faketime_path: DEFAULT_FAKETIME_PATH.to_string(),
            rng: Mutex::new(StdRng::seed_from_u64(rand::thread_rng().r#gen())),
        })
    }

    /// Sets the faketime configuration file path.
    pub fn faketime_path(mut self, path: impl Into<String>) -> Self {
        self.faketime_path = path.into();
        self
    }

    /// Reseeds the random number generator for reproducible offsets.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Returns the offset bound in seconds.
    pub fn dt(&self) -> i64 {
        self.dt
    }

    /// Draws one offset per node.
    fn sample_offsets(&self, nodes: &[NodeId]) -> BTreeMap<NodeId, i64> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        nodes
            .iter()
            .map(|n| (n.clone(), rng.gen_range(-self.dt..self.dt)))
            .collect()
    }

    /// Applies `offsets` to their nodes concurrently.
    async fn apply(
        &self,
        ctx: &TestContext,
        offsets: BTreeMap<NodeId, i64>,
    ) -> Result<BTreeMap<NodeId, i64>> {
        let targets: Vec<NodeId> = offsets.keys().cloned().collect();
        on_many(&targets, |node| {
            let ctx = ctx.clone();
            let path = self.faketime_path.clone();
            let offset = offsets.get(&node).copied().unwrap_or(0);
            async move {
                set_time(&ctx, &node, &path, offset).await?;
                debug!(node = %node, offset_secs = offset, "Clock offset set");
                Ok(offset)
            }
        })
        .await
    }

    /// Puts every node back at offset zero.
    async fn reset(&self, ctx: &TestContext) -> Result<BTreeMap<NodeId, i64>> {
        let zeros = ctx.nodes.iter().map(|n| (n.clone(), 0)).collect();
        self.apply(ctx, zeros).await
    }
}

#[async_trait]
impl Nemesis for ClockScrambler {
    fn name(&self) -> &str {
        "clock-scrambler"
    }

    async fn setup(&self, _ctx: &TestContext) -> Result<()> {
        Ok(())
    }

    async fn invoke(&self, ctx: &TestContext, op: Operation) -> Result<Operation> {
        let offsets = match op.function {
            FaultFunction::Start => {
                let offsets = self.apply(ctx, self.sample_offsets(&ctx.nodes)).await?;
                info!(run_id = %ctx.run_id, dt = self.dt, "Clocks scrambled");
                offsets
            }
            FaultFunction::Stop => {
                let offsets = self.reset(ctx).await?;
                info!(run_id = %ctx.run_id, "Clocks restored");
                offsets
            }
        };
        Ok(op.with_value(OpValue::ClockOffsets(offsets)).informational())
    }

    async fn teardown(&self, ctx: &TestContext) -> Result<()> {
        self.reset(ctx).await?;
        Ok(())
    }

    fn description(&self) -> &str {
        "Skews each node's clock by a random bounded offset through faketime"
    }
}
