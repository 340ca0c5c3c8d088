//! # Nemesis Core - Fault Injection for Cluster Tests
//!
//! Faults a test harness injects into a cluster while clients run against
//! it: network partitions, clock skew and process pauses. Each fault is a
//! [`Nemesis`] driven through `setup`, a sequence of start and stop
//! operations, and `teardown`.
//!
//! ## Overview
//!
//! - **Topology**: pure functions turning a node list into a [`Grudge`],
//!   the map from each node to the nodes it refuses traffic from
//! - **Context**: the nodes under test plus the collaborators that reach
//!   them ([`RemoteExecutor`], [`NetworkControl`](faults::network::NetworkControl))
//! - **Faults**: nemesis implementations built on the two
//! - **Config**: TOML configuration selecting and building one fault
//!
//! Per-node work always fans out with one tokio task per node; every task
//! is awaited before an operation completes.
//!
//! ## Quick Start
//!
//! ```ignore
//! use nemesis_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let ctx = TestContext::builder()
//!         .nodes(nodes(["n1", "n2", "n3", "n4", "n5"]))
//!         .build()?;
//!
//!     let nemesis = Partitioner::majorities_ring().with_seed(42);
//!     nemesis.setup(&ctx).await?;
//!
//!     let op = nemesis.invoke(&ctx, Operation::start()).await?;
//!     println!("{}", op.value);
//!
//!     // ... run the workload ...
//!
//!     nemesis.invoke(&ctx, Operation::stop()).await?;
//!     nemesis.teardown(&ctx).await
//! }
//! ```
//!
//! ## Available Faults
//!
//! - [`Partitioner`](faults::network::Partitioner): grudge-based partitions
//!   (halves, random halves, random node, bridge, majorities ring)
//! - [`ClockScrambler`](faults::clock::ClockScrambler): bounded random
//!   clock offsets through faketime
//! - [`hammer_time`](faults::process::hammer_time): SIGSTOP/SIGCONT on
//!   targeted nodes
//! - [`KillRestartAction`](faults::process::KillRestartAction): SIGKILL,
//!   then restart
//!
//! ## Safety
//!
//! Faults run privileged commands on every node they touch. Use an isolated
//! test cluster, or `dry_run` to only log what would run.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod context;
pub mod error;
pub mod faults;
pub mod node;
pub mod operation;
pub mod remote;
pub mod topology;
pub mod traits;

// Re-export main types at crate root for convenience
pub use config::{FaultConfig, LoggingConfig, NemesisConfig, TargetConfig};
pub use context::{TestContext, TestContextBuilder};
pub use error::{NemesisError, Result};
pub use node::{nodes, NodeId};
pub use operation::{ActionOutcome, FaultFunction, OpType, OpValue, Operation};
pub use remote::{on_many, Command, DryRunExecutor, RemoteExecutor, SshConfig, SshExecutor};
pub use topology::{Grudge, PartitionScheme};
pub use traits::{BoxedNemesis, Nemesis, Noop};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::context::TestContext;
    pub use crate::error::Result;
    pub use crate::faults::clock::ClockScrambler;
    pub use crate::faults::network::Partitioner;
    pub use crate::faults::process::{hammer_time, hammer_time_random, FixedTargets, NodeSelector};
    pub use crate::node::{nodes, NodeId};
    pub use crate::operation::{OpValue, Operation};
    pub use crate::traits::Nemesis;
}
