//! Fault implementations, organized by category:
//!
//! - **network**: partitions built from grudges, applied with iptables
//! - **clock**: per-node clock skew through faketime
//! - **process**: start/stop faults on targeted nodes (pause, kill-restart)

pub mod clock;
pub mod network;
pub mod process;

pub use clock::ClockScrambler;
pub use network::Partitioner;
pub use process::{hammer_time, hammer_time_random, StartStopNemesis};
