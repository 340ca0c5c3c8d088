//! Operations exchanged between the harness and a nemesis.
//!
//! The harness sends an [`Operation`] with a [`FaultFunction`]; the nemesis
//! hands the same operation back with its [`OpValue`] filled in.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::node::NodeId;
use crate::topology::Grudge;

/// What the harness asks a nemesis to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaultFunction {
    /// Apply the fault.
    Start,
    /// Reverse the fault.
    Stop,
}

impl fmt::Display for FaultFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultFunction::Start => f.write_str("start"),
            FaultFunction::Stop => f.write_str("stop"),
        }
    }
}

/// Kind of history entry an operation represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpType {
    /// Issued by the harness.
    Invoke,
    /// Records a side effect rather than a pass/fail verdict.
    Info,
}

/// Per-node result of a start or stop action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionOutcome {
    /// Processes matching the name were paused.
    Paused(String),
    /// Processes matching the name were resumed.
    Resumed(String),
    /// Processes matching the name were killed.
    Killed(String),
    /// The named process was restarted.
    Restarted(String),
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionOutcome::Paused(p) => write!(f, "paused {p}"),
            ActionOutcome::Resumed(p) => write!(f, "resumed {p}"),
            ActionOutcome::Killed(p) => write!(f, "killed {p}"),
            ActionOutcome::Restarted(p) => write!(f, "restarted {p}"),
        }
    }
}

/// The value carried by a completed operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum OpValue {
    /// Nothing recorded.
    #[default]
    None,
    /// Free-form status.
    Message(String),
    /// The grudge that was applied.
    Grudge(Grudge),
    /// Clock offset applied to each node, in seconds.
    ClockOffsets(BTreeMap<NodeId, i64>),
    /// Result of the start or stop action on each targeted node.
    NodeOutcomes(BTreeMap<NodeId, ActionOutcome>),
    /// The targeter selected no node; nothing was done.
    NoTarget,
    /// A fault is already active on these nodes; nothing was done.
    AlreadyDisrupting(Vec<NodeId>),
    /// Stop was requested but no fault was active.
    NotStarted,
}

impl fmt::Display for OpValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpValue::None => f.write_str("nil"),
            OpValue::Message(m) => f.write_str(m),
            OpValue::Grudge(g) => write!(f, "cut off {g}"),
            OpValue::ClockOffsets(offsets) => {
                write_map(f, offsets.iter().map(|(n, t)| (n, format!("{t:+}s"))))
            }
            OpValue::NodeOutcomes(outcomes) => write_map(f, outcomes.iter()),
            OpValue::NoTarget => f.write_str("no-target"),
            OpValue::AlreadyDisrupting(nodes) => {
                f.write_str("already disrupting [")?;
                for (i, n) in nodes.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{n}")?;
                }
                f.write_str("]")
            }
            OpValue::NotStarted => f.write_str("not-started"),
        }
    }
}

fn write_map<K, V>(f: &mut fmt::Formatter<'_>, entries: impl Iterator<Item = (K, V)>) -> fmt::Result
where
    K: fmt::Display,
    V: fmt::Display,
{
    f.write_str("{")?;
    for (i, (k, v)) in entries.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{k} {v}")?;
    }
    f.write_str("}")
}

/// A nemesis operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// History entry kind.
    #[serde(rename = "type")]
    pub op_type: OpType,
    /// Requested function.
    #[serde(rename = "f")]
    pub function: FaultFunction,
    /// Effect description, filled in on completion.
    #[serde(default)]
    pub value: OpValue,
}

impl Operation {
    /// Creates an invocation of `function` with no value.
    pub fn invoke(function: FaultFunction) -> Self {
        Self {
            op_type: OpType::Invoke,
            function,
            value: OpValue::None,
        }
    }

    /// Shorthand for a start invocation.
    pub fn start() -> Self {
        Self::invoke(FaultFunction::Start)
    }

    /// Shorthand for a stop invocation.
    pub fn stop() -> Self {
        Self::invoke(FaultFunction::Stop)
    }

    /// Returns the operation with its value replaced.
    pub fn with_value(mut self, value: OpValue) -> Self {
        self.value = value;
        self
    }

    /// Tags the operation as informational.
    pub fn informational(mut self) -> Self {
        self.op_type = OpType::Info;
        self
    }

    /// Whether the operation is tagged informational.
    pub fn is_info(&self) -> bool {
        self.op_type == OpType::Info
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.op_type {
            OpType::Invoke => "invoke",
            OpType::Info => "info",
        };
        write!(f, ":{kind} :{} {}", self.function, self.value)
    }
}
