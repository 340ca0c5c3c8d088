//! Error types for the nemesis fault injection core.

use thiserror::Error;

use crate::node::NodeId;

/// Result type alias for nemesis operations.
pub type Result<T> = std::result::Result<T, NemesisError>;

/// Errors that can occur while applying or reversing a fault.
///
/// Expected outcomes of concurrent scheduling (no target, already active,
/// not started) are not errors; they travel in the operation value. Anything
/// here means a fault could not be reliably applied or reversed.
#[derive(Debug, Error)]
pub enum NemesisError {
    /// A remote command exited unsuccessfully.
    #[error("Command failed on {node}: {command} - {reason}")]
    CommandFailed {
        /// Node the command ran on.
        node: NodeId,
        /// Rendered command line.
        command: String,
        /// Exit status and stderr.
        reason: String,
    },

    /// Invalid configuration or arguments.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A per-node task panicked or was cancelled.
    #[error("Task for {node} failed: {reason}")]
    TaskFailed {
        /// Node the task was working on.
        node: NodeId,
        /// Join error description.
        reason: String,
    },

    /// Several per-node tasks failed in the same fan-out.
    #[error("{} node tasks failed", .0.len())]
    Multiple(Vec<NemesisError>),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration file could not be parsed.
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),
}

impl NemesisError {
    /// Creates a new command failed error.
    pub fn command_failed(
        node: &NodeId,
        command: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            node: node.clone(),
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Folds the failures of one fan-out into a single result.
    ///
    /// No failures is `Ok`, a single failure is returned unchanged and
    /// several are wrapped in [`NemesisError::Multiple`].
    pub fn from_failures(mut failures: Vec<NemesisError>) -> Result<()> {
        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.remove(0)),
            _ => Err(NemesisError::Multiple(failures)),
        }
    }

    /// Returns the nodes this error is attributed to, if any.
    pub fn nodes(&self) -> Vec<&NodeId> {
        match self {
            NemesisError::CommandFailed { node, .. } | NemesisError::TaskFailed { node, .. } => {
                vec![node]
            }
            NemesisError::Multiple(errors) => errors.iter().flat_map(|e| e.nodes()).collect(),
            _ => Vec::new(),
        }
    }

    /// Checks if this error comes from a bad configuration rather than the cluster.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            NemesisError::InvalidConfiguration(_) | NemesisError::Config(_)
        )
    }
}
