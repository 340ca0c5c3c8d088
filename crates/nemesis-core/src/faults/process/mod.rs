//! Process faults.
//!
//! - [`StartStopNemesis`]: generic start/stop controller over targeted nodes
//! - [`Targeter`]: picks the nodes a start applies to
//! - [`SignalAction`] / [`hammer_time`]: pause and resume with SIGSTOP/SIGCONT
//! - [`KillRestartAction`]: crash with SIGKILL, then restart

mod actions;
mod start_stop;
mod targeter;

pub use actions::{hammer_time, hammer_time_random, KillRestartAction, SignalAction};
pub use start_stop::{NodeAction, StartStopNemesis};
pub use targeter::{FixedTargets, NodeSelector, Selection, Targeter, Targets};

use std::fmt;

use crate::remote::shell_quote;

/// Unix signals used by process faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// SIGKILL (9) - Forceful termination (cannot be caught).
    Kill,
    /// SIGSTOP (19) - Stop/pause process.
    Stop,
    /// SIGCONT (18) - Continue stopped process.
    Cont,
}

impl Signal {
    /// Returns the signal name (without SIG prefix).
    pub fn name(&self) -> &'static str {
        match self {
            Signal::Kill => "KILL",
            Signal::Stop => "STOP",
            Signal::Cont => "CONT",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIG{}", self.name())
    }
}

/// Longest process name the kernel keeps; `pkill -x` compares against it.
pub const MAX_PROCESS_NAME_LEN: usize = 15;

/// Helper for generating process-related commands.
pub(crate) struct ProcessCommand;

impl ProcessCommand {
    /// Signals every process named exactly `name`.
    pub fn pkill(name: &str, signal: Signal) -> String {
        format!("pkill -{} -x {}", signal.name(), shell_quote(name))
    }
}
