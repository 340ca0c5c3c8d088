//! Clock faults.
//!
//! Clocks are skewed through libfaketime rather than by touching the system
//! clock: each node carries a faketime configuration file holding a relative
//! offset, which processes started under faketime pick up.
//!
//! - [`ClockScrambler`]: random bounded offsets per node

mod skew;

pub use skew::ClockScrambler;

use crate::context::TestContext;
use crate::error::Result;
use crate::node::NodeId;
use crate::remote::{shell_quote, Command};

/// Default location of the faketime configuration file.
pub const DEFAULT_FAKETIME_PATH: &str = "/etc/faketimerc";

/// Renders an offset in seconds as a faketime directive.
///
/// Zero means no skew and renders as an empty directive.
///
/// ```
/// use nemesis_core::faults::clock::skew_directive;
///
/// assert_eq!(skew_directive(0), "");
/// assert_eq!(skew_directive(5), "+5s");
/// assert_eq!(skew_directive(-5), "-5s");
/// ```
pub fn skew_directive(offset_secs: i64) -> String {
    match offset_secs {
        0 => String::new(),
        t if t > 0 => format!("+{t}s"),
        t => format!("{t}s"),
    }
}

/// Helper for generating faketime commands.
pub(crate) struct TimeCommand;

impl TimeCommand {
    /// Overwrites `path` with the directive for `offset_secs`.
    pub fn write_skew(path: &str, offset_secs: i64) -> String {
        format!(
            "echo {} > {}",
            shell_quote(&skew_directive(offset_secs)),
            shell_quote(path)
        )
    }
}

/// Sets the clock offset of `node` to `offset_secs`.
///
/// Overwrites the node's faketime file, so calling it twice with the same
/// offset leaves the node in the same state.
pub async fn set_time(
    ctx: &TestContext,
    node: &NodeId,
    path: &str,
    offset_secs: i64,
) -> Result<()> {
    let cmd = Command::new(TimeCommand::write_skew(path, offset_secs)).privileged();
    ctx.remote.run(node, &cmd).await?;
    Ok(())
}
