//! The nemesis lifecycle.
//!
//! Every fault variant implements [`Nemesis`]; the harness drives it through
//! `setup`, any number of `invoke` calls and a final `teardown`.

use async_trait::async_trait;

use crate::context::TestContext;
use crate::error::Result;
use crate::operation::Operation;

/// Core trait for fault variants.
///
/// Implementations must be `Send + Sync`: one instance is shared by every
/// harness worker that may send it operations.
///
/// # Lifecycle
///
/// 1. `setup()` once before the test, to put the cluster in a known state
/// 2. `invoke()` for each start or stop operation
/// 3. `teardown()` once after the test
///
/// # Example
///
/// ```ignore
/// use nemesis_core::{Nemesis, Operation, TestContext, Result};
///
/// struct Shrug;
///
/// #[async_trait]
/// impl Nemesis for Shrug {
///     fn name(&self) -> &str {
///         "shrug"
///     }
///
///     async fn setup(&self, _ctx: &TestContext) -> Result<()> {
///         Ok(())
///     }
///
///     async fn invoke(&self, _ctx: &TestContext, op: Operation) -> Result<Operation> {
///         Ok(op)
///     }
///
///     async fn teardown(&self, _ctx: &TestContext) -> Result<()> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Nemesis: Send + Sync {
    /// Returns the name of this nemesis, used in logs and configuration.
    fn name(&self) -> &str;

    /// Prepares the cluster before the first operation.
    async fn setup(&self, ctx: &TestContext) -> Result<()>;

    /// Applies or reverses the fault and returns the completed operation.
    ///
    /// Errors mean a collaborator failed and the fault could not be reliably
    /// applied or reversed. Expected conflicts are reported in the value.
    async fn invoke(&self, ctx: &TestContext, op: Operation) -> Result<Operation>;

    /// Cleans up after the last operation.
    async fn teardown(&self, ctx: &TestContext) -> Result<()>;

    /// Returns a human-readable description of this nemesis.
    fn description(&self) -> &str {
        self.name()
    }
}

/// A boxed nemesis for dynamic dispatch.
pub type BoxedNemesis = Box<dyn Nemesis>;

/// Nemesis that does nothing and returns operations unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Noop;

#[async_trait]
impl Nemesis for Noop {
    fn name(&self) -> &str {
        "noop"
    }

    async fn setup(&self, _ctx: &TestContext) -> Result<()> {
        Ok(())
    }

    async fn invoke(&self, _ctx: &TestContext, op: Operation) -> Result<Operation> {
        Ok(op)
    }

    async fn teardown(&self, _ctx: &TestContext) -> Result<()> {
        Ok(())
    }

    fn description(&self) -> &str {
        "Leaves the cluster alone"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::nodes;
    use crate::operation::OpValue;

    #[tokio::test]
    async fn test_noop_returns_op_unchanged() {
        let ctx = TestContext::builder()
            .nodes(nodes(["n1"]))
            .build()
            .unwrap();
        let nemesis: BoxedNemesis = Box::new(Noop);

        nemesis.setup(&ctx).await.unwrap();
        let op = nemesis.invoke(&ctx, Operation::start()).await.unwrap();
        assert_eq!(op, Operation::start());
        assert_eq!(op.value, OpValue::None);
        nemesis.teardown(&ctx).await.unwrap();
    }
}
