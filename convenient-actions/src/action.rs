//! Action traits and the shared processed-state bookkeeping
//!
//! Every node tracks whether it was processed. Accessors that need a node's
//! output process it first, so a node reached through several parents runs
//! once.

use crate::context::BuildContext;
use crate::error::{ActionError, ActionResult};
use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::debug;

/// A unit of build work
pub trait Action {
    /// Node kind, used in logs and errors
    fn kind(&self) -> &'static str;

    /// Perform the side effect; later calls are no-ops
    ///
    /// # Errors
    ///
    /// Any failure of this node or of a node it depends on.
    fn process(&self, ctx: &BuildContext) -> ActionResult<()>;

    /// Whether [`process`](Action::process) completed successfully
    fn is_processed(&self) -> bool;
}

/// An action whose output is a single file
pub trait FileProducer: Action {
    /// Produced file, processing the node first if needed
    ///
    /// # Errors
    ///
    /// Processing failures, or [`ActionError::NothingProduced`].
    fn file(&self, ctx: &BuildContext) -> ActionResult<PathBuf>;
}

/// An action whose output is a directory
pub trait PathProducer: Action {
    /// Produced directory, processing the node first if needed
    ///
    /// # Errors
    ///
    /// Processing failures.
    fn path(&self, ctx: &BuildContext) -> ActionResult<PathBuf>;
}

/// Type-erased shared action, as returned by build targets
pub type ActionRef = Rc<dyn Action>;

/// Processed flag plus re-entrancy guard shared by all node kinds
#[derive(Debug, Default)]
pub(crate) struct NodeState {
    processed: Cell<bool>,
    running: Cell<bool>,
}

impl NodeState {
    pub(crate) fn is_processed(&self) -> bool {
        self.processed.get()
    }

    /// Reject configuration once processing started
    pub(crate) fn check_configurable(&self, kind: &'static str) -> ActionResult<()> {
        if self.processed.get() || self.running.get() {
            return Err(ActionError::state(
                kind,
                "cannot be reconfigured after it has been processed",
            ));
        }
        Ok(())
    }

    /// Run `work` unless the node already completed
    pub(crate) fn run<F>(&self, kind: &'static str, work: F) -> ActionResult<()>
    where
        F: FnOnce() -> ActionResult<()>,
    {
        if self.processed.get() {
            debug!("{kind} already processed, skipping");
            return Ok(());
        }
        if self.running.replace(true) {
            return Err(ActionError::Cycle(kind));
        }

        let span = tracing::debug_span!("action", kind);
        let result = span.in_scope(work);

        self.running.set(false);
        if result.is_ok() {
            self.processed.set(true);
        }
        result
    }
}
