//! Output directory removal

use crate::action::{Action, ActionRef, NodeState};
use crate::context::BuildContext;
use crate::defaults::ARTIFACTS_PATH;
use crate::error::{ActionError, ActionResult};
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{debug, info};

const KIND: &str = "Clean";

#[derive(Debug)]
struct CleanNode {
    state: NodeState,
    directory: RefCell<PathBuf>,
}

/// Shared handle to a node that clears a directory
#[derive(Debug, Clone)]
pub struct Clean(Rc<CleanNode>);

impl Default for Clean {
    fn default() -> Self {
        Self::new()
    }
}

impl Clean {
    /// Clear the conventional artifacts directory
    #[must_use]
    pub fn new() -> Self {
        Self(Rc::new(CleanNode {
            state: NodeState::default(),
            directory: RefCell::new(PathBuf::from(ARTIFACTS_PATH)),
        }))
    }

    /// Directory to clear
    ///
    /// # Errors
    ///
    /// A state error after processing.
    pub fn directory(self, path: impl Into<PathBuf>) -> ActionResult<Self> {
        self.0.state.check_configurable(KIND)?;
        *self.0.directory.borrow_mut() = path.into();
        Ok(self)
    }
}

impl Action for Clean {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn process(&self, ctx: &BuildContext) -> ActionResult<()> {
        self.0.state.run(KIND, || {
            let dir = ctx.resolve(&self.0.directory.borrow());
            if dir.is_file() {
                return Err(ActionError::NotADirectory(dir));
            }
            if !dir.exists() {
                debug!("Nothing to clear at {}", dir.display());
                return Ok(());
            }

            info!("Clearing {}", dir.display());
            fs::remove_dir_all(&dir).map_err(|e| ActionError::io("Failed to remove", &dir, e))
        })
    }

    fn is_processed(&self) -> bool {
        self.0.state.is_processed()
    }
}

impl From<Clean> for ActionRef {
    fn from(clean: Clean) -> Self {
        Rc::new(clean)
    }
}
