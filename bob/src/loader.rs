//! Loading a compiled build descriptor
//!
//! The loader is handed the compiled unit of the descriptor and returns the
//! matching [`BuildModule`]. It is a seam of its own so the orchestrator can
//! be driven with fake descriptors in tests.

use crate::descriptor::{BuildModule, Registry};
use crate::error::{BootstrapError, BootstrapResult};
use crate::target::MethodInfo;
use std::path::Path;
use std::rc::Rc;
use tracing::debug;

/// Turns compiled descriptor units into loaded modules
pub trait ModuleLoader {
    /// Load the descriptor compiled into `unit`
    ///
    /// # Errors
    ///
    /// [`BootstrapError::UnitMissing`] when `unit` does not exist and
    /// [`BootstrapError::UnknownDescriptor`] when it names no descriptor.
    fn load(&self, unit: &Path) -> BootstrapResult<Rc<dyn BuildModule>>;

    /// Methods of the descriptor whose source is `descriptor`, without
    /// compiling it
    ///
    /// # Errors
    ///
    /// [`BootstrapError::UnknownDescriptor`].
    fn inspect(&self, descriptor: &Path) -> BootstrapResult<Vec<MethodInfo>>;
}

/// Loader looking descriptors up by file stem in a [`Registry`]
#[derive(Debug, Clone)]
pub struct RegistryLoader {
    registry: Registry,
}

impl RegistryLoader {
    /// Loader over `registry`
    #[must_use]
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    fn lookup(&self, file: &Path) -> BootstrapResult<Rc<dyn BuildModule>> {
        let name = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.registry
            .get(&name)
            .ok_or_else(|| BootstrapError::UnknownDescriptor {
                name,
                unit: file.to_path_buf(),
            })
    }
}

impl ModuleLoader for RegistryLoader {
    fn load(&self, unit: &Path) -> BootstrapResult<Rc<dyn BuildModule>> {
        if !unit.is_file() {
            return Err(BootstrapError::UnitMissing(unit.to_path_buf()));
        }
        let module = self.lookup(unit)?;
        debug!("Loaded descriptor {} from {}", module.name(), unit.display());
        Ok(module)
    }

    fn inspect(&self, descriptor: &Path) -> BootstrapResult<Vec<MethodInfo>> {
        Ok(self.lookup(descriptor)?.methods())
    }
}
