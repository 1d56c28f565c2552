//! Record of which source files produced which compiled units
//!
//! The cache is built once by the cold bootstrap, committed, serialized into
//! the handoff file and installed once in the warm process.

use crate::error::{ActionError, ActionResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Sources and produced units of one source group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceGroupUnits {
    /// Source files of the group
    pub sources: BTreeSet<PathBuf>,
    /// Produced units, relative to the cache base directory
    pub units: BTreeSet<PathBuf>,
}

/// Committed mapping of source group to compiled units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledUnitCache {
    base_dir: PathBuf,
    groups: BTreeMap<String, SourceGroupUnits>,
}

/// Normalized lookup key of a source group path
///
/// `./src/`, `src/` and `src` name the same group.
#[must_use]
pub fn group_key(path: &Path) -> String {
    let key = path.to_string_lossy().replace('\\', "/");
    let key = key.trim_end_matches('/');
    let key = key.strip_prefix("./").unwrap_or(key);
    key.to_string()
}

fn check_readable_dir(dir: &Path) -> ActionResult<()> {
    match fs::read_dir(dir) {
        Ok(_) => Ok(()),
        Err(_) => Err(ActionError::UnreadableDirectory(dir.to_path_buf())),
    }
}

impl CompiledUnitCache {
    /// Start building a cache rooted at `base_dir`
    ///
    /// # Errors
    ///
    /// [`ActionError::UnreadableDirectory`] when `base_dir` is not an
    /// existing, readable directory.
    pub fn builder(base_dir: impl Into<PathBuf>) -> ActionResult<CompiledUnitCacheBuilder> {
        let base_dir = base_dir.into();
        check_readable_dir(&base_dir)?;
        Ok(CompiledUnitCacheBuilder {
            base_dir,
            groups: BTreeMap::new(),
            committed: false,
        })
    }

    /// Directory the units are relative to
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Re-check the base directory, e.g. after deserialization
    ///
    /// # Errors
    ///
    /// [`ActionError::UnreadableDirectory`].
    pub fn validate(&self) -> ActionResult<()> {
        check_readable_dir(&self.base_dir)
    }

    /// Units of `group`
    ///
    /// # Errors
    ///
    /// [`ActionError::NotCompiled`] when the group was never recorded.
    pub fn units_for(&self, group: &Path) -> ActionResult<&SourceGroupUnits> {
        let key = group_key(group);
        self.groups.get(&key).ok_or(ActionError::NotCompiled(key))
    }

    /// Whether `group` was recorded
    #[must_use]
    pub fn contains(&self, group: &Path) -> bool {
        self.groups.contains_key(&group_key(group))
    }

    /// Recorded group names, sorted
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }
}

/// Append-only builder for [`CompiledUnitCache`]
#[derive(Debug)]
pub struct CompiledUnitCacheBuilder {
    base_dir: PathBuf,
    groups: BTreeMap<String, SourceGroupUnits>,
    committed: bool,
}

impl CompiledUnitCacheBuilder {
    /// Record the sources and produced units of `group`
    ///
    /// Units inside the base directory are stored relative to it. Adding a
    /// group twice merges the sets.
    ///
    /// # Errors
    ///
    /// A state error once [`commit`](Self::commit) was called.
    pub fn add<S, U>(&mut self, group: &Path, sources: S, units: U) -> ActionResult<&mut Self>
    where
        S: IntoIterator<Item = PathBuf>,
        U: IntoIterator<Item = PathBuf>,
    {
        if self.committed {
            return Err(ActionError::state(
                "CompiledUnitCache",
                "cannot add to a cache that was already committed",
            ));
        }

        let entry = self.groups.entry(group_key(group)).or_default();
        entry.sources.extend(sources);
        for unit in units {
            let relative = unit
                .strip_prefix(&self.base_dir)
                .map(Path::to_path_buf)
                .unwrap_or(unit);
            let _ = entry.units.insert(relative);
        }
        Ok(self)
    }

    /// Seal the builder and produce the cache
    ///
    /// # Errors
    ///
    /// A state error when called twice.
    pub fn commit(&mut self) -> ActionResult<CompiledUnitCache> {
        if self.committed {
            return Err(ActionError::state(
                "CompiledUnitCache",
                "the cache was already committed",
            ));
        }
        self.committed = true;
        Ok(CompiledUnitCache {
            base_dir: self.base_dir.clone(),
            groups: std::mem::take(&mut self.groups),
        })
    }
}
