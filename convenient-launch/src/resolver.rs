//! Trial resolution of required symbols against candidate archives
//!
//! Two caches are kept, each built on first use and never invalidated:
//! - user archives, declared by the caller
//! - system archives, discovered from a directory named by an environment
//!   variable (or given explicitly)
//!
//! A symbol is probed against the user archives first and falls back to the
//! system archives only on a miss.

use crate::archive::ArchiveIndex;
use crate::error::{LaunchError, LaunchResult};
use crate::symbol::SymbolLayout;
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const ARCHIVE_EXTENSIONS: &[&str] = &["jar", "zip", "tar", "tgz", "gz"];

/// Where the tool's own archives live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemArchives {
    /// Directory named by this environment variable
    FromEnv(String),
    /// Explicit directory
    Dir(PathBuf),
    /// No system archives at all
    Disabled,
}

impl SystemArchives {
    /// Archive files inside the system directory, sorted by path
    ///
    /// A missing, unreadable or empty directory yields an empty list and a
    /// warning.
    #[must_use]
    pub fn discover(&self) -> Vec<PathBuf> {
        let dir = match self {
            Self::Disabled => return Vec::new(),
            Self::Dir(dir) => dir.clone(),
            Self::FromEnv(var) => match std::env::var_os(var) {
                Some(value) if !value.is_empty() => PathBuf::from(value),
                _ => {
                    warn!("{var} is not set, system archives are unavailable");
                    return Vec::new();
                }
            },
        };

        if !dir.is_dir() {
            warn!(
                "System archive directory {} doesn't exist or is not a directory",
                dir.display()
            );
            return Vec::new();
        }

        let mut archives: Vec<PathBuf> = match fs::read_dir(&dir) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| p.is_file() && has_archive_extension(p))
                .collect(),
            Err(e) => {
                warn!("Cannot read system archive directory {}: {e}", dir.display());
                return Vec::new();
            }
        };
        archives.sort();

        if archives.is_empty() {
            warn!("System archive directory {} contains no archives", dir.display());
        }
        archives
    }
}

fn has_archive_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            ARCHIVE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Outcome of a successful resolution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Satisfying archive per symbol
    pub by_symbol: BTreeMap<String, PathBuf>,
    /// Union of satisfying archives, in order of first use
    pub classpath: Vec<PathBuf>,
}

/// An archive that was probed, with its index when it could be read
#[derive(Debug)]
struct Probe {
    path: PathBuf,
    index: Option<ArchiveIndex>,
}

impl Probe {
    fn open(path: PathBuf) -> Self {
        if !path.exists() {
            warn!("Archive {} doesn't exist", path.display());
            return Self { path, index: None };
        }
        match ArchiveIndex::open(&path) {
            Ok(index) => Self {
                path,
                index: Some(index),
            },
            Err(e) => {
                warn!("Skipping archive: {e}");
                Self { path, index: None }
            }
        }
    }

    fn contains(&self, entry: &str) -> bool {
        self.index.as_ref().is_some_and(|i| i.contains(entry))
    }
}

/// Computes the smallest set of archives that satisfies a set of symbols
#[derive(Debug)]
pub struct SymbolResolver {
    layout: SymbolLayout,
    candidates: Vec<PathBuf>,
    system: SystemArchives,
    user_cache: OnceCell<Vec<Probe>>,
    system_cache: OnceCell<Vec<Probe>>,
}

impl SymbolResolver {
    /// Resolver over `candidates` (duplicates collapse, order kept)
    #[must_use]
    pub fn new(layout: SymbolLayout, candidates: Vec<PathBuf>, system: SystemArchives) -> Self {
        let mut unique = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if !unique.contains(&candidate) {
                unique.push(candidate);
            }
        }
        Self {
            layout,
            candidates: unique,
            system,
            user_cache: OnceCell::new(),
            system_cache: OnceCell::new(),
        }
    }

    fn user_probes(&self) -> &[Probe] {
        self.user_cache.get_or_init(|| {
            debug!("Indexing {} user archive(s)", self.candidates.len());
            self.candidates.iter().cloned().map(Probe::open).collect()
        })
    }

    fn system_probes(&self) -> &[Probe] {
        self.system_cache.get_or_init(|| {
            let archives = self.system.discover();
            debug!("Indexing {} system archive(s)", archives.len());
            archives.into_iter().map(Probe::open).collect()
        })
    }

    /// Find a satisfying archive for every symbol
    ///
    /// # Errors
    ///
    /// [`LaunchError::Unresolved`] naming every missed symbol and every
    /// archive that was searched.
    pub fn resolve(&self, symbols: &[String]) -> LaunchResult<Resolution> {
        let mut resolution = Resolution::default();
        let mut unresolved = Vec::new();

        for symbol in symbols {
            let entry = self.layout.entry_for(symbol);
            let hit = self
                .user_probes()
                .iter()
                .find(|p| p.contains(&entry))
                .or_else(|| self.system_probes().iter().find(|p| p.contains(&entry)));

            match hit {
                Some(probe) => {
                    debug!("{symbol} resolved by {}", probe.path.display());
                    if !resolution.classpath.contains(&probe.path) {
                        resolution.classpath.push(probe.path.clone());
                    }
                    let _ = resolution.by_symbol.insert(symbol.clone(), probe.path.clone());
                }
                None => unresolved.push(symbol.clone()),
            }
        }

        if unresolved.is_empty() {
            Ok(resolution)
        } else {
            Err(LaunchError::Unresolved {
                symbols: unresolved,
                searched: self.searched(),
            })
        }
    }

    /// Every archive probed so far, user archives first
    fn searched(&self) -> Vec<PathBuf> {
        self.user_probes()
            .iter()
            .chain(self.system_probes())
            .map(|p| p.path.clone())
            .collect()
    }
}
