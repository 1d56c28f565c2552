//! Generic archive aggregator
//!
//! Entries come from three places:
//! - a filesystem path (a directory is added recursively)
//! - another node's produced file
//! - another node's produced directory, added recursively
//!
//! An aggregator without entries does nothing and is not an error.

use crate::action::{Action, ActionRef, FileProducer, NodeState, PathProducer};
use crate::archive::{ArchiveEntry, entry_name, nested_entry_name, prepare_destination};
use crate::compiler::collect_files;
use crate::context::BuildContext;
use crate::defaults::ZIP_PATH;
use crate::error::{ActionError, ActionResult};
use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{info, warn};

const KIND: &str = "Zip";

enum ZipEntry {
    Path { path: PathBuf, name: String },
    File { producer: Rc<dyn FileProducer>, name: String },
    Directory { producer: Rc<dyn PathProducer>, name: String },
}

impl fmt::Debug for ZipEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path { path, name } => write!(f, "Path({} -> {name})", path.display()),
            Self::File { producer, name } => write!(f, "File({} -> {name})", producer.kind()),
            Self::Directory { producer, name } => write!(f, "Directory({} -> {name})", producer.kind()),
        }
    }
}

#[derive(Debug)]
struct ZipNode {
    state: NodeState,
    entries: RefCell<Vec<ZipEntry>>,
    destination: RefCell<Option<PathBuf>>,
    output: OnceCell<PathBuf>,
}

/// Shared handle to an archive aggregator
#[derive(Debug, Clone)]
pub struct Zip(Rc<ZipNode>);

impl Default for Zip {
    fn default() -> Self {
        Self::new()
    }
}

impl Zip {
    /// Empty aggregator writing to the conventional destination
    #[must_use]
    pub fn new() -> Self {
        Self(Rc::new(ZipNode {
            state: NodeState::default(),
            entries: RefCell::new(Vec::new()),
            destination: RefCell::new(None),
            output: OnceCell::new(),
        }))
    }

    fn push(self, entry: ZipEntry) -> ActionResult<Self> {
        self.0.state.check_configurable(KIND)?;
        self.0.entries.borrow_mut().push(entry);
        Ok(self)
    }

    /// Add a file or directory from disk under `name`
    ///
    /// # Errors
    ///
    /// A state error after processing.
    pub fn add_path(self, path: impl Into<PathBuf>, name: impl Into<String>) -> ActionResult<Self> {
        self.push(ZipEntry::Path {
            path: path.into(),
            name: name.into(),
        })
    }

    /// Add the file produced by `producer` under `name`
    ///
    /// # Errors
    ///
    /// A state error after processing.
    pub fn add_file<P>(self, producer: P, name: impl Into<String>) -> ActionResult<Self>
    where
        P: FileProducer + 'static,
    {
        self.push(ZipEntry::File {
            producer: Rc::new(producer),
            name: name.into(),
        })
    }

    /// Add the directory produced by `producer` below `name`
    ///
    /// # Errors
    ///
    /// A state error after processing.
    pub fn add_dir<P>(self, producer: P, name: impl Into<String>) -> ActionResult<Self>
    where
        P: PathProducer + 'static,
    {
        self.push(ZipEntry::Directory {
            producer: Rc::new(producer),
            name: name.into(),
        })
    }

    /// Archive destination
    ///
    /// # Errors
    ///
    /// A state error after processing.
    pub fn to(self, path: impl Into<PathBuf>) -> ActionResult<Self> {
        self.0.state.check_configurable(KIND)?;
        *self.0.destination.borrow_mut() = Some(path.into());
        Ok(self)
    }

    fn collect(&self, ctx: &BuildContext) -> ActionResult<Vec<ArchiveEntry>> {
        let mut collected = Vec::new();
        for entry in self.0.entries.borrow().iter() {
            match entry {
                ZipEntry::Path { path, name } => {
                    let path = ctx.resolve(path);
                    if path.is_dir() {
                        add_directory(&mut collected, &path, name)?;
                    } else if fs::File::open(&path).is_ok() {
                        collected.push(ArchiveEntry::new(entry_name(name, &path), path));
                    } else {
                        warn!("{} is not readable, leaving it out", path.display());
                    }
                }
                ZipEntry::File { producer, name } => {
                    let file = producer.file(ctx)?;
                    collected.push(ArchiveEntry::new(entry_name(name, &file), file));
                }
                ZipEntry::Directory { producer, name } => {
                    let dir = producer.path(ctx)?;
                    add_directory(&mut collected, &dir, name)?;
                }
            }
        }
        Ok(collected)
    }
}

fn add_directory(collected: &mut Vec<ArchiveEntry>, dir: &Path, name: &str) -> ActionResult<()> {
    for file in collect_files(dir, None)? {
        if let Ok(relative) = file.strip_prefix(dir) {
            collected.push(ArchiveEntry::new(nested_entry_name(name, relative), file.clone()));
        }
    }
    Ok(())
}

impl Action for Zip {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn process(&self, ctx: &BuildContext) -> ActionResult<()> {
        self.0.state.run(KIND, || {
            if self.0.entries.borrow().is_empty() {
                info!("The Zip action had nothing to do.");
                return Ok(());
            }

            let entries = self.collect(ctx)?;
            let destination = ctx.resolve(
                self.0
                    .destination
                    .borrow()
                    .as_deref()
                    .unwrap_or_else(|| Path::new(ZIP_PATH)),
            );

            info!("Zipping {} entries into {}", entries.len(), destination.display());
            prepare_destination(&destination)?;
            ctx.toolchain().archiver.write(&destination, &entries, None)?;

            self.0
                .output
                .set(destination)
                .map_err(|_| ActionError::Internal("zip output set twice".to_string()))
        })
    }

    fn is_processed(&self) -> bool {
        self.0.state.is_processed()
    }
}

impl FileProducer for Zip {
    fn file(&self, ctx: &BuildContext) -> ActionResult<PathBuf> {
        self.process(ctx)?;
        self.0.output.get().cloned().ok_or(ActionError::NothingProduced(KIND))
    }
}

impl From<Zip> for ActionRef {
    fn from(zip: Zip) -> Self {
        Rc::new(zip)
    }
}
