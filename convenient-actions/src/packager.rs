//! Shared state of the jar and war packagers
//!
//! Configuration is collected through setters and resolved once, when the
//! node is processed, into a [`PackagePlan`].

use crate::action::{NodeState, PathProducer};
use crate::archive::{ArchiveEntry, nested_entry_name, prepare_destination};
use crate::compilation::Compilation;
use crate::compiler::collect_files;
use crate::context::BuildContext;
use crate::defaults::{
    JAR_PATH, MANIFEST_ENTRY, WAR_CLASSES_PREFIX, WAR_LIBS_PATH, WAR_MANIFEST_PATH, WAR_PATH,
    WEB_CONTENT_PATH, WEB_XML_ENTRY,
};
use crate::error::{ActionError, ActionResult};
use std::cell::{OnceCell, RefCell};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
enum ClassSource {
    #[default]
    Implicit,
    Directory(PathBuf),
    Compilation(Compilation),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum SourceInclusion {
    #[default]
    Excluded,
    FromCompilation,
    Directory(PathBuf),
}

#[derive(Debug, Clone)]
struct WebConfig {
    content_dir: PathBuf,
    web_xml: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
struct PackagerConfig {
    classes: ClassSource,
    sources: SourceInclusion,
    manifest: Option<PathBuf>,
    destination: Option<PathBuf>,
    web: Option<WebConfig>,
}

/// Everything resolved, ready to write
#[derive(Debug)]
struct PackagePlan {
    destination: PathBuf,
    manifest: Option<PathBuf>,
    entries: BTreeMap<String, PathBuf>,
}

#[derive(Debug)]
pub(crate) struct PackagerNode {
    kind: &'static str,
    state: NodeState,
    config: RefCell<PackagerConfig>,
    output: OnceCell<PathBuf>,
}

impl PackagerNode {
    pub(crate) fn jar() -> Self {
        Self::with_config("Jar", PackagerConfig::default())
    }

    pub(crate) fn war() -> Self {
        Self::with_config(
            "War",
            PackagerConfig {
                web: Some(WebConfig {
                    content_dir: PathBuf::from(WEB_CONTENT_PATH),
                    web_xml: None,
                }),
                ..PackagerConfig::default()
            },
        )
    }

    fn with_config(kind: &'static str, config: PackagerConfig) -> Self {
        Self {
            kind,
            state: NodeState::default(),
            config: RefCell::new(config),
            output: OnceCell::new(),
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        self.kind
    }

    pub(crate) fn is_processed(&self) -> bool {
        self.state.is_processed()
    }

    fn configure(&self, apply: impl FnOnce(&mut PackagerConfig) -> ActionResult<()>) -> ActionResult<()> {
        self.state.check_configurable(self.kind)?;
        apply(&mut self.config.borrow_mut())
    }

    pub(crate) fn classes_from_compilation(&self, compilation: Compilation) -> ActionResult<()> {
        let kind = self.kind;
        self.configure(|c| {
            if !matches!(c.classes, ClassSource::Implicit) {
                return Err(ActionError::state(kind, "a class source was already declared"));
            }
            c.classes = ClassSource::Compilation(compilation);
            Ok(())
        })
    }

    pub(crate) fn classes_from_dir(&self, dir: PathBuf) -> ActionResult<()> {
        let kind = self.kind;
        self.configure(|c| {
            if !matches!(c.classes, ClassSource::Implicit) {
                return Err(ActionError::state(kind, "a class source was already declared"));
            }
            if c.sources == SourceInclusion::FromCompilation {
                return Err(ActionError::state(
                    kind,
                    "sources from a compilation cannot be combined with a pre-built class directory",
                ));
            }
            c.classes = ClassSource::Directory(dir);
            Ok(())
        })
    }

    pub(crate) fn include_sources(&self) -> ActionResult<()> {
        let kind = self.kind;
        self.configure(|c| {
            if c.sources != SourceInclusion::Excluded {
                return Err(ActionError::state(kind, "sources were already declared"));
            }
            if matches!(c.classes, ClassSource::Directory(_)) {
                return Err(ActionError::state(
                    kind,
                    "sources from a compilation cannot be combined with a pre-built class directory",
                ));
            }
            c.sources = SourceInclusion::FromCompilation;
            Ok(())
        })
    }

    pub(crate) fn include_sources_from(&self, dir: PathBuf) -> ActionResult<()> {
        let kind = self.kind;
        self.configure(|c| {
            if c.sources != SourceInclusion::Excluded {
                return Err(ActionError::state(kind, "sources were already declared"));
            }
            c.sources = SourceInclusion::Directory(dir);
            Ok(())
        })
    }

    pub(crate) fn manifest_from(&self, path: PathBuf) -> ActionResult<()> {
        self.configure(|c| {
            c.manifest = Some(path);
            Ok(())
        })
    }

    pub(crate) fn destination(&self, path: PathBuf) -> ActionResult<()> {
        self.configure(|c| {
            c.destination = Some(path);
            Ok(())
        })
    }

    pub(crate) fn web_content_from(&self, dir: PathBuf) -> ActionResult<()> {
        self.configure(|c| match c.web.as_mut() {
            Some(web) => {
                web.content_dir = dir;
                Ok(())
            }
            None => Err(ActionError::Internal("web content on a non-web packager".to_string())),
        })
    }

    pub(crate) fn web_xml_from(&self, path: PathBuf) -> ActionResult<()> {
        self.configure(|c| match c.web.as_mut() {
            Some(web) => {
                web.web_xml = Some(path);
                Ok(())
            }
            None => Err(ActionError::Internal("web.xml on a non-web packager".to_string())),
        })
    }

    pub(crate) fn process(&self, ctx: &BuildContext) -> ActionResult<()> {
        self.state.run(self.kind, || {
            let plan = self.plan(ctx)?;
            info!(
                "Packaging {} entries into {}",
                plan.entries.len(),
                plan.destination.display()
            );

            prepare_destination(&plan.destination)?;
            let entries: Vec<ArchiveEntry> = plan
                .entries
                .into_iter()
                .map(|(name, source)| ArchiveEntry { name, source })
                .collect();
            ctx.toolchain()
                .archiver
                .write(&plan.destination, &entries, plan.manifest.as_deref())?;

            self.output
                .set(plan.destination)
                .map_err(|_| ActionError::Internal(format!("{} output set twice", self.kind)))
        })
    }

    pub(crate) fn file(&self, ctx: &BuildContext) -> ActionResult<PathBuf> {
        self.process(ctx)?;
        self.output
            .get()
            .cloned()
            .ok_or_else(|| ActionError::Internal(format!("processed {} has no output", self.kind)))
    }

    /// Resolve defaults, process dependencies and collect entries
    fn plan(&self, ctx: &BuildContext) -> ActionResult<PackagePlan> {
        let config = {
            let mut config = self.config.borrow_mut();
            if matches!(config.classes, ClassSource::Implicit) {
                let mut compilation = Compilation::new();
                if config.web.is_some() {
                    compilation = compilation.with_library_dir(WAR_LIBS_PATH)?;
                }
                config.classes = ClassSource::Compilation(compilation);
            }
            config.clone()
        };

        let classes_dir = match &config.classes {
            ClassSource::Directory(dir) => {
                let dir = ctx.resolve(dir);
                if !dir.is_dir() {
                    return Err(ActionError::MissingSource(dir));
                }
                dir
            }
            ClassSource::Compilation(compilation) => compilation.path(ctx)?,
            ClassSource::Implicit => {
                return Err(ActionError::Internal("no class source defined".to_string()));
            }
        };

        let sources_dir = match (&config.sources, &config.classes) {
            (SourceInclusion::Excluded, _) => None,
            (SourceInclusion::Directory(dir), _) => Some(ctx.resolve(dir)),
            (SourceInclusion::FromCompilation, ClassSource::Compilation(c)) => Some(c.source_dir(ctx)),
            (SourceInclusion::FromCompilation, _) => {
                return Err(ActionError::Internal(
                    "sources requested without a compilation".to_string(),
                ));
            }
        };

        let prefix = if config.web.is_some() { WAR_CLASSES_PREFIX } else { "" };
        let mut entries = BTreeMap::new();

        if let Some(web) = &config.web {
            let content = ctx.resolve(&web.content_dir);
            if content.is_dir() {
                add_tree(&mut entries, &content, "")?;
                let _ = entries.remove(MANIFEST_ENTRY);
            } else {
                debug!("No web content at {}", content.display());
            }
        }

        add_tree(&mut entries, &classes_dir, prefix)?;
        if let Some(sources) = sources_dir {
            add_tree(&mut entries, &sources, prefix)?;
        }

        let default_manifest = if config.web.is_some() { WAR_MANIFEST_PATH } else { MANIFEST_ENTRY };
        let manifest = readable_manifest(ctx, config.manifest.as_deref(), default_manifest);
        // the embedded manifest is the only one in the archive
        if manifest.is_some() {
            let _ = entries.remove(MANIFEST_ENTRY);
        }

        if let Some(web_xml) = config.web.as_ref().and_then(|w| w.web_xml.as_ref()) {
            let web_xml = ctx.resolve(web_xml);
            if !web_xml.is_file() {
                return Err(ActionError::MissingSource(web_xml));
            }
            let _ = entries.insert(WEB_XML_ENTRY.to_string(), web_xml);
        }


        let default_destination = if config.web.is_some() { WAR_PATH } else { JAR_PATH };
        let destination = ctx.resolve(
            config
                .destination
                .as_deref()
                .unwrap_or_else(|| Path::new(default_destination)),
        );

        Ok(PackagePlan {
            destination,
            manifest,
            entries,
        })
    }
}

fn add_tree(entries: &mut BTreeMap<String, PathBuf>, root: &Path, prefix: &str) -> ActionResult<()> {
    for file in collect_files(root, None)? {
        let Ok(relative) = file.strip_prefix(root) else {
            continue;
        };
        let _ = entries.insert(nested_entry_name(prefix, relative), file.clone());
    }
    Ok(())
}

/// The manifest to embed, or `None` with a note when it can't be read
fn readable_manifest(ctx: &BuildContext, explicit: Option<&Path>, default: &str) -> Option<PathBuf> {
    let path = ctx.resolve(explicit.unwrap_or_else(|| Path::new(default)));
    match File::open(&path) {
        Ok(_) if path.is_file() => Some(path),
        _ if explicit.is_some() => {
            info!("Manifest {} is not readable, leaving it out", path.display());
            None
        }
        _ => {
            debug!("No manifest at {}", path.display());
            None
        }
    }
}

