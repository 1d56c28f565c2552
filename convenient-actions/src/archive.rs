//! Archive writer contract and the default tar-backed writer

use crate::defaults::MANIFEST_ENTRY;
use crate::error::{ActionError, ActionResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One archive entry: name inside the archive and file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Forward-slash separated entry name
    pub name: String,
    /// File providing the entry's contents
    pub source: PathBuf,
}

impl ArchiveEntry {
    /// New entry
    #[must_use]
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// External archive writer
pub trait ArchiveWriter: Send + Sync {
    /// Write `entries` into a new archive at `destination`
    ///
    /// When `manifest` is given it is embedded as
    /// [`MANIFEST_ENTRY`](crate::defaults::MANIFEST_ENTRY).
    ///
    /// # Errors
    ///
    /// I/O failures while reading entries or writing the archive.
    fn write(
        &self,
        destination: &Path,
        entries: &[ArchiveEntry],
        manifest: Option<&Path>,
    ) -> ActionResult<()>;
}

/// Writes archives as uncompressed tar files
#[derive(Debug, Clone, Copy, Default)]
pub struct TarArchiveWriter;

impl ArchiveWriter for TarArchiveWriter {
    fn write(
        &self,
        destination: &Path,
        entries: &[ArchiveEntry],
        manifest: Option<&Path>,
    ) -> ActionResult<()> {
        let dir = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        // a sibling temp file is renamed into place once complete
        let temp = tempfile::Builder::new()
            .prefix(".archive-")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| ActionError::io("Failed to create archive in", dir, e))?;
        let mut builder = tar::Builder::new(temp);

        if let Some(manifest) = manifest {
            builder
                .append_path_with_name(manifest, MANIFEST_ENTRY)
                .map_err(|e| ActionError::io("Failed to add manifest", manifest, e))?;
        }
        for entry in entries {
            builder
                .append_path_with_name(&entry.source, &entry.name)
                .map_err(|e| ActionError::io("Failed to add archive entry", &entry.source, e))?;
        }

        let temp = builder
            .into_inner()
            .map_err(|e| ActionError::io("Failed to finish archive", destination, e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| ActionError::io("Failed to fsync archive", destination, e))?;
        let _ = temp
            .persist(destination)
            .map_err(|e| ActionError::io("Failed to rename archive into", destination, e.error))?;
        debug!("Wrote {} entries to {}", entries.len(), destination.display());
        Ok(())
    }
}

/// Final entry name for `file` declared under `declared`
///
/// A declared name ending in a separator, or the placeholder `.`, takes the
/// file's base name. Separators are always forward slashes.
#[must_use]
pub fn entry_name(declared: &str, file: &Path) -> String {
    let declared = declared.replace('\\', "/");
    let base = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if declared == "." {
        base
    } else if declared.ends_with('/') {
        format!("{declared}{base}")
    } else {
        declared
    }
}

/// Entry name for a file found at `relative` below a directory declared as `prefix`
#[must_use]
pub fn nested_entry_name(prefix: &str, relative: &Path) -> String {
    let relative = relative.to_string_lossy().replace('\\', "/");
    let prefix = prefix.replace('\\', "/");
    if prefix.is_empty() || prefix == "." {
        relative
    } else if prefix.ends_with('/') {
        format!("{prefix}{relative}")
    } else {
        format!("{prefix}/{relative}")
    }
}

/// Remove a previous archive at `destination` and create its parent
///
/// # Errors
///
/// I/O failures; a directory at `destination` is reported as such.
pub fn prepare_destination(destination: &Path) -> ActionResult<()> {
    if destination.is_dir() {
        return Err(ActionError::io(
            "Archive destination is a directory",
            destination,
            std::io::Error::from(std::io::ErrorKind::AlreadyExists),
        ));
    }
    if destination.exists() {
        debug!("Removing previous {}", destination.display());
        fs::remove_file(destination)
            .map_err(|e| ActionError::io("Failed to remove previous archive", destination, e))?;
    }
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| ActionError::io("Failed to create directory", parent, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_entry_name_rules() {
        let file = Path::new("/tmp/build/out.jar");
        assert_eq!(entry_name("lib/", file), "lib/out.jar");
        assert_eq!(entry_name("lib\\", file), "lib/out.jar");
        assert_eq!(entry_name(".", file), "out.jar");
        assert_eq!(entry_name("a\\b\\renamed.jar", file), "a/b/renamed.jar");
        assert_eq!(entry_name("exact.jar", file), "exact.jar");
    }

    #[test]
    fn test_nested_entry_name() {
        let rel = Path::new("org/A.class");
        assert_eq!(nested_entry_name("classes", rel), "classes/org/A.class");
        assert_eq!(nested_entry_name("classes/", rel), "classes/org/A.class");
        assert_eq!(nested_entry_name(".", rel), "org/A.class");
        assert_eq!(nested_entry_name("", rel), "org/A.class");
    }

    #[test]
    fn test_tar_writer_embeds_manifest_first() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("MANIFEST.MF");
        let payload = dir.path().join("payload.txt");
        fs::write(&manifest, "Manifest-Version: 1.0\n").unwrap();
        fs::write(&payload, "data").unwrap();
        let dest = dir.path().join("out.jar");

        TarArchiveWriter
            .write(&dest, &[ArchiveEntry::new("a/payload.txt", &payload)], Some(&manifest))
            .unwrap();

        let mut archive = tar::Archive::new(fs::File::open(&dest).unwrap());
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![MANIFEST_ENTRY.to_string(), "a/payload.txt".to_string()]);
    }

    #[test]
    fn test_failed_write_leaves_nothing_behind() {
        let dir = TempDir::new().unwrap();
        let payload = dir.path().join("payload.txt");
        fs::write(&payload, "data").unwrap();
        let dest = dir.path().join("out.jar");

        let result = TarArchiveWriter.write(
            &dest,
            &[
                ArchiveEntry::new("payload.txt", &payload),
                ArchiveEntry::new("gone.txt", dir.path().join("gone.txt")),
            ],
            None,
        );

        assert!(result.is_err());
        assert!(!dest.exists());
        let left: Vec<_> = fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(left, vec![std::ffi::OsString::from("payload.txt")]);
    }

    #[test]
    fn test_prepare_destination_clears_previous() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("out/nested/x.jar");
        prepare_destination(&dest).unwrap();
        assert!(dest.parent().unwrap().is_dir());

        fs::write(&dest, "old").unwrap();
        prepare_destination(&dest).unwrap();
        assert!(!dest.exists());
    }
}
