//! Isolated per-archive entry indexes
//!
//! Each [`ArchiveIndex`] knows about exactly one archive and never delegates
//! to another one, so a hit proves the archive itself satisfies the probe.
//!
//! Supported layouts:
//! - plain directories (entries are relative file paths)
//! - tar archives, optionally gzip-compressed
//! - zip archives (jar, war), read from the central directory only

use crate::error::{LaunchError, LaunchResult};
use flate2::read::GzDecoder;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

const ZIP_LOCAL_HEADER: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_ARCHIVE: &[u8] = b"PK\x05\x06";
const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const TAR_MAGIC_OFFSET: usize = 257;

const EOCD_SIGNATURE: u32 = 0x0605_4b50;
const EOCD_MIN_LEN: usize = 22;
const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4b50;
const CENTRAL_HEADER_LEN: usize = 46;

/// Storage format of an indexed archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// Directory tree on disk
    Directory,
    /// Uncompressed tar
    Tar,
    /// Gzip-compressed tar
    GzipTar,
    /// Zip container (jar, war, zip)
    Zip,
}

/// Entry names of a single archive
#[derive(Debug, Clone)]
pub struct ArchiveIndex {
    path: PathBuf,
    kind: ArchiveKind,
    entries: BTreeSet<String>,
}

impl ArchiveIndex {
    /// Index `path`, detecting its format from its contents
    pub fn open(path: &Path) -> LaunchResult<Self> {
        let kind = detect_kind(path)?;
        let entries = match kind {
            ArchiveKind::Directory => index_directory(path),
            ArchiveKind::Tar => {
                let file = open_file(path)?;
                index_tar(path, tar::Archive::new(file))?
            }
            ArchiveKind::GzipTar => {
                let file = open_file(path)?;
                index_tar(path, tar::Archive::new(GzDecoder::new(file)))?
            }
            ArchiveKind::Zip => {
                let bytes = fs::read(path).map_err(|e| {
                    LaunchError::io(format!("Failed to read {}", path.display()), e)
                })?;
                index_zip(path, &bytes)?
            }
        };

        debug!(
            "Indexed {} ({:?}, {} entries)",
            path.display(),
            kind,
            entries.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            kind,
            entries,
        })
    }

    /// Archive location
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Detected format
    #[must_use]
    pub fn kind(&self) -> ArchiveKind {
        self.kind
    }

    /// Whether the archive holds `entry` (forward-slash separated)
    #[must_use]
    pub fn contains(&self, entry: &str) -> bool {
        self.entries.contains(entry)
    }

    /// Number of file entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the archive has no file entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All file entries in sorted order
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

fn open_file(path: &Path) -> LaunchResult<File> {
    File::open(path).map_err(|e| LaunchError::io(format!("Failed to open {}", path.display()), e))
}

fn detect_kind(path: &Path) -> LaunchResult<ArchiveKind> {
    let metadata = fs::metadata(path)
        .map_err(|e| LaunchError::io(format!("Failed to stat {}", path.display()), e))?;
    if metadata.is_dir() {
        return Ok(ArchiveKind::Directory);
    }

    let mut head = Vec::with_capacity(512);
    let _ = open_file(path)?
        .take(512)
        .read_to_end(&mut head)
        .map_err(|e| LaunchError::io(format!("Failed to read {}", path.display()), e))?;

    if head.starts_with(ZIP_LOCAL_HEADER) || head.starts_with(ZIP_EMPTY_ARCHIVE) {
        Ok(ArchiveKind::Zip)
    } else if head.starts_with(GZIP_MAGIC) {
        Ok(ArchiveKind::GzipTar)
    } else if head.get(TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + 5) == Some(b"ustar".as_slice()) {
        Ok(ArchiveKind::Tar)
    } else {
        Err(LaunchError::Archive {
            path: path.to_path_buf(),
            reason: "unrecognized archive format".to_string(),
        })
    }
}

fn normalize_entry(name: &str) -> String {
    let name = name.replace('\\', "/");
    name.trim_start_matches("./").trim_start_matches('/').to_string()
}

fn index_directory(root: &Path) -> BTreeSet<String> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(root)
                .ok()
                .map(|rel| normalize_entry(&rel.to_string_lossy()))
        })
        .collect()
}

fn index_tar<R: Read>(path: &Path, mut archive: tar::Archive<R>) -> LaunchResult<BTreeSet<String>> {
    let corrupt = |e: std::io::Error| LaunchError::Archive {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let mut entries = BTreeSet::new();
    for entry in archive.entries().map_err(corrupt)? {
        let entry = entry.map_err(corrupt)?;
        if entry.header().entry_type().is_dir() {
            continue;
        }
        let name = entry.path().map_err(corrupt)?;
        let _ = entries.insert(normalize_entry(&name.to_string_lossy()));
    }
    Ok(entries)
}

fn read_u16(bytes: &[u8], at: usize) -> Option<u16> {
    bytes
        .get(at..at + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Read entry names from the zip central directory
fn index_zip(path: &Path, bytes: &[u8]) -> LaunchResult<BTreeSet<String>> {
    let malformed = |reason: &str| LaunchError::Archive {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    if bytes.len() < EOCD_MIN_LEN {
        return Err(malformed("too short for a zip archive"));
    }

    // The end-of-central-directory record is followed by at most a 64k comment
    let last = bytes.len() - EOCD_MIN_LEN;
    let first = last.saturating_sub(usize::from(u16::MAX));
    let eocd = (first..=last)
        .rev()
        .find(|&at| read_u32(bytes, at) == Some(EOCD_SIGNATURE))
        .ok_or_else(|| malformed("missing end of central directory"))?;

    let count = read_u16(bytes, eocd + 10).ok_or_else(|| malformed("truncated directory"))?;
    let offset = read_u32(bytes, eocd + 16).ok_or_else(|| malformed("truncated directory"))?;
    if offset == u32::MAX {
        return Err(malformed("zip64 archives are not supported"));
    }

    let mut entries = BTreeSet::new();
    let mut at = offset as usize;
    for _ in 0..count {
        if read_u32(bytes, at) != Some(CENTRAL_HEADER_SIGNATURE) {
            return Err(malformed("corrupt central directory"));
        }
        let lengths = (
            read_u16(bytes, at + 28),
            read_u16(bytes, at + 30),
            read_u16(bytes, at + 32),
        );
        let (Some(name_len), Some(extra_len), Some(comment_len)) = lengths else {
            return Err(malformed("truncated central directory"));
        };
        let name_start = at + CENTRAL_HEADER_LEN;
        let name = bytes
            .get(name_start..name_start + usize::from(name_len))
            .ok_or_else(|| malformed("truncated entry name"))?;
        let name = String::from_utf8_lossy(name);
        if !name.ends_with('/') {
            let _ = entries.insert(normalize_entry(&name));
        }
        at = name_start + usize::from(name_len) + usize::from(extra_len) + usize::from(comment_len);
    }

    Ok(entries)
}
