//! Locates the local analysis tool directory, extracting it from an archive when absent.
//!
//! Directories and archives are named `{prefix}X.Y.Z`; the highest version (compared numerically,
//! component by component) wins. Extraction happens into a temp directory that is renamed into place,
//! so an interrupted extraction is never mistaken for an installed tool.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info};

use crate::error::{Result, SyncError};

pub const DEFAULT_TOOL_PREFIX: &str = "Fortify_SCA_and_Apps_";

type ToolVersion = (u32, u32, u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveKind {
    Zip,
    SevenZ,
}

/// Returns the newest `{prefix}X.Y.Z` directory under `base_dir`, extracting the newest matching
/// `.zip`/`.7z` archive first when no such directory exists.
pub fn ensure_tool_dir(base_dir: &Path, prefix: &str) -> Result<PathBuf> {
    let not_found = || SyncError::ToolNotFound {
        base_dir: base_dir.to_path_buf(),
        prefix: prefix.to_string(),
    };
    let pattern = version_pattern(prefix).map_err(|_| not_found())?;
    let mut best_dir: Option<(ToolVersion, PathBuf)> = None;
    let mut best_archive: Option<(ToolVersion, PathBuf, ArchiveKind)> = None;

    let entries = fs::read_dir(base_dir).map_err(|e| SyncError::io(base_dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| SyncError::io(base_dir, e))?.path();
        if path.is_dir() {
            let Some(version) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| parse_version(&pattern, n))
            else {
                continue;
            };
            if best_dir.as_ref().map_or(true, |(v, _)| version > *v) {
                best_dir = Some((version, path));
            }
        } else if let Some(kind) = archive_kind(&path) {
            let Some(version) = path
                .file_stem()
                .and_then(|n| n.to_str())
                .and_then(|n| parse_version(&pattern, n))
            else {
                continue;
            };
            if best_archive.as_ref().map_or(true, |(v, _, _)| version > *v) {
                best_archive = Some((version, path, kind));
            }
        }
    }

    if let Some((version, dir)) = best_dir {
        debug!(?version, dir = %dir.display(), "Tool directory already present");
        return Ok(dir);
    }

    let (version, archive, kind) = best_archive.ok_or_else(not_found)?;
    let stem = archive
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_default();
    let dest = base_dir.join(stem);
    extract(&archive, kind, base_dir, &dest)?;
    info!(?version, archive = %archive.display(), dir = %dest.display(), "Extracted tool archive");
    Ok(dest)
}

fn version_pattern(prefix: &str) -> std::result::Result<Regex, regex::Error> {
    Regex::new(&format!(
        r"^{}(\d+)\.(\d+)\.(\d+)$",
        regex::escape(prefix)
    ))
}

fn parse_version(pattern: &Regex, name: &str) -> Option<ToolVersion> {
    let caps = pattern.captures(name)?;
    let part = |i: usize| caps.get(i)?.as_str().parse::<u32>().ok();
    Some((part(1)?, part(2)?, part(3)?))
}

fn archive_kind(path: &Path) -> Option<ArchiveKind> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    match ext.as_str() {
        "zip" => Some(ArchiveKind::Zip),
        "7z" => Some(ArchiveKind::SevenZ),
        _ => None,
    }
}

fn extract(archive: &Path, kind: ArchiveKind, base_dir: &Path, dest: &Path) -> Result<()> {
    let failed = |reason: String| SyncError::Archive {
        archive: archive.to_path_buf(),
        reason,
    };
    let staging = tempfile::Builder::new()
        .prefix(".extract")
        .tempdir_in(base_dir)
        .map_err(|e| SyncError::io(base_dir, e))?;

    match kind {
        ArchiveKind::Zip => {
            let file = fs::File::open(archive).map_err(|e| SyncError::io(archive, e))?;
            let mut zip = zip::ZipArchive::new(file).map_err(|e| failed(e.to_string()))?;
            zip.extract(staging.path())
                .map_err(|e| failed(e.to_string()))?;
        }
        ArchiveKind::SevenZ => {
            sevenz_rust::decompress_file(archive, staging.path())
                .map_err(|e| failed(e.to_string()))?;
        }
    }

    fs::rename(staging.path(), dest).map_err(|e| SyncError::io(dest, e))
}
