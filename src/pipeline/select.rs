//! Source selection: find the entry `.tex` file of an extracted tree.
//!
//! Only files directly inside the directory are considered. A file is a
//! candidate when its first non-comment, non-blank line mentions
//! `documentclass`. Candidates are examined in file-name order; anything but
//! exactly one candidate is an error unless the caller named the entry file.
//! Symlinks are never followed, so an archive cannot point a rewrite outside
//! the working directory.

use crate::error::Arxiv2KindleError;
use crate::pipeline::source::{first_significant_line, SourceText};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const DOCUMENT_CLASS_TOKEN: &str = "documentclass";

/// Resolve the entry file of `dir`.
///
/// `explicit` names a file relative to `dir` and bypasses detection.
pub fn select_entry_file(dir: &Path, explicit: Option<&Path>) -> Result<PathBuf, Arxiv2KindleError> {
    if let Some(name) = explicit {
        let path = dir.join(name);
        if !is_regular_file(&path) {
            return Err(Arxiv2KindleError::EntryFileNotFound { path });
        }
        info!("Using requested entry file: {}", path.display());
        return Ok(path);
    }

    let mut candidates = Vec::new();
    for path in files_with_extension(dir, "tex")? {
        let source = SourceText::read(&path)?;
        if first_significant_line(&source.text).is_some_and(|l| l.contains(DOCUMENT_CLASS_TOKEN)) {
            debug!("Entry candidate: {}", path.display());
            candidates.push(path);
        }
    }

    match candidates.len() {
        0 => Err(Arxiv2KindleError::NoEntryFile {
            dir: dir.to_path_buf(),
        }),
        1 => {
            let entry = candidates.remove(0);
            info!("Entry file: {}", entry.display());
            Ok(entry)
        }
        _ => Err(Arxiv2KindleError::AmbiguousEntryFile {
            dir: dir.to_path_buf(),
            candidates: candidates
                .iter()
                .map(|p| p.file_name().map(PathBuf::from).unwrap_or_else(|| p.clone()))
                .collect(),
        }),
    }
}

/// Regular files directly inside `dir` with the given extension, sorted by name.
///
/// Symlinks are skipped even when they point at a regular file.
pub fn files_with_extension(dir: &Path, ext: &str) -> Result<Vec<PathBuf>, Arxiv2KindleError> {
    let entries = std::fs::read_dir(dir).map_err(Arxiv2KindleError::source_io(dir))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(Arxiv2KindleError::source_io(dir))?;
        let path = entry.path();
        if path.extension().is_none_or(|e| e != ext) {
            continue;
        }
        let file_type = entry.file_type().map_err(Arxiv2KindleError::source_io(&path))?;
        if file_type.is_file() {
            files.push(path);
        } else if file_type.is_symlink() {
            warn!("Skipping symlink {}", path.display());
        }
    }
    files.sort();
    Ok(files)
}

fn is_regular_file(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok_and(|m| m.is_file())
}
