//! Style patching: drop `\twocolumn` lines from top-level `.sty` files.
//!
//! Works on raw bytes so files in any encoding, and their line endings,
//! survive untouched apart from the removed lines.

use crate::error::Arxiv2KindleError;
use crate::pipeline::select::files_with_extension;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const TWO_COLUMN_DIRECTIVE: &[u8] = b"\\twocolumn";

/// Patch every `.sty` file directly inside `dir`.
///
/// Returns the files that were rewritten. Files without a standalone
/// `\twocolumn` line are not written.
pub fn patch_style_files(dir: &Path) -> Result<Vec<PathBuf>, Arxiv2KindleError> {
    let mut patched = Vec::new();
    for path in files_with_extension(dir, "sty")? {
        let original = std::fs::read(&path).map_err(Arxiv2KindleError::source_io(&path))?;
        if let Some(stripped) = strip_two_column(&original) {
            std::fs::write(&path, stripped).map_err(Arxiv2KindleError::source_io(&path))?;
            info!("Removed \\twocolumn from {}", path.display());
            patched.push(path);
        } else {
            debug!("No \\twocolumn in {}", path.display());
        }
    }
    Ok(patched)
}

/// Remove lines whose trimmed content is exactly `\twocolumn`.
///
/// Returns `None` when nothing was removed.
pub fn strip_two_column(content: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(content.len());
    let mut removed = false;
    for line in content.split_inclusive(|&b| b == b'\n') {
        if line.trim_ascii() == TWO_COLUMN_DIRECTIVE {
            removed = true;
        } else {
            out.extend_from_slice(line);
        }
    }
    removed.then_some(out)
}
