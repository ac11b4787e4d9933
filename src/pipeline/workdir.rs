//! Per-run working directory.
//!
//! A [`WorkDir`] wraps a [`TempDir`] created inside an explicit base
//! directory. Dropping it deletes the tree on every exit path, success,
//! error or panic, unless the run asked to retain it for debugging.

use crate::error::Arxiv2KindleError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

const PREFIX: &str = "arxiv2kindle_";

/// Scoped owner of the directory a run extracts and compiles in.
#[derive(Debug)]
pub struct WorkDir {
    dir: Option<TempDir>,
    path: PathBuf,
    retain: bool,
}

impl WorkDir {
    /// Create `<base>/arxiv2kindle_XXXXXX`.
    pub fn create(base: &Path, retain: bool) -> Result<Self, Arxiv2KindleError> {
        std::fs::create_dir_all(base).map_err(Arxiv2KindleError::source_io(base))?;
        let dir = tempfile::Builder::new()
            .prefix(PREFIX)
            .tempdir_in(base)
            .map_err(Arxiv2KindleError::source_io(base))?;
        let path = dir.path().to_path_buf();
        debug!("Working directory: {}", path.display());
        Ok(Self {
            dir: Some(dir),
            path,
            retain,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_retained(&self) -> bool {
        self.retain
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        if self.retain {
            let kept = dir.keep();
            info!("Keeping working directory: {}", kept.display());
        } else if let Err(e) = dir.close() {
            warn!("Failed to remove working directory {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_on_drop() {
        let base = tempfile::tempdir().unwrap();
        let work = WorkDir::create(base.path(), false).unwrap();
        let path = work.path().to_path_buf();
        std::fs::write(path.join("x.tex"), "x").unwrap();
        assert!(path.starts_with(base.path()));
        assert!(path.file_name().unwrap().to_string_lossy().starts_with(PREFIX));

        drop(work);
        assert!(!path.exists());
    }

    #[test]
    fn retained_when_requested() {
        let base = tempfile::tempdir().unwrap();
        let work = WorkDir::create(base.path(), true).unwrap();
        let path = work.path().to_path_buf();
        assert!(work.is_retained());

        drop(work);
        assert!(path.exists());
    }

    #[test]
    fn removed_when_error_propagates() {
        fn failing_stage(base: &Path) -> Result<PathBuf, (PathBuf, Arxiv2KindleError)> {
            let work = WorkDir::create(base, false).map_err(|e| (PathBuf::new(), e))?;
            let path = work.path().to_path_buf();
            Err((path, Arxiv2KindleError::Internal("boom".into())))
        }

        let base = tempfile::tempdir().unwrap();
        let (path, _) = failing_stage(base.path()).unwrap_err();
        assert!(!path.exists());
    }

    #[test]
    fn base_is_created() {
        let base = tempfile::tempdir().unwrap();
        let nested = base.path().join("a/b");
        let work = WorkDir::create(&nested, false).unwrap();
        assert!(work.path().starts_with(&nested));
    }
}
