//! Input resolution and source download.
//!
//! The user-supplied string is either an arXiv identifier/URL or a path to a
//! local e-print archive. The blocking [`eprint_fetch`] calls run on
//! `spawn_blocking` so the runtime's worker threads stay free.

use crate::config::ReflowConfig;
use crate::error::Arxiv2KindleError;
use eprint_fetch::{extract_archive, sanitize_file_stem, ArchiveKind, ArxivId, Fetcher};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where the sources come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceInput {
    /// Download from the preprint server.
    Arxiv(ArxivId),
    /// Extract an archive that is already on disk.
    LocalArchive(PathBuf),
}

impl SourceInput {
    /// An existing file wins over identifier parsing.
    pub fn resolve(input: &str) -> Result<Self, Arxiv2KindleError> {
        let path = Path::new(input);
        if path.is_file() {
            return Ok(Self::LocalArchive(path.to_path_buf()));
        }
        Ok(Self::Arxiv(ArxivId::parse(input)?))
    }
}

/// A source archive ready for extraction.
#[derive(Debug, Clone)]
pub struct FetchedSource {
    pub arxiv_id: Option<ArxivId>,
    pub title: String,
    pub archive: PathBuf,
}

/// Download (or locate) the archive for `input` into `workdir`.
pub async fn fetch_source(
    input: &SourceInput,
    workdir: &Path,
    config: &ReflowConfig,
) -> Result<FetchedSource, Arxiv2KindleError> {
    match input {
        SourceInput::LocalArchive(path) => {
            let title = archive_stem(path);
            debug!("Using local archive {} (title '{}')", path.display(), title);
            Ok(FetchedSource {
                arxiv_id: None,
                title,
                archive: path.clone(),
            })
        }
        SourceInput::Arxiv(id) => {
            let task_id = id.clone();
            let dir = workdir.to_path_buf();
            let base_url = config.base_url.clone();
            let timeout = config.download_timeout_secs;
            let progress = config.progress_callback.clone();

            let (title, archive) = tokio::task::spawn_blocking(move || {
                let fetcher = Fetcher::new(base_url, timeout)?;
                let title = fetcher.fetch_title(&task_id)?;
                info!("Title: {}", title);
                let on_progress = |done: u64, total: Option<u64>| {
                    if let Some(ref cb) = progress {
                        cb.on_download_progress(done, total);
                    }
                };
                let archive = fetcher.download_archive(&task_id, &dir, &title, Some(&on_progress))?;
                Ok::<_, eprint_fetch::FetchError>((title, archive))
            })
            .await
            .map_err(|e| Arxiv2KindleError::Internal(format!("Download task panicked: {e}")))??;

            info!("Downloaded {}", archive.display());
            Ok(FetchedSource {
                arxiv_id: Some(id.clone()),
                title,
                archive,
            })
        }
    }
}

/// Unpack `archive` into `workdir`.
pub async fn extract_source(archive: &Path, workdir: &Path) -> Result<ArchiveKind, Arxiv2KindleError> {
    let archive = archive.to_path_buf();
    let dir = workdir.to_path_buf();
    let kind = tokio::task::spawn_blocking(move || extract_archive(&archive, &dir))
        .await
        .map_err(|e| Arxiv2KindleError::Internal(format!("Extract task panicked: {e}")))??;
    debug!("Extracted archive: {:?}", kind);
    Ok(kind)
}

/// File name minus `.tar.gz`/`.tgz`/`.gz`/`.tar`, made file-name safe.
fn archive_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = [".tar.gz", ".tgz", ".gz", ".tar"]
        .iter()
        .find_map(|ext| name.strip_suffix(ext))
        .unwrap_or(&name);
    sanitize_file_stem(stem)
}
