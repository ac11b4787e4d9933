//! Result types returned by [`crate::reflow`].

use eprint_fetch::sanitize_file_stem;
use serde::Serialize;
use std::path::PathBuf;

/// A successfully reflowed paper.
#[derive(Debug, Clone, Serialize)]
pub struct ReflowOutput {
    /// Final PDF, copied out of the working directory.
    pub pdf_path: PathBuf,
    /// Identifier the sources were fetched for; `None` for local archives.
    pub arxiv_id: Option<String>,
    /// Paper title (or archive stem for local input).
    pub title: String,
    /// Entry file that was rewritten and compiled, relative to the source root.
    pub entry_file: PathBuf,
    /// Working directory, present only when it was kept.
    pub workdir: Option<PathBuf>,
    pub stats: ReflowStats,
}

impl ReflowOutput {
    /// Name used for the output file and the mail attachment.
    pub fn file_name(&self) -> String {
        output_file_name(self.arxiv_id.as_deref(), &self.title)
    }
}

/// Wall-clock timings of one run, in milliseconds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReflowStats {
    pub fetch_ms: u64,
    pub rewrite_ms: u64,
    pub compile_ms: u64,
    pub total_ms: u64,
    /// `.sty` files that had `\twocolumn` removed.
    pub patched_styles: usize,
}

/// `<id>_<title>.pdf`, or `<title>.pdf` without an identifier.
pub fn output_file_name(arxiv_id: Option<&str>, title: &str) -> String {
    let stem = sanitize_file_stem(title);
    match arxiv_id {
        Some(id) => format!("{id}_{stem}.pdf"),
        None => format!("{stem}.pdf"),
    }
}
