//! Error types for the arxiv2kindle library.
//!
//! Every failure is terminal for a run, so there is a single fatal error
//! type, [`Arxiv2KindleError`], returned from the top-level `reflow*`,
//! [`crate::rewrite_tree`] and [`crate::deliver`] functions.
//!
//! The one condition that is *not* an error at the stage that observes it is
//! "the compiler ran but produced no PDF": the compiler driver reports it as
//! [`crate::pipeline::compile::CompileOutcome::NoOutput`], and only the
//! orchestrator turns it into [`Arxiv2KindleError::NoPdfProduced`].

use eprint_fetch::FetchError;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the arxiv2kindle library.
#[derive(Debug, Error)]
pub enum Arxiv2KindleError {
    // ── Preconditions ─────────────────────────────────────────────────────
    /// An external program needed for this run could not be executed.
    #[error("'{tool}' not found or not runnable.\n{hint}")]
    MissingTool { tool: String, hint: String },

    // ── Fetch errors ──────────────────────────────────────────────────────
    /// Identifier parsing, download or extraction failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    // ── Source selection ──────────────────────────────────────────────────
    /// No `.tex` file starts with a `\documentclass` line.
    #[error("No entry file found in '{dir}': no .tex file starts with \\documentclass")]
    NoEntryFile { dir: PathBuf },

    /// More than one `.tex` file starts with a `\documentclass` line.
    #[error(
        "Ambiguous entry file in '{dir}': {} candidates ({})\nPick one with --entry <FILE>.",
        .candidates.len(),
        .candidates.iter().map(|c| c.display().to_string()).collect::<Vec<_>>().join(", ")
    )]
    AmbiguousEntryFile {
        dir: PathBuf,
        candidates: Vec<PathBuf>,
    },

    /// The explicitly requested entry file does not exist in the tree.
    #[error("Requested entry file '{path}' does not exist")]
    EntryFileNotFound { path: PathBuf },

    // ── Rewriting ─────────────────────────────────────────────────────────
    /// The entry file does not have exactly one `\begin{document}` line.
    #[error(
        "Expected exactly one \\begin{{document}} line in '{path}', found {found}; the file was left untouched"
    )]
    BodyMarker { path: PathBuf, found: usize },

    /// A source file could not be read or written.
    #[error("I/O error on '{path}': {source}")]
    SourceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A rewritten source file cannot be encoded back to its original encoding.
    #[error("Cannot re-encode '{path}': {detail}")]
    Encoding { path: PathBuf, detail: String },

    // ── Compilation ───────────────────────────────────────────────────────
    /// The compiler ran every pass but no PDF was written.
    #[error(
        "LaTeX compilation of '{tex}' produced no PDF{}",
        .log.as_ref().map(|l| format!("\nSee the compiler log: {}", l.display())).unwrap_or_default()
    )]
    NoPdfProduced { tex: PathBuf, log: Option<PathBuf> },

    /// A post-processing tool (e.g. pdftk) failed.
    #[error("'{tool}' failed: {detail}")]
    ToolFailed { tool: String, detail: String },

    // ── Delivery ──────────────────────────────────────────────────────────
    /// A mail address could not be parsed.
    #[error("Invalid mail address '{address}': {detail}")]
    InvalidAddress { address: String, detail: String },

    /// Building or sending the message failed.
    #[error("Mail delivery failed: {0}")]
    Delivery(String),

    // ── Output ────────────────────────────────────────────────────────────
    /// Could not create or write the output PDF.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Arxiv2KindleError {
    pub(crate) fn source_io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::SourceIo { path, source }
    }
}
