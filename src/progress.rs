//! Progress-callback trait for pipeline stage events.
//!
//! Inject an [`Arc<dyn ReflowProgressCallback>`] via
//! [`crate::config::ReflowConfigBuilder::progress_callback`] to receive
//! events as the run moves through its stages.
//!
//! # Example
//!
//! ```rust
//! use arxiv2kindle::{ReflowConfig, ReflowProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ReflowProgressCallback for Printer {
//!     fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
//!         eprintln!("{stage} done in {elapsed_ms}ms");
//!     }
//! }
//!
//! let config = ReflowConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// A step of the reflow pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    /// Check the external toolchain is runnable.
    Preflight,
    /// Scrape the title and download the e-print archive.
    Fetch,
    /// Unpack the archive into the working directory.
    Extract,
    /// Select the entry file, patch style files, rewrite the preamble.
    Rewrite,
    /// Run the LaTeX compiler.
    Compile,
    /// Rotate landscape output.
    Rotate,
    /// Copy the PDF out of the working directory.
    Output,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Preflight => "preflight",
            Stage::Fetch => "fetch",
            Stage::Extract => "extract",
            Stage::Rewrite => "rewrite",
            Stage::Compile => "compile",
            Stage::Rotate => "rotate",
            Stage::Output => "output",
        };
        f.write_str(name)
    }
}

/// Called by the pipeline as it moves through each [`Stage`].
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ReflowProgressCallback: Send + Sync {
    /// Called when a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage finishes successfully.
    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        let _ = (stage, elapsed_ms);
    }

    /// Called periodically while the archive downloads.
    fn on_download_progress(&self, downloaded: u64, total: Option<u64>) {
        let _ = (downloaded, total);
    }

    /// Called before each compiler pass (1-indexed).
    fn on_compile_pass(&self, pass: u32, total_passes: u32) {
        let _ = (pass, total_passes);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ReflowProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ReflowConfig`].
pub type ProgressCallback = Arc<dyn ReflowProgressCallback>;
