//! # arxiv2kindle
//!
//! Reflow arXiv papers for small e-reader screens.
//!
//! Two-column conference layouts are unreadable on a 6-inch display, and
//! shrinking the PDF only makes the text smaller. This crate goes back to the
//! LaTeX sources instead: it downloads the e-print, forces a single-column
//! layout on a page of the size you ask for, recompiles it, and can mail the
//! result to a Send-to-Kindle address.
//!
//! ## Pipeline Overview
//!
//! ```text
//! arXiv id / URL / archive
//!  │
//!  ├─ 1. Preflight check pdflatex (and pdftk in landscape mode)
//!  ├─ 2. Fetch     scrape the title, download + unpack the e-print
//!  ├─ 3. Select    the one top-level .tex file with \documentclass
//!  ├─ 4. Patch     strip \twocolumn from .sty files
//!  ├─ 5. Rewrite   class options, geometry directives, image sizing
//!  ├─ 6. Compile   three pdflatex passes
//!  ├─ 7. Rotate    landscape only, via pdftk
//!  └─ 8. Output    <id>_<title>.pdf (+ optional mail delivery)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arxiv2kindle::{reflow, ReflowConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ReflowConfig::builder()
//!         .page_size(4.0, 6.0)
//!         .margin(0.2)
//!         .output_dir("papers")
//!         .build()?;
//!     let output = reflow("https://arxiv.org/abs/1706.03762", &config).await?;
//!     println!("{}", output.pdf_path.display());
//!     Ok(())
//! }
//! ```
//!
//! Only the source rewriting, without network or TeX:
//!
//! ```rust,no_run
//! use arxiv2kindle::{rewrite_tree, ReflowConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let options = ReflowConfig::default().rewrite_options();
//! let tree = rewrite_tree("unpacked-eprint".as_ref(), &options)?;
//! println!("rewrote {}", tree.entry_file.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `arxiv2kindle` binary (clap + anyhow + tracing-subscriber + indicatif + rpassword) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! arxiv2kindle = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod reflow;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    validate_margin, DeliveryConfig, GeometrySettings, LatexCommand, Orientation, PdfTool,
    ReflowConfig, ReflowConfigBuilder, RewriteOptions,
};
pub use eprint_fetch::{ArxivId, FetchError, DEFAULT_BASE_URL};
pub use error::Arxiv2KindleError;
pub use output::{output_file_name, ReflowOutput, ReflowStats};
pub use pipeline::compile::CompileOutcome;
pub use progress::{NoopProgressCallback, ProgressCallback, ReflowProgressCallback, Stage};
pub use reflow::{deliver, reflow, reflow_sync, rewrite_tree, RewrittenTree};
