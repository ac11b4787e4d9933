//! Pipeline stages for reflowing LaTeX sources.
//!
//! Each submodule implements one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ select ──▶ style ──▶ rewrite ──▶ compile ──▶ deliver
//! (e-print)  (entry)   (.sty)    (preamble)   (pdflatex)  (SMTP)
//! ```
//!
//! 1. [`fetch`]   : resolve the input, scrape the title, download and unpack
//!    the e-print; blocking HTTP runs in `spawn_blocking`
//! 2. [`select`]  : find the single top-level `.tex` file declaring a class
//! 3. [`style`]   : drop standalone `\twocolumn` lines from `.sty` files
//! 4. [`rewrite`] : line rules over the entry file (class options, geometry
//!    directives, image sizing)
//! 5. [`compile`] : toolchain preflight, three compiler passes, landscape
//!    rotation
//! 6. [`deliver`] : mail the PDF as an attachment
//!
//! [`source`] holds the encoding-preserving text I/O shared by the rules and
//! [`workdir`] the scoped per-run directory.

pub mod compile;
pub mod deliver;
pub mod fetch;
pub mod rewrite;
pub mod select;
pub mod source;
pub mod style;
pub mod workdir;
