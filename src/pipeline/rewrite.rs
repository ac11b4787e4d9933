//! Geometry rewriting: retarget the entry file to a fixed page size.
//!
//! The rewrite is a fixed sequence of line-level rules over the entry file
//! with comment and blank lines removed:
//!
//! 1. Strip size, column and paper options from `\documentclass[...]`.
//! 2. Find the single `\begin{document}` line.
//! 3. Insert page-style, font, `geometry` and (landscape) `pdflscape`
//!    directives right before it.
//! 4. Rescale `\includegraphics[width=<f>\linewidth]` images to fit the page
//!    in both directions.
//!
//! [`rewrite_document`] is pure; [`rewrite_entry_file`] adds the backup and
//! write-back. Nothing touches the disk unless every rule succeeded.

use crate::config::{GeometrySettings, Orientation};
use crate::error::Arxiv2KindleError;
use crate::pipeline::source::{is_filtered_line, SourceText};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const BODY_MARKER: &str = r"\begin{document}";
pub const PAGESTYLE_DIRECTIVE: &str = r"\pagestyle{empty}";
pub const FONT_DIRECTIVE: &str = r"\usepackage{times}";
pub const LANDSCAPE_DIRECTIVE: &str = r"\usepackage{pdflscape}";

/// Why [`rewrite_document`] refused a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteError {
    /// Number of `\begin{document}` lines was not exactly one.
    BodyMarker { found: usize },
}

/// Rewrite the entry file in place, keeping the original as `<name>.tex.bak`.
///
/// Returns the backup path.
pub fn rewrite_entry_file(
    path: &Path,
    geometry: &GeometrySettings,
    orientation: Orientation,
) -> Result<PathBuf, Arxiv2KindleError> {
    let source = SourceText::read(path)?;
    let lines: Vec<String> = source.text.lines().map(str::to_string).collect();

    let rewritten = rewrite_document(lines, geometry, orientation).map_err(|e| match e {
        RewriteError::BodyMarker { found } => Arxiv2KindleError::BodyMarker {
            path: path.to_path_buf(),
            found,
        },
    })?;

    let mut text = rewritten.join("\n");
    text.push('\n');

    let backup = backup_path(path);
    std::fs::rename(path, &backup).map_err(Arxiv2KindleError::source_io(&backup))?;
    SourceText::write(path, &text, source.encoding)?;
    info!(
        "Rewrote {} ({}), original kept at {}",
        path.display(),
        geometry.to_options(),
        backup.display()
    );
    Ok(backup)
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

/// Apply every rewrite rule to the raw lines of an entry file.
pub fn rewrite_document(
    lines: Vec<String>,
    geometry: &GeometrySettings,
    orientation: Orientation,
) -> Result<Vec<String>, RewriteError> {
    let mut lines: Vec<String> = lines.into_iter().filter(|l| !is_filtered_line(l)).collect();

    if let Some(first) = lines.first_mut() {
        *first = clean_document_class(first);
    }

    let markers: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| l.starts_with(BODY_MARKER))
        .map(|(i, _)| i)
        .collect();
    let &[marker] = markers.as_slice() else {
        return Err(RewriteError::BodyMarker {
            found: markers.len(),
        });
    };

    let directives = preamble_directives(geometry, orientation);
    debug!("Inserting {} directives before line {}", directives.len(), marker);
    lines.splice(marker..marker, directives);

    Ok(lines.iter().map(|l| rescale_images(l)).collect())
}

/// The directives inserted before `\begin{document}`, in final order.
pub fn preamble_directives(geometry: &GeometrySettings, orientation: Orientation) -> Vec<String> {
    let mut directives = vec![
        PAGESTYLE_DIRECTIVE.to_string(),
        FONT_DIRECTIVE.to_string(),
        format!(r"\usepackage[{}]{{geometry}}", geometry.to_options()),
    ];
    if orientation.is_landscape() {
        directives.push(LANDSCAPE_DIRECTIVE.to_string());
    }
    directives
}

// ── Rule 1: Document-class options ───────────────────────────────────────────

static RE_CLASS_OPTIONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<head>.*?\\documentclass\s*\[)(?P<opts>[^\]]*)(?P<tail>\].*)$").unwrap());
static RE_SIZE_OPTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+pt\b").unwrap());
static RE_COLUMN_OPTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+column\b").unwrap());
static RE_PAPER_OPTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+paper\b").unwrap());

/// Remove `<n>pt`, `<x>column` and `<x>paper` options from a
/// `\documentclass[...]` line and tidy the commas left behind.
///
/// Lines without an option list are returned unchanged.
pub fn clean_document_class(line: &str) -> String {
    let Some(caps) = RE_CLASS_OPTIONS.captures(line) else {
        return line.to_string();
    };
    let opts = RE_SIZE_OPTION.replace_all(&caps["opts"], "");
    let opts = RE_COLUMN_OPTION.replace_all(&opts, "");
    let opts = RE_PAPER_OPTION.replace_all(&opts, "");
    let rebuilt = format!("{}{}{}", &caps["head"], opts, &caps["tail"]);
    clean_option_commas(&rebuilt)
}

static RE_COMMA_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r",(\s*,)+").unwrap());
static RE_LEADING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\s*,\s*").unwrap());
static RE_TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*,\s*\]").unwrap());

/// Collapse comma runs, then drop a comma right after `[` or right before `]`.
///
/// Idempotent: a cleaned string is a fixed point.
pub fn clean_option_commas(line: &str) -> String {
    let s = RE_COMMA_RUN.replace_all(line, ",");
    let s = RE_LEADING_COMMA.replace_all(&s, "[");
    RE_TRAILING_COMMA.replace_all(&s, "]").into_owned()
}

// ── Rule 4: Image sizing ─────────────────────────────────────────────────────

static RE_RELATIVE_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\includegraphics\[width=(?P<frac>[.\d]+)\\(?:line|text)width\]").unwrap()
});

/// Give relative-width images a matching height bound.
///
/// Only the exact `\includegraphics[width=<f>\linewidth]` and
/// `...\textwidth]` forms are rewritten.
pub fn rescale_images(line: &str) -> String {
    RE_RELATIVE_IMAGE
        .replace_all(line, |caps: &Captures<'_>| {
            let frac = &caps["frac"];
            format!(r"\includegraphics[width={frac}\textwidth,height={frac}\textheight,keepaspectratio]")
        })
        .into_owned()
}

// ── Tests ────────────────────────────────────────────────────────────────────
