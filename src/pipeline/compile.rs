//! Compiler driver: preflight checks, LaTeX passes and landscape rotation.
//!
//! The compiler is run a fixed [`COMPILE_PASSES`] times so cross-references,
//! the table of contents and citations settle. Individual exit codes are
//! ignored; the only success signal is the PDF existing afterwards, so any
//! PDF already in the tree is removed before the first pass.

use crate::config::{LatexCommand, PdfTool};
use crate::error::Arxiv2KindleError;
use crate::progress::ReflowProgressCallback;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Number of compiler invocations per run.
pub const COMPILE_PASSES: u32 = 3;

/// Result of running every compiler pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    /// The compiler wrote a PDF.
    Produced(PathBuf),
    /// Every pass ran but no PDF exists; `log` is the compiler log if any.
    NoOutput { log: Option<PathBuf> },
}

/// Verify the external tools a run needs can be executed.
///
/// Checks the LaTeX compiler always and the page tool when one is given
/// (landscape mode).
pub async fn check_toolchain(compiler: &LatexCommand, pdf_tool: Option<&PdfTool>) -> Result<(), Arxiv2KindleError> {
    ensure_tool(&compiler.program, "A TeX distribution (e.g. TeX Live) must be installed and on PATH.").await?;
    if let Some(tool) = pdf_tool {
        ensure_tool(&tool.program, "pdftk (or a compatible tool) is required for landscape mode.").await?;
    }
    Ok(())
}

async fn ensure_tool(program: &str, hint: &str) -> Result<(), Arxiv2KindleError> {
    let status = Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match status {
        Ok(s) if s.success() => {
            debug!("Found {}", program);
            Ok(())
        }
        Ok(s) => Err(Arxiv2KindleError::MissingTool {
            tool: program.to_string(),
            hint: format!("`{program} --version` exited with {s}. {hint}"),
        }),
        Err(e) => Err(Arxiv2KindleError::MissingTool {
            tool: program.to_string(),
            hint: format!("{e}. {hint}"),
        }),
    }
}

/// Run the compiler [`COMPILE_PASSES`] times on `tex_file`.
///
/// The working directory is the file's parent. Spawn failures are errors;
/// non-zero exits are logged and otherwise ignored.
pub async fn compile(
    tex_file: &Path,
    compiler: &LatexCommand,
    show_output: bool,
    progress: Option<&dyn ReflowProgressCallback>,
) -> Result<CompileOutcome, Arxiv2KindleError> {
    let dir = tex_file
        .parent()
        .ok_or_else(|| Arxiv2KindleError::Internal(format!("'{}' has no parent directory", tex_file.display())))?;
    let file_name = tex_file
        .file_name()
        .ok_or_else(|| Arxiv2KindleError::Internal(format!("'{}' has no file name", tex_file.display())))?;

    let pdf = tex_file.with_extension("pdf");
    if tokio::fs::symlink_metadata(&pdf).await.is_ok() {
        debug!("Removing stale {}", pdf.display());
        tokio::fs::remove_file(&pdf)
            .await
            .map_err(Arxiv2KindleError::source_io(&pdf))?;
    }

    for pass in 1..=COMPILE_PASSES {
        if let Some(cb) = progress {
            cb.on_compile_pass(pass, COMPILE_PASSES);
        }
        let (stdout, stderr) = if show_output {
            (Stdio::from(std::io::stderr()), Stdio::from(std::io::stderr()))
        } else {
            (Stdio::null(), Stdio::null())
        };

        let status = Command::new(&compiler.program)
            .args(&compiler.args)
            .arg(file_name)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .status()
            .await
            .map_err(|e| Arxiv2KindleError::MissingTool {
                tool: compiler.program.clone(),
                hint: e.to_string(),
            })?;

        if status.success() {
            debug!("{} pass {}/{} ok", compiler.program, pass, COMPILE_PASSES);
        } else {
            warn!("{} pass {}/{} exited with {}", compiler.program, pass, COMPILE_PASSES, status);
        }
    }

    if pdf.is_file() {
        info!("Compiled {}", pdf.display());
        return Ok(CompileOutcome::Produced(pdf));
    }
    let log = Some(tex_file.with_extension("log")).filter(|l| l.is_file());
    Ok(CompileOutcome::NoOutput { log })
}

/// Rotate every page of `pdf` by 90° with `tool`, returning the rotated file.
pub async fn rotate_landscape(pdf: &Path, tool: &PdfTool) -> Result<PathBuf, Arxiv2KindleError> {
    let rotated = pdf.with_extension("rotated.pdf");
    let output = Command::new(&tool.program)
        .args(&tool.args)
        .arg(pdf)
        .args(["cat", "1-endwest", "output"])
        .arg(&rotated)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| Arxiv2KindleError::MissingTool {
            tool: tool.program.clone(),
            hint: e.to_string(),
        })?;

    if !output.status.success() || !rotated.is_file() {
        return Err(Arxiv2KindleError::ToolFailed {
            tool: tool.program.clone(),
            detail: format!(
                "exit {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    info!("Rotated {} → {}", pdf.display(), rotated.display());
    Ok(rotated)
}
