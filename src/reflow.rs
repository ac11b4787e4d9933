//! Run entry points: fetch, rewrite, compile, copy out, and optionally mail.

use crate::config::{DeliveryConfig, ReflowConfig, RewriteOptions};
use crate::error::Arxiv2KindleError;
use crate::output::{output_file_name, ReflowOutput, ReflowStats};
use crate::pipeline::compile::{self, CompileOutcome};
use crate::pipeline::fetch::{self, SourceInput};
use crate::pipeline::workdir::WorkDir;
use crate::pipeline::{deliver as mail, rewrite, select, style};
use crate::progress::Stage;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// What [`rewrite_tree`] changed in a source tree.
#[derive(Debug, Clone)]
pub struct RewrittenTree {
    /// The entry file, rewritten in place.
    pub entry_file: PathBuf,
    /// The untouched original of the entry file.
    pub backup: PathBuf,
    /// `.sty` files that had `\twocolumn` removed.
    pub patched_styles: Vec<PathBuf>,
}

/// Reflow an arXiv paper (identifier, abs/pdf URL, or local e-print archive)
/// and write `<id>_<title>.pdf` into `config.output_dir`.
///
/// The working directory is removed on every exit path unless
/// `config.keep_workdir` is set.
///
/// # Errors
/// Any fatal stage error. A compiler run that leaves no PDF behind is
/// [`Arxiv2KindleError::NoPdfProduced`].
pub async fn reflow(input: impl AsRef<str>, config: &ReflowConfig) -> Result<ReflowOutput, Arxiv2KindleError> {
    let total_start = Instant::now();
    let input = input.as_ref();
    info!("Starting reflow: {}", input);
    let source = SourceInput::resolve(input)?;
    let landscape = config.orientation.is_landscape();

    // ── Preflight ────────────────────────────────────────────────────────
    let t = begin(config, Stage::Preflight);
    compile::check_toolchain(&config.compiler, landscape.then_some(&config.pdf_tool)).await?;
    end(config, Stage::Preflight, t);

    let workdir = WorkDir::create(&config.workdir_base, config.keep_workdir)?;

    // ── Fetch + extract ──────────────────────────────────────────────────
    let fetch_start = Instant::now();
    let t = begin(config, Stage::Fetch);
    let fetched = fetch::fetch_source(&source, workdir.path(), config).await?;
    end(config, Stage::Fetch, t);

    let t = begin(config, Stage::Extract);
    fetch::extract_source(&fetched.archive, workdir.path()).await?;
    end(config, Stage::Extract, t);
    let fetch_ms = elapsed_ms(fetch_start);

    // ── Rewrite ──────────────────────────────────────────────────────────
    let t = begin(config, Stage::Rewrite);
    let tree = rewrite_tree(workdir.path(), &config.rewrite_options())?;
    let rewrite_ms = end(config, Stage::Rewrite, t);

    // ── Compile ──────────────────────────────────────────────────────────
    let t = begin(config, Stage::Compile);
    let outcome = compile::compile(
        &tree.entry_file,
        &config.compiler,
        config.show_compiler_output,
        config.progress_callback.as_deref(),
    )
    .await?;
    let compile_ms = end(config, Stage::Compile, t);

    let mut pdf = match outcome {
        CompileOutcome::Produced(pdf) => pdf,
        CompileOutcome::NoOutput { log } => {
            return Err(Arxiv2KindleError::NoPdfProduced {
                tex: tree.entry_file,
                log: log.map(|l| retained_or_bare(&workdir, l)),
            })
        }
    };

    if landscape {
        let t = begin(config, Stage::Rotate);
        pdf = compile::rotate_landscape(&pdf, &config.pdf_tool).await?;
        end(config, Stage::Rotate, t);
    }

    // ── Output ───────────────────────────────────────────────────────────
    let t = begin(config, Stage::Output);
    let arxiv_id = fetched.arxiv_id.as_ref().map(|id| id.as_str().to_string());
    let file_name = output_file_name(arxiv_id.as_deref(), &fetched.title);
    let pdf_path = copy_out(&pdf, &config.output_dir, &file_name).await?;
    end(config, Stage::Output, t);

    let entry_file = tree
        .entry_file
        .strip_prefix(workdir.path())
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| tree.entry_file.clone());
    let stats = ReflowStats {
        fetch_ms,
        rewrite_ms,
        compile_ms,
        total_ms: elapsed_ms(total_start),
        patched_styles: tree.patched_styles.len(),
    };
    info!("Wrote {} in {}ms", pdf_path.display(), stats.total_ms);

    Ok(ReflowOutput {
        pdf_path,
        arxiv_id,
        title: fetched.title,
        entry_file,
        workdir: workdir.is_retained().then(|| workdir.path().to_path_buf()),
        stats,
    })
}

/// Synchronous wrapper around [`reflow`].
///
/// Creates a temporary tokio runtime internally.
pub fn reflow_sync(input: impl AsRef<str>, config: &ReflowConfig) -> Result<ReflowOutput, Arxiv2KindleError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Arxiv2KindleError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(reflow(input, config))
}

/// Select the entry file in an extracted tree, patch its style files and
/// rewrite its preamble. No network and no compiler involved.
pub fn rewrite_tree(dir: &Path, options: &RewriteOptions) -> Result<RewrittenTree, Arxiv2KindleError> {
    let entry_file = select::select_entry_file(dir, options.entry_file.as_deref())?;
    info!("Entry file: {}", entry_file.display());
    let patched_styles = style::patch_style_files(dir)?;
    let backup = rewrite::rewrite_entry_file(&entry_file, &options.geometry, options.orientation)?;
    Ok(RewrittenTree {
        entry_file,
        backup,
        patched_styles,
    })
}

/// Mail a finished reflow to `delivery.recipient`.
///
/// The attachment is named like the output file and the subject is the
/// paper title.
pub async fn deliver(output: &ReflowOutput, delivery: &DeliveryConfig) -> Result<(), Arxiv2KindleError> {
    mail::send_pdf(&output.pdf_path, &output.file_name(), &output.title, delivery).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn begin(config: &ReflowConfig, stage: Stage) -> Instant {
    debug!("Stage {} started", stage);
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(stage);
    }
    Instant::now()
}

fn end(config: &ReflowConfig, stage: Stage, started: Instant) -> u64 {
    let ms = elapsed_ms(started);
    debug!("Stage {} finished in {}ms", stage, ms);
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(stage, ms);
    }
    ms
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// A log inside a deleted working directory is useless to point at.
fn retained_or_bare(workdir: &WorkDir, log: PathBuf) -> PathBuf {
    if workdir.is_retained() {
        log
    } else {
        log.file_name().map(PathBuf::from).unwrap_or(log)
    }
}

/// Copy `pdf` to `<dir>/<file_name>` via a temp file and rename.
async fn copy_out(pdf: &Path, dir: &Path, file_name: &str) -> Result<PathBuf, Arxiv2KindleError> {
    let target = dir.join(file_name);
    let write_err = |e| Arxiv2KindleError::OutputWriteFailed {
        path: target.clone(),
        source: e,
    };

    tokio::fs::create_dir_all(dir).await.map_err(write_err)?;
    let tmp_path = dir.join(format!("{file_name}.tmp"));
    tokio::fs::copy(pdf, &tmp_path).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, &target).await.map_err(write_err)?;
    Ok(target)
}
