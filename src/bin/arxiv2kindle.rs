//! CLI binary for arxiv2kindle.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ReflowConfig`/`DeliveryConfig` and prints results.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use arxiv2kindle::{
    deliver, reflow, validate_margin, DeliveryConfig, LatexCommand, Orientation, PdfTool, ProgressCallback, ReflowConfig,
    ReflowOutput, ReflowProgressCallback, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that follows the pipeline stages and turns into a byte counter
/// while the e-print downloads.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(spinner_style());
        bar.set_prefix("Starting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(TICKS)
}

fn download_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ")
    .tick_strings(TICKS)
}

impl ReflowProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        let msg = match stage {
            Stage::Preflight => "checking toolchain…",
            Stage::Fetch => "downloading e-print…",
            Stage::Extract => "unpacking sources…",
            Stage::Rewrite => "rewriting preamble…",
            Stage::Compile => "compiling…",
            Stage::Rotate => "rotating pages…",
            Stage::Output => "writing PDF…",
        };
        self.bar.set_style(spinner_style());
        self.bar.set_prefix(stage.to_string());
        self.bar.set_message(msg);
    }

    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<10} {}",
            green("✓"),
            stage.to_string(),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_download_progress(&self, downloaded: u64, total: Option<u64>) {
        if let Some(t) = total {
            if self.bar.length() != Some(t) {
                self.bar.set_style(download_style());
                self.bar.set_length(t);
            }
        }
        self.bar.set_position(downloaded);
    }

    fn on_compile_pass(&self, pass: u32, total: u32) {
        self.bar.set_message(format!("pass {pass}/{total}"));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Reflow to the default 4x6in page
  arxiv2kindle -u https://arxiv.org/abs/1706.03762

  # Bare identifier, bigger page, smaller margins
  arxiv2kindle -u 1706.03762v5 -w 6 -h 8 -m 0.1

  # Landscape (needs pdftk)
  arxiv2kindle -u 1706.03762 -l

  # Mail the PDF to a Kindle
  arxiv2kindle -u 1706.03762 -g me@gmail.com -k me@kindle.com

  # Reflow an e-print that is already on disk
  arxiv2kindle -u ./1706.03762.tar.gz -o papers/

ENVIRONMENT VARIABLES:
  ARXIV2KINDLE_SMTP_PASSWORD  SMTP password; prompted for when unset
  RUST_LOG                    Override the log filter (e.g. arxiv2kindle=debug)

REQUIREMENTS:
  pdflatex (TeX Live or MiKTeX) on PATH; pdftk for --is_landscape.
"#;

/// Reflow arXiv papers for e-readers.
#[derive(Parser, Debug)]
#[command(
    name = "arxiv2kindle",
    version,
    about = "Reflow arXiv papers to e-reader page sizes and optionally mail them to a Kindle",
    long_about = "Download the LaTeX sources of an arXiv paper, force a single-column layout \
on a page of the given size, recompile with pdflatex and write <id>_<title>.pdf. With both \
--gmail and --kindle_mail the PDF is also mailed as an attachment.",
    arg_required_else_help = true,
    disable_help_flag = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// arXiv identifier, abs/pdf URL, or path to a local e-print archive.
    #[arg(short = 'u', long = "arxiv_url", alias = "arxiv-url", env = "ARXIV2KINDLE_URL")]
    arxiv_url: String,

    /// Page width in inches.
    #[arg(short, long, env = "ARXIV2KINDLE_WIDTH", default_value_t = 4.0)]
    width: f64,

    /// Page height in inches.
    #[arg(short, long, env = "ARXIV2KINDLE_HEIGHT", default_value_t = 6.0)]
    height: f64,

    /// Margin in inches (0 < margin < 1).
    #[arg(short, long, env = "ARXIV2KINDLE_MARGIN", default_value_t = 0.2, value_parser = parse_margin)]
    margin: f64,

    /// Landscape mode: swap width and height, rotate the output with pdftk.
    #[arg(short = 'l', long = "is_landscape", alias = "is-landscape", env = "ARXIV2KINDLE_LANDSCAPE")]
    is_landscape: bool,

    /// Sender address (SMTP login).
    #[arg(short, long, env = "ARXIV2KINDLE_GMAIL")]
    gmail: Option<String>,

    /// Recipient address, e.g. your Send-to-Kindle address.
    #[arg(short, long = "kindle_mail", alias = "kindle-mail", env = "ARXIV2KINDLE_KINDLE_MAIL")]
    kindle_mail: Option<String>,

    /// Directory the PDF is written to.
    #[arg(short, long, env = "ARXIV2KINDLE_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Directory the per-run working directory is created in.
    #[arg(long, env = "ARXIV2KINDLE_WORKDIR_BASE")]
    workdir_base: Option<PathBuf>,

    /// Keep the working directory (sources, logs) after the run.
    #[arg(long, env = "ARXIV2KINDLE_KEEP_WORKDIR")]
    keep_workdir: bool,

    /// LaTeX compiler program.
    #[arg(long, env = "ARXIV2KINDLE_COMPILER", default_value = "pdflatex")]
    compiler: String,

    /// pdftk-compatible program used to rotate landscape output.
    #[arg(long, env = "ARXIV2KINDLE_PDF_TOOL", default_value = "pdftk")]
    pdf_tool: String,

    /// Entry .tex file, relative to the source root, when several declare a class.
    #[arg(long, env = "ARXIV2KINDLE_ENTRY")]
    entry: Option<PathBuf>,

    /// Base URL of the preprint server.
    #[arg(long, env = "ARXIV2KINDLE_BASE_URL", default_value = arxiv2kindle::DEFAULT_BASE_URL)]
    base_url: String,

    /// HTTP timeout in seconds.
    #[arg(long, env = "ARXIV2KINDLE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// SMTP submission host.
    #[arg(long, env = "ARXIV2KINDLE_SMTP_HOST", default_value = DeliveryConfig::DEFAULT_HOST)]
    smtp_host: String,

    /// SMTP submission port (STARTTLS).
    #[arg(long, env = "ARXIV2KINDLE_SMTP_PORT", default_value_t = DeliveryConfig::DEFAULT_PORT)]
    smtp_port: u16,

    /// SMTP password. Prompted for (without echo) when unset.
    #[arg(long, env = "ARXIV2KINDLE_SMTP_PASSWORD", hide_env_values = true)]
    smtp_password: Option<String>,

    /// Forward compiler output to stderr.
    #[arg(long, env = "ARXIV2KINDLE_SHOW_COMPILER_OUTPUT")]
    show_compiler_output: bool,

    /// Print the result as JSON on stdout.
    #[arg(long, env = "ARXIV2KINDLE_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "ARXIV2KINDLE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ARXIV2KINDLE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ARXIV2KINDLE_QUIET")]
    quiet: bool,

    /// Print help (`-h` is the page height).
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

fn parse_margin(s: &str) -> std::result::Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("'{s}': {e}"))?;
    validate_margin(value).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(&cli, progress.clone().map(|cb| cb as ProgressCallback))?;
    let delivery = match (&cli.gmail, &cli.kindle_mail) {
        (Some(sender), Some(recipient)) => Some((sender.clone(), recipient.clone())),
        _ => None,
    };

    // ── Run ──────────────────────────────────────────────────────────────
    let result = reflow(&cli.arxiv_url, &config).await;
    if let Some(ref cb) = progress {
        cb.finish();
    }
    let output = result.context("Reflow failed")?;
    report(&cli, &output)?;

    // ── Deliver ──────────────────────────────────────────────────────────
    if let Some((sender, recipient)) = delivery {
        let password = match cli.smtp_password.clone() {
            Some(p) => p,
            None => rpassword::prompt_password("Enter Gmail Password: ").context("Failed to read password")?,
        };
        let mail = DeliveryConfig::new(sender, recipient, password)
            .smtp_host(cli.smtp_host.clone())
            .smtp_port(cli.smtp_port);
        deliver(&output, &mail).await.context("Delivery failed")?;
        if !cli.quiet && !cli.json {
            eprintln!("{} mailed to {}", green("✔"), bold(&mail.recipient));
        }
    }

    Ok(())
}

fn report(cli: &Cli, output: &ReflowOutput) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }
    if cli.quiet {
        return Ok(());
    }
    eprintln!(
        "{}  {}  {}ms  →  {}",
        green("✔"),
        output.title,
        output.stats.total_ms,
        bold(&output.pdf_path.display().to_string()),
    );
    if let Some(ref dir) = output.workdir {
        eprintln!("   {} {}", cyan("working directory kept:"), dir.display());
    }
    Ok(())
}

/// Map CLI args to `ReflowConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ReflowConfig> {
    let orientation = if cli.is_landscape {
        Orientation::Landscape
    } else {
        Orientation::Portrait
    };

    let mut builder = ReflowConfig::builder()
        .page_size(cli.width, cli.height)
        .margin(cli.margin)
        .orientation(orientation)
        .base_url(cli.base_url.clone())
        .download_timeout_secs(cli.download_timeout)
        .keep_workdir(cli.keep_workdir)
        .output_dir(cli.output_dir.clone())
        .compiler(LatexCommand::new(cli.compiler.clone()))
        .pdf_tool(PdfTool::new(cli.pdf_tool.clone()))
        .show_compiler_output(cli.show_compiler_output);

    if let Some(ref dir) = cli.workdir_base {
        builder = builder.workdir_base(dir.clone());
    }
    if let Some(ref entry) = cli.entry {
        builder = builder.entry_file(entry.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
