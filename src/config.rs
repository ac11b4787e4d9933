//! Configuration types for a reflow run.
//!
//! All pipeline behaviour is controlled through [`ReflowConfig`], built via
//! its [`ReflowConfigBuilder`]. Mail delivery is configured separately with
//! [`DeliveryConfig`] and handed to [`crate::deliver`] explicitly, so the
//! library never prompts for credentials or reads ambient state.

use crate::error::Arxiv2KindleError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Configuration for one fetch → rewrite → compile run.
///
/// Built via [`ReflowConfig::builder()`] or using [`ReflowConfig::default()`].
///
/// # Example
/// ```rust
/// use arxiv2kindle::{Orientation, ReflowConfig};
///
/// let config = ReflowConfig::builder()
///     .page_size(4.0, 6.0)
///     .margin(0.2)
///     .orientation(Orientation::Landscape)
///     .build()
///     .unwrap();
/// assert_eq!(config.geometry().paper_width, 6.0);
/// ```
#[derive(Clone)]
pub struct ReflowConfig {
    /// Requested page width in inches, before any landscape swap. Default: 4.
    pub width_in: f64,

    /// Requested page height in inches, before any landscape swap. Default: 6.
    pub height_in: f64,

    /// Margin on every side in inches. Must satisfy `0 < margin < 1`. Default: 0.2.
    pub margin_in: f64,

    /// Page orientation. Default: [`Orientation::Portrait`].
    pub orientation: Orientation,

    /// Scheme and host of the preprint server. Default: `http://arxiv.org`.
    pub base_url: String,

    /// HTTP timeout for the abstract page and archive download, in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Directory the per-run working directory is created in.
    /// Default: the system temp directory.
    pub workdir_base: PathBuf,

    /// Keep the working directory after the run instead of deleting it. Default: false.
    pub keep_workdir: bool,

    /// Directory the finished PDF is copied to. Default: `.`.
    pub output_dir: PathBuf,

    /// LaTeX compiler invocation. Default: `pdflatex -interaction=nonstopmode`.
    pub compiler: LatexCommand,

    /// Page tool used to rotate landscape output. Default: `pdftk`.
    pub pdf_tool: PdfTool,

    /// Entry file name to use instead of auto-detection.
    pub entry_file: Option<PathBuf>,

    /// Stream compiler stdout/stderr to our stderr. Default: false.
    pub show_compiler_output: bool,

    /// Optional progress callback for stage events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ReflowConfig {
    fn default() -> Self {
        Self {
            width_in: 4.0,
            height_in: 6.0,
            margin_in: 0.2,
            orientation: Orientation::default(),
            base_url: eprint_fetch::DEFAULT_BASE_URL.to_string(),
            download_timeout_secs: 120,
            workdir_base: std::env::temp_dir(),
            keep_workdir: false,
            output_dir: PathBuf::from("."),
            compiler: LatexCommand::default(),
            pdf_tool: PdfTool::default(),
            entry_file: None,
            show_compiler_output: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ReflowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflowConfig")
            .field("width_in", &self.width_in)
            .field("height_in", &self.height_in)
            .field("margin_in", &self.margin_in)
            .field("orientation", &self.orientation)
            .field("base_url", &self.base_url)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("workdir_base", &self.workdir_base)
            .field("keep_workdir", &self.keep_workdir)
            .field("output_dir", &self.output_dir)
            .field("compiler", &self.compiler)
            .field("pdf_tool", &self.pdf_tool)
            .field("entry_file", &self.entry_file)
            .field("show_compiler_output", &self.show_compiler_output)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ReflowProgressCallback>"),
            )
            .finish()
    }
}

impl ReflowConfig {
    /// Create a new builder for `ReflowConfig`.
    pub fn builder() -> ReflowConfigBuilder {
        ReflowConfigBuilder {
            config: Self::default(),
        }
    }

    /// Page geometry after applying the landscape swap.
    pub fn geometry(&self) -> GeometrySettings {
        GeometrySettings::new(self.width_in, self.height_in, self.margin_in, self.orientation)
    }

    /// The subset of settings the rewriting stages need.
    pub fn rewrite_options(&self) -> RewriteOptions {
        RewriteOptions {
            geometry: self.geometry(),
            orientation: self.orientation,
            entry_file: self.entry_file.clone(),
        }
    }
}

/// Builder for [`ReflowConfig`].
#[derive(Debug)]
pub struct ReflowConfigBuilder {
    config: ReflowConfig,
}

impl ReflowConfigBuilder {
    pub fn page_size(mut self, width_in: f64, height_in: f64) -> Self {
        self.config.width_in = width_in;
        self.config.height_in = height_in;
        self
    }

    pub fn margin(mut self, margin_in: f64) -> Self {
        self.config.margin_in = margin_in;
        self
    }

    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.config.orientation = orientation;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn workdir_base(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.workdir_base = dir.into();
        self
    }

    pub fn keep_workdir(mut self, v: bool) -> Self {
        self.config.keep_workdir = v;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn compiler(mut self, compiler: LatexCommand) -> Self {
        self.config.compiler = compiler;
        self
    }

    pub fn pdf_tool(mut self, tool: PdfTool) -> Self {
        self.config.pdf_tool = tool;
        self
    }

    pub fn entry_file(mut self, name: impl Into<PathBuf>) -> Self {
        self.config.entry_file = Some(name.into());
        self
    }

    pub fn show_compiler_output(mut self, v: bool) -> Self {
        self.config.show_compiler_output = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ReflowConfig, Arxiv2KindleError> {
        let c = &self.config;
        validate_margin(c.margin_in)?;
        for (name, v) in [("width", c.width_in), ("height", c.height_in)] {
            if !(v.is_finite() && v > 0.0) {
                return Err(Arxiv2KindleError::InvalidConfig(format!(
                    "Page {name} must be a positive number of inches, got {v}"
                )));
            }
        }
        if 2.0 * c.margin_in >= c.width_in.min(c.height_in) {
            return Err(Arxiv2KindleError::InvalidConfig(format!(
                "Margin {}in leaves no room on a {}in × {}in page",
                c.margin_in, c.width_in, c.height_in
            )));
        }
        if c.compiler.program.trim().is_empty() {
            return Err(Arxiv2KindleError::InvalidConfig(
                "Compiler program must not be empty".into(),
            ));
        }
        if c.pdf_tool.program.trim().is_empty() {
            return Err(Arxiv2KindleError::InvalidConfig(
                "PDF tool program must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Reject margins outside the open interval `(0, 1)` inches.
pub fn validate_margin(margin_in: f64) -> Result<f64, Arxiv2KindleError> {
    if margin_in > 0.0 && margin_in < 1.0 {
        Ok(margin_in)
    } else {
        Err(Arxiv2KindleError::InvalidConfig(format!(
            "Margin must satisfy 0 < margin < 1 (inches), got {margin_in}"
        )))
    }
}

// ── Geometry ─────────────────────────────────────────────────────────────

/// Page orientation of the reflowed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Portrait,
    /// Width and height are swapped, `pdflscape` is loaded and the
    /// compiled PDF is rotated with `pdftk`.
    Landscape,
}

impl Orientation {
    pub fn is_landscape(self) -> bool {
        self == Orientation::Landscape
    }
}

/// Paper size and margin handed to the `geometry` package, in inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometrySettings {
    pub paper_width: f64,
    pub paper_height: f64,
    pub margin: f64,
}

impl GeometrySettings {
    pub fn new(width_in: f64, height_in: f64, margin_in: f64, orientation: Orientation) -> Self {
        let (paper_width, paper_height) = match orientation {
            Orientation::Portrait => (width_in, height_in),
            Orientation::Landscape => (height_in, width_in),
        };
        Self {
            paper_width,
            paper_height,
            margin: margin_in,
        }
    }

    /// Render as a `geometry` option list: `paperwidth=4in,paperheight=6in,margin=0.2in`.
    pub fn to_options(&self) -> String {
        format!(
            "paperwidth={}in,paperheight={}in,margin={}in",
            self.paper_width, self.paper_height, self.margin
        )
    }
}

/// Settings consumed by [`crate::rewrite_tree`].
#[derive(Debug, Clone)]
pub struct RewriteOptions {
    pub geometry: GeometrySettings,
    pub orientation: Orientation,
    pub entry_file: Option<PathBuf>,
}

// ── Compiler ─────────────────────────────────────────────────────────────

/// Program plus leading arguments; the entry file name is appended last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatexCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl LatexCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec!["-interaction=nonstopmode".to_string()],
        }
    }

    pub fn with_args<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for LatexCommand {
    fn default() -> Self {
        Self::new("pdflatex")
    }
}

/// `pdftk`-compatible page tool. It is called as
/// `<program> <args…> <in.pdf> cat 1-endwest output <out.pdf>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfTool {
    pub program: String,
    pub args: Vec<String>,
}

impl PdfTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for PdfTool {
    fn default() -> Self {
        Self::new("pdftk")
    }
}

// ── Delivery ─────────────────────────────────────────────────────────────

/// SMTP submission settings for mailing the finished PDF.
#[derive(Clone)]
pub struct DeliveryConfig {
    /// Submission host. Default: `smtp.gmail.com`.
    pub smtp_host: String,
    /// Submission port (STARTTLS). Default: 587.
    pub smtp_port: u16,
    /// Sender address, also used as the SMTP login.
    pub sender: String,
    /// Recipient address, e.g. a Send-to-Kindle address.
    pub recipient: String,
    /// SMTP password or app password.
    pub password: String,
}

impl DeliveryConfig {
    pub const DEFAULT_HOST: &'static str = "smtp.gmail.com";
    pub const DEFAULT_PORT: u16 = 587;

    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            smtp_host: Self::DEFAULT_HOST.to_string(),
            smtp_port: Self::DEFAULT_PORT,
            sender: sender.into(),
            recipient: recipient.into(),
            password: password.into(),
        }
    }

    pub fn smtp_host(mut self, host: impl Into<String>) -> Self {
        self.smtp_host = host.into();
        self
    }

    pub fn smtp_port(mut self, port: u16) -> Self {
        self.smtp_port = port;
        self
    }
}

impl fmt::Debug for DeliveryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("sender", &self.sender)
            .field("recipient", &self.recipient)
            .field("password", &"<redacted>")
            .finish()
    }
}
