//! # eprint-fetch
//!
//! Resolve [arXiv](https://arxiv.org) identifiers, scrape the paper title and
//! download the e-print source archive, then unpack it into a directory.
//!
//! ## How it works
//!
//! 1. [`ArxivId::parse`] accepts a bare identifier (`2101.00001`,
//!    `2101.00001v2`) or an abs/pdf URL that carries one.
//! 2. [`Fetcher::fetch_title`] requests `<base>/abs/<id>` and reads the HTML
//!    `<title>`.
//! 3. [`Fetcher::download_archive`] streams `<base>/e-print/<id>` to
//!    `<dest>/<title>.tar.gz`.
//! 4. [`extract_archive`] sniffs the payload and unpacks it: a gzipped tar
//!    is unpacked in place, a gzipped single file becomes `main.tex`, and a
//!    PDF payload means no sources were published.
//!
//! Everything here is blocking. Async callers should drive it from
//! `spawn_blocking`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use eprint_fetch::{extract_archive, ArxivId, Fetcher, DEFAULT_BASE_URL};
//! use std::path::Path;
//!
//! let id = ArxivId::parse("https://arxiv.org/abs/1706.03762").unwrap();
//! let fetcher = Fetcher::new(DEFAULT_BASE_URL, 120).unwrap();
//! let title = fetcher.fetch_title(&id).unwrap();
//! let archive = fetcher
//!     .download_archive(&id, Path::new("/tmp/work"), &title, None)
//!     .unwrap();
//! extract_archive(&archive, Path::new("/tmp/work")).unwrap();
//! ```

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use flate2::read::GzDecoder;
use once_cell::sync::Lazy;
use regex::Regex;
use tar::Archive;
use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Scheme and host every endpoint is templated from.
pub const DEFAULT_BASE_URL: &str = "http://arxiv.org";

/// File written when the e-print is a gzipped single LaTeX file.
pub const SINGLE_FILE_NAME: &str = "main.tex";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const TAR_MAGIC_OFFSET: usize = 257;
const MAX_STEM_CHARS: usize = 120;

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by eprint-fetch operations.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The input carries no recognisable arXiv identifier.
    #[error("'{input}' is not an arXiv identifier or abs/pdf URL (expected e.g. 2101.00001v2)")]
    InvalidIdentifier { input: String },

    /// The HTTP client could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    Client(String),

    /// Network request failed or returned a non-success status.
    #[error("Failed to download '{url}': {reason}")]
    Download { url: String, reason: String },

    /// The request exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    Timeout { url: String, secs: u64 },

    /// The abstract page had no usable `<title>`.
    #[error("No <title> found on '{url}'")]
    MissingTitle { url: String },

    /// The server returned a PDF instead of LaTeX sources.
    #[error("Paper sources are not available for '{archive}' (the e-print is a PDF)")]
    SourceUnavailable { archive: PathBuf },

    /// gzip/tar extraction failed.
    #[error("Archive extraction failed: {0}")]
    Extract(String),

    /// Local file-system error.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> FetchError + '_ {
    move |source| FetchError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ── Identifiers ──────────────────────────────────────────────────────────────

static RE_ARXIV_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^((http|https)://.*?/)?(?P<id>\d{4}\.\d{4,5}(v\d{1,2})?)").unwrap()
});

/// A new-style arXiv identifier, optionally versioned (`2101.00001v2`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArxivId(String);

impl ArxivId {
    /// Extract the identifier from a bare id or an abs/pdf URL.
    pub fn parse(input: &str) -> Result<Self, FetchError> {
        RE_ARXIV_ID
            .captures(input.trim())
            .and_then(|caps| caps.name("id"))
            .map(|m| Self(m.as_str().to_string()))
            .ok_or_else(|| FetchError::InvalidIdentifier {
                input: input.to_string(),
            })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArxivId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Endpoints ────────────────────────────────────────────────────────────────

/// URL templates for the abstract page and the e-print archive.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base_url: String,
}

impl Endpoints {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    pub fn abs_url(&self, id: &ArxivId) -> String {
        format!("{}/abs/{}", self.base_url, id)
    }

    pub fn eprint_url(&self, id: &ArxivId) -> String {
        format!("{}/e-print/{}", self.base_url, id)
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

// ── Titles ───────────────────────────────────────────────────────────────────

static RE_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<head\b.*?<title[^>]*>(.*?)</title>").unwrap());
static RE_ID_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[[^\]]+\]\s*").unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Return the raw text of the `<head><title>` element, entity-decoded.
pub fn extract_title(html: &str) -> Option<String> {
    let caps = RE_TITLE.captures(html)?;
    let raw = decode_entities(caps.get(1)?.as_str());
    if raw.trim().is_empty() {
        None
    } else {
        Some(raw)
    }
}

/// Drop the leading `[2101.00001]` tag and collapse whitespace.
pub fn clean_title(raw: &str) -> String {
    let without_tag = RE_ID_TAG.replace(raw.trim(), "");
    RE_WHITESPACE
        .replace_all(&without_tag, " ")
        .trim()
        .to_string()
}

/// Turn a title into something usable as a file-name stem.
///
/// Path separators and characters rejected by common file systems become
/// `_`; the result is capped at 120 characters and never empty.
pub fn sanitize_file_stem(title: &str) -> String {
    let mut stem: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .take(MAX_STEM_CHARS)
        .collect();
    stem = stem.trim().trim_matches('.').trim().to_string();
    if stem.is_empty() {
        "paper".to_string()
    } else {
        stem
    }
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

// ── Fetcher ──────────────────────────────────────────────────────────────────

/// Blocking HTTP client bound to one set of [`Endpoints`].
pub struct Fetcher {
    client: reqwest::blocking::Client,
    endpoints: Endpoints,
    timeout_secs: u64,
}

impl Fetcher {
    /// Build a client with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("eprint-fetch/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoints: Endpoints::new(base_url),
            timeout_secs,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Scrape and clean the paper title from its abstract page.
    pub fn fetch_title(&self, id: &ArxivId) -> Result<String, FetchError> {
        let url = self.endpoints.abs_url(id);
        let body = self
            .get(&url)?
            .text()
            .map_err(|e| self.request_error(&url, e))?;

        extract_title(&body)
            .map(|raw| clean_title(&raw))
            .filter(|t| !t.is_empty())
            .ok_or(FetchError::MissingTitle { url })
    }

    /// Download the e-print archive to `<dest_dir>/<stem>.tar.gz`.
    ///
    /// `on_progress` receives `(bytes_downloaded, total_size_option)` every
    /// 64 KiB.
    pub fn download_archive(
        &self,
        id: &ArxivId,
        dest_dir: &Path,
        title: &str,
        on_progress: Option<&dyn Fn(u64, Option<u64>)>,
    ) -> Result<PathBuf, FetchError> {
        let url = self.endpoints.eprint_url(id);
        let dest = dest_dir.join(format!("{}.tar.gz", sanitize_file_stem(title)));

        let mut response = self.get(&url)?;
        let total = response.content_length();
        let mut file = File::create(&dest).map_err(io_err(&dest))?;

        let mut chunk = vec![0u8; 64 * 1024]; // 64 KiB
        let mut downloaded: u64 = 0;

        loop {
            match response.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    file.write_all(&chunk[..n]).map_err(io_err(&dest))?;
                    downloaded += n as u64;
                    if let Some(cb) = on_progress {
                        cb(downloaded, total);
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(FetchError::Download {
                        url,
                        reason: format!("Read error: {e}"),
                    });
                }
            }
        }
        file.flush().map_err(io_err(&dest))?;

        if downloaded == 0 {
            return Err(FetchError::Download {
                url,
                reason: "empty response body".to_string(),
            });
        }

        Ok(dest)
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| self.request_error(url, e))?;

        if !response.status().is_success() {
            return Err(FetchError::Download {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }
        Ok(response)
    }

    fn request_error(&self, url: &str, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            FetchError::Download {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

// ── Extraction ───────────────────────────────────────────────────────────────

/// What [`extract_archive`] found inside the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveKind {
    /// A (possibly gzipped) tar, unpacked into the destination.
    Tarball,
    /// A gzipped single file, written to the given path.
    SingleFile(PathBuf),
}

/// Unpack a downloaded e-print into `dest_dir`.
///
/// Entries that would escape `dest_dir` (absolute paths, `..`) are skipped by
/// the `tar` crate.
pub fn extract_archive(archive: &Path, dest_dir: &Path) -> Result<ArchiveKind, FetchError> {
    let head = read_head(File::open(archive).map_err(io_err(archive))?, 4)
        .map_err(io_err(archive))?;

    if head.starts_with(b"%PDF") {
        return Err(FetchError::SourceUnavailable {
            archive: archive.to_path_buf(),
        });
    }

    let gzipped = head.starts_with(&GZIP_MAGIC);
    let inner_head = if gzipped {
        let gz = GzDecoder::new(File::open(archive).map_err(io_err(archive))?);
        read_head(gz, TAR_MAGIC_OFFSET + 5).map_err(|e| FetchError::Extract(e.to_string()))?
    } else {
        read_head(File::open(archive).map_err(io_err(archive))?, TAR_MAGIC_OFFSET + 5)
            .map_err(io_err(archive))?
    };

    if is_tar_header(&inner_head) {
        let file = BufReader::new(File::open(archive).map_err(io_err(archive))?);
        if gzipped {
            unpack_tar(Archive::new(GzDecoder::new(file)), dest_dir)?;
        } else {
            unpack_tar(Archive::new(file), dest_dir)?;
        }
        return Ok(ArchiveKind::Tarball);
    }

    if gzipped {
        if inner_head.starts_with(b"%PDF") {
            return Err(FetchError::SourceUnavailable {
                archive: archive.to_path_buf(),
            });
        }
        let dest = dest_dir.join(SINGLE_FILE_NAME);
        let mut gz = GzDecoder::new(File::open(archive).map_err(io_err(archive))?);
        let mut out = File::create(&dest).map_err(io_err(&dest))?;
        std::io::copy(&mut gz, &mut out).map_err(|e| FetchError::Extract(e.to_string()))?;
        return Ok(ArchiveKind::SingleFile(dest));
    }

    Err(FetchError::Extract(format!(
        "'{}' is neither a gzip stream nor a tar archive (first bytes: {:?})",
        archive.display(),
        head
    )))
}

fn unpack_tar<R: Read>(mut archive: Archive<R>, dest_dir: &Path) -> Result<(), FetchError> {
    archive.set_overwrite(true);
    archive
        .unpack(dest_dir)
        .map_err(|e| FetchError::Extract(format!("Unpack failed: {e}")))
}

fn read_head<R: Read>(mut reader: R, len: usize) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(len);
    reader.by_ref().take(len as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

fn is_tar_header(head: &[u8]) -> bool {
    head.get(TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + 5) == Some(b"ustar".as_slice())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
