//! Reading and writing LaTeX sources without losing their encoding.
//!
//! arXiv tarballs mix UTF-8 and Latin-1 files. A file that is not valid
//! UTF-8 is decoded byte-for-byte as Latin-1 and written back the same way,
//! so untouched lines round-trip exactly.

use crate::error::Arxiv2KindleError;
use std::path::Path;

/// Text encoding a source file was decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Latin1,
}

/// A decoded source file.
#[derive(Debug, Clone)]
pub struct SourceText {
    pub text: String,
    pub encoding: TextEncoding,
}

impl SourceText {
    pub fn decode(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Self {
                text,
                encoding: TextEncoding::Utf8,
            },
            Err(e) => Self {
                text: e.into_bytes().iter().map(|&b| char::from(b)).collect(),
                encoding: TextEncoding::Latin1,
            },
        }
    }

    pub fn read(path: &Path) -> Result<Self, Arxiv2KindleError> {
        let bytes = std::fs::read(path).map_err(Arxiv2KindleError::source_io(path))?;
        Ok(Self::decode(bytes))
    }

    /// Encode `text` with this file's encoding and write it to `path`.
    pub fn write(path: &Path, text: &str, encoding: TextEncoding) -> Result<(), Arxiv2KindleError> {
        let bytes = encode(text, encoding).map_err(|detail| Arxiv2KindleError::Encoding {
            path: path.to_path_buf(),
            detail,
        })?;
        std::fs::write(path, bytes).map_err(Arxiv2KindleError::source_io(path))
    }
}

fn encode(text: &str, encoding: TextEncoding) -> Result<Vec<u8>, String> {
    match encoding {
        TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
        TextEncoding::Latin1 => text
            .chars()
            .map(|c| {
                u8::try_from(c).map_err(|_| format!("character {c:?} is not representable in Latin-1"))
            })
            .collect(),
    }
}

/// Lines dropped before rewriting: blank lines and lines starting with `%`.
pub fn is_filtered_line(line: &str) -> bool {
    line.starts_with('%') || line.trim().is_empty()
}

/// The first line that survives [`is_filtered_line`].
pub fn first_significant_line(text: &str) -> Option<&str> {
    text.lines().find(|l| !is_filtered_line(l))
}
