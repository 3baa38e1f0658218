//! File content and text/binary classification
//!
//! Text files travel as UTF-8 strings and are embedded inline in tree payloads.
//! Every other file is raw bytes and crosses the remote API as base64.

use crate::error::SyncError;
use crate::hash::compute_blob_id;
use crate::types::ObjectId;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::collections::HashSet;

/// Extensions treated as text unless configured otherwise.
pub const DEFAULT_TEXT_EXTENSIONS: &[&str] = &[
    "md", "txt", "json", "canvas", "css", "js", "ts", "html", "htm", "xml", "yml", "yaml", "csv",
    "tsv", "svg", "toml", "ini", "log",
];

/// Case-insensitive allow-list of text extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextExtensions {
    extensions: HashSet<String>,
}

impl TextExtensions {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self { extensions }
    }

    /// Whether `path` is text, judged on the extension of its final component.
    pub fn is_text(&self, path: &str) -> bool {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        match file_name.rfind('.') {
            Some(dot) => {
                let ext = file_name[dot + 1..].to_ascii_lowercase();
                self.extensions.contains(&ext)
            }
            None => false,
        }
    }
}

impl Default for TextExtensions {
    fn default() -> Self {
        Self::new(DEFAULT_TEXT_EXTENSIONS)
    }
}

/// Content of a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Text(String),
    Binary(Vec<u8>),
}

impl FileContent {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FileContent::Text(text) => text.as_bytes(),
            FileContent::Binary(bytes) => bytes,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, FileContent::Text(_))
    }

    /// Blob id of the content as the remote would compute it.
    pub fn blob_id(&self) -> ObjectId {
        compute_blob_id(self.as_bytes())
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.as_bytes())
    }

    /// Decode a base64 blob payload from the remote.
    ///
    /// The remote wraps base64 at fixed line widths, so whitespace is dropped
    /// before decoding. Text payloads must be valid UTF-8.
    pub fn from_base64(path: &str, encoded: &str, is_text: bool) -> Result<Self, SyncError> {
        let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = BASE64.decode(compact.as_bytes()).map_err(|e| SyncError::Decode {
            path: path.to_string(),
            message: format!("invalid base64: {}", e),
        })?;

        if is_text {
            let text = String::from_utf8(bytes).map_err(|e| SyncError::Decode {
                path: path.to_string(),
                message: format!("invalid UTF-8: {}", e),
            })?;
            Ok(FileContent::Text(text))
        } else {
            Ok(FileContent::Binary(bytes))
        }
    }
}
