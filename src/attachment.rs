//! Staging a single file to send inline with the next message

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::events::{InlineData, Part};

/// Why a file was refused; the pending slot is left untouched
#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("Unsupported file format: {}", .path.display())]
    UnsupportedType { path: PathBuf },

    #[error("File size too large. Max {}MB allowed.", .limit / (1024 * 1024))]
    TooLarge { size: u64, limit: u64 },

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A file staged by the user but not yet sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAttachment {
    /// Base64 (standard alphabet) file contents
    pub data: String,
    pub mime_type: String,
    pub name: String,
    pub is_image: bool,
}

impl PendingAttachment {
    /// Validate and encode a file from disk.
    ///
    /// The type check runs before the size check, and the size is read from
    /// metadata so oversized files are never loaded.
    pub fn from_path(path: &Path, max_bytes: u64) -> Result<Self, AttachmentError> {
        let mime_type = detect_mime_type(path).ok_or_else(|| AttachmentError::UnsupportedType {
            path: path.to_path_buf(),
        })?;

        let io_error = |source| AttachmentError::Io {
            path: path.to_path_buf(),
            source,
        };

        let size = fs::metadata(path).map_err(io_error)?.len();
        if size > max_bytes {
            return Err(AttachmentError::TooLarge {
                size,
                limit: max_bytes,
            });
        }

        let bytes = fs::read(path).map_err(io_error)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self::from_bytes(name, mime_type, &bytes))
    }

    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        let mime_type = mime_type.into();
        Self {
            data: BASE64.encode(bytes),
            is_image: mime_type.starts_with("image/"),
            mime_type,
            name: name.into(),
        }
    }

    pub fn to_part(&self) -> Part {
        Part::InlineData {
            inline_data: InlineData {
                mime_type: self.mime_type.clone(),
                data: self.data.clone(),
            },
        }
    }

    /// One-line description shown next to the message
    pub fn label(&self) -> String {
        let icon = if self.is_image { "🖼" } else { "📄" };
        format!("{} {}", icon, self.name)
    }
}

/// MIME type from the file extension, `None` when unknown
pub fn detect_mime_type(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "pdf" => "application/pdf",
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        "json" => "application/json",
        "xml" => "text/xml",
        "rs" => "text/x-rust",
        "py" => "text/x-python",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        _ => return None,
    };
    Some(mime)
}
