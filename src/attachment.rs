//! File attachments, backed by a filesystem path or by raw bytes.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::MailError;

/// An email attachment.
///
/// Path-based attachments defer reading until an adapter needs the bytes,
/// so a missing file only affects the send that tries to use it.
///
/// # Examples
///
/// ```
/// use mailrelay::Attachment;
///
/// let attachment = Attachment::from_bytes("report.pdf", b"PDF content".to_vec());
/// assert_eq!(attachment.content_type, "application/pdf");
///
/// let from_disk = Attachment::from_path("/var/exports/invoice.pdf").filename("March.pdf");
/// assert_eq!(from_disk.filename, "March.pdf");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Display filename
    pub filename: String,
    /// MIME content type (e.g., "application/pdf", "image/png")
    pub content_type: String,
    /// Raw attachment data (empty for path-based attachments)
    #[serde(default)]
    pub data: Vec<u8>,
    /// File path, read when the bytes are needed
    #[serde(default)]
    pub path: Option<String>,
}

impl Attachment {
    /// Create a new attachment from raw bytes.
    ///
    /// Content type is guessed from the filename extension.
    pub fn from_bytes(filename: impl Into<String>, data: Vec<u8>) -> Self {
        let filename = filename.into();
        let content_type = guess_content_type(&filename);

        Self {
            filename,
            content_type,
            data,
            path: None,
        }
    }

    /// Create an attachment that reads `path` at send time.
    ///
    /// The display filename defaults to the last path component.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("attachment")
            .to_string();

        Self {
            content_type: guess_content_type(&path.to_string_lossy()),
            filename,
            data: Vec::new(),
            path: Some(path.to_string_lossy().to_string()),
        }
    }

    /// Override the display filename.
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Set the content type explicitly.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Lower-cased extension of the display filename, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }

    /// Get the attachment data, loading from path if necessary.
    ///
    /// # Errors
    ///
    /// - `AttachmentFileNotFound` - File path doesn't exist
    /// - `AttachmentReadError` - Failed to read file
    /// - `AttachmentMissingContent` - No data and no path provided
    pub fn get_data(&self) -> Result<Vec<u8>, MailError> {
        match &self.path {
            Some(path) => std::fs::read(path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    MailError::AttachmentFileNotFound(path.clone())
                } else {
                    MailError::AttachmentReadError(format!("{}: {}", path, e))
                }
            }),
            None if self.data.is_empty() => {
                Err(MailError::AttachmentMissingContent(self.filename.clone()))
            }
            None => Ok(self.data.clone()),
        }
    }

    /// Get the attachment data as a base64-encoded string.
    pub fn base64_data(&self) -> Result<String, MailError> {
        use base64::Engine;
        let data = self.get_data()?;
        Ok(base64::engine::general_purpose::STANDARD.encode(data))
    }

    /// How this attachment is recorded in the delivery log: the path when
    /// there is one, otherwise the display filename.
    pub fn log_label(&self) -> &str {
        self.path.as_deref().unwrap_or(&self.filename)
    }

    /// Check if this is a path-based attachment.
    pub fn is_lazy(&self) -> bool {
        self.path.is_some()
    }
}

fn guess_content_type(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .to_string()
}
