//! Attachment ingestion
//!
//! Turns user-selected files into [`Attachment`] records that can be sent to a
//! provider. Text-like files are decoded to UTF-8 text; every other allowed
//! type (images, PDFs, office documents, audio, video) is carried as a base64
//! `data:` URL.
//!
//! A multi-file selection is processed as independent per-file tasks: one
//! rejected or unreadable file never prevents its siblings from being
//! attached, and the resulting attachments keep the selection order.

use std::error::Error;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::utils::data_url::{base64_payload, encode_data_url};

pub const IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

pub const DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "text/plain",
    "text/markdown",
    "application/x-tex",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
];

pub const MEDIA_TYPES: &[&str] = &["audio/mpeg", "audio/wav", "video/mp4", "video/webm"];

/// Default upper bound on a single attachment (20 MiB).
pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 20 * 1024 * 1024;

/// Allow-list group a MIME type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentClass {
    Image,
    Document,
    Media,
}

impl AttachmentClass {
    pub fn of(mime_type: &str) -> Option<Self> {
        if IMAGE_TYPES.contains(&mime_type) {
            Some(AttachmentClass::Image)
        } else if DOCUMENT_TYPES.contains(&mime_type) {
            Some(AttachmentClass::Document)
        } else if MEDIA_TYPES.contains(&mime_type) {
            Some(AttachmentClass::Media)
        } else {
            None
        }
    }
}

pub fn is_allowed_type(mime_type: &str) -> bool {
    AttachmentClass::of(mime_type).is_some()
}

fn is_text_type(mime_type: &str) -> bool {
    mime_type.starts_with("text/")
}

/// Transmissible content of an attachment. Exactly one form exists per
/// attachment, chosen by MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttachmentPayload {
    DataUrl(String),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub payload: AttachmentPayload,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            AttachmentPayload::Text(text) => Some(text),
            AttachmentPayload::DataUrl(_) => None,
        }
    }

    pub fn data_url(&self) -> Option<&str> {
        match &self.payload {
            AttachmentPayload::DataUrl(url) => Some(url),
            AttachmentPayload::Text(_) => None,
        }
    }

    /// Raw base64 data for providers that take it without the URL header.
    pub fn base64_data(&self) -> Option<&str> {
        self.data_url().and_then(base64_payload)
    }
}

/// Where the bytes of a selected file live.
#[derive(Debug, Clone)]
pub enum FileSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// A file picked by the user (or pasted) that has not been processed yet.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub mime_type: String,
    pub source: FileSource,
}

impl SelectedFile {
    /// Describe a file on disk, guessing its MIME type from the extension.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Self {
            name,
            mime_type,
            source: FileSource::Path(path.to_path_buf()),
        }
    }

    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            source: FileSource::Bytes(bytes),
        }
    }
}

#[derive(Debug)]
pub enum AttachmentError {
    /// The MIME type is not on the allow-list.
    UnsupportedType { name: String, mime_type: String },
    /// Reading or decoding the file failed.
    FileRead { name: String, source: io::Error },
    /// The file exceeds the configured size cap.
    TooLarge { name: String, size: u64, limit: u64 },
}

impl AttachmentError {
    pub fn file_name(&self) -> &str {
        match self {
            AttachmentError::UnsupportedType { name, .. }
            | AttachmentError::FileRead { name, .. }
            | AttachmentError::TooLarge { name, .. } => name,
        }
    }
}

impl fmt::Display for AttachmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentError::UnsupportedType { name, mime_type } => {
                write!(f, "File type {mime_type} not supported ({name})")
            }
            AttachmentError::FileRead { name, source } => {
                write!(f, "Error processing file {name}: {source}")
            }
            AttachmentError::TooLarge { name, size, limit } => write!(
                f,
                "File {name} is {size} bytes, larger than the {limit} byte limit"
            ),
        }
    }
}

impl Error for AttachmentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AttachmentError::FileRead { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result of processing one selection. `accepted` keeps selection order.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub accepted: Vec<Attachment>,
    pub rejected: Vec<AttachmentError>,
}

#[derive(Debug, Clone)]
pub struct AttachmentProcessor {
    max_bytes: u64,
}

impl Default for AttachmentProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTACHMENT_BYTES)
    }
}

impl AttachmentProcessor {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Convert one file into an attachment.
    pub async fn process(&self, file: &SelectedFile) -> Result<Attachment, AttachmentError> {
        if !is_allowed_type(&file.mime_type) {
            return Err(AttachmentError::UnsupportedType {
                name: file.name.clone(),
                mime_type: file.mime_type.clone(),
            });
        }

        let bytes = self.read_bytes(file).await?;
        let size_bytes = bytes.len() as u64;
        self.check_size(&file.name, size_bytes)?;

        let payload = if is_text_type(&file.mime_type) {
            let text = String::from_utf8(bytes).map_err(|err| AttachmentError::FileRead {
                name: file.name.clone(),
                source: io::Error::new(io::ErrorKind::InvalidData, err),
            })?;
            AttachmentPayload::Text(text)
        } else {
            AttachmentPayload::DataUrl(encode_data_url(&file.mime_type, &bytes))
        };

        debug!(
            name = %file.name,
            mime_type = %file.mime_type,
            size_bytes,
            "processed attachment"
        );

        Ok(Attachment {
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            size_bytes,
            payload,
        })
    }

    /// Process every file of a selection independently and collect the
    /// survivors in selection order.
    pub async fn process_batch(&self, files: &[SelectedFile]) -> BatchOutcome {
        let results = join_all(files.iter().map(|file| self.process(file))).await;

        let mut outcome = BatchOutcome::default();
        for result in results {
            match result {
                Ok(attachment) => outcome.accepted.push(attachment),
                Err(err) => {
                    warn!("{err}");
                    outcome.rejected.push(err);
                }
            }
        }
        outcome
    }

    /// Accept a clipboard item. Only images are taken from a paste.
    pub async fn process_pasted(
        &self,
        name: impl Into<String>,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<Attachment, AttachmentError> {
        let file = SelectedFile::from_bytes(name, mime_type, bytes);
        if !file.mime_type.starts_with("image/") {
            return Err(AttachmentError::UnsupportedType {
                name: file.name,
                mime_type: file.mime_type,
            });
        }
        self.process(&file).await
    }

    async fn read_bytes(&self, file: &SelectedFile) -> Result<Vec<u8>, AttachmentError> {
        let read_error = |source| AttachmentError::FileRead {
            name: file.name.clone(),
            source,
        };

        match &file.source {
            FileSource::Bytes(bytes) => Ok(bytes.clone()),
            FileSource::Path(path) => {
                let metadata = tokio::fs::metadata(path).await.map_err(read_error)?;
                self.check_size(&file.name, metadata.len())?;
                tokio::fs::read(path).await.map_err(read_error)
            }
        }
    }

    fn check_size(&self, name: &str, size: u64) -> Result<(), AttachmentError> {
        if size > self.max_bytes {
            return Err(AttachmentError::TooLarge {
                name: name.to_string(),
                size,
                limit: self.max_bytes,
            });
        }
        Ok(())
    }
}
