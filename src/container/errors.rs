//! # Container Errors

use thiserror::Error;

/// Result type for container operations
pub type ContainerResult<T> = Result<T, ContainerError>;

/// Container packing/parsing errors
#[derive(Debug, Clone, Error)]
pub enum ContainerError {
    /// A header was located but does not decode into the header shape.
    /// Fatal for the file being imported.
    #[error("Malformed container header: {0}")]
    Format(String),

    /// A referenced blob id is absent from the offsets table or the
    /// blob metadata map. Non-fatal: the caller skips that attachment.
    #[error("Attachment '{0}' missing from container")]
    MissingAttachment(String),

    /// A declared segment extends past the end of the buffer
    #[error("Container truncated: segment '{key}' needs bytes {start}..{end}, buffer holds {len}")]
    Truncated {
        key: String,
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("Markup segment is not valid UTF-8")]
    MarkupNotUtf8,

    /// Fetching blob bytes during export failed
    #[error("Blob fetch failed for '{blob_id}': {reason}")]
    BlobFetch { blob_id: String, reason: String },
}

impl ContainerError {
    pub fn format(reason: impl Into<String>) -> Self {
        ContainerError::Format(reason.into())
    }

    pub fn blob_fetch(blob_id: impl Into<String>, reason: impl Into<String>) -> Self {
        ContainerError::BlobFetch {
            blob_id: blob_id.into(),
            reason: reason.into(),
        }
    }

    /// Whether an import may continue past this error
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ContainerError::MissingAttachment(_))
    }
}
