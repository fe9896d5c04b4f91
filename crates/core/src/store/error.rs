//! Error types for the store module.

use thiserror::Error;

/// Errors raised by the job store and the output sink.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Object does not exist.
    #[error("object not found: {0}")]
    NotFound(String),

    /// Listing the bucket failed.
    #[error("list failed: {0}")]
    ListFailed(String),

    /// Reading, writing or removing tags failed.
    #[error("tagging failed for {key}: {reason}")]
    TaggingFailed { key: String, reason: String },

    /// Fetching object content failed.
    #[error("download failed for {key}: {reason}")]
    DownloadFailed { key: String, reason: String },

    /// Writing an object failed.
    #[error("upload failed for {key}: {reason}")]
    UploadFailed { key: String, reason: String },

    /// Deleting an object failed.
    #[error("delete failed for {key}: {reason}")]
    DeleteFailed { key: String, reason: String },

    /// The backend could not be reached or rejected the request.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// Local filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn tagging_failed(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::TaggingFailed {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub fn download_failed(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::DownloadFailed {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub fn upload_failed(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::UploadFailed {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub fn delete_failed(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::DeleteFailed {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error means the object is already gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::tagging_failed("m1", "access denied");
        assert_eq!(err.to_string(), "tagging failed for m1: access denied");

        let err = StoreError::NotFound("m2".to_string());
        assert_eq!(err.to_string(), "object not found: m2");
        assert!(err.is_not_found());
        assert!(!StoreError::ListFailed("timeout".to_string()).is_not_found());
    }
}
