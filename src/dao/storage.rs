use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of where documents live.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or refused the operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// What was being attempted.
        message: String,
        /// Backend failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A stored document exists but does not decode into the expected layout.
    #[error("document `{document}` is corrupt: {message}")]
    Corrupt {
        /// Key of the offending document.
        document: String,
        /// Decoder diagnostics.
        message: String,
    },
    /// An in-memory value could not be encoded for storage.
    #[error("failed to encode document `{document}`")]
    Encode {
        /// Key of the document being written.
        document: String,
        /// Encoder failure.
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a corruption error for `document`.
    pub fn corrupt(document: impl Into<String>, message: impl ToString) -> Self {
        StorageError::Corrupt {
            document: document.into(),
            message: message.to_string(),
        }
    }
}
