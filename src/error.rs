//! Errors raised at the source-loading boundary.
//!
//! None of these are fatal to the engine: the cache manager turns them
//! into a degraded refresh and keeps serving the last published snapshot.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to obtain or decode source data.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The request never produced a response (DNS, connect, timeout).
    #[error("request to {location} failed: {message}")]
    Transport { location: String, message: String },

    /// The server answered with a non-success status.
    #[error("{location} returned HTTP {status}")]
    Status { location: String, status: u16 },

    /// A local source file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The payload was fetched but is not in the expected shape.
    #[error("failed to decode {location}: {message}")]
    Decode { location: String, message: String },

    /// The source yielded nothing usable.
    #[error("{source_name} produced no usable rows")]
    Empty { source_name: String },
}

impl SourceError {
    /// Short name for the error kind, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::Transport { .. } => "transport",
            SourceError::Status { .. } => "status",
            SourceError::Io { .. } => "io",
            SourceError::Decode { .. } => "decode",
            SourceError::Empty { .. } => "empty",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SourceError::Status {
            location: "https://example.org/a.tsv".to_string(),
            status: 503,
        };
        assert_eq!(err.to_string(), "https://example.org/a.tsv returned HTTP 503");
        assert_eq!(err.kind(), "status");

        let err = SourceError::Empty {
            source_name: "alias tables".to_string(),
        };
        assert_eq!(err.to_string(), "alias tables produced no usable rows");
    }
}
