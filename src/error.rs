use std::path::PathBuf;

/// Fatal failures of a beat-map run. Every variant aborts the whole run.
#[derive(Debug, thiserror::Error)]
pub enum BeatMapError {
    /// Input missing, unreadable, malformed, or decoded to nothing.
    #[error("failed to decode {}: {reason}", .path.display())]
    Decode {
        path: PathBuf,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid parameter combination, detected before any analysis runs.
    #[error("invalid configuration `{field}`: {reason}")]
    Configuration { field: &'static str, reason: String },

    /// Output could not be persisted. Analysis has already completed.
    #[error("failed to write {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BeatMapError {
    pub fn decode(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        BeatMapError::Decode {
            path: path.into(),
            reason: reason.into(),
            source: None,
        }
    }

    pub fn decode_with<E>(path: impl Into<PathBuf>, reason: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        BeatMapError::Decode {
            path: path.into(),
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn config(field: &'static str, reason: impl Into<String>) -> Self {
        BeatMapError::Configuration {
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BeatMapError>;
